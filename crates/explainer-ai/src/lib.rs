pub mod agent;
pub mod coordinator;
pub mod llm_factory;
pub mod llm_provider;
pub mod openai_compatible_provider;
pub mod pipeline;
pub mod prompts;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;

pub use agent::{RoleAgent, RoleDefinition, EXPLAINER_NAME, REVIEWER_NAME};
pub use coordinator::{
    ChatExchange, CloseReason, Coordinator, ExchangeMessage, ExchangeState, PhraseTermination,
    TerminationPolicy,
};
pub use llm_factory::LLMProviderFactory;
pub use llm_provider::*;
pub use openai_compatible_provider::{OpenAICompatibleConfig, OpenAICompatibleProvider};
pub use pipeline::*;

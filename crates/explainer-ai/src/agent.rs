// ABOUTME: Role agents binding one fixed instruction template to the shared backend
// ABOUTME: Backend failures come back as typed errors for the coordinator to record

use crate::coordinator::ExchangeMessage;
use crate::llm_provider::{GenerationConfig, LLMProvider, LLMResult, LlmError, Message};
use crate::prompts::{EXPLAINER_SYSTEM_PROMPT, REVIEWER_SYSTEM_PROMPT};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

/// Name of the review role
pub const REVIEWER_NAME: &str = "Reviewer";
/// Name of the explanation role
pub const EXPLAINER_NAME: &str = "Explainer";

/// A behavioural persona: a name and its fixed instructions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleDefinition {
    pub name: String,
    pub instructions: String,
}

impl RoleDefinition {
    pub fn new(name: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
        }
    }

    pub fn reviewer() -> Self {
        Self::new(REVIEWER_NAME, REVIEWER_SYSTEM_PROMPT)
    }

    pub fn explainer() -> Self {
        Self::new(EXPLAINER_NAME, EXPLAINER_SYSTEM_PROMPT)
    }
}

/// A role bound to the backend. Immutable once built and shared across requests.
pub struct RoleAgent {
    definition: RoleDefinition,
    provider: Arc<dyn LLMProvider>,
    generation: GenerationConfig,
    request_timeout: Duration,
}

impl RoleAgent {
    pub fn new(
        definition: RoleDefinition,
        provider: Arc<dyn LLMProvider>,
        generation: GenerationConfig,
        request_timeout: Duration,
    ) -> Self {
        Self {
            definition,
            provider,
            generation,
            request_timeout,
        }
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn definition(&self) -> &RoleDefinition {
        &self.definition
    }

    /// Produce a completion for the exchange so far.
    ///
    /// Returns `Ok(None)` when the backend answered without any completion.
    pub async fn respond(&self, conversation: &[ExchangeMessage]) -> LLMResult<Option<String>> {
        let messages = self.render_messages(conversation);

        debug!(
            role = %self.definition.name,
            messages = messages.len(),
            "Requesting completion"
        );

        let response = timeout(
            self.request_timeout,
            self.provider.generate_chat(&messages, &self.generation),
        )
        .await
        .map_err(|_| LlmError::Timeout(self.request_timeout.as_secs()))??;

        debug!(
            role = %self.definition.name,
            completion_tokens = ?response.completion_tokens,
            finish_reason = ?response.finish_reason,
            "Completion received"
        );

        Ok(response.content)
    }

    /// System instructions first, then the exchange with this role's own
    /// messages as assistant turns.
    fn render_messages(&self, conversation: &[ExchangeMessage]) -> Vec<Message> {
        std::iter::once(Message::system(self.definition.instructions.clone()))
            .chain(conversation.iter().map(|m| {
                if m.sender == self.definition.name {
                    Message::assistant(m.content.clone())
                } else {
                    Message::user(m.content.clone())
                }
            }))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_provider::MessageRole;
    use crate::test_support::{ScriptedProvider, ScriptedReply};

    fn agent(provider: Arc<ScriptedProvider>) -> RoleAgent {
        RoleAgent::new(
            RoleDefinition::reviewer(),
            provider,
            GenerationConfig::default(),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_respond_prepends_instructions_and_maps_senders() {
        let provider = Arc::new(ScriptedProvider::always(ScriptedReply::text("• fine")));
        let agent = agent(provider.clone());

        let conversation = vec![
            ExchangeMessage::new("UserProxy", "review this"),
            ExchangeMessage::new(REVIEWER_NAME, "• first pass"),
            ExchangeMessage::new("UserProxy", "Thank you for the explanation."),
        ];
        let reply = agent.respond(&conversation).await.unwrap();
        assert_eq!(reply.as_deref(), Some("• fine"));

        let requests = provider.requests();
        let sent = &requests[0];
        assert_eq!(sent[0].role, MessageRole::System);
        assert_eq!(sent[0].content, REVIEWER_SYSTEM_PROMPT);
        assert_eq!(sent[1].role, MessageRole::User);
        assert_eq!(sent[2].role, MessageRole::Assistant);
        assert_eq!(sent[3].role, MessageRole::User);
    }

    #[tokio::test]
    async fn test_missing_completion_is_none() {
        let provider = Arc::new(ScriptedProvider::always(ScriptedReply::NoCompletion));
        let reply = agent(provider)
            .respond(&[ExchangeMessage::new("UserProxy", "hi")])
            .await
            .unwrap();
        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn test_backend_failure_is_returned() {
        let provider = Arc::new(ScriptedProvider::always(ScriptedReply::fail(
            "connection refused",
        )));
        let err = agent(provider)
            .respond(&[ExchangeMessage::new("UserProxy", "hi")])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("connection refused"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_backend_times_out() {
        let provider = Arc::new(
            ScriptedProvider::always(ScriptedReply::text("late"))
                .with_delay(Duration::from_secs(60)),
        );
        let err = agent(provider)
            .respond(&[ExchangeMessage::new("UserProxy", "hi")])
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Timeout(5)));
    }
}

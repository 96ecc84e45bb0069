use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised by a generative backend
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} API error ({status}): {message}")]
    Api {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("{0}")]
    Unavailable(String),
}

/// Result type for LLM operations
pub type LLMResult<T> = std::result::Result<T, LlmError>;

/// Configuration for generation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Temperature for sampling (0.0 to 2.0)
    pub temperature: f32,
    /// Maximum tokens to generate
    pub max_tokens: Option<usize>,
    /// Seed for reproducible sampling
    pub seed: Option<u64>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: Some(2048),
            seed: None,
        }
    }
}

/// A message in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Role of a message in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// Response from the LLM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMResponse {
    /// Generated text; `None` when the backend answered without a completion
    pub content: Option<String>,
    /// Total tokens used in the request
    pub total_tokens: Option<usize>,
    /// Tokens used in the prompt
    pub prompt_tokens: Option<usize>,
    /// Tokens generated in the completion
    pub completion_tokens: Option<usize>,
    /// Finish reason (e.g., "stop", "length")
    pub finish_reason: Option<String>,
    /// Model used for generation
    pub model: String,
}

/// Generative text backend: given role instructions and a conversation,
/// produce a completion or fail.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate a chat completion with message history
    async fn generate_chat(
        &self,
        messages: &[Message],
        config: &GenerationConfig,
    ) -> LLMResult<LLMResponse>;

    /// Get the name of this provider
    fn provider_name(&self) -> &str;

    /// Get the model identifier
    fn model_name(&self) -> &str;
}

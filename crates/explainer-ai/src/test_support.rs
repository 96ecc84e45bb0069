//! Scripted backend for exercising the pipeline without a running model server.

use crate::llm_provider::{GenerationConfig, LLMProvider, LLMResponse, LLMResult, LlmError, Message};
use async_trait::async_trait;
use explainer_core::{ConfigManager, ExplainerConfig, LLMConfig};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// What the scripted backend answers for one call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedReply {
    Text(String),
    /// A response with no completion in it
    NoCompletion,
    /// The call fails with this message
    Fail(String),
}

impl ScriptedReply {
    pub fn text(content: impl Into<String>) -> Self {
        ScriptedReply::Text(content.into())
    }

    pub fn fail(message: impl Into<String>) -> Self {
        ScriptedReply::Fail(message.into())
    }
}

type ReplyFn = dyn Fn(usize, &[Message]) -> ScriptedReply + Send + Sync;

/// [`LLMProvider`] answering from a script and recording every request
pub struct ScriptedProvider {
    script: Box<ReplyFn>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedProvider {
    /// Same reply for every call
    pub fn always(reply: ScriptedReply) -> Self {
        Self::from_fn(move |_, _| reply.clone())
    }

    /// Replies in order; `NoCompletion` once the list runs out
    pub fn sequence(replies: Vec<ScriptedReply>) -> Self {
        Self::from_fn(move |call, _| {
            replies
                .get(call)
                .cloned()
                .unwrap_or(ScriptedReply::NoCompletion)
        })
    }

    /// Reply computed from the zero-based call index and the request
    pub fn from_fn<F>(script: F) -> Self
    where
        F: Fn(usize, &[Message]) -> ScriptedReply + Send + Sync + 'static,
    {
        Self {
            script: Box::new(script),
            delay: None,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Sleep before answering each call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn generate_chat(
        &self,
        messages: &[Message],
        _config: &GenerationConfig,
    ) -> LLMResult<LLMResponse> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(messages.to_vec());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let content = match (self.script)(call, messages) {
            ScriptedReply::Text(text) => Some(text),
            ScriptedReply::NoCompletion => None,
            ScriptedReply::Fail(message) => return Err(LlmError::Unavailable(message)),
        };

        Ok(LLMResponse {
            content,
            total_tokens: None,
            prompt_tokens: None,
            completion_tokens: None,
            finish_reason: Some("stop".to_string()),
            model: "scripted".to_string(),
        })
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Configuration with both backend settings present
pub fn test_config() -> ExplainerConfig {
    ExplainerConfig {
        llm: LLMConfig {
            base_url: Some("http://localhost:11434".to_string()),
            model: Some("codellama:7b".to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn test_config_manager() -> ConfigManager {
    ConfigManager::from_config(test_config()).expect("test config is valid")
}

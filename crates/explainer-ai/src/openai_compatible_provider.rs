use crate::llm_provider::*;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for OpenAI-compatible providers (Ollama, LM Studio, etc.)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAICompatibleConfig {
    /// Base URL for the API, including the version segment (e.g. "http://localhost:11434/v1")
    pub base_url: String,
    /// Model to use
    pub model: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Maximum retries for failed requests
    pub max_retries: u32,
    /// Optional API key (some providers require it, some don't)
    pub api_key: Option<String>,
    /// Provider name for display purposes
    pub provider_name: String,
}

impl Default for OpenAICompatibleConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434/v1".to_string(),
            model: "codellama:7b".to_string(),
            timeout_secs: 120,
            max_retries: 0,
            api_key: None,
            provider_name: "openai-compatible".to_string(),
        }
    }
}

impl OpenAICompatibleConfig {
    /// Create config for Ollama's OpenAI-compatible endpoint
    pub fn ollama(base_url: &str, model: String) -> Self {
        Self {
            base_url: format!("{}/v1", base_url.trim_end_matches('/')),
            model,
            provider_name: "ollama".to_string(),
            ..Default::default()
        }
    }
}

/// OpenAI-compatible LLM provider speaking the Chat Completions API
pub struct OpenAICompatibleProvider {
    config: OpenAICompatibleConfig,
    client: Client,
}

impl OpenAICompatibleProvider {
    /// Create a new OpenAI-compatible provider
    pub fn new(config: OpenAICompatibleConfig) -> LLMResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    /// Send a request, retrying up to `max_retries` times
    async fn send_request(
        &self,
        messages: &[Message],
        config: &GenerationConfig,
    ) -> LLMResult<ChatCompletionsResponse> {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s
                let delay = Duration::from_secs(2u64.pow(attempt - 1));
                tokio::time::sleep(delay).await;
            }

            match self.try_chat_completions_request(messages, config).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    if attempt < self.config.max_retries {
                        tracing::warn!(
                            error = %e,
                            "{} request failed (attempt {}/{}), retrying...",
                            self.config.provider_name,
                            attempt + 1,
                            self.config.max_retries + 1
                        );
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            LlmError::Unavailable("All retry attempts failed".to_string())
        }))
    }

    fn build_request(
        &self,
        messages: &[Message],
        config: &GenerationConfig,
    ) -> ChatCompletionsRequest {
        ChatCompletionsRequest {
            model: self.config.model.clone(),
            messages: messages
                .iter()
                .map(|m| ChatMessage {
                    role: m.role.to_string(),
                    content: Some(m.content.clone()),
                })
                .collect(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            seed: config.seed,
            stream: false,
        }
    }

    async fn try_chat_completions_request(
        &self,
        messages: &[Message],
        config: &GenerationConfig,
    ) -> LLMResult<ChatCompletionsResponse> {
        let request = self.build_request(messages, config);

        let mut request_builder = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .header("Content-Type", "application/json")
            .json(&request);

        if let Some(api_key) = &self.config.api_key {
            request_builder =
                request_builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = request_builder.send().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout(self.config.timeout_secs)
            } else {
                LlmError::Http(e)
            }
        })?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            return Err(LlmError::Api {
                provider: self.config.provider_name.clone(),
                status: status.as_u16(),
                message: error_text,
            });
        }

        response.json::<ChatCompletionsResponse>().await.map_err(|e| {
            LlmError::InvalidResponse(format!(
                "Failed to parse {} Chat Completions API response: {}",
                self.config.provider_name, e
            ))
        })
    }
}

#[async_trait]
impl LLMProvider for OpenAICompatibleProvider {
    async fn generate_chat(
        &self,
        messages: &[Message],
        config: &GenerationConfig,
    ) -> LLMResult<LLMResponse> {
        let response = self.send_request(messages, config).await?;

        // A response without choices or content is a missing completion, not a failure
        let choice = response.choices.into_iter().next();
        let finish_reason = choice.as_ref().and_then(|c| c.finish_reason.clone());
        let content = choice.and_then(|c| c.message.content);

        Ok(LLMResponse {
            content,
            total_tokens: response.usage.as_ref().map(|u| u.total_tokens),
            prompt_tokens: response.usage.as_ref().map(|u| u.prompt_tokens),
            completion_tokens: response.usage.as_ref().map(|u| u.completion_tokens),
            finish_reason,
            model: response.model.unwrap_or_else(|| self.config.model.clone()),
        })
    }

    fn provider_name(&self) -> &str {
        &self.config.provider_name
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

// API request/response types for Chat Completions API

#[derive(Debug, Serialize)]
struct ChatCompletionsRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionsResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
    total_tokens: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ollama_config() {
        let config = OpenAICompatibleConfig::ollama("http://localhost:11434/", "codellama:7b".into());
        assert_eq!(config.base_url, "http://localhost:11434/v1");
        assert_eq!(config.provider_name, "ollama");
        assert_eq!(config.max_retries, 0);
    }

    #[test]
    fn test_request_carries_sampling_parameters() {
        let provider = OpenAICompatibleProvider::new(OpenAICompatibleConfig::default()).unwrap();
        let generation = GenerationConfig {
            temperature: 0.3,
            max_tokens: Some(2048),
            seed: Some(42),
            ..Default::default()
        };
        let request = provider.build_request(
            &[Message::system("be brief"), Message::user("explain")],
            &generation,
        );

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "codellama:7b");
        assert_eq!(json["seed"], 42);
        assert_eq!(json["max_tokens"], 2048);
        assert_eq!(json["stream"], false);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "explain");
        assert!(json.get("top_p").is_none());
        assert!(json.get("stop").is_none());
    }

    #[test]
    fn test_response_without_content_parses() {
        let body = r#"{
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "model": "codellama:7b",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": null}, "finish_reason": "stop"}]
        }"#;
        let parsed: ChatCompletionsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.choices.len(), 1);
        assert!(parsed.choices[0].message.content.is_none());
        assert!(parsed.usage.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_an_error() {
        let config = OpenAICompatibleConfig {
            // Port 9 (discard) on localhost is expected to refuse connections
            base_url: "http://127.0.0.1:9/v1".to_string(),
            timeout_secs: 5,
            ..Default::default()
        };
        let provider = OpenAICompatibleProvider::new(config).unwrap();
        let result = provider
            .generate_chat(&[Message::user("hello")], &GenerationConfig::default())
            .await;
        assert!(matches!(result, Err(LlmError::Http(_))));
    }
}

use crate::llm_provider::*;
use crate::openai_compatible_provider::{OpenAICompatibleConfig, OpenAICompatibleProvider};
use explainer_core::BackendSettings;
use std::sync::Arc;

/// Factory for creating LLM providers from resolved backend settings
pub struct LLMProviderFactory;

impl LLMProviderFactory {
    /// Create the Ollama provider behind its OpenAI-compatible `/v1` endpoint
    pub fn create_from_settings(settings: &BackendSettings) -> LLMResult<Arc<dyn LLMProvider>> {
        let mut config = OpenAICompatibleConfig::ollama(&settings.base_url, settings.model.clone());
        config.timeout_secs = settings.timeout_secs;
        config.api_key = Some(settings.api_key.clone()).filter(|key| !key.is_empty());

        tracing::debug!(
            base_url = %config.base_url,
            model = %config.model,
            timeout_secs = config.timeout_secs,
            "Creating LLM provider"
        );

        Ok(Arc::new(OpenAICompatibleProvider::new(config)?))
    }

    /// Generation parameters shared by every role
    pub fn generation_config(settings: &BackendSettings) -> GenerationConfig {
        GenerationConfig {
            temperature: settings.temperature,
            max_tokens: Some(settings.max_tokens),
            seed: Some(settings.cache_seed),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> BackendSettings {
        BackendSettings {
            base_url: "http://localhost:11434".to_string(),
            model: "codellama:7b".to_string(),
            api_key: "sk-xxx".to_string(),
            temperature: 0.3,
            max_tokens: 2048,
            cache_seed: 42,
            timeout_secs: 30,
        }
    }

    #[test]
    fn test_provider_creation() {
        let provider = LLMProviderFactory::create_from_settings(&settings()).unwrap();
        assert_eq!(provider.provider_name(), "ollama");
        assert_eq!(provider.model_name(), "codellama:7b");
    }

    #[test]
    fn test_generation_config_uses_seed() {
        let generation = LLMProviderFactory::generation_config(&settings());
        assert_eq!(generation.seed, Some(42));
        assert_eq!(generation.max_tokens, Some(2048));
        assert!((generation.temperature - 0.3).abs() < f32::EPSILON);
    }
}

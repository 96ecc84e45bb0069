use crate::{ApiError, ApiResult};
use explainer_ai::{ExplainerService, LLMProvider, PipelineError};
use explainer_core::ConfigManager;
use std::sync::Arc;
use tracing::warn;

/// Shared per-process state. The pipeline is built once; it stays `None`
/// while the backend settings are missing.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ConfigManager>,
    service: Option<Arc<ExplainerService>>,
}

impl AppState {
    pub fn new(config: Arc<ConfigManager>) -> ApiResult<Self> {
        let service = ExplainerService::from_config(&config);
        Self::assemble(config, service)
    }

    /// Build the state around an injected backend
    pub fn with_provider(
        config: Arc<ConfigManager>,
        provider: Arc<dyn LLMProvider>,
    ) -> ApiResult<Self> {
        let service = ExplainerService::from_config_with_provider(&config, provider);
        Self::assemble(config, service)
    }

    fn assemble(
        config: Arc<ConfigManager>,
        service: Result<ExplainerService, PipelineError>,
    ) -> ApiResult<Self> {
        let service = match service {
            Ok(service) => Some(Arc::new(service)),
            Err(PipelineError::Config(e)) => {
                warn!(error = %e, "Explainer unavailable until backend settings are provided");
                None
            }
            Err(e) => return Err(ApiError::Internal(e.to_string())),
        };

        Ok(Self { config, service })
    }

    /// The pipeline, or the configuration error explaining why there is none
    pub fn explainer(&self) -> ApiResult<Arc<ExplainerService>> {
        match &self.service {
            Some(service) => Ok(service.clone()),
            None => match self.config.backend_settings() {
                Err(e) => Err(e.into()),
                Ok(_) => Err(ApiError::Internal(
                    "explainer service not initialised".to_string(),
                )),
            },
        }
    }
}

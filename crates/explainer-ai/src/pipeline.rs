// ABOUTME: Two-stage review → explain pipeline with fallback and soft-failure policy
// ABOUTME: `explain` always resolves to a caller-facing string

use crate::agent::{RoleAgent, RoleDefinition};
use crate::coordinator::{ChatExchange, Coordinator};
use crate::llm_factory::LLMProviderFactory;
use crate::llm_provider::{LLMProvider, LlmError};
use crate::prompts::{build_explanation_prompt, build_review_prompt};
use explainer_core::{BackendSettings, ConfigError, ConfigManager, PipelineConfig};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{error, info, warn};

/// Stage 1 substitute when the reviewer produces nothing usable
pub const FALLBACK_CLARIFICATION: &str = "Code appears straightforward.";

/// Returned when the explainer produced no message at all
pub const NO_EXPLANATION_APOLOGY: &str =
    "I apologize, but I couldn't generate an explanation. Please try again.";

/// Returned when the explainer produced a message with no content
pub const EMPTY_EXPLANATION_APOLOGY: &str =
    "I apologize, but I couldn't generate a meaningful explanation. Please try again.";

/// Failures that stop the pipeline before an explanation exists
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("failed to initialise backend client: {0}")]
    Backend(#[from] LlmError),

    #[error("{role} backend call failed: {message}")]
    StageFailed { role: String, message: String },

    #[error("{0}")]
    Panicked(String),
}

/// What a stage produced for its role
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Produced(String),
    /// A message exists but is blank after trimming
    Empty,
    /// No message was generated for the role
    Absent,
}

/// Result of one stage, with the backend failure that closed it (if any)
#[derive(Debug, Clone)]
pub struct StageResult {
    pub role: String,
    pub outcome: StageOutcome,
    pub failure: Option<String>,
}

impl StageResult {
    fn from_exchange(exchange: &ChatExchange, role: &str) -> Self {
        let outcome = match exchange.last_message(role) {
            None => StageOutcome::Absent,
            Some(text) if text.trim().is_empty() => StageOutcome::Empty,
            Some(text) => StageOutcome::Produced(text.to_string()),
        };

        Self {
            role: role.to_string(),
            outcome,
            failure: exchange.failure().map(str::to_string),
        }
    }

    /// Produced text, treating empty content as absent
    pub fn text(&self) -> Option<&str> {
        match &self.outcome {
            StageOutcome::Produced(text) => Some(text),
            StageOutcome::Empty | StageOutcome::Absent => None,
        }
    }
}

/// Final result of a pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExplanationOutcome {
    Explained(String),
    NoExplanation,
    EmptyExplanation,
    Failed(String),
}

impl ExplanationOutcome {
    pub fn is_explained(&self) -> bool {
        matches!(self, ExplanationOutcome::Explained(_))
    }

    /// The single string handed back to the caller
    pub fn into_text(self) -> String {
        match self {
            ExplanationOutcome::Explained(text) => text,
            ExplanationOutcome::NoExplanation => NO_EXPLANATION_APOLOGY.to_string(),
            ExplanationOutcome::EmptyExplanation => EMPTY_EXPLANATION_APOLOGY.to_string(),
            ExplanationOutcome::Failed(reason) => describe_failure(&reason),
        }
    }
}

/// Descriptive error string embedding the failure's message
pub fn describe_failure(reason: &str) -> String {
    format!(
        "An error occurred while analyzing the code: {}. Please try again or check if the code is properly formatted.",
        reason
    )
}

/// Service explaining code snippets with a reviewer and an explainer role
pub struct ExplainerService {
    reviewer: RoleAgent,
    explainer: RoleAgent,
    coordinator: Coordinator,
}

impl ExplainerService {
    /// Build the service around an already constructed backend
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        settings: &BackendSettings,
        pipeline: &PipelineConfig,
    ) -> Self {
        let generation = LLMProviderFactory::generation_config(settings);
        let timeout = Duration::from_secs(settings.timeout_secs);

        Self {
            reviewer: RoleAgent::new(
                RoleDefinition::reviewer(),
                provider.clone(),
                generation.clone(),
                timeout,
            ),
            explainer: RoleAgent::new(RoleDefinition::explainer(), provider, generation, timeout),
            coordinator: Coordinator::new(pipeline),
        }
    }

    /// Build the service from configuration. Missing settings fail here,
    /// before any backend client exists.
    pub fn from_config(manager: &ConfigManager) -> Result<Self, PipelineError> {
        let settings = manager.backend_settings()?;
        let provider = LLMProviderFactory::create_from_settings(&settings)?;
        Ok(Self::new(provider, &settings, &manager.config().pipeline))
    }

    /// Like [`ExplainerService::from_config`] with an injected backend
    pub fn from_config_with_provider(
        manager: &ConfigManager,
        provider: Arc<dyn LLMProvider>,
    ) -> Result<Self, PipelineError> {
        let settings = manager.backend_settings()?;
        Ok(Self::new(provider, &settings, &manager.config().pipeline))
    }

    /// Replace the coordinator, e.g. to plug in another termination policy
    pub fn with_coordinator(mut self, coordinator: Coordinator) -> Self {
        self.coordinator = coordinator;
        self
    }

    /// Explain `snippet`. Always returns a non-empty string.
    pub async fn explain(&self, snippet: &str) -> String {
        self.explain_detailed(snippet).await.into_text()
    }

    /// Explain `snippet`, keeping the outcome kind visible to the caller.
    /// Errors and panics inside the pipeline become `Failed`.
    pub async fn explain_detailed(&self, snippet: &str) -> ExplanationOutcome {
        match AssertUnwindSafe(self.run(snippet)).catch_unwind().await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                error!(error = %e, "Error during code explanation");
                ExplanationOutcome::Failed(e.to_string())
            }
            Err(payload) => {
                let e = PipelineError::Panicked(panic_message(payload.as_ref()));
                error!(error = %e, "Code explanation panicked");
                ExplanationOutcome::Failed(e.to_string())
            }
        }
    }

    async fn run(&self, snippet: &str) -> Result<ExplanationOutcome, PipelineError> {
        let start = Instant::now();
        info!("Starting code explanation process");

        let formatted_code = snippet.trim();
        info!(snippet_chars = formatted_code.len(), "Code snippet received");

        // Step 1: clarification points
        info!("Requesting clarification points");
        let review = self.run_stage(&self.reviewer, build_review_prompt(formatted_code)).await;
        let clarification = match review.text() {
            Some(text) => text.to_string(),
            None => {
                warn!(
                    outcome = ?review.outcome,
                    failure = ?review.failure,
                    "No response received from reviewer, using fallback"
                );
                FALLBACK_CLARIFICATION.to_string()
            }
        };
        info!("Received clarification points");

        // Step 2: explanation
        info!("Requesting explanation");
        let explanation = self
            .run_stage(
                &self.explainer,
                build_explanation_prompt(formatted_code, &clarification),
            )
            .await;

        let outcome = match explanation.outcome {
            StageOutcome::Produced(text) => {
                info!(
                    duration = ?start.elapsed(),
                    "Successfully generated explanation"
                );
                ExplanationOutcome::Explained(text.trim().to_string())
            }
            StageOutcome::Empty => {
                warn!("Empty explanation received");
                ExplanationOutcome::EmptyExplanation
            }
            StageOutcome::Absent => match explanation.failure {
                Some(message) => {
                    return Err(PipelineError::StageFailed {
                        role: explanation.role,
                        message,
                    })
                }
                None => {
                    warn!("No response received from explainer");
                    ExplanationOutcome::NoExplanation
                }
            },
        };

        Ok(outcome)
    }

    async fn run_stage(&self, agent: &RoleAgent, prompt: String) -> StageResult {
        let exchange = self.coordinator.run(agent, prompt).await;
        StageResult::from_exchange(&exchange, agent.name())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "pipeline panicked".to_string()
    }
}

use crate::{ApiDoc, ApiError, ApiResult, AppState};
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use utoipa::{OpenApi, ToSchema};

pub const EMPTY_SNIPPET_MESSAGE: &str = "Code snippet cannot be empty.";

const MISCONFIGURED_MESSAGE: &str =
    "Some environment variables are missing. Please check .env file.";

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct ExplainRequest {
    /// Python source to explain
    pub code: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct ExplainResponse {
    pub explanation: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct ConfigStatusDto {
    pub ollama_url: bool,
    pub model_name: bool,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `healthy` or `misconfigured`
    pub status: String,
    pub config: ConfigStatusDto,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Serve the browser front end
pub async fn index(State(state): State<AppState>) -> Response {
    let path = state.config.config().server.static_dir.join("index.html");

    match tokio::fs::read_to_string(&path).await {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            let message = "Error: index.html not found. Make sure static/index.html exists.";
            error!(path = %path.display(), error = %e, "{}", message);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(format!("<h1>{}</h1>", message)),
            )
                .into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/explain/",
    tag = "explainer",
    request_body = ExplainRequest,
    responses(
        (status = 200, description = "Explanation, apology or descriptive error text", body = ExplainResponse),
        (status = 400, description = "Empty code snippet"),
        (status = 500, description = "Backend settings missing")
    )
)]
pub async fn explain(
    State(state): State<AppState>,
    Json(request): Json<ExplainRequest>,
) -> ApiResult<Json<ExplainResponse>> {
    let service = state.explainer().map_err(|e| {
        error!(error = %e, "Rejecting explanation request");
        e
    })?;

    if request.code.trim().is_empty() {
        return Err(ApiError::BadRequest(EMPTY_SNIPPET_MESSAGE.to_string()));
    }

    info!(chars = request.code.len(), "Explanation requested");
    let explanation = service.explain(&request.code).await;

    Ok(Json(ExplainResponse { explanation }))
}

/// Reports whether the backend settings are present. Never contacts the backend.
#[utoipa::path(
    get,
    path = "/health",
    tag = "explainer",
    responses(
        (status = 200, description = "Configuration health", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = state.config.status();
    let healthy = status.is_complete();

    Json(HealthResponse {
        status: if healthy { "healthy" } else { "misconfigured" }.to_string(),
        config: ConfigStatusDto {
            ollama_url: status.ollama_url,
            model_name: status.model_name,
        },
        message: (!healthy).then(|| MISCONFIGURED_MESSAGE.to_string()),
    })
}

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

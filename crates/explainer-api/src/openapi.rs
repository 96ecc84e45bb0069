use crate::handlers;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Code Explainer",
        description = "Explains Python code snippets with a reviewer and an explainer role"
    ),
    paths(handlers::explain, handlers::health),
    components(schemas(
        handlers::ExplainRequest,
        handlers::ExplainResponse,
        handlers::HealthResponse,
        handlers::ConfigStatusDto,
    )),
    tags((name = "explainer", description = "Code explanation API"))
)]
pub struct ApiDoc;

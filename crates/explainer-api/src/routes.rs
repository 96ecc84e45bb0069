use crate::{handlers, AppState};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

pub fn create_router(state: AppState) -> Router {
    let static_dir = state.config.config().server.static_dir.clone();

    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/explain/", post(handlers::explain))
        .route("/explain", post(handlers::explain))
        .route("/openapi.json", get(handlers::openapi_json))
        .nest_service("/static", ServeDir::new(static_dir))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

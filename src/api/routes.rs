use crate::api::{handlers, AppState};
use crate::config::ServerConfig;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

/// Build the HTTP router
pub fn build_router(state: AppState, server: &ServerConfig) -> Router {
    let router = Router::new()
        // Browser form
        .route("/", get(handlers::home))
        .nest_service("/static", ServeDir::new(&server.static_dir))
        // Prediction API
        .route("/predict", post(handlers::predict))
        .route("/feature_ranges", get(handlers::feature_ranges))
        // Operations
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        );

    if server.cors_permissive {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

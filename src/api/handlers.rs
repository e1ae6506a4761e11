use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::metrics::{PREDICTIONS_TOTAL, PREDICTION_DURATION_SECONDS, PREDICTION_FAILURES_TOTAL};
use crate::models::FeatureRanges;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;

/// Home page with the diagnosis form
pub async fn home(State(state): State<AppState>) -> Html<String> {
    Html(state.home_page.to_string())
}

/// Score one patient record.
///
/// Every failure on this path is answered with 400 and the error text.
pub async fn predict(
    State(state): State<AppState>,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Response {
    let timer = PREDICTION_DURATION_SECONDS.start_timer();

    let outcome = body
        .map_err(|rejection| AppError::Validation(rejection.body_text()))
        .and_then(|Json(record)| state.service.predict(&record));

    match outcome {
        Ok(response) => {
            timer.observe_duration();
            PREDICTIONS_TOTAL
                .with_label_values(&[&response.diagnosis, &response.severity.to_string()])
                .inc();
            Json(response).into_response()
        }
        Err(err) => {
            timer.stop_and_discard();
            PREDICTION_FAILURES_TOTAL
                .with_label_values(&[err.error_code()])
                .inc();
            (StatusCode::BAD_REQUEST, err).into_response()
        }
    }
}

/// Static descriptions of every input field
pub async fn feature_ranges() -> Json<FeatureRanges> {
    Json(FeatureRanges::current())
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model_run_id: state.service.run_id().to_string(),
    }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub model_run_id: String,
}

/// Prometheus metrics endpoint
///
/// Returns metrics in Prometheus text exposition format
pub async fn metrics(State(state): State<AppState>) -> (StatusCode, String) {
    if !state.metrics_enabled {
        return (StatusCode::NOT_FOUND, "metrics disabled\n".to_string());
    }
    (StatusCode::OK, crate::metrics::gather_metrics())
}

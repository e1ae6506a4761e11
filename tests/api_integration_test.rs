/// Integration tests for the HTTP API
///
/// Requests are driven through the router with `oneshot`, against a model
/// trained on the synthetic dataset.
mod common;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use dx_predictor::api::{build_router, AppState};
use dx_predictor::config::ServerConfig;
use serde_json::{json, Value};
use std::sync::{Arc, OnceLock};
use tower::ServiceExt;

fn app() -> Router {
    static SERVICE: OnceLock<Arc<dx_predictor::ml::DiagnosisService>> = OnceLock::new();
    let service = SERVICE
        .get_or_init(|| Arc::new(common::trained_service()))
        .clone();
    build_router(AppState::new(service), &ServerConfig::default())
}

async fn post_json(uri: &str, body: String) -> (StatusCode, Value) {
    let response = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn get(uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

#[tokio::test]
async fn test_predict_full_record() {
    let record = Value::Object(common::typical_request("Malaria"));
    let (status, body) = post_json("/predict", record.to_string()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    for key in ["diagnosis", "emoji", "color", "description", "confidence", "severity"] {
        assert!(body.get(key).is_some(), "missing {}", key);
    }

    let probabilities = body["all_probabilities"].as_array().unwrap();
    assert_eq!(probabilities.len(), 5);
    let total: f64 = probabilities
        .iter()
        .map(|p| p["probability"].as_f64().unwrap())
        .sum();
    assert!((total - 100.0).abs() < 0.05, "total {}", total);

    // ranked highest first, top entry is the diagnosis
    let values: Vec<f64> = probabilities
        .iter()
        .map(|p| p["probability"].as_f64().unwrap())
        .collect();
    assert!(values.windows(2).all(|w| w[0] >= w[1]));
    assert_eq!(probabilities[0]["probability"], body["confidence"]);

    let severity = body["severity"].as_str().unwrap();
    assert!(["High", "Medium", "Low"].contains(&severity));
}

#[tokio::test]
async fn test_predict_unknown_gender_is_400() {
    let mut record = common::typical_request("Dengue");
    record.insert("gender".into(), json!("Other"));
    let (status, body) = post_json("/predict", Value::Object(record).to_string()).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("Other"));
}

#[tokio::test]
async fn test_predict_missing_gender_is_400() {
    let (status, body) = post_json("/predict", json!({"fever": 2}).to_string()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_predict_with_only_gender_defaults_to_zero() {
    let (status, body) = post_json("/predict", json!({"gender": "Male"}).to_string()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn test_predict_accepts_numeric_strings() {
    let mut record = common::typical_request("Influenza");
    record.insert("age".into(), json!("52"));
    record.insert("temperature_c".into(), json!("38.6"));
    let (status, _) = post_json("/predict", Value::Object(record).to_string()).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_predict_rejects_bad_input() {
    let (status, body) = post_json("/predict", "{not json".to_string()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, body) = post_json("/predict", "[1, 2, 3]".to_string()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let mut record = common::typical_request("COVID-19");
    record.insert("fever".into(), json!("high"));
    let (status, body) = post_json("/predict", Value::Object(record).to_string()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("could not convert"));
}

#[tokio::test]
async fn test_predict_rejects_non_finite_strings() {
    for raw in ["inf", "-infinity", "NaN"] {
        let mut record = common::typical_request("Dengue");
        record.insert("temperature_c".into(), json!(raw));
        let (status, body) = post_json("/predict", Value::Object(record).to_string()).await;

        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", raw);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("temperature_c"));
    }
}

#[tokio::test]
async fn test_feature_ranges_is_stable() {
    let (status, first) = get("/feature_ranges").await;
    let (_, second) = get("/feature_ranges").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(first, second);

    let body: Value = serde_json::from_slice(&first).unwrap();
    assert_eq!(body["symptoms"]["fever"]["max"], 3);
    assert_eq!(body["vitals"]["gender"]["options"], json!(["Male", "Female"]));
    assert_eq!(body["lab_tests"].as_object().unwrap().len(), 5);
}

#[tokio::test]
async fn test_home_page_renders() {
    let (status, body) = get("/").await;
    assert_eq!(status, StatusCode::OK);

    let html = String::from_utf8(body).unwrap();
    assert!(html.contains("diagnosisForm"));
    assert!(html.contains("Loss of Smell"));
}

#[tokio::test]
async fn test_health_reports_model_run() {
    let (status, body) = get("/health").await;
    assert_eq!(status, StatusCode::OK);

    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["status"], "healthy");
    assert!(!body["model_run_id"].as_str().unwrap().is_empty());
}

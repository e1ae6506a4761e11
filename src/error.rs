use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed request payloads and out-of-type field values
    #[error("{0}")]
    Validation(String),

    /// A categorical value the fitted encoder has never seen
    #[error("y contains previously unseen labels: '{value}' (field '{field}')")]
    UnknownCategory { field: String, value: String },

    /// Missing, corrupt or mismatched trained artifacts
    #[error("Artifact error: {0}")]
    Artifact(String),

    /// Dataset loading and parsing errors
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Model fitting and inference errors
    #[error("Model error: {0}")]
    Model(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get HTTP status code for this error
    ///
    /// Everything that can go wrong while answering a prediction is a
    /// client-visible 400; only startup-class failures map to 500.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::UnknownCategory { .. } => StatusCode::BAD_REQUEST,
            AppError::Model(_) => StatusCode::BAD_REQUEST,
            AppError::Serialization(_) => StatusCode::BAD_REQUEST,
            AppError::Artifact(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Dataset(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code string
    pub fn error_code(&self) -> &str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::UnknownCategory { .. } => "UNKNOWN_CATEGORY",
            AppError::Artifact(_) => "ARTIFACT_ERROR",
            AppError::Dataset(_) => "DATASET_ERROR",
            AppError::Model(_) => "MODEL_ERROR",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Convert AppError to HTTP response
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();

        tracing::warn!(
            error_code = self.error_code(),
            status_code = status.as_u16(),
            message = %message,
            "Request error"
        );

        let body = Json(json!({
            "success": false,
            "error": message,
        }));

        (status, body).into_response()
    }
}

/// Conversion from serde_json::Error
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Conversion from bincode::Error
impl From<bincode::Error> for AppError {
    fn from(err: bincode::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Conversion from config::ConfigError
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

/// Conversion from smartcore::error::Failed
impl From<smartcore::error::Failed> for AppError {
    fn from(err: smartcore::error::Failed) -> Self {
        AppError::Model(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;

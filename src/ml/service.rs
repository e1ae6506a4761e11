use crate::error::{AppError, Result};
use crate::ml::artifacts::ModelArtifacts;
use crate::ml::forest::argmax;
use crate::models::{FeatureDict, PredictionResponse, GENDER_FIELD};
use ndarray::Array2;
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{debug, info};

/// Diagnosis prediction service
///
/// Holds one immutable artifact set; shared across requests behind an `Arc`.
#[derive(Debug)]
pub struct DiagnosisService {
    artifacts: ModelArtifacts,
}

impl DiagnosisService {
    /// Load artifacts from disk
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let artifacts = ModelArtifacts::load(dir)?;
        info!(
            dir = %dir.display(),
            run_id = %artifacts.run_id,
            classes = ?artifacts.diagnosis_encoder.classes(),
            "🧠 Diagnosis model loaded"
        );
        Self::from_artifacts(artifacts)
    }

    /// Wrap an in-memory artifact set
    pub fn from_artifacts(artifacts: ModelArtifacts) -> Result<Self> {
        artifacts.validate()?;
        Ok(Self { artifacts })
    }

    pub fn run_id(&self) -> &str {
        &self.artifacts.run_id
    }

    pub fn feature_dict(&self) -> &FeatureDict {
        &self.artifacts.feature_dict
    }

    /// Diagnosis labels in encoder order
    pub fn classes(&self) -> &[String] {
        self.artifacts.diagnosis_encoder.classes()
    }

    /// Build the unscaled model input for one request record.
    ///
    /// Order comes from the persisted feature dictionary. Absent fields
    /// become 0; `gender` is required and must be a category seen in
    /// training.
    pub fn feature_vector(&self, record: &Map<String, Value>) -> Result<Vec<f64>> {
        let gender = match record.get(GENDER_FIELD) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => {
                return Err(AppError::Validation(format!(
                    "missing required field '{}'",
                    GENDER_FIELD
                )))
            }
            Some(other) => other.to_string(),
        };
        let gender_code = self.artifacts.gender_encoder.transform(&gender)?;

        self.artifacts
            .feature_dict
            .build_vector(gender_code, |name| match record.get(name) {
                None => Ok(0.0),
                Some(value) => numeric_value(name, value),
            })
    }

    /// Answer one prediction request
    pub fn predict(&self, body: &Value) -> Result<PredictionResponse> {
        let record = body.as_object().ok_or_else(|| {
            AppError::Validation("request body must be a JSON object".to_string())
        })?;

        let features = self.feature_vector(record)?;
        let n_features = features.len();
        let x = Array2::from_shape_vec((1, n_features), features)
            .map_err(|e| AppError::Internal(e.to_string()))?;
        let scaled = self.artifacts.scaler.transform(&x)?;
        let proba = self.artifacts.model.predict_proba(&scaled)?;

        let row = proba.row(0);
        let predicted = argmax(row.iter().copied());
        let diagnosis = self.artifacts.diagnosis_encoder.inverse_transform(predicted)?;

        let percentages: Vec<(String, f64)> = self
            .classes()
            .iter()
            .zip(row.iter())
            .map(|(label, p)| (label.clone(), p * 100.0))
            .collect();

        let response = PredictionResponse::from_percentages(diagnosis, &percentages);
        debug!(
            diagnosis = %response.diagnosis,
            confidence = response.confidence,
            severity = %response.severity,
            "Prediction computed"
        );

        Ok(response)
    }
}

/// Coerce a JSON field to a float: numbers, numeric strings and booleans
fn numeric_value(name: &str, value: &Value) -> Result<f64> {
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| {
            AppError::Validation(format!("field '{}': {} is not a finite number", name, n))
        }),
        Value::String(s) => {
            let parsed = s.trim().parse::<f64>().map_err(|_| {
                AppError::Validation(format!(
                    "could not convert string to float: '{}' (field '{}')",
                    s, name
                ))
            })?;
            if !parsed.is_finite() {
                return Err(AppError::Validation(format!(
                    "Input contains infinity or NaN: '{}' (field '{}')",
                    s, name
                )));
            }
            Ok(parsed)
        }
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Null | Value::Array(_) | Value::Object(_) => Err(AppError::Validation(format!(
            "field '{}' must be a number, got {}",
            name, value
        ))),
    }
}

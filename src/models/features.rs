use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Column holding the categorical gender value in datasets and requests
pub const GENDER_FIELD: &str = "gender";

/// Feature slot that receives the encoded gender
pub const GENDER_FEATURE: &str = "gender_encoded";

/// Column holding the diagnosis label in datasets
pub const TARGET_FIELD: &str = "diagnosis";

pub const SYMPTOM_FEATURES: [&str; 11] = [
    "fever",
    "cough",
    "fatigue",
    "headache",
    "muscle_pain",
    "nausea",
    "vomiting",
    "diarrhea",
    "skin_rash",
    "loss_smell",
    "loss_taste",
];

pub const VITAL_FEATURES: [&str; 5] = [
    "systolic_bp",
    "diastolic_bp",
    "heart_rate",
    "temperature_c",
    "oxygen_saturation",
];

pub const LAB_FEATURES: [&str; 5] = [
    "wbc_count",
    "hemoglobin",
    "platelet_count",
    "crp_level",
    "glucose_level",
];

/// Ordered feature layout shared by training and serving.
///
/// The model only knows positions, so `all_features` is persisted with the
/// trained artifacts and every feature vector is assembled by walking it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureDict {
    pub symptoms: Vec<String>,
    pub vitals: Vec<String>,
    pub lab_tests: Vec<String>,
    pub all_features: Vec<String>,
}

impl FeatureDict {
    /// The layout used for training: symptoms, vitals, labs, then age and gender.
    pub fn standard() -> Self {
        let symptoms: Vec<String> = SYMPTOM_FEATURES.iter().map(|s| s.to_string()).collect();
        let vitals: Vec<String> = VITAL_FEATURES.iter().map(|s| s.to_string()).collect();
        let lab_tests: Vec<String> = LAB_FEATURES.iter().map(|s| s.to_string()).collect();

        let mut all_features = Vec::with_capacity(symptoms.len() + vitals.len() + lab_tests.len() + 2);
        all_features.extend(symptoms.iter().cloned());
        all_features.extend(vitals.iter().cloned());
        all_features.extend(lab_tests.iter().cloned());
        all_features.push("age".to_string());
        all_features.push(GENDER_FEATURE.to_string());

        Self {
            symptoms,
            vitals,
            lab_tests,
            all_features,
        }
    }

    /// Number of model inputs
    pub fn len(&self) -> usize {
        self.all_features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all_features.is_empty()
    }

    /// Position of a feature in the model input
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.all_features.iter().position(|f| f == name)
    }

    /// Check the layout is usable: non-empty, unique names, gender slot present.
    pub fn validate(&self) -> Result<()> {
        if self.all_features.is_empty() {
            return Err(AppError::Artifact("feature dictionary is empty".to_string()));
        }

        let mut seen = HashSet::new();
        for name in &self.all_features {
            if !seen.insert(name.as_str()) {
                return Err(AppError::Artifact(format!(
                    "feature '{}' appears more than once",
                    name
                )));
            }
        }

        if self.index_of(GENDER_FEATURE).is_none() {
            return Err(AppError::Artifact(format!(
                "feature dictionary has no '{}' slot",
                GENDER_FEATURE
            )));
        }

        Ok(())
    }

    /// Assemble one feature vector in model order.
    ///
    /// `lookup` is asked for every feature name except the gender slot,
    /// which always receives `gender_code`. Training and serving both go
    /// through here so their layouts cannot drift apart.
    pub fn build_vector<F>(&self, gender_code: usize, mut lookup: F) -> Result<Vec<f64>>
    where
        F: FnMut(&str) -> Result<f64>,
    {
        self.all_features
            .iter()
            .map(|name| {
                if name == GENDER_FEATURE {
                    Ok(gender_code as f64)
                } else {
                    lookup(name)
                }
            })
            .collect()
    }
}

impl Default for FeatureDict {
    fn default() -> Self {
        Self::standard()
    }
}

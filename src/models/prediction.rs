use crate::models::catalog::disease_info;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Coarse bucket derived from the top-class confidence
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, EnumString, Display)]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    /// Bucket a confidence percentage: above 70 is High, above 40 Medium.
    pub fn from_confidence(confidence_pct: f64) -> Self {
        if confidence_pct > 70.0 {
            Severity::High
        } else if confidence_pct > 40.0 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

/// One entry of the ranked probability list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassProbability {
    pub disease: String,
    pub probability: f64,
    pub emoji: String,
    pub color: String,
}

/// Body of a successful `POST /predict`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub success: bool,
    pub diagnosis: String,
    pub emoji: String,
    pub color: String,
    pub description: String,
    /// Top-class probability as a percentage, two decimals
    pub confidence: f64,
    /// Every known class, highest probability first
    pub all_probabilities: Vec<ClassProbability>,
    pub severity: Severity,
}

impl PredictionResponse {
    /// Build a response from per-class percentages.
    ///
    /// `percentages` holds `(label, pct)` for every class in encoder order;
    /// `diagnosis` is the decoded predicted label.
    pub fn from_percentages(diagnosis: &str, percentages: &[(String, f64)]) -> Self {
        let top = percentages
            .iter()
            .find(|(label, _)| label == diagnosis)
            .map(|(_, pct)| *pct)
            .unwrap_or(0.0);

        let mut ranked: Vec<&(String, f64)> = percentages.iter().collect();
        // Stable sort keeps encoder order among ties
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let info = disease_info(diagnosis);

        Self {
            success: true,
            diagnosis: diagnosis.to_string(),
            emoji: info.emoji.to_string(),
            color: info.color.to_string(),
            description: info.description.to_string(),
            confidence: round2(top),
            all_probabilities: ranked
                .into_iter()
                .map(|(label, pct)| {
                    let info = disease_info(label);
                    ClassProbability {
                        disease: label.clone(),
                        probability: round2(*pct),
                        emoji: info.emoji.to_string(),
                        color: info.color.to_string(),
                    }
                })
                .collect(),
            severity: Severity::from_confidence(top),
        }
    }
}

/// Round to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

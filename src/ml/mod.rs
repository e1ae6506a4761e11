//! Machine learning pipeline for diagnosis prediction
//!
//! This module provides:
//! - CSV dataset loading and stratified splitting
//! - Label encoding and standard scaling
//! - A bagged random forest of CART trees
//! - Evaluation metrics and permutation importance
//! - Run-stamped artifact persistence
//! - The serving-side prediction service

pub mod artifacts;
pub mod dataset;
pub mod evaluation;
pub mod forest;
pub mod preprocessing;
pub mod service;
pub mod training;

pub use artifacts::{ModelArtifacts, ModelMetadata};
pub use dataset::{stratified_split, PatientDataset, PatientRecord, TrainTestSplit};
pub use evaluation::{permutation_importance, ClassMetrics, FeatureImportance, ModelMetrics};
pub use forest::{ForestParams, RandomForest};
pub use preprocessing::{LabelEncoder, StandardScaler};
pub use service::DiagnosisService;
pub use training::{TrainingPipeline, TrainingReport};

use crate::config::TrainingConfig;
use crate::error::Result;
use crate::ml::artifacts::{ModelArtifacts, ModelMetadata};
use crate::ml::dataset::{stratified_split, PatientDataset};
use crate::ml::evaluation::{permutation_importance, FeatureImportance, ModelMetrics};
use crate::ml::forest::{ForestParams, RandomForest};
use crate::ml::preprocessing::{LabelEncoder, StandardScaler};
use crate::models::{FeatureDict, GENDER_FIELD, TARGET_FIELD};
use std::path::Path;
use tracing::info;
use uuid::Uuid;

/// How many features the training report ranks
pub const TOP_FEATURES: usize = 10;

const IMPORTANCE_REPEATS: usize = 5;

/// Outcome of a training run, for printing
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub dataset_shape: (usize, usize),
    pub class_distribution: Vec<(String, usize)>,
    pub n_train: usize,
    pub n_test: usize,
    pub train_metrics: ModelMetrics,
    pub test_metrics: ModelMetrics,
    pub top_features: Vec<FeatureImportance>,
}

/// Fits encoders, scaler and forest from a labelled dataset
pub struct TrainingPipeline {
    config: TrainingConfig,
    feature_dict: FeatureDict,
}

impl TrainingPipeline {
    pub fn new(config: TrainingConfig) -> Self {
        Self {
            config,
            feature_dict: FeatureDict::standard(),
        }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Load the configured dataset and train on it
    pub fn run_from_path(&self, path: &Path) -> Result<(ModelArtifacts, TrainingReport)> {
        let dataset = PatientDataset::load_csv(path)?;
        self.run(&dataset, &path.display().to_string())
    }

    /// Train on an in-memory dataset. `source` is recorded in the metadata.
    pub fn run(
        &self,
        dataset: &PatientDataset,
        source: &str,
    ) -> Result<(ModelArtifacts, TrainingReport)> {
        self.feature_dict.validate()?;

        let dataset_shape = dataset.shape();
        let class_distribution = dataset.class_distribution();
        info!(
            rows = dataset_shape.0,
            columns = dataset_shape.1,
            classes = class_distribution.len(),
            "Dataset loaded"
        );

        let records = dataset.records();
        let gender_encoder = LabelEncoder::fit(GENDER_FIELD, records.iter().map(|r| &r.gender))?;
        let diagnosis_encoder =
            LabelEncoder::fit(TARGET_FIELD, records.iter().map(|r| &r.diagnosis))?;

        let x = dataset.feature_matrix(&self.feature_dict, &gender_encoder)?;
        let y = diagnosis_encoder.transform_all(records.iter().map(|r| &r.diagnosis))?;

        let split = stratified_split(&x, &y, self.config.test_size, self.config.random_state)?;
        info!(
            train = split.y_train.len(),
            test = split.y_test.len(),
            "Stratified split"
        );

        let scaler = StandardScaler::fit(&split.x_train)?;
        let x_train = scaler.transform(&split.x_train)?;
        let x_test = scaler.transform(&split.x_test)?;

        let params = ForestParams::from(&self.config);
        info!(
            n_estimators = params.n_estimators,
            max_depth = params.max_depth,
            "Training random forest"
        );
        let model = RandomForest::fit(
            &x_train,
            &split.y_train,
            diagnosis_encoder.n_classes(),
            params.clone(),
        )?;

        let classes = diagnosis_encoder.classes().to_vec();
        let train_metrics =
            ModelMetrics::calculate(&split.y_train, &model.predict(&x_train)?, &classes)?;
        let test_metrics =
            ModelMetrics::calculate(&split.y_test, &model.predict(&x_test)?, &classes)?;
        info!(
            train_accuracy = train_metrics.accuracy,
            test_accuracy = test_metrics.accuracy,
            "Model evaluated"
        );

        let mut top_features = permutation_importance(
            &model,
            &x_test,
            &split.y_test,
            &self.feature_dict.all_features,
            IMPORTANCE_REPEATS,
            self.config.random_state,
        )?;
        top_features.truncate(TOP_FEATURES);

        let run_id = Uuid::new_v4().to_string();
        let metadata = ModelMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            trained_at: chrono::Utc::now(),
            dataset: source.to_string(),
            n_training_samples: split.y_train.len(),
            n_test_samples: split.y_test.len(),
            n_features: self.feature_dict.len(),
            classes,
            hyperparameters: params,
            train_accuracy: train_metrics.accuracy,
            test_metrics: test_metrics.clone(),
            top_features: top_features.clone(),
        };

        let artifacts = ModelArtifacts {
            run_id,
            model,
            scaler,
            gender_encoder,
            diagnosis_encoder,
            feature_dict: self.feature_dict.clone(),
            metadata,
        };
        artifacts.validate()?;

        let report = TrainingReport {
            dataset_shape,
            class_distribution,
            n_train: split.y_train.len(),
            n_test: split.y_test.len(),
            train_metrics,
            test_metrics,
            top_features,
        };

        Ok((artifacts, report))
    }
}

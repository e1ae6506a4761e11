use crate::error::{AppError, Result};
use crate::ml::evaluation::{FeatureImportance, ModelMetrics};
use crate::ml::forest::{ForestParams, RandomForest};
use crate::ml::preprocessing::{LabelEncoder, StandardScaler};
use crate::models::FeatureDict;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::{debug, info};

pub const MODEL_FILE: &str = "model.bin";
pub const SCALER_FILE: &str = "scaler.json";
pub const GENDER_ENCODER_FILE: &str = "gender_encoder.json";
pub const DIAGNOSIS_ENCODER_FILE: &str = "diagnosis_encoder.json";
pub const FEATURE_DICT_FILE: &str = "feature_dict.json";
pub const METADATA_FILE: &str = "metadata.json";

/// Summary of the training run that produced a set of artifacts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Crate version that trained the model
    pub version: String,

    /// Training timestamp
    pub trained_at: DateTime<Utc>,

    /// Dataset the model was fitted on
    pub dataset: String,

    pub n_training_samples: usize,
    pub n_test_samples: usize,
    pub n_features: usize,

    /// Diagnosis labels in encoder order
    pub classes: Vec<String>,

    /// Forest hyperparameters
    pub hyperparameters: ForestParams,

    pub train_accuracy: f64,

    /// Held-out evaluation
    pub test_metrics: ModelMetrics,

    /// Highest permutation importances on the test split
    pub top_features: Vec<FeatureImportance>,
}

/// On-disk envelope tying every artifact file to its training run
#[derive(Deserialize)]
struct Stamped<T> {
    run_id: String,
    artifact: T,
}

#[derive(Serialize)]
struct StampedRef<'a, T> {
    run_id: &'a str,
    artifact: &'a T,
}

/// Everything the serving path needs, from a single training run
#[derive(Debug)]
pub struct ModelArtifacts {
    pub run_id: String,
    pub model: RandomForest,
    pub scaler: StandardScaler,
    pub gender_encoder: LabelEncoder,
    pub diagnosis_encoder: LabelEncoder,
    pub feature_dict: FeatureDict,
    pub metadata: ModelMetadata,
}

impl ModelArtifacts {
    /// Check the pieces fit together
    pub fn validate(&self) -> Result<()> {
        self.feature_dict.validate()?;

        let n_features = self.feature_dict.len();
        if self.scaler.n_features() != n_features {
            return Err(AppError::Artifact(format!(
                "scaler expects {} features but the feature dictionary lists {}",
                self.scaler.n_features(),
                n_features
            )));
        }
        if self.model.n_features() != n_features {
            return Err(AppError::Artifact(format!(
                "model expects {} features but the feature dictionary lists {}",
                self.model.n_features(),
                n_features
            )));
        }
        if self.model.n_classes() != self.diagnosis_encoder.n_classes() {
            return Err(AppError::Artifact(format!(
                "model predicts {} classes but the diagnosis encoder knows {}",
                self.model.n_classes(),
                self.diagnosis_encoder.n_classes()
            )));
        }

        Ok(())
    }

    /// Write every artifact into `dir`, creating it if needed
    pub fn save(&self, dir: &Path) -> Result<()> {
        self.validate()?;
        std::fs::create_dir_all(dir)?;

        let run_id = self.run_id.as_str();
        let model_file = BufWriter::new(File::create(dir.join(MODEL_FILE))?);
        bincode::serialize_into(
            model_file,
            &StampedRef {
                run_id,
                artifact: &self.model,
            },
        )?;

        write_json(dir, SCALER_FILE, run_id, &self.scaler)?;
        write_json(dir, GENDER_ENCODER_FILE, run_id, &self.gender_encoder)?;
        write_json(dir, DIAGNOSIS_ENCODER_FILE, run_id, &self.diagnosis_encoder)?;
        write_json(dir, FEATURE_DICT_FILE, run_id, &self.feature_dict)?;
        write_json(dir, METADATA_FILE, run_id, &self.metadata)?;

        info!(dir = %dir.display(), run_id, "Saved model artifacts");
        Ok(())
    }

    /// Load a complete artifact set, rejecting files from different runs
    pub fn load(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(AppError::Artifact(format!(
                "artifact directory '{}' does not exist; run `dx-train train` first",
                dir.display()
            )));
        }

        let model_path = dir.join(MODEL_FILE);
        let model_file = open_artifact(dir, MODEL_FILE)?;
        let model: Stamped<RandomForest> = bincode::deserialize_from(BufReader::new(model_file))
            .map_err(|e| {
                AppError::Artifact(format!("failed to read '{}': {}", model_path.display(), e))
            })?;

        let scaler: Stamped<StandardScaler> = read_json(dir, SCALER_FILE)?;
        let gender_encoder: Stamped<LabelEncoder> = read_json(dir, GENDER_ENCODER_FILE)?;
        let diagnosis_encoder: Stamped<LabelEncoder> = read_json(dir, DIAGNOSIS_ENCODER_FILE)?;
        let feature_dict: Stamped<FeatureDict> = read_json(dir, FEATURE_DICT_FILE)?;
        let metadata: Stamped<ModelMetadata> = read_json(dir, METADATA_FILE)?;

        let run_id = model.run_id;
        for (file, other) in [
            (SCALER_FILE, &scaler.run_id),
            (GENDER_ENCODER_FILE, &gender_encoder.run_id),
            (DIAGNOSIS_ENCODER_FILE, &diagnosis_encoder.run_id),
            (FEATURE_DICT_FILE, &feature_dict.run_id),
            (METADATA_FILE, &metadata.run_id),
        ] {
            if *other != run_id {
                return Err(AppError::Artifact(format!(
                    "'{}' belongs to run {} but '{}' belongs to run {}; retrain to get a consistent set",
                    file, other, MODEL_FILE, run_id
                )));
            }
        }

        let artifacts = Self {
            run_id,
            model: model.artifact,
            scaler: scaler.artifact,
            gender_encoder: gender_encoder.artifact,
            diagnosis_encoder: diagnosis_encoder.artifact,
            feature_dict: feature_dict.artifact,
            metadata: metadata.artifact,
        };
        artifacts.validate()?;

        debug!(
            dir = %dir.display(),
            run_id = %artifacts.run_id,
            n_features = artifacts.feature_dict.len(),
            n_classes = artifacts.diagnosis_encoder.n_classes(),
            "Loaded model artifacts"
        );

        Ok(artifacts)
    }

    /// Read only the metadata file of an artifact directory
    pub fn load_metadata(dir: &Path) -> Result<(String, ModelMetadata)> {
        let stamped: Stamped<ModelMetadata> = read_json(dir, METADATA_FILE)?;
        Ok((stamped.run_id, stamped.artifact))
    }
}

fn open_artifact(dir: &Path, name: &str) -> Result<File> {
    let path = dir.join(name);
    File::open(&path).map_err(|e| {
        AppError::Artifact(format!("cannot open '{}': {}", path.display(), e))
    })
}

fn write_json<T: Serialize>(dir: &Path, name: &str, run_id: &str, artifact: &T) -> Result<()> {
    let writer = BufWriter::new(File::create(dir.join(name))?);
    serde_json::to_writer_pretty(writer, &StampedRef { run_id, artifact })?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(dir: &Path, name: &str) -> Result<Stamped<T>> {
    let file = open_artifact(dir, name)?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| {
        AppError::Artifact(format!(
            "failed to read '{}': {}",
            dir.join(name).display(),
            e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use tempfile::TempDir;

    fn tiny_artifacts() -> ModelArtifacts {
        let feature_dict = FeatureDict::standard();
        let n = feature_dict.len();
        let mut x = Array2::zeros((8, n));
        let mut y = Vec::new();
        for i in 0..8 {
            let class = i % 2;
            x[[i, 0]] = class as f64 * 3.0;
            x[[i, 1]] = i as f64;
            y.push(class);
        }

        let params = ForestParams {
            n_estimators: 3,
            max_features: 1.0,
            min_samples_split: 2,
            min_samples_leaf: 1,
            ..ForestParams::default()
        };
        let model = RandomForest::fit(&x, &y, 2, params.clone()).unwrap();

        ModelArtifacts {
            run_id: "run-a".to_string(),
            model,
            scaler: StandardScaler::fit(&x).unwrap(),
            gender_encoder: LabelEncoder::fit("gender", ["Female", "Male"]).unwrap(),
            diagnosis_encoder: LabelEncoder::fit("diagnosis", ["Dengue", "Malaria"]).unwrap(),
            feature_dict,
            metadata: ModelMetadata {
                version: env!("CARGO_PKG_VERSION").to_string(),
                trained_at: Utc::now(),
                dataset: "inline".to_string(),
                n_training_samples: 8,
                n_test_samples: 0,
                n_features: n,
                classes: vec!["Dengue".to_string(), "Malaria".to_string()],
                hyperparameters: params,
                train_accuracy: 1.0,
                test_metrics: ModelMetrics::default(),
                top_features: Vec::new(),
            },
        }
    }

    #[test]
    fn test_save_and_load_artifact_set() {
        let dir = TempDir::new().unwrap();
        let artifacts = tiny_artifacts();
        artifacts.save(dir.path()).unwrap();

        for name in [
            MODEL_FILE,
            SCALER_FILE,
            GENDER_ENCODER_FILE,
            DIAGNOSIS_ENCODER_FILE,
            FEATURE_DICT_FILE,
            METADATA_FILE,
        ] {
            assert!(dir.path().join(name).exists(), "{} missing", name);
        }

        let loaded = ModelArtifacts::load(dir.path()).unwrap();
        assert_eq!(loaded.run_id, "run-a");
        assert_eq!(loaded.feature_dict, artifacts.feature_dict);
        assert_eq!(loaded.scaler, artifacts.scaler);
        assert_eq!(loaded.diagnosis_encoder.classes(), artifacts.diagnosis_encoder.classes());
    }

    #[test]
    fn test_missing_directory_and_file() {
        let dir = TempDir::new().unwrap();
        assert!(ModelArtifacts::load(&dir.path().join("nope")).is_err());

        tiny_artifacts().save(dir.path()).unwrap();
        std::fs::remove_file(dir.path().join(SCALER_FILE)).unwrap();
        let err = ModelArtifacts::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains(SCALER_FILE));
    }

    #[test]
    fn test_mixed_runs_are_rejected() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        tiny_artifacts().save(first.path()).unwrap();

        let mut other = tiny_artifacts();
        other.run_id = "run-b".to_string();
        other.save(second.path()).unwrap();

        std::fs::copy(
            second.path().join(GENDER_ENCODER_FILE),
            first.path().join(GENDER_ENCODER_FILE),
        )
        .unwrap();

        let err = ModelArtifacts::load(first.path()).unwrap_err();
        assert!(matches!(err, AppError::Artifact(_)));
        assert!(err.to_string().contains("run-b"));
    }

    #[test]
    fn test_corrupt_model_file() {
        let dir = TempDir::new().unwrap();
        tiny_artifacts().save(dir.path()).unwrap();
        std::fs::write(dir.path().join(MODEL_FILE), b"garbage").unwrap();
        assert!(matches!(
            ModelArtifacts::load(dir.path()),
            Err(AppError::Artifact(_))
        ));
    }

    #[test]
    fn test_validate_catches_width_mismatch() {
        let mut artifacts = tiny_artifacts();
        artifacts.scaler = StandardScaler::fit(&Array2::zeros((2, 3))).unwrap();
        assert!(artifacts.validate().is_err());
    }
}

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,

    /// Where trained artifacts live
    pub artifacts: ArtifactsConfig,

    /// Training pipeline configuration
    pub training: TrainingConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("DX_CONFIG_PATH").unwrap_or_else(|_| "config/default.toml".to_string());

        config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(&config_path).required(false))
            // Override with environment variables (prefix: DX_)
            .add_source(
                config::Environment::with_prefix("DX")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            artifacts: ArtifactsConfig::default(),
            training: TrainingConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_http_port")]
    pub port: u16,

    /// Allow any origin (the browser form is usually served from elsewhere in development)
    #[serde(default = "default_true")]
    pub cors_permissive: bool,

    /// Directory served under `/static`
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_http_port(),
            cors_permissive: true,
            static_dir: default_static_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    /// Directory holding model, scaler, encoders and feature dictionary
    #[serde(default = "default_artifacts_dir")]
    pub dir: PathBuf,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            dir: default_artifacts_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// CSV dataset, one row per patient record
    #[serde(default = "default_dataset_path")]
    pub dataset_path: PathBuf,

    /// Fraction of each class held out for evaluation
    #[serde(default = "default_test_size")]
    pub test_size: f64,

    /// Seed for splitting, bootstrapping and feature subspaces
    #[serde(default = "default_random_state")]
    pub random_state: u64,

    /// Number of trees in the forest
    #[serde(default = "default_n_estimators")]
    pub n_estimators: usize,

    /// Maximum depth of each tree
    #[serde(default = "default_max_depth")]
    pub max_depth: u16,

    /// Minimum samples required to split an internal node
    #[serde(default = "default_min_samples_split")]
    pub min_samples_split: usize,

    /// Minimum samples required at a leaf
    #[serde(default = "default_min_samples_leaf")]
    pub min_samples_leaf: usize,

    /// Fraction of features each tree sees (0.0, 1.0]
    #[serde(default = "default_max_features")]
    pub max_features: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            dataset_path: default_dataset_path(),
            test_size: default_test_size(),
            random_state: default_random_state(),
            n_estimators: default_n_estimators(),
            max_depth: default_max_depth(),
            min_samples_split: default_min_samples_split(),
            min_samples_leaf: default_min_samples_leaf(),
            max_features: default_max_features(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,

    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub prometheus_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            prometheus_enabled: true,
        }
    }
}

impl ObservabilityConfig {
    /// Install the global tracing subscriber. `RUST_LOG` wins over `log_level`.
    pub fn init_tracing(&self) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            format!("dx_predictor={0},tower_http={0}", self.log_level).into()
        });

        let registry = tracing_subscriber::registry().with(filter);
        if self.json_logs {
            registry.with(tracing_subscriber::fmt::layer().json()).init();
        } else {
            registry.with(tracing_subscriber::fmt::layer()).init();
        }
    }
}

// Default value functions
fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_http_port() -> u16 {
    5000
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_dataset_path() -> PathBuf {
    PathBuf::from("medical_symptoms_dataset.csv")
}

fn default_test_size() -> f64 {
    0.2
}

fn default_random_state() -> u64 {
    42
}

fn default_n_estimators() -> usize {
    100
}

fn default_max_depth() -> u16 {
    10
}

fn default_min_samples_split() -> usize {
    5
}

fn default_min_samples_leaf() -> usize {
    2
}

fn default_max_features() -> f64 {
    0.7
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

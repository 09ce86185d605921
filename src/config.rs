//! Layered configuration: built-in defaults, then an optional TOML file, then
//! `CHURNWATCH_` environment variables (`CHURNWATCH_SERVE__PORT=9000`).

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::monitoring::drift::DRIFT_COLUMNS;

/// Picked up from the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "churnwatch.toml";
pub const DEFAULT_MODEL_NAME: &str = "churn-prediction-mvp-lr";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),
    #[error("invalid configuration: {0}")]
    Invalid(#[from] Box<figment::Error>),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChurnConfig {
    pub data: DataConfig,
    pub training: TrainingConfig,
    pub registry: RegistryConfig,
    pub serve: ServeConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Reference dataset, used for training and as the drift baseline
    pub path: PathBuf,
    pub delimiter: char,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/WA_Fn-UseC_-Telco-Customer-Churn.csv"),
            delimiter: ',',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub model_name: String,
    pub seed: u64,
    pub holdout_fraction: f64,
    pub max_iterations: usize,
    pub tolerance: f64,
    /// Inverse L2 regularisation strength
    pub c: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL_NAME.to_string(),
            seed: 42,
            holdout_fraction: 0.2,
            max_iterations: 100,
            tolerance: 1e-8,
            c: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub root: PathBuf,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("mlruns/registry"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    pub host: String,
    pub port: u16,
    pub model_name: String,
    /// `latest`, a version number, or a stage name
    pub selector: String,
    /// Refuse to start without a model instead of serving 503s
    pub require_model: bool,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            model_name: DEFAULT_MODEL_NAME.to_string(),
            selector: "latest".to_string(),
            require_model: true,
        }
    }
}

impl ServeConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub workspace_dir: PathBuf,
    pub project_name: String,
    pub project_description: String,
    pub ks_threshold: f64,
    pub quantiles: Vec<f64>,
    pub drift_share: f64,
    /// Columns compared by `drift`; empty compares every numeric column
    pub numeric_columns: Vec<String>,
    pub sample_fraction: f64,
    pub sample_seed: u64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            workspace_dir: PathBuf::from("workspace"),
            project_name: "Telco Churn Data Quality".to_string(),
            project_description: "Telco churn monitoring".to_string(),
            ks_threshold: 0.1,
            quantiles: vec![0.25, 0.5, 0.75],
            drift_share: 0.5,
            numeric_columns: DRIFT_COLUMNS.iter().map(|c| c.to_string()).collect(),
            sample_fraction: 0.3,
            sample_seed: 42,
        }
    }
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with `CHURNWATCH_`)
/// 2. `path` if given, otherwise `churnwatch.toml` in the working directory if present
/// 3. Built-in defaults
pub fn load_config(path: Option<&Path>) -> Result<ChurnConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(ChurnConfig::default()));

    match path {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.to_path_buf()));
            }
            figment = figment.merge(Toml::file(path));
        }
        None => {
            let local = Path::new(DEFAULT_CONFIG_FILE);
            if local.exists() {
                figment = figment.merge(Toml::file(local));
            }
        }
    }

    figment = figment.merge(Env::prefixed("CHURNWATCH_").split("__"));

    figment.extract().map_err(|e| ConfigError::Invalid(Box::new(e)))
}

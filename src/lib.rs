//! Churnwatch: churn model training, versioned publishing, serving and drift monitoring
//!
//! This library cleans telco customer data, trains a logistic regression churn
//! classifier, publishes it to a versioned file-backed registry, serves
//! predictions over HTTP and compares new data batches against the reference
//! dataset for drift.

pub mod config;
pub mod data;
pub mod models;
pub mod monitoring;
pub mod persistence;
pub mod pipeline;
pub mod registry;
pub mod server;
pub mod traits;
pub mod training;

// Re-export key types for ergonomic use
pub use config::{load_config, ChurnConfig, ConfigError};
pub use data::{clean, clean_with_report, CleanedRecord, CsvSource, DataError, RawRecord, RawValue};
pub use models::logistic::LogisticRegression;
pub use traits::features::{FeatureSchema, FeatureVector};
pub use traits::model::{Classifier, ModelError};
pub use training::{EvaluationMetrics, Trainer, TrainingError};

pub use registry::{ModelArtifact, ModelRegistry, RegistryEntry, RegistryError, Selector, Stage};
pub use server::{router, PredictionResponse, PredictionService, ServingError};
pub use monitoring::{DriftMonitor, DriftReport, NumericFrame, Workspace};
pub use pipeline::{run_drift_check, run_flow, run_training, PipelineError, PublishedModel, TrainingPipeline, TrainingTask};

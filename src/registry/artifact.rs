use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::logistic::LogisticRegression;
use crate::traits::features::{ColumnSpec, FeatureSchema, FeatureVector};
use crate::traits::model::{Classifier, ModelError};
use crate::training::metrics::EvaluationMetrics;

/// Expected inputs and produced output of a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSignature {
    pub inputs: Vec<ColumnSpec>,
    pub output: ColumnSpec,
}

impl ModelSignature {
    pub fn input_schema(&self) -> FeatureSchema {
        FeatureSchema::new(self.inputs.clone())
    }
}

/// How the model was trained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingParams {
    pub model_type: String,
    pub features: Vec<String>,
    pub seed: u64,
    pub holdout_fraction: f64,
    pub c: f64,
    pub max_iterations: usize,
    pub n_iterations: usize,
}

/// Sizes of the data the artifact was trained and evaluated on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub rows: usize,
    pub train_rows: usize,
    pub holdout_rows: usize,
    pub train_positives: usize,
    pub holdout_positives: usize,
}

/// A fitted model together with everything needed to serve and audit it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub model: LogisticRegression,
    pub metrics: EvaluationMetrics,
    pub signature: ModelSignature,
    pub params: TrainingParams,
    pub dataset: DatasetSummary,
    /// First training rows in schema order
    pub input_example: Vec<Vec<f64>>,
    pub created_at: DateTime<Utc>,
}

impl ModelArtifact {
    pub fn predict_proba(&self, feature: &FeatureVector) -> Result<f64, ModelError> {
        self.model.predict_proba(feature)
    }

    pub fn predict(&self, feature: &FeatureVector) -> Result<u8, ModelError> {
        self.model.predict(feature)
    }
}

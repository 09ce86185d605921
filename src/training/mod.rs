pub mod metrics;
pub mod split;
pub mod trainer;

use thiserror::Error;

use crate::traits::model::ModelError;

pub use metrics::{evaluate, Confusion, EvaluationError, EvaluationMetrics, PrecisionRecallCurve};
pub use split::{train_holdout_split, Split};
pub use trainer::Trainer;

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("holdout fraction must be in (0, 1), got {0}")]
    InvalidHoldout(f64),
    #[error("dataset has no rows")]
    EmptyDataset,
    #[error("{partition} partition is empty ({rows} rows, holdout fraction {holdout_fraction})")]
    EmptyPartition {
        partition: &'static str,
        rows: usize,
        holdout_fraction: f64,
    },
    #[error("model fitting failed: {0}")]
    Model(#[from] ModelError),
    #[error("evaluation failed: {0}")]
    Evaluation(#[from] EvaluationError),
}

use chrono::Utc;
use tracing::info;

use crate::config::TrainingConfig;
use crate::data::CleanedRecord;
use crate::models::logistic::LogisticRegression;
use crate::registry::artifact::{DatasetSummary, ModelArtifact, ModelSignature, TrainingParams};
use crate::traits::features::{ColumnSpec, DataType, FeatureSchema, FeatureVector};
use crate::traits::model::Classifier;
use crate::training::metrics::evaluate;
use crate::training::split::train_holdout_split;
use crate::training::TrainingError;

const INPUT_EXAMPLE_ROWS: usize = 5;
const OUTPUT_COLUMN: &str = "churn";

/// Fits and evaluates the churn classifier.
#[derive(Debug, Clone)]
pub struct Trainer {
    schema: FeatureSchema,
    c: f64,
    max_iterations: usize,
    tolerance: f64,
}

impl Trainer {
    pub fn new(c: f64, max_iterations: usize, tolerance: f64) -> Self {
        Self {
            schema: FeatureSchema::churn(),
            c,
            max_iterations,
            tolerance,
        }
    }

    pub fn from_config(config: &TrainingConfig) -> Self {
        Self::new(config.c, config.max_iterations, config.tolerance)
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Split, fit and evaluate. Nothing is persisted here.
    pub fn train(
        &self,
        dataset: &[CleanedRecord],
        seed: u64,
        holdout_fraction: f64,
    ) -> Result<ModelArtifact, TrainingError> {
        let split = train_holdout_split(dataset.len(), holdout_fraction, seed)?;
        info!(
            train_rows = split.train.len(),
            holdout_rows = split.holdout.len(),
            seed,
            holdout_fraction,
            "split dataset"
        );

        let (train_x, train_y) = self.project(dataset, &split.train);
        let (holdout_x, holdout_y) = self.project(dataset, &split.holdout);

        let mut model = LogisticRegression::new(self.c, self.max_iterations, self.tolerance);
        model.fit(&train_x, &train_y)?;

        let probabilities = model.predict_proba_batch(&holdout_x)?;
        let metrics = evaluate(&holdout_y, &probabilities)?;
        info!(
            accuracy = metrics.accuracy,
            f1_score = metrics.f1_score,
            pr_auc = metrics.pr_auc,
            iterations = model.n_iterations(),
            "evaluated model on holdout"
        );

        let predictions: Vec<f64> = probabilities.iter().map(|&p| f64::from(u8::from(p > 0.5))).collect();
        let signature = self.infer_signature(&predictions);

        Ok(ModelArtifact {
            params: TrainingParams {
                model_type: "LogisticRegression".to_string(),
                features: self.schema.names().iter().map(|s| s.to_string()).collect(),
                seed,
                holdout_fraction,
                c: self.c,
                max_iterations: self.max_iterations,
                n_iterations: model.n_iterations(),
            },
            dataset: DatasetSummary {
                rows: dataset.len(),
                train_rows: train_y.len(),
                holdout_rows: holdout_y.len(),
                train_positives: train_y.iter().filter(|&&y| y == 1).count(),
                holdout_positives: holdout_y.iter().filter(|&&y| y == 1).count(),
            },
            input_example: train_x
                .iter()
                .take(INPUT_EXAMPLE_ROWS)
                .map(FeatureVector::to_vec)
                .collect(),
            model,
            metrics,
            signature,
            created_at: Utc::now(),
        })
    }

    fn project(&self, dataset: &[CleanedRecord], indices: &[usize]) -> (Vec<FeatureVector>, Vec<u8>) {
        indices
            .iter()
            .map(|&i| (self.schema.project_record(&dataset[i]), dataset[i].churn))
            .unzip()
    }

    /// Inputs come from the schema; the output type from what the model produced.
    fn infer_signature(&self, predictions: &[f64]) -> ModelSignature {
        let integral = predictions.iter().all(|p| p.fract() == 0.0);
        ModelSignature {
            inputs: self.schema.columns().to_vec(),
            output: ColumnSpec::new(
                OUTPUT_COLUMN,
                if integral { DataType::Long } else { DataType::Double },
            ),
        }
    }
}

impl Default for Trainer {
    fn default() -> Self {
        Self::from_config(&TrainingConfig::default())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::training::metrics::EvaluationError;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Synthetic customers where short tenure and high charges drive churn.
    pub(crate) fn synthetic_customers(rows: usize, seed: u64) -> Vec<CleanedRecord> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..rows)
            .map(|_| {
                let tenure = rng.random_range(0.0..72.0_f64).floor();
                let monthly = rng.random_range(18.0..118.0_f64);
                let total = tenure * monthly;
                let logit = 1.5 - 0.08 * tenure + 0.02 * (monthly - 65.0);
                let p = 1.0 / (1.0 + (-logit).exp());
                let churn = u8::from(rng.random::<f64>() < p);
                CleanedRecord::new(tenure, monthly, total, churn)
            })
            .collect()
    }

    #[test]
    fn test_train_produces_artifact() {
        let data = synthetic_customers(400, 1);
        let artifact = Trainer::default().train(&data, 42, 0.2).unwrap();

        assert_eq!(artifact.dataset.rows, 400);
        assert_eq!(artifact.dataset.holdout_rows, 80);
        assert_eq!(artifact.dataset.train_rows, 320);
        assert_eq!(artifact.input_example.len(), 5);
        assert_eq!(artifact.params.features, vec!["tenure", "monthlycharges", "totalcharges"]);

        let m = &artifact.metrics;
        for value in [m.accuracy, m.f1_score, m.pr_auc, m.precision, m.recall] {
            assert!((0.0..=1.0).contains(&value), "metric out of range: {}", value);
        }
        // The signal is strong enough to beat a coin flip
        assert!(m.accuracy > 0.6, "accuracy {}", m.accuracy);

        assert_eq!(artifact.signature.input_schema(), FeatureSchema::churn());
        assert_eq!(artifact.signature.output, ColumnSpec::new("churn", DataType::Long));
    }

    #[test]
    fn test_train_is_deterministic() {
        let data = synthetic_customers(300, 9);
        let trainer = Trainer::default();
        let a = trainer.train(&data, 42, 0.2).unwrap();
        let b = trainer.train(&data, 42, 0.2).unwrap();
        assert_eq!(a.metrics, b.metrics);
        assert_eq!(a.model, b.model);
    }

    #[test]
    fn test_train_fails_on_single_class() {
        let mut data = synthetic_customers(50, 3);
        for record in data.iter_mut() {
            record.churn = 0;
        }
        // Single-class training data fails at fit time
        let err = Trainer::default().train(&data, 42, 0.2).unwrap_err();
        assert!(matches!(err, TrainingError::Model(_)));
    }

    #[test]
    fn test_train_propagates_evaluation_errors() {
        // One positive row; the holdout is whichever rows the seed picks
        let mut data = synthetic_customers(40, 5);
        for (i, record) in data.iter_mut().enumerate() {
            record.churn = u8::from(i == 0);
        }
        let split = train_holdout_split(data.len(), 0.2, 42).unwrap();
        let result = Trainer::default().train(&data, 42, 0.2);
        if split.holdout.contains(&0) {
            assert!(matches!(result, Err(TrainingError::Model(_))));
        } else {
            assert!(matches!(
                result,
                Err(TrainingError::Evaluation(EvaluationError::NoPositives))
            ));
        }
    }

    #[test]
    fn test_train_rejects_invalid_holdout() {
        let data = synthetic_customers(20, 1);
        assert!(matches!(
            Trainer::default().train(&data, 1, 1.5),
            Err(TrainingError::InvalidHoldout(_))
        ));
    }
}

use thiserror::Error;

use crate::traits::features::FeatureVector;

/// Errors raised by classifiers
#[derive(Debug, Error)]
pub enum ModelError {
    /// Prediction requested before fitting
    #[error("Model not fitted")]
    NotFitted,
    /// Empty training data
    #[error("Empty training data")]
    EmptyData,
    /// Data dimension mismatch errors
    #[error("Dimension mismatch ({context}): expected {expected}, got {actual}")]
    DimensionMismatch {
        expected: usize,
        actual: usize,
        context: String,
    },
    /// Labels contain a single class, so there is nothing to separate
    #[error("Training labels contain a single class ({0})")]
    SingleClass(u8),
    /// The optimiser could not produce a solution
    #[error("Solver error: {0}")]
    Solver(String),
    /// Invalid parameter errors
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Core trait for binary classifiers
pub trait Classifier: Send + Sync {
    /// Fit the model on a batch of data with `0`/`1` labels
    fn fit(&mut self, features: &[FeatureVector], labels: &[u8]) -> Result<(), ModelError>;

    /// Probability of the positive class for a single feature vector
    fn predict_proba(&self, feature: &FeatureVector) -> Result<f64, ModelError>;

    /// Hard label at the default 0.5 decision threshold
    fn predict(&self, feature: &FeatureVector) -> Result<u8, ModelError> {
        Ok(u8::from(self.predict_proba(feature)? > 0.5))
    }

    /// Positive-class probabilities for multiple feature vectors
    fn predict_proba_batch(&self, features: &[FeatureVector]) -> Result<Vec<f64>, ModelError> {
        let mut probabilities = Vec::with_capacity(features.len());
        for feature in features {
            probabilities.push(self.predict_proba(feature)?);
        }
        Ok(probabilities)
    }

    /// Whether `fit` has completed successfully
    fn is_fitted(&self) -> bool;

    /// Number of input features the fitted model expects
    fn n_features(&self) -> Option<usize>;
}

/// Check that features and labels line up before fitting
pub fn check_training_data(features: &[FeatureVector], labels: &[u8]) -> Result<usize, ModelError> {
    if features.is_empty() || labels.is_empty() {
        return Err(ModelError::EmptyData);
    }

    if features.len() != labels.len() {
        return Err(ModelError::DimensionMismatch {
            expected: features.len(),
            actual: labels.len(),
            context: "Number of feature vectors doesn't match number of labels".to_string(),
        });
    }

    let dimension = features[0].dimension();
    if let Some(bad) = features.iter().find(|f| f.dimension() != dimension) {
        return Err(ModelError::DimensionMismatch {
            expected: dimension,
            actual: bad.dimension(),
            context: "Inconsistent feature vector lengths".to_string(),
        });
    }

    if let Some(bad) = labels.iter().find(|&&l| l > 1) {
        return Err(ModelError::InvalidParameter(format!("label {} is not 0 or 1", bad)));
    }

    let first = labels[0];
    if labels.iter().all(|&l| l == first) {
        return Err(ModelError::SingleClass(first));
    }

    Ok(dimension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_training_data() {
        let features = vec![FeatureVector::new(vec![1.0]), FeatureVector::new(vec![2.0])];
        assert_eq!(check_training_data(&features, &[0, 1]).unwrap(), 1);

        assert!(matches!(check_training_data(&[], &[]), Err(ModelError::EmptyData)));
        assert!(matches!(
            check_training_data(&features, &[1]),
            Err(ModelError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            check_training_data(&features, &[1, 1]),
            Err(ModelError::SingleClass(1))
        ));
        assert!(matches!(
            check_training_data(&features, &[0, 2]),
            Err(ModelError::InvalidParameter(_))
        ));
    }
}

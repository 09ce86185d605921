use ndarray::{Array1, Array2, Axis};
use ndarray_linalg::Solve;
use serde::{Deserialize, Serialize};

use crate::traits::features::FeatureVector;
use crate::traits::model::{check_training_data, Classifier, ModelError};

/// Logistic regression with an L2 penalty, fitted by Newton's method (IRLS).
///
/// Features are standardised internally and the penalty applies to the
/// standardised coefficients; the intercept is never penalised. `c` is the
/// inverse regularisation strength, so larger values penalise less.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Intercept followed by one coefficient per standardised feature
    weights: Vec<f64>,
    /// Per-feature means used for standardisation
    means: Vec<f64>,
    /// Per-feature standard deviations used for standardisation
    scales: Vec<f64>,
    /// Inverse regularisation strength
    c: f64,
    /// Maximum number of Newton iterations
    max_iterations: usize,
    /// Convergence tolerance on the largest Newton step component
    tolerance: f64,
    /// Iterations used by the last fit
    n_iterations: usize,
    /// Whether the model has been fitted
    fitted: bool,
}

impl LogisticRegression {
    /// Create a new, unfitted model
    pub fn new(c: f64, max_iterations: usize, tolerance: f64) -> Self {
        Self {
            weights: Vec::new(),
            means: Vec::new(),
            scales: Vec::new(),
            c,
            max_iterations,
            tolerance,
            n_iterations: 0,
            fitted: false,
        }
    }

    /// Intercept followed by the standardised coefficients
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn n_iterations(&self) -> usize {
        self.n_iterations
    }

    pub fn c(&self) -> f64 {
        self.c
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    // Deserialized state may not come from `fit`
    fn state_is_consistent(&self) -> bool {
        let dimension = self.means.len();
        self.scales.len() == dimension && self.weights.len() == dimension + 1
    }

    fn fit_scaler(&mut self, features: &[FeatureVector], dimension: usize) {
        let n = features.len() as f64;
        let mut means = vec![0.0; dimension];
        for feature in features {
            for (j, v) in feature.as_array().iter().enumerate() {
                means[j] += v / n;
            }
        }

        let mut scales = vec![0.0; dimension];
        for feature in features {
            for (j, v) in feature.as_array().iter().enumerate() {
                scales[j] += (v - means[j]).powi(2) / n;
            }
        }
        // Constant columns keep their raw scale
        for scale in scales.iter_mut() {
            *scale = scale.sqrt();
            if *scale == 0.0 || !scale.is_finite() {
                *scale = 1.0;
            }
        }

        self.means = means;
        self.scales = scales;
    }

    /// Standardised design matrix with a leading column of ones for the intercept
    fn create_design_matrix(&self, features: &[FeatureVector]) -> Array2<f64> {
        let n_features = self.means.len();
        let mut design_matrix = Array2::ones((features.len(), n_features + 1));

        for (i, feature) in features.iter().enumerate() {
            let feature_array = feature.as_array();
            for j in 0..n_features {
                design_matrix[[i, j + 1]] = (feature_array[j] - self.means[j]) / self.scales[j];
            }
        }

        design_matrix
    }

    fn fit_newton(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), ModelError> {
        let n_params = x.ncols();

        // No penalty on the intercept
        let mut penalty = Array1::ones(n_params);
        penalty[0] = 0.0;
        let penalty_matrix = Array2::from_diag(&penalty);

        let mut weights: Array1<f64> = Array1::zeros(n_params);
        let mut converged = false;

        for iteration in 1..=self.max_iterations {
            let probabilities = x.dot(&weights).mapv(sigmoid);

            let gradient = x.t().dot(&(&probabilities - y)) * self.c + &penalty * &weights;

            let curvature = probabilities.mapv(|p| p * (1.0 - p));
            let weighted_x = x * &curvature.insert_axis(Axis(1));
            let hessian = x.t().dot(&weighted_x) * self.c + &penalty_matrix;

            let step = hessian
                .solve(&gradient)
                .map_err(|e| ModelError::Solver(format!("Failed to solve Newton step: {}", e)))?;

            weights = &weights - &step;
            self.n_iterations = iteration;

            if step.iter().any(|s| !s.is_finite()) {
                return Err(ModelError::Solver("Newton step diverged".to_string()));
            }
            if step.iter().fold(0.0_f64, |acc, s| acc.max(s.abs())) < self.tolerance {
                converged = true;
                break;
            }
        }

        if !converged {
            tracing::warn!(
                iterations = self.max_iterations,
                "logistic regression reached max_iterations before converging"
            );
        }

        self.weights = weights.to_vec();
        self.fitted = true;
        Ok(())
    }
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new(1.0, 100, 1e-8)
    }
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

impl Classifier for LogisticRegression {
    fn fit(&mut self, features: &[FeatureVector], labels: &[u8]) -> Result<(), ModelError> {
        if !(self.c > 0.0 && self.c.is_finite()) {
            return Err(ModelError::InvalidParameter(format!("C must be positive, got {}", self.c)));
        }
        if self.max_iterations == 0 {
            return Err(ModelError::InvalidParameter("max_iterations must be at least 1".to_string()));
        }

        let dimension = check_training_data(features, labels)?;

        self.fitted = false;
        self.fit_scaler(features, dimension);

        let x = self.create_design_matrix(features);
        let y = Array1::from_iter(labels.iter().map(|&l| f64::from(l)));

        self.fit_newton(&x, &y)
    }

    fn predict_proba(&self, feature: &FeatureVector) -> Result<f64, ModelError> {
        if !self.fitted {
            return Err(ModelError::NotFitted);
        }
        if !self.state_is_consistent() {
            return Err(ModelError::InvalidParameter(format!(
                "fitted state is inconsistent: {} weights, {} means, {} scales",
                self.weights.len(),
                self.means.len(),
                self.scales.len()
            )));
        }

        let expected_dim = self.means.len();
        if feature.dimension() != expected_dim {
            return Err(ModelError::DimensionMismatch {
                expected: expected_dim,
                actual: feature.dimension(),
                context: "Feature dimension doesn't match model weights".to_string(),
            });
        }

        let mut z = self.weights[0];
        for (j, v) in feature.as_array().iter().enumerate() {
            z += self.weights[j + 1] * (v - self.means[j]) / self.scales[j];
        }

        Ok(sigmoid(z))
    }

    fn is_fitted(&self) -> bool {
        self.fitted
    }

    fn n_features(&self) -> Option<usize> {
        (self.fitted && self.state_is_consistent()).then_some(self.means.len())
    }
}

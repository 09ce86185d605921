use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::registry::{ModelArtifact, ModelRegistry, ModelSignature, RegistryError, Selector, Stage};
use crate::server::stats::{ServingStats, StatsSnapshot};
use crate::traits::features::{FeatureSchema, ProjectionError};
use crate::traits::model::Classifier;
use crate::training::EvaluationMetrics;

#[derive(Debug, Error)]
pub enum ServingError {
    #[error("{0}")]
    Validation(String),
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),
    #[error("model expects inputs {found:?} but the service schema is {expected:?}")]
    SchemaMismatch { expected: Vec<String>, found: Vec<String> },
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ProjectionError> for ServingError {
    fn from(err: ProjectionError) -> Self {
        ServingError::Validation(err.to_string())
    }
}

/// The one model a service instance answers with. Built once and never mutated.
#[derive(Debug)]
pub struct ServingContext {
    pub name: String,
    pub version: u64,
    pub stage: Stage,
    pub checksum: String,
    pub artifact: ModelArtifact,
    pub schema: FeatureSchema,
    pub loaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Health {
    pub status: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Readiness {
    Ready { model: String, version: u64, stage: Stage },
    Unavailable { detail: String },
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Readiness::Ready { .. })
    }
}

/// Body of `GET /model`.
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub name: String,
    pub version: u64,
    pub stage: Stage,
    pub checksum: String,
    pub metrics: EvaluationMetrics,
    pub signature: ModelSignature,
    pub trained_at: DateTime<Utc>,
    pub loaded_at: DateTime<Utc>,
    pub stats: StatsSnapshot,
}

#[derive(Debug)]
enum ModelState {
    Loaded(Arc<ServingContext>),
    Unavailable(String),
}

/// Answers churn predictions from a single registry entry resolved at start-up.
#[derive(Debug)]
pub struct PredictionService {
    state: ModelState,
    stats: ServingStats,
}

impl PredictionService {
    /// Resolve `selector` once and refuse to build a service whose model does
    /// not take the churn schema.
    pub fn load(registry: &ModelRegistry, model_name: &str, selector: &Selector) -> Result<Self, ServingError> {
        let entry = registry.resolve(model_name, selector)?;
        let schema = FeatureSchema::churn();

        let found = entry.artifact.signature.input_schema();
        let dims_match = entry.artifact.model.n_features() == Some(schema.len());
        if found != schema || !dims_match {
            return Err(ServingError::SchemaMismatch {
                expected: schema.names().iter().map(|s| s.to_string()).collect(),
                found: found.names().iter().map(|s| s.to_string()).collect(),
            });
        }

        info!(
            model = %entry.name,
            version = entry.version,
            stage = %entry.stage,
            "loaded model for serving"
        );
        Ok(Self::from_context(ServingContext {
            name: entry.name,
            version: entry.version,
            stage: entry.stage,
            checksum: entry.checksum,
            artifact: entry.artifact,
            schema,
            loaded_at: Utc::now(),
        }))
    }

    pub fn from_context(context: ServingContext) -> Self {
        Self {
            state: ModelState::Loaded(Arc::new(context)),
            stats: ServingStats::new(),
        }
    }

    /// A service with no model. Predictions fail with `ModelUnavailable`.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        warn!(reason = %reason, "serving without a model");
        Self {
            state: ModelState::Unavailable(reason),
            stats: ServingStats::new(),
        }
    }

    pub fn context(&self) -> Option<&Arc<ServingContext>> {
        match &self.state {
            ModelState::Loaded(context) => Some(context),
            ModelState::Unavailable(_) => None,
        }
    }

    fn require_context(&self) -> Result<&Arc<ServingContext>, ServingError> {
        match &self.state {
            ModelState::Loaded(context) => Ok(context),
            ModelState::Unavailable(reason) => {
                self.stats.record_unavailable();
                Err(ServingError::ModelUnavailable(reason.clone()))
            }
        }
    }

    /// Predict churn (`0` or `1`) for one request object.
    pub fn predict(&self, request: &Value) -> Result<u8, ServingError> {
        let started = Instant::now();
        let context = self.require_context()?;

        let features = context.schema.project_json(request).map_err(|e| {
            self.stats.record_validation_error();
            ServingError::from(e)
        })?;
        let prediction = context
            .artifact
            .predict(&features)
            .map_err(|e| ServingError::Internal(e.to_string()))?;

        self.stats.record_prediction(started);
        Ok(prediction)
    }

    /// Liveness. Reported whether or not a model is loaded.
    pub fn health(&self) -> Health {
        Health { status: "ok" }
    }

    pub fn readiness(&self) -> Readiness {
        match &self.state {
            ModelState::Loaded(context) => Readiness::Ready {
                model: context.name.clone(),
                version: context.version,
                stage: context.stage,
            },
            ModelState::Unavailable(reason) => Readiness::Unavailable {
                detail: reason.clone(),
            },
        }
    }

    pub fn model_info(&self) -> Result<ModelInfo, ServingError> {
        let context = self.require_context()?;
        Ok(ModelInfo {
            name: context.name.clone(),
            version: context.version,
            stage: context.stage,
            checksum: context.checksum.clone(),
            metrics: context.artifact.metrics.clone(),
            signature: context.artifact.signature.clone(),
            trained_at: context.artifact.created_at,
            loaded_at: context.loaded_at,
            stats: self.stats.snapshot(),
        })
    }

    pub fn stats(&self) -> &ServingStats {
        &self.stats
    }
}

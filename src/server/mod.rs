pub mod api;
pub mod service;
pub mod stats;

pub use api::{router, serve, PredictionResponse, SharedService};
pub use service::{Health, ModelInfo, PredictionService, Readiness, ServingContext, ServingError};
pub use stats::{ServingStats, StatsSnapshot};

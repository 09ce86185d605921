use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::server::service::{Health, ModelInfo, PredictionService, ServingError};

/// Shared state for all handlers.
pub type SharedService = Arc<PredictionService>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub churn_prediction: u8,
}

impl ServingError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServingError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServingError::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServingError::SchemaMismatch { .. } | ServingError::Registry(_) | ServingError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ServingError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let detail = match &self {
            ServingError::Validation(detail) | ServingError::ModelUnavailable(detail) => detail.clone(),
            _ => {
                error!(error = %self, "prediction request failed");
                "internal server error".to_string()
            }
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

/// Build the HTTP router around a prediction service.
pub fn router(service: SharedService) -> Router {
    Router::new()
        .route("/predict", post(predict_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/model", get(model_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// Serve `service` on `addr` until ctrl-c.
pub async fn serve(addr: &str, service: SharedService) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "prediction server listening");
    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

// The body is parsed here rather than with the `Json` extractor so that
// malformed JSON gets the same 422 shape as a schema violation.
async fn predict_handler(
    State(service): State<SharedService>,
    body: Bytes,
) -> Result<Json<PredictionResponse>, ServingError> {
    let request: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| ServingError::Validation(format!("malformed JSON body: {}", e)))?;
    let churn_prediction = service.predict(&request)?;
    Ok(Json(PredictionResponse { churn_prediction }))
}

async fn health_handler(State(service): State<SharedService>) -> Json<Health> {
    Json(service.health())
}

async fn ready_handler(State(service): State<SharedService>) -> Response {
    let readiness = service.readiness();
    let status = if readiness.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(readiness)).into_response()
}

async fn model_handler(State(service): State<SharedService>) -> Result<Json<ModelInfo>, ServingError> {
    service.model_info().map(Json)
}

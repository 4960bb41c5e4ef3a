// ============================================================================
// HEALTH AND PROMETHEUS ENDPOINTS
// ============================================================================

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, warn};

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ComponentHealth {
    fn from_result<E: std::fmt::Display>(result: std::result::Result<(), E>) -> Self {
        match result {
            Ok(()) => Self {
                status: "healthy",
                error: None,
            },
            Err(e) => Self {
                status: "unhealthy",
                error: Some(e.to_string()),
            },
        }
    }

    fn is_healthy(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub timestamp: String,
    pub version: &'static str,
    pub database: ComponentHealth,
    pub cache: ComponentHealth,
}

/// Unauthenticated operational endpoints
pub fn observability_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
}

/// Pings the store and the cache; 503 unless both answer.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let database = ComponentHealth::from_result(state.todos.repository().health_check().await);
    let cache = ComponentHealth::from_result(state.todos.cache().health_check().await);

    let healthy = database.is_healthy() && cache.is_healthy();
    if !healthy {
        warn!(database = database.status, cache = cache.status, "Health check failed");
    }

    let body = HealthCheck {
        status: if healthy { "healthy" } else { "unhealthy" },
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION"),
        database,
        cache,
    };
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(body))
}

/// Prometheus text exposition
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => {
            let response = String::from_utf8(buffer).unwrap_or_default();
            (StatusCode::OK, response).into_response()
        }
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response()
        }
    }
}

use axum::{middleware as axum_middleware, Router};
use std::sync::Arc;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod cache_key;
pub mod cache_ttl;
pub mod domains;
pub mod middleware;
pub mod observability;
pub mod state;

use api::create_api_router;
use middleware::cors_layer;
use observability::{metrics_middleware, observability_router};
use state::AppState;

pub fn create_app_router(app_state: Arc<AppState>) -> Router {
    let request_timeout = app_state.request_timeout;

    Router::new()
        // Health and /metrics, no authentication
        .merge(observability_router())
        .merge(create_api_router(app_state.clone()))
        .with_state(app_state)
        .layer(axum_middleware::from_fn(metrics_middleware))
        // Dropping a timed-out handler future rolls back any open transaction.
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
}

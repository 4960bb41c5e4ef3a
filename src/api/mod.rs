pub mod todos_v1;

use axum::{middleware::from_fn_with_state, Router};
use std::sync::Arc;

use crate::middleware::require_auth;
use crate::state::AppState;

// Routes behind bearer-token verification
fn create_protected_v1_router(app_state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .nest("/api/v1/todo", todos_v1::create_todos_v1_router())
        .layer(from_fn_with_state(app_state, require_auth))
}

/// Creates the API router with all REST endpoints
pub fn create_api_router(app_state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new().merge(create_protected_v1_router(app_state))
}

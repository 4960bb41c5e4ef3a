use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use shared::{AppError, Identity};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::state::AppState;

/// Verify the bearer token and attach the caller's [`Identity`] to the request.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let identity = {
        let auth_header = request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|header| header.to_str().ok())
            .ok_or_else(|| {
                warn!(path = %request.uri().path(), "Missing Authorization header");
                AppError::authentication("Missing Authorization header")
            })?;

        let token = state.auth.extract_token_from_header(auth_header)?;
        state.auth.identity_from_token(token).map_err(|e| {
            warn!(path = %request.uri().path(), "JWT validation failed: {}", e);
            e
        })?
    };

    debug!(user_id = %identity.user_id, role = %identity.role, "Authenticated request");
    request.extensions_mut().insert::<Identity>(identity);

    Ok(next.run(request).await)
}

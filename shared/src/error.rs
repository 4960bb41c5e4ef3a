//! Error handling shared by the store, cache and HTTP layers

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

pub type Result<T> = std::result::Result<T, AppError>;

/// Closed set of error categories exposed to callers.
///
/// Handlers and tests branch on this, never on the rendered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    Internal,
}

impl ErrorKind {
    pub fn status_code(self) -> StatusCode {
        match self {
            ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "bad_request",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Internal => "internal",
        }
    }
}

/// Body of the error envelope: `{"error": {"code": 404, "kind": "not_found", "message": "..."}}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: u16,
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Authentication error: {message}")]
    Authentication { message: String },

    #[error("Authorization error: {message}")]
    Authorization { message: String },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Bad request: {message}")]
    BadRequest { message: String },

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization {
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Authentication { .. } => ErrorKind::Unauthorized,
            AppError::Authorization { .. } => ErrorKind::Forbidden,
            AppError::Validation(_) | AppError::BadRequest { .. } => ErrorKind::BadRequest,
            AppError::NotFound { .. } => ErrorKind::NotFound,
            AppError::Conflict { .. } => ErrorKind::Conflict,
            AppError::Database(sqlx::Error::RowNotFound) => ErrorKind::NotFound,
            AppError::Database(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                ErrorKind::Conflict
            }
            AppError::Database(_)
            | AppError::Configuration { .. }
            | AppError::Internal { .. }
            | AppError::Serialization(_) => ErrorKind::Internal,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.kind().status_code()
    }

    /// Message safe to show to the caller. Internal failures are reported generically.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Internal => "failed to process request".to_string(),
            ErrorKind::Conflict if matches!(self, AppError::Database(_)) => {
                "resource already exists".to_string()
            }
            _ => self.to_string(),
        }
    }

    pub fn to_response_body(&self) -> ErrorResponse {
        let kind = self.kind();
        ErrorResponse {
            error: ErrorBody {
                code: kind.status_code().as_u16(),
                kind,
                message: self.public_message(),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match self.kind() {
            ErrorKind::Internal => tracing::error!(kind = self.kind().as_str(), "API error: {}", self),
            _ => tracing::debug!(kind = self.kind().as_str(), "API error: {}", self),
        }

        (status, Json(self.to_response_body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_http_status() {
        assert_eq!(AppError::bad_request("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::authentication("x").status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::authorization("x").status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::not_found("todo").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::conflict("x").status_code(), StatusCode::CONFLICT);
        assert_eq!(AppError::internal("x").status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            AppError::Database(sqlx::Error::RowNotFound).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            AppError::Database(sqlx::Error::PoolTimedOut).kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn internal_errors_hide_details() {
        let body = AppError::internal("connection refused on 10.0.0.7").to_response_body();
        assert_eq!(body.error.code, 500);
        assert_eq!(body.error.kind, ErrorKind::Internal);
        assert!(!body.error.message.contains("10.0.0.7"));
    }

    #[test]
    fn envelope_shape() {
        let body = AppError::authorization("not your todo").to_response_body();
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["error"]["code"], 403);
        assert_eq!(json["error"]["kind"], "forbidden");
        assert!(json["error"]["message"].as_str().unwrap().contains("not your todo"));
    }
}

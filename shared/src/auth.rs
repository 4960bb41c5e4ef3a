//! Token verification and the request-scoped identity

use crate::{config::AuthConfig, error::AppError, Result};
use axum::{extract::FromRequestParts, http::request::Parts};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const JWT_ALGORITHM: Algorithm = Algorithm::HS256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => f.write_str("user"),
            Role::Admin => f.write_str("admin"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Subject (user ID)
    #[serde(default)]
    pub email: Option<String>,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

/// Verified caller of a request, inserted into request extensions by the auth middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub role: Role,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Id used as the owner of anything this identity creates.
    pub fn owner(&self) -> &str {
        &self.user_id
    }

    /// Succeeds for admins and for the owner of the resource.
    pub fn verify_ownership(&self, resource_owner_id: &str) -> Result<()> {
        if self.is_admin() || self.user_id == resource_owner_id {
            return Ok(());
        }
        Err(AppError::authorization(
            "user does not have permission to access this resource",
        ))
    }
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Identity {
            user_id: claims.sub,
            role: claims.role,
        }
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        // Absent only when a route was mounted without the auth middleware.
        parts.extensions.get::<Identity>().cloned().ok_or_else(|| {
            tracing::error!(path = %parts.uri.path(), "identity requested on an unauthenticated route");
            AppError::authentication("invalid or missing JWT claims")
        })
    }
}

#[derive(Clone)]
pub struct AuthService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_ttl: Duration,
}

impl AuthService {
    pub fn new(config: &AuthConfig) -> Result<Self> {
        if config.jwt_secret.is_empty() {
            return Err(AppError::configuration("JWT secret must not be empty"));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            access_token_ttl: Duration::seconds(config.access_token_ttl_seconds as i64),
        })
    }

    /// Mint an access token. Issuance normally happens in the identity provider;
    /// this exists for operators and tests.
    pub fn issue_access_token(&self, user_id: &str, email: Option<&str>, role: Role) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            email: email.map(str::to_string),
            role,
            exp: (now + self.access_token_ttl).timestamp(),
            iat: now.timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
        };

        encode(&Header::new(JWT_ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| AppError::internal(format!("Failed to generate access token: {}", e)))
    }

    /// Validate and decode a token
    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        let validation = Validation::new(JWT_ALGORITHM);

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    AppError::authentication("Token has expired")
                }
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    AppError::authentication("Invalid token signature")
                }
                _ => AppError::authentication("Invalid token"),
            }
        })?;

        if token_data.claims.sub.is_empty() {
            return Err(AppError::authentication("Token has no subject"));
        }

        Ok(token_data.claims)
    }

    pub fn identity_from_token(&self, token: &str) -> Result<Identity> {
        self.validate_token(token).map(Identity::from)
    }

    /// Extract token from Authorization header
    pub fn extract_token_from_header<'a>(&self, auth_header: &'a str) -> Result<&'a str> {
        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::authentication("Invalid authorization header"))?
            .trim();

        if token.is_empty() {
            return Err(AppError::authentication("Empty token"));
        }

        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn service() -> AuthService {
        AuthService::new(&AuthConfig {
            jwt_secret: "test-secret".to_string(),
            access_token_ttl_seconds: 60,
        })
        .unwrap()
    }

    #[test]
    fn token_round_trip_carries_role() {
        let auth = service();
        let token = auth.issue_access_token("u-1", Some("a@example.com"), Role::Admin).unwrap();
        let identity = auth.identity_from_token(&token).unwrap();

        assert_eq!(identity.user_id, "u-1");
        assert!(identity.is_admin());
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let other = AuthService::new(&AuthConfig {
            jwt_secret: "another-secret".to_string(),
            access_token_ttl_seconds: 60,
        })
        .unwrap();
        let token = other.issue_access_token("u-1", None, Role::User).unwrap();

        let err = service().validate_token(&token).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn bearer_prefix_is_required() {
        let auth = service();
        assert_eq!(auth.extract_token_from_header("Bearer abc").unwrap(), "abc");
        assert!(auth.extract_token_from_header("Basic abc").is_err());
        assert!(auth.extract_token_from_header("Bearer   ").is_err());
    }

    #[test]
    fn ownership_rules() {
        let owner = Identity::new("alice", Role::User);
        let stranger = Identity::new("bob", Role::User);
        let admin = Identity::new("root", Role::Admin);

        assert!(owner.verify_ownership("alice").is_ok());
        assert!(admin.verify_ownership("alice").is_ok());
        assert_eq!(
            stranger.verify_ownership("alice").unwrap_err().kind(),
            ErrorKind::Forbidden
        );
        assert_eq!(owner.owner(), "alice");
    }
}

//! Platform crate for the to-do service
//!
//! - Error taxonomy and HTTP envelope
//! - Configuration from the environment
//! - Token verification and caller identity
//! - Cache port with Redis and in-process backends
//! - PostgreSQL pool bootstrap

pub mod auth;
pub mod cache;
pub mod config;
pub mod database;
pub mod error;

// Re-export commonly used types
pub use auth::{AuthService, Claims, Identity, Role};
pub use cache::{CacheError, CacheStore, MemoryCache, RedisCache};
pub use config::Config;
pub use error::{AppError, ErrorKind, Result};

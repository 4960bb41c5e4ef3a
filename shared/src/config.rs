//! Configuration management

use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    pub pagination: PaginationConfig,
    pub app: AppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
    pub idle_timeout_seconds: u64,
    pub max_lifetime_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    pub pool_size: usize,
    pub operation_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub access_token_ttl_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationConfig {
    pub default_size: i64,
    pub max_size: i64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_size: 10,
            max_size: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Redis,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: String,
    pub log_level: String,
    pub port: u16,
    pub request_timeout_seconds: u64,
    pub storage_backend: StorageBackend,
    pub cache_backend: CacheBackend,
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let storage_backend = match var_or("STORAGE_BACKEND", "postgres").as_str() {
            "postgres" => StorageBackend::Postgres,
            "memory" => StorageBackend::Memory,
            other => anyhow::bail!("unsupported STORAGE_BACKEND: {}", other),
        };
        let cache_backend = match var_or("CACHE_BACKEND", "redis").as_str() {
            "redis" => CacheBackend::Redis,
            "memory" => CacheBackend::Memory,
            other => anyhow::bail!("unsupported CACHE_BACKEND: {}", other),
        };

        let pagination = PaginationConfig {
            default_size: var_or("PAGINATION_DEFAULT_SIZE", "10").parse()?,
            max_size: var_or("PAGINATION_MAX_SIZE", "100").parse()?,
        };
        if pagination.default_size < 1 || pagination.max_size < pagination.default_size {
            anyhow::bail!(
                "invalid pagination bounds: default {} max {}",
                pagination.default_size,
                pagination.max_size
            );
        }

        Ok(Config {
            database: DatabaseConfig {
                url: var_or("DATABASE_URL", "postgresql://localhost:5432/todos"),
                max_connections: var_or("DATABASE_MAX_CONNECTIONS", "20").parse()?,
                min_connections: var_or("DATABASE_MIN_CONNECTIONS", "2").parse()?,
                acquire_timeout_seconds: var_or("DATABASE_ACQUIRE_TIMEOUT_SECONDS", "5").parse()?,
                idle_timeout_seconds: var_or("DATABASE_IDLE_TIMEOUT_SECONDS", "300").parse()?,
                max_lifetime_seconds: var_or("DATABASE_MAX_LIFETIME_SECONDS", "1800").parse()?,
            },
            redis: RedisConfig {
                url: var_or("REDIS_URL", "redis://127.0.0.1:6379"),
                pool_size: var_or("REDIS_POOL_SIZE", "16").parse()?,
                operation_timeout_ms: var_or("REDIS_OPERATION_TIMEOUT_MS", "250").parse()?,
            },
            auth: AuthConfig {
                jwt_secret: env::var("JWT_SECRET")
                    .map_err(|_| anyhow::anyhow!("JWT_SECRET must be set"))?,
                access_token_ttl_seconds: var_or("JWT_ACCESS_TOKEN_TTL_SECONDS", "900").parse()?,
            },
            pagination,
            app: AppConfig {
                environment: var_or("ENVIRONMENT", "development"),
                log_level: var_or("RUST_LOG", "info"),
                port: var_or("PORT", "8000").parse()?,
                request_timeout_seconds: var_or("REQUEST_TIMEOUT_SECONDS", "30").parse()?,
                storage_backend,
                cache_backend,
            },
        })
    }
}

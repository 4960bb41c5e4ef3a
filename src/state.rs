use crate::domains::todos::{InMemoryTodoRepository, PgTodoRepository, TodoRepository, TodoService};
use shared::{
    cache::MEMORY_CLEANUP_INTERVAL,
    config::{CacheBackend, StorageBackend},
    database, AuthService, CacheStore, Config, MemoryCache, RedisCache,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Shared application state: token verification and the to-do service with
/// its injected store and cache.
pub struct AppState {
    pub auth: AuthService,
    pub todos: TodoService,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(auth: AuthService, todos: TodoService) -> Self {
        Self {
            auth,
            todos,
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Build backends selected by configuration.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let repo: Arc<dyn TodoRepository> = match config.app.storage_backend {
            StorageBackend::Postgres => {
                let pool = database::create_pool(&config.database).await?;
                database::ensure_schema(&pool).await?;
                Arc::new(PgTodoRepository::new(pool))
            }
            StorageBackend::Memory => {
                warn!("Using in-memory todo store; data is lost on restart");
                Arc::new(InMemoryTodoRepository::new())
            }
        };

        let cache: Arc<dyn CacheStore> = match config.app.cache_backend {
            CacheBackend::Redis => {
                let cache = RedisCache::new(&config.redis)?;
                // Reads fall back to the store, so an unreachable Redis is not fatal.
                match cache.health_check().await {
                    Ok(()) => info!("Redis cache reachable"),
                    Err(e) => warn!("Redis cache not reachable at start-up: {}", e),
                }
                Arc::new(cache)
            }
            CacheBackend::Memory => {
                let cache = MemoryCache::new();
                cache.start_background_cleanup(MEMORY_CLEANUP_INTERVAL);
                Arc::new(cache)
            }
        };

        info!(
            storage = ?config.app.storage_backend,
            cache = cache.backend_name(),
            "Backends initialized"
        );

        let auth = AuthService::new(&config.auth)?;
        let todos = TodoService::new(repo, cache, config.pagination.clone());

        Ok(Self::new(auth, todos)
            .with_request_timeout(Duration::from_secs(config.app.request_timeout_seconds)))
    }
}

//! Cache port and its Redis / in-process backends
//!
//! Values are opaque strings; callers own serialization. A miss is `Ok(None)`,
//! while `Err` means the backend itself misbehaved. Read paths treat both as
//! "go to the source of truth".

use crate::config::RedisConfig;
use async_trait::async_trait;
use dashmap::DashMap;
use deadpool_redis::{Pool as RedisPool, Runtime};
use redis::AsyncCommands;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info};

/// Keys deleted per round trip while draining a SCAN cursor.
const SCAN_BATCH: usize = 500;

/// Sweep period for expired in-process entries.
pub const MEMORY_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(#[from] redis::RedisError),

    #[error("cache pool error: {0}")]
    Pool(String),

    #[error("cache operation timed out: {operation}")]
    Timeout { operation: &'static str },

    #[error("invalid cache pattern: {0}")]
    Pattern(String),
}

pub type CacheResult<T> = std::result::Result<T, CacheError>;

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()>;
    /// Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> CacheResult<()>;
    /// Delete every key matching a Redis-style glob. Returns the number removed.
    async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64>;
    async fn health_check(&self) -> CacheResult<()>;
    fn backend_name(&self) -> &'static str;
}

// ============================================================================
// REDIS
// ============================================================================

#[derive(Clone)]
pub struct RedisCache {
    pool: RedisPool,
    op_timeout: Duration,
}

impl RedisCache {
    pub fn new(config: &RedisConfig) -> anyhow::Result<Self> {
        info!("Initializing Redis cache pool (max size {})", config.pool_size);

        let mut pool_config = deadpool_redis::Config::from_url(&config.url);
        pool_config.pool = Some(deadpool_redis::PoolConfig::new(config.pool_size));
        let pool = pool_config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| anyhow::anyhow!("Failed to create Redis pool: {}", e))?;

        Ok(Self::from_pool(
            pool,
            Duration::from_millis(config.operation_timeout_ms),
        ))
    }

    pub fn from_pool(pool: RedisPool, op_timeout: Duration) -> Self {
        Self { pool, op_timeout }
    }

    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> CacheResult<T>
    where
        F: Future<Output = CacheResult<T>>,
    {
        tokio::time::timeout(self.op_timeout, fut)
            .await
            .map_err(|_| CacheError::Timeout { operation })?
    }

    async fn connection(&self) -> CacheResult<deadpool_redis::Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| CacheError::Pool(e.to_string()))
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.bounded("get", async {
            let mut conn = self.connection().await?;
            let value: Option<String> = conn.get(key).await?;
            Ok(value)
        })
        .await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let seconds = ttl.as_secs().max(1);
        self.bounded("set", async {
            let mut conn = self.connection().await?;
            conn.set_ex::<_, _, ()>(key, value, seconds).await?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.bounded("delete", async {
            let mut conn = self.connection().await?;
            conn.del::<_, ()>(key).await?;
            Ok(())
        })
        .await
    }

    async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64> {
        // SCAN instead of KEYS so a large keyspace never blocks the server.
        self.bounded("delete_pattern", async {
            let mut conn = self.connection().await?;
            let mut cursor: u64 = 0;
            let mut deleted: u64 = 0;

            loop {
                let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                    .arg(cursor)
                    .arg("MATCH")
                    .arg(pattern)
                    .arg("COUNT")
                    .arg(SCAN_BATCH)
                    .query_async(&mut conn)
                    .await?;

                if !keys.is_empty() {
                    let removed: u64 = conn.del(&keys).await?;
                    deleted += removed;
                }

                if next == 0 {
                    break;
                }
                cursor = next;
            }

            debug!(pattern = %pattern, deleted, "Redis pattern delete");
            Ok(deleted)
        })
        .await
    }

    async fn health_check(&self) -> CacheResult<()> {
        self.bounded("ping", async {
            let mut conn = self.connection().await?;
            let _: String = redis::cmd("PING").query_async(&mut conn).await?;
            Ok(())
        })
        .await
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

// ============================================================================
// IN-PROCESS
// ============================================================================

#[derive(Clone)]
struct MemoryEntry {
    value: String,
    expiry: Instant,
}

/// Process-local cache with the same contract as Redis, used for local runs and tests.
#[derive(Clone, Default)]
pub struct MemoryCache {
    store: Arc<DashMap<String, MemoryEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.store.iter().filter(|e| e.expiry > now).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live keys, sorted. Handy for asserting on cache state.
    pub fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .store
            .iter()
            .filter(|e| e.expiry > now)
            .map(|e| e.key().clone())
            .collect();
        keys.sort();
        keys
    }

    /// Drop every expired entry. Reads only evict the key they touch, so
    /// unrequested keys stay resident until this runs.
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.store.len();
        self.store.retain(|_, entry| entry.expiry > now);
        let removed = before - self.store.len();
        if removed > 0 {
            debug!("Memory cache cleanup removed {} expired entries", removed);
        }
        removed
    }

    /// Spawn a task that sweeps expired entries every `period`.
    pub fn start_background_cleanup(&self, period: Duration) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut cleanup_interval = interval(period);
            info!("Started memory cache cleanup task (interval: {:?})", period);

            loop {
                cleanup_interval.tick().await;
                let removed = cache.cleanup_expired();
                if removed > 0 {
                    info!("Background cleanup removed {} expired cache entries", removed);
                }
            }
        })
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        if let Some(entry) = self.store.get(key) {
            if entry.expiry > Instant::now() {
                return Ok(Some(entry.value.clone()));
            }
        }
        self.store.remove_if(key, |_, entry| entry.expiry <= Instant::now());
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let entry = MemoryEntry {
            value: value.to_string(),
            expiry: Instant::now() + ttl,
        };
        self.store.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.store.remove(key);
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64> {
        let matcher = GlobPattern::parse(pattern)?;
        let before = self.store.len();
        self.store.retain(|key, _| !matcher.matches(key));
        Ok((before - self.store.len()) as u64)
    }

    async fn health_check(&self) -> CacheResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

// ============================================================================
// GLOB MATCHING
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum GlobToken {
    Literal(char),
    AnyOne,
    AnyMany,
    Class { negated: bool, ranges: Vec<(char, char)> },
}

/// Redis `KEYS`/`SCAN MATCH` glob: `*`, `?`, `[abc]`, `[^a-z]`, and `\` escapes.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    tokens: Vec<GlobToken>,
}

impl GlobPattern {
    pub fn parse(pattern: &str) -> CacheResult<Self> {
        let mut tokens = Vec::new();
        let mut chars = pattern.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '*' => {
                    if tokens.last() != Some(&GlobToken::AnyMany) {
                        tokens.push(GlobToken::AnyMany);
                    }
                }
                '?' => tokens.push(GlobToken::AnyOne),
                '\\' => {
                    let escaped = chars
                        .next()
                        .ok_or_else(|| CacheError::Pattern(pattern.to_string()))?;
                    tokens.push(GlobToken::Literal(escaped));
                }
                '[' => {
                    let negated = chars.next_if_eq(&'^').is_some();
                    let mut ranges = Vec::new();
                    let mut closed = false;
                    while let Some(member) = chars.next() {
                        let start = match member {
                            ']' => {
                                closed = true;
                                break;
                            }
                            '\\' => chars
                                .next()
                                .ok_or_else(|| CacheError::Pattern(pattern.to_string()))?,
                            other => other,
                        };
                        if chars.peek() == Some(&'-') {
                            chars.next();
                            match chars.next() {
                                Some(']') => {
                                    ranges.push((start, start));
                                    ranges.push(('-', '-'));
                                    closed = true;
                                    break;
                                }
                                Some(end) => ranges.push((start.min(end), start.max(end))),
                                None => break,
                            }
                        } else {
                            ranges.push((start, start));
                        }
                    }
                    if !closed {
                        return Err(CacheError::Pattern(pattern.to_string()));
                    }
                    tokens.push(GlobToken::Class { negated, ranges });
                }
                other => tokens.push(GlobToken::Literal(other)),
            }
        }

        Ok(Self { tokens })
    }

    pub fn matches(&self, candidate: &str) -> bool {
        let text: Vec<char> = candidate.chars().collect();
        // Iterative matcher with single-star backtracking.
        let (mut t, mut p) = (0usize, 0usize);
        let mut star: Option<(usize, usize)> = None;

        while t < text.len() {
            match self.tokens.get(p) {
                Some(GlobToken::AnyMany) => {
                    star = Some((p, t));
                    p += 1;
                }
                Some(token) if Self::token_matches(token, text[t]) => {
                    p += 1;
                    t += 1;
                }
                _ => match star {
                    Some((sp, st)) => {
                        p = sp + 1;
                        t = st + 1;
                        star = Some((sp, st + 1));
                    }
                    None => return false,
                },
            }
        }

        self.tokens[p..].iter().all(|tok| *tok == GlobToken::AnyMany)
    }

    fn token_matches(token: &GlobToken, c: char) -> bool {
        match token {
            GlobToken::Literal(l) => *l == c,
            GlobToken::AnyOne => true,
            GlobToken::AnyMany => false,
            GlobToken::Class { negated, ranges } => {
                let hit = ranges.iter().any(|(lo, hi)| *lo <= c && c <= *hi);
                hit != *negated
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_prefix_patterns() {
        let p = GlobPattern::parse("todos:list:user:u1:*").unwrap();
        assert!(p.matches("todos:list:user:u1:page:1:size:10"));
        assert!(p.matches("todos:list:user:u1:"));
        assert!(!p.matches("todos:list:user:u10:page:1"));
        assert!(!p.matches("todos:get:u1"));
    }

    #[test]
    fn glob_wildcards_classes_and_escapes() {
        assert!(GlobPattern::parse("h?llo").unwrap().matches("hallo"));
        assert!(!GlobPattern::parse("h?llo").unwrap().matches("hllo"));
        assert!(GlobPattern::parse("h*llo").unwrap().matches("heeeello"));
        assert!(GlobPattern::parse("h[ae]llo").unwrap().matches("hello"));
        assert!(!GlobPattern::parse("h[^e]llo").unwrap().matches("hello"));
        assert!(GlobPattern::parse("h[a-c]llo").unwrap().matches("hbllo"));
        assert!(GlobPattern::parse("a\\*b").unwrap().matches("a*b"));
        assert!(!GlobPattern::parse("a\\*b").unwrap().matches("axb"));
        assert!(GlobPattern::parse("*:page:*:title:*").unwrap().matches("x:page:1:title:abc"));
        assert!(GlobPattern::parse("h[abc").is_err());
    }

    #[tokio::test]
    async fn memory_cache_get_set_delete() {
        let cache = MemoryCache::new();
        assert_eq!(cache.get("k").await.unwrap(), None);

        cache.set("k", "v", Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));

        cache.delete("k").await.unwrap();
        cache.delete("k").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_cache_entries_expire() {
        let cache = MemoryCache::new();
        cache.set("k", "v", Duration::from_millis(20)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn background_cleanup_reclaims_unread_expired_entries() {
        let cache = MemoryCache::new();
        for i in 0..1000 {
            let key = format!("todos:list:user:u:page:{}", i);
            cache.set(&key, "v", Duration::from_millis(5)).await.unwrap();
        }
        cache.set("todos:get:keep", "v", Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.store.len(), 1001);

        let sweeper = cache.start_background_cleanup(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(80)).await;
        sweeper.abort();

        assert_eq!(cache.store.len(), 1);
        assert_eq!(cache.keys(), vec!["todos:get:keep".to_string()]);
    }

    #[tokio::test]
    async fn cleanup_expired_counts_removed_entries() {
        let cache = MemoryCache::new();
        cache.set("old", "v", Duration::from_millis(1)).await.unwrap();
        cache.set("new", "v", Duration::from_secs(60)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(cache.cleanup_expired(), 1);
        assert_eq!(cache.cleanup_expired(), 0);
    }

    #[tokio::test]
    async fn memory_cache_pattern_delete_is_scoped() {
        let cache = MemoryCache::new();
        let ttl = Duration::from_secs(60);
        cache.set("todos:list:user:a:page:1", "1", ttl).await.unwrap();
        cache.set("todos:list:user:a:page:2", "2", ttl).await.unwrap();
        cache.set("todos:list:user:b:page:1", "3", ttl).await.unwrap();
        cache.set("todos:get:a", "4", ttl).await.unwrap();

        let removed = cache.delete_pattern("todos:list:user:a:*").await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(
            cache.keys(),
            vec!["todos:get:a".to_string(), "todos:list:user:b:page:1".to_string()]
        );

        // Second run finds nothing left to delete.
        assert_eq!(cache.delete_pattern("todos:list:user:a:*").await.unwrap(), 0);
    }
}

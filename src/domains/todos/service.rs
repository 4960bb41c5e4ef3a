//! Cached, ownership-scoped reads and transactional writes for to-dos

use super::models::{CreateTodoRequest, Page, Todo, UpdateTodoRequest};
use super::query::{ListParams, QueryOptions, StoreQuery};
use super::repository::TodoRepository;
use crate::cache_key;
use crate::cache_ttl;
use crate::observability::metrics::{
    record_cache_access, record_cache_error, record_cache_invalidation,
};
use serde::{de::DeserializeOwned, Serialize};
use shared::{config::PaginationConfig, AppError, CacheStore, Identity, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use validator::Validate;

const LIST_CACHE: &str = "todo_list";
const ITEM_CACHE: &str = "todo_item";

pub struct TodoService {
    repo: Arc<dyn TodoRepository>,
    cache: Arc<dyn CacheStore>,
    pagination: PaginationConfig,
    list_ttl: Duration,
    item_ttl: Duration,
}

impl TodoService {
    pub fn new(
        repo: Arc<dyn TodoRepository>,
        cache: Arc<dyn CacheStore>,
        pagination: PaginationConfig,
    ) -> Self {
        Self {
            repo,
            cache,
            pagination,
            list_ttl: cache_ttl::get_todo_list_ttl(),
            item_ttl: cache_ttl::get_todo_item_ttl(),
        }
    }

    pub fn repository(&self) -> &Arc<dyn TodoRepository> {
        &self.repo
    }

    pub fn cache(&self) -> &Arc<dyn CacheStore> {
        &self.cache
    }

    // ========================================================================
    // READS
    // ========================================================================

    /// Paginated list in the caller's scope, served from cache when possible.
    pub async fn list(&self, identity: &Identity, params: &ListParams) -> Result<Page<Todo>> {
        let opts = QueryOptions::from_params(identity, params, &self.pagination)?;
        self.read_page(&opts).await
    }

    /// Same as [`list`](Self::list) but a title filter is mandatory.
    pub async fn search(&self, identity: &Identity, params: &ListParams) -> Result<Page<Todo>> {
        let opts = QueryOptions::from_params(identity, params, &self.pagination)?;
        if opts.title.is_none() {
            return Err(AppError::bad_request("title is required for search"));
        }
        self.read_page(&opts).await
    }

    async fn read_page(&self, opts: &QueryOptions) -> Result<Page<Todo>> {
        let key = cache_key::todo_list(opts);

        if let Some(page) = self.cache_get::<Page<Todo>>(&key, LIST_CACHE).await {
            return Ok(page);
        }

        let query = StoreQuery::from(opts);
        let (rows, total) = self.repo.find_page(&query).await.map_err(|e| {
            error!(key = %key, "Failed to query todo page: {}", e);
            e
        })?;

        let page = Page::new(rows, opts.page, opts.size, total);
        self.cache_put(&key, &page, self.list_ttl).await;
        Ok(page)
    }

    /// Single item by id. The ownership check runs on cache hits too.
    pub async fn get(&self, identity: &Identity, id: &str) -> Result<Todo> {
        let key = cache_key::todo_get(id);

        let todo = match self.cache_get::<Todo>(&key, ITEM_CACHE).await {
            Some(todo) => todo,
            None => {
                let todo = self
                    .repo
                    .find_by_id(id)
                    .await?
                    .ok_or_else(|| AppError::not_found(format!("todo {}", id)))?;
                self.cache_put(&key, &todo, self.item_ttl).await;
                todo
            }
        };

        identity.verify_ownership(&todo.owner_id)?;
        Ok(todo)
    }

    // ========================================================================
    // WRITES
    // ========================================================================

    pub async fn create(&self, identity: &Identity, request: CreateTodoRequest) -> Result<Todo> {
        request.validate()?;

        let todo = Todo::new(request.title, identity.owner());

        let mut tx = self.repo.begin().await?;
        tx.insert(&todo).await?;
        tx.commit().await.map_err(commit_failed)?;

        info!(todo_id = %todo.id, owner = %todo.owner_id, "Todo created");
        self.invalidate(None, &todo.owner_id).await;
        Ok(todo)
    }

    pub async fn update(
        &self,
        identity: &Identity,
        id: &str,
        request: UpdateTodoRequest,
    ) -> Result<Todo> {
        request.validate()?;

        let mut tx = self.repo.begin().await?;
        let mut todo = tx
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("todo {}", id)))?;
        identity.verify_ownership(&todo.owner_id)?;

        if !todo.apply(&request) {
            // Nothing to write; the dropped transaction releases the row.
            return Ok(todo);
        }

        tx.update(&todo).await?;
        tx.commit().await.map_err(commit_failed)?;

        info!(todo_id = %todo.id, owner = %todo.owner_id, "Todo updated");
        self.invalidate(Some(&todo.id), &todo.owner_id).await;
        Ok(todo)
    }

    pub async fn delete(&self, identity: &Identity, id: &str) -> Result<bool> {
        let mut tx = self.repo.begin().await?;
        let todo = tx
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("todo {}", id)))?;
        identity.verify_ownership(&todo.owner_id)?;

        if !tx.delete(id).await? {
            return Err(AppError::not_found(format!("todo {}", id)));
        }
        tx.commit().await.map_err(commit_failed)?;

        info!(todo_id = %todo.id, owner = %todo.owner_id, "Todo deleted");
        self.invalidate(Some(&todo.id), &todo.owner_id).await;
        Ok(true)
    }

    /// Drop every cached entry that could hold stale data for this owner's rows.
    /// Failures are logged and counted, never returned.
    pub async fn invalidate(&self, todo_id: Option<&str>, owner_id: &str) {
        let backend = self.cache.backend_name();

        if let Some(id) = todo_id {
            let key = cache_key::todo_get(id);
            match self.cache.delete(&key).await {
                Ok(()) => record_cache_invalidation(backend, "key", true),
                Err(e) => {
                    record_cache_invalidation(backend, "key", false);
                    warn!(key = %key, "Cache invalidation failed: {}", e);
                }
            }
        }

        for pattern in cache_key::todo_list_patterns_for_owner(owner_id) {
            match self.cache.delete_pattern(&pattern).await {
                Ok(deleted) => {
                    record_cache_invalidation(backend, "pattern", true);
                    debug!(pattern = %pattern, deleted, "Cache entries invalidated");
                }
                Err(e) => {
                    record_cache_invalidation(backend, "pattern", false);
                    warn!(pattern = %pattern, "Cache invalidation failed: {}", e);
                }
            }
        }
    }

    // ========================================================================
    // CACHE HELPERS
    // ========================================================================

    /// Backend errors and undecodable payloads both count as a miss.
    async fn cache_get<T: DeserializeOwned>(&self, key: &str, cache_name: &str) -> Option<T> {
        let backend = self.cache.backend_name();

        let raw = match self.cache.get(key).await {
            Ok(raw) => raw,
            Err(e) => {
                record_cache_error(backend, "get");
                warn!(key = %key, "Cache read failed, falling back to store: {}", e);
                None
            }
        };

        let value = raw.and_then(|payload| match serde_json::from_str::<T>(&payload) {
            Ok(value) => Some(value),
            Err(e) => {
                record_cache_error(backend, "decode");
                warn!(key = %key, "Discarding undecodable cache entry: {}", e);
                None
            }
        });

        record_cache_access(backend, cache_name, value.is_some());
        debug!(key = %key, hit = value.is_some(), "Cache lookup");
        value
    }

    async fn cache_put<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let backend = self.cache.backend_name();

        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(e) => {
                record_cache_error(backend, "encode");
                warn!(key = %key, "Failed to encode cache entry: {}", e);
                return;
            }
        };

        if let Err(e) = self.cache.set(key, &payload, ttl).await {
            record_cache_error(backend, "set");
            warn!(key = %key, "Cache write failed: {}", e);
        }
    }
}

fn commit_failed(e: AppError) -> AppError {
    error!("Transaction commit failed: {}", e);
    AppError::internal(format!("failed to commit transaction: {}", e))
}

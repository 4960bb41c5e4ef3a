//! In-process to-do store for local runs and the test suite

use super::models::Todo;
use super::query::{SortField, SortOrder, StoreQuery};
use super::repository::{TodoRepository, TodoTransaction};
use async_trait::async_trait;
use shared::{AppError, Result};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

type Rows = Arc<RwLock<HashMap<String, Todo>>>;

#[derive(Clone, Default)]
pub struct InMemoryTodoRepository {
    rows: Rows,
    /// Serializes writers the way row locks would.
    write_lock: Arc<Mutex<()>>,
}

impl InMemoryTodoRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }
}

enum Staged {
    Put(Todo),
    Remove(String),
}

/// Writes are staged and applied on commit; dropping discards them.
pub struct InMemoryTransaction {
    rows: Rows,
    staged: Vec<Staged>,
    _guard: OwnedMutexGuard<()>,
}

impl InMemoryTransaction {
    /// Latest view of a row: staged writes first, then committed state.
    async fn current(&self, id: &str) -> Option<Todo> {
        for op in self.staged.iter().rev() {
            match op {
                Staged::Put(todo) if todo.id == id => return Some(todo.clone()),
                Staged::Remove(removed) if removed == id => return None,
                _ => {}
            }
        }
        self.rows.read().await.get(id).cloned()
    }
}

#[async_trait]
impl TodoTransaction for InMemoryTransaction {
    async fn find_by_id(&mut self, id: &str) -> Result<Option<Todo>> {
        Ok(self.current(id).await)
    }

    async fn insert(&mut self, todo: &Todo) -> Result<()> {
        if self.current(&todo.id).await.is_some() {
            return Err(AppError::conflict(format!("todo {} already exists", todo.id)));
        }
        self.staged.push(Staged::Put(todo.clone()));
        Ok(())
    }

    async fn update(&mut self, todo: &Todo) -> Result<()> {
        if self.current(&todo.id).await.is_none() {
            return Err(AppError::not_found(format!("todo {}", todo.id)));
        }
        self.staged.push(Staged::Put(todo.clone()));
        Ok(())
    }

    async fn delete(&mut self, id: &str) -> Result<bool> {
        if self.current(id).await.is_none() {
            return Ok(false);
        }
        self.staged.push(Staged::Remove(id.to_string()));
        Ok(true)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let this = *self;
        let mut rows = this.rows.write().await;
        for op in this.staged {
            match op {
                Staged::Put(todo) => {
                    rows.insert(todo.id.clone(), todo);
                }
                Staged::Remove(id) => {
                    rows.remove(&id);
                }
            }
        }
        Ok(())
    }
}

fn compare(a: &Todo, b: &Todo, sort: SortField) -> Ordering {
    let primary = match sort {
        SortField::Id => Ordering::Equal,
        SortField::Title => a.title.cmp(&b.title),
        SortField::Done => a.done.cmp(&b.done),
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
    };
    primary.then_with(|| a.id.cmp(&b.id))
}

#[async_trait]
impl TodoRepository for InMemoryTodoRepository {
    async fn begin(&self) -> Result<Box<dyn TodoTransaction>> {
        let guard = self.write_lock.clone().lock_owned().await;
        Ok(Box::new(InMemoryTransaction {
            rows: self.rows.clone(),
            staged: Vec::new(),
            _guard: guard,
        }))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Todo>> {
        Ok(self.rows.read().await.get(id).cloned())
    }

    async fn find_page(&self, query: &StoreQuery) -> Result<(Vec<Todo>, i64)> {
        let needle = query.title_contains.as_ref().map(|t| t.to_lowercase());

        let mut matching: Vec<Todo> = self
            .rows
            .read()
            .await
            .values()
            .filter(|todo| {
                query
                    .owner_id
                    .as_deref()
                    .map_or(true, |owner| todo.owner_id == owner)
            })
            .filter(|todo| {
                needle
                    .as_deref()
                    .map_or(true, |n| todo.title.to_lowercase().contains(n))
            })
            .cloned()
            .collect();

        matching.sort_by(|a, b| {
            let ord = compare(a, b, query.sort);
            match query.order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });

        let total = matching.len() as i64;
        let offset = usize::try_from(query.offset.max(0)).unwrap_or(usize::MAX);
        let limit = usize::try_from(query.limit.max(0)).unwrap_or(usize::MAX);
        let window = matching.into_iter().skip(offset).take(limit).collect();

        Ok((window, total))
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn todo(id: &str, title: &str, owner: &str, age_secs: i64) -> Todo {
        let at = Utc::now() - Duration::seconds(age_secs);
        Todo {
            id: id.to_string(),
            title: title.to_string(),
            done: false,
            owner_id: owner.to_string(),
            created_at: at,
            updated_at: at,
        }
    }

    fn query(owner: Option<&str>) -> StoreQuery {
        StoreQuery {
            owner_id: owner.map(str::to_string),
            title_contains: None,
            sort: SortField::CreatedAt,
            order: SortOrder::Desc,
            offset: 0,
            limit: 10,
        }
    }

    async fn seeded() -> InMemoryTodoRepository {
        let repo = InMemoryTodoRepository::new();
        let mut tx = repo.begin().await.unwrap();
        tx.insert(&todo("1", "Buy milk", "alice", 30)).await.unwrap();
        tx.insert(&todo("2", "Walk the dog", "alice", 20)).await.unwrap();
        tx.insert(&todo("3", "buy BREAD", "bob", 10)).await.unwrap();
        tx.commit().await.unwrap();
        repo
    }

    #[tokio::test]
    async fn dropped_transaction_leaves_no_trace() {
        let repo = InMemoryTodoRepository::new();
        {
            let mut tx = repo.begin().await.unwrap();
            tx.insert(&todo("1", "never committed", "alice", 0)).await.unwrap();
            assert!(tx.find_by_id("1").await.unwrap().is_some());
        }
        assert_eq!(repo.len().await, 0);
        assert!(repo.find_by_id("1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn owner_and_case_insensitive_title_filters() {
        let repo = seeded().await;

        let (rows, total) = repo.find_page(&query(Some("alice"))).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(rows.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(), ["2", "1"]);

        let mut q = query(None);
        q.title_contains = Some("BUY".into());
        let (rows, total) = repo.find_page(&q).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(rows.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(), ["3", "1"]);
    }

    #[tokio::test]
    async fn window_reports_total_before_offset() {
        let repo = seeded().await;
        let mut q = query(None);
        q.limit = 2;
        q.offset = 2;

        let (rows, total) = repo.find_page(&q).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "1");
    }

    #[tokio::test]
    async fn duplicate_insert_conflicts() {
        let repo = seeded().await;
        let mut tx = repo.begin().await.unwrap();
        let err = tx.insert(&todo("1", "again", "alice", 0)).await.unwrap_err();
        assert_eq!(err.kind(), shared::ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn delete_is_staged_until_commit() {
        let repo = seeded().await;
        let mut tx = repo.begin().await.unwrap();
        assert!(tx.delete("1").await.unwrap());
        assert!(!tx.delete("1").await.unwrap());
        assert!(repo.find_by_id("1").await.unwrap().is_some());

        tx.commit().await.unwrap();
        assert!(repo.find_by_id("1").await.unwrap().is_none());
    }
}

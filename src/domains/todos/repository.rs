//! Store boundary for to-dos and its PostgreSQL implementation

use super::models::Todo;
use super::query::{SortOrder, StoreQuery};
use async_trait::async_trait;
use shared::Result;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};

const TODO_COLUMNS: &str = "id, title, done, owner_id, created_at, updated_at";

/// Write scope of a single request. Dropping it without `commit` rolls back.
#[async_trait]
pub trait TodoTransaction: Send {
    /// Reads through the transaction, locking the row where the store supports it.
    async fn find_by_id(&mut self, id: &str) -> Result<Option<Todo>>;
    async fn insert(&mut self, todo: &Todo) -> Result<()>;
    async fn update(&mut self, todo: &Todo) -> Result<()>;
    /// Returns whether a row was removed.
    async fn delete(&mut self, id: &str) -> Result<bool>;
    async fn commit(self: Box<Self>) -> Result<()>;
}

#[async_trait]
pub trait TodoRepository: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn TodoTransaction>>;
    async fn find_by_id(&self, id: &str) -> Result<Option<Todo>>;
    /// One window of matching rows plus the total match count before the window.
    async fn find_page(&self, query: &StoreQuery) -> Result<(Vec<Todo>, i64)>;
    async fn health_check(&self) -> Result<()>;
}

/// Escape `LIKE` metacharacters so user text only ever matches literally.
pub fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn push_filters(builder: &mut QueryBuilder<'static, Postgres>, query: &StoreQuery) {
    let mut separator = " WHERE ";
    if let Some(owner_id) = &query.owner_id {
        builder.push(separator).push("owner_id = ").push_bind(owner_id.clone());
        separator = " AND ";
    }
    if let Some(title) = &query.title_contains {
        builder
            .push(separator)
            .push("title ILIKE ")
            .push_bind(format!("%{}%", escape_like(title)))
            .push(" ESCAPE '\\'");
    }
}

fn order_sql(order: SortOrder) -> &'static str {
    match order {
        SortOrder::Asc => "ASC",
        SortOrder::Desc => "DESC",
    }
}

#[derive(Clone)]
pub struct PgTodoRepository {
    pool: PgPool,
}

impl PgTodoRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub struct PgTodoTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl TodoTransaction for PgTodoTransaction {
    async fn find_by_id(&mut self, id: &str) -> Result<Option<Todo>> {
        let todo = sqlx::query_as::<_, Todo>(&format!(
            "SELECT {} FROM todos WHERE id = $1 FOR UPDATE",
            TODO_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(todo)
    }

    async fn insert(&mut self, todo: &Todo) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO todos (id, title, done, owner_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&todo.id)
        .bind(&todo.title)
        .bind(todo.done)
        .bind(&todo.owner_id)
        .bind(todo.created_at)
        .bind(todo.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update(&mut self, todo: &Todo) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE todos
            SET title = $2, done = $3, updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(&todo.id)
        .bind(&todo.title)
        .bind(todo.done)
        .bind(todo.updated_at)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound.into());
        }
        Ok(())
    }

    async fn delete(&mut self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM todos WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl TodoRepository for PgTodoRepository {
    async fn begin(&self) -> Result<Box<dyn TodoTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTodoTransaction { tx }))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Todo>> {
        let todo = sqlx::query_as::<_, Todo>(&format!(
            "SELECT {} FROM todos WHERE id = $1",
            TODO_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(todo)
    }

    async fn find_page(&self, query: &StoreQuery) -> Result<(Vec<Todo>, i64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM todos");
        push_filters(&mut count, query);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        if total == 0 || query.offset >= total {
            return Ok((Vec::new(), total));
        }

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM todos", TODO_COLUMNS));
        push_filters(&mut select, query);

        // Column names come from the closed SortField enum, never from input.
        let direction = order_sql(query.order);
        select
            .push(" ORDER BY ")
            .push(query.sort.as_str())
            .push(" ")
            .push(direction)
            .push(", id ")
            .push(direction)
            .push(" LIMIT ")
            .push_bind(query.limit)
            .push(" OFFSET ")
            .push_bind(query.offset);

        let rows = select.build_query_as::<Todo>().fetch_all(&self.pool).await?;
        Ok((rows, total))
    }

    async fn health_check(&self) -> Result<()> {
        shared::database::health_check(&self.pool).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::todos::query::SortField;

    #[test]
    fn like_metacharacters_are_escaped() {
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
        assert_eq!(escape_like("a\\b"), "a\\\\b");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn page_sql_is_parameterized() {
        let query = StoreQuery {
            owner_id: Some("alice".into()),
            title_contains: Some("milk".into()),
            sort: SortField::Title,
            order: SortOrder::Asc,
            offset: 20,
            limit: 10,
        };
        let mut select = QueryBuilder::<Postgres>::new("SELECT * FROM todos");
        push_filters(&mut select, &query);

        assert_eq!(
            select.sql(),
            "SELECT * FROM todos WHERE owner_id = $1 AND title ILIKE $2 ESCAPE '\\'"
        );

        let mut unscoped = QueryBuilder::<Postgres>::new("SELECT * FROM todos");
        push_filters(
            &mut unscoped,
            &StoreQuery { owner_id: None, title_contains: None, ..query },
        );
        assert_eq!(unscoped.sql(), "SELECT * FROM todos");
    }
}

//! To-do domain models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

// ======================================================================
// STORED ROW
// ======================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Todo {
    pub id: String,
    pub title: String,
    pub done: bool,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Todo {
    pub fn new(title: String, owner_id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title,
            done: false,
            owner_id: owner_id.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply only the fields present in the patch. Returns whether anything changed.
    pub fn apply(&mut self, patch: &UpdateTodoRequest) -> bool {
        let mut changed = false;
        if let Some(title) = &patch.title {
            if *title != self.title {
                self.title = title.clone();
                changed = true;
            }
        }
        if let Some(done) = patch.done {
            if done != self.done {
                self.done = done;
                changed = true;
            }
        }
        if changed {
            self.updated_at = Utc::now().max(self.updated_at);
        }
        changed
    }
}

// ======================================================================
// RESPONSES
// ======================================================================

/// Item as returned to a caller. The owner is only disclosed to admins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodoView {
    pub id: String,
    pub title: String,
    pub done: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TodoView {
    pub fn from_todo(todo: Todo, show_owner: bool) -> Self {
        Self {
            id: todo.id,
            title: todo.title,
            done: todo.done,
            user_id: show_owner.then_some(todo.owner_id),
            created_at: todo.created_at,
            updated_at: todo.updated_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paging {
    pub page: i64,
    pub size: i64,
    pub total_items: i64,
    pub total_pages: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub paging: Paging,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, page: i64, size: i64, total_items: i64) -> Self {
        let total_pages = if size > 0 {
            (total_items + size - 1) / size
        } else {
            0
        };
        Self {
            data,
            paging: Paging {
                page,
                size,
                total_items,
                total_pages,
            },
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            paging: self.paging,
        }
    }
}

/// `{"data": ...}` wrapper for single-value responses
#[derive(Debug, Serialize, Deserialize)]
pub struct DataResponse<T> {
    pub data: T,
}

// ======================================================================
// REQUESTS
// ======================================================================

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateTodoRequest {
    #[validate(length(min = 5, max = 255))]
    pub title: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[validate(schema(function = "validate_update_has_field"))]
pub struct UpdateTodoRequest {
    #[validate(length(min = 5, max = 255))]
    pub title: Option<String>,
    pub done: Option<bool>,
}

fn validate_update_has_field(req: &UpdateTodoRequest) -> Result<(), ValidationError> {
    if req.title.is_none() && req.done.is_none() {
        let mut err = ValidationError::new("empty_update");
        err.message = Some("at least one of title or done is required".into());
        return Err(err);
    }
    Ok(())
}

/// Ids are server-generated UUIDs; anything else cannot exist.
pub fn validate_todo_id(id: &str) -> Result<(), shared::AppError> {
    Uuid::parse_str(id)
        .map(|_| ())
        .map_err(|_| shared::AppError::bad_request(format!("invalid todo id: {}", id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(Page::<()>::new(vec![], 1, 3, 5).paging.total_pages, 2);
        assert_eq!(Page::<()>::new(vec![], 1, 5, 5).paging.total_pages, 1);
        assert_eq!(Page::<()>::new(vec![], 1, 10, 0).paging.total_pages, 0);
        assert_eq!(Page::<()>::new(vec![], 1, 1, 7).paging.total_pages, 7);
    }

    #[test]
    fn owner_is_hidden_from_non_admins() {
        let todo = Todo::new("write tests".into(), "alice");

        let user_json = serde_json::to_value(TodoView::from_todo(todo.clone(), false)).unwrap();
        assert!(user_json.get("user_id").is_none());

        let admin_json = serde_json::to_value(TodoView::from_todo(todo, true)).unwrap();
        assert_eq!(admin_json["user_id"], "alice");
    }

    #[test]
    fn patch_touches_only_present_fields() {
        let mut todo = Todo::new("original title".into(), "alice");
        let before = todo.clone();

        assert!(todo.apply(&UpdateTodoRequest { title: None, done: Some(true) }));
        assert!(todo.done);
        assert_eq!(todo.title, before.title);
        assert!(todo.updated_at >= before.updated_at);

        assert!(!todo.apply(&UpdateTodoRequest { title: None, done: Some(true) }));
    }

    #[test]
    fn request_validation() {
        assert!(CreateTodoRequest { title: "tiny".into() }.validate().is_err());
        assert!(CreateTodoRequest { title: "long enough".into() }.validate().is_ok());
        assert!(CreateTodoRequest { title: "x".repeat(256) }.validate().is_err());

        assert!(UpdateTodoRequest::default().validate().is_err());
        assert!(UpdateTodoRequest { title: Some("tiny".into()), done: None }.validate().is_err());
        assert!(UpdateTodoRequest { title: None, done: Some(false) }.validate().is_ok());

        assert!(validate_todo_id("not-a-uuid").is_err());
        assert!(validate_todo_id(&Uuid::new_v4().to_string()).is_ok());
    }
}

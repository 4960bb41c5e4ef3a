pub mod memory;
pub mod models;
pub mod query;
pub mod repository;
pub mod service;

pub use memory::InMemoryTodoRepository;
pub use models::{CreateTodoRequest, DataResponse, Page, Paging, Todo, TodoView, UpdateTodoRequest};
pub use query::{AccessScope, ListParams, QueryOptions, SortField, SortOrder, StoreQuery};
pub use repository::{PgTodoRepository, TodoRepository, TodoTransaction};
pub use service::TodoService;

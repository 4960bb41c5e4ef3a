use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use shared::{AppError, Identity, Result};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::domains::todos::{
    models::validate_todo_id, CreateTodoRequest, DataResponse, ListParams, Page, Todo, TodoView,
    UpdateTodoRequest,
};
use crate::state::AppState;

pub fn create_todos_v1_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_todos).post(create_todo))
        .route("/search", get(search_todos))
        .route("/:id", get(get_todo).put(update_todo).delete(delete_todo))
}

fn query_params(query: std::result::Result<Query<ListParams>, QueryRejection>) -> Result<ListParams> {
    query
        .map(|Query(params)| params)
        .map_err(|e| AppError::bad_request(e.body_text()))
}

fn json_body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| AppError::bad_request(e.body_text()))
}

fn to_view(identity: &Identity) -> impl Fn(Todo) -> TodoView {
    let show_owner = identity.is_admin();
    move |todo| TodoView::from_todo(todo, show_owner)
}

/// GET /api/v1/todo - paginated list in the caller's scope
///
/// **Query Parameters:** `page`, `size`, `title`, `sort`, `order`, `user_id` (admins only)
async fn list_todos(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    query: std::result::Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Page<TodoView>>> {
    let start_time = Instant::now();
    let params = query_params(query)?;

    let page = state.todos.list(&identity, &params).await?;

    info!(
        user_id = %identity.user_id,
        items = page.data.len(),
        total = page.paging.total_items,
        "Listed todos in {:?}ms",
        start_time.elapsed().as_millis()
    );
    Ok(Json(page.map(to_view(&identity))))
}

/// GET /api/v1/todo/search?title=... - list with a mandatory title filter
async fn search_todos(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    query: std::result::Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Page<TodoView>>> {
    let params = query_params(query)?;
    let page = state.todos.search(&identity, &params).await?;
    Ok(Json(page.map(to_view(&identity))))
}

/// GET /api/v1/todo/:id
async fn get_todo(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<DataResponse<TodoView>>> {
    validate_todo_id(&id)?;
    let todo = state.todos.get(&identity, &id).await?;
    Ok(Json(DataResponse {
        data: to_view(&identity)(todo),
    }))
}

/// POST /api/v1/todo
async fn create_todo(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    payload: std::result::Result<Json<CreateTodoRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DataResponse<TodoView>>)> {
    let request = json_body(payload)?;
    let todo = state.todos.create(&identity, request).await?;
    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: to_view(&identity)(todo),
        }),
    ))
}

/// PUT /api/v1/todo/:id - patch title and/or done
async fn update_todo(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<String>,
    payload: std::result::Result<Json<UpdateTodoRequest>, JsonRejection>,
) -> Result<Json<DataResponse<TodoView>>> {
    validate_todo_id(&id)?;
    let request = json_body(payload)?;
    let todo = state.todos.update(&identity, &id, request).await?;
    Ok(Json(DataResponse {
        data: to_view(&identity)(todo),
    }))
}

/// DELETE /api/v1/todo/:id
async fn delete_todo(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<DataResponse<bool>>> {
    validate_todo_id(&id)?;
    let deleted = state.todos.delete(&identity, &id).await?;
    Ok(Json(DataResponse { data: deleted }))
}

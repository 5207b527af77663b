use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, StatusCode},
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{extractors::AuthUser, middleware::require_auth},
    error::AppResult,
    state::AppState,
    todos::{
        dto::{CreateTodoRequest, ListTodosQuery, TodoListResponse, TodoResponse, UpdateTodoRequest},
        services::TodoService,
    },
};

/// Every todo route sits behind the bearer-token middleware.
pub fn todo_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/todos", get(list_todos).post(create_todo))
        .route("/todos/:id", get(get_todo).put(update_todo).delete(delete_todo))
        .route_layer(from_fn_with_state(state, require_auth))
}

// The id stays a string so a malformed id reads as "not found".

#[instrument(skip_all, fields(user_id = %user.id, email = %user.email))]
pub async fn create_todo(
    State(todos): State<TodoService>,
    user: AuthUser,
    payload: Result<Json<CreateTodoRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(payload) = payload?;
    let todo = todos
        .create(user.id, &payload.title, payload.description.as_deref().unwrap_or_default())
        .await?;
    let location = format!("/api/v1/todos/{}", todo.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(TodoResponse::from(todo)),
    ))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn list_todos(
    State(todos): State<TodoService>,
    user: AuthUser,
    query: Result<Query<ListTodosQuery>, QueryRejection>,
) -> AppResult<Json<TodoListResponse>> {
    let Query(q) = query?;
    let page = todos.list(user.id, q.page, q.limit).await?;
    Ok(Json(page.into()))
}

#[instrument(skip_all, fields(user_id = %user.id, todo_id = %id))]
pub async fn get_todo(
    State(todos): State<TodoService>,
    user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<TodoResponse>> {
    let todo = todos.get(user.id, &id).await?;
    Ok(Json(todo.into()))
}

#[instrument(skip_all, fields(user_id = %user.id, todo_id = %id))]
pub async fn update_todo(
    State(todos): State<TodoService>,
    user: AuthUser,
    Path(id): Path<String>,
    payload: Result<Json<UpdateTodoRequest>, JsonRejection>,
) -> AppResult<Json<TodoResponse>> {
    let Json(payload) = payload?;
    let todo = todos
        .update(
            user.id,
            &id,
            &payload.title,
            payload.description.as_deref().unwrap_or_default(),
            payload.completed,
        )
        .await?;
    Ok(Json(todo.into()))
}

#[instrument(skip_all, fields(user_id = %user.id, todo_id = %id))]
pub async fn delete_todo(
    State(todos): State<TodoService>,
    user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    todos.delete(user.id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

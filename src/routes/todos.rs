//! Todo CRUD. Every query is scoped by the gate-admitted user id, so another
//! user's row is indistinguishable from a missing one.

use crate::auth::AuthUser;
use crate::db::TodoDb;
use crate::error::ApiError;
use crate::models::{CreateTodoRequest, DataResponse, Todo, UpdateTodoRequest, normalize_title};
use rocket::response::status;
use rocket::serde::json::Json;
use rocket::{delete, get, post, put};
use rocket_db_pools::{Connection, sqlx};
use rocket_okapi::openapi;

const TODO_COLUMNS: &str = "id, user_id, title, description, completed, created_at, updated_at";

fn not_found(id: i32) -> ApiError {
    ApiError::NotFound(format!("Todo {id} not found"))
}

/// Create a todo owned by the caller
#[openapi(tag = "Todos")]
#[post("/todos", data = "<payload>")]
pub async fn create_todo(
    user: AuthUser,
    mut db: Connection<TodoDb>,
    payload: Json<CreateTodoRequest>,
) -> Result<status::Created<Json<Todo>>, ApiError> {
    let title = payload
        .normalized_title()
        .ok_or_else(|| ApiError::BadRequest("title is required".to_string()))?;

    let todo: Todo = sqlx::query_as(&format!(
        "INSERT INTO todos (user_id, title, description, completed) VALUES ($1, $2, $3, $4) RETURNING {TODO_COLUMNS}"
    ))
    .bind(user.id)
    .bind(&title)
    .bind(payload.description.as_deref())
    .bind(payload.completed)
    .fetch_one(&mut **db)
    .await?;

    log::debug!("user {} created todo {}", user.id, todo.id);
    let location = format!("/todos/{}", todo.id);
    Ok(status::Created::new(location).body(Json(todo)))
}

/// List the caller's todos, newest first
#[openapi(tag = "Todos")]
#[get("/todos")]
pub async fn list_todos(
    user: AuthUser,
    mut db: Connection<TodoDb>,
) -> Result<Json<DataResponse<Vec<Todo>>>, ApiError> {
    let todos: Vec<Todo> = sqlx::query_as(&format!(
        "SELECT {TODO_COLUMNS} FROM todos WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
    ))
    .bind(user.id)
    .fetch_all(&mut **db)
    .await?;

    Ok(Json(DataResponse { data: todos }))
}

/// Get one of the caller's todos
#[openapi(tag = "Todos")]
#[get("/todos/<id>")]
pub async fn get_todo(
    id: i32,
    user: AuthUser,
    mut db: Connection<TodoDb>,
) -> Result<Json<Todo>, ApiError> {
    let todo: Option<Todo> = sqlx::query_as(&format!(
        "SELECT {TODO_COLUMNS} FROM todos WHERE id = $1 AND user_id = $2"
    ))
    .bind(id)
    .bind(user.id)
    .fetch_optional(&mut **db)
    .await?;

    todo.map(Json).ok_or_else(|| not_found(id))
}

/// Update fields of one of the caller's todos
#[openapi(tag = "Todos")]
#[put("/todos/<id>", data = "<payload>")]
pub async fn update_todo(
    id: i32,
    user: AuthUser,
    mut db: Connection<TodoDb>,
    payload: Json<UpdateTodoRequest>,
) -> Result<Json<Todo>, ApiError> {
    if payload.is_empty() {
        return Err(ApiError::BadRequest(
            "at least one of title, description or completed is required".to_string(),
        ));
    }

    let title = match payload.title.as_deref() {
        Some(raw) => Some(
            normalize_title(raw)
                .ok_or_else(|| ApiError::BadRequest("title must not be blank".to_string()))?,
        ),
        None => None,
    };

    let todo: Option<Todo> = sqlx::query_as(&format!(
        r#"UPDATE todos
           SET title = COALESCE($1, title),
               description = COALESCE($2, description),
               completed = COALESCE($3, completed),
               updated_at = NOW()
           WHERE id = $4 AND user_id = $5
           RETURNING {TODO_COLUMNS}"#
    ))
    .bind(title)
    .bind(payload.description.as_deref())
    .bind(payload.completed)
    .bind(id)
    .bind(user.id)
    .fetch_optional(&mut **db)
    .await?;

    todo.map(Json).ok_or_else(|| not_found(id))
}

/// Delete one of the caller's todos, returning the removed row
#[openapi(tag = "Todos")]
#[delete("/todos/<id>")]
pub async fn delete_todo(
    id: i32,
    user: AuthUser,
    mut db: Connection<TodoDb>,
) -> Result<Json<Todo>, ApiError> {
    let todo: Option<Todo> = sqlx::query_as(&format!(
        "DELETE FROM todos WHERE id = $1 AND user_id = $2 RETURNING {TODO_COLUMNS}"
    ))
    .bind(id)
    .bind(user.id)
    .fetch_optional(&mut **db)
    .await?;

    let todo = todo.ok_or_else(|| not_found(id))?;
    log::debug!("user {} deleted todo {}", user.id, todo.id);
    Ok(Json(todo))
}

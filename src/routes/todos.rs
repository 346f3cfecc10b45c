use crate::{
    auth::AuthenticatedUser,
    error::AppError,
    models::{Todo, TodoInput, TodoUpdate},
    routes::current_user_id,
};
use actix_web::{delete, get, post, put, web, HttpResponse, Responder};
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

/// Lists the caller's todos, newest first.
#[get("")]
pub async fn get_todos(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let user_id = current_user_id(&pool, &user).await?;

    let todos = sqlx::query_as::<_, Todo>(
        "SELECT id, user_id, title, description, is_complete, created_at, updated_at
         FROM todos WHERE user_id = $1
         ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(&**pool)
    .await?;

    Ok(HttpResponse::Ok().json(todos))
}

/// Creates a todo owned by the caller.
///
/// ## Responses:
/// - `201 Created`: `{"message", "id"}`.
/// - `404 Not Found`: the caller has no local account.
/// - `422 Unprocessable Entity`: title or description out of bounds.
#[post("")]
pub async fn create_todo(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    todo_data: web::Json<TodoInput>,
) -> Result<impl Responder, AppError> {
    todo_data.validate()?;
    let user_id = current_user_id(&pool, &user).await?;

    let todo_id: i32 = sqlx::query_scalar(
        "INSERT INTO todos (user_id, title, description) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(user_id)
    .bind(&todo_data.title)
    .bind(&todo_data.description)
    .fetch_one(&**pool)
    .await?;

    Ok(HttpResponse::Created().json(json!({
        "message": "ToDo created successfully.",
        "id": todo_id
    })))
}

/// Partially updates one of the caller's todos.
#[put("/{id}")]
pub async fn update_todo(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    todo_id: web::Path<i32>,
    todo_data: web::Json<TodoUpdate>,
) -> Result<impl Responder, AppError> {
    todo_data.validate()?;
    let user_id = current_user_id(&pool, &user).await?;

    let result = sqlx::query(
        "UPDATE todos
         SET title = COALESCE($1, title),
             description = COALESCE($2, description),
             is_complete = COALESCE($3, is_complete),
             updated_at = NOW()
         WHERE id = $4 AND user_id = $5",
    )
    .bind(&todo_data.title)
    .bind(&todo_data.description)
    .bind(todo_data.is_complete)
    .bind(todo_id.into_inner())
    .bind(user_id)
    .execute(&**pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("ToDo not found.".into()));
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "ToDo updated successfully." })))
}

#[delete("/{id}")]
pub async fn delete_todo(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    todo_id: web::Path<i32>,
) -> Result<impl Responder, AppError> {
    let user_id = current_user_id(&pool, &user).await?;

    let result = sqlx::query("DELETE FROM todos WHERE id = $1 AND user_id = $2")
        .bind(todo_id.into_inner())
        .bind(user_id)
        .execute(&**pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("ToDo not found.".into()));
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "ToDo deleted successfully." })))
}

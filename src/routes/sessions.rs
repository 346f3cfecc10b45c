use crate::{
    auth::AuthenticatedUser,
    error::AppError,
    models::{SessionStatus, StartSession, StopSession, WorkSession},
    routes::current_user_id,
};
use actix_web::{get, post, web, HttpResponse, Responder};
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

/// Starts a work session of `duration` minutes.
#[post("/start")]
pub async fn start_session(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    session_data: web::Json<StartSession>,
) -> Result<impl Responder, AppError> {
    session_data.validate()?;
    let user_id = current_user_id(&pool, &user).await?;

    let session_id: i32 = sqlx::query_scalar(
        "INSERT INTO work_sessions (user_id, start_time, duration, status)
         VALUES ($1, NOW(), $2, $3)
         RETURNING id",
    )
    .bind(user_id)
    .bind(session_data.duration)
    .bind(SessionStatus::Running)
    .fetch_one(&**pool)
    .await?;

    Ok(HttpResponse::Created().json(json!({
        "message": "Session started successfully.",
        "session_id": session_id
    })))
}

/// Stops one of the caller's sessions, recording its end time.
#[post("/stop")]
pub async fn stop_session(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    session_data: web::Json<StopSession>,
) -> Result<impl Responder, AppError> {
    let user_id = current_user_id(&pool, &user).await?;

    let result = sqlx::query(
        "UPDATE work_sessions SET end_time = NOW(), status = $1 WHERE id = $2 AND user_id = $3",
    )
    .bind(SessionStatus::Stopped)
    .bind(session_data.session_id)
    .bind(user_id)
    .execute(&**pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Session not found.".into()));
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "Session stopped successfully." })))
}

/// The caller's sessions, most recent first.
#[get("/history")]
pub async fn session_history(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let user_id = current_user_id(&pool, &user).await?;

    let sessions = sqlx::query_as::<_, WorkSession>(
        "SELECT id, user_id, start_time, end_time, duration, status, created_at
         FROM work_sessions WHERE user_id = $1
         ORDER BY start_time DESC",
    )
    .bind(user_id)
    .fetch_all(&**pool)
    .await?;

    Ok(HttpResponse::Ok().json(sessions))
}

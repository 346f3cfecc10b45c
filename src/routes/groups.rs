use crate::{
    auth::AuthenticatedUser,
    error::AppError,
    models::{Channel, ChannelInput, StudyGroup, StudyGroupInput},
    routes::current_user_id,
};
use actix_web::{delete, get, post, web, HttpResponse, Responder};
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

/// Groups the caller belongs to.
#[get("")]
pub async fn list_groups(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let user_id = current_user_id(&pool, &user).await?;

    let groups = sqlx::query_as::<_, StudyGroup>(
        "SELECT g.id, g.creator_id, g.group_name, g.created_at, g.updated_at
         FROM study_groups g
         JOIN study_group_members m ON m.group_id = g.id
         WHERE m.user_id = $1
         ORDER BY g.created_at DESC",
    )
    .bind(user_id)
    .fetch_all(&**pool)
    .await?;

    Ok(HttpResponse::Ok().json(groups))
}

/// Creates a group; the creator becomes its first member.
#[post("")]
pub async fn create_group(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    group_data: web::Json<StudyGroupInput>,
) -> Result<impl Responder, AppError> {
    group_data.validate()?;
    let user_id = current_user_id(&pool, &user).await?;

    let mut tx = pool.begin().await?;

    let group = sqlx::query_as::<_, StudyGroup>(
        "INSERT INTO study_groups (creator_id, group_name) VALUES ($1, $2)
         RETURNING id, creator_id, group_name, created_at, updated_at",
    )
    .bind(user_id)
    .bind(&group_data.group_name)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("INSERT INTO study_group_members (user_id, group_id) VALUES ($1, $2)")
        .bind(user_id)
        .bind(group.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    log::info!("User {} created study group {}", user_id, group.id);
    Ok(HttpResponse::Created().json(group))
}

/// Joins a group. Joining twice is a no-op.
#[post("/{id}/members")]
pub async fn join_group(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    group_id: web::Path<i32>,
) -> Result<impl Responder, AppError> {
    let user_id = current_user_id(&pool, &user).await?;
    let group_id = group_id.into_inner();

    ensure_group_exists(&pool, group_id).await?;

    sqlx::query(
        "INSERT INTO study_group_members (user_id, group_id) VALUES ($1, $2)
         ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(group_id)
    .execute(&**pool)
    .await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "Joined study group." })))
}

#[delete("/{id}/members")]
pub async fn leave_group(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    group_id: web::Path<i32>,
) -> Result<impl Responder, AppError> {
    let user_id = current_user_id(&pool, &user).await?;

    let result = sqlx::query("DELETE FROM study_group_members WHERE user_id = $1 AND group_id = $2")
        .bind(user_id)
        .bind(group_id.into_inner())
        .execute(&**pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Not a member of this study group.".into()));
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "Left study group." })))
}

/// Channels of a group. Members only.
#[get("/{id}/channels")]
pub async fn list_channels(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    group_id: web::Path<i32>,
) -> Result<impl Responder, AppError> {
    let user_id = current_user_id(&pool, &user).await?;
    let group_id = group_id.into_inner();

    ensure_member(&pool, user_id, group_id).await?;

    let channels = sqlx::query_as::<_, Channel>(
        "SELECT c.id, c.creator_id, c.channel_name, c.created_at, c.updated_at
         FROM channels c
         JOIN study_group_channels gc ON gc.channel_id = c.id
         WHERE gc.group_id = $1
         ORDER BY c.created_at",
    )
    .bind(group_id)
    .fetch_all(&**pool)
    .await?;

    Ok(HttpResponse::Ok().json(channels))
}

/// Creates a channel inside a group. Members only.
#[post("/{id}/channels")]
pub async fn create_channel(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    group_id: web::Path<i32>,
    channel_data: web::Json<ChannelInput>,
) -> Result<impl Responder, AppError> {
    channel_data.validate()?;
    let user_id = current_user_id(&pool, &user).await?;
    let group_id = group_id.into_inner();

    ensure_member(&pool, user_id, group_id).await?;

    let mut tx = pool.begin().await?;

    let channel = sqlx::query_as::<_, Channel>(
        "INSERT INTO channels (creator_id, channel_name) VALUES ($1, $2)
         RETURNING id, creator_id, channel_name, created_at, updated_at",
    )
    .bind(user_id)
    .bind(&channel_data.channel_name)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("INSERT INTO study_group_channels (group_id, channel_id) VALUES ($1, $2)")
        .bind(group_id)
        .bind(channel.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(HttpResponse::Created().json(channel))
}

async fn ensure_group_exists(pool: &PgPool, group_id: i32) -> Result<(), AppError> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM study_groups WHERE id = $1)")
        .bind(group_id)
        .fetch_one(pool)
        .await?;

    if exists {
        Ok(())
    } else {
        Err(AppError::NotFound("Study group not found.".into()))
    }
}

async fn ensure_member(pool: &PgPool, user_id: i32, group_id: i32) -> Result<(), AppError> {
    ensure_group_exists(pool, group_id).await?;

    let member: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM study_group_members WHERE user_id = $1 AND group_id = $2)",
    )
    .bind(user_id)
    .bind(group_id)
    .fetch_one(pool)
    .await?;

    if member {
        Ok(())
    } else {
        Err(AppError::Forbidden("Not a member of this study group.".into()))
    }
}

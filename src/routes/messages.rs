use crate::{
    auth::AuthenticatedUser,
    error::AppError,
    models::{Message, MessageInput},
    routes::current_user_id,
};
use actix_web::{get, patch, post, web, HttpResponse, Responder};
use sqlx::PgPool;
use validator::Validate;

/// Messages of a channel, oldest first.
///
/// The caller must belong to a study group the channel is linked to.
#[get("/{id}/messages")]
pub async fn list_messages(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    channel_id: web::Path<i32>,
) -> Result<impl Responder, AppError> {
    let user_id = current_user_id(&pool, &user).await?;
    let channel_id = channel_id.into_inner();

    ensure_channel_access(&pool, user_id, channel_id).await?;

    let messages = sqlx::query_as::<_, Message>(
        "SELECT m.id, m.sender_id, m.text, m.sent_at, m.edited_at
         FROM messages m
         JOIN channel_messages cm ON cm.message_id = m.id
         WHERE cm.channel_id = $1
         ORDER BY m.sent_at",
    )
    .bind(channel_id)
    .fetch_all(&**pool)
    .await?;

    Ok(HttpResponse::Ok().json(messages))
}

#[post("/{id}/messages")]
pub async fn post_message(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    channel_id: web::Path<i32>,
    message_data: web::Json<MessageInput>,
) -> Result<impl Responder, AppError> {
    message_data.validate()?;
    let user_id = current_user_id(&pool, &user).await?;
    let channel_id = channel_id.into_inner();

    ensure_channel_access(&pool, user_id, channel_id).await?;

    let mut tx = pool.begin().await?;

    let message = sqlx::query_as::<_, Message>(
        "INSERT INTO messages (sender_id, text) VALUES ($1, $2)
         RETURNING id, sender_id, text, sent_at, edited_at",
    )
    .bind(user_id)
    .bind(&message_data.text)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("INSERT INTO channel_messages (channel_id, message_id) VALUES ($1, $2)")
        .bind(channel_id)
        .bind(message.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(HttpResponse::Created().json(message))
}

/// Edits a message. Only its sender may do so.
#[patch("/{id}")]
pub async fn edit_message(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    message_id: web::Path<i32>,
    message_data: web::Json<MessageInput>,
) -> Result<impl Responder, AppError> {
    message_data.validate()?;
    let user_id = current_user_id(&pool, &user).await?;

    let message = sqlx::query_as::<_, Message>(
        "UPDATE messages SET text = $1, edited_at = NOW()
         WHERE id = $2 AND sender_id = $3
         RETURNING id, sender_id, text, sent_at, edited_at",
    )
    .bind(&message_data.text)
    .bind(message_id.into_inner())
    .bind(user_id)
    .fetch_optional(&**pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Message not found.".into()))?;

    Ok(HttpResponse::Ok().json(message))
}

async fn ensure_channel_access(pool: &PgPool, user_id: i32, channel_id: i32) -> Result<(), AppError> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM channels WHERE id = $1)")
        .bind(channel_id)
        .fetch_one(pool)
        .await?;

    if !exists {
        return Err(AppError::NotFound("Channel not found.".into()));
    }

    let allowed: bool = sqlx::query_scalar(
        "SELECT EXISTS(
             SELECT 1 FROM study_group_channels gc
             JOIN study_group_members m ON m.group_id = gc.group_id
             WHERE gc.channel_id = $1 AND m.user_id = $2
         )",
    )
    .bind(channel_id)
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    if allowed {
        Ok(())
    } else {
        Err(AppError::Forbidden("Not a member of this channel's study group.".into()))
    }
}

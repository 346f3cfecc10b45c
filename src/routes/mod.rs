pub mod groups;
pub mod health;
pub mod messages;
pub mod sessions;
pub mod todos;
pub mod users;

use actix_web::web;
use sqlx::PgPool;

use crate::auth::{AuthMiddleware, AuthenticatedUser};
use crate::error::AppError;

/// Registers every route. Expects `web::Data<PgPool>` and
/// `web::Data<Authenticator>` on the app.
///
/// `/users` handlers authenticate through the `AuthenticatedUser` extractor;
/// the remaining scopes are additionally guarded by `AuthMiddleware`.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(health::index)
        .service(health::health)
        .service(
            web::scope("/users")
                .service(users::register)
                .service(users::login)
                .service(users::logout)
                .service(users::profile)
                .service(users::update_profile)
                .service(users::delete_user),
        )
        .service(
            web::scope("/todos")
                .wrap(AuthMiddleware)
                .service(todos::get_todos)
                .service(todos::create_todo)
                .service(todos::update_todo)
                .service(todos::delete_todo),
        )
        .service(
            web::scope("/sessions")
                .wrap(AuthMiddleware)
                .service(sessions::start_session)
                .service(sessions::stop_session)
                .service(sessions::session_history),
        )
        .service(
            web::scope("/groups")
                .wrap(AuthMiddleware)
                .service(groups::list_groups)
                .service(groups::create_group)
                .service(groups::join_group)
                .service(groups::leave_group)
                .service(groups::list_channels)
                .service(groups::create_channel),
        )
        .service(
            web::scope("/channels")
                .wrap(AuthMiddleware)
                .service(messages::list_messages)
                .service(messages::post_message),
        )
        .service(
            web::scope("/messages")
                .wrap(AuthMiddleware)
                .service(messages::edit_message),
        );
}

/// Local account ID linked to the caller's identity-provider subject.
pub(crate) async fn current_user_id(
    pool: &PgPool,
    user: &AuthenticatedUser,
) -> Result<i32, AppError> {
    sqlx::query_scalar::<_, i32>("SELECT id FROM users WHERE sub = $1")
        .bind(user.sub())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found.".into()))
}

use crate::{
    auth::{extract_token, hash_password, AuthenticatedUser, Authenticator, Claims, RegisterRequest},
    error::AppError,
    models::{
        user::{numbered_username, username_from_claims},
        Profile, ProfileUpdate, User,
    },
};
use actix_web::{delete, get, patch, post, web, HttpRequest, HttpResponse, Responder};
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

/// Register a local account
///
/// ## Responses:
/// - `201 Created`: `{"message", "uID"}`.
/// - `400 Bad Request`: username or email already taken.
/// - `422 Unprocessable Entity`: validation failed.
#[post("/register")]
pub async fn register(
    pool: web::Data<PgPool>,
    register_data: web::Json<RegisterRequest>,
) -> Result<impl Responder, AppError> {
    register_data.validate()?;

    let password_hash = hash_password(&register_data.password)?;

    let user_id: i32 = sqlx::query_scalar(
        "INSERT INTO users (username, email, password_hash, role, updated_at)
         VALUES ($1, $2, $3, 1, NOW())
         RETURNING id",
    )
    .bind(&register_data.username)
    .bind(&register_data.email)
    .bind(password_hash)
    .fetch_one(&**pool)
    .await?;

    log::info!("Registered user {}", user_id);
    Ok(HttpResponse::Created().json(json!({
        "message": "User created successfully.",
        "uID": user_id
    })))
}

/// Numbered alternatives tried when a derived username is already taken.
const USERNAME_ATTEMPTS: u32 = 50;

/// Log in with an identity-provider token
///
/// Verifies the bearer token and returns its subject. When the token carries
/// an `email` claim, the caller's local account is provisioned:
/// - an account already linked to the subject is reused and its email refreshed;
/// - otherwise an unlinked account with that email is linked, provided the
///   provider has verified the email;
/// - otherwise a new account is created.
///
/// ## Responses:
/// - `200 OK`: `{"success", "message", "user"}`.
/// - `403 Forbidden`: linking an existing account requires `email_verified`.
/// - `409 Conflict`: the email belongs to an account linked to another subject.
#[post("/login")]
pub async fn login(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    if let Some(email) = user.claims.email.as_deref() {
        let account = provision_user(&pool, &user.claims, email).await?;
        log::info!("User {} logged in as {}", account.id, user.sub());
    }

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "User authenticated",
        "user": user.sub()
    })))
}

async fn provision_user(pool: &PgPool, claims: &Claims, email: &str) -> Result<User, AppError> {
    // The email is only refreshed when no other account uses it.
    let linked = sqlx::query_as::<_, User>(
        "UPDATE users
         SET email = CASE
                 WHEN EXISTS (SELECT 1 FROM users other WHERE other.email = $2 AND other.sub IS DISTINCT FROM $1)
                 THEN email
                 ELSE $2
             END,
             updated_at = NOW()
         WHERE sub = $1
         RETURNING *",
    )
    .bind(&claims.sub)
    .bind(email)
    .fetch_optional(pool)
    .await?;

    if let Some(account) = linked {
        if account.email != email {
            log::warn!("Kept email of user {}: {} is used by another account", account.id, email);
        }
        return Ok(account);
    }

    let by_email = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await?;

    if let Some(account) = by_email {
        return link_account(pool, claims, account).await;
    }

    create_account(pool, claims, email).await
}

async fn link_account(pool: &PgPool, claims: &Claims, account: User) -> Result<User, AppError> {
    if account.sub.is_some() {
        log::warn!("Refused to link user {} to {}: already linked", account.id, claims.sub);
        return Err(AppError::Conflict(
            "Email is already linked to another account.".into(),
        ));
    }
    if claims.email_verified != Some(true) {
        return Err(AppError::Forbidden(
            "Email must be verified to link an existing account.".into(),
        ));
    }

    sqlx::query_as::<_, User>(
        "UPDATE users SET sub = $1, updated_at = NOW() WHERE id = $2 AND sub IS NULL RETURNING *",
    )
    .bind(&claims.sub)
    .bind(account.id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::Conflict("Email is already linked to another account.".into()))
}

async fn create_account(pool: &PgPool, claims: &Claims, email: &str) -> Result<User, AppError> {
    let base = username_from_claims(claims, email);

    for attempt in 0..USERNAME_ATTEMPTS {
        let username = numbered_username(&base, attempt);
        let created = sqlx::query_as::<_, User>(
            "INSERT INTO users (sub, username, email, password_hash, role, updated_at)
             VALUES ($1, $2, $3, '', 1, NOW())
             ON CONFLICT (username) DO NOTHING
             RETURNING *",
        )
        .bind(&claims.sub)
        .bind(&username)
        .bind(email)
        .fetch_optional(pool)
        .await?;

        if let Some(account) = created {
            log::info!("Provisioned user {} ({}) for {}", account.id, username, claims.sub);
            return Ok(account);
        }
    }

    log::warn!("No free username derived from {} for {}", base, claims.sub);
    Err(AppError::Conflict("Unable to allocate a username.".into()))
}

/// Log out
///
/// Revokes the presented token; later requests carrying it fail with 401.
#[post("/logout")]
pub async fn logout(
    req: HttpRequest,
    user: AuthenticatedUser,
    authenticator: web::Data<Authenticator>,
) -> Result<impl Responder, AppError> {
    let token = extract_token(req.headers())?;
    // `exp` is a required claim, so verified tokens always carry it.
    authenticator.revoke(token, user.claims.exp.unwrap_or(u64::MAX));

    log::info!("Revoked token for {}", user.sub());
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "User logged out successfully."
    })))
}

/// Profile of the caller: username, email and role.
#[get("/profile")]
pub async fn profile(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let account = sqlx::query_as::<_, User>("SELECT * FROM users WHERE sub = $1")
        .bind(user.sub())
        .fetch_optional(&**pool)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found.".into()))?;

    Ok(HttpResponse::Ok().json(Profile::from(account)))
}

/// Update the caller's username and/or email.
#[patch("/profile/update")]
pub async fn update_profile(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    update: web::Json<ProfileUpdate>,
) -> Result<impl Responder, AppError> {
    if update.is_empty() {
        return Err(AppError::BadRequest(
            "Request body must contain username or email".into(),
        ));
    }
    update.validate()?;

    let result = sqlx::query(
        "UPDATE users
         SET username = COALESCE($1, username), email = COALESCE($2, email), updated_at = NOW()
         WHERE sub = $3",
    )
    .bind(&update.username)
    .bind(&update.email)
    .bind(user.sub())
    .execute(&**pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found.".into()));
    }

    Ok(HttpResponse::Ok().json(json!({
        "message": "User profile updated successfully"
    })))
}

/// Delete the caller's account together with everything it owns.
#[delete("/delete")]
pub async fn delete_user(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let result = sqlx::query("DELETE FROM users WHERE sub = $1")
        .bind(user.sub())
        .execute(&**pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found.".into()));
    }

    log::info!("Deleted account of {}", user.sub());
    Ok(HttpResponse::Ok().json(json!({
        "message": "User deleted successfully"
    })))
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::auth::{Claims, USERNAME_REGEX};

/// Maximum length of the `users.username` column.
pub const USERNAME_MAX_LEN: usize = 40;
/// Shortest username accepted at registration.
pub const USERNAME_MIN_LEN: usize = 3;

/// A row of the `users` table.
#[derive(Debug, Serialize, FromRow)]
pub struct User {
    pub id: i32,
    /// Identity-provider subject linked to this account, once the user has logged in.
    pub sub: Option<String>,
    pub username: String,
    pub email: String,
    /// Empty for accounts provisioned from the identity provider.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Public view of a user, as returned by `GET /users/profile`.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub username: String,
    pub email: String,
    pub role: i32,
}

impl From<User> for Profile {
    fn from(user: User) -> Self {
        Self {
            username: user.username,
            email: user.email,
            role: user.role,
        }
    }
}

/// Partial update of the caller's own profile. Absent fields are left unchanged.
#[derive(Debug, Deserialize, Validate)]
pub struct ProfileUpdate {
    #[validate(
        length(min = 3, max = 40),
        regex(
            path = "USERNAME_REGEX",
            message = "Username must be alphanumeric, underscores, or hyphens"
        )
    )]
    pub username: Option<String>,
    #[validate(email, length(max = 254))]
    pub email: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.email.is_none()
    }
}

/// Username for an account created from identity-provider claims: the
/// `nickname` claim when present, otherwise the local part of the email.
///
/// The result satisfies the registration rules: characters outside
/// `[A-Za-z0-9_-]` become `_`, short names get a `_user` suffix and long ones
/// are cut to `USERNAME_MAX_LEN`.
pub fn username_from_claims(claims: &Claims, email: &str) -> String {
    let candidate = claims
        .nickname
        .as_deref()
        .map(str::trim)
        .filter(|nickname| !nickname.is_empty())
        .unwrap_or_else(|| email.split('@').next().unwrap_or(email));

    let mut username: String = candidate
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .take(USERNAME_MAX_LEN)
        .collect();

    if username.is_empty() {
        username.push_str("user");
    } else if username.len() < USERNAME_MIN_LEN {
        username.push_str("_user");
    }
    username
}

/// The `attempt`-th choice for a username derived from `base`: `base` itself,
/// then `base_2`, `base_3`, ... with `base` shortened so the suffix fits.
pub fn numbered_username(base: &str, attempt: u32) -> String {
    if attempt == 0 {
        return base.to_string();
    }
    let suffix = format!("_{}", attempt + 1);
    let keep = USERNAME_MAX_LEN.saturating_sub(suffix.len());
    let stem: String = base.chars().take(keep).collect();
    format!("{}{}", stem, suffix)
}

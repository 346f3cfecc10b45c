use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// A row of the `todos` table.
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Todo {
    pub id: i32,
    pub user_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub is_complete: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Body of `POST /todos`.
#[derive(Debug, Deserialize, Validate)]
pub struct TodoInput {
    /// Between 1 and 100 characters.
    #[validate(length(min = 1, max = 100))]
    pub title: String,
    #[validate(length(max = 255))]
    pub description: Option<String>,
}

/// Body of `PUT /todos/{id}`. Absent fields keep their current value.
#[derive(Debug, Deserialize, Validate)]
pub struct TodoUpdate {
    #[validate(length(min = 1, max = 100))]
    pub title: Option<String>,
    #[validate(length(max = 255))]
    pub description: Option<String>,
    pub is_complete: Option<bool>,
}

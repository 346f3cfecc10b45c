use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// A row of the `study_groups` table. Members are kept in `study_group_members`.
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct StudyGroup {
    pub id: i32,
    pub creator_id: i32,
    pub group_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct StudyGroupInput {
    #[validate(length(min = 1, max = 50))]
    pub group_name: String,
}

/// A row of the `channels` table, linked to groups through `study_group_channels`.
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Channel {
    pub id: i32,
    pub creator_id: i32,
    pub channel_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChannelInput {
    #[validate(length(min = 1, max = 50))]
    pub channel_name: String,
}

/// A row of the `messages` table, linked to channels through `channel_messages`.
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Message {
    pub id: i32,
    pub sender_id: i32,
    pub text: String,
    pub sent_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
}

/// Body for posting or editing a message.
#[derive(Debug, Deserialize, Validate)]
pub struct MessageInput {
    #[validate(length(min = 1, max = 500))]
    pub text: String,
}

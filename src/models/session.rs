use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// State of a work session, stored as an integer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[repr(i32)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Stopped = 0,
    Running = 1,
}

/// A row of the `work_sessions` table.
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct WorkSession {
    #[serde(rename = "session_id")]
    pub id: i32,
    #[serde(skip_serializing)]
    pub user_id: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Planned length in minutes.
    pub duration: Option<i32>,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
}

/// Body of `POST /sessions/start`.
#[derive(Debug, Deserialize, Validate)]
pub struct StartSession {
    /// Planned length in minutes, at most one day.
    #[validate(range(min = 1, max = 1440))]
    pub duration: i32,
}

/// Body of `POST /sessions/stop`.
#[derive(Debug, Deserialize)]
pub struct StopSession {
    pub session_id: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_session_validation() {
        assert!(StartSession { duration: 25 }.validate().is_ok());
        assert!(StartSession { duration: 0 }.validate().is_err());
        assert!(StartSession { duration: 1441 }.validate().is_err());
    }

    #[test]
    fn test_work_session_serialization() {
        let session = WorkSession {
            id: 7,
            user_id: 3,
            start_time: Utc::now(),
            end_time: None,
            duration: Some(25),
            status: SessionStatus::Running,
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["session_id"], 7);
        assert_eq!(json["status"], "running");
        assert_eq!(json["duration"], 25);
        assert!(json["end_time"].is_null());
        assert!(json.get("user_id").is_none());
    }
}

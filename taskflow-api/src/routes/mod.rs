//! API route handlers, one module per resource
//!
//! - `health`: liveness and database status
//! - `auth`: registration, login, token refresh, profile, password
//! - `tasks`: personal tasks
//! - `teams`: teams, membership and invite codes
//! - `team_tasks`: the tasks of a team's board
//! - `comments`: task comments
//! - `notifications`: the caller's notifications
//! - `activity`: team activity feeds
//! - `search`: substring search over visible tasks and teams

pub mod activity;
pub mod auth;
pub mod comments;
pub mod health;
pub mod notifications;
pub mod search;
pub mod tasks;
pub mod team_tasks;
pub mod teams;

use crate::error::ApiError;
use serde::Serialize;
use sqlx::PgPool;
use taskflow_shared::models::activity::{Activity, CreateActivity};
use taskflow_shared::models::notification::{CreateNotification, Notification};
use taskflow_shared::models::user::User;
use uuid::Uuid;

/// `{"message": "..."}` body for deletions and other bodyless successes
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Fallback for unknown routes
pub async fn not_found() -> ApiError {
    ApiError::NotFound("Route not found".to_string())
}

/// Trims a required text field, rejecting blank input
pub(crate) fn required_text(field: &str, value: &str) -> Result<String, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::invalid_field(field, format!("{} cannot be empty", capitalize(field))));
    }
    Ok(trimmed.to_string())
}

/// Trims optional text; blank becomes `None`
pub(crate) fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn capitalize(field: &str) -> String {
    let mut chars = field.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>().replace('_', " "),
        None => String::new(),
    }
}

/// A user's display name for activity targets and notification text
pub(crate) async fn display_name(pool: &PgPool, user_id: Uuid) -> Result<String, ApiError> {
    Ok(User::find_by_id(pool, user_id)
        .await?
        .map(|user| user.name)
        .unwrap_or_else(|| "Someone".to_string()))
}

/// Appends an activity entry
///
/// The entry is a side effect of a write that already succeeded, so a
/// failure here is logged and does not fail the request.
pub(crate) async fn record_activity(pool: &PgPool, entry: CreateActivity) {
    let action = entry.action;
    let team_id = entry.team_id;

    if let Err(e) = Activity::record(pool, entry).await {
        tracing::warn!(
            error = %e,
            action = action.as_str(),
            team_id = %team_id,
            "Failed to record activity"
        );
    }
}

/// Creates a notification, logging instead of failing
pub(crate) async fn notify(pool: &PgPool, data: CreateNotification) {
    let kind = data.kind;
    let recipient_id = data.recipient_id;

    if let Err(e) = Notification::create(pool, data).await {
        tracing::warn!(
            error = %e,
            kind = kind.as_str(),
            recipient_id = %recipient_id,
            "Failed to create notification"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_required_text() {
        assert_eq!(required_text("title", "  Ship it ").unwrap(), "Ship it");

        let err = required_text("title", "   ").unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        match err {
            ApiError::ValidationError(details) => {
                assert_eq!(details[0].field, "title");
                assert_eq!(details[0].message, "Title cannot be empty");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_optional_text() {
        assert_eq!(optional_text(None), None);
        assert_eq!(optional_text(Some("  ".to_string())), None);
        assert_eq!(optional_text(Some(" notes ".to_string())), Some("notes".to_string()));
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("invite_code"), "Invite code");
        assert_eq!(capitalize(""), "");
    }
}

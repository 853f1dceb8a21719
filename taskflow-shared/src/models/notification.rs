//! Per-user notifications
//!
//! Notifications are fanned out by request handlers after the primary write
//! succeeds (assignment, status change, new comment, team membership
//! changes). A user only ever sees and mutates their own.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Default page size for notification lists
pub const DEFAULT_LIMIT: i64 = 50;

/// Largest page a caller may request
pub const MAX_LIMIT: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    TaskAssigned,
    TaskStatusChanged,
    CommentAdded,
    TeamJoined,
    TeamRemoved,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::TaskAssigned => "task_assigned",
            NotificationKind::TaskStatusChanged => "task_status_changed",
            NotificationKind::CommentAdded => "comment_added",
            NotificationKind::TeamJoined => "team_joined",
            NotificationKind::TeamRemoved => "team_removed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub kind: String,
    pub message: String,
    pub task_id: Option<Uuid>,
    pub team_id: Option<Uuid>,
    pub actor_id: Option<Uuid>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateNotification {
    pub recipient_id: Uuid,
    pub kind: NotificationKind,
    pub message: String,
    pub task_id: Option<Uuid>,
    pub team_id: Option<Uuid>,
    pub actor_id: Option<Uuid>,
}

impl Notification {
    pub async fn create(pool: &PgPool, data: CreateNotification) -> Result<Self, sqlx::Error> {
        let notification = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (recipient_id, kind, message, task_id, team_id, actor_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, recipient_id, kind, message, task_id, team_id, actor_id, read, created_at
            "#,
        )
        .bind(data.recipient_id)
        .bind(data.kind.as_str())
        .bind(&data.message)
        .bind(data.task_id)
        .bind(data.team_id)
        .bind(data.actor_id)
        .fetch_one(pool)
        .await?;

        tracing::debug!(
            notification_id = %notification.id,
            recipient_id = %notification.recipient_id,
            kind = data.kind.as_str(),
            "Notification created"
        );

        Ok(notification)
    }

    /// A user's notifications, newest first
    pub async fn list_for_user(
        pool: &PgPool,
        recipient_id: Uuid,
        unread_only: bool,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let notifications = sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, recipient_id, kind, message, task_id, team_id, actor_id, read, created_at
            FROM notifications
            WHERE recipient_id = $1 AND (NOT $2 OR read = FALSE)
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(recipient_id)
        .bind(unread_only)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(notifications)
    }

    pub async fn unread_count(pool: &PgPool, recipient_id: Uuid) -> Result<i64, sqlx::Error> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE recipient_id = $1 AND read = FALSE",
        )
        .bind(recipient_id)
        .fetch_one(pool)
        .await?;

        Ok(count)
    }

    /// Marks one of the recipient's notifications as read
    ///
    /// Returns `None` when the notification does not exist or belongs to
    /// someone else.
    pub async fn mark_read(pool: &PgPool, id: Uuid, recipient_id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let notification = sqlx::query_as::<_, Notification>(
            r#"
            UPDATE notifications
            SET read = TRUE
            WHERE id = $1 AND recipient_id = $2
            RETURNING id, recipient_id, kind, message, task_id, team_id, actor_id, read, created_at
            "#,
        )
        .bind(id)
        .bind(recipient_id)
        .fetch_optional(pool)
        .await?;

        Ok(notification)
    }

    /// Marks every unread notification as read, returning how many changed
    pub async fn mark_all_read(pool: &PgPool, recipient_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE notifications SET read = TRUE WHERE recipient_id = $1 AND read = FALSE",
        )
        .bind(recipient_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn delete(pool: &PgPool, id: Uuid, recipient_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND recipient_id = $2")
            .bind(id)
            .bind(recipient_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_match_serde() {
        for kind in [
            NotificationKind::TaskAssigned,
            NotificationKind::TaskStatusChanged,
            NotificationKind::CommentAdded,
            NotificationKind::TeamJoined,
            NotificationKind::TeamRemoved,
        ] {
            assert_eq!(serde_json::to_value(kind).unwrap(), serde_json::json!(kind.as_str()));
        }
    }
}

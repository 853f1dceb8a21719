//! Team activity log
//!
//! Entries are append-only: there is no update and no single-row delete.
//! They disappear only when their team is deleted.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE activities (
//!     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     team_id UUID NOT NULL REFERENCES teams(id),
//!     task_id UUID,                  -- no FK, outlives the task
//!     actor_id UUID NOT NULL REFERENCES users(id),
//!     action VARCHAR(50) NOT NULL,
//!     target VARCHAR(255) NOT NULL DEFAULT '',
//!     details JSONB NOT NULL DEFAULT '{}',
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use uuid::Uuid;

/// Default page size for activity feeds
pub const DEFAULT_LIMIT: i64 = 50;

/// Largest page a caller may request
pub const MAX_LIMIT: i64 = 100;

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    TeamCreated,
    TeamUpdated,
    MemberJoined,
    MemberLeft,
    MemberRemoved,
    MemberRoleChanged,
    InviteCodeRegenerated,
    TaskCreated,
    TaskUpdated,
    TaskStatusChanged,
    TaskAssigned,
    TaskDeleted,
    CommentAdded,
}

impl ActivityAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityAction::TeamCreated => "team_created",
            ActivityAction::TeamUpdated => "team_updated",
            ActivityAction::MemberJoined => "member_joined",
            ActivityAction::MemberLeft => "member_left",
            ActivityAction::MemberRemoved => "member_removed",
            ActivityAction::MemberRoleChanged => "member_role_changed",
            ActivityAction::InviteCodeRegenerated => "invite_code_regenerated",
            ActivityAction::TaskCreated => "task_created",
            ActivityAction::TaskUpdated => "task_updated",
            ActivityAction::TaskStatusChanged => "task_status_changed",
            ActivityAction::TaskAssigned => "task_assigned",
            ActivityAction::TaskDeleted => "task_deleted",
            ActivityAction::CommentAdded => "comment_added",
        }
    }
}

/// A log entry with the actor's display name
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Activity {
    pub id: Uuid,
    pub team_id: Uuid,
    pub task_id: Option<Uuid>,
    pub actor_id: Uuid,
    pub actor_name: String,
    pub action: String,

    /// Human-readable subject, e.g. the task title
    pub target: String,

    pub details: JsonValue,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateActivity {
    pub team_id: Uuid,
    pub task_id: Option<Uuid>,
    pub actor_id: Uuid,
    pub action: ActivityAction,
    pub target: String,
    pub details: JsonValue,
}

impl CreateActivity {
    pub fn new(team_id: Uuid, actor_id: Uuid, action: ActivityAction, target: impl Into<String>) -> Self {
        Self {
            team_id,
            task_id: None,
            actor_id,
            action,
            target: target.into(),
            details: JsonValue::Object(Default::default()),
        }
    }

    pub fn with_task(mut self, task_id: Uuid) -> Self {
        self.task_id = Some(task_id);
        self
    }

    pub fn with_details(mut self, details: JsonValue) -> Self {
        self.details = details;
        self
    }
}

impl Activity {
    /// Appends an entry to a team's log
    pub async fn record(pool: &PgPool, data: CreateActivity) -> Result<Uuid, sqlx::Error> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO activities (team_id, task_id, actor_id, action, target, details)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(data.team_id)
        .bind(data.task_id)
        .bind(data.actor_id)
        .bind(data.action.as_str())
        .bind(&data.target)
        .bind(&data.details)
        .fetch_one(pool)
        .await?;

        tracing::debug!(
            team_id = %data.team_id,
            action = data.action.as_str(),
            "Activity recorded"
        );

        Ok(id)
    }

    /// Newest entries across every team the user belongs to
    pub async fn list_for_user(pool: &PgPool, user_id: Uuid, limit: i64) -> Result<Vec<Self>, sqlx::Error> {
        let activities = sqlx::query_as::<_, Activity>(
            r#"
            SELECT a.id, a.team_id, a.task_id, a.actor_id, u.name AS actor_name,
                   a.action, a.target, a.details, a.created_at
            FROM activities a
            JOIN users u ON u.id = a.actor_id
            WHERE a.team_id IN (SELECT team_id FROM team_members WHERE user_id = $1)
            ORDER BY a.created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(activities)
    }

    /// Newest entries of one team
    pub async fn list_for_team(pool: &PgPool, team_id: Uuid, limit: i64) -> Result<Vec<Self>, sqlx::Error> {
        let activities = sqlx::query_as::<_, Activity>(
            r#"
            SELECT a.id, a.team_id, a.task_id, a.actor_id, u.name AS actor_name,
                   a.action, a.target, a.details, a.created_at
            FROM activities a
            JOIN users u ON u.id = a.actor_id
            WHERE a.team_id = $1
            ORDER BY a.created_at DESC
            LIMIT $2
            "#,
        )
        .bind(team_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(activities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_action_names_match_serde() {
        let actions = [
            ActivityAction::TeamCreated,
            ActivityAction::MemberRoleChanged,
            ActivityAction::InviteCodeRegenerated,
            ActivityAction::TaskStatusChanged,
            ActivityAction::CommentAdded,
        ];

        for action in actions {
            let serialized = serde_json::to_value(action).unwrap();
            assert_eq!(serialized, json!(action.as_str()));
        }
    }

    #[test]
    fn test_create_activity_builder() {
        let team_id = Uuid::new_v4();
        let task_id = Uuid::new_v4();
        let actor_id = Uuid::new_v4();

        let activity = CreateActivity::new(team_id, actor_id, ActivityAction::TaskCreated, "Write docs")
            .with_task(task_id)
            .with_details(json!({"priority": "high"}));

        assert_eq!(activity.task_id, Some(task_id));
        assert_eq!(activity.target, "Write docs");
        assert_eq!(activity.details["priority"], "high");

        let bare = CreateActivity::new(team_id, actor_id, ActivityAction::TeamUpdated, "");
        assert_eq!(bare.details, json!({}));
        assert!(bare.task_id.is_none());
    }
}

//! Team workspaces
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE teams (
//!     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     name VARCHAR(100) NOT NULL,
//!     description VARCHAR(500),
//!     owner_id UUID NOT NULL REFERENCES users(id),
//!     invite_code VARCHAR(16) NOT NULL UNIQUE,
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```
//!
//! A team is created together with its owner's membership row, and deleted
//! together with everything that belongs to it (see [`Team::delete_cascade`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::is_unique_violation;
use super::team_member::TeamRole;
use crate::auth::invite_code::{generate_invite_code, normalize};

/// Attempts at finding an unused invite code before giving up
const INVITE_CODE_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Team {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: Uuid,

    /// Join code shared with prospective members
    pub invite_code: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A team as seen from one member's team list
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TeamSummary {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: Uuid,
    pub invite_code: String,

    /// The requesting user's role
    pub role: TeamRole,

    pub member_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateTeam {
    pub name: String,
    pub description: Option<String>,
    pub owner_id: Uuid,
}

/// Partial team update; `description: Some(None)` clears it
#[derive(Debug, Clone, Default)]
pub struct UpdateTeam {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
}

impl UpdateTeam {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none()
    }
}

impl Team {
    /// Creates a team and its owner membership in one transaction
    ///
    /// A fresh invite code is drawn until one is unused.
    ///
    /// # Errors
    ///
    /// Returns `sqlx::Error::Protocol` if no free invite code was found, or
    /// the underlying database error.
    pub async fn create(pool: &PgPool, data: CreateTeam) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let mut created = None;
        for _ in 0..INVITE_CODE_ATTEMPTS {
            created = sqlx::query_as::<_, Team>(
                r#"
                INSERT INTO teams (name, description, owner_id, invite_code)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (invite_code) DO NOTHING
                RETURNING id, name, description, owner_id, invite_code, created_at, updated_at
                "#,
            )
            .bind(data.name.trim())
            .bind(data.description.as_deref())
            .bind(data.owner_id)
            .bind(generate_invite_code())
            .fetch_optional(&mut *tx)
            .await?;

            if created.is_some() {
                break;
            }
        }

        let team = created
            .ok_or_else(|| sqlx::Error::Protocol("could not allocate a unique invite code".into()))?;

        sqlx::query("INSERT INTO team_members (team_id, user_id, role) VALUES ($1, $2, $3)")
            .bind(team.id)
            .bind(data.owner_id)
            .bind(TeamRole::Owner)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(team_id = %team.id, owner_id = %team.owner_id, "Team created");

        Ok(team)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let team = sqlx::query_as::<_, Team>(
            r#"
            SELECT id, name, description, owner_id, invite_code, created_at, updated_at
            FROM teams
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(team)
    }

    /// Looks up a team by invite code, ignoring case and surrounding whitespace
    pub async fn find_by_invite_code(pool: &PgPool, code: &str) -> Result<Option<Self>, sqlx::Error> {
        let team = sqlx::query_as::<_, Team>(
            r#"
            SELECT id, name, description, owner_id, invite_code, created_at, updated_at
            FROM teams
            WHERE invite_code = $1
            "#,
        )
        .bind(normalize(code))
        .fetch_optional(pool)
        .await?;

        Ok(team)
    }

    /// Lists the teams a user belongs to, newest membership first
    pub async fn list_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<TeamSummary>, sqlx::Error> {
        let teams = sqlx::query_as::<_, TeamSummary>(
            r#"
            SELECT t.id, t.name, t.description, t.owner_id, t.invite_code,
                   m.role,
                   (SELECT COUNT(*) FROM team_members c WHERE c.team_id = t.id) AS member_count,
                   t.created_at
            FROM teams t
            JOIN team_members m ON m.team_id = t.id AND m.user_id = $1
            ORDER BY m.joined_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(teams)
    }

    /// Applies a partial update, returning `None` if the team is gone
    pub async fn update(pool: &PgPool, id: Uuid, data: UpdateTeam) -> Result<Option<Self>, sqlx::Error> {
        let (set_description, description) = match data.description {
            Some(value) => (true, value),
            None => (false, None),
        };

        let team = sqlx::query_as::<_, Team>(
            r#"
            UPDATE teams
            SET name = COALESCE($2, name),
                description = CASE WHEN $3 THEN $4 ELSE description END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, description, owner_id, invite_code, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(data.name.as_deref().map(str::trim))
        .bind(set_description)
        .bind(description)
        .fetch_optional(pool)
        .await?;

        Ok(team)
    }

    /// Replaces the invite code; the old code stops working immediately
    pub async fn regenerate_invite_code(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let mut last_error = None;

        for _ in 0..INVITE_CODE_ATTEMPTS {
            let result = sqlx::query_as::<_, Team>(
                r#"
                UPDATE teams
                SET invite_code = $2, updated_at = NOW()
                WHERE id = $1
                RETURNING id, name, description, owner_id, invite_code, created_at, updated_at
                "#,
            )
            .bind(id)
            .bind(generate_invite_code())
            .fetch_optional(pool)
            .await;

            match result {
                Ok(team) => return Ok(team),
                Err(e) if is_unique_violation(&e) => last_error = Some(e),
                Err(e) => return Err(e),
            }
        }

        Err(last_error
            .unwrap_or_else(|| sqlx::Error::Protocol("could not allocate a unique invite code".into())))
    }

    /// Deletes a team and everything that belongs to it
    ///
    /// Removes, in one transaction: comments on the team's tasks,
    /// notifications about the team or its tasks, the tasks, the activity
    /// log, the memberships and finally the team. Returns `false` if the team
    /// did not exist.
    pub async fn delete_cascade(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r#"
            DELETE FROM comments
            WHERE task_id IN (SELECT id FROM tasks WHERE team_id = $1)
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            DELETE FROM notifications
            WHERE team_id = $1
               OR task_id IN (SELECT id FROM tasks WHERE team_id = $1)
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let tasks = sqlx::query("DELETE FROM tasks WHERE team_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query("DELETE FROM activities WHERE team_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM team_members WHERE team_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM teams WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if deleted == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        tx.commit().await?;

        tracing::info!(team_id = %id, deleted_tasks = tasks, "Team deleted");

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_team_is_empty() {
        assert!(UpdateTeam::default().is_empty());

        let rename = UpdateTeam {
            name: Some("Platform".to_string()),
            ..Default::default()
        };
        assert!(!rename.is_empty());

        let clear = UpdateTeam {
            description: Some(None),
            ..Default::default()
        };
        assert!(!clear.is_empty());
    }
}

//! Team membership and roles
//!
//! # Schema
//!
//! ```sql
//! CREATE TYPE team_role AS ENUM ('owner', 'admin', 'member');
//!
//! CREATE TABLE team_members (
//!     team_id UUID NOT NULL REFERENCES teams(id),
//!     user_id UUID NOT NULL REFERENCES users(id),
//!     role team_role NOT NULL DEFAULT 'member',
//!     joined_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     PRIMARY KEY (team_id, user_id)
//! );
//! ```
//!
//! # Roles
//!
//! - **owner**: exactly one per team; deletes the team, changes roles
//! - **admin**: edits the team, regenerates invite codes, removes members
//! - **member**: works on the team's tasks

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Role of a user within a team
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "team_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TeamRole {
    Owner,
    Admin,
    Member,
}

impl TeamRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TeamRole::Owner => "owner",
            TeamRole::Admin => "admin",
            TeamRole::Member => "member",
        }
    }

    /// Checks if this role is at least `required`
    ///
    /// Hierarchy: Owner > Admin > Member
    pub fn has_permission(&self, required: TeamRole) -> bool {
        self.permission_level() >= required.permission_level()
    }

    /// Owner or admin
    pub fn can_manage(&self) -> bool {
        self.has_permission(TeamRole::Admin)
    }

    fn permission_level(&self) -> u8 {
        match self {
            TeamRole::Owner => 3,
            TeamRole::Admin => 2,
            TeamRole::Member => 1,
        }
    }
}

impl std::fmt::Display for TeamRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A membership row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TeamMember {
    pub team_id: Uuid,
    pub user_id: Uuid,
    pub role: TeamRole,
    pub joined_at: DateTime<Utc>,
}

/// A member as shown in a team's member list
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MemberInfo {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub avatar_url: Option<String>,
    pub role: TeamRole,
    pub joined_at: DateTime<Utc>,
}

impl TeamMember {
    /// Adds a user to a team
    ///
    /// # Errors
    ///
    /// Fails with a unique violation on the primary key if the user is
    /// already a member.
    pub async fn add(
        pool: &PgPool,
        team_id: Uuid,
        user_id: Uuid,
        role: TeamRole,
    ) -> Result<Self, sqlx::Error> {
        let member = sqlx::query_as::<_, TeamMember>(
            r#"
            INSERT INTO team_members (team_id, user_id, role)
            VALUES ($1, $2, $3)
            RETURNING team_id, user_id, role, joined_at
            "#,
        )
        .bind(team_id)
        .bind(user_id)
        .bind(role)
        .fetch_one(pool)
        .await?;

        Ok(member)
    }

    pub async fn find(
        pool: &PgPool,
        team_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let member = sqlx::query_as::<_, TeamMember>(
            r#"
            SELECT team_id, user_id, role, joined_at
            FROM team_members
            WHERE team_id = $1 AND user_id = $2
            "#,
        )
        .bind(team_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(member)
    }

    /// Gets a user's role in a team, `None` if they are not a member
    pub async fn get_role(
        pool: &PgPool,
        team_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<TeamRole>, sqlx::Error> {
        let role: Option<TeamRole> = sqlx::query_scalar(
            r#"
            SELECT role FROM team_members
            WHERE team_id = $1 AND user_id = $2
            "#,
        )
        .bind(team_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(role)
    }

    pub async fn is_member(pool: &PgPool, team_id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM team_members
                WHERE team_id = $1 AND user_id = $2
            )
            "#,
        )
        .bind(team_id)
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        Ok(exists)
    }

    /// Lists a team's members with their profile, owner first
    pub async fn list_for_team(pool: &PgPool, team_id: Uuid) -> Result<Vec<MemberInfo>, sqlx::Error> {
        let members = sqlx::query_as::<_, MemberInfo>(
            r#"
            SELECT m.user_id, u.name, u.email, u.avatar_url, m.role, m.joined_at
            FROM team_members m
            JOIN users u ON u.id = m.user_id
            WHERE m.team_id = $1
            ORDER BY m.role, m.joined_at
            "#,
        )
        .bind(team_id)
        .fetch_all(pool)
        .await?;

        Ok(members)
    }

    /// Changes a member's role
    ///
    /// Returns `None` if the user is not a member.
    pub async fn update_role(
        pool: &PgPool,
        team_id: Uuid,
        user_id: Uuid,
        role: TeamRole,
    ) -> Result<Option<Self>, sqlx::Error> {
        let member = sqlx::query_as::<_, TeamMember>(
            r#"
            UPDATE team_members
            SET role = $3
            WHERE team_id = $1 AND user_id = $2
            RETURNING team_id, user_id, role, joined_at
            "#,
        )
        .bind(team_id)
        .bind(user_id)
        .bind(role)
        .fetch_optional(pool)
        .await?;

        Ok(member)
    }

    /// Removes a user from a team and unassigns their tasks in it
    ///
    /// Both writes happen in one transaction. Returns `false` if the user was
    /// not a member.
    pub async fn remove(pool: &PgPool, team_id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let unassigned = sqlx::query(
            r#"
            UPDATE tasks
            SET assignee_id = NULL, updated_at = NOW()
            WHERE team_id = $1 AND assignee_id = $2
            "#,
        )
        .bind(team_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let removed = sqlx::query("DELETE FROM team_members WHERE team_id = $1 AND user_id = $2")
            .bind(team_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if removed == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        tx.commit().await?;

        tracing::info!(
            team_id = %team_id,
            user_id = %user_id,
            unassigned_tasks = unassigned,
            "Member removed from team"
        );

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_hierarchy() {
        assert!(TeamRole::Owner.has_permission(TeamRole::Owner));
        assert!(TeamRole::Owner.has_permission(TeamRole::Admin));
        assert!(TeamRole::Owner.has_permission(TeamRole::Member));

        assert!(!TeamRole::Admin.has_permission(TeamRole::Owner));
        assert!(TeamRole::Admin.has_permission(TeamRole::Admin));
        assert!(TeamRole::Admin.has_permission(TeamRole::Member));

        assert!(!TeamRole::Member.has_permission(TeamRole::Admin));
        assert!(TeamRole::Member.has_permission(TeamRole::Member));
    }

    #[test]
    fn test_can_manage() {
        assert!(TeamRole::Owner.can_manage());
        assert!(TeamRole::Admin.can_manage());
        assert!(!TeamRole::Member.can_manage());
    }

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&TeamRole::Admin).unwrap(), r#""admin""#);
        let role: TeamRole = serde_json::from_str(r#""member""#).unwrap();
        assert_eq!(role, TeamRole::Member);
        assert!(serde_json::from_str::<TeamRole>(r#""viewer""#).is_err());
        assert_eq!(TeamRole::Owner.to_string(), "owner");
    }
}

//! Permission checks
//!
//! Every team-scoped request resolves in the same order: the team must
//! exist (404), the caller must be a member (403), and the caller's role must
//! be high enough (403). Task requests resolve the task first (404) and then
//! the caller's access to it (403).
//!
//! The async `require_*` functions perform those lookups; the `can_*`
//! functions are the pure rules applied once the roles are known.
//!
//! | operation | allowed for |
//! |---|---|
//! | personal task | its owner |
//! | read/create/update team task | any member |
//! | delete team task | its creator, or owner/admin |
//! | edit team, regenerate invite code | owner/admin |
//! | remove member | owner (anyone but themself), admin (members only) |
//! | change role | owner, never on the owner row |
//! | delete team | owner |
//! | delete comment | its author, or owner/admin on team tasks |
//!
//! ```no_run
//! use taskflow_shared::auth::authorization::{require_team_role, AuthzError};
//! use taskflow_shared::models::team_member::TeamRole;
//! use sqlx::PgPool;
//! use uuid::Uuid;
//!
//! # async fn example(pool: PgPool, team_id: Uuid, user_id: Uuid) -> Result<(), AuthzError> {
//! let membership = require_team_role(&pool, team_id, user_id, TeamRole::Admin).await?;
//! println!("{} may manage {}", user_id, membership.team.name);
//! # Ok(())
//! # }
//! ```

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::task::Task;
use crate::models::team::Team;
use crate::models::team_member::{TeamMember, TeamRole};

/// Error type for authorization checks
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    #[error("Team not found")]
    TeamNotFound(Uuid),

    #[error("Task not found")]
    TaskNotFound(Uuid),

    /// User is not a member of the team
    #[error("You are not a member of this team")]
    NotMember(Uuid),

    /// User doesn't have required role
    #[error("This action requires the {required} role")]
    InsufficientRole { required: TeamRole, actual: TeamRole },

    /// Resource exists but the caller may not touch it
    #[error("{0}")]
    Forbidden(&'static str),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// A verified membership: the team plus the caller's role in it
#[derive(Debug, Clone)]
pub struct TeamAccess {
    pub team: Team,
    pub role: TeamRole,
}

/// A task the caller may read, with their role if it is a team task
#[derive(Debug, Clone)]
pub struct TaskAccess {
    pub task: Task,
    pub team_role: Option<TeamRole>,
}

impl TaskAccess {
    /// Owner/admin of the task's team
    pub fn is_team_manager(&self) -> bool {
        self.team_role.map(|r| r.can_manage()).unwrap_or(false)
    }
}

/// Resolves the team and the caller's membership
///
/// # Errors
///
/// - `AuthzError::TeamNotFound` if the team does not exist
/// - `AuthzError::NotMember` if the caller is not a member
pub async fn require_team_member(
    pool: &PgPool,
    team_id: Uuid,
    user_id: Uuid,
) -> Result<TeamAccess, AuthzError> {
    let team = Team::find_by_id(pool, team_id)
        .await?
        .ok_or(AuthzError::TeamNotFound(team_id))?;

    let role = TeamMember::get_role(pool, team_id, user_id)
        .await?
        .ok_or(AuthzError::NotMember(team_id))?;

    Ok(TeamAccess { team, role })
}

/// Like [`require_team_member`], additionally requiring at least `required`
pub async fn require_team_role(
    pool: &PgPool,
    team_id: Uuid,
    user_id: Uuid,
    required: TeamRole,
) -> Result<TeamAccess, AuthzError> {
    let access = require_team_member(pool, team_id, user_id).await?;

    if !access.role.has_permission(required) {
        return Err(AuthzError::InsufficientRole {
            required,
            actual: access.role,
        });
    }

    Ok(access)
}

/// Resolves a task the caller may read
///
/// Personal tasks are visible to their owner only; team tasks to every
/// member of the team.
pub async fn require_task_access(
    pool: &PgPool,
    task_id: Uuid,
    user_id: Uuid,
) -> Result<TaskAccess, AuthzError> {
    let task = Task::find_by_id(pool, task_id)
        .await?
        .ok_or(AuthzError::TaskNotFound(task_id))?;

    match task.team_id {
        None => {
            if task.owner_id != Some(user_id) {
                return Err(AuthzError::Forbidden("You do not have access to this task"));
            }
            Ok(TaskAccess { task, team_role: None })
        }
        Some(team_id) => {
            let role = TeamMember::get_role(pool, team_id, user_id)
                .await?
                .ok_or(AuthzError::Forbidden("You do not have access to this task"))?;
            Ok(TaskAccess {
                task,
                team_role: Some(role),
            })
        }
    }
}

/// Creator or team owner/admin may delete a team task
pub fn can_delete_team_task(task: &Task, user_id: Uuid, role: TeamRole) -> bool {
    task.created_by == user_id || role.can_manage()
}

/// Whether `actor_role` may remove a member holding `target_role`
///
/// The owner can never be removed; admins may only remove plain members.
pub fn can_remove_member(actor_role: TeamRole, target_role: TeamRole) -> bool {
    match (actor_role, target_role) {
        (_, TeamRole::Owner) => false,
        (TeamRole::Owner, _) => true,
        (TeamRole::Admin, TeamRole::Member) => true,
        _ => false,
    }
}

/// Whether `actor_role` may give a member holding `target_role` the role `new_role`
///
/// Only the owner changes roles, never on their own row, and never to owner.
pub fn can_change_role(actor_role: TeamRole, target_role: TeamRole, new_role: TeamRole) -> bool {
    actor_role == TeamRole::Owner && target_role != TeamRole::Owner && new_role != TeamRole::Owner
}

/// Comment author, or owner/admin of the task's team
pub fn can_delete_comment(author_id: Uuid, user_id: Uuid, team_role: Option<TeamRole>) -> bool {
    author_id == user_id || team_role.map(|r| r.can_manage()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::task::{TaskPriority, TaskStatus};
    use chrono::Utc;

    fn team_task(created_by: Uuid) -> Task {
        Task {
            id: Uuid::new_v4(),
            title: "Review PR".to_string(),
            description: None,
            status: TaskStatus::Todo,
            priority: TaskPriority::Medium,
            due_date: None,
            position: 0,
            owner_id: None,
            team_id: Some(Uuid::new_v4()),
            assignee_id: None,
            created_by,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_can_delete_team_task() {
        let creator = Uuid::new_v4();
        let other = Uuid::new_v4();
        let task = team_task(creator);

        assert!(can_delete_team_task(&task, creator, TeamRole::Member));
        assert!(!can_delete_team_task(&task, other, TeamRole::Member));
        assert!(can_delete_team_task(&task, other, TeamRole::Admin));
        assert!(can_delete_team_task(&task, other, TeamRole::Owner));
    }

    #[test]
    fn test_can_remove_member() {
        assert!(can_remove_member(TeamRole::Owner, TeamRole::Admin));
        assert!(can_remove_member(TeamRole::Owner, TeamRole::Member));
        assert!(!can_remove_member(TeamRole::Owner, TeamRole::Owner));

        assert!(can_remove_member(TeamRole::Admin, TeamRole::Member));
        assert!(!can_remove_member(TeamRole::Admin, TeamRole::Admin));
        assert!(!can_remove_member(TeamRole::Admin, TeamRole::Owner));

        assert!(!can_remove_member(TeamRole::Member, TeamRole::Member));
    }

    #[test]
    fn test_can_change_role() {
        assert!(can_change_role(TeamRole::Owner, TeamRole::Member, TeamRole::Admin));
        assert!(can_change_role(TeamRole::Owner, TeamRole::Admin, TeamRole::Member));
        assert!(!can_change_role(TeamRole::Owner, TeamRole::Owner, TeamRole::Admin));
        assert!(!can_change_role(TeamRole::Owner, TeamRole::Member, TeamRole::Owner));
        assert!(!can_change_role(TeamRole::Admin, TeamRole::Member, TeamRole::Admin));
    }

    #[test]
    fn test_can_delete_comment() {
        let author = Uuid::new_v4();
        let other = Uuid::new_v4();

        assert!(can_delete_comment(author, author, None));
        assert!(!can_delete_comment(author, other, None));
        assert!(!can_delete_comment(author, other, Some(TeamRole::Member)));
        assert!(can_delete_comment(author, other, Some(TeamRole::Admin)));
    }

    #[test]
    fn test_task_access_manager_flag() {
        let task = team_task(Uuid::new_v4());
        let access = TaskAccess { task: task.clone(), team_role: Some(TeamRole::Owner) };
        assert!(access.is_team_manager());

        let access = TaskAccess { task, team_role: None };
        assert!(!access.is_team_manager());
    }

    #[test]
    fn test_error_messages() {
        let err = AuthzError::InsufficientRole {
            required: TeamRole::Admin,
            actual: TeamRole::Member,
        };
        assert_eq!(err.to_string(), "This action requires the admin role");
        assert_eq!(AuthzError::TeamNotFound(Uuid::nil()).to_string(), "Team not found");
    }
}

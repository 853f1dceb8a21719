//! Personal and team tasks
//!
//! A task belongs either to one user (personal) or to one team, never both.
//! The database enforces it with `tasks_scope_check`; on the Rust side new
//! tasks are described by [`TaskScope`], which cannot express the invalid
//! combinations.
//!
//! # Schema
//!
//! ```sql
//! CREATE TYPE task_status AS ENUM ('todo', 'in_progress', 'done');
//! CREATE TYPE task_priority AS ENUM ('low', 'medium', 'high');
//!
//! CREATE TABLE tasks (
//!     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     title VARCHAR(200) NOT NULL,
//!     description TEXT,
//!     status task_status NOT NULL DEFAULT 'todo',
//!     priority task_priority NOT NULL DEFAULT 'medium',
//!     due_date TIMESTAMPTZ,
//!     position INTEGER NOT NULL DEFAULT 0,
//!     owner_id UUID REFERENCES users(id),
//!     team_id UUID REFERENCES teams(id),
//!     assignee_id UUID REFERENCES users(id),
//!     created_by UUID NOT NULL REFERENCES users(id),
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```
//!
//! # Example
//!
//! ```no_run
//! use taskflow_shared::models::task::{CreateTask, Task, TaskFilter, TaskScope, TaskStatus};
//! use sqlx::PgPool;
//! use uuid::Uuid;
//!
//! # async fn example(pool: PgPool, user_id: Uuid) -> Result<(), sqlx::Error> {
//! let task = Task::create(&pool, CreateTask::new(
//!     TaskScope::Personal { owner_id: user_id },
//!     "Write release notes",
//!     user_id,
//! )).await?;
//!
//! let open = Task::list_personal(&pool, user_id, &TaskFilter {
//!     status: Some(TaskStatus::Todo),
//!     ..Default::default()
//! }).await?;
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

const TASK_COLUMNS: &str = "id, title, description, status, priority, due_date, position, \
     owner_id, team_id, assignee_id, created_by, created_at, updated_at";

/// Kanban column
///
/// Any status may move to any other; declaration order is board order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
        }
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Todo
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
        }
    }
}

impl Default for TaskPriority {
    fn default() -> Self {
        TaskPriority::Medium
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,

    /// Ordering within a Kanban column (ascending)
    pub position: i32,

    /// Set for personal tasks
    pub owner_id: Option<Uuid>,

    /// Set for team tasks
    pub team_id: Option<Uuid>,

    /// Team member working on the task (team tasks only)
    pub assignee_id: Option<Uuid>,

    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Who a task belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskScope {
    Personal { owner_id: Uuid },
    Team { team_id: Uuid, assignee_id: Option<Uuid> },
}

impl Task {
    /// Recovers the task's scope from its row
    ///
    /// Returns `None` only for a row violating `tasks_scope_check`, which the
    /// database does not allow.
    pub fn scope(&self) -> Option<TaskScope> {
        match (self.owner_id, self.team_id) {
            (Some(owner_id), None) => Some(TaskScope::Personal { owner_id }),
            (None, Some(team_id)) => Some(TaskScope::Team {
                team_id,
                assignee_id: self.assignee_id,
            }),
            _ => None,
        }
    }

    pub fn is_personal(&self) -> bool {
        self.team_id.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct CreateTask {
    pub scope: TaskScope,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
    pub position: i32,
    pub created_by: Uuid,
}

impl CreateTask {
    /// A task with default status, priority and position
    pub fn new(scope: TaskScope, title: impl Into<String>, created_by: Uuid) -> Self {
        Self {
            scope,
            title: title.into(),
            description: None,
            status: TaskStatus::default(),
            priority: TaskPriority::default(),
            due_date: None,
            position: 0,
            created_by,
        }
    }
}

/// Partial task update
///
/// Outer `None` leaves a field untouched. For nullable columns
/// `Some(None)` clears the value.
#[derive(Debug, Clone, Default)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<Option<DateTime<Utc>>>,
    pub position: Option<i32>,
    pub assignee_id: Option<Option<Uuid>>,
}

impl UpdateTask {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.due_date.is_none()
            && self.position.is_none()
            && self.assignee_id.is_none()
    }

    /// The new status, if this update actually changes it
    pub fn status_change(&self, current: &Task) -> Option<TaskStatus> {
        self.status.filter(|s| *s != current.status)
    }

    /// The new assignee (possibly none), if this update actually changes it
    pub fn assignee_change(&self, current: &Task) -> Option<Option<Uuid>> {
        self.assignee_id.filter(|a| *a != current.assignee_id)
    }
}

/// Optional list filters, combined with AND
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assignee_id: Option<Uuid>,
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &TaskFilter) {
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status);
    }
    if let Some(priority) = filter.priority {
        qb.push(" AND priority = ").push_bind(priority);
    }
    if let Some(assignee_id) = filter.assignee_id {
        qb.push(" AND assignee_id = ").push_bind(assignee_id);
    }
}

impl Task {
    pub async fn create(pool: &PgPool, data: CreateTask) -> Result<Self, sqlx::Error> {
        let (owner_id, team_id, assignee_id) = match data.scope {
            TaskScope::Personal { owner_id } => (Some(owner_id), None, None),
            TaskScope::Team { team_id, assignee_id } => (None, Some(team_id), assignee_id),
        };

        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO tasks (title, description, status, priority, due_date, position, \
             owner_id, team_id, assignee_id, created_by) VALUES (",
        );
        {
            let mut values = qb.separated(", ");
            values
                .push_bind(data.title.trim().to_string())
                .push_bind(data.description)
                .push_bind(data.status)
                .push_bind(data.priority)
                .push_bind(data.due_date)
                .push_bind(data.position)
                .push_bind(owner_id)
                .push_bind(team_id)
                .push_bind(assignee_id)
                .push_bind(data.created_by);
        }
        qb.push(") RETURNING ").push(TASK_COLUMNS);

        let task = qb.build_query_as::<Task>().fetch_one(pool).await?;

        tracing::debug!(task_id = %task.id, team_id = ?task.team_id, "Task created");

        Ok(task)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT ");
        qb.push(TASK_COLUMNS).push(" FROM tasks WHERE id = ").push_bind(id);

        qb.build_query_as::<Task>().fetch_optional(pool).await
    }

    /// A user's personal tasks, newest first
    pub async fn list_personal(
        pool: &PgPool,
        owner_id: Uuid,
        filter: &TaskFilter,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT ");
        qb.push(TASK_COLUMNS)
            .push(" FROM tasks WHERE owner_id = ")
            .push_bind(owner_id);
        push_filters(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC");

        qb.build_query_as::<Task>().fetch_all(pool).await
    }

    /// A team's tasks in board order: column, then position, then age
    pub async fn list_team(
        pool: &PgPool,
        team_id: Uuid,
        filter: &TaskFilter,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT ");
        qb.push(TASK_COLUMNS)
            .push(" FROM tasks WHERE team_id = ")
            .push_bind(team_id);
        push_filters(&mut qb, filter);
        qb.push(" ORDER BY status, position, created_at");

        qb.build_query_as::<Task>().fetch_all(pool).await
    }

    /// Applies a partial update
    ///
    /// Returns `None` if the task no longer exists.
    pub async fn update(pool: &PgPool, id: Uuid, data: UpdateTask) -> Result<Option<Self>, sqlx::Error> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE tasks SET updated_at = NOW()");

        if let Some(title) = data.title {
            qb.push(", title = ").push_bind(title.trim().to_string());
        }
        if let Some(description) = data.description {
            qb.push(", description = ").push_bind(description);
        }
        if let Some(status) = data.status {
            qb.push(", status = ").push_bind(status);
        }
        if let Some(priority) = data.priority {
            qb.push(", priority = ").push_bind(priority);
        }
        if let Some(due_date) = data.due_date {
            qb.push(", due_date = ").push_bind(due_date);
        }
        if let Some(position) = data.position {
            qb.push(", position = ").push_bind(position);
        }
        if let Some(assignee_id) = data.assignee_id {
            qb.push(", assignee_id = ").push_bind(assignee_id);
        }

        qb.push(" WHERE id = ").push_bind(id);
        qb.push(" RETURNING ").push(TASK_COLUMNS);

        qb.build_query_as::<Task>().fetch_optional(pool).await
    }

    /// Deletes a task with its comments and the notifications pointing at it
    ///
    /// Runs in one transaction. Returns `false` if the task did not exist.
    pub async fn delete_cascade(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let comments = sqlx::query("DELETE FROM comments WHERE task_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query("DELETE FROM notifications WHERE task_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if deleted == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        tx.commit().await?;

        tracing::debug!(task_id = %id, deleted_comments = comments, "Task deleted");

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_task() -> Task {
        Task {
            id: Uuid::new_v4(),
            title: "Ship it".to_string(),
            description: None,
            status: TaskStatus::Todo,
            priority: TaskPriority::Medium,
            due_date: None,
            position: 0,
            owner_id: None,
            team_id: Some(Uuid::new_v4()),
            assignee_id: None,
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(serde_json::to_string(&TaskStatus::InProgress).unwrap(), r#""in_progress""#);
        let status: TaskStatus = serde_json::from_str(r#""done""#).unwrap();
        assert_eq!(status, TaskStatus::Done);
        assert!(serde_json::from_str::<TaskStatus>(r#""blocked""#).is_err());
    }

    #[test]
    fn test_defaults() {
        let create = CreateTask::new(TaskScope::Personal { owner_id: Uuid::new_v4() }, "x", Uuid::new_v4());
        assert_eq!(create.status, TaskStatus::Todo);
        assert_eq!(create.priority, TaskPriority::Medium);
        assert_eq!(create.position, 0);
    }

    #[test]
    fn test_scope_from_row() {
        let mut task = sample_task();
        let team_id = task.team_id.unwrap();
        assert_eq!(task.scope(), Some(TaskScope::Team { team_id, assignee_id: None }));
        assert!(!task.is_personal());

        let owner = Uuid::new_v4();
        task.team_id = None;
        task.owner_id = Some(owner);
        assert_eq!(task.scope(), Some(TaskScope::Personal { owner_id: owner }));
        assert!(task.is_personal());

        task.team_id = Some(team_id);
        assert_eq!(task.scope(), None);
    }

    #[test]
    fn test_change_detection() {
        let task = sample_task();
        let assignee = Uuid::new_v4();

        let update = UpdateTask {
            status: Some(TaskStatus::Todo),
            assignee_id: Some(None),
            ..Default::default()
        };
        assert_eq!(update.status_change(&task), None);
        assert_eq!(update.assignee_change(&task), None);

        let update = UpdateTask {
            status: Some(TaskStatus::Done),
            assignee_id: Some(Some(assignee)),
            ..Default::default()
        };
        assert_eq!(update.status_change(&task), Some(TaskStatus::Done));
        assert_eq!(update.assignee_change(&task), Some(Some(assignee)));
    }

    #[test]
    fn test_update_is_empty() {
        assert!(UpdateTask::default().is_empty());
        assert!(!UpdateTask { position: Some(3), ..Default::default() }.is_empty());
    }
}

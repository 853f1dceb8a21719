//! Personal task endpoints
//!
//! - `GET    /api/tasks?status=&priority=`
//! - `POST   /api/tasks`
//! - `GET    /api/tasks/:id`
//! - `PUT    /api/tasks/:id`
//! - `DELETE /api/tasks/:id`
//!
//! `GET /api/tasks/:id` also resolves team tasks for members of the team, so
//! links from notifications and search work without knowing the team. Team
//! tasks are changed only through `/api/teams/:id/tasks/...`.
//!
//! The request bodies defined here are shared with the team task routes.

use crate::{
    app::AppState,
    error::{ApiError, ApiJson, ApiPath, ApiQuery, ApiResult},
    routes::{optional_text, required_text, MessageResponse},
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use taskflow_shared::{
    auth::{authorization::require_task_access, middleware::AuthContext},
    models::{
        deserialize_nullable,
        task::{CreateTask, Task, TaskFilter, TaskPriority, TaskScope, TaskStatus, UpdateTask},
    },
};
use uuid::Uuid;
use validator::Validate;

const MANAGED_BY_TEAM: &str = "Team tasks are managed through the team's task routes";

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,

    #[validate(length(max = 5000, message = "Description must be at most 5000 characters"))]
    pub description: Option<String>,

    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<DateTime<Utc>>,

    #[validate(range(min = 0, message = "Position cannot be negative"))]
    pub position: Option<i32>,

    /// Team tasks only
    pub assignee_id: Option<Uuid>,
}

impl CreateTaskRequest {
    /// Validates and converts into a model insert for `scope`
    pub(crate) fn into_create(mut self, scope: TaskScope, created_by: Uuid) -> ApiResult<CreateTask> {
        self.title = self.title.trim().to_string();
        self.description = optional_text(self.description);
        self.validate()?;

        let mut task = CreateTask::new(scope, required_text("title", &self.title)?, created_by);
        task.description = self.description;
        task.status = self.status.unwrap_or_default();
        task.priority = self.priority.unwrap_or_default();
        task.due_date = self.due_date;
        task.position = self.position.unwrap_or(0);

        Ok(task)
    }
}

/// Partial update; `description`, `due_date` and `assignee_id` accept `null`
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateTaskRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "deserialize_nullable")]
    #[validate(length(max = 5000, message = "Description must be at most 5000 characters"))]
    pub description: Option<Option<String>>,

    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,

    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub due_date: Option<Option<DateTime<Utc>>>,

    #[validate(range(min = 0, message = "Position cannot be negative"))]
    pub position: Option<i32>,

    /// Team tasks only; `null` unassigns
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub assignee_id: Option<Option<Uuid>>,
}

impl UpdateTaskRequest {
    pub(crate) fn into_update(mut self) -> ApiResult<UpdateTask> {
        self.title = self.title.map(|t| t.trim().to_string());
        self.description = self.description.map(optional_text);
        self.validate()?;

        Ok(UpdateTask {
            title: self.title.as_deref().map(|t| required_text("title", t)).transpose()?,
            description: self.description,
            status: self.status,
            priority: self.priority,
            due_date: self.due_date,
            position: self.position,
            assignee_id: self.assignee_id,
        })
    }
}

fn personal_only(task: &Task) -> ApiResult<()> {
    if task.is_personal() {
        Ok(())
    } else {
        Err(ApiError::Forbidden(MANAGED_BY_TEAM.to_string()))
    }
}

/// List the caller's personal tasks, newest first
pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(filter): ApiQuery<TaskFilter>,
) -> ApiResult<Json<Vec<Task>>> {
    let filter = TaskFilter {
        assignee_id: None,
        ..filter
    };
    let tasks = Task::list_personal(&state.db, auth.user_id, &filter).await?;

    Ok(Json(tasks))
}

/// Create a personal task
///
/// # Errors
///
/// - `400 Bad Request`: invalid fields, or an `assignee_id` was given
pub async fn create_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    if req.assignee_id.is_some() {
        return Err(ApiError::invalid_field(
            "assignee_id",
            "Personal tasks cannot have an assignee",
        ));
    }

    let data = req.into_create(TaskScope::Personal { owner_id: auth.user_id }, auth.user_id)?;
    let task = Task::create(&state.db, data).await?;

    tracing::info!(task_id = %task.id, user_id = %auth.user_id, "Personal task created");

    Ok((StatusCode::CREATED, Json(task)))
}

/// Get a task the caller may read
///
/// # Errors
///
/// - `403 Forbidden`: someone else's personal task, or a team the caller
///   does not belong to
/// - `404 Not Found`: no such task
pub async fn get_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(task_id): ApiPath<Uuid>,
) -> ApiResult<Json<Task>> {
    let access = require_task_access(&state.db, task_id, auth.user_id).await?;

    Ok(Json(access.task))
}

pub async fn update_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(task_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateTaskRequest>,
) -> ApiResult<Json<Task>> {
    let access = require_task_access(&state.db, task_id, auth.user_id).await?;
    personal_only(&access.task)?;

    if req.assignee_id.is_some() {
        return Err(ApiError::invalid_field(
            "assignee_id",
            "Personal tasks cannot have an assignee",
        ));
    }

    let update = req.into_update()?;
    if update.is_empty() {
        return Ok(Json(access.task));
    }

    let task = Task::update(&state.db, task_id, update)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))?;

    Ok(Json(task))
}

/// Delete a personal task with its comments and notifications
pub async fn delete_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(task_id): ApiPath<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    let access = require_task_access(&state.db, task_id, auth.user_id).await?;
    personal_only(&access.task)?;

    if !Task::delete_cascade(&state.db, task_id).await? {
        return Err(ApiError::NotFound("Task not found".to_string()));
    }

    tracing::info!(task_id = %task_id, user_id = %auth.user_id, "Personal task deleted");

    Ok(Json(MessageResponse::new("Task deleted")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_defaults() {
        let req: CreateTaskRequest = serde_json::from_str(r#"{"title": "  Buy milk  "}"#).unwrap();
        let owner = Uuid::new_v4();

        let task = req.into_create(TaskScope::Personal { owner_id: owner }, owner).unwrap();
        assert_eq!(task.title, "Buy milk");
        assert_eq!(task.status, TaskStatus::Todo);
        assert_eq!(task.priority, TaskPriority::Medium);
        assert_eq!(task.position, 0);
    }

    #[test]
    fn test_create_request_rejects_blank_and_long_titles() {
        let owner = Uuid::new_v4();
        let scope = TaskScope::Personal { owner_id: owner };

        let req: CreateTaskRequest = serde_json::from_str(r#"{"title": "   "}"#).unwrap();
        assert!(req.into_create(scope, owner).is_err());

        let long = "x".repeat(201);
        let req: CreateTaskRequest =
            serde_json::from_value(serde_json::json!({ "title": long })).unwrap();
        assert!(req.into_create(scope, owner).is_err());
    }

    #[test]
    fn test_padding_does_not_count_toward_limits() {
        let owner = Uuid::new_v4();
        let title = format!("  {}  ", "t".repeat(200));

        let req: CreateTaskRequest =
            serde_json::from_value(serde_json::json!({ "title": title })).unwrap();
        let task = req.into_create(TaskScope::Personal { owner_id: owner }, owner).unwrap();
        assert_eq!(task.title.len(), 200);

        let req: UpdateTaskRequest =
            serde_json::from_value(serde_json::json!({ "title": title })).unwrap();
        assert_eq!(req.into_update().unwrap().title.unwrap().len(), 200);
    }

    #[test]
    fn test_create_request_rejects_unknown_status() {
        let result = serde_json::from_str::<CreateTaskRequest>(r#"{"title": "x", "status": "blocked"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_update_request_distinguishes_null_from_absent() {
        let req: UpdateTaskRequest =
            serde_json::from_str(r#"{"description": null, "status": "done"}"#).unwrap();
        let update = req.into_update().unwrap();

        assert_eq!(update.description, Some(None));
        assert_eq!(update.due_date, None);
        assert_eq!(update.status, Some(TaskStatus::Done));
        assert!(update.title.is_none());
    }

    #[test]
    fn test_update_request_blank_description_clears() {
        let req: UpdateTaskRequest = serde_json::from_str(r#"{"description": "   "}"#).unwrap();
        assert_eq!(req.into_update().unwrap().description, Some(None));
    }

    #[test]
    fn test_update_request_negative_position() {
        let req: UpdateTaskRequest = serde_json::from_str(r#"{"position": -1}"#).unwrap();
        assert!(req.into_update().is_err());
    }

    #[test]
    fn test_empty_update() {
        let update = UpdateTaskRequest::default().into_update().unwrap();
        assert!(update.is_empty());
    }
}

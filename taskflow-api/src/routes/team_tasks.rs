//! Team board endpoints
//!
//! - `GET    /api/teams/:id/tasks?status=&priority=&assignee_id=`
//! - `POST   /api/teams/:id/tasks`
//! - `GET    /api/teams/:id/tasks/:task_id`
//! - `PUT    /api/teams/:id/tasks/:task_id`
//! - `DELETE /api/teams/:id/tasks/:task_id`
//!
//! Every member may read, create and update the board. Deleting a task
//! takes its creator or an owner/admin. A task addressed through a team it
//! does not belong to is reported as missing.

use crate::{
    app::AppState,
    error::{ApiError, ApiJson, ApiPath, ApiQuery, ApiResult},
    routes::{
        notify, record_activity,
        tasks::{CreateTaskRequest, UpdateTaskRequest},
        MessageResponse,
    },
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use serde_json::json;
use taskflow_shared::{
    auth::{
        authorization::{can_delete_team_task, require_team_member, TeamAccess},
        middleware::AuthContext,
    },
    models::{
        activity::{ActivityAction, CreateActivity},
        notification::{CreateNotification, NotificationKind},
        task::{Task, TaskFilter, TaskScope},
        team_member::TeamMember,
    },
};
use uuid::Uuid;

/// Resolves a task on a team's board the caller can see
async fn load_team_task(
    state: &AppState,
    team_id: Uuid,
    task_id: Uuid,
    user_id: Uuid,
) -> ApiResult<(TeamAccess, Task)> {
    let access = require_team_member(&state.db, team_id, user_id).await?;

    let task = Task::find_by_id(&state.db, task_id)
        .await?
        .filter(|task| task.team_id == Some(team_id))
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))?;

    Ok((access, task))
}

async fn ensure_assignable(state: &AppState, team_id: Uuid, assignee_id: Uuid) -> ApiResult<()> {
    if TeamMember::is_member(&state.db, team_id, assignee_id).await? {
        Ok(())
    } else {
        Err(ApiError::invalid_field(
            "assignee_id",
            "Assignee must be a member of this team",
        ))
    }
}

async fn notify_assignee(state: &AppState, task: &Task, assignee_id: Uuid, actor_id: Uuid) {
    if assignee_id == actor_id {
        return;
    }

    notify(
        &state.db,
        CreateNotification {
            recipient_id: assignee_id,
            kind: NotificationKind::TaskAssigned,
            message: format!("You were assigned to \"{}\"", task.title),
            task_id: Some(task.id),
            team_id: task.team_id,
            actor_id: Some(actor_id),
        },
    )
    .await;
}

/// List a team's tasks in board order
pub async fn list_team_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(team_id): ApiPath<Uuid>,
    ApiQuery(filter): ApiQuery<TaskFilter>,
) -> ApiResult<Json<Vec<Task>>> {
    require_team_member(&state.db, team_id, auth.user_id).await?;

    let tasks = Task::list_team(&state.db, team_id, &filter).await?;
    Ok(Json(tasks))
}

/// Create a task on the board
///
/// # Errors
///
/// - `400 Bad Request`: invalid fields or the assignee is not a member
/// - `403 Forbidden`: caller is not a member
/// - `404 Not Found`: no such team
pub async fn create_team_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(team_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    require_team_member(&state.db, team_id, auth.user_id).await?;

    let assignee_id = req.assignee_id;
    if let Some(assignee_id) = assignee_id {
        ensure_assignable(&state, team_id, assignee_id).await?;
    }

    let data = req.into_create(TaskScope::Team { team_id, assignee_id }, auth.user_id)?;
    let task = Task::create(&state.db, data).await?;

    tracing::info!(task_id = %task.id, team_id = %team_id, user_id = %auth.user_id, "Team task created");

    record_activity(
        &state.db,
        CreateActivity::new(team_id, auth.user_id, ActivityAction::TaskCreated, task.title.clone())
            .with_task(task.id),
    )
    .await;

    if let Some(assignee_id) = task.assignee_id {
        notify_assignee(&state, &task, assignee_id, auth.user_id).await;
    }

    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn get_team_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath((team_id, task_id)): ApiPath<(Uuid, Uuid)>,
) -> ApiResult<Json<Task>> {
    let (_, task) = load_team_task(&state, team_id, task_id, auth.user_id).await?;
    Ok(Json(task))
}

/// Update a task on the board
///
/// Records `task_status_changed` and/or `task_assigned` when those change,
/// `task_updated` otherwise. The new assignee and, on a status change, the
/// current assignee are notified unless they made the change themselves.
pub async fn update_team_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath((team_id, task_id)): ApiPath<(Uuid, Uuid)>,
    ApiJson(req): ApiJson<UpdateTaskRequest>,
) -> ApiResult<Json<Task>> {
    let (_, current) = load_team_task(&state, team_id, task_id, auth.user_id).await?;

    let update = req.into_update()?;
    if update.is_empty() {
        return Ok(Json(current));
    }

    if let Some(Some(assignee_id)) = update.assignee_id {
        ensure_assignable(&state, team_id, assignee_id).await?;
    }

    let status_change = update.status_change(&current);
    let assignee_change = update.assignee_change(&current);

    let task = Task::update(&state.db, task_id, update)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))?;

    if let Some(status) = status_change {
        record_activity(
            &state.db,
            CreateActivity::new(team_id, auth.user_id, ActivityAction::TaskStatusChanged, task.title.clone())
                .with_task(task.id)
                .with_details(json!({ "from": current.status, "to": status })),
        )
        .await;

        if let Some(assignee_id) = task.assignee_id.filter(|id| *id != auth.user_id) {
            notify(
                &state.db,
                CreateNotification {
                    recipient_id: assignee_id,
                    kind: NotificationKind::TaskStatusChanged,
                    message: format!("\"{}\" moved to {}", task.title, status.as_str()),
                    task_id: Some(task.id),
                    team_id: Some(team_id),
                    actor_id: Some(auth.user_id),
                },
            )
            .await;
        }
    }

    if let Some(assignee) = assignee_change {
        record_activity(
            &state.db,
            CreateActivity::new(team_id, auth.user_id, ActivityAction::TaskAssigned, task.title.clone())
                .with_task(task.id)
                .with_details(json!({ "from": current.assignee_id, "to": assignee })),
        )
        .await;

        if let Some(assignee_id) = assignee {
            notify_assignee(&state, &task, assignee_id, auth.user_id).await;
        }
    }

    if status_change.is_none() && assignee_change.is_none() {
        record_activity(
            &state.db,
            CreateActivity::new(team_id, auth.user_id, ActivityAction::TaskUpdated, task.title.clone())
                .with_task(task.id),
        )
        .await;
    }

    Ok(Json(task))
}

/// Delete a task from the board (creator, owner, admin)
pub async fn delete_team_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath((team_id, task_id)): ApiPath<(Uuid, Uuid)>,
) -> ApiResult<Json<MessageResponse>> {
    let (access, task) = load_team_task(&state, team_id, task_id, auth.user_id).await?;

    if !can_delete_team_task(&task, auth.user_id, access.role) {
        return Err(ApiError::Forbidden(
            "Only the task creator or a team admin can delete this task".to_string(),
        ));
    }

    if !Task::delete_cascade(&state.db, task.id).await? {
        return Err(ApiError::NotFound("Task not found".to_string()));
    }

    tracing::info!(task_id = %task.id, team_id = %team_id, user_id = %auth.user_id, "Team task deleted");

    record_activity(
        &state.db,
        CreateActivity::new(team_id, auth.user_id, ActivityAction::TaskDeleted, task.title)
            .with_task(task.id),
    )
    .await;

    Ok(Json(MessageResponse::new("Task deleted")))
}

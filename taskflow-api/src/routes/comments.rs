//! Task comment endpoints
//!
//! - `GET    /api/tasks/:id/comments`
//! - `POST   /api/tasks/:id/comments`
//! - `PUT    /api/tasks/:id/comments/:comment_id`
//! - `DELETE /api/tasks/:id/comments/:comment_id`
//!
//! Whoever can read the task can read and add comments.

use crate::{
    app::AppState,
    error::{ApiError, ApiJson, ApiPath, ApiResult},
    routes::{display_name, notify, record_activity, required_text, MessageResponse},
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::Deserialize;
use taskflow_shared::{
    auth::{
        authorization::{can_delete_comment, require_task_access, TaskAccess},
        middleware::AuthContext,
    },
    models::{
        activity::{ActivityAction, CreateActivity},
        comment::Comment,
        notification::{CreateNotification, NotificationKind},
        task::Task,
    },
};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CommentRequest {
    #[validate(length(min = 1, max = 2000, message = "Comment must be 1-2000 characters"))]
    pub content: String,
}

impl CommentRequest {
    fn content(self) -> ApiResult<String> {
        let req = Self {
            content: self.content.trim().to_string(),
        };
        req.validate()?;
        required_text("content", &req.content)
    }
}

/// Who hears about a new comment: assignee and creator, once each, never the author
fn comment_recipients(task: &Task, author_id: Uuid) -> Vec<Uuid> {
    let mut recipients = Vec::with_capacity(2);
    for candidate in [task.assignee_id, Some(task.created_by)].into_iter().flatten() {
        if candidate != author_id && !recipients.contains(&candidate) {
            recipients.push(candidate);
        }
    }
    recipients
}

/// Loads a comment and checks it belongs to the task in the path
async fn load_comment(state: &AppState, task_id: Uuid, comment_id: Uuid) -> ApiResult<Comment> {
    Comment::find_by_id(&state.db, comment_id)
        .await?
        .filter(|comment| comment.task_id == task_id)
        .ok_or_else(|| ApiError::NotFound("Comment not found".to_string()))
}

pub async fn list_comments(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(task_id): ApiPath<Uuid>,
) -> ApiResult<Json<Vec<Comment>>> {
    require_task_access(&state.db, task_id, auth.user_id).await?;

    let comments = Comment::list_for_task(&state.db, task_id).await?;
    Ok(Json(comments))
}

/// Add a comment
///
/// On team tasks this is logged to the activity feed and the assignee and
/// creator are notified.
pub async fn create_comment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(task_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<CommentRequest>,
) -> ApiResult<(StatusCode, Json<Comment>)> {
    let TaskAccess { task, .. } = require_task_access(&state.db, task_id, auth.user_id).await?;
    let content = req.content()?;

    let comment = Comment::create(&state.db, task_id, auth.user_id, &content).await?;

    tracing::debug!(comment_id = %comment.id, task_id = %task_id, "Comment added");

    if let Some(team_id) = task.team_id {
        record_activity(
            &state.db,
            CreateActivity::new(team_id, auth.user_id, ActivityAction::CommentAdded, task.title.clone())
                .with_task(task.id),
        )
        .await;

        let recipients = comment_recipients(&task, auth.user_id);
        if !recipients.is_empty() {
            let author = display_name(&state.db, auth.user_id).await?;
            for recipient_id in recipients {
                notify(
                    &state.db,
                    CreateNotification {
                        recipient_id,
                        kind: NotificationKind::CommentAdded,
                        message: format!("{} commented on \"{}\"", author, task.title),
                        task_id: Some(task.id),
                        team_id: Some(team_id),
                        actor_id: Some(auth.user_id),
                    },
                )
                .await;
            }
        }
    }

    Ok((StatusCode::CREATED, Json(comment)))
}

/// Edit a comment (author only)
pub async fn update_comment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath((task_id, comment_id)): ApiPath<(Uuid, Uuid)>,
    ApiJson(req): ApiJson<CommentRequest>,
) -> ApiResult<Json<Comment>> {
    require_task_access(&state.db, task_id, auth.user_id).await?;
    let existing = load_comment(&state, task_id, comment_id).await?;

    if existing.author_id != auth.user_id {
        return Err(ApiError::Forbidden(
            "You can only edit your own comments".to_string(),
        ));
    }

    let content = req.content()?;
    let comment = Comment::update(&state.db, comment_id, &content)
        .await?
        .ok_or_else(|| ApiError::NotFound("Comment not found".to_string()))?;

    Ok(Json(comment))
}

/// Delete a comment (author, or owner/admin of the task's team)
pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath((task_id, comment_id)): ApiPath<(Uuid, Uuid)>,
) -> ApiResult<Json<MessageResponse>> {
    let access = require_task_access(&state.db, task_id, auth.user_id).await?;
    let comment = load_comment(&state, task_id, comment_id).await?;

    if !can_delete_comment(comment.author_id, auth.user_id, access.team_role) {
        return Err(ApiError::Forbidden(
            "You do not have permission to delete this comment".to_string(),
        ));
    }

    if !Comment::delete(&state.db, comment_id).await? {
        return Err(ApiError::NotFound("Comment not found".to_string()));
    }

    Ok(Json(MessageResponse::new("Comment deleted")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use taskflow_shared::models::task::{TaskPriority, TaskStatus};

    fn team_task(created_by: Uuid, assignee_id: Option<Uuid>) -> Task {
        Task {
            id: Uuid::new_v4(),
            title: "Write release notes".to_string(),
            description: None,
            status: TaskStatus::InProgress,
            priority: TaskPriority::High,
            due_date: None,
            position: 0,
            owner_id: None,
            team_id: Some(Uuid::new_v4()),
            assignee_id,
            created_by,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_recipients_exclude_author() {
        let creator = Uuid::new_v4();
        let assignee = Uuid::new_v4();
        let task = team_task(creator, Some(assignee));

        assert_eq!(comment_recipients(&task, creator), vec![assignee]);
        assert_eq!(comment_recipients(&task, assignee), vec![creator]);
    }

    #[test]
    fn test_recipients_deduplicated() {
        let creator = Uuid::new_v4();
        let task = team_task(creator, Some(creator));

        assert_eq!(comment_recipients(&task, Uuid::new_v4()), vec![creator]);
        assert!(comment_recipients(&task, creator).is_empty());
    }

    #[test]
    fn test_recipients_unassigned() {
        let creator = Uuid::new_v4();
        let task = team_task(creator, None);
        let other = Uuid::new_v4();

        assert_eq!(comment_recipients(&task, other), vec![creator]);
    }

    #[test]
    fn test_comment_content_validation() {
        assert!(CommentRequest { content: "  ".to_string() }.content().is_err());
        assert!(CommentRequest { content: "x".repeat(2001) }.content().is_err());
        assert_eq!(
            CommentRequest { content: " Looks good ".to_string() }.content().unwrap(),
            "Looks good"
        );

        let padded = format!("  {}  ", "c".repeat(2000));
        assert_eq!(CommentRequest { content: padded }.content().unwrap().len(), 2000);
    }
}

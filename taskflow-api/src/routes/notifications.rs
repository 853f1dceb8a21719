//! Notification endpoints
//!
//! - `GET    /api/notifications?unread=true&limit=`
//! - `PUT    /api/notifications/read-all`
//! - `PUT    /api/notifications/:id/read`
//! - `DELETE /api/notifications/:id`
//!
//! Notifications are only ever visible to their recipient; anyone else's
//! notification is reported as missing.

use crate::{
    app::AppState,
    error::{ApiError, ApiPath, ApiQuery, ApiResult},
    routes::MessageResponse,
};
use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};
use taskflow_shared::{
    auth::middleware::AuthContext,
    models::{
        clamp_limit,
        notification::{Notification, DEFAULT_LIMIT, MAX_LIMIT},
    },
};
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct NotificationQuery {
    /// Only unread notifications
    #[serde(default)]
    pub unread: bool,

    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct NotificationList {
    pub notifications: Vec<Notification>,
    pub unread_count: i64,
}

#[derive(Debug, Serialize)]
pub struct MarkAllReadResponse {
    pub updated: u64,
}

/// List the caller's notifications, newest first
pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(query): ApiQuery<NotificationQuery>,
) -> ApiResult<Json<NotificationList>> {
    let limit = clamp_limit(query.limit, DEFAULT_LIMIT, MAX_LIMIT);

    let notifications =
        Notification::list_for_user(&state.db, auth.user_id, query.unread, limit).await?;
    let unread_count = Notification::unread_count(&state.db, auth.user_id).await?;

    Ok(Json(NotificationList {
        notifications,
        unread_count,
    }))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Notification>> {
    let notification = Notification::mark_read(&state.db, id, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Notification not found".to_string()))?;

    Ok(Json(notification))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<MarkAllReadResponse>> {
    let updated = Notification::mark_all_read(&state.db, auth.user_id).await?;

    tracing::debug!(user_id = %auth.user_id, updated, "Marked notifications read");

    Ok(Json(MarkAllReadResponse { updated }))
}

pub async fn delete_notification(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    if !Notification::delete(&state.db, id, auth.user_id).await? {
        return Err(ApiError::NotFound("Notification not found".to_string()));
    }

    Ok(Json(MessageResponse::new("Notification deleted")))
}

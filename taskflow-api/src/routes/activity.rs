//! Activity feed endpoint
//!
//! `GET /api/activity?team_id=&limit=` returns entries newest first, either
//! across every team the caller belongs to or for a single team.

use crate::{
    app::AppState,
    error::{ApiQuery, ApiResult},
};
use axum::{extract::State, Extension, Json};
use serde::Deserialize;
use taskflow_shared::{
    auth::{authorization::require_team_member, middleware::AuthContext},
    models::{
        activity::{Activity, DEFAULT_LIMIT, MAX_LIMIT},
        clamp_limit,
    },
};
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct ActivityQuery {
    pub team_id: Option<Uuid>,
    pub limit: Option<i64>,
}

/// # Errors
///
/// With `team_id`: `404` if the team does not exist, `403` if the caller is
/// not a member.
pub async fn list_activity(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(query): ApiQuery<ActivityQuery>,
) -> ApiResult<Json<Vec<Activity>>> {
    let limit = clamp_limit(query.limit, DEFAULT_LIMIT, MAX_LIMIT);

    let entries = match query.team_id {
        Some(team_id) => {
            require_team_member(&state.db, team_id, auth.user_id).await?;
            Activity::list_for_team(&state.db, team_id, limit).await?
        }
        None => Activity::list_for_user(&state.db, auth.user_id, limit).await?,
    };

    Ok(Json(entries))
}

//! Team and membership endpoints
//!
//! - `GET    /api/teams`: teams the caller belongs to
//! - `POST   /api/teams`: create a team, caller becomes owner
//! - `POST   /api/teams/join`: join by invite code
//! - `GET    /api/teams/:id`: team with members
//! - `PUT    /api/teams/:id`: rename/describe (owner, admin)
//! - `DELETE /api/teams/:id`: delete with everything in it (owner)
//! - `POST   /api/teams/:id/invite-code`: new invite code (owner, admin)
//! - `POST   /api/teams/:id/leave`
//! - `PUT    /api/teams/:id/members/:user_id`: change role (owner)
//! - `DELETE /api/teams/:id/members/:user_id`: remove member (owner, admin)

use crate::{
    app::AppState,
    error::{ApiError, ApiJson, ApiPath, ApiResult},
    routes::{display_name, notify, optional_text, record_activity, required_text, MessageResponse},
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;
use taskflow_shared::{
    auth::{
        authorization::{
            can_change_role, can_remove_member, require_team_member, require_team_role, TeamAccess,
        },
        invite_code,
        middleware::AuthContext,
    },
    models::{
        activity::{ActivityAction, CreateActivity},
        deserialize_nullable,
        notification::{CreateNotification, NotificationKind},
        team::{CreateTeam, Team, TeamSummary, UpdateTeam},
        team_member::{MemberInfo, TeamMember, TeamRole},
    },
};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTeamRequest {
    #[validate(length(min = 1, max = 100, message = "Team name must be 1-100 characters"))]
    pub name: String,

    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTeamRequest {
    #[validate(length(min = 1, max = 100, message = "Team name must be 1-100 characters"))]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "deserialize_nullable")]
    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<Option<String>>,
}

impl CreateTeamRequest {
    fn normalized(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            description: optional_text(self.description),
        }
    }
}

impl UpdateTeamRequest {
    fn normalized(self) -> Self {
        Self {
            name: self.name.map(|name| name.trim().to_string()),
            description: self.description.map(optional_text),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct JoinTeamRequest {
    pub invite_code: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangeRoleRequest {
    pub role: TeamRole,
}

/// A team with the caller's role and the member list
#[derive(Debug, Serialize)]
pub struct TeamDetail {
    pub team: Team,
    pub role: TeamRole,
    pub members: Vec<MemberInfo>,
}

async fn team_detail(state: &AppState, team: Team, role: TeamRole) -> ApiResult<Json<TeamDetail>> {
    let members = TeamMember::list_for_team(&state.db, team.id).await?;
    Ok(Json(TeamDetail { team, role, members }))
}

pub async fn list_teams(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<TeamSummary>>> {
    let teams = Team::list_for_user(&state.db, auth.user_id).await?;
    Ok(Json(teams))
}

/// Create a team
///
/// The caller becomes its owner and a unique invite code is generated.
pub async fn create_team(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<CreateTeamRequest>,
) -> ApiResult<(StatusCode, Json<TeamDetail>)> {
    let req = req.normalized();
    req.validate()?;

    let team = Team::create(
        &state.db,
        CreateTeam {
            name: required_text("name", &req.name)?,
            description: req.description,
            owner_id: auth.user_id,
        },
    )
    .await?;

    tracing::info!(team_id = %team.id, owner_id = %auth.user_id, "Team created");

    record_activity(
        &state.db,
        CreateActivity::new(team.id, auth.user_id, ActivityAction::TeamCreated, team.name.clone()),
    )
    .await;

    let detail = team_detail(&state, team, TeamRole::Owner).await?;
    Ok((StatusCode::CREATED, detail))
}

/// Join a team by invite code
///
/// # Errors
///
/// - `404 Not Found`: no team has this code
/// - `409 Conflict`: the caller is already a member
pub async fn join_team(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<JoinTeamRequest>,
) -> ApiResult<Json<TeamDetail>> {
    let code = invite_code::normalize(&req.invite_code);
    if code.is_empty() {
        return Err(ApiError::invalid_field("invite_code", "Invite code is required"));
    }
    if !invite_code::is_valid_format(&code) {
        return Err(ApiError::NotFound("Invalid invite code".to_string()));
    }

    let team = Team::find_by_invite_code(&state.db, &code)
        .await?
        .ok_or_else(|| ApiError::NotFound("Invalid invite code".to_string()))?;

    if TeamMember::is_member(&state.db, team.id, auth.user_id).await? {
        return Err(ApiError::Conflict("You are already a member of this team".to_string()));
    }

    TeamMember::add(&state.db, team.id, auth.user_id, TeamRole::Member).await?;

    tracing::info!(team_id = %team.id, user_id = %auth.user_id, "User joined team");

    let name = display_name(&state.db, auth.user_id).await?;
    record_activity(
        &state.db,
        CreateActivity::new(team.id, auth.user_id, ActivityAction::MemberJoined, name.clone()),
    )
    .await;
    notify(
        &state.db,
        CreateNotification {
            recipient_id: team.owner_id,
            kind: NotificationKind::TeamJoined,
            message: format!("{} joined {}", name, team.name),
            task_id: None,
            team_id: Some(team.id),
            actor_id: Some(auth.user_id),
        },
    )
    .await;

    team_detail(&state, team, TeamRole::Member).await
}

pub async fn get_team(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(team_id): ApiPath<Uuid>,
) -> ApiResult<Json<TeamDetail>> {
    let TeamAccess { team, role } = require_team_member(&state.db, team_id, auth.user_id).await?;
    team_detail(&state, team, role).await
}

/// Update name and/or description (owner, admin)
pub async fn update_team(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(team_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateTeamRequest>,
) -> ApiResult<Json<TeamDetail>> {
    let access = require_team_role(&state.db, team_id, auth.user_id, TeamRole::Admin).await?;
    let req = req.normalized();
    req.validate()?;

    let update = UpdateTeam {
        name: req.name.as_deref().map(|n| required_text("name", n)).transpose()?,
        description: req.description,
    };
    if update.is_empty() {
        return team_detail(&state, access.team, access.role).await;
    }

    let changed: Vec<&str> = [
        update.name.as_ref().map(|_| "name"),
        update.description.as_ref().map(|_| "description"),
    ]
    .into_iter()
    .flatten()
    .collect();

    let team = Team::update(&state.db, team_id, update)
        .await?
        .ok_or_else(|| ApiError::NotFound("Team not found".to_string()))?;

    record_activity(
        &state.db,
        CreateActivity::new(team.id, auth.user_id, ActivityAction::TeamUpdated, team.name.clone())
            .with_details(json!({ "fields": changed })),
    )
    .await;

    team_detail(&state, team, access.role).await
}

/// Delete a team and all of its tasks, comments, activity and memberships
pub async fn delete_team(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(team_id): ApiPath<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    require_team_role(&state.db, team_id, auth.user_id, TeamRole::Owner).await?;

    if !Team::delete_cascade(&state.db, team_id).await? {
        return Err(ApiError::NotFound("Team not found".to_string()));
    }

    tracing::info!(team_id = %team_id, user_id = %auth.user_id, "Team deleted");

    Ok(Json(MessageResponse::new("Team deleted")))
}

/// Replace the invite code (owner, admin)
pub async fn regenerate_invite_code(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(team_id): ApiPath<Uuid>,
) -> ApiResult<Json<Team>> {
    require_team_role(&state.db, team_id, auth.user_id, TeamRole::Admin).await?;

    let team = Team::regenerate_invite_code(&state.db, team_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Team not found".to_string()))?;

    record_activity(
        &state.db,
        CreateActivity::new(
            team.id,
            auth.user_id,
            ActivityAction::InviteCodeRegenerated,
            team.name.clone(),
        ),
    )
    .await;

    Ok(Json(team))
}

async fn leave(state: &AppState, access: TeamAccess, user_id: Uuid) -> ApiResult<Json<MessageResponse>> {
    if access.role == TeamRole::Owner {
        return Err(ApiError::BadRequest(
            "The team owner cannot leave the team; delete it instead".to_string(),
        ));
    }

    if !TeamMember::remove(&state.db, access.team.id, user_id).await? {
        return Err(ApiError::NotFound("Member not found".to_string()));
    }

    tracing::info!(team_id = %access.team.id, user_id = %user_id, "User left team");

    let name = display_name(&state.db, user_id).await?;
    record_activity(
        &state.db,
        CreateActivity::new(access.team.id, user_id, ActivityAction::MemberLeft, name),
    )
    .await;

    Ok(Json(MessageResponse::new(format!("You left {}", access.team.name))))
}

/// Leave a team; the owner cannot leave
pub async fn leave_team(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(team_id): ApiPath<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    let access = require_team_member(&state.db, team_id, auth.user_id).await?;
    leave(&state, access, auth.user_id).await
}

/// Change a member's role (owner only, never on the owner)
///
/// # Errors
///
/// - `403 Forbidden`: caller is not the owner, or the target is the owner
/// - `400 Bad Request`: `role` is `owner` (checked after the caller's role)
/// - `404 Not Found`: team missing or user not a member
pub async fn change_member_role(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath((team_id, user_id)): ApiPath<(Uuid, Uuid)>,
    ApiJson(req): ApiJson<ChangeRoleRequest>,
) -> ApiResult<Json<TeamMember>> {
    let access = require_team_role(&state.db, team_id, auth.user_id, TeamRole::Owner).await?;

    if req.role == TeamRole::Owner {
        return Err(ApiError::invalid_field("role", "Role must be admin or member"));
    }

    let target = TeamMember::find(&state.db, team_id, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Member not found".to_string()))?;

    if !can_change_role(access.role, target.role, req.role) {
        return Err(ApiError::Forbidden(
            "Only the team owner can change member roles".to_string(),
        ));
    }

    if target.role == req.role {
        return Ok(Json(target));
    }

    let member = TeamMember::update_role(&state.db, team_id, user_id, req.role)
        .await?
        .ok_or_else(|| ApiError::NotFound("Member not found".to_string()))?;

    tracing::info!(
        team_id = %team_id,
        user_id = %user_id,
        from = %target.role,
        to = %member.role,
        "Member role changed"
    );

    let name = display_name(&state.db, user_id).await?;
    record_activity(
        &state.db,
        CreateActivity::new(team_id, auth.user_id, ActivityAction::MemberRoleChanged, name)
            .with_details(json!({
                "user_id": user_id,
                "from": target.role,
                "to": member.role,
            })),
    )
    .await;

    Ok(Json(member))
}

/// Remove a member (owner, admin)
///
/// Removing yourself is the same as leaving. The removed member's tasks in
/// the team are unassigned and they are notified.
pub async fn remove_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath((team_id, user_id)): ApiPath<(Uuid, Uuid)>,
) -> ApiResult<Json<MessageResponse>> {
    let access = require_team_member(&state.db, team_id, auth.user_id).await?;

    if user_id == auth.user_id {
        return leave(&state, access, auth.user_id).await;
    }

    let target = TeamMember::find(&state.db, team_id, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Member not found".to_string()))?;

    if !can_remove_member(access.role, target.role) {
        return Err(ApiError::Forbidden(
            "You do not have permission to remove this member".to_string(),
        ));
    }

    if !TeamMember::remove(&state.db, team_id, user_id).await? {
        return Err(ApiError::NotFound("Member not found".to_string()));
    }

    tracing::info!(team_id = %team_id, user_id = %user_id, by = %auth.user_id, "Member removed");

    let name = display_name(&state.db, user_id).await?;
    record_activity(
        &state.db,
        CreateActivity::new(team_id, auth.user_id, ActivityAction::MemberRemoved, name)
            .with_details(json!({ "user_id": user_id })),
    )
    .await;
    notify(
        &state.db,
        CreateNotification {
            recipient_id: user_id,
            kind: NotificationKind::TeamRemoved,
            message: format!("You were removed from {}", access.team.name),
            task_id: None,
            team_id: Some(team_id),
            actor_id: Some(auth.user_id),
        },
    )
    .await;

    Ok(Json(MessageResponse::new("Member removed")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_request_parsing() {
        let req: UpdateTeamRequest = serde_json::from_str(r#"{"description": null}"#).unwrap();
        assert!(req.name.is_none());
        assert_eq!(req.description, Some(None));

        let req: UpdateTeamRequest = serde_json::from_str(r#"{"name": ""}"#).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_names_are_trimmed_before_validation() {
        let name = format!(" {} ", "n".repeat(100));

        let req: CreateTeamRequest = serde_json::from_value(json!({ "name": name })).unwrap();
        assert!(req.validate().is_err());
        let req = req.normalized();
        assert!(req.validate().is_ok());
        assert_eq!(req.name.len(), 100);

        let req: UpdateTeamRequest =
            serde_json::from_value(json!({ "name": name, "description": "  " })).unwrap();
        let req = req.normalized();
        assert!(req.validate().is_ok());
        assert_eq!(req.description, Some(None));
    }

    #[test]
    fn test_change_role_request_parsing() {
        let req: ChangeRoleRequest = serde_json::from_str(r#"{"role": "admin"}"#).unwrap();
        assert_eq!(req.role, TeamRole::Admin);

        assert!(serde_json::from_str::<ChangeRoleRequest>(r#"{"role": "superuser"}"#).is_err());
    }

    #[test]
    fn test_create_request_validation() {
        let req: CreateTeamRequest =
            serde_json::from_value(json!({ "name": "Platform", "description": "x".repeat(501) }))
                .unwrap();
        assert!(req.validate().is_err());
    }
}

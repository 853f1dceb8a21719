//! Authentication and account endpoints
//!
//! - `POST /api/auth/register`: create an account, returns tokens (201)
//! - `POST /api/auth/login`: exchange credentials for tokens
//! - `POST /api/auth/refresh`: exchange a refresh token for an access token
//! - `GET  /api/auth/me`: the caller and their teams
//! - `PUT  /api/auth/me`: update name/avatar
//! - `PUT  /api/auth/password`: change password
//!
//! Argon2 hashing runs on the blocking pool so it never stalls the async
//! workers.

use crate::{
    app::AppState,
    error::{ApiError, ApiJson, ApiResult},
    routes::{optional_text, required_text, MessageResponse},
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::{Deserialize, Serialize};
use taskflow_shared::{
    auth::{
        jwt::{self, TokenPair},
        middleware::AuthContext,
        password,
    },
    models::{
        deserialize_nullable,
        team_member::TeamRole,
        team::Team,
        user::{normalize_email, CreateUser, UpdateProfile, User},
    },
};
use uuid::Uuid;
use validator::Validate;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(
        email(message = "Invalid email format"),
        length(max = 255, message = "Email must be at most 255 characters")
    )]
    pub email: String,

    /// Checked with `validate_password_strength`
    pub password: String,
}

impl RegisterRequest {
    /// Trims the name and lower-cases the email ahead of validation
    fn normalized(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            email: normalize_email(&self.email),
            password: self.password,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub password: String,
}

impl LoginRequest {
    fn normalized(self) -> Self {
        Self {
            email: normalize_email(&self.email),
            password: self.password,
        }
    }
}

/// Register and login response
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    #[serde(flatten)]
    pub tokens: TokenPair,

    pub user: User,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    /// New access token (24h)
    pub token: String,
}

/// A team as listed on the caller's profile
#[derive(Debug, Serialize)]
pub struct ProfileTeam {
    pub id: Uuid,
    pub name: String,
    pub role: TeamRole,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: User,
    pub teams: Vec<ProfileTeam>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    /// `null` removes the avatar
    #[serde(default, deserialize_with = "deserialize_nullable")]
    #[validate(
        url(message = "Avatar URL must be a valid URL"),
        length(max = 512, message = "Avatar URL must be at most 512 characters")
    )]
    pub avatar_url: Option<Option<String>>,
}

impl UpdateProfileRequest {
    /// Trims input ahead of validation; a blank avatar URL removes the avatar
    fn normalized(self) -> Self {
        Self {
            name: self.name.map(|name| name.trim().to_string()),
            avatar_url: self.avatar_url.map(optional_text),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

async fn hash_password(plaintext: String) -> ApiResult<String> {
    tokio::task::spawn_blocking(move || password::hash_password(&plaintext))
        .await
        .map_err(|e| ApiError::InternalError(format!("Hashing task failed: {}", e)))?
        .map_err(ApiError::from)
}

async fn verify_password(plaintext: String, hash: String) -> ApiResult<bool> {
    tokio::task::spawn_blocking(move || password::verify_password(&plaintext, &hash))
        .await
        .map_err(|e| ApiError::InternalError(format!("Verification task failed: {}", e)))?
        .map_err(ApiError::from)
}

fn check_password_strength(field: &str, password: &str) -> ApiResult<()> {
    password::validate_password_strength(password).map_err(|msg| ApiError::invalid_field(field, msg))
}

/// Register a new user
///
/// # Errors
///
/// - `400 Bad Request`: invalid name/email or weak password
/// - `409 Conflict`: email already registered
pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let req = req.normalized();
    req.validate()?;
    let name = required_text("name", &req.name)?;
    check_password_strength("password", &req.password)?;

    let password_hash = hash_password(req.password).await?;

    let user = User::create(
        &state.db,
        CreateUser {
            name,
            email: req.email,
            password_hash,
        },
    )
    .await?;

    let tokens = jwt::issue_token_pair(user.id, state.jwt_secret())?;

    tracing::info!(user_id = %user.id, "User registered");

    Ok((StatusCode::CREATED, Json(AuthResponse { tokens, user })))
}

/// Log in with email and password
///
/// Unknown email and wrong password produce the same 401.
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let req = req.normalized();
    req.validate()?;

    let user = User::find_by_email(&state.db, &req.email)
        .await?
        .ok_or_else(|| ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

    if !verify_password(req.password, user.password_hash.clone()).await? {
        tracing::info!(user_id = %user.id, "Login failed: wrong password");
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    User::update_last_login(&state.db, user.id).await?;
    let tokens = jwt::issue_token_pair(user.id, state.jwt_secret())?;

    tracing::info!(user_id = %user.id, "User logged in");

    Ok(Json(AuthResponse { tokens, user }))
}

/// Exchange a refresh token for a new access token
///
/// # Errors
///
/// - `401 Unauthorized`: invalid, expired or access-type token, or the user
///   no longer exists
pub async fn refresh(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    let claims = jwt::validate_refresh_token(&req.refresh_token, state.jwt_secret())?;

    if User::find_by_id(&state.db, claims.sub).await?.is_none() {
        return Err(ApiError::Unauthorized("User no longer exists".to_string()));
    }

    let token = jwt::refresh_access_token(&req.refresh_token, state.jwt_secret())?;

    Ok(Json(RefreshResponse { token }))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<MeResponse>> {
    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User no longer exists".to_string()))?;

    let teams = Team::list_for_user(&state.db, user.id)
        .await?
        .into_iter()
        .map(|team| ProfileTeam {
            id: team.id,
            name: team.name,
            role: team.role,
        })
        .collect();

    Ok(Json(MeResponse { user, teams }))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> ApiResult<Json<User>> {
    let req = req.normalized();
    req.validate()?;

    let name = req.name.as_deref().map(|n| required_text("name", n)).transpose()?;

    let user = User::update_profile(
        &state.db,
        auth.user_id,
        UpdateProfile {
            name,
            avatar_url: req.avatar_url,
        },
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(user))
}

/// Change the caller's password
///
/// # Errors
///
/// - `400 Bad Request`: weak new password
/// - `401 Unauthorized`: current password is wrong
pub async fn change_password(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    check_password_strength("new_password", &req.new_password)?;

    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    if !verify_password(req.current_password, user.password_hash).await? {
        return Err(ApiError::Unauthorized("Current password is incorrect".to_string()));
    }

    let password_hash = hash_password(req.new_password).await?;
    User::update_password(&state.db, user.id, &password_hash).await?;

    tracing::info!(user_id = %user.id, "Password changed");

    Ok(Json(MessageResponse::new("Password updated")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(email: &str) -> RegisterRequest {
        RegisterRequest {
            name: "  Ada  ".to_string(),
            email: email.to_string(),
            password: "kanban2024".to_string(),
        }
    }

    #[test]
    fn test_register_trims_before_validating() {
        let req = register(" Ada@Example.com ").normalized();

        assert!(req.validate().is_ok());
        assert_eq!(req.name, "Ada");
        assert_eq!(req.email, "ada@example.com");
    }

    #[test]
    fn test_register_rejects_email_longer_than_column() {
        let label = "d".repeat(63);
        let email = format!("{}@{}.{}.{}.com", "u".repeat(64), label, label, label);
        assert_eq!(email.len(), 260);

        let errors = register(&email).normalized().validate().unwrap_err();
        let field_errors = errors.field_errors();
        assert_eq!(field_errors["email"][0].code, "length");
    }

    #[test]
    fn test_login_accepts_padded_email() {
        let req = LoginRequest {
            email: " ada@example.com ".to_string(),
            password: "x".to_string(),
        }
        .normalized();

        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_profile_avatar_url_length_limit() {
        let long = format!("https://example.com/{}", "a".repeat(600));
        let req: UpdateProfileRequest =
            serde_json::from_value(serde_json::json!({ "avatar_url": long })).unwrap();
        assert!(req.normalized().validate().is_err());

        let ok: UpdateProfileRequest =
            serde_json::from_str(r#"{"avatar_url": "https://example.com/me.png"}"#).unwrap();
        assert!(ok.normalized().validate().is_ok());
    }

    #[test]
    fn test_profile_blank_avatar_clears() {
        let req: UpdateProfileRequest = serde_json::from_str(r#"{"avatar_url": "  "}"#).unwrap();
        let req = req.normalized();

        assert_eq!(req.avatar_url, Some(None));
        assert!(req.validate().is_ok());
    }
}

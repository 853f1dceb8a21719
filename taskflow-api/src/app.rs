//! Application state and router builder
//!
//! # Example
//!
//! ```no_run
//! use taskflow_api::{app::{build_router, AppState}, config::Config};
//! use taskflow_shared::db::pool::{create_pool, DatabaseConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::from_env()?;
//! let pool = create_pool(DatabaseConfig::new(config.database.url.clone())).await?;
//! let app = build_router(AppState::new(pool, config));
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

use crate::{
    config::Config,
    error::ApiError,
    middleware::{
        rate_limit::{rate_limit_layer, RateLimit, RateLimiter},
        security::SecurityHeadersLayer,
    },
    routes,
};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::{from_fn_with_state, Next},
    response::Response,
    routing::{get, post, put},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use taskflow_shared::auth::middleware::authenticate_bearer;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Buckets idle this long are full again and can be dropped
const RATE_LIMIT_IDLE: Duration = Duration::from_secs(120);

/// Shared application state
///
/// Cloned into every handler through axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    pub config: Arc<Config>,

    /// Per-IP budget for the whole API
    pub rate_limiter: Arc<RateLimiter>,

    /// Per-IP budget for register/login/refresh
    pub auth_rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(db: PgPool, config: Config) -> Self {
        let rate_limiter = Arc::new(RateLimiter::new(RateLimit::per_minute(
            config.rate_limit.requests_per_minute,
        )));
        let auth_rate_limiter = Arc::new(RateLimiter::new(RateLimit::per_minute(
            config.rate_limit.auth_requests_per_minute,
        )));

        Self {
            db,
            config: Arc::new(config),
            rate_limiter,
            auth_rate_limiter,
        }
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete router
///
/// ```text
/// /api
/// ├── GET  /health
/// ├── /auth          register, login, refresh (public, auth budget)
/// │                  me, password (JWT)
/// ├── /tasks         personal tasks + comments (JWT)
/// ├── /teams         teams, members, team tasks (JWT)
/// ├── /notifications (JWT)
/// ├── GET /activity  (JWT)
/// └── GET /search    (JWT)
/// ```
///
/// Middleware, innermost first: JWT auth (protected routes only), per-IP
/// rate limit, request tracing, response compression, CORS, security headers.
pub fn build_router(state: AppState) -> Router {
    let public_auth_routes = Router::new()
        .route("/auth/register", post(routes::auth::register))
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/refresh", post(routes::auth::refresh))
        .layer(from_fn_with_state(
            state.auth_rate_limiter.clone(),
            rate_limit_layer,
        ));

    let protected_routes = Router::new()
        .route(
            "/auth/me",
            get(routes::auth::me).put(routes::auth::update_profile),
        )
        .route("/auth/password", put(routes::auth::change_password))
        .route(
            "/tasks",
            get(routes::tasks::list_tasks).post(routes::tasks::create_task),
        )
        .route(
            "/tasks/:id",
            get(routes::tasks::get_task)
                .put(routes::tasks::update_task)
                .delete(routes::tasks::delete_task),
        )
        .route(
            "/tasks/:id/comments",
            get(routes::comments::list_comments).post(routes::comments::create_comment),
        )
        .route(
            "/tasks/:id/comments/:comment_id",
            put(routes::comments::update_comment).delete(routes::comments::delete_comment),
        )
        .route(
            "/teams",
            get(routes::teams::list_teams).post(routes::teams::create_team),
        )
        .route("/teams/join", post(routes::teams::join_team))
        .route(
            "/teams/:id",
            get(routes::teams::get_team)
                .put(routes::teams::update_team)
                .delete(routes::teams::delete_team),
        )
        .route(
            "/teams/:id/invite-code",
            post(routes::teams::regenerate_invite_code),
        )
        .route("/teams/:id/leave", post(routes::teams::leave_team))
        .route(
            "/teams/:id/members/:user_id",
            put(routes::teams::change_member_role).delete(routes::teams::remove_member),
        )
        .route(
            "/teams/:id/tasks",
            get(routes::team_tasks::list_team_tasks).post(routes::team_tasks::create_team_task),
        )
        .route(
            "/teams/:id/tasks/:task_id",
            get(routes::team_tasks::get_team_task)
                .put(routes::team_tasks::update_team_task)
                .delete(routes::team_tasks::delete_team_task),
        )
        .route("/notifications", get(routes::notifications::list_notifications))
        .route(
            "/notifications/read-all",
            put(routes::notifications::mark_all_read),
        )
        .route("/notifications/:id/read", put(routes::notifications::mark_read))
        .route(
            "/notifications/:id",
            axum::routing::delete(routes::notifications::delete_notification),
        )
        .route("/activity", get(routes::activity::list_activity))
        .route("/search", get(routes::search::search))
        .layer(from_fn_with_state(state.clone(), jwt_auth_layer));

    let api_routes = Router::new()
        .route("/health", get(routes::health::health_check))
        .merge(public_auth_routes)
        .merge(protected_routes)
        .layer(from_fn_with_state(state.rate_limiter.clone(), rate_limit_layer));

    Router::new()
        .nest("/api", api_routes)
        .fallback(routes::not_found)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CompressionLayer::new())
        .layer(cors_layer(&state.config))
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.cors_allows_any() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}

/// JWT authentication middleware
///
/// Validates the bearer access token and inserts the resulting
/// `AuthContext` into request extensions.
async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth = authenticate_bearer(req.headers(), state.jwt_secret())?;

    req.extensions_mut().insert(auth);

    Ok(next.run(req).await)
}

/// Periodically drops idle rate limit buckets
pub fn spawn_rate_limit_pruner(state: &AppState) -> tokio::task::JoinHandle<()> {
    let limiters = [state.rate_limiter.clone(), state.auth_rate_limiter.clone()];

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(RATE_LIMIT_IDLE);
        loop {
            interval.tick().await;
            let pruned: usize = limiters
                .iter()
                .map(|limiter| limiter.prune_idle(RATE_LIMIT_IDLE))
                .sum();
            if pruned > 0 {
                tracing::debug!(pruned, "Pruned idle rate limit buckets");
            }
        }
    })
}

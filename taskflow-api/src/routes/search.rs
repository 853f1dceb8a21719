//! Search endpoint
//!
//! `GET /api/search?q=` matches the query case-insensitively against task
//! titles/descriptions and team names/descriptions the caller can see.

use crate::{
    app::AppState,
    error::{ApiError, ApiQuery, ApiResult},
};
use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};
use taskflow_shared::{
    auth::middleware::AuthContext,
    models::{
        search::{self, MAX_QUERY_LENGTH},
        task::Task,
        team::Team,
    },
};

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub tasks: Vec<Task>,
    pub teams: Vec<Team>,
}

/// Trims and bounds a search query
fn parse_query(raw: &str) -> ApiResult<String> {
    let query = raw.trim();

    if query.is_empty() {
        return Err(ApiError::invalid_field("q", "Search query is required"));
    }
    if query.chars().count() > MAX_QUERY_LENGTH {
        return Err(ApiError::invalid_field(
            "q",
            format!("Search query must be at most {} characters", MAX_QUERY_LENGTH),
        ));
    }

    Ok(query.to_string())
}

/// # Errors
///
/// - `400 Bad Request`: empty query or longer than 100 characters
pub async fn search(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(params): ApiQuery<SearchQuery>,
) -> ApiResult<Json<SearchResponse>> {
    let query = parse_query(&params.q)?;

    let results = search::search(&state.db, auth.user_id, &query).await?;

    tracing::debug!(
        user_id = %auth.user_id,
        tasks = results.tasks.len(),
        teams = results.teams.len(),
        "Search completed"
    );

    Ok(Json(SearchResponse {
        query,
        tasks: results.tasks,
        teams: results.teams,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query() {
        assert_eq!(parse_query("  roadmap ").unwrap(), "roadmap");
        assert!(parse_query("").is_err());
        assert!(parse_query("   ").is_err());
        assert!(parse_query(&"a".repeat(MAX_QUERY_LENGTH)).is_ok());
        assert!(parse_query(&"a".repeat(MAX_QUERY_LENGTH + 1)).is_err());
    }
}

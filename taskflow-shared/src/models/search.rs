//! Cross-entity substring search
//!
//! Matches are case-insensitive (`ILIKE`) and limited to what the caller can
//! already see: their personal tasks, tasks of their teams and the teams
//! themselves.

use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::task::Task;
use super::team::Team;

/// Maximum results per entity type
pub const RESULT_LIMIT: i64 = 20;

/// Longest accepted query
pub const MAX_QUERY_LENGTH: usize = 100;

#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub tasks: Vec<Task>,
    pub teams: Vec<Team>,
}

/// Escapes `LIKE` metacharacters so user input only matches literally
///
/// ```
/// use taskflow_shared::models::search::escape_like;
///
/// assert_eq!(escape_like("50%_off"), r"50\%\_off");
/// ```
pub fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Wraps escaped input in `%...%` for a substring match
pub fn contains_pattern(query: &str) -> String {
    format!("%{}%", escape_like(query.trim()))
}

/// Searches task titles/descriptions and team names/descriptions
pub async fn search(pool: &PgPool, user_id: Uuid, query: &str) -> Result<SearchResults, sqlx::Error> {
    let pattern = contains_pattern(query);

    let tasks = sqlx::query_as::<_, Task>(
        r#"
        SELECT id, title, description, status, priority, due_date, position,
               owner_id, team_id, assignee_id, created_by, created_at, updated_at
        FROM tasks
        WHERE (owner_id = $1
               OR team_id IN (SELECT team_id FROM team_members WHERE user_id = $1))
          AND (title ILIKE $2 ESCAPE '\' OR description ILIKE $2 ESCAPE '\')
        ORDER BY updated_at DESC
        LIMIT $3
        "#,
    )
    .bind(user_id)
    .bind(&pattern)
    .bind(RESULT_LIMIT)
    .fetch_all(pool)
    .await?;

    let teams = sqlx::query_as::<_, Team>(
        r#"
        SELECT t.id, t.name, t.description, t.owner_id, t.invite_code, t.created_at, t.updated_at
        FROM teams t
        JOIN team_members m ON m.team_id = t.id AND m.user_id = $1
        WHERE t.name ILIKE $2 ESCAPE '\' OR t.description ILIKE $2 ESCAPE '\'
        ORDER BY t.name
        LIMIT $3
        "#,
    )
    .bind(user_id)
    .bind(&pattern)
    .bind(RESULT_LIMIT)
    .fetch_all(pool)
    .await?;

    tracing::debug!(
        user_id = %user_id,
        tasks = tasks.len(),
        teams = teams.len(),
        "Search completed"
    );

    Ok(SearchResults { tasks, teams })
}

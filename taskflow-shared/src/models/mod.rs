//! Database models and their queries
//!
//! Each model owns the SQL that reads and writes its table, following the
//! same shape: a `FromRow` struct, a `Create*` input, and async associated
//! functions taking a `&PgPool`.
//!
//! - `user`: accounts and profiles
//! - `team`: team workspaces, invite codes and the team delete cascade
//! - `team_member`: membership rows and the role hierarchy
//! - `task`: personal and team tasks, filters, the task delete cascade
//! - `comment`: task comments with author names
//! - `activity`: append-only team audit log
//! - `notification`: per-user notifications
//! - `search`: cross-entity substring search
//!
//! ```no_run
//! use taskflow_shared::db::pool::{create_pool, DatabaseConfig};
//! use taskflow_shared::models::user::{CreateUser, User};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = create_pool(DatabaseConfig::new(std::env::var("DATABASE_URL")?)).await?;
//!
//! let user = User::create(&pool, CreateUser {
//!     name: "Ada".to_string(),
//!     email: "ada@example.com".to_string(),
//!     password_hash: "$argon2id$...".to_string(),
//! }).await?;
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Deserializer};

pub mod activity;
pub mod comment;
pub mod notification;
pub mod search;
pub mod task;
pub mod team;
pub mod team_member;
pub mod user;

/// Deserializes a field that distinguishes "absent" from "explicitly null"
///
/// Use with `#[serde(default, deserialize_with = "deserialize_nullable")]` on
/// an `Option<Option<T>>`: a missing key stays `None`, `null` becomes
/// `Some(None)` and a value becomes `Some(Some(v))`.
pub fn deserialize_nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// True when a query failed on a unique constraint
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// True when a value exceeded its column's length (SQLSTATE 22001)
pub fn is_value_too_long(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("22001"))
}

/// Name of the violated constraint, if the error carries one
pub fn constraint_name(err: &sqlx::Error) -> Option<&str> {
    match err {
        sqlx::Error::Database(db) => db.constraint(),
        _ => None,
    }
}

/// Clamps a user-supplied page size into `1..=max`, falling back to `default`
pub fn clamp_limit(limit: Option<i64>, default: i64, max: i64) -> i64 {
    limit.unwrap_or(default).clamp(1, max)
}

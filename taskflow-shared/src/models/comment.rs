//! Task comments
//!
//! Every query joins `users` so comments always carry the author's current
//! display name.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: Uuid,
    pub task_id: Uuid,
    pub author_id: Uuid,
    pub author_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    /// Lists a task's comments, oldest first
    pub async fn list_for_task(pool: &PgPool, task_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let comments = sqlx::query_as::<_, Comment>(
            r#"
            SELECT c.id, c.task_id, c.author_id, u.name AS author_name,
                   c.content, c.created_at, c.updated_at
            FROM comments c
            JOIN users u ON u.id = c.author_id
            WHERE c.task_id = $1
            ORDER BY c.created_at ASC
            "#,
        )
        .bind(task_id)
        .fetch_all(pool)
        .await?;

        Ok(comments)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"
            SELECT c.id, c.task_id, c.author_id, u.name AS author_name,
                   c.content, c.created_at, c.updated_at
            FROM comments c
            JOIN users u ON u.id = c.author_id
            WHERE c.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(comment)
    }

    pub async fn create(
        pool: &PgPool,
        task_id: Uuid,
        author_id: Uuid,
        content: &str,
    ) -> Result<Self, sqlx::Error> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"
            WITH inserted AS (
                INSERT INTO comments (task_id, author_id, content)
                VALUES ($1, $2, $3)
                RETURNING id, task_id, author_id, content, created_at, updated_at
            )
            SELECT i.id, i.task_id, i.author_id, u.name AS author_name,
                   i.content, i.created_at, i.updated_at
            FROM inserted i
            JOIN users u ON u.id = i.author_id
            "#,
        )
        .bind(task_id)
        .bind(author_id)
        .bind(content.trim())
        .fetch_one(pool)
        .await?;

        Ok(comment)
    }

    /// Replaces a comment's content, returning `None` if it no longer exists
    pub async fn update(pool: &PgPool, id: Uuid, content: &str) -> Result<Option<Self>, sqlx::Error> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"
            WITH updated AS (
                UPDATE comments
                SET content = $2, updated_at = NOW()
                WHERE id = $1
                RETURNING id, task_id, author_id, content, created_at, updated_at
            )
            SELECT c.id, c.task_id, c.author_id, u.name AS author_name,
                   c.content, c.created_at, c.updated_at
            FROM updated c
            JOIN users u ON u.id = c.author_id
            "#,
        )
        .bind(id)
        .bind(content.trim())
        .fetch_optional(pool)
        .await?;

        Ok(comment)
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

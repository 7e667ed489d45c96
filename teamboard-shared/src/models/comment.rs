//! Comment model and database operations
//!
//! Comments are append-only per task and are always read back in creation
//! order.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE comments (
//!     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     task_id UUID NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
//!     author_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
//!     content TEXT NOT NULL,
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgExecutor;
use uuid::Uuid;

/// Comment record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: Uuid,
    pub task_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a comment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateComment {
    pub task_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
}

impl Comment {
    pub async fn insert<'e, E>(
        executor: E,
        id: Uuid,
        data: &CreateComment,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let comment = sqlx::query_as::<_, Comment>(
            r#"
            INSERT INTO comments (id, task_id, author_id, content)
            VALUES ($1, $2, $3, $4)
            RETURNING id, task_id, author_id, content, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(data.task_id)
        .bind(data.author_id)
        .bind(&data.content)
        .fetch_one(executor)
        .await?;

        Ok(comment)
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let comment = sqlx::query_as::<_, Comment>(
            r#"
            SELECT id, task_id, author_id, content, created_at, updated_at
            FROM comments
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(comment)
    }

    /// Lists a task's comments in creation order
    pub async fn list_for_task<'e, E>(executor: E, task_id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let comments = sqlx::query_as::<_, Comment>(
            r#"
            SELECT id, task_id, author_id, content, created_at, updated_at
            FROM comments
            WHERE task_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(task_id)
        .fetch_all(executor)
        .await?;

        Ok(comments)
    }

    /// Replaces a comment's content
    ///
    /// Returns `None` if the comment does not exist.
    pub async fn update_content<'e, E>(
        executor: E,
        id: Uuid,
        content: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let comment = sqlx::query_as::<_, Comment>(
            r#"
            UPDATE comments
            SET content = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, task_id, author_id, content, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(content)
        .fetch_optional(executor)
        .await?;

        Ok(comment)
    }

    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

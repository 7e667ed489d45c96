//! User model and database operations
//!
//! Users are owned by the external identity service. The board only mirrors
//! the profile fields it needs for member listings and invite-by-email, and
//! treats a resolved user as read-only for the rest of the request.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE users (
//!     id UUID PRIMARY KEY,
//!     email VARCHAR(320) NOT NULL,
//!     name VARCHAR(255),
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! CREATE UNIQUE INDEX users_email_unique ON users (LOWER(email));
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgExecutor;
use uuid::Uuid;

/// User profile as seen by the board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// User ID assigned by the identity service
    pub id: Uuid,

    /// Unique contact address (compared case-insensitively)
    pub email: String,

    /// Optional display name
    pub name: Option<String>,

    /// When the profile was first mirrored
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Builds a profile record for a freshly resolved identity
    pub fn new(id: Uuid, email: impl Into<String>, name: Option<String>) -> Self {
        Self {
            id,
            email: email.into(),
            name,
            created_at: Utc::now(),
        }
    }

    /// Name shown to other members, falling back to the email address
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.email)
    }

    /// Finds a user by ID
    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, name, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(user)
    }

    /// Finds a user by email address (case-insensitive)
    pub async fn find_by_email<'e, E>(executor: E, email: &str) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, name, created_at
            FROM users
            WHERE LOWER(email) = LOWER($1)
            "#,
        )
        .bind(email)
        .fetch_optional(executor)
        .await?;

        Ok(user)
    }

    /// Inserts or refreshes a mirrored profile
    ///
    /// The identity service is the source of truth, so email and name are
    /// overwritten on conflict while `created_at` is kept.
    pub async fn upsert<'e, E>(executor: E, user: &User) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, name, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
                SET email = EXCLUDED.email,
                    name = EXCLUDED.name
            RETURNING id, email, name, created_at
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(user.created_at)
        .fetch_one(executor)
        .await?;

        Ok(user)
    }
}

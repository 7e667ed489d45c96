//! Team model and database operations
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE teams (
//!     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     name VARCHAR(255) NOT NULL,
//!     description TEXT,
//!     created_by UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```
//!
//! Deleting a team cascades to its memberships, tasks and (through tasks)
//! comments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgExecutor;
use uuid::Uuid;

use super::membership::TeamRole;

/// Team record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Team {
    /// Unique team ID
    pub id: Uuid,

    /// Display name
    pub name: String,

    /// Optional free-form description
    pub description: Option<String>,

    /// User who created the team (its first manager)
    pub created_by: Uuid,

    /// When the team was created
    pub created_at: DateTime<Utc>,

    /// When the team was last updated
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a team
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTeam {
    pub name: String,
    pub description: Option<String>,
}

/// Partial team update
///
/// `description: Some(None)` clears the description.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTeam {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
}

impl UpdateTeam {
    /// True when the update would not change anything
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none()
    }
}

/// A team as seen by one of its members
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TeamSummary {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,

    /// The viewing user's role in this team
    pub role: TeamRole,

    /// Number of memberships in the team
    pub member_count: i64,

    pub created_at: DateTime<Utc>,
}

impl Team {
    /// Inserts a new team row
    ///
    /// The creator's manager membership is inserted separately, inside the
    /// same transaction, by the store.
    pub async fn insert<'e, E>(
        executor: E,
        id: Uuid,
        data: &CreateTeam,
        created_by: Uuid,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let team = sqlx::query_as::<_, Team>(
            r#"
            INSERT INTO teams (id, name, description, created_by)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, description, created_by, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&data.name)
        .bind(&data.description)
        .bind(created_by)
        .fetch_one(executor)
        .await?;

        Ok(team)
    }

    /// Finds a team by ID
    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let team = sqlx::query_as::<_, Team>(
            r#"
            SELECT id, name, description, created_by, created_at, updated_at
            FROM teams
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(team)
    }

    /// Locks the team row for the rest of the transaction
    ///
    /// Every guarded membership change takes this lock first, so changes to
    /// the same team's roster are applied one after another.
    ///
    /// Returns `false` if the team does not exist.
    pub async fn lock<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let locked: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id FROM teams
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(locked.is_some())
    }

    /// Lists the teams a user belongs to, with their role and the member count
    pub async fn list_for_user<'e, E>(
        executor: E,
        user_id: Uuid,
    ) -> Result<Vec<TeamSummary>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let teams = sqlx::query_as::<_, TeamSummary>(
            r#"
            SELECT t.id, t.name, t.description, m.role, t.created_at,
                   (SELECT COUNT(*) FROM team_members c WHERE c.team_id = t.id) AS member_count
            FROM teams t
            JOIN team_members m ON m.team_id = t.id
            WHERE m.user_id = $1
            ORDER BY t.created_at, t.id
            "#,
        )
        .bind(user_id)
        .fetch_all(executor)
        .await?;

        Ok(teams)
    }

    /// Applies a partial update
    ///
    /// Returns `None` if the team does not exist.
    pub async fn update<'e, E>(
        executor: E,
        id: Uuid,
        data: &UpdateTeam,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let mut query = String::from("UPDATE teams SET updated_at = NOW()");
        let mut param_count = 1;

        if data.name.is_some() {
            param_count += 1;
            query.push_str(&format!(", name = ${}", param_count));
        }
        if data.description.is_some() {
            param_count += 1;
            query.push_str(&format!(", description = ${}", param_count));
        }

        query.push_str(
            " WHERE id = $1 RETURNING id, name, description, created_by, created_at, updated_at",
        );

        let mut q = sqlx::query_as::<_, Team>(&query).bind(id);
        if let Some(name) = &data.name {
            q = q.bind(name);
        }
        if let Some(description) = &data.description {
            q = q.bind(description);
        }

        let team = q.fetch_optional(executor).await?;
        Ok(team)
    }

    /// Deletes a team and, by cascade, everything it owns
    ///
    /// Returns `true` if a row was deleted.
    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM teams WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_team_is_empty() {
        assert!(UpdateTeam::default().is_empty());

        let rename = UpdateTeam {
            name: Some("Platform".to_string()),
            description: None,
        };
        assert!(!rename.is_empty());

        let clear = UpdateTeam {
            name: None,
            description: Some(None),
        };
        assert!(!clear.is_empty());
    }
}

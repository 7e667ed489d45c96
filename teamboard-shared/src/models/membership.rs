//! Membership model and database operations
//!
//! A membership ties a user to a team with one of two roles. For every team
//! that has at least one membership, at least one of them is a manager; the
//! queries here are the building blocks the store combines, under a team row
//! lock, to keep that true.
//!
//! # Schema
//!
//! ```sql
//! CREATE TYPE team_role AS ENUM ('manager', 'member');
//!
//! CREATE TABLE team_members (
//!     team_id UUID NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
//!     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
//!     role team_role NOT NULL DEFAULT 'member',
//!     joined_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     PRIMARY KEY (team_id, user_id)
//! );
//! ```
//!
//! # Roles
//!
//! - **manager**: Manage the roster, create/edit/delete tasks, moderate comments
//! - **member**: Read the board, comment, move tasks assigned to them

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgExecutor;
use uuid::Uuid;

use super::ParseEnumError;

/// Role held within a team
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "team_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TeamRole {
    /// Full control over the team
    Manager,

    /// Regular participant
    Member,
}

impl TeamRole {
    /// Converts role to string for display
    pub fn as_str(&self) -> &'static str {
        match self {
            TeamRole::Manager => "manager",
            TeamRole::Member => "member",
        }
    }

    pub fn is_manager(&self) -> bool {
        matches!(self, TeamRole::Manager)
    }

    /// Checks if this role satisfies the required role
    ///
    /// Hierarchy: Manager > Member
    pub fn satisfies(&self, required: TeamRole) -> bool {
        match required {
            TeamRole::Member => true,
            TeamRole::Manager => self.is_manager(),
        }
    }
}

impl fmt::Display for TeamRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TeamRole {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "manager" => Ok(TeamRole::Manager),
            "member" => Ok(TeamRole::Member),
            _ => Err(ParseEnumError::new("role", s, "manager, member")),
        }
    }
}

/// Membership record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Membership {
    /// Team ID
    pub team_id: Uuid,

    /// User ID
    pub user_id: Uuid,

    /// Role within the team
    pub role: TeamRole,

    /// When the user joined the team
    pub joined_at: DateTime<Utc>,
}

/// A membership joined with the member's profile, for roster listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MemberDetails {
    pub user_id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub role: TeamRole,
    pub joined_at: DateTime<Utc>,
}

impl Membership {
    /// Inserts a membership unless the user already belongs to the team
    ///
    /// Returns `None` when a membership for `(team_id, user_id)` already
    /// exists; the existing row is left untouched.
    pub async fn insert<'e, E>(
        executor: E,
        team_id: Uuid,
        user_id: Uuid,
        role: TeamRole,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let membership = sqlx::query_as::<_, Membership>(
            r#"
            INSERT INTO team_members (team_id, user_id, role)
            VALUES ($1, $2, $3)
            ON CONFLICT (team_id, user_id) DO NOTHING
            RETURNING team_id, user_id, role, joined_at
            "#,
        )
        .bind(team_id)
        .bind(user_id)
        .bind(role)
        .fetch_optional(executor)
        .await?;

        Ok(membership)
    }

    /// Finds a specific membership by team and user
    pub async fn find<'e, E>(
        executor: E,
        team_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let membership = sqlx::query_as::<_, Membership>(
            r#"
            SELECT team_id, user_id, role, joined_at
            FROM team_members
            WHERE team_id = $1 AND user_id = $2
            "#,
        )
        .bind(team_id)
        .bind(user_id)
        .fetch_optional(executor)
        .await?;

        Ok(membership)
    }

    /// Lists a team's members with their profiles, in join order
    pub async fn list_members<'e, E>(
        executor: E,
        team_id: Uuid,
    ) -> Result<Vec<MemberDetails>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let members = sqlx::query_as::<_, MemberDetails>(
            r#"
            SELECT m.user_id, u.email, u.name, m.role, m.joined_at
            FROM team_members m
            JOIN users u ON u.id = m.user_id
            WHERE m.team_id = $1
            ORDER BY m.joined_at, m.user_id
            "#,
        )
        .bind(team_id)
        .fetch_all(executor)
        .await?;

        Ok(members)
    }

    /// Lists the IDs of every team a user belongs to
    pub async fn team_ids_for_user<'e, E>(
        executor: E,
        user_id: Uuid,
    ) -> Result<Vec<Uuid>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT team_id FROM team_members
            WHERE user_id = $1
            ORDER BY joined_at
            "#,
        )
        .bind(user_id)
        .fetch_all(executor)
        .await?;

        Ok(ids)
    }

    /// Counts the managers of a team
    pub async fn count_managers<'e, E>(executor: E, team_id: Uuid) -> Result<i64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM team_members
            WHERE team_id = $1 AND role = 'manager'
            "#,
        )
        .bind(team_id)
        .fetch_one(executor)
        .await?;

        Ok(count)
    }

    /// Updates a user's role in a team
    ///
    /// Returns `None` if the membership doesn't exist.
    pub async fn update_role<'e, E>(
        executor: E,
        team_id: Uuid,
        user_id: Uuid,
        role: TeamRole,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let membership = sqlx::query_as::<_, Membership>(
            r#"
            UPDATE team_members
            SET role = $3, updated_at = NOW()
            WHERE team_id = $1 AND user_id = $2
            RETURNING team_id, user_id, role, joined_at
            "#,
        )
        .bind(team_id)
        .bind(user_id)
        .bind(role)
        .fetch_optional(executor)
        .await?;

        Ok(membership)
    }

    /// Deletes a membership
    ///
    /// Returns the deleted row, or `None` if it didn't exist.
    pub async fn delete<'e, E>(
        executor: E,
        team_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let membership = sqlx::query_as::<_, Membership>(
            r#"
            DELETE FROM team_members
            WHERE team_id = $1 AND user_id = $2
            RETURNING team_id, user_id, role, joined_at
            "#,
        )
        .bind(team_id)
        .bind(user_id)
        .fetch_optional(executor)
        .await?;

        Ok(membership)
    }
}

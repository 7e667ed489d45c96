//! Database models for Teamboard
//!
//! Each model owns its row type and the SQL that reads and writes it. The
//! query functions are generic over [`sqlx::postgres::PgExecutor`] so the
//! Postgres store can run several of them inside one transaction.
//!
//! # Models
//!
//! - `user`: Profiles mirrored from the identity service
//! - `team`: Teams and the per-user team summary
//! - `membership`: User-team relationships with a role
//! - `task`: Tasks with status and priority
//! - `comment`: Task comments

use thiserror::Error;

pub mod comment;
pub mod membership;
pub mod task;
pub mod team;
pub mod user;

pub use comment::{Comment, CreateComment};
pub use membership::{MemberDetails, Membership, TeamRole};
pub use task::{CreateTask, Task, TaskChanges, TaskFilter, TaskPriority, TaskStatus};
pub use team::{CreateTeam, Team, TeamSummary, UpdateTeam};
pub use user::User;

/// Error returned when a role, status or priority string is not recognised
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind} '{value}', expected one of: {expected}")]
pub struct ParseEnumError {
    /// Which enum was being parsed
    pub kind: &'static str,

    /// The rejected input
    pub value: String,

    /// Comma separated list of accepted values
    pub expected: &'static str,
}

impl ParseEnumError {
    pub(crate) fn new(kind: &'static str, value: &str, expected: &'static str) -> Self {
        Self {
            kind,
            value: value.to_string(),
            expected,
        }
    }
}

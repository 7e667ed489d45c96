//! Persistence port for teams, memberships, tasks and comments
//!
//! The core services only talk to a [`Store`]. Two adapters implement it:
//!
//! - [`postgres::PgStore`]: the production backend on top of `sqlx`
//! - [`memory::MemoryStore`]: a single-mutex in-memory backend for tests and
//!   local development
//!
//! Operations that must not be split into read-then-write steps (guarded
//! membership changes, the blocked transition) are single trait calls and
//! each adapter makes them atomic.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Comment, CreateComment, CreateTask, CreateTeam, MemberDetails, Membership, Task, TaskChanges,
    TaskFilter, TaskStatus, Team, TeamRole, TeamSummary, UpdateTeam, User,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors returned by store implementations
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database failure
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// In-memory state lock was poisoned by a panicking writer
    #[error("store lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Outcome of a removal or role change that must keep a manager in the team
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardedMembershipChange {
    /// The change was applied; holds the membership before removal or after
    /// the role change
    Applied(Membership),

    /// The user is not a member of the team
    NotFound,

    /// Rejected: the target is the team's only manager
    LastManager,
}

/// Outcome of a task write that may set an assignee
///
/// The assignee's membership is checked in the same atomic unit as the
/// write, so a concurrent removal cannot leave a non-member assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskWrite {
    /// The task as stored after the write
    Written(Task),

    /// The task (or, on create, its team) does not exist
    NotFound,

    /// The requested assignee holds no membership in the task's team
    AssigneeNotMember,
}

/// Outcome of a user leaving a team
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// The membership was removed; holds the removed membership
    Left(Membership),

    /// The user was the only manager, so the whole team was deleted
    TeamDeleted,

    /// The user is not a member of the team
    NotMember,
}

/// A completed status change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusTransition {
    /// Task after the change
    pub task: Task,

    /// Status before the change
    pub previous_status: TaskStatus,

    /// Comment written together with the change, if one was supplied
    pub comment: Option<Comment>,
}

/// Persistence contract for the board
#[async_trait]
pub trait Store: Send + Sync {
    /// Checks that the backend is reachable.
    async fn ping(&self) -> StoreResult<()>;

    // Users

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;

    /// Finds a user by email, ignoring case.
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Mirrors a profile resolved from the identity service.
    async fn upsert_user(&self, user: &User) -> StoreResult<User>;

    // Teams

    /// Creates a team and makes `creator` its first manager, atomically.
    async fn create_team(&self, data: &CreateTeam, creator: Uuid)
        -> StoreResult<(Team, Membership)>;

    async fn find_team(&self, id: Uuid) -> StoreResult<Option<Team>>;

    /// Lists the teams a user belongs to with their role, oldest first.
    async fn list_teams_for_user(&self, user_id: Uuid) -> StoreResult<Vec<TeamSummary>>;

    /// Returns `None` when the team does not exist.
    async fn update_team(&self, id: Uuid, data: &UpdateTeam) -> StoreResult<Option<Team>>;

    /// Deletes a team with its memberships, tasks and comments.
    ///
    /// Returns `false` when the team did not exist.
    async fn delete_team(&self, id: Uuid) -> StoreResult<bool>;

    // Memberships

    async fn find_membership(&self, team_id: Uuid, user_id: Uuid)
        -> StoreResult<Option<Membership>>;

    /// Lists members with their profiles in join order.
    async fn list_members(&self, team_id: Uuid) -> StoreResult<Vec<MemberDetails>>;

    async fn list_team_ids_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Uuid>>;

    /// Adds a membership.
    ///
    /// Returns `None` when the user already belongs to the team.
    async fn insert_membership(
        &self,
        team_id: Uuid,
        user_id: Uuid,
        role: TeamRole,
    ) -> StoreResult<Option<Membership>>;

    /// Removes a membership unless the target is the team's only manager.
    async fn remove_membership(
        &self,
        team_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<GuardedMembershipChange>;

    /// Changes a role unless it demotes the team's only manager.
    async fn set_role(
        &self,
        team_id: Uuid,
        user_id: Uuid,
        role: TeamRole,
    ) -> StoreResult<GuardedMembershipChange>;

    /// Removes the user's membership, deleting the team instead when the
    /// user is its only manager.
    async fn leave_team(&self, team_id: Uuid, user_id: Uuid) -> StoreResult<LeaveOutcome>;

    // Tasks

    /// Inserts a task in `todo`, checking the assignee's membership first.
    async fn create_task(&self, data: &CreateTask) -> StoreResult<TaskWrite>;

    async fn find_task(&self, id: Uuid) -> StoreResult<Option<Task>>;

    /// Lists a team's tasks ordered by creation time, then id.
    async fn list_tasks(&self, team_id: Uuid, filter: &TaskFilter) -> StoreResult<Vec<Task>>;

    /// Applies a partial update. A new assignee must be a member of the
    /// task's team when the write happens.
    async fn update_task(&self, id: Uuid, changes: &TaskChanges) -> StoreResult<TaskWrite>;

    /// Sets a task's status and, when given, inserts the comment in the same
    /// atomic unit. Neither is applied if either fails.
    ///
    /// Returns `None` when the task does not exist.
    async fn transition_task(
        &self,
        id: Uuid,
        status: TaskStatus,
        comment: Option<&CreateComment>,
    ) -> StoreResult<Option<StatusTransition>>;

    /// Deletes a task and its comments.
    async fn delete_task(&self, id: Uuid) -> StoreResult<bool>;

    // Comments

    async fn create_comment(&self, data: &CreateComment) -> StoreResult<Comment>;

    async fn find_comment(&self, id: Uuid) -> StoreResult<Option<Comment>>;

    /// Lists a task's comments in creation order.
    async fn list_comments(&self, task_id: Uuid) -> StoreResult<Vec<Comment>>;

    async fn update_comment(&self, id: Uuid, content: &str) -> StoreResult<Option<Comment>>;

    async fn delete_comment(&self, id: Uuid) -> StoreResult<bool>;
}

/// Shared handle to a store
pub type DynStore = Arc<dyn Store>;

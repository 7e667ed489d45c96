//! Core services
//!
//! - [`membership::MembershipRegistry`]: teams, rosters, roles and the
//!   last-manager rule
//! - [`tasks::TaskLifecycle`]: task CRUD and status transitions, including the
//!   blocked-requires-comment gate
//! - [`comments::CommentLedger`]: per-task discussion
//!
//! Each service authorizes the caller against the store on every call, applies
//! the mutation, and then publishes the matching [`TeamEvent`] to the team's
//! realtime group. A lost event never rolls back the mutation.

use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::models::Task;
use crate::realtime::events::TeamEvent;
use crate::realtime::hub::FanoutHub;
use crate::store::{DynStore, Store};

pub mod comments;
pub mod membership;
pub mod tasks;

pub use comments::CommentLedger;
pub use membership::{LeaveResult, MemberIdentifier, MembershipRegistry, TeamView};
pub use tasks::{NewTask, StatusChange, TaskLifecycle};

/// The three services wired to one store and one hub
#[derive(Clone)]
pub struct CoreServices {
    pub hub: FanoutHub,
    pub registry: MembershipRegistry,
    pub tasks: TaskLifecycle,
    pub comments: CommentLedger,
}

impl CoreServices {
    pub fn new(store: DynStore, hub: FanoutHub) -> Self {
        let registry = MembershipRegistry::new(store.clone(), hub.clone());
        let tasks = TaskLifecycle::new(store.clone(), hub.clone(), registry.clone());
        let comments = CommentLedger::new(store, hub.clone(), registry.clone());

        Self {
            hub,
            registry,
            tasks,
            comments,
        }
    }
}

/// Trims `value` and rejects it if nothing is left
pub(crate) fn non_blank(value: &str, field: &str) -> CoreResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CoreError::validation(format!("{} must not be empty", field)));
    }
    Ok(trimmed.to_string())
}

/// Trims an optional text field, mapping blank input to `None`
pub(crate) fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub(crate) async fn load_task(store: &dyn Store, task_id: Uuid) -> CoreResult<Task> {
    store
        .find_task(task_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Task"))
}

pub(crate) async fn ensure_team_exists(store: &dyn Store, team_id: Uuid) -> CoreResult<()> {
    match store.find_team(team_id).await? {
        Some(_) => Ok(()),
        None => Err(CoreError::not_found("Team")),
    }
}

pub(crate) fn publish(hub: &FanoutHub, event: TeamEvent) {
    hub.publish(&event);
}

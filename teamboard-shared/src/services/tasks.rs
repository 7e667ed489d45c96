//! Task Lifecycle Controller
//!
//! Owns task creation, edits, deletion and status transitions. The gates:
//!
//! - **Authorization**: managers create, edit and delete tasks; a status change
//!   is allowed for the task's assignee or any manager of its team
//! - **Assignee**: an assignee must hold a membership in the task's team
//! - **Blocked**: moving a task to `blocked` needs a non-empty comment in the
//!   same request; the comment and the status change are stored atomically
//!
//! Statuses have no ordering beyond that: any status may follow any other.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::{ensure_team_exists, load_task, non_blank, optional_text, publish};
use crate::auth::authorization::require_owner_or_manager;
use crate::auth::identity::Identity;
use crate::error::{CoreError, CoreResult};
use crate::models::{
    CreateComment, CreateTask, Task, TaskChanges, TaskFilter, TaskPriority, TaskStatus, TeamRole,
};
use crate::realtime::events::{
    CommentAdded, TaskAssigned, TaskDeleted, TaskSnapshot, TaskStatusChanged, TeamEvent,
};
use crate::realtime::hub::FanoutHub;
use crate::services::membership::MembershipRegistry;
use crate::store::{DynStore, TaskWrite};

/// Input for creating a task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,

    /// Defaults to medium
    pub priority: Option<TaskPriority>,
    pub due_date: Option<NaiveDate>,
    pub assignee_id: Option<Uuid>,
}

/// A requested status change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: TaskStatus,

    /// Explanation; required when `status` is `blocked`
    pub comment: Option<String>,
}

/// Unpacks a task write, turning a refused assignee into a validation error
fn written(
    write: TaskWrite,
    missing: &'static str,
    team_id: Uuid,
    assignee_id: Option<Uuid>,
) -> CoreResult<Task> {
    match write {
        TaskWrite::Written(task) => Ok(task),
        TaskWrite::NotFound => Err(CoreError::not_found(missing)),
        TaskWrite::AssigneeNotMember => {
            warn!(
                team_id = %team_id,
                assignee_id = ?assignee_id,
                "Assignee is not a team member"
            );
            Err(CoreError::validation(
                "Assignee must be a member of the task's team",
            ))
        }
    }
}

/// Task operations guarded by team membership
#[derive(Clone)]
pub struct TaskLifecycle {
    store: DynStore,
    hub: FanoutHub,
    registry: MembershipRegistry,
}

impl TaskLifecycle {
    pub fn new(store: DynStore, hub: FanoutHub, registry: MembershipRegistry) -> Self {
        Self {
            store,
            hub,
            registry,
        }
    }


    /// Creates a task in `todo` (managers only)
    pub async fn create(
        &self,
        actor: &Identity,
        team_id: Uuid,
        input: NewTask,
    ) -> CoreResult<Task> {
        ensure_team_exists(self.store.as_ref(), team_id).await?;
        self.registry
            .authorize(team_id, actor.user_id, Some(TeamRole::Manager))
            .await?;

        let title = non_blank(&input.title, "Title")?;

        let write = self
            .store
            .create_task(&CreateTask {
                team_id,
                title,
                description: optional_text(input.description.as_deref()),
                priority: input.priority.unwrap_or_default(),
                due_date: input.due_date,
                assignee_id: input.assignee_id,
                created_by: actor.user_id,
            })
            .await?;
        let task = written(write, "Team", team_id, input.assignee_id)?;

        info!(task_id = %task.id, team_id = %team_id, user_id = %actor.user_id, "Task created");
        publish(
            &self.hub,
            TeamEvent::TaskCreated(TaskSnapshot::new(
                &task,
                actor.user_id,
                actor.display_name(),
            )),
        );
        Ok(task)
    }

    /// Fetches a task (any member of its team)
    pub async fn get(&self, actor: &Identity, task_id: Uuid) -> CoreResult<Task> {
        let task = load_task(self.store.as_ref(), task_id).await?;
        self.registry
            .authorize(task.team_id, actor.user_id, None)
            .await?;
        Ok(task)
    }

    /// Lists a team's tasks in creation order (any member)
    pub async fn list(
        &self,
        actor: &Identity,
        team_id: Uuid,
        filter: TaskFilter,
    ) -> CoreResult<Vec<Task>> {
        ensure_team_exists(self.store.as_ref(), team_id).await?;
        self.registry.authorize(team_id, actor.user_id, None).await?;

        Ok(self.store.list_tasks(team_id, &filter).await?)
    }

    /// Edits title, description, priority, due date or assignee (managers only)
    pub async fn update(
        &self,
        actor: &Identity,
        task_id: Uuid,
        changes: TaskChanges,
    ) -> CoreResult<Task> {
        let before = load_task(self.store.as_ref(), task_id).await?;
        self.registry
            .authorize(before.team_id, actor.user_id, Some(TeamRole::Manager))
            .await?;

        if changes.is_empty() {
            return Err(CoreError::validation("No fields to update"));
        }
        let changes = TaskChanges {
            title: changes
                .title
                .as_deref()
                .map(|title| non_blank(title, "Title"))
                .transpose()?,
            description: changes
                .description
                .map(|description| optional_text(description.as_deref())),
            ..changes
        };

        let write = self.store.update_task(task_id, &changes).await?;
        let task = written(write, "Task", before.team_id, changes.assignee_id.flatten())?;

        info!(task_id = %task.id, team_id = %task.team_id, user_id = %actor.user_id, "Task updated");
        publish(
            &self.hub,
            TeamEvent::TaskUpdated(TaskSnapshot::new(
                &task,
                actor.user_id,
                actor.display_name(),
            )),
        );
        if task.assignee_id != before.assignee_id {
            publish(
                &self.hub,
                TeamEvent::TaskAssigned(TaskAssigned {
                    task_id: task.id,
                    title: task.title.clone(),
                    assignee_id: task.assignee_id,
                    previous_assignee_id: before.assignee_id,
                    team_id: task.team_id,
                    user_id: actor.user_id,
                }),
            );
        }
        Ok(task)
    }

    /// Moves a task to a new status (assignee or manager)
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] if the task doesn't exist
    /// - [`CoreError::Forbidden`] if the caller is not a member of the team,
    ///   or is neither the assignee nor a manager
    /// - [`CoreError::Validation`] if moving to `blocked` without a comment
    pub async fn change_status(
        &self,
        actor: &Identity,
        task_id: Uuid,
        change: StatusChange,
    ) -> CoreResult<Task> {
        let task = load_task(self.store.as_ref(), task_id).await?;
        let role = self
            .registry
            .authorize(task.team_id, actor.user_id, None)
            .await?;
        require_owner_or_manager(
            actor.user_id,
            role,
            task.assignee_id,
            true,
            "Only the assignee or a manager can change this task's status",
        )?;

        let comment = optional_text(change.comment.as_deref());
        if change.status.requires_comment() && comment.is_none() {
            warn!(task_id = %task_id, user_id = %actor.user_id, "Blocked transition without comment");
            return Err(CoreError::validation(
                "A comment explaining the blocker is required when marking a task as blocked",
            ));
        }

        let comment = comment.map(|content| CreateComment {
            task_id,
            author_id: actor.user_id,
            content,
        });
        let transition = self
            .store
            .transition_task(task_id, change.status, comment.as_ref())
            .await?
            .ok_or_else(|| CoreError::not_found("Task"))?;

        let task = transition.task;
        info!(
            task_id = %task.id,
            team_id = %task.team_id,
            user_id = %actor.user_id,
            from = %transition.previous_status,
            to = %task.status,
            "Task status changed"
        );

        publish(
            &self.hub,
            TeamEvent::TaskStatusChanged(TaskStatusChanged {
                task_id: task.id,
                title: task.title.clone(),
                new_status: task.status,
                previous_status: transition.previous_status,
                user_id: actor.user_id,
                user_name: actor.display_name().to_string(),
                assignee_id: task.assignee_id,
                team_id: task.team_id,
                comment_id: transition.comment.as_ref().map(|c| c.id),
            }),
        );
        if let Some(comment) = &transition.comment {
            publish(
                &self.hub,
                TeamEvent::CommentAdded(CommentAdded::new(
                    comment,
                    task.team_id,
                    actor.display_name(),
                )),
            );
        }
        Ok(task)
    }

    /// Deletes a task and its comments (managers only)
    pub async fn delete(&self, actor: &Identity, task_id: Uuid) -> CoreResult<()> {
        let task = load_task(self.store.as_ref(), task_id).await?;
        self.registry
            .authorize(task.team_id, actor.user_id, Some(TeamRole::Manager))
            .await?;

        if !self.store.delete_task(task_id).await? {
            return Err(CoreError::not_found("Task"));
        }

        info!(task_id = %task_id, team_id = %task.team_id, user_id = %actor.user_id, "Task deleted");
        publish(
            &self.hub,
            TeamEvent::TaskDeleted(TaskDeleted {
                task_id,
                team_id: task.team_id,
                user_id: actor.user_id,
            }),
        );
        Ok(())
    }
}

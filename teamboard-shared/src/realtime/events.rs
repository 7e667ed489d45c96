//! Realtime event catalogue
//!
//! Events are sent to clients as `{"event": "<kind>", "data": {...}}` with
//! camelCase payload fields. Every event belongs to exactly one team and is
//! only published to that team's group.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Comment, Task, TaskPriority, TaskStatus, Team, TeamRole};

/// A change on a team's board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum TeamEvent {
    #[serde(rename = "comment:added")]
    CommentAdded(CommentAdded),

    #[serde(rename = "comment:updated")]
    CommentUpdated(CommentChanged),

    #[serde(rename = "comment:deleted")]
    CommentDeleted(CommentDeleted),

    #[serde(rename = "task:created")]
    TaskCreated(TaskSnapshot),

    #[serde(rename = "task:updated")]
    TaskUpdated(TaskSnapshot),

    #[serde(rename = "task:assigned")]
    TaskAssigned(TaskAssigned),

    #[serde(rename = "task:status_changed")]
    TaskStatusChanged(TaskStatusChanged),

    #[serde(rename = "task:deleted")]
    TaskDeleted(TaskDeleted),

    #[serde(rename = "member:added")]
    MemberAdded(MemberChanged),

    #[serde(rename = "member:removed")]
    MemberRemoved(MemberChanged),

    #[serde(rename = "member:role_changed")]
    MemberRoleChanged(MemberChanged),

    #[serde(rename = "member:left")]
    MemberLeft(MemberLeft),

    #[serde(rename = "team:updated")]
    TeamUpdated(TeamUpdated),

    #[serde(rename = "team:deleted")]
    TeamDeleted(TeamDeleted),
}

impl TeamEvent {
    /// Team whose group receives the event
    pub fn team_id(&self) -> Uuid {
        match self {
            TeamEvent::CommentAdded(e) => e.team_id,
            TeamEvent::CommentUpdated(e) => e.team_id,
            TeamEvent::CommentDeleted(e) => e.team_id,
            TeamEvent::TaskCreated(e) | TeamEvent::TaskUpdated(e) => e.team_id,
            TeamEvent::TaskAssigned(e) => e.team_id,
            TeamEvent::TaskStatusChanged(e) => e.team_id,
            TeamEvent::TaskDeleted(e) => e.team_id,
            TeamEvent::MemberAdded(e)
            | TeamEvent::MemberRemoved(e)
            | TeamEvent::MemberRoleChanged(e) => e.team_id,
            TeamEvent::MemberLeft(e) => e.team_id,
            TeamEvent::TeamUpdated(e) => e.team_id,
            TeamEvent::TeamDeleted(e) => e.team_id,
        }
    }

    /// Wire name of the event
    pub fn kind(&self) -> &'static str {
        match self {
            TeamEvent::CommentAdded(_) => "comment:added",
            TeamEvent::CommentUpdated(_) => "comment:updated",
            TeamEvent::CommentDeleted(_) => "comment:deleted",
            TeamEvent::TaskCreated(_) => "task:created",
            TeamEvent::TaskUpdated(_) => "task:updated",
            TeamEvent::TaskAssigned(_) => "task:assigned",
            TeamEvent::TaskStatusChanged(_) => "task:status_changed",
            TeamEvent::TaskDeleted(_) => "task:deleted",
            TeamEvent::MemberAdded(_) => "member:added",
            TeamEvent::MemberRemoved(_) => "member:removed",
            TeamEvent::MemberRoleChanged(_) => "member:role_changed",
            TeamEvent::MemberLeft(_) => "member:left",
            TeamEvent::TeamUpdated(_) => "team:updated",
            TeamEvent::TeamDeleted(_) => "team:deleted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentAdded {
    pub task_id: Uuid,
    pub comment_id: Uuid,
    pub content: String,
    pub author_id: Uuid,
    pub author_name: String,
    pub team_id: Uuid,
}

impl CommentAdded {
    pub fn new(comment: &Comment, team_id: Uuid, author_name: &str) -> Self {
        Self {
            task_id: comment.task_id,
            comment_id: comment.id,
            content: comment.content.clone(),
            author_id: comment.author_id,
            author_name: author_name.to_string(),
            team_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentChanged {
    pub task_id: Uuid,
    pub comment_id: Uuid,
    pub content: String,
    pub author_id: Uuid,
    pub team_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentDeleted {
    pub task_id: Uuid,
    pub comment_id: Uuid,
    pub team_id: Uuid,
    pub user_id: Uuid,
}

/// Task fields shared by the created/updated events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSnapshot {
    pub task_id: Uuid,
    pub team_id: Uuid,
    pub title: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub assignee_id: Option<Uuid>,

    /// Actor
    pub user_id: Uuid,
    pub user_name: String,
}

impl TaskSnapshot {
    pub fn new(task: &Task, user_id: Uuid, user_name: &str) -> Self {
        Self {
            task_id: task.id,
            team_id: task.team_id,
            title: task.title.clone(),
            status: task.status,
            priority: task.priority,
            assignee_id: task.assignee_id,
            user_id,
            user_name: user_name.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskAssigned {
    pub task_id: Uuid,
    pub title: String,
    pub assignee_id: Option<Uuid>,
    pub previous_assignee_id: Option<Uuid>,
    pub team_id: Uuid,
    pub user_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatusChanged {
    pub task_id: Uuid,
    pub title: String,
    pub new_status: TaskStatus,
    pub previous_status: TaskStatus,
    pub user_id: Uuid,
    pub user_name: String,
    pub assignee_id: Option<Uuid>,
    pub team_id: Uuid,

    /// Comment written with the change, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDeleted {
    pub task_id: Uuid,
    pub team_id: Uuid,
    pub user_id: Uuid,
}

/// Roster change made by a manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberChanged {
    pub team_id: Uuid,

    /// Member whose membership changed
    pub user_id: Uuid,
    pub role: TeamRole,

    /// Manager who made the change
    pub changed_by: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberLeft {
    pub team_id: Uuid,
    pub user_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamUpdated {
    pub team_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub user_id: Uuid,
}

impl TeamUpdated {
    pub fn new(team: &Team, user_id: Uuid) -> Self {
        Self {
            team_id: team.id,
            name: team.name.clone(),
            description: team.description.clone(),
            user_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamDeleted {
    pub team_id: Uuid,
    pub user_id: Uuid,
}

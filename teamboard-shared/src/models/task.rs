//! Task model and database operations
//!
//! # Status
//!
//! ```text
//! todo → in_progress → done
//!   ↘        ↓         ↙
//!         blocked          (reachable from, and left to, any status)
//! ```
//!
//! There is no ordering constraint between statuses. The one gate is that
//! entering `blocked` must be accompanied by an explanatory comment, which
//! the store writes in the same transaction as the status change.
//!
//! # Schema
//!
//! ```sql
//! CREATE TYPE task_status AS ENUM ('todo', 'in_progress', 'done', 'blocked');
//! CREATE TYPE task_priority AS ENUM ('low', 'medium', 'high');
//!
//! CREATE TABLE tasks (
//!     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     team_id UUID NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
//!     title VARCHAR(255) NOT NULL,
//!     description TEXT,
//!     status task_status NOT NULL DEFAULT 'todo',
//!     priority task_priority NOT NULL DEFAULT 'medium',
//!     due_date DATE,
//!     assignee_id UUID REFERENCES users(id) ON DELETE SET NULL,
//!     created_by UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgExecutor;
use uuid::Uuid;

use super::ParseEnumError;

const TASK_COLUMNS: &str = "id, team_id, title, description, status, priority, due_date, \
                            assignee_id, created_by, created_at, updated_at";

/// Task status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not started yet
    Todo,

    /// Someone is working on it
    InProgress,

    /// Finished
    Done,

    /// Stuck; always explained by a comment
    Blocked,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
            TaskStatus::Blocked => "blocked",
        }
    }

    /// Whether moving into this status needs an explanatory comment
    pub fn requires_comment(&self) -> bool {
        matches!(self, TaskStatus::Blocked)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "todo" => Ok(TaskStatus::Todo),
            "in_progress" => Ok(TaskStatus::InProgress),
            "done" => Ok(TaskStatus::Done),
            "blocked" => Ok(TaskStatus::Blocked),
            _ => Err(ParseEnumError::new(
                "status",
                s,
                "todo, in_progress, done, blocked",
            )),
        }
    }
}

/// Task priority
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "task_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskPriority {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(TaskPriority::Low),
            "medium" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            _ => Err(ParseEnumError::new("priority", s, "low, medium, high")),
        }
    }
}

/// Task record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    /// Unique task ID
    pub id: Uuid,

    /// Owning team
    pub team_id: Uuid,

    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,

    /// Calendar due date
    pub due_date: Option<NaiveDate>,

    /// Assigned team member, if any
    pub assignee_id: Option<Uuid>,

    /// Manager who created the task
    pub created_by: Uuid,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a task
///
/// New tasks always start in `todo`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTask {
    pub team_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub priority: TaskPriority,
    pub due_date: Option<NaiveDate>,
    pub assignee_id: Option<Uuid>,
    pub created_by: Uuid,
}

/// Partial task update
///
/// Status is deliberately absent: it only changes through a transition.
/// For the nullable fields `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<Option<NaiveDate>>,
    pub assignee_id: Option<Option<Uuid>>,
}

impl TaskChanges {
    /// True when the update would not change anything
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.priority.is_none()
            && self.due_date.is_none()
            && self.assignee_id.is_none()
    }
}

/// Optional filters for listing a team's tasks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub assignee_id: Option<Uuid>,
    pub priority: Option<TaskPriority>,
}

impl TaskFilter {
    /// Checks whether a task passes every filter that is set
    pub fn matches(&self, task: &Task) -> bool {
        self.status.map_or(true, |s| task.status == s)
            && self
                .assignee_id
                .map_or(true, |a| task.assignee_id == Some(a))
            && self.priority.map_or(true, |p| task.priority == p)
    }
}

impl Task {
    /// Inserts a new task in `todo`
    pub async fn insert<'e, E>(executor: E, id: Uuid, data: &CreateTask) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            r#"
            INSERT INTO tasks (id, team_id, title, description, status, priority, due_date, assignee_id, created_by)
            VALUES ($1, $2, $3, $4, 'todo', $5, $6, $7, $8)
            RETURNING {}
            "#,
            TASK_COLUMNS
        );

        let task = sqlx::query_as::<_, Task>(&query)
            .bind(id)
            .bind(data.team_id)
            .bind(&data.title)
            .bind(&data.description)
            .bind(data.priority)
            .bind(data.due_date)
            .bind(data.assignee_id)
            .bind(data.created_by)
            .fetch_one(executor)
            .await?;

        Ok(task)
    }

    /// Finds a task by ID
    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!("SELECT {} FROM tasks WHERE id = $1", TASK_COLUMNS);

        let task = sqlx::query_as::<_, Task>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(task)
    }

    /// Finds a task by ID and locks its row for the rest of the transaction
    pub async fn find_for_update<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!("SELECT {} FROM tasks WHERE id = $1 FOR UPDATE", TASK_COLUMNS);

        let task = sqlx::query_as::<_, Task>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(task)
    }

    /// Lists a team's tasks, oldest first, applying the filters that are set
    pub async fn list_for_team<'e, E>(
        executor: E,
        team_id: Uuid,
        filter: &TaskFilter,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            r#"
            SELECT {}
            FROM tasks
            WHERE team_id = $1
              AND ($2::task_status IS NULL OR status = $2)
              AND ($3::uuid IS NULL OR assignee_id = $3)
              AND ($4::task_priority IS NULL OR priority = $4)
            ORDER BY created_at, id
            "#,
            TASK_COLUMNS
        );

        let tasks = sqlx::query_as::<_, Task>(&query)
            .bind(team_id)
            .bind(filter.status)
            .bind(filter.assignee_id)
            .bind(filter.priority)
            .fetch_all(executor)
            .await?;

        Ok(tasks)
    }

    /// Applies a partial update
    ///
    /// Returns `None` if the task does not exist.
    pub async fn update<'e, E>(
        executor: E,
        id: Uuid,
        changes: &TaskChanges,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let mut query = String::from("UPDATE tasks SET updated_at = NOW()");
        let mut param_count = 1;

        if changes.title.is_some() {
            param_count += 1;
            query.push_str(&format!(", title = ${}", param_count));
        }
        if changes.description.is_some() {
            param_count += 1;
            query.push_str(&format!(", description = ${}", param_count));
        }
        if changes.priority.is_some() {
            param_count += 1;
            query.push_str(&format!(", priority = ${}", param_count));
        }
        if changes.due_date.is_some() {
            param_count += 1;
            query.push_str(&format!(", due_date = ${}", param_count));
        }
        if changes.assignee_id.is_some() {
            param_count += 1;
            query.push_str(&format!(", assignee_id = ${}", param_count));
        }

        query.push_str(&format!(" WHERE id = $1 RETURNING {}", TASK_COLUMNS));

        let mut q = sqlx::query_as::<_, Task>(&query).bind(id);
        if let Some(title) = &changes.title {
            q = q.bind(title);
        }
        if let Some(description) = &changes.description {
            q = q.bind(description);
        }
        if let Some(priority) = changes.priority {
            q = q.bind(priority);
        }
        if let Some(due_date) = changes.due_date {
            q = q.bind(due_date);
        }
        if let Some(assignee_id) = changes.assignee_id {
            q = q.bind(assignee_id);
        }

        let task = q.fetch_optional(executor).await?;
        Ok(task)
    }

    /// Sets the task status
    ///
    /// Returns `None` if the task does not exist.
    pub async fn set_status<'e, E>(
        executor: E,
        id: Uuid,
        status: TaskStatus,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "UPDATE tasks SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            TASK_COLUMNS
        );

        let task = sqlx::query_as::<_, Task>(&query)
            .bind(id)
            .bind(status)
            .fetch_optional(executor)
            .await?;

        Ok(task)
    }

    /// Deletes a task and, by cascade, its comments
    ///
    /// Returns `true` if a row was deleted.
    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

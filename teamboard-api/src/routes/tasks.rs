/// Task endpoints
///
/// # Endpoints
///
/// - `GET /v1/teams/:team_id/tasks` - List tasks, filterable by `status`,
///   `assignee_id` and `priority` (members)
/// - `POST /v1/teams/:team_id/tasks` - Create task (managers)
/// - `GET /v1/tasks/:task_id` - Get task (members)
/// - `PATCH /v1/tasks/:task_id` - Edit task fields other than status (managers)
/// - `PATCH /v1/tasks/:task_id/status` - Change status (assignee or managers)
/// - `DELETE /v1/tasks/:task_id` - Delete task (managers)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::ValidatedJson,
    routes::{check_max_chars, double_option, DeletedResponse},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use teamboard_shared::{
    auth::identity::Identity,
    models::{Task, TaskChanges, TaskFilter, TaskPriority, TaskStatus},
    services::{NewTask, StatusChange},
    CoreError,
};
use uuid::Uuid;
use validator::Validate;

/// Create task request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: String,

    #[validate(length(max = 5000, message = "Description must be at most 5000 characters"))]
    pub description: Option<String>,

    /// `low`, `medium` (default) or `high`
    pub priority: Option<String>,

    /// `YYYY-MM-DD`
    pub due_date: Option<NaiveDate>,

    pub assignee_id: Option<Uuid>,
}

/// Edit task request
///
/// `null` clears `description`, `due_date` and `assignee_id`. Status is not
/// accepted here; it only changes through the status endpoint.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTaskRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,

    pub priority: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    pub due_date: Option<Option<NaiveDate>>,

    #[serde(default, deserialize_with = "double_option")]
    pub assignee_id: Option<Option<Uuid>>,

    #[serde(default)]
    pub status: Option<serde_json::Value>,
}

/// Status change request
#[derive(Debug, Deserialize, Validate)]
pub struct ChangeStatusRequest {
    /// `todo`, `in_progress`, `done` or `blocked`
    pub status: String,

    /// Required when `status` is `blocked`
    #[validate(length(max = 1000, message = "Comment must be at most 1000 characters"))]
    pub comment: Option<String>,
}

/// Task list filters
#[derive(Debug, Default, Deserialize)]
pub struct TaskListQuery {
    pub status: Option<String>,
    pub assignee_id: Option<String>,
    pub priority: Option<String>,
}

impl TaskListQuery {
    fn into_filter(self) -> ApiResult<TaskFilter> {
        let assignee_id = self
            .assignee_id
            .map(|raw| {
                raw.parse::<Uuid>()
                    .map_err(|_| ApiError::validation("Invalid assignee ID"))
            })
            .transpose()?;

        Ok(TaskFilter {
            status: parse_status(self.status.as_deref())?,
            assignee_id,
            priority: parse_priority(self.priority.as_deref())?,
        })
    }
}

fn parse_status(raw: Option<&str>) -> Result<Option<TaskStatus>, CoreError> {
    Ok(raw.map(str::parse::<TaskStatus>).transpose()?)
}

fn parse_priority(raw: Option<&str>) -> Result<Option<TaskPriority>, CoreError> {
    Ok(raw.map(str::parse::<TaskPriority>).transpose()?)
}

/// List tasks response
#[derive(Debug, Serialize, Deserialize)]
pub struct ListTasksResponse {
    pub tasks: Vec<Task>,
}

/// List a team's tasks in creation order
///
/// ```text
/// GET /v1/teams/:team_id/tasks?status=blocked&priority=high
/// ```
pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(team_id): Path<Uuid>,
    Query(query): Query<TaskListQuery>,
) -> ApiResult<Json<ListTasksResponse>> {
    let filter = query.into_filter()?;
    let tasks = state
        .services
        .tasks
        .list(&identity, team_id, filter)
        .await?;

    Ok(Json(ListTasksResponse { tasks }))
}

/// Create task
///
/// # Errors
///
/// - `403 Forbidden`: Caller is not a manager of the team
/// - `422 Unprocessable Entity`: Invalid field, or the assignee is not a member
pub async fn create_task(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(team_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    let input = NewTask {
        title: req.title,
        description: req.description,
        priority: parse_priority(req.priority.as_deref())?,
        due_date: req.due_date,
        assignee_id: req.assignee_id,
    };

    let task = state
        .services
        .tasks
        .create(&identity, team_id, input)
        .await?;

    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn get_task(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Json<Task>> {
    let task = state.services.tasks.get(&identity, task_id).await?;
    Ok(Json(task))
}

pub async fn update_task(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(task_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateTaskRequest>,
) -> ApiResult<Json<Task>> {
    if req.status.is_some() {
        return Err(ApiError::validation(
            "Status cannot be edited here; use PATCH /v1/tasks/:task_id/status",
        ));
    }
    check_max_chars(
        "description",
        &req.description,
        5000,
        "Description must be at most 5000 characters",
    )?;

    let changes = TaskChanges {
        title: req.title,
        description: req.description,
        priority: parse_priority(req.priority.as_deref())?,
        due_date: req.due_date,
        assignee_id: req.assignee_id,
    };

    let task = state
        .services
        .tasks
        .update(&identity, task_id, changes)
        .await?;

    Ok(Json(task))
}

/// Change a task's status
///
/// # Endpoint
///
/// ```text
/// PATCH /v1/tasks/:task_id/status
///
/// { "status": "blocked", "comment": "Waiting on the vendor API key" }
/// ```
///
/// The comment is stored together with the status change, in one
/// transaction. It is mandatory for `blocked` and optional otherwise.
///
/// # Errors
///
/// - `403 Forbidden`: Caller is neither the assignee nor a manager
///   (`gate: ownership`), or not a member (`gate: membership`)
/// - `422 Unprocessable Entity`: Unknown status, or `blocked` without a comment
pub async fn change_status(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(task_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<ChangeStatusRequest>,
) -> ApiResult<Json<Task>> {
    let status = req.status.parse::<TaskStatus>().map_err(CoreError::from)?;

    let task = state
        .services
        .tasks
        .change_status(
            &identity,
            task_id,
            StatusChange {
                status,
                comment: req.comment,
            },
        )
        .await?;

    Ok(Json(task))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Json<DeletedResponse>> {
    state.services.tasks.delete(&identity, task_id).await?;
    Ok(Json(DeletedResponse { deleted: true }))
}

/// Comment endpoints
///
/// # Endpoints
///
/// - `GET /v1/tasks/:task_id/comments` - List comments, oldest first (members)
/// - `POST /v1/tasks/:task_id/comments` - Add comment (members)
/// - `PATCH /v1/comments/:comment_id` - Edit comment (author)
/// - `DELETE /v1/comments/:comment_id` - Delete comment (author or managers)

use crate::{app::AppState, error::ApiResult, extract::ValidatedJson, routes::DeletedResponse};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use teamboard_shared::{auth::identity::Identity, models::Comment};
use uuid::Uuid;
use validator::Validate;

/// Add or edit comment request
#[derive(Debug, Deserialize, Validate)]
pub struct CommentRequest {
    #[validate(length(min = 1, max = 2000, message = "Comment must be 1-2000 characters"))]
    pub content: String,
}

/// List comments response
#[derive(Debug, Serialize, Deserialize)]
pub struct ListCommentsResponse {
    pub comments: Vec<Comment>,
}

pub async fn list_comments(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Json<ListCommentsResponse>> {
    let comments = state.services.comments.list(&identity, task_id).await?;
    Ok(Json(ListCommentsResponse { comments }))
}

pub async fn add_comment(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(task_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<CommentRequest>,
) -> ApiResult<(StatusCode, Json<Comment>)> {
    let comment = state
        .services
        .comments
        .add(&identity, task_id, &req.content)
        .await?;

    Ok((StatusCode::CREATED, Json(comment)))
}

/// Edit comment
///
/// Only the author may edit, and only while still a member of the team.
pub async fn edit_comment(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(comment_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<CommentRequest>,
) -> ApiResult<Json<Comment>> {
    let comment = state
        .services
        .comments
        .edit(&identity, comment_id, &req.content)
        .await?;

    Ok(Json(comment))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(comment_id): Path<Uuid>,
) -> ApiResult<Json<DeletedResponse>> {
    state.services.comments.delete(&identity, comment_id).await?;
    Ok(Json(DeletedResponse { deleted: true }))
}

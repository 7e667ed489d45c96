/// Team roster endpoints
///
/// # Endpoints
///
/// - `GET /v1/teams/:team_id/members` - List members (members)
/// - `POST /v1/teams/:team_id/members` - Add member by email or user ID (managers)
/// - `DELETE /v1/teams/:team_id/members/:user_id` - Remove member (managers)
/// - `PATCH /v1/teams/:team_id/members/:user_id/role` - Change role (managers)
/// - `POST /v1/teams/:team_id/leave` - Leave the team (self)
///
/// Removing or demoting the team's only manager fails with
/// `409 invariant_violation`. The only manager may still leave; the team is
/// then deleted.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::ValidatedJson,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use teamboard_shared::{
    auth::identity::Identity,
    models::{MemberDetails, Membership, TeamRole},
    services::{LeaveResult, MemberIdentifier},
    CoreError,
};
use uuid::Uuid;
use validator::Validate;

/// Add member request; exactly one of `email` and `user_id`
#[derive(Debug, Deserialize, Validate)]
pub struct AddMemberRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    pub user_id: Option<Uuid>,
}

impl AddMemberRequest {
    fn identifier(self) -> ApiResult<MemberIdentifier> {
        match (self.email, self.user_id) {
            (Some(email), None) => Ok(MemberIdentifier::Email(email)),
            (None, Some(user_id)) => Ok(MemberIdentifier::UserId(user_id)),
            _ => Err(ApiError::validation(
                "Provide exactly one of email or user_id",
            )),
        }
    }
}

/// Change role request
#[derive(Debug, Deserialize, Validate)]
pub struct ChangeRoleRequest {
    /// `manager` or `member`
    #[validate(length(min = 1, message = "Role is required"))]
    pub role: String,
}

/// List members response
#[derive(Debug, Serialize, Deserialize)]
pub struct ListMembersResponse {
    pub members: Vec<MemberDetails>,
}

/// Leave response
#[derive(Debug, Serialize, Deserialize)]
pub struct LeaveResponse {
    pub result: LeaveResult,
}

pub async fn list_members(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(team_id): Path<Uuid>,
) -> ApiResult<Json<ListMembersResponse>> {
    let members = state
        .services
        .registry
        .list_members(&identity, team_id)
        .await?;

    Ok(Json(ListMembersResponse { members }))
}

/// Add member
///
/// # Endpoint
///
/// ```text
/// POST /v1/teams/:team_id/members
///
/// { "email": "ari@example.com" }
/// ```
///
/// # Errors
///
/// - `404 Not Found`: No user with that email or ID
/// - `409 Conflict`: User is already a member
pub async fn add_member(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(team_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<AddMemberRequest>,
) -> ApiResult<(StatusCode, Json<Membership>)> {
    let membership = state
        .services
        .registry
        .add_member(&identity, team_id, req.identifier()?)
        .await?;

    Ok((StatusCode::CREATED, Json(membership)))
}

pub async fn remove_member(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path((team_id, user_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Membership>> {
    let removed = state
        .services
        .registry
        .remove_member(&identity, team_id, user_id)
        .await?;

    Ok(Json(removed))
}

/// Change role
///
/// # Errors
///
/// - `409 Conflict` (`invariant_violation`): Would demote the only manager
/// - `422 Unprocessable Entity`: Unknown role
pub async fn change_role(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path((team_id, user_id)): Path<(Uuid, Uuid)>,
    ValidatedJson(req): ValidatedJson<ChangeRoleRequest>,
) -> ApiResult<Json<Membership>> {
    let role = req.role.parse::<TeamRole>().map_err(CoreError::from)?;

    let updated = state
        .services
        .registry
        .change_role(&identity, team_id, user_id, role)
        .await?;

    Ok(Json(updated))
}

pub async fn leave_team(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(team_id): Path<Uuid>,
) -> ApiResult<Json<LeaveResponse>> {
    let result = state.services.registry.leave(&identity, team_id).await?;
    Ok(Json(LeaveResponse { result }))
}

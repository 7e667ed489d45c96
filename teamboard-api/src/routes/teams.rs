/// Team endpoints
///
/// All endpoints require JWT authentication.
///
/// # Endpoints
///
/// - `POST /v1/teams` - Create team (caller becomes manager)
/// - `GET /v1/teams` - List the caller's teams
/// - `GET /v1/teams/:team_id` - Get team (members)
/// - `PATCH /v1/teams/:team_id` - Update team (managers)
/// - `DELETE /v1/teams/:team_id` - Delete team with everything in it (managers)

use crate::{
    app::AppState,
    error::ApiResult,
    extract::ValidatedJson,
    routes::{check_max_chars, double_option, DeletedResponse},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use teamboard_shared::{
    auth::identity::Identity,
    models::{CreateTeam, Team, TeamSummary, UpdateTeam},
    services::TeamView,
};
use uuid::Uuid;
use validator::Validate;

/// Create team request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTeamRequest {
    #[validate(length(min = 1, max = 255, message = "Team name must be 1-255 characters"))]
    pub name: String,

    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,
}

/// Update team request
///
/// `description: null` clears the description; omitted fields are unchanged.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTeamRequest {
    #[validate(length(min = 1, max = 255, message = "Team name must be 1-255 characters"))]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
}

/// List teams response
#[derive(Debug, Serialize, Deserialize)]
pub struct ListTeamsResponse {
    pub teams: Vec<TeamSummary>,
}

/// Create team
///
/// # Endpoint
///
/// ```text
/// POST /v1/teams
/// Authorization: Bearer <jwt_token>
///
/// { "name": "Platform", "description": "Infra and tooling" }
/// ```
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Name missing, blank or too long
pub async fn create_team(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ValidatedJson(req): ValidatedJson<CreateTeamRequest>,
) -> ApiResult<(StatusCode, Json<TeamView>)> {
    let view = state
        .services
        .registry
        .create_team(
            &identity,
            CreateTeam {
                name: req.name,
                description: req.description,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(view)))
}

/// List the caller's teams with their role and member count
pub async fn list_teams(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<ListTeamsResponse>> {
    let teams = state.services.registry.list_teams(&identity).await?;
    Ok(Json(ListTeamsResponse { teams }))
}

pub async fn get_team(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(team_id): Path<Uuid>,
) -> ApiResult<Json<TeamView>> {
    let view = state.services.registry.get_team(&identity, team_id).await?;
    Ok(Json(view))
}

/// Update team
///
/// # Errors
///
/// - `403 Forbidden`: Caller is not a manager (`gate: role`) or not a member
///   (`gate: membership`)
/// - `422 Unprocessable Entity`: No fields given, or a field is invalid
pub async fn update_team(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(team_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateTeamRequest>,
) -> ApiResult<Json<Team>> {
    check_max_chars(
        "description",
        &req.description,
        1000,
        "Description must be at most 1000 characters",
    )?;

    let team = state
        .services
        .registry
        .update_team(
            &identity,
            team_id,
            UpdateTeam {
                name: req.name,
                description: req.description,
            },
        )
        .await?;

    Ok(Json(team))
}

pub async fn delete_team(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(team_id): Path<Uuid>,
) -> ApiResult<Json<DeletedResponse>> {
    state
        .services
        .registry
        .delete_team(&identity, team_id)
        .await?;

    Ok(Json(DeletedResponse { deleted: true }))
}

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use storage::{
    dto::{
        common::{ApiResponse, ErrorResponse},
        team::{
            CreateTeamRequest, DeleteTeamResponse, JoinTeamRequest, KickMemberRequest,
            LeaveTeamResponse, MemberResponse, TeamResponse, TeamSummary,
        },
    },
    models::{Principal, Scope},
};
use uuid::Uuid;
use validator::Validate;

use crate::error::WebError;
use crate::state::AppState;

use super::services;

#[utoipa::path(
    post,
    path = "/api/teams",
    request_body = CreateTeamRequest,
    responses(
        (status = 201, description = "Team created with the caller as leader", body = ApiResponse<TeamSummary>),
        (status = 400, description = "Invalid name, name taken, caller already in a team, or registration incomplete", body = ErrorResponse),
        (status = 401, description = "Missing or invalid session", body = ErrorResponse),
        (status = 403, description = "Registration closed", body = ErrorResponse)
    ),
    security(("session" = [])),
    tag = "teams"
)]
pub async fn create_team(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<CreateTeamRequest>,
) -> Result<Response, WebError> {
    request.validate()?;

    let team = services::create_team(&state.registry, &principal, Scope::Global, &request).await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(team))).into_response())
}

#[utoipa::path(
    get,
    path = "/api/teams/me",
    responses(
        (status = 200, description = "The caller's team, or null", body = ApiResponse<Option<TeamResponse>>),
        (status = 401, description = "Missing or invalid session", body = ErrorResponse)
    ),
    security(("session" = [])),
    tag = "teams"
)]
pub async fn my_team(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Response, WebError> {
    let team = services::my_team(&state.registry, &principal, Scope::Global).await?;

    Ok(Json(ApiResponse::ok(team)).into_response())
}

#[utoipa::path(
    get,
    path = "/api/teams/{team_id}",
    params(
        ("team_id" = Uuid, Path, description = "Team ID")
    ),
    responses(
        (status = 200, description = "Team with members", body = ApiResponse<TeamResponse>),
        (status = 403, description = "Caller is not a member", body = ErrorResponse),
        (status = 404, description = "Team not found", body = ErrorResponse)
    ),
    security(("session" = [])),
    tag = "teams"
)]
pub async fn get_team(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(team_id): Path<Uuid>,
) -> Result<Response, WebError> {
    let team = services::get_team(&state.registry, &principal, team_id).await?;

    Ok(Json(ApiResponse::ok(team)).into_response())
}

#[utoipa::path(
    post,
    path = "/api/teams/{team_id}/join",
    params(
        ("team_id" = Uuid, Path, description = "Team ID")
    ),
    request_body = JoinTeamRequest,
    responses(
        (status = 200, description = "Joined the team", body = ApiResponse<MemberResponse>),
        (status = 400, description = "Already in a team, team confirmed, or team full", body = ErrorResponse),
        (status = 404, description = "Team not found", body = ErrorResponse),
        (status = 409, description = "Concurrent writes kept winning the race", body = ErrorResponse)
    ),
    security(("session" = [])),
    tag = "teams"
)]
pub async fn join_team(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(team_id): Path<Uuid>,
    request: Option<Json<JoinTeamRequest>>,
) -> Result<Response, WebError> {
    let request = request.map(|Json(body)| body).unwrap_or_default();

    let member =
        services::join_team(&state.registry, &principal, Scope::Global, team_id, &request).await?;

    Ok(Json(ApiResponse::ok(member)).into_response())
}

#[utoipa::path(
    post,
    path = "/api/teams/{team_id}/leave",
    params(
        ("team_id" = Uuid, Path, description = "Team ID")
    ),
    responses(
        (status = 200, description = "Left the team", body = ApiResponse<LeaveTeamResponse>),
        (status = 400, description = "Not a member, or team already confirmed", body = ErrorResponse),
        (status = 403, description = "Leader must delete the team or hand over leadership", body = ErrorResponse)
    ),
    security(("session" = [])),
    tag = "teams"
)]
pub async fn leave_team(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(team_id): Path<Uuid>,
) -> Result<Response, WebError> {
    let outcome = services::leave_team(&state.registry, &principal, Scope::Global, team_id).await?;

    Ok(Json(ApiResponse::ok(outcome)).into_response())
}

#[utoipa::path(
    post,
    path = "/api/teams/{team_id}/kick",
    params(
        ("team_id" = Uuid, Path, description = "Team ID")
    ),
    request_body = KickMemberRequest,
    responses(
        (status = 200, description = "Member removed; remaining roster", body = ApiResponse<TeamResponse>),
        (status = 400, description = "Leader tried to remove themselves, target not in team, or team already confirmed", body = ErrorResponse),
        (status = 403, description = "Caller is not the leader", body = ErrorResponse)
    ),
    security(("session" = [])),
    tag = "teams"
)]
pub async fn kick_member(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(team_id): Path<Uuid>,
    Json(request): Json<KickMemberRequest>,
) -> Result<Response, WebError> {
    let team =
        services::kick_member(&state.registry, &principal, Scope::Global, team_id, &request).await?;

    Ok(Json(ApiResponse::ok(team)).into_response())
}

#[utoipa::path(
    post,
    path = "/api/teams/{team_id}/confirm",
    params(
        ("team_id" = Uuid, Path, description = "Team ID")
    ),
    responses(
        (status = 200, description = "Team locked", body = ApiResponse<TeamSummary>),
        (status = 400, description = "Too few members, already confirmed, or team cap reached", body = ErrorResponse),
        (status = 403, description = "Caller is not the leader", body = ErrorResponse)
    ),
    security(("session" = [])),
    tag = "teams"
)]
pub async fn confirm_team(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(team_id): Path<Uuid>,
) -> Result<Response, WebError> {
    let team = services::confirm_team(&state.registry, &principal, Scope::Global, team_id).await?;

    Ok(Json(ApiResponse::ok(team)).into_response())
}

#[utoipa::path(
    delete,
    path = "/api/teams/{team_id}",
    params(
        ("team_id" = Uuid, Path, description = "Team ID")
    ),
    responses(
        (status = 200, description = "Team deleted and members released", body = ApiResponse<DeleteTeamResponse>),
        (status = 403, description = "Caller is not the leader", body = ErrorResponse),
        (status = 404, description = "Team not found", body = ErrorResponse)
    ),
    security(("session" = [])),
    tag = "teams"
)]
pub async fn delete_team(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(team_id): Path<Uuid>,
) -> Result<Response, WebError> {
    let deleted = services::delete_team(&state.registry, &principal, Scope::Global, team_id).await?;

    Ok(Json(ApiResponse::ok(deleted)).into_response())
}

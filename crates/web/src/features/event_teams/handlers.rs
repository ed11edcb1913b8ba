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
use crate::features::teams::services as teams;
use crate::state::AppState;

use super::services;

#[utoipa::path(
    post,
    path = "/api/events/{event_id}/register",
    params(
        ("event_id" = Uuid, Path, description = "Event ID")
    ),
    responses(
        (status = 201, description = "Registered for a Solo event", body = ApiResponse<TeamSummary>),
        (status = 400, description = "Team event, already registered, registration incomplete, or no college on profile", body = ErrorResponse),
        (status = 403, description = "Registration closed", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse)
    ),
    security(("session" = [])),
    tag = "events"
)]
pub async fn register(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(event_id): Path<Uuid>,
) -> Result<Response, WebError> {
    let team = services::register_solo(&state.gate, &state.registry, &principal, event_id).await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(team))).into_response())
}

#[utoipa::path(
    post,
    operation_id = "event_create_team",
    path = "/api/events/{event_id}/teams",
    params(
        ("event_id" = Uuid, Path, description = "Event ID")
    ),
    request_body = CreateTeamRequest,
    responses(
        (status = 201, description = "Event team created", body = ApiResponse<TeamSummary>),
        (status = 400, description = "Invalid name, already in a team for this event, or event team cap reached", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse)
    ),
    security(("session" = [])),
    tag = "events"
)]
pub async fn create_team(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(event_id): Path<Uuid>,
    Json(request): Json<CreateTeamRequest>,
) -> Result<Response, WebError> {
    request.validate()?;

    let team =
        teams::create_team(&state.registry, &principal, Scope::Event(event_id), &request).await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(team))).into_response())
}

#[utoipa::path(
    get,
    operation_id = "event_my_team",
    path = "/api/events/{event_id}/teams/me",
    params(
        ("event_id" = Uuid, Path, description = "Event ID")
    ),
    responses(
        (status = 200, description = "The caller's team for this event, or null", body = ApiResponse<Option<TeamResponse>>)
    ),
    security(("session" = [])),
    tag = "events"
)]
pub async fn my_team(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(event_id): Path<Uuid>,
) -> Result<Response, WebError> {
    let team = teams::my_team(&state.registry, &principal, Scope::Event(event_id)).await?;

    Ok(Json(ApiResponse::ok(team)).into_response())
}

#[utoipa::path(
    post,
    operation_id = "event_join_team",
    path = "/api/events/{event_id}/teams/{team_id}/join",
    params(
        ("event_id" = Uuid, Path, description = "Event ID"),
        ("team_id" = Uuid, Path, description = "Team ID")
    ),
    request_body = JoinTeamRequest,
    responses(
        (status = 200, description = "Joined the event team", body = ApiResponse<MemberResponse>),
        (status = 400, description = "Already in a team, team confirmed, or team full", body = ErrorResponse),
        (status = 404, description = "Team not found in this event", body = ErrorResponse),
        (status = 409, description = "Concurrent writes kept winning the race", body = ErrorResponse)
    ),
    security(("session" = [])),
    tag = "events"
)]
pub async fn join_team(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((event_id, team_id)): Path<(Uuid, Uuid)>,
    request: Option<Json<JoinTeamRequest>>,
) -> Result<Response, WebError> {
    let request = request.map(|Json(body)| body).unwrap_or_default();

    let member = teams::join_team(
        &state.registry,
        &principal,
        Scope::Event(event_id),
        team_id,
        &request,
    )
    .await?;

    Ok(Json(ApiResponse::ok(member)).into_response())
}

#[utoipa::path(
    post,
    operation_id = "event_leave_team",
    path = "/api/events/{event_id}/teams/{team_id}/leave",
    params(
        ("event_id" = Uuid, Path, description = "Event ID"),
        ("team_id" = Uuid, Path, description = "Team ID")
    ),
    responses(
        (status = 200, description = "Left the event team", body = ApiResponse<LeaveTeamResponse>),
        (status = 400, description = "Not a member, or team already confirmed", body = ErrorResponse)
    ),
    security(("session" = [])),
    tag = "events"
)]
pub async fn leave_team(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((event_id, team_id)): Path<(Uuid, Uuid)>,
) -> Result<Response, WebError> {
    let outcome =
        teams::leave_team(&state.registry, &principal, Scope::Event(event_id), team_id).await?;

    Ok(Json(ApiResponse::ok(outcome)).into_response())
}

#[utoipa::path(
    post,
    operation_id = "event_kick_member",
    path = "/api/events/{event_id}/teams/{team_id}/kick",
    params(
        ("event_id" = Uuid, Path, description = "Event ID"),
        ("team_id" = Uuid, Path, description = "Team ID")
    ),
    request_body = KickMemberRequest,
    responses(
        (status = 200, description = "Member removed; remaining roster", body = ApiResponse<TeamResponse>),
        (status = 400, description = "Target not in team, or team already confirmed", body = ErrorResponse),
        (status = 403, description = "Caller is not the leader", body = ErrorResponse)
    ),
    security(("session" = [])),
    tag = "events"
)]
pub async fn kick_member(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((event_id, team_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<KickMemberRequest>,
) -> Result<Response, WebError> {
    let team = teams::kick_member(
        &state.registry,
        &principal,
        Scope::Event(event_id),
        team_id,
        &request,
    )
    .await?;

    Ok(Json(ApiResponse::ok(team)).into_response())
}

#[utoipa::path(
    post,
    operation_id = "event_confirm_team",
    path = "/api/events/{event_id}/teams/{team_id}/confirm",
    params(
        ("event_id" = Uuid, Path, description = "Event ID"),
        ("team_id" = Uuid, Path, description = "Team ID")
    ),
    responses(
        (status = 200, description = "Event team locked", body = ApiResponse<TeamSummary>),
        (status = 400, description = "Too few members, already confirmed, or event team cap reached", body = ErrorResponse)
    ),
    security(("session" = [])),
    tag = "events"
)]
pub async fn confirm_team(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((event_id, team_id)): Path<(Uuid, Uuid)>,
) -> Result<Response, WebError> {
    let team =
        teams::confirm_team(&state.registry, &principal, Scope::Event(event_id), team_id).await?;

    Ok(Json(ApiResponse::ok(team)).into_response())
}

#[utoipa::path(
    delete,
    operation_id = "event_delete_team",
    path = "/api/events/{event_id}/teams/{team_id}",
    params(
        ("event_id" = Uuid, Path, description = "Event ID"),
        ("team_id" = Uuid, Path, description = "Team ID")
    ),
    responses(
        (status = 200, description = "Event team deleted", body = ApiResponse<DeleteTeamResponse>),
        (status = 403, description = "Caller is not the leader", body = ErrorResponse),
        (status = 404, description = "Team not found in this event", body = ErrorResponse)
    ),
    security(("session" = [])),
    tag = "events"
)]
pub async fn delete_team(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((event_id, team_id)): Path<(Uuid, Uuid)>,
) -> Result<Response, WebError> {
    let deleted =
        teams::delete_team(&state.registry, &principal, Scope::Event(event_id), team_id).await?;

    Ok(Json(ApiResponse::ok(deleted)).into_response())
}

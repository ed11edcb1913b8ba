use axum::{
    Json,
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use storage::dto::{
    admin::{AttendanceRequest, RegistrationWindowRequest, RegistrationWindowResponse, SetLeaderRequest},
    common::{ApiResponse, ErrorResponse},
    team::TeamSummary,
};
use uuid::Uuid;

use crate::error::WebError;
use crate::state::AppState;

#[utoipa::path(
    put,
    path = "/api/admin/registration",
    request_body = RegistrationWindowRequest,
    responses(
        (status = 200, description = "Hackathon registration window updated", body = ApiResponse<RegistrationWindowResponse>),
        (status = 401, description = "Missing or invalid API key", body = ErrorResponse)
    ),
    security(("api_key" = [])),
    tag = "admin"
)]
pub async fn set_registration_window(
    State(state): State<AppState>,
    Json(request): Json<RegistrationWindowRequest>,
) -> Result<Response, WebError> {
    let window = state.gate.set_hackathon_open(request.open).await?;
    tracing::info!(open = window.is_open, "Registration window changed");

    Ok(Json(ApiResponse::ok(RegistrationWindowResponse::from(window))).into_response())
}

#[utoipa::path(
    post,
    path = "/api/admin/teams/{team_id}/leader",
    params(
        ("team_id" = Uuid, Path, description = "Team ID")
    ),
    request_body = SetLeaderRequest,
    responses(
        (status = 200, description = "Leadership reassigned", body = ApiResponse<TeamSummary>),
        (status = 400, description = "Target is not a member of the team", body = ErrorResponse),
        (status = 404, description = "Team not found", body = ErrorResponse)
    ),
    security(("api_key" = [])),
    tag = "admin"
)]
pub async fn set_leader(
    State(state): State<AppState>,
    Path(team_id): Path<Uuid>,
    Json(request): Json<SetLeaderRequest>,
) -> Result<Response, WebError> {
    let team = state.registry.set_leader(team_id, request.member_id).await?;

    Ok(Json(ApiResponse::ok(TeamSummary::from(team))).into_response())
}

#[utoipa::path(
    post,
    path = "/api/admin/teams/{team_id}/attendance",
    params(
        ("team_id" = Uuid, Path, description = "Team ID")
    ),
    request_body = AttendanceRequest,
    responses(
        (status = 200, description = "Attendance recorded", body = ApiResponse<TeamSummary>),
        (status = 404, description = "Team not found", body = ErrorResponse)
    ),
    security(("api_key" = [])),
    tag = "admin"
)]
pub async fn mark_attendance(
    State(state): State<AppState>,
    Path(team_id): Path<Uuid>,
    Json(request): Json<AttendanceRequest>,
) -> Result<Response, WebError> {
    let team = state.registry.mark_attendance(team_id, request.attended).await?;

    Ok(Json(ApiResponse::ok(TeamSummary::from(team))).into_response())
}

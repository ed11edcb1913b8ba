//! Team operations shared by the hackathon-wide and event-scoped routes. The
//! scope decides which namespace membership and name uniqueness live in.

use storage::{
    dto::team::{
        CreateTeamRequest, DeleteTeamResponse, JoinTeamRequest, KickMemberRequest,
        LeaveTeamResponse, MemberResponse, TeamResponse, TeamSummary,
    },
    models::{Principal, Scope},
    services::{error::Result, team_registry::TeamRegistry},
};
use uuid::Uuid;

/// Create a team led by the caller
pub async fn create_team(
    registry: &TeamRegistry,
    principal: &Principal,
    scope: Scope,
    request: &CreateTeamRequest,
) -> Result<TeamSummary> {
    let team = registry.create(principal, scope, &request.name, false).await?;
    Ok(team.into())
}

/// Join a forming team. The membership records the profile's college unless
/// the request names one.
pub async fn join_team(
    registry: &TeamRegistry,
    principal: &Principal,
    scope: Scope,
    team_id: Uuid,
    request: &JoinTeamRequest,
) -> Result<MemberResponse> {
    let college_id = request.college_id.or(principal.college_id);
    let member = registry.join(principal, scope, team_id, college_id).await?;
    Ok(member.into())
}

pub async fn leave_team(
    registry: &TeamRegistry,
    principal: &Principal,
    scope: Scope,
    team_id: Uuid,
) -> Result<LeaveTeamResponse> {
    let outcome = registry.leave(principal, scope, team_id).await?;
    Ok(outcome.into())
}

/// Remove a member, then return the remaining roster
pub async fn kick_member(
    registry: &TeamRegistry,
    principal: &Principal,
    scope: Scope,
    team_id: Uuid,
    request: &KickMemberRequest,
) -> Result<TeamResponse> {
    registry.kick(principal, scope, team_id, request.member_id).await?;
    let roster = registry.get(principal, team_id).await?;
    Ok(roster.into())
}

pub async fn confirm_team(
    registry: &TeamRegistry,
    principal: &Principal,
    scope: Scope,
    team_id: Uuid,
) -> Result<TeamSummary> {
    let team = registry.confirm(principal, scope, team_id).await?;
    Ok(team.into())
}

pub async fn delete_team(
    registry: &TeamRegistry,
    principal: &Principal,
    scope: Scope,
    team_id: Uuid,
) -> Result<DeleteTeamResponse> {
    let released_members = registry.delete(principal, scope, team_id).await?;
    Ok(DeleteTeamResponse { released_members })
}

/// The caller's team in `scope`, if any
pub async fn my_team(
    registry: &TeamRegistry,
    principal: &Principal,
    scope: Scope,
) -> Result<Option<TeamResponse>> {
    let roster = registry.team_of(principal, scope).await?;
    Ok(roster.map(TeamResponse::from))
}

pub async fn get_team(
    registry: &TeamRegistry,
    principal: &Principal,
    team_id: Uuid,
) -> Result<TeamResponse> {
    let roster = registry.get(principal, team_id).await?;
    Ok(roster.into())
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::{PaymentStatus, Team, TeamMember};
use crate::services::team_registry::{LeaveOutcome, TeamRoster};

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTeamRequest {
    #[validate(length(min = 1, max = 50, message = "Team name must be between 1 and 50 characters"))]
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JoinTeamRequest {
    /// College recorded on the membership. Defaults to the profile's college.
    #[serde(default)]
    pub college_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct KickMemberRequest {
    pub member_id: Uuid,
}

/// Team without its members.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TeamSummary {
    pub team_id: Uuid,
    pub event_id: Option<Uuid>,
    pub name: String,
    pub leader_id: Uuid,
    pub is_completed: bool,
    pub payment_status: Option<PaymentStatus>,
    pub attended: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Team> for TeamSummary {
    fn from(team: Team) -> Self {
        Self {
            team_id: team.team_id,
            event_id: team.event_id,
            name: team.name,
            leader_id: team.leader_id,
            is_completed: team.is_completed,
            payment_status: team.payment_status,
            attended: team.attended,
            created_at: team.created_at,
            updated_at: team.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MemberResponse {
    pub user_id: Uuid,
    pub is_leader: bool,
    pub college_id: Option<Uuid>,
    pub joined_at: DateTime<Utc>,
}

impl From<TeamMember> for MemberResponse {
    fn from(member: TeamMember) -> Self {
        Self {
            user_id: member.user_id,
            is_leader: member.is_leader,
            college_id: member.college_id,
            joined_at: member.joined_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TeamResponse {
    #[serde(flatten)]
    pub team: TeamSummary,
    pub members: Vec<MemberResponse>,
}

impl From<TeamRoster> for TeamResponse {
    fn from(roster: TeamRoster) -> Self {
        Self {
            team: roster.team.into(),
            members: roster.members.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaveTeamResponse {
    /// True when the caller was the last member and the team was removed.
    pub team_deleted: bool,
}

impl From<LeaveOutcome> for LeaveTeamResponse {
    fn from(outcome: LeaveOutcome) -> Self {
        Self {
            team_deleted: outcome == LeaveOutcome::TeamDeleted,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteTeamResponse {
    pub released_members: u64,
}

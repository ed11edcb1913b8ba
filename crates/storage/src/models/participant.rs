use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// A registered user. Profile fields belong to the auth subsystem; the team
/// registry only writes `team_id` and `is_leader`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Participant {
    pub participant_id: Uuid,
    pub name: String,
    pub email: String,
    pub college_id: Option<Uuid>,
    pub is_leader: bool,
    pub team_id: Option<Uuid>,
    pub is_registration_complete: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParticipantField {
    Id(Uuid),
    TeamId(Option<Uuid>),
}

#[derive(Debug, Clone, Default)]
pub struct ParticipantPatch {
    pub team_id: Option<Option<Uuid>>,
    pub is_leader: Option<bool>,
}

impl ParticipantPatch {
    pub fn membership(team_id: Option<Uuid>, is_leader: bool) -> Self {
        Self {
            team_id: Some(team_id),
            is_leader: Some(is_leader),
        }
    }
}

/// The authenticated caller, as resolved by the session layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub name: String,
    pub college_id: Option<Uuid>,
    pub is_registration_complete: bool,
}

impl From<&Participant> for Principal {
    fn from(participant: &Participant) -> Self {
        Self {
            user_id: participant.participant_id,
            name: participant.name.clone(),
            college_id: participant.college_id,
            is_registration_complete: participant.is_registration_complete,
        }
    }
}

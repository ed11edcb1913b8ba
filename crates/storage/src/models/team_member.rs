use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Membership of one user in one team. `event_id` repeats the team's scope so
/// that `(event_id, user_id)` can be kept unique.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TeamMember {
    pub team_id: Uuid,
    pub event_id: Option<Uuid>,
    pub user_id: Uuid,
    pub is_leader: bool,
    pub college_id: Option<Uuid>,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MemberField {
    TeamId(Uuid),
    EventId(Option<Uuid>),
    UserId(Uuid),
    IsLeader(bool),
}

#[derive(Debug, Clone, Default)]
pub struct MemberPatch {
    pub is_leader: Option<bool>,
}

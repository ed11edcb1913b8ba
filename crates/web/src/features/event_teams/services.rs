use chrono::Utc;
use storage::{
    dto::team::TeamSummary,
    models::{EventType, Principal, Scope},
    services::{
        error::{Result, ServiceError},
        registration::RegistrationGate,
        team_registry::TeamRegistry,
    },
};
use uuid::Uuid;

const MAX_SOLO_NAME_PREFIX: usize = 40;

/// Register for a Solo event: a one-member team, confirmed on creation.
pub async fn register_solo(
    gate: &RegistrationGate,
    registry: &TeamRegistry,
    principal: &Principal,
    event_id: Uuid,
) -> Result<TeamSummary> {
    let event = gate.ensure_event_open(event_id, Utc::now()).await?;
    if event.event_type != EventType::Solo {
        return Err(ServiceError::Validation(
            "This event registers teams; create or join a team instead".to_string(),
        ));
    }

    let team = registry
        .create(principal, Scope::Event(event_id), &solo_team_name(principal), true)
        .await?;
    tracing::info!(event_id = %event_id, user_id = %principal.user_id, team_id = %team.team_id, "Solo registration");
    Ok(team.into())
}

/// Participant names are not unique, so the name carries a short user id.
fn solo_team_name(principal: &Principal) -> String {
    let prefix: String = principal.name.trim().chars().take(MAX_SOLO_NAME_PREFIX).collect();
    let suffix = &principal.user_id.simple().to_string()[..8];
    format!("{prefix} #{suffix}")
}

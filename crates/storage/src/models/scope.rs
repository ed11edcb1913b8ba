use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace in which team and membership uniqueness is evaluated.
///
/// The hackathon-wide flow uses [`Scope::Global`]: a participant belongs to at
/// most one team overall. Event flows are keyed by event id, so the same user
/// may hold independent memberships in different events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    Global,
    Event(Uuid),
}

impl Scope {
    pub fn event_id(self) -> Option<Uuid> {
        match self {
            Scope::Global => None,
            Scope::Event(id) => Some(id),
        }
    }

    pub fn from_event_id(event_id: Option<Uuid>) -> Self {
        event_id.map_or(Scope::Global, Scope::Event)
    }

    pub fn is_global(self) -> bool {
        matches!(self, Scope::Global)
    }
}

pub mod event;
pub mod participant;
pub mod payment;
pub mod registration_window;
pub mod scope;
pub mod team;
pub mod team_member;

pub use event::{Event, EventField, EventStatus, EventType};
pub use participant::{Participant, ParticipantField, ParticipantPatch, Principal};
pub use payment::{Payment, PaymentField, PaymentPatch, PaymentStatus};
pub use registration_window::{HACKATHON_WINDOW, RegistrationWindow, WindowField, WindowPatch};
pub use scope::Scope;
pub use team::{Team, TeamField, TeamPatch};
pub use team_member::{MemberField, MemberPatch, TeamMember};

use thiserror::Error;

/// Raised when a stored enum column holds a value this build does not know.
#[derive(Debug, Error)]
#[error("unknown {kind} value: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{PaymentStatus, Scope};

/// A team in either the global or an event scope.
///
/// `payment_status` is a projection of the team's authoritative payment rows.
/// It is written only by the settlement engine, in the same transaction that
/// settles the payment, and is never used as the source of truth.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Team {
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

impl Team {
    pub fn scope(&self) -> Scope {
        Scope::from_event_id(self.event_id)
    }

    pub fn is_paid(&self) -> bool {
        self.payment_status == Some(PaymentStatus::Paid)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TeamField {
    Id(Uuid),
    EventId(Option<Uuid>),
    /// Compared case-insensitively.
    Name(String),
    LeaderId(Uuid),
    IsCompleted(bool),
}

#[derive(Debug, Clone, Default)]
pub struct TeamPatch {
    pub leader_id: Option<Uuid>,
    pub is_completed: Option<bool>,
    pub payment_status: Option<Option<PaymentStatus>>,
    pub attended: Option<bool>,
}

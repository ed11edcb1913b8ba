use chrono::Utc;
use std::fmt;

use crate::models::{
    Event, EventField, MemberField, MemberPatch, Participant, ParticipantField, ParticipantPatch,
    Payment, PaymentField, PaymentPatch, RegistrationWindow, Team, TeamField, TeamMember,
    TeamPatch, WindowField, WindowPatch,
};

/// A persisted row type with its closed set of filterable fields.
pub trait Entity: Clone + fmt::Debug + Send + Sync + 'static {
    type Field: Field<Entity = Self>;
    type Patch: fmt::Debug + Send + Sync;

    /// Upper-case label used in error kinds, e.g. `TEAM_INSERT_FAILED`.
    const NAME: &'static str;

    fn matches(&self, field: &Self::Field) -> bool;

    fn apply(&mut self, patch: &Self::Patch);
}

pub trait Field: Clone + fmt::Debug + Send + Sync + 'static {
    type Entity: Entity<Field = Self>;
}

impl Entity for Participant {
    type Field = ParticipantField;
    type Patch = ParticipantPatch;

    const NAME: &'static str = "USER";

    fn matches(&self, field: &ParticipantField) -> bool {
        match field {
            ParticipantField::Id(id) => self.participant_id == *id,
            ParticipantField::TeamId(team_id) => self.team_id == *team_id,
        }
    }

    fn apply(&mut self, patch: &ParticipantPatch) {
        if let Some(team_id) = patch.team_id {
            self.team_id = team_id;
        }
        if let Some(is_leader) = patch.is_leader {
            self.is_leader = is_leader;
        }
    }
}

impl Field for ParticipantField {
    type Entity = Participant;
}

impl Entity for Event {
    type Field = EventField;
    type Patch = ();

    const NAME: &'static str = "EVENT";

    fn matches(&self, field: &EventField) -> bool {
        match field {
            EventField::Id(id) => self.event_id == *id,
        }
    }

    fn apply(&mut self, _patch: &()) {}
}

impl Field for EventField {
    type Entity = Event;
}

impl Entity for Team {
    type Field = TeamField;
    type Patch = TeamPatch;

    const NAME: &'static str = "TEAM";

    fn matches(&self, field: &TeamField) -> bool {
        match field {
            TeamField::Id(id) => self.team_id == *id,
            TeamField::EventId(event_id) => self.event_id == *event_id,
            TeamField::Name(name) => self.name.to_lowercase() == name.to_lowercase(),
            TeamField::LeaderId(id) => self.leader_id == *id,
            TeamField::IsCompleted(done) => self.is_completed == *done,
        }
    }

    fn apply(&mut self, patch: &TeamPatch) {
        if let Some(leader_id) = patch.leader_id {
            self.leader_id = leader_id;
        }
        if let Some(is_completed) = patch.is_completed {
            self.is_completed = is_completed;
        }
        if let Some(status) = patch.payment_status {
            self.payment_status = status;
        }
        if let Some(attended) = patch.attended {
            self.attended = attended;
        }
        self.updated_at = Utc::now();
    }
}

impl Field for TeamField {
    type Entity = Team;
}

impl Entity for TeamMember {
    type Field = MemberField;
    type Patch = MemberPatch;

    const NAME: &'static str = "TEAM_MEMBER";

    fn matches(&self, field: &MemberField) -> bool {
        match field {
            MemberField::TeamId(id) => self.team_id == *id,
            MemberField::EventId(event_id) => self.event_id == *event_id,
            MemberField::UserId(id) => self.user_id == *id,
            MemberField::IsLeader(is_leader) => self.is_leader == *is_leader,
        }
    }

    fn apply(&mut self, patch: &MemberPatch) {
        if let Some(is_leader) = patch.is_leader {
            self.is_leader = is_leader;
        }
    }
}

impl Field for MemberField {
    type Entity = TeamMember;
}

impl Entity for Payment {
    type Field = PaymentField;
    type Patch = PaymentPatch;

    const NAME: &'static str = "PAYMENT";

    fn matches(&self, field: &PaymentField) -> bool {
        match field {
            PaymentField::Id(id) => self.payment_id == *id,
            PaymentField::OrderId(order_id) => {
                self.razorpay_order_id.as_deref() == Some(order_id.as_str())
            }
            PaymentField::RazorpayPaymentId(payment_id) => {
                self.razorpay_payment_id.as_deref() == Some(payment_id.as_str())
            }
            PaymentField::TeamId(id) => self.team_id == Some(*id),
            PaymentField::Status(status) => self.payment_status == *status,
        }
    }

    fn apply(&mut self, patch: &PaymentPatch) {
        if let Some(status) = patch.payment_status {
            self.payment_status = status;
        }
        if let Some(payment_id) = &patch.razorpay_payment_id {
            self.razorpay_payment_id = Some(payment_id.clone());
        }
        if let Some(signature) = &patch.razorpay_signature {
            self.razorpay_signature = Some(signature.clone());
        }
        self.updated_at = Utc::now();
    }
}

impl Field for PaymentField {
    type Entity = Payment;
}

impl Entity for RegistrationWindow {
    type Field = WindowField;
    type Patch = WindowPatch;

    const NAME: &'static str = "REGISTRATION_WINDOW";

    fn matches(&self, field: &WindowField) -> bool {
        match field {
            WindowField::Key(key) => self.key == *key,
        }
    }

    fn apply(&mut self, patch: &WindowPatch) {
        if let Some(is_open) = patch.is_open {
            self.is_open = is_open;
        }
        self.updated_at = Utc::now();
    }
}

impl Field for WindowField {
    type Entity = RegistrationWindow;
}

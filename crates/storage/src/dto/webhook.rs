//! Razorpay webhook envelope. Only the fields settlement needs are decoded;
//! everything else in the payload is ignored.

use serde::Deserialize;
use serde::de::IgnoredAny;
use uuid::Uuid;

use crate::services::money::from_minor_units;
use crate::services::settlement::CaptureNotice;

pub const PAYMENT_CAPTURED: &str = "payment.captured";

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    #[serde(default)]
    pub payload: Option<WebhookPayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub payment: Option<EntityWrapper<PaymentEntity>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntityWrapper<T> {
    pub entity: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentEntity {
    pub id: String,
    pub order_id: Option<String>,
    /// Minor units.
    pub amount: i64,
    #[serde(default)]
    pub notes: Notes,
}

/// Order notes. The gateway sends an empty array instead of an object when an
/// order carries none.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(from = "RawNotes")]
pub struct Notes {
    pub payment_type: Option<String>,
    pub payment_name: Option<String>,
    pub team_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawNotes {
    Empty(Vec<IgnoredAny>),
    Object {
        #[serde(rename = "paymentType", default)]
        payment_type: Option<String>,
        #[serde(rename = "paymentName", default)]
        payment_name: Option<String>,
        #[serde(rename = "teamId", default)]
        team_id: Option<String>,
    },
}

impl From<RawNotes> for Notes {
    fn from(raw: RawNotes) -> Self {
        match raw {
            RawNotes::Object {
                payment_type,
                payment_name,
                team_id,
            } => Self {
                payment_type,
                payment_name,
                team_id,
            },
            RawNotes::Empty(_) => Self::default(),
        }
    }
}

impl WebhookEvent {
    /// The capture this event reports, or `None` for any other event type or
    /// a capture without an order id.
    pub fn capture(&self, signature: &str) -> Option<CaptureNotice> {
        if self.event != PAYMENT_CAPTURED {
            return None;
        }
        let payment = &self.payload.as_ref()?.payment.as_ref()?.entity;
        let order_id = payment.order_id.clone()?;

        Some(CaptureNotice {
            payment_id: payment.id.clone(),
            order_id,
            amount: from_minor_units(payment.amount),
            payment_type: payment.notes.payment_type.clone(),
            payment_name: payment.notes.payment_name.clone(),
            signature: signature.to_string(),
            team_id: payment
                .notes
                .team_id
                .as_deref()
                .and_then(|id| Uuid::parse_str(id.trim()).ok()),
        })
    }
}

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use super::ParseEnumError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Paid => "PAID",
            Self::Refunded => "REFUNDED",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "PAID" => Ok(Self::Paid),
            "REFUNDED" => Ok(Self::Refunded),
            other => Err(ParseEnumError {
                kind: "payment status",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entry-fee payment. `amount` is whole currency units (rupees); the gateway's
/// minor units never reach this row.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Payment {
    pub payment_id: Uuid,
    pub payment_type: String,
    pub payment_name: Option<String>,
    #[schema(value_type = String)]
    pub amount: Decimal,
    pub payment_status: PaymentStatus,
    pub razorpay_order_id: Option<String>,
    pub razorpay_payment_id: Option<String>,
    pub razorpay_signature: Option<String>,
    pub user_id: Option<Uuid>,
    pub team_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PaymentField {
    Id(Uuid),
    OrderId(String),
    RazorpayPaymentId(String),
    TeamId(Uuid),
    Status(PaymentStatus),
}

#[derive(Debug, Clone, Default)]
pub struct PaymentPatch {
    pub payment_status: Option<PaymentStatus>,
    pub razorpay_payment_id: Option<String>,
    pub razorpay_signature: Option<String>,
}

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::services::settlement::{CreatedOrder, SettledPayment};

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub team_id: Uuid,

    #[validate(length(min = 1, max = 64, message = "paymentType must be between 1 and 64 characters"))]
    pub payment_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    pub order_id: String,
    /// Minor units (paise).
    pub order_amount: i64,
    pub order_currency: String,
}

impl From<CreatedOrder> for CreateOrderResponse {
    fn from(order: CreatedOrder) -> Self {
        Self {
            order_id: order.order_id,
            order_amount: order.amount,
            order_currency: order.currency,
        }
    }
}

/// Fields handed back by the checkout widget. Snake-case names as emitted by
/// the gateway are accepted too.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SavePaymentRequest {
    #[serde(alias = "razorpay_order_id")]
    #[validate(length(min = 1, max = 64))]
    pub razorpay_order_id: String,

    #[serde(alias = "razorpay_payment_id")]
    #[validate(length(min = 1, max = 64))]
    pub razorpay_payment_id: String,

    #[serde(alias = "razorpay_signature")]
    #[validate(length(min = 1, max = 128))]
    pub razorpay_signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SavePaymentResponse {
    pub payment_db_id: Uuid,
    pub payment_razorpay_id: String,
}

impl From<SettledPayment> for SavePaymentResponse {
    fn from(settled: SettledPayment) -> Self {
        Self {
            payment_db_id: settled.payment_db_id,
            payment_razorpay_id: settled.razorpay_payment_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WebhookAck {
    pub success: bool,
}

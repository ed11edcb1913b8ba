use serde::{Deserialize, Serialize};
use uuid::Uuid;

use storage::services::gateway::OrderRequest;

/// Body of `POST /v1/orders`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateOrderBody {
    /// Minor units.
    pub amount: i64,
    pub currency: String,
    pub receipt: String,
    pub notes: OrderNotes,
}

/// Notes are echoed back on the captured payment, which is how webhooks find
/// their team.
#[derive(Debug, Clone, Serialize)]
pub struct OrderNotes {
    #[serde(rename = "paymentType")]
    pub payment_type: String,
    #[serde(rename = "teamId")]
    pub team_id: Uuid,
    #[serde(rename = "userId")]
    pub user_id: Uuid,
}

impl From<&OrderRequest> for CreateOrderBody {
    fn from(request: &OrderRequest) -> Self {
        Self {
            amount: request.amount,
            currency: request.currency.clone(),
            receipt: request.receipt.clone(),
            notes: OrderNotes {
                payment_type: request.payment_type.clone(),
                team_id: request.team_id,
                user_id: request.user_id,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Order {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub receipt: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

use async_trait::async_trait;
use uuid::Uuid;

pub type GatewayError = Box<dyn std::error::Error + Send + Sync>;

/// Order to open at the payment gateway. `amount` is in minor units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRequest {
    pub amount: i64,
    pub currency: String,
    pub receipt: String,
    pub payment_type: String,
    pub team_id: Uuid,
    pub user_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_order(&self, request: &OrderRequest) -> Result<GatewayOrder, GatewayError>;
}

/// Gateway receipts are capped at 40 characters.
pub const MAX_RECEIPT_LEN: usize = 40;

pub fn receipt_for(team_id: Uuid) -> String {
    format!("team_{team_id}")
        .chars()
        .take(MAX_RECEIPT_LEN)
        .collect()
}

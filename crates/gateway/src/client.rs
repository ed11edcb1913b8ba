use async_trait::async_trait;
use reqwest::Client;
use std::fmt;
use std::time::Duration;

use storage::services::gateway::{self as port, GatewayOrder, OrderRequest, PaymentGateway};

use crate::error::{GatewayError, Result};
use crate::models::{CreateOrderBody, ErrorEnvelope, Order};

pub const DEFAULT_BASE_URL: &str = "https://api.razorpay.com";

#[derive(Clone)]
pub struct RazorpayConfig {
    pub base_url: String,
    pub key_id: String,
    pub key_secret: String,
    pub timeout: Duration,
}

/// Shared, process-wide Orders API client. Authenticates with HTTP basic auth
/// using the key id and secret.
#[derive(Clone)]
pub struct RazorpayClient {
    client: Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

impl fmt::Debug for RazorpayClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RazorpayClient")
            .field("base_url", &self.base_url)
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl RazorpayClient {
    pub fn new(config: RazorpayConfig) -> Result<Self> {
        if config.key_id.is_empty() || config.key_secret.is_empty() {
            return Err(GatewayError::Config(
                "RAZORPAY_KEY_ID and RAZORPAY_KEY_SECRET must be set".to_string(),
            ));
        }

        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            key_id: config.key_id,
            key_secret: config.key_secret,
        })
    }

    pub async fn create_order(&self, body: &CreateOrderBody) -> Result<Order> {
        tracing::debug!(
            amount = body.amount,
            currency = %body.currency,
            receipt = %body.receipt,
            "Creating gateway order"
        );

        let response = self
            .client
            .post(format!("{}/v1/orders", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;
        if !status.is_success() {
            return Err(api_error(status.as_u16(), &bytes));
        }

        let order: Order = serde_json::from_slice(&bytes)?;
        tracing::info!(order_id = %order.id, status = ?order.status, "Gateway order created");
        Ok(order)
    }
}

fn api_error(status: u16, body: &[u8]) -> GatewayError {
    match serde_json::from_slice::<ErrorEnvelope>(body) {
        Ok(envelope) => GatewayError::Api {
            status,
            code: envelope.error.code.unwrap_or_else(|| "UNKNOWN".to_string()),
            description: envelope.error.description.unwrap_or_default(),
        },
        Err(_) => GatewayError::Api {
            status,
            code: "UNKNOWN".to_string(),
            description: String::from_utf8_lossy(body).chars().take(200).collect(),
        },
    }
}

#[async_trait]
impl PaymentGateway for RazorpayClient {
    async fn create_order(&self, request: &OrderRequest) -> std::result::Result<GatewayOrder, port::GatewayError> {
        let order = RazorpayClient::create_order(self, &CreateOrderBody::from(request)).await?;
        Ok(GatewayOrder {
            id: order.id,
            amount: order.amount,
            currency: order.currency,
        })
    }
}

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Gateway responded with {status}: {code} {description}")]
    Api {
        status: u16,
        code: String,
        description: String,
    },

    #[error("Failed to parse gateway response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Gateway is not configured: {0}")]
    Config(String),
}

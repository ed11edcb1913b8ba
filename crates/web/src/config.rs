use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::time::Duration;

use storage::services::settlement::SettlementConfig;
use storage::services::team_registry::TeamPolicy;

/// Process configuration, read once at startup. Secrets are shared read-only
/// from here on.
#[derive(Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub api_keys: String,
    pub session_secret: String,
    pub razorpay_key_id: String,
    pub razorpay_key_secret: String,
    pub razorpay_webhook_secret: String,
    pub razorpay_base_url: String,
    pub payment_currency: String,
    pub team_fee_per_head: Decimal,
    pub team_min_size: i64,
    pub team_max_size: i64,
    pub gateway_timeout: Duration,
    pub rate_limit_requests: u32,
    pub rate_limit_window: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            host: std::env::var("HOST").context("Cannot load HOST env variable")?,
            port: std::env::var("PORT")
                .context("Cannot load PORT env variable")?
                .parse()
                .context("PORT must be a number")?,
            database_url: std::env::var("DATABASE_URL")
                .context("Cannot load DATABASE_URL env variable")?,
            api_keys: std::env::var("API_KEYS").unwrap_or_default(),
            session_secret: std::env::var("SESSION_SECRET")
                .context("Cannot load SESSION_SECRET env variable")?,
            razorpay_key_id: std::env::var("RAZORPAY_KEY_ID")
                .context("Cannot load RAZORPAY_KEY_ID env variable")?,
            razorpay_key_secret: std::env::var("RAZORPAY_KEY_SECRET")
                .context("Cannot load RAZORPAY_KEY_SECRET env variable")?,
            razorpay_webhook_secret: std::env::var("RAZORPAY_WEBHOOK_SECRET")
                .context("Cannot load RAZORPAY_WEBHOOK_SECRET env variable")?,
            razorpay_base_url: var_or("RAZORPAY_BASE_URL", gateway::client::DEFAULT_BASE_URL),
            payment_currency: var_or("PAYMENT_CURRENCY", "INR"),
            team_fee_per_head: var_or("TEAM_FEE_PER_HEAD", "350")
                .parse()
                .context("TEAM_FEE_PER_HEAD must be a decimal amount")?,
            team_min_size: parse_or("TEAM_MIN_SIZE", 3)?,
            team_max_size: parse_or("TEAM_MAX_SIZE", 4)?,
            gateway_timeout: Duration::from_secs(parse_or("GATEWAY_TIMEOUT_SECS", 10)?),
            rate_limit_requests: parse_or("RATE_LIMIT_REQUESTS", 60)?,
            rate_limit_window: Duration::from_secs(parse_or("RATE_LIMIT_WINDOW_SECS", 60)?),
        };

        anyhow::ensure!(
            0 < config.team_min_size && config.team_min_size <= config.team_max_size,
            "TEAM_MIN_SIZE must be positive and not exceed TEAM_MAX_SIZE"
        );
        Ok(config)
    }

    pub fn team_policy(&self) -> TeamPolicy {
        TeamPolicy {
            min_team_size: self.team_min_size,
            max_team_size: self.team_max_size,
        }
    }

    pub fn settlement(&self) -> SettlementConfig {
        SettlementConfig {
            key_secret: self.razorpay_key_secret.clone(),
            webhook_secret: self.razorpay_webhook_secret.clone(),
            currency: self.payment_currency.clone(),
            fee_per_head: self.team_fee_per_head,
            gateway_timeout: self.gateway_timeout,
        }
    }

    pub fn uses_memory_store(&self) -> bool {
        self.database_url.starts_with("memory://")
    }

    /// Database location without credentials, for logs.
    pub fn redacted_database_url(&self) -> &str {
        self.database_url
            .split('@')
            .next_back()
            .unwrap_or("unknown")
    }
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .with_context(|| format!("{name} has an invalid value: {value}")),
        Err(_) => Ok(default),
    }
}

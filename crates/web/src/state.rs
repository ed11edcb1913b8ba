use std::sync::Arc;

use storage::Store;
use storage::services::gateway::PaymentGateway;
use storage::services::registration::RegistrationGate;
use storage::services::settlement::SettlementEngine;
use storage::services::team_registry::TeamRegistry;

use crate::config::Config;
use crate::middleware::auth::{ApiKeys, SessionVerifier};
use crate::middleware::rate_limit::RateLimiter;

/// Everything a handler or guard needs, cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub registry: TeamRegistry,
    pub settlement: SettlementEngine,
    pub gate: RegistrationGate,
    pub sessions: SessionVerifier,
    pub api_keys: ApiKeys,
    pub limiter: RateLimiter,
}

impl AppState {
    pub fn new(config: &Config, store: Arc<dyn Store>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self {
            registry: TeamRegistry::new(Arc::clone(&store), config.team_policy()),
            settlement: SettlementEngine::new(Arc::clone(&store), gateway, config.settlement()),
            gate: RegistrationGate::new(Arc::clone(&store)),
            sessions: SessionVerifier::new(&config.session_secret),
            api_keys: ApiKeys::from_comma_separated(&config.api_keys),
            limiter: RateLimiter::new(config.rate_limit_requests, config.rate_limit_window),
            store,
        }
    }
}

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::auth::bearer_token;
use crate::error::WebError;
use crate::state::AppState;

/// Expired windows are swept once this many keys are tracked.
const SWEEP_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Fixed-window request counter per client key.
#[derive(Clone)]
pub struct RateLimiter {
    windows: Arc<Mutex<HashMap<String, Window>>>,
    limit: u32,
    period: Duration,
}

impl RateLimiter {
    pub fn new(limit: u32, period: Duration) -> Self {
        Self {
            windows: Arc::new(Mutex::new(HashMap::new())),
            limit,
            period,
        }
    }

    /// Counts one request. On refusal returns the seconds until the window
    /// resets.
    pub fn check(&self, key: &str) -> Result<(), u64> {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> Result<(), u64> {
        let mut windows = self.windows.lock();
        if windows.len() >= SWEEP_THRESHOLD {
            windows.retain(|_, window| now.duration_since(window.started) < self.period);
        }

        let window = windows.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });
        let elapsed = now.duration_since(window.started);
        if elapsed >= self.period {
            *window = Window {
                started: now,
                count: 0,
            };
        }

        if window.count >= self.limit {
            let remaining = self.period.saturating_sub(now.duration_since(window.started));
            return Err((remaining.as_secs_f64().ceil() as u64).max(1));
        }
        window.count += 1;
        Ok(())
    }
}

pub async fn rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, WebError> {
    let key = client_key(&state, &request);
    if let Err(retry_after_secs) = state.limiter.check(&key) {
        tracing::warn!(key = %key, retry_after_secs, "Rate limit exceeded");
        return Err(WebError::TooManyRequests { retry_after_secs });
    }
    Ok(next.run(request).await)
}

/// Authenticated callers are keyed by user id, everyone else by client IP.
fn client_key(state: &AppState, request: &Request) -> String {
    if let Some(user_id) = bearer_token(request.headers()).and_then(|token| state.sessions.verify(token)) {
        return format!("user:{user_id}");
    }

    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    if let Some(ip) = forwarded {
        return format!("ip:{ip}");
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| format!("ip:{}", addr.ip()))
        .unwrap_or_else(|| "ip:unknown".to_string())
}

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use std::collections::HashSet;
use std::sync::Arc;
use storage::services::principal::find_principal;
use storage::services::signature;
use uuid::Uuid;

use crate::error::WebError;
use crate::state::AppState;

/// Admin API keys. Admin routes are a separate tier from participant sessions.
#[derive(Clone)]
pub struct ApiKeys {
    keys: HashSet<String>,
}

impl ApiKeys {
    pub fn from_comma_separated(keys_str: &str) -> Self {
        let keys = keys_str
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();

        Self { keys }
    }

    pub fn is_valid(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

pub async fn require_admin(
    State(api_keys): State<ApiKeys>,
    request: Request,
    next: Next,
) -> Result<Response, WebError> {
    let authorized = bearer_token(request.headers()).is_some_and(|key| api_keys.is_valid(key));
    if !authorized {
        tracing::warn!(path = %request.uri().path(), "Invalid API key attempt");
        return Err(WebError::Unauthorized);
    }

    Ok(next.run(request).await)
}

/// Verifies participant session tokens of the form `{user_id}.{hex mac}`,
/// where the MAC is HMAC-SHA256 of the user id under the session secret.
#[derive(Clone)]
pub struct SessionVerifier {
    secret: Arc<str>,
}

impl SessionVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: Arc::from(secret),
        }
    }

    pub fn issue(&self, user_id: Uuid) -> String {
        let id = user_id.to_string();
        let mac = signature::sign(&self.secret, id.as_bytes());
        format!("{id}.{mac}")
    }

    pub fn verify(&self, token: &str) -> Option<Uuid> {
        let (id, mac) = token.split_once('.')?;
        let user_id = Uuid::parse_str(id).ok()?;
        signature::verify(&self.secret, id.as_bytes(), mac).then_some(user_id)
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
}

/// Resolves the calling participant and stores it as a request extension.
pub async fn require_principal(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, WebError> {
    let user_id = bearer_token(request.headers())
        .and_then(|token| state.sessions.verify(token))
        .ok_or(WebError::Unauthorized)?;

    let principal = find_principal(state.store.as_ref(), user_id)
        .await?
        .ok_or_else(|| {
            tracing::warn!(user_id = %user_id, "Session names an unknown user");
            WebError::Unauthorized
        })?;

    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

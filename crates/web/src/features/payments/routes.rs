use axum::{Router, middleware, routing::post};

use super::handlers::{create_order, save_payment, webhook};
use crate::middleware::auth::require_principal;
use crate::state::AppState;

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/create-order", post(create_order))
        .route("/save-payment", post(save_payment))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_principal))
}

/// Authenticated by its signature alone and kept outside the rate limiter.
pub fn webhook_routes() -> Router<AppState> {
    Router::new().route("/api/payments/webhook", post(webhook))
}

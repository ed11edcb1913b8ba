use axum::{
    Router, middleware,
    routing::{post, put},
};

use super::handlers::{mark_attendance, set_leader, set_registration_window};
use crate::middleware::auth::{ApiKeys, require_admin};
use crate::state::AppState;

pub fn routes(api_keys: ApiKeys) -> Router<AppState> {
    Router::new()
        .route("/registration", put(set_registration_window))
        .route("/teams/:team_id/leader", post(set_leader))
        .route("/teams/:team_id/attendance", post(mark_attendance))
        .route_layer(middleware::from_fn_with_state(api_keys, require_admin))
}

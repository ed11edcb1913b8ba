use axum::{
    Router, middleware,
    routing::{delete, get, post},
};

use super::handlers::{
    confirm_team, create_team, delete_team, join_team, kick_member, leave_team, my_team, register,
};
use crate::middleware::auth::require_principal;
use crate::middleware::guards::{require_event_open, require_registration_complete};
use crate::state::AppState;

/// Mounted under `/api/events/:event_id`.
pub fn routes(state: &AppState) -> Router<AppState> {
    let mutating = Router::new()
        .route("/register", post(register))
        .route("/teams", post(create_team))
        .route("/teams/:team_id", delete(delete_team))
        .route("/teams/:team_id/join", post(join_team))
        .route("/teams/:team_id/leave", post(leave_team))
        .route("/teams/:team_id/kick", post(kick_member))
        .route("/teams/:team_id/confirm", post(confirm_team))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_event_open))
        .route_layer(middleware::from_fn(require_registration_complete));

    Router::new()
        .route("/teams/me", get(my_team))
        .merge(mutating)
        .route_layer(middleware::from_fn_with_state(state.clone(), require_principal))
}

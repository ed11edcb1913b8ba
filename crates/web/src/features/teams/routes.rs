use axum::{
    Router, middleware,
    routing::{delete, get, post},
};

use super::handlers::{
    confirm_team, create_team, delete_team, get_team, join_team, kick_member, leave_team, my_team,
};
use crate::middleware::auth::require_principal;
use crate::middleware::guards::{require_hackathon_open, require_registration_complete};
use crate::state::AppState;

pub fn routes(state: &AppState) -> Router<AppState> {
    // Route layers run outermost-last: principal, then profile, then window.
    let mutating = Router::new()
        .route("/", post(create_team))
        .route("/:team_id", delete(delete_team))
        .route("/:team_id/join", post(join_team))
        .route("/:team_id/leave", post(leave_team))
        .route("/:team_id/kick", post(kick_member))
        .route("/:team_id/confirm", post(confirm_team))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_hackathon_open))
        .route_layer(middleware::from_fn(require_registration_complete));

    Router::new()
        .route("/me", get(my_team))
        .route("/:team_id", get(get_team))
        .merge(mutating)
        .route_layer(middleware::from_fn_with_state(state.clone(), require_principal))
}

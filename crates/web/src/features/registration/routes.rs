use axum::{Router, routing::get};

use super::handlers::get_registration_window;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/registration", get(get_registration_window))
}

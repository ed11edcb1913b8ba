use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Response},
};
use storage::dto::{admin::RegistrationWindowResponse, common::ApiResponse};

use crate::error::WebError;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/registration",
    responses(
        (status = 200, description = "Whether hackathon registration is open", body = ApiResponse<RegistrationWindowResponse>)
    ),
    tag = "registration"
)]
pub async fn get_registration_window(State(state): State<AppState>) -> Result<Response, WebError> {
    let window = state.gate.window().await?;

    Ok(Json(ApiResponse::ok(RegistrationWindowResponse::from(window))).into_response())
}

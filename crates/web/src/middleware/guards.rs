//! Preconditions checked before team operations run.

use axum::{
    Extension,
    extract::{Path, Request, State},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use std::collections::HashMap;
use storage::models::Principal;
use storage::services::error::ServiceError;
use uuid::Uuid;

use crate::error::WebError;
use crate::state::AppState;

pub async fn require_registration_complete(
    Extension(principal): Extension<Principal>,
    request: Request,
    next: Next,
) -> Result<Response, WebError> {
    if !principal.is_registration_complete {
        return Err(ServiceError::RegistrationIncomplete.into());
    }
    Ok(next.run(request).await)
}

pub async fn require_hackathon_open(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, WebError> {
    state.gate.ensure_hackathon_open().await?;
    Ok(next.run(request).await)
}

/// The event in the path must exist, be published, and accept registrations,
/// and the caller must have a college on their profile.
pub async fn require_event_open(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
    Extension(principal): Extension<Principal>,
    request: Request,
    next: Next,
) -> Result<Response, WebError> {
    let event_id = params
        .get("event_id")
        .and_then(|id| Uuid::parse_str(id).ok())
        .ok_or(ServiceError::EventNotFound)?;

    state.gate.ensure_event_open(event_id, Utc::now()).await?;
    if principal.college_id.is_none() {
        return Err(ServiceError::CollegeNotSet.into());
    }
    Ok(next.run(request).await)
}

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use std::fmt;
use storage::dto::common::ErrorResponse;
use storage::services::error::ServiceError;
use validator::ValidationErrors;

/// Web layer errors
#[derive(Debug)]
pub enum WebError {
    Service(ServiceError),
    Validation(ValidationErrors),
    BadRequest(String),
    Unauthorized,
    TooManyRequests { retry_after_secs: u64 },
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Service(e) => write!(f, "{}: {}", e.kind(), e),
            Self::Validation(e) => write!(f, "Validation error: {}", e),
            Self::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            Self::Unauthorized => write!(f, "Unauthorized"),
            Self::TooManyRequests { retry_after_secs } => {
                write!(f, "Rate limited for {}s", retry_after_secs)
            }
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (status_code, body) = match &self {
            Self::Service(e) => {
                let status = StatusCode::from_u16(e.status_code())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                if status.is_server_error() {
                    tracing::error!(kind = %e.kind(), error = ?e, "Request failed downstream");
                }
                (
                    status,
                    ErrorResponse::new(e.kind(), e.title(), e.description()),
                )
            }
            Self::Validation(errors) => {
                let field_errors: Vec<String> = errors
                    .field_errors()
                    .iter()
                    .flat_map(|(field, errors)| {
                        errors.iter().map(move |e| {
                            format!(
                                "{}: {}",
                                field,
                                e.message
                                    .as_ref()
                                    .map(|m| m.to_string())
                                    .unwrap_or_else(|| e.code.to_string())
                            )
                        })
                    })
                    .collect();

                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::new("VALIDATION", "Invalid request", field_errors.join("; ")),
                )
            }
            Self::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new("VALIDATION", "Invalid request", msg.clone()),
            ),
            Self::Unauthorized => {
                let e = ServiceError::Unauthorized;
                (
                    StatusCode::UNAUTHORIZED,
                    ErrorResponse::new(e.kind(), e.title(), e.description()),
                )
            }
            Self::TooManyRequests { retry_after_secs } => (
                StatusCode::TOO_MANY_REQUESTS,
                ErrorResponse::new(
                    "RATE_LIMITED",
                    "Too many requests",
                    format!("Please wait {retry_after_secs} seconds before trying again."),
                ),
            ),
        };

        let mut response = (status_code, Json(body)).into_response();
        if let Self::TooManyRequests { retry_after_secs } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        response
    }
}

impl From<ServiceError> for WebError {
    fn from(error: ServiceError) -> Self {
        Self::Service(error)
    }
}

impl From<ValidationErrors> for WebError {
    fn from(error: ValidationErrors) -> Self {
        Self::Validation(error)
    }
}

pub type ApiResult<T> = Result<T, WebError>;

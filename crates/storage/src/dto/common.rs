use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Success envelope shared by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Failure envelope. `error` is the machine-readable kind.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub title: String,
    pub description: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            title: title.into(),
            description: description.into(),
        }
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Key of the hackathon-wide registration window.
pub const HACKATHON_WINDOW: &str = "hackathon";

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegistrationWindow {
    pub key: String,
    pub is_open: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WindowField {
    Key(String),
}

#[derive(Debug, Clone, Default)]
pub struct WindowPatch {
    pub is_open: Option<bool>,
}

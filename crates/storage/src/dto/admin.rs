use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::RegistrationWindow;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetLeaderRequest {
    pub member_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRequest {
    pub attended: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationWindowRequest {
    pub open: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationWindowResponse {
    pub open: bool,
    pub updated_at: DateTime<Utc>,
}

impl From<RegistrationWindow> for RegistrationWindowResponse {
    fn from(window: RegistrationWindow) -> Self {
        Self {
            open: window.is_open,
            updated_at: window.updated_at,
        }
    }
}

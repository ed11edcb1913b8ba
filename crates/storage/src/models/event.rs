use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use super::ParseEnumError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    Draft,
    Published,
    Ongoing,
    Completed,
}

impl EventStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Published => "PUBLISHED",
            Self::Ongoing => "ONGOING",
            Self::Completed => "COMPLETED",
        }
    }
}

impl FromStr for EventStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(Self::Draft),
            "PUBLISHED" => Ok(Self::Published),
            "ONGOING" => Ok(Self::Ongoing),
            "COMPLETED" => Ok(Self::Completed),
            other => Err(ParseEnumError {
                kind: "event status",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Solo,
    Team,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Solo => "SOLO",
            Self::Team => "TEAM",
        }
    }
}

impl FromStr for EventType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SOLO" => Ok(Self::Solo),
            "TEAM" => Ok(Self::Team),
            other => Err(ParseEnumError {
                kind: "event type",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Owned by event management; read-only to the team registry and settlement.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Event {
    pub event_id: Uuid,
    pub name: String,
    pub status: EventStatus,
    pub event_type: EventType,
    pub max_teams: Option<i32>,
    pub min_team_size: i32,
    pub max_team_size: i32,
    pub fee_per_head: Decimal,
    pub deadline: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Event {
    pub fn is_visible(&self) -> bool {
        self.status != EventStatus::Draft
    }

    /// Registration is open while the event is published or running and the
    /// deadline has not passed.
    pub fn is_registration_open(&self, now: DateTime<Utc>) -> bool {
        matches!(self.status, EventStatus::Published | EventStatus::Ongoing) && now < self.deadline
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventField {
    Id(Uuid),
}

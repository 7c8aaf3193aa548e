use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Restaurant record. `opening_hours` keeps the source's free-text
/// format, e.g. "12:00 PM - 10:00 PM"; the slot calendar parses it and
/// rejects anything it cannot interpret.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Restaurant {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub city: String,
    pub contact: String,
    #[serde(rename = "openingHours")]
    pub opening_hours: String,
    #[serde(rename = "ownerId")]
    pub owner_id: Uuid,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

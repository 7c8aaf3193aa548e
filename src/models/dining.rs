use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A bookable seating zone within a restaurant, with its own capacity
/// and per-person price. `is_available` is the owner-controlled toggle,
/// independent of booking state.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DiningArea {
    pub id: Uuid,
    #[serde(rename = "restaurantId")]
    pub restaurant_id: Uuid,
    #[serde(rename = "cuisineType")]
    pub cuisine_type: String,
    #[serde(rename = "diningType")]
    pub dining_type: String,
    #[serde(rename = "pricePerPerson")]
    pub price_per_person: Decimal,
    #[serde(rename = "guestCapacity")]
    pub guest_capacity: i32,
    pub features: Vec<String>,
    #[serde(rename = "dietaryOptions")]
    pub dietary_options: Vec<String>,
    pub ambiance: Vec<String>,
    pub images: Vec<String>,
    #[serde(rename = "isAvailable")]
    pub is_available: bool,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

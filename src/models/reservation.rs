use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Reservation lifecycle. The transition rules live on this enum; the
/// ledger layers the temporal and payment guards on top of them.
/// Handlers never compare status strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "reservation_status")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl ReservationStatus {
    /// `Pending -> Confirmed -> Completed`, with `Cancelled` reachable
    /// from `Pending` or `Confirmed`. No transition leaves a terminal
    /// state.
    pub fn can_transition_to(self, next: ReservationStatus) -> bool {
        use ReservationStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed) | (Confirmed, Completed) | (Pending, Cancelled) | (Confirmed, Cancelled)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_method", rename_all = "snake_case")]
pub enum PaymentMethod {
    #[serde(rename = "pay-at-restaurant")]
    PayAtRestaurant,
    #[serde(rename = "stripe")]
    Stripe,
}

/// The central entity. Occupies the fixed one-hour window
/// `[reservation_datetime, reservation_datetime + 1h)` on its dining
/// area; the schema's exclusion constraint keeps those windows disjoint
/// across non-cancelled rows.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Reservation {
    pub id: Uuid,
    #[serde(rename = "userId")]
    pub user_id: Uuid,
    #[serde(rename = "diningAreaId")]
    pub dining_area_id: Uuid,
    #[serde(rename = "restaurantId")]
    pub restaurant_id: Uuid,
    #[serde(rename = "reservationDateTime")]
    pub reservation_datetime: DateTime<Utc>,
    pub guests: i32,
    #[serde(rename = "totalPrice")]
    pub total_price: Decimal,
    #[serde(rename = "specialRequests")]
    pub special_requests: String,
    pub status: ReservationStatus,
    #[serde(rename = "paymentMethod")]
    pub payment_method: PaymentMethod,
    #[serde(rename = "isPaid")]
    pub is_paid: bool,
    #[serde(rename = "paidAt")]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(rename = "stripeSessionId")]
    pub stripe_session_id: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_can_confirm_or_cancel() {
        assert!(ReservationStatus::Pending.can_transition_to(ReservationStatus::Confirmed));
        assert!(ReservationStatus::Pending.can_transition_to(ReservationStatus::Cancelled));
        assert!(!ReservationStatus::Pending.can_transition_to(ReservationStatus::Completed));
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for next in [
            ReservationStatus::Pending,
            ReservationStatus::Confirmed,
            ReservationStatus::Completed,
            ReservationStatus::Cancelled,
        ] {
            assert!(!ReservationStatus::Cancelled.can_transition_to(next));
            assert!(!ReservationStatus::Completed.can_transition_to(next));
        }
    }

    #[test]
    fn confirmed_can_complete_or_cancel() {
        assert!(ReservationStatus::Confirmed.can_transition_to(ReservationStatus::Completed));
        assert!(ReservationStatus::Confirmed.can_transition_to(ReservationStatus::Cancelled));
        assert!(!ReservationStatus::Confirmed.can_transition_to(ReservationStatus::Pending));
    }
}

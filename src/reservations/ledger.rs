use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{DiningArea, PaymentMethod, Reservation, ReservationStatus};
use crate::utils::error::AppError;

#[derive(Debug, Deserialize)]
pub struct CreateReservationRequest {
    /// Dining area id; the wire name matches the original client.
    pub dining: Uuid,
    #[serde(rename = "reservationDateTime")]
    pub reservation_datetime: DateTime<Utc>,
    pub guests: i32,
    #[serde(rename = "specialRequests")]
    pub special_requests: Option<String>,
    #[serde(rename = "paymentMethod")]
    pub payment_method: Option<PaymentMethod>,
    #[serde(rename = "userEmail")]
    pub user_email: Option<String>,
    #[serde(rename = "userName")]
    pub user_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ModifyReservationRequest {
    #[serde(rename = "reservationDateTime")]
    pub reservation_datetime: Option<DateTime<Utc>>,
    pub guests: Option<i32>,
    #[serde(rename = "specialRequests")]
    pub special_requests: Option<String>,
}

/// Owner dashboard aggregation over one owner's reservations.
#[derive(Debug, Serialize)]
pub struct DashboardData {
    /// Ten most recent reservations.
    pub reservations: Vec<Reservation>,
    #[serde(rename = "totalReservations")]
    pub total_reservations: i64,
    #[serde(rename = "totalRevenue")]
    pub total_revenue: Decimal,
    #[serde(rename = "cancellationRate")]
    pub cancellation_rate: i64,
    #[serde(rename = "averageGuests")]
    pub average_guests: i64,
}

#[derive(Debug, Serialize)]
pub struct PaymentStatus {
    #[serde(rename = "isPaid")]
    pub is_paid: bool,
    pub status: ReservationStatus,
}

// ---------------------------------------------------------------------------
// Transition guards. All temporal and payment rules live here; the SQL
// below only persists what these functions have already allowed.
// ---------------------------------------------------------------------------

/// Price-per-person times the guest count, floored at one guest.
pub fn compute_total_price(price_per_person: Decimal, guests: i32) -> Decimal {
    price_per_person * Decimal::from(guests.max(1))
}

/// A reservation can be modified only while it is pending, unpaid, and
/// still in the future. Once paid, only cancellation remains.
pub fn ensure_modifiable(reservation: &Reservation, now: DateTime<Utc>) -> Result<(), AppError> {
    if reservation.reservation_datetime <= now {
        return Err(AppError::Conflict("Cannot modify past reservations".into()));
    }
    if reservation.is_paid {
        return Err(AppError::Conflict(
            "Cannot modify paid reservations. You can only cancel them.".into(),
        ));
    }
    if reservation.status != ReservationStatus::Pending {
        return Err(AppError::Conflict(
            "Only pending reservations can be modified".into(),
        ));
    }
    Ok(())
}

/// Cancellation is allowed while the start time is still in the future
/// and the reservation has not already reached a terminal state. A paid
/// reservation may still be cancelled; `is_paid` is left untouched so
/// the financial record survives.
pub fn ensure_cancellable(reservation: &Reservation, now: DateTime<Utc>) -> Result<(), AppError> {
    if !reservation
        .status
        .can_transition_to(ReservationStatus::Cancelled)
    {
        // Both terminal states land here; the message distinguishes
        // them because the client branches on it.
        let message = if reservation.status == ReservationStatus::Cancelled {
            "Booking is already cancelled"
        } else {
            "Completed bookings cannot be cancelled"
        };
        return Err(AppError::Conflict(message.into()));
    }
    if reservation.reservation_datetime <= now {
        return Err(AppError::Conflict("Cannot cancel past reservations".into()));
    }
    Ok(())
}

/// A checkout session can only be opened for a pending, unpaid booking.
pub fn ensure_payable(reservation: &Reservation) -> Result<(), AppError> {
    if reservation.is_paid {
        return Err(AppError::Conflict("Booking is already paid".into()));
    }
    if reservation.status != ReservationStatus::Pending {
        return Err(AppError::Conflict(
            "Only pending bookings can be paid".into(),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// True if the user owns any restaurant. Owners cannot book or modify
/// reservations anywhere.
async fn is_restaurant_owner(pool: &PgPool, user_id: Uuid) -> Result<bool, AppError> {
    let owns: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM restaurants WHERE owner_id = $1)")
            .bind(user_id)
            .fetch_one(pool)
            .await?;
    Ok(owns)
}

/// SQLSTATE 23P01 is the exclusion constraint on overlapping occupancy
/// windows; 23505 covers any unique-index race. Both mean the slot was
/// taken by a concurrent writer.
fn map_booking_write_error(err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(ref db) = err {
        if matches!(db.code().as_deref(), Some("23P01") | Some("23505")) {
            return AppError::Conflict("Slot is not available".into());
        }
    }
    AppError::DatabaseError(err)
}

/// Guarded create. The availability check runs inside the same
/// transaction as the insert, and the schema's exclusion constraint
/// turns any remaining race into a conflict error instead of a
/// double-booking.
pub async fn create(
    pool: &PgPool,
    user_id: Uuid,
    req: &CreateReservationRequest,
) -> Result<Reservation, AppError> {
    if is_restaurant_owner(pool, user_id).await? {
        return Err(AppError::Forbidden(
            "Restaurant owners cannot make reservations at any restaurant".into(),
        ));
    }

    let dining: DiningArea = sqlx::query_as("SELECT * FROM dining_areas WHERE id = $1")
        .bind(req.dining)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Dining area not found".into()))?;

    if !dining.is_available {
        return Err(AppError::ValidationError(
            "Dining area is not accepting bookings".into(),
        ));
    }
    if req.guests < 1 {
        return Err(AppError::ValidationError(
            "Guest count must be at least 1".into(),
        ));
    }
    if req.guests > dining.guest_capacity {
        return Err(AppError::ValidationError(format!(
            "Guest count exceeds capacity of {}",
            dining.guest_capacity
        )));
    }
    if req.reservation_datetime <= Utc::now() {
        return Err(AppError::ValidationError(
            "Reservation time must be in the future".into(),
        ));
    }

    let total_price = compute_total_price(dining.price_per_person, req.guests);
    let payment_method = req.payment_method.unwrap_or(PaymentMethod::PayAtRestaurant);

    let mut tx = pool.begin().await?;

    // Friendly-path re-check inside the transaction; the exclusion
    // constraint below is what actually holds under concurrency.
    let taken: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM reservations
            WHERE dining_area_id = $1
              AND status <> 'Cancelled'
              AND reservation_datetime < $2 + interval '1 hour'
              AND reservation_datetime + interval '1 hour' > $2
        )
        "#,
    )
    .bind(req.dining)
    .bind(req.reservation_datetime)
    .fetch_one(&mut *tx)
    .await?;

    if taken {
        return Err(AppError::Conflict("Slot is not available".into()));
    }

    let reservation: Reservation = sqlx::query_as(
        r#"
        INSERT INTO reservations
            (user_id, dining_area_id, restaurant_id, reservation_datetime,
             guests, total_price, special_requests, status, payment_method, is_paid)
        VALUES ($1, $2, $3, $4, $5, $6, $7, 'Pending', $8, FALSE)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(req.dining)
    .bind(dining.restaurant_id)
    .bind(req.reservation_datetime)
    .bind(req.guests)
    .bind(total_price)
    .bind(req.special_requests.clone().unwrap_or_default())
    .bind(payment_method)
    .fetch_one(&mut *tx)
    .await
    .map_err(map_booking_write_error)?;

    tx.commit().await?;

    tracing::info!(
        reservation_id = %reservation.id,
        dining_area_id = %reservation.dining_area_id,
        start = %reservation.reservation_datetime,
        "Reservation created"
    );
    Ok(reservation)
}

/// Modification of an own, pending, unpaid, still-future reservation.
/// A date change re-checks availability excluding this reservation; a
/// guest change recomputes the price against current capacity.
pub async fn modify(
    pool: &PgPool,
    user_id: Uuid,
    reservation_id: Uuid,
    req: &ModifyReservationRequest,
) -> Result<Reservation, AppError> {
    if is_restaurant_owner(pool, user_id).await? {
        return Err(AppError::Forbidden(
            "Restaurant owners cannot modify reservations at any restaurant".into(),
        ));
    }

    let mut tx = pool.begin().await?;

    let current: Reservation =
        sqlx::query_as("SELECT * FROM reservations WHERE id = $1 AND user_id = $2 FOR UPDATE")
            .bind(reservation_id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Reservation not found".into()))?;

    let now = Utc::now();
    ensure_modifiable(&current, now)?;

    let new_start = match req.reservation_datetime {
        Some(requested) if requested != current.reservation_datetime => {
            if requested <= now {
                return Err(AppError::ValidationError(
                    "Reservation time must be in the future".into(),
                ));
            }
            let taken: bool = sqlx::query_scalar(
                r#"
                SELECT EXISTS (
                    SELECT 1 FROM reservations
                    WHERE dining_area_id = $1
                      AND id <> $2
                      AND status <> 'Cancelled'
                      AND reservation_datetime < $3 + interval '1 hour'
                      AND reservation_datetime + interval '1 hour' > $3
                )
                "#,
            )
            .bind(current.dining_area_id)
            .bind(reservation_id)
            .bind(requested)
            .fetch_one(&mut *tx)
            .await?;

            if taken {
                return Err(AppError::Conflict(
                    "Selected time slot is not available".into(),
                ));
            }
            requested
        }
        _ => current.reservation_datetime,
    };

    let (new_guests, new_total) = match req.guests {
        Some(guests) if guests != current.guests => {
            let dining: DiningArea = sqlx::query_as("SELECT * FROM dining_areas WHERE id = $1")
                .bind(current.dining_area_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::NotFound("Dining area not found".into()))?;

            if guests < 1 {
                return Err(AppError::ValidationError(
                    "Guest count must be at least 1".into(),
                ));
            }
            if guests > dining.guest_capacity {
                return Err(AppError::ValidationError(format!(
                    "Guest count exceeds capacity of {}",
                    dining.guest_capacity
                )));
            }
            (guests, compute_total_price(dining.price_per_person, guests))
        }
        _ => (current.guests, current.total_price),
    };

    let new_requests = req
        .special_requests
        .clone()
        .unwrap_or_else(|| current.special_requests.clone());

    let updated: Reservation = sqlx::query_as(
        r#"
        UPDATE reservations
        SET reservation_datetime = $2,
            guests = $3,
            total_price = $4,
            special_requests = $5,
            updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(reservation_id)
    .bind(new_start)
    .bind(new_guests)
    .bind(new_total)
    .bind(new_requests)
    .fetch_one(&mut *tx)
    .await
    .map_err(map_booking_write_error)?;

    tx.commit().await?;

    tracing::info!(reservation_id = %reservation_id, "Reservation modified");
    Ok(updated)
}

/// Pure status transition to `Cancelled`; payment fields are untouched.
pub async fn cancel(
    pool: &PgPool,
    user_id: Uuid,
    reservation_id: Uuid,
) -> Result<Reservation, AppError> {
    let mut tx = pool.begin().await?;

    let current: Reservation =
        sqlx::query_as("SELECT * FROM reservations WHERE id = $1 AND user_id = $2 FOR UPDATE")
            .bind(reservation_id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Reservation not found".into()))?;

    ensure_cancellable(&current, Utc::now())?;

    let updated: Reservation = sqlx::query_as(
        "UPDATE reservations SET status = 'Cancelled', updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(reservation_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(reservation_id = %reservation_id, "Reservation cancelled");
    Ok(updated)
}

/// A single reservation, scoped to its owner-user.
pub async fn get(
    pool: &PgPool,
    user_id: Uuid,
    reservation_id: Uuid,
) -> Result<Reservation, AppError> {
    sqlx::query_as("SELECT * FROM reservations WHERE id = $1 AND user_id = $2")
        .bind(reservation_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Reservation not found".into()))
}

pub async fn my_bookings(pool: &PgPool, user_id: Uuid) -> Result<Vec<Reservation>, AppError> {
    let rows = sqlx::query_as(
        "SELECT * FROM reservations WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// User-scoped payment status, polled by the client after the Stripe
/// redirect.
pub async fn verify_payment(
    pool: &PgPool,
    user_id: Uuid,
    booking_id: Uuid,
) -> Result<PaymentStatus, AppError> {
    let reservation = get(pool, user_id, booking_id).await?;
    Ok(PaymentStatus {
        is_paid: reservation.is_paid,
        status: reservation.status,
    })
}

/// Dashboard aggregation across every restaurant the caller owns.
pub async fn restaurant_bookings(
    pool: &PgPool,
    owner_id: Uuid,
) -> Result<DashboardData, AppError> {
    let all: Vec<Reservation> = sqlx::query_as(
        r#"
        SELECT r.* FROM reservations r
        JOIN restaurants rest ON rest.id = r.restaurant_id
        WHERE rest.owner_id = $1
        ORDER BY r.created_at DESC
        "#,
    )
    .bind(owner_id)
    .fetch_all(pool)
    .await?;

    Ok(compute_dashboard(all))
}

/// Revenue and guest averages count non-cancelled reservations only;
/// the cancellation rate is a whole percentage of all reservations.
fn compute_dashboard(all: Vec<Reservation>) -> DashboardData {
    let total_reservations = all.len() as i64;

    let active: Vec<&Reservation> = all
        .iter()
        .filter(|r| r.status != ReservationStatus::Cancelled)
        .collect();

    let total_revenue: Decimal = active.iter().map(|r| r.total_price).sum();

    let cancelled = total_reservations - active.len() as i64;
    let cancellation_rate = if total_reservations > 0 {
        ((cancelled as f64 / total_reservations as f64) * 100.0).round() as i64
    } else {
        0
    };

    let total_guests: i64 = active.iter().map(|r| i64::from(r.guests)).sum();
    let average_guests = if active.is_empty() {
        0
    } else {
        (total_guests as f64 / active.len() as f64).round() as i64
    };

    // The dashboard widget shows the ten most recent bookings.
    let reservations = all.into_iter().take(10).collect();

    DashboardData {
        reservations,
        total_reservations,
        total_revenue,
        cancellation_rate,
        average_guests,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn reservation(
        status: ReservationStatus,
        is_paid: bool,
        starts_in: Duration,
    ) -> Reservation {
        let now = Utc::now();
        Reservation {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            dining_area_id: Uuid::new_v4(),
            restaurant_id: Uuid::new_v4(),
            reservation_datetime: now + starts_in,
            guests: 4,
            total_price: Decimal::new(2000, 0),
            special_requests: String::new(),
            status,
            payment_method: PaymentMethod::PayAtRestaurant,
            is_paid,
            paid_at: None,
            stripe_session_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    // Dining area priced 500, 4 guests -> 2000; 6 guests -> 3000.
    #[test]
    fn total_price_scales_with_guests() {
        let price = Decimal::new(500, 0);
        assert_eq!(compute_total_price(price, 4), Decimal::new(2000, 0));
        assert_eq!(compute_total_price(price, 6), Decimal::new(3000, 0));
    }

    #[test]
    fn total_price_floors_at_one_guest() {
        let price = Decimal::new(500, 0);
        assert_eq!(compute_total_price(price, 0), Decimal::new(500, 0));
        assert_eq!(compute_total_price(price, 1), Decimal::new(500, 0));
    }

    #[test]
    fn pending_unpaid_future_is_modifiable() {
        let r = reservation(ReservationStatus::Pending, false, Duration::hours(2));
        assert!(ensure_modifiable(&r, Utc::now()).is_ok());
    }

    #[test]
    fn paid_reservation_rejects_modification_but_allows_cancel() {
        let r = reservation(ReservationStatus::Confirmed, true, Duration::hours(2));
        let err = ensure_modifiable(&r, Utc::now()).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(ensure_cancellable(&r, Utc::now()).is_ok());
    }

    #[test]
    fn past_reservation_rejects_modification_and_cancellation() {
        let r = reservation(ReservationStatus::Pending, false, Duration::hours(-1));
        assert!(matches!(
            ensure_modifiable(&r, Utc::now()),
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            ensure_cancellable(&r, Utc::now()),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn confirmed_unpaid_is_not_modifiable() {
        let r = reservation(ReservationStatus::Confirmed, false, Duration::hours(2));
        assert!(ensure_modifiable(&r, Utc::now()).is_err());
    }

    #[test]
    fn future_pending_reservation_is_cancellable() {
        let r = reservation(ReservationStatus::Pending, false, Duration::hours(2));
        assert!(ensure_cancellable(&r, Utc::now()).is_ok());
    }

    #[test]
    fn terminal_states_reject_cancellation() {
        for status in [ReservationStatus::Cancelled, ReservationStatus::Completed] {
            let r = reservation(status, false, Duration::hours(2));
            assert!(matches!(
                ensure_cancellable(&r, Utc::now()),
                Err(AppError::Conflict(_))
            ));
        }
    }

    #[test]
    fn only_pending_unpaid_bookings_are_payable() {
        let ok = reservation(ReservationStatus::Pending, false, Duration::hours(2));
        assert!(ensure_payable(&ok).is_ok());

        let paid = reservation(ReservationStatus::Confirmed, true, Duration::hours(2));
        assert!(ensure_payable(&paid).is_err());

        let cancelled = reservation(ReservationStatus::Cancelled, false, Duration::hours(2));
        assert!(ensure_payable(&cancelled).is_err());
    }

    #[test]
    fn dashboard_stats_exclude_cancelled_revenue() {
        let mut a = reservation(ReservationStatus::Confirmed, true, Duration::hours(2));
        a.total_price = Decimal::new(3000, 0);
        a.guests = 6;
        let mut b = reservation(ReservationStatus::Pending, false, Duration::hours(3));
        b.total_price = Decimal::new(2000, 0);
        b.guests = 4;
        let mut c = reservation(ReservationStatus::Cancelled, false, Duration::hours(4));
        c.total_price = Decimal::new(9999, 0);
        c.guests = 10;

        let data = compute_dashboard(vec![a, b, c]);
        assert_eq!(data.total_reservations, 3);
        assert_eq!(data.total_revenue, Decimal::new(5000, 0));
        assert_eq!(data.cancellation_rate, 33);
        assert_eq!(data.average_guests, 5);
        assert_eq!(data.reservations.len(), 3);
    }

    #[test]
    fn dashboard_is_zeroed_without_bookings() {
        let data = compute_dashboard(Vec::new());
        assert_eq!(data.total_reservations, 0);
        assert_eq!(data.total_revenue, Decimal::ZERO);
        assert_eq!(data.cancellation_rate, 0);
        assert_eq!(data.average_guests, 0);
    }
}

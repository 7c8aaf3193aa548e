use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Reservation, ReservationStatus};
use crate::utils::error::AppError;

/// Result of applying a payment confirmation. `AlreadyApplied` tells
/// the caller to skip side effects (no second confirmation email).
#[derive(Debug)]
pub enum SettlementOutcome {
    Applied(Reservation),
    AlreadyApplied(Reservation),
}

/// Applies a verified `checkout.session.completed` event to its
/// reservation, exactly once.
///
/// The row is locked for the duration of the transaction, so two
/// concurrently redelivered events for the same booking serialize; the
/// second sees `is_paid = true` and becomes a no-op. A paid reservation
/// is never re-settled, whether the duplicate carries the same session
/// id (network retry) or a different one (stale or duplicate session).
pub async fn settle(
    pool: &PgPool,
    booking_id: Uuid,
    session_id: &str,
) -> Result<SettlementOutcome, AppError> {
    let mut tx = pool.begin().await?;

    let reservation: Reservation =
        sqlx::query_as("SELECT * FROM reservations WHERE id = $1 FOR UPDATE")
            .bind(booking_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".into()))?;

    if reservation.is_paid {
        tx.commit().await?;
        if reservation.stripe_session_id.as_deref() == Some(session_id) {
            tracing::info!(booking_id = %booking_id, "Settlement already applied for this session");
        } else {
            tracing::warn!(
                booking_id = %booking_id,
                session_id = %session_id,
                "Settlement event for an already-paid booking with a different session, ignoring"
            );
        }
        return Ok(SettlementOutcome::AlreadyApplied(reservation));
    }

    // The payment is applied even when the booking has left the normal
    // pending path (e.g. cancelled before the webhook arrived): the
    // charge is a financial fact and reconciliation happens elsewhere.
    // Flag it, since it is not a lifecycle transition the state
    // machine allows.
    if !reservation
        .status
        .can_transition_to(ReservationStatus::Confirmed)
    {
        tracing::warn!(
            booking_id = %booking_id,
            status = ?reservation.status,
            "Settling payment for a booking outside the pending path"
        );
    }

    let updated: Reservation = sqlx::query_as(
        r#"
        UPDATE reservations
        SET is_paid = TRUE,
            status = 'Confirmed',
            payment_method = 'stripe',
            paid_at = now(),
            stripe_session_id = $2,
            updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(booking_id)
    .bind(session_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(booking_id = %booking_id, session_id = %session_id, "Payment settled");
    Ok(SettlementOutcome::Applied(updated))
}

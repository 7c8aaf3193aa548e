use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::models::Reservation;
use crate::notify::{self, EmailMessage};
use crate::reservations::ledger::{self, CreateReservationRequest, ModifyReservationRequest};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, success};

/// POST /reservation/reserve
pub async fn reserve(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateReservationRequest>,
) -> Result<Response, AppError> {
    let reservation = ledger::create(&state.pool, user.id, &req).await?;

    // Confirmation mail goes out after the insert has committed;
    // delivery problems never surface to the booking caller.
    let recipient = req.user_email.clone().unwrap_or_else(|| user.email.clone());
    let name = req.user_name.clone().unwrap_or_else(|| user.name.clone());
    notify::spawn_send(
        state.notifier.clone(),
        booking_confirmation_email(&reservation, &recipient, &name),
    );

    Ok(created(reservation, "Booking Created Successfully").into_response())
}

/// GET /reservation/my-bookings
pub async fn my_bookings(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Response, AppError> {
    let bookings = ledger::my_bookings(&state.pool, user.id).await?;
    Ok(success(bookings, "Bookings fetched successfully").into_response())
}

/// GET /reservation/restaurant-bookings — owner dashboard.
pub async fn restaurant_bookings(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Response, AppError> {
    let data = ledger::restaurant_bookings(&state.pool, user.id).await?;
    Ok(success(data, "Dashboard data fetched successfully").into_response())
}

/// GET /reservation/:reservation_id
pub async fn get_reservation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(reservation_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let reservation = ledger::get(&state.pool, user.id, reservation_id).await?;
    Ok(success(reservation, "Reservation fetched successfully").into_response())
}

/// PUT /reservation/:reservation_id
pub async fn update_reservation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(reservation_id): Path<Uuid>,
    Json(req): Json<ModifyReservationRequest>,
) -> Result<Response, AppError> {
    let updated = ledger::modify(&state.pool, user.id, reservation_id, &req).await?;
    Ok(success(updated, "Booking updated successfully").into_response())
}

/// POST /reservation/cancel/:reservation_id
pub async fn cancel_reservation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(reservation_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let cancelled = ledger::cancel(&state.pool, user.id, reservation_id).await?;

    notify::spawn_send(
        state.notifier.clone(),
        EmailMessage {
            to: user.email.clone(),
            subject: "Booking Cancelled".into(),
            body: format!(
                "Hi {},\n\nYour reservation for {} has been cancelled.\n\nIf this was a mistake you can book a new slot any time.",
                user.name,
                cancelled.reservation_datetime.format("%Y-%m-%d %H:%M"),
            ),
        },
    );

    Ok(success(cancelled, "Booking Cancelled").into_response())
}

fn booking_confirmation_email(
    reservation: &Reservation,
    recipient: &str,
    name: &str,
) -> EmailMessage {
    let mut body = format!(
        "Hi {},\n\nYour booking on {} has been created.\n\nGuests: {}\nTotal Price: {}\nStatus: Pending",
        name,
        reservation.reservation_datetime.format("%Y-%m-%d %H:%M"),
        reservation.guests,
        reservation.total_price,
    );
    if !reservation.special_requests.is_empty() {
        body.push_str(&format!(
            "\nSpecial Requests: {}",
            reservation.special_requests
        ));
    }
    body.push_str("\n\nThank you for choosing us!");

    EmailMessage {
        to: recipient.to_string(),
        subject: "Booking Confirmation".into(),
        body,
    }
}

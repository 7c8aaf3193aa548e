use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::models::{DiningArea, Reservation, Restaurant, User};
use crate::notify::{self, EmailMessage};
use crate::payments::settlement::{self, SettlementOutcome};
use crate::payments::stripe::{self, WebhookEvent};
use crate::reservations::ledger;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::success;

#[derive(Debug, Deserialize)]
pub struct StripePaymentRequest {
    #[serde(rename = "bookingId")]
    pub booking_id: Uuid,
}

/// POST /reservation/stripe-payment — opens a hosted checkout session
/// for the caller's own pending, unpaid booking. No reservation state
/// changes here; confirmation only ever arrives through the webhook.
pub async fn stripe_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<StripePaymentRequest>,
) -> Result<Response, AppError> {
    let reservation = ledger::get(&state.pool, user.id, req.booking_id).await?;
    ledger::ensure_payable(&reservation)?;

    let restaurant: Restaurant = sqlx::query_as("SELECT * FROM restaurants WHERE id = $1")
        .bind(reservation.restaurant_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Restaurant not found".into()))?;

    let dining: DiningArea = sqlx::query_as("SELECT * FROM dining_areas WHERE id = $1")
        .bind(reservation.dining_area_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Dining area not found".into()))?;

    let session = state
        .stripe
        .create_checkout_session(&reservation, &restaurant.name, &dining.cuisine_type, &user.email)
        .await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "url": session.url,
            "sessionId": session.id,
        })),
    )
        .into_response())
}

/// POST /reservation/stripe-webhook
///
/// Registered with a raw `Bytes` body: signature verification is
/// computed over the exact payload bytes, so nothing may JSON-decode
/// the request before this handler.
///
/// Status mapping matters for provider retries: verification and
/// malformed-payload failures are 4xx (retrying cannot help), while
/// verified-but-processing failures are 5xx so the provider retries —
/// the settlement idempotency guard makes those retries safe.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    if state.config.stripe_webhook_secret.is_empty() {
        return Err(AppError::InternalServerError(
            "Webhook secret not configured".into(),
        ));
    }

    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::ValidationError("Missing signature header".into()))?;

    if body.is_empty() {
        return Err(AppError::ValidationError("Empty webhook payload".into()));
    }

    stripe::verify_webhook_signature(&body, signature, &state.config.stripe_webhook_secret)?;

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::ValidationError(format!("Malformed webhook payload: {e}")))?;

    match event.event_type.as_str() {
        "checkout.session.completed" => {
            let session = event.data.object;
            let booking_id = stripe::booking_id_from_session(&session).ok_or_else(|| {
                AppError::ValidationError("No booking ID found in session".into())
            })?;

            match settlement::settle(&state.pool, booking_id, &session.id).await? {
                SettlementOutcome::Applied(reservation) => {
                    send_payment_confirmation(&state, &reservation).await;
                    Ok(Json(json!({ "received": true })).into_response())
                }
                SettlementOutcome::AlreadyApplied(_) => {
                    // No second notification on redelivery.
                    Ok(Json(json!({ "received": true, "message": "Already processed" }))
                        .into_response())
                }
            }
        }
        other => {
            tracing::debug!(event_type = %other, event_id = %event.id, "Ignoring webhook event");
            Ok(Json(json!({ "received": true })).into_response())
        }
    }
}

/// GET /reservation/verify-payment/:booking_id — polled by the client
/// after the Stripe redirect.
pub async fn verify_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(booking_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let status = ledger::verify_payment(&state.pool, user.id, booking_id).await?;
    Ok(success(status, "Payment status fetched").into_response())
}

/// Fire-and-forget payment confirmation mail. Lookup failures are
/// logged and dropped like delivery failures; the settlement has
/// already committed.
async fn send_payment_confirmation(state: &AppState, reservation: &Reservation) {
    let user: Option<User> = match sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(reservation.user_id)
        .fetch_optional(&state.pool)
        .await
    {
        Ok(user) => user,
        Err(e) => {
            tracing::error!(error = ?e, "Could not load user for payment confirmation email");
            return;
        }
    };

    let Some(user) = user else {
        tracing::warn!(user_id = %reservation.user_id, "No user record for payment confirmation email");
        return;
    };

    notify::spawn_send(
        state.notifier.clone(),
        EmailMessage {
            to: user.email,
            subject: "Payment Confirmed".into(),
            body: format!(
                "Hi {},\n\nYour payment has been processed and your booking is confirmed.\n\nDate & Time: {}\nGuests: {}\nTotal Paid: {}\nStatus: Confirmed\n\nThank you for choosing us!",
                user.name,
                reservation.reservation_datetime.format("%Y-%m-%d %H:%M"),
                reservation.guests,
                reservation.total_price,
            ),
        },
    );
}

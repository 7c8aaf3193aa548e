use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::create_cors_layer;
use crate::handlers::{availability, health_check, payments, reservations};
use crate::state::AppState;

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/reservation/check-availability",
            post(availability::check_availability),
        )
        .route(
            "/reservation/available-times/:dining_id",
            get(availability::available_times),
        )
        .route("/reservation/reserve", post(reservations::reserve))
        .route("/reservation/my-bookings", get(reservations::my_bookings))
        .route(
            "/reservation/restaurant-bookings",
            get(reservations::restaurant_bookings),
        )
        .route("/reservation/stripe-payment", post(payments::stripe_payment))
        // The webhook handler takes the raw body; it must never sit
        // behind anything that consumes or re-encodes the payload.
        .route("/reservation/stripe-webhook", post(payments::stripe_webhook))
        .route(
            "/reservation/verify-payment/:booking_id",
            get(payments::verify_payment),
        )
        .route(
            "/reservation/cancel/:reservation_id",
            post(reservations::cancel_reservation),
        )
        .route(
            "/reservation/:reservation_id",
            get(reservations::get_reservation).put(reservations::update_reservation),
        )
        .layer(TraceLayer::new_for_http())
        .layer(create_cors_layer())
        .with_state(state)
}

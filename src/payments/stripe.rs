use std::collections::HashMap;

use chrono::Utc;
use ring::hmac;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::models::Reservation;
use crate::utils::error::AppError;

const CHECKOUT_SESSIONS_URL: &str = "https://api.stripe.com/v1/checkout/sessions";

/// Accepted clock skew between the signature timestamp and now.
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Thin client for the Stripe REST API. Checkout creation is the only
/// call this service makes; everything else arrives via webhook.
#[derive(Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    secret_key: String,
    frontend_url: String,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

impl StripeClient {
    pub fn new(secret_key: String, frontend_url: String) -> Self {
        // Bounded timeout: a hung provider call fails the request, it
        // does not hang the worker. The caller treats a timeout as
        // "unknown" and re-queries rather than blindly retrying.
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .expect("Failed to build Stripe HTTP client");
        Self {
            client,
            secret_key,
            frontend_url,
        }
    }

    /// Creates a hosted checkout session for an unpaid reservation.
    /// The booking id rides along twice, as `client_reference_id` and
    /// in the metadata bag, because neither field alone is guaranteed
    /// to survive every provider code path. No reservation state is
    /// touched here.
    pub async fn create_checkout_session(
        &self,
        reservation: &Reservation,
        restaurant_name: &str,
        cuisine_type: &str,
        customer_email: &str,
    ) -> Result<CheckoutSession, AppError> {
        let amount_minor = to_minor_units(reservation.total_price)?;
        let booking_id = reservation.id.to_string();

        let name = format!("Table Reservation - {restaurant_name}");
        let description = format!(
            "Dining: {} | Date: {} | Guests: {}",
            cuisine_type,
            reservation.reservation_datetime.format("%Y-%m-%d %H:%M"),
            reservation.guests
        );
        let success_url = format!(
            "{}/my-bookings?payment_success=true&session_id={{CHECKOUT_SESSION_ID}}",
            self.frontend_url
        );
        let cancel_url = format!("{}/my-bookings?payment_cancelled=true", self.frontend_url);
        let amount = amount_minor.to_string();

        let form: Vec<(&str, &str)> = vec![
            ("mode", "payment"),
            ("locale", "en"),
            ("payment_method_types[0]", "card"),
            ("success_url", &success_url),
            ("cancel_url", &cancel_url),
            ("customer_email", customer_email),
            ("client_reference_id", &booking_id),
            ("line_items[0][price_data][currency]", "inr"),
            ("line_items[0][price_data][product_data][name]", &name),
            (
                "line_items[0][price_data][product_data][description]",
                &description,
            ),
            ("line_items[0][price_data][unit_amount]", &amount),
            ("line_items[0][quantity]", "1"),
            ("metadata[bookingId]", &booking_id),
        ];

        let response = self
            .client
            .post(CHECKOUT_SESSIONS_URL)
            .basic_auth(&self.secret_key, Option::<&str>::None)
            .form(&form)
            .send()
            .await
            .map_err(|e| AppError::ExternalServiceError(format!("Stripe request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, %body, "Stripe checkout session creation failed");
            return Err(AppError::ExternalServiceError(
                "Could not create payment session".into(),
            ));
        }

        response
            .json::<CheckoutSession>()
            .await
            .map_err(|e| AppError::ExternalServiceError(format!("Bad Stripe response: {e}")))
    }
}

/// Price in minor currency units (paise), as Stripe expects.
fn to_minor_units(price: Decimal) -> Result<i64, AppError> {
    (price * Decimal::from(100))
        .round()
        .to_i64()
        .ok_or_else(|| AppError::InternalServerError("Total price out of range".into()))
}

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookEventData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEventData {
    pub object: SessionObject,
}

/// The slice of a checkout session object the settlement path needs.
#[derive(Debug, Deserialize)]
pub struct SessionObject {
    pub id: String,
    pub client_reference_id: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// The booking id is sent both in metadata and as the session's
/// `client_reference_id`; the provider does not guarantee either field
/// is always populated, so resolution is a fixed fallback order:
/// metadata first, then the reference id.
pub fn booking_id_from_session(session: &SessionObject) -> Option<Uuid> {
    session
        .metadata
        .get("bookingId")
        .or(session.client_reference_id.as_ref())
        .and_then(|raw| Uuid::parse_str(raw).ok())
}

/// Verifies a `Stripe-Signature` header against the exact raw request
/// bytes. The header carries a unix timestamp and one or more `v1`
/// HMAC-SHA256 signatures over `"{timestamp}.{payload}"`; any valid
/// `v1` within the tolerance window passes.
pub fn verify_webhook_signature(
    payload: &[u8],
    signature_header: &str,
    secret: &str,
) -> Result<(), AppError> {
    let mut timestamp: Option<i64> = None;
    let mut candidates: Vec<Vec<u8>> = Vec::new();

    for part in signature_header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => {
                if let Ok(bytes) = hex::decode(value) {
                    candidates.push(bytes);
                }
            }
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| AppError::ValidationError("Malformed signature header".into()))?;

    let age = (Utc::now().timestamp() - timestamp).abs();
    if age > SIGNATURE_TOLERANCE_SECS {
        return Err(AppError::ValidationError(
            "Signature timestamp outside tolerance".into(),
        ));
    }

    if candidates.is_empty() {
        return Err(AppError::ValidationError("No v1 signature present".into()));
    }

    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
    let mut signed = timestamp.to_string().into_bytes();
    signed.push(b'.');
    signed.extend_from_slice(payload);

    // ring's verify is constant-time.
    let valid = candidates
        .iter()
        .any(|sig| hmac::verify(&key, &signed, sig).is_ok());

    if valid {
        Ok(())
    } else {
        Err(AppError::ValidationError(
            "Webhook signature verification failed".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(metadata: &[(&str, &str)], reference: Option<&str>) -> SessionObject {
        SessionObject {
            id: "cs_test_123".into(),
            client_reference_id: reference.map(String::from),
            metadata: metadata
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn metadata_booking_id_wins() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let s = session(&[("bookingId", &a.to_string())], Some(&b.to_string()));
        assert_eq!(booking_id_from_session(&s), Some(a));
    }

    #[test]
    fn falls_back_to_client_reference_id() {
        let id = Uuid::new_v4();
        let s = session(&[], Some(&id.to_string()));
        assert_eq!(booking_id_from_session(&s), Some(id));
    }

    #[test]
    fn missing_everywhere_is_none() {
        assert_eq!(booking_id_from_session(&session(&[], None)), None);
    }

    #[test]
    fn unparsable_ids_are_none() {
        let s = session(&[("bookingId", "not-a-uuid")], Some("also-not"));
        assert_eq!(booking_id_from_session(&s), None);
    }

    fn sign(payload: &[u8], secret: &str, timestamp: i64) -> String {
        let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
        let mut signed = timestamp.to_string().into_bytes();
        signed.push(b'.');
        signed.extend_from_slice(payload);
        let tag = hmac::sign(&key, &signed);
        format!("t={},v1={}", timestamp, hex::encode(tag.as_ref()))
    }

    #[test]
    fn valid_signature_passes() {
        let payload = br#"{"id":"evt_1"}"#;
        let header = sign(payload, "whsec_test", Utc::now().timestamp());
        assert!(verify_webhook_signature(payload, &header, "whsec_test").is_ok());
    }

    #[test]
    fn wrong_secret_fails() {
        let payload = br#"{"id":"evt_1"}"#;
        let header = sign(payload, "whsec_test", Utc::now().timestamp());
        assert!(verify_webhook_signature(payload, &header, "whsec_other").is_err());
    }

    #[test]
    fn tampered_payload_fails() {
        let header = sign(br#"{"amount":100}"#, "whsec_test", Utc::now().timestamp());
        assert!(verify_webhook_signature(br#"{"amount":999}"#, &header, "whsec_test").is_err());
    }

    #[test]
    fn stale_timestamp_fails() {
        let payload = b"{}";
        let header = sign(payload, "whsec_test", Utc::now().timestamp() - 3600);
        assert!(verify_webhook_signature(payload, &header, "whsec_test").is_err());
    }

    #[test]
    fn header_without_signature_fails() {
        let ts = Utc::now().timestamp();
        assert!(verify_webhook_signature(b"{}", &format!("t={ts}"), "whsec_test").is_err());
        assert!(verify_webhook_signature(b"{}", "garbage", "whsec_test").is_err());
    }

    #[test]
    fn minor_units_round_to_paise() {
        // 2000.00 rupees -> 200000 paise; 499.50 -> 49950.
        assert_eq!(to_minor_units(Decimal::new(2000, 0)).unwrap(), 200_000);
        assert_eq!(to_minor_units(Decimal::new(49950, 2)).unwrap(), 49_950);
    }
}

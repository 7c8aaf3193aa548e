use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::scheduling::availability;
use crate::scheduling::slots::{self, SlotBoundary};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::success;

#[derive(Debug, Deserialize)]
pub struct CheckAvailabilityRequest {
    #[serde(rename = "reservationDateTime")]
    pub reservation_datetime: DateTime<Utc>,
    /// Dining area id.
    pub dining: Uuid,
    #[serde(rename = "excludeReservationId")]
    pub exclude_reservation_id: Option<Uuid>,
}

/// POST /reservation/check-availability — point query for one candidate
/// start time. Read path; the booking write re-validates.
pub async fn check_availability(
    State(state): State<AppState>,
    Json(req): Json<CheckAvailabilityRequest>,
) -> Result<Response, AppError> {
    let available = availability::is_available(
        &state.pool,
        req.dining,
        req.reservation_datetime,
        req.exclude_reservation_id,
    )
    .await?;

    Ok(success(available, "Availability checked").into_response())
}

#[derive(Debug, Deserialize)]
pub struct AvailableTimesQuery {
    pub date: Option<String>,
    /// The client sends `excludeReservationId=` with an empty value
    /// when not modifying, so empty means absent.
    #[serde(rename = "excludeReservationId", default, deserialize_with = "empty_as_none")]
    pub exclude_reservation_id: Option<Uuid>,
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<Uuid>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref() {
        None | Some("") => Ok(None),
        Some(value) => Uuid::parse_str(value)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// GET /reservation/available-times/:dining_id?date=YYYY-MM-DD
pub async fn available_times(
    State(state): State<AppState>,
    Path(dining_id): Path<Uuid>,
    Query(query): Query<AvailableTimesQuery>,
) -> Result<Response, AppError> {
    let raw_date = query
        .date
        .ok_or_else(|| AppError::ValidationError("Date is required".into()))?;

    let date = slots::parse_date(&raw_date)?;

    if date < Utc::now().date_naive() {
        return Err(AppError::ValidationError("Cannot select a past date".into()));
    }

    let slots = availability::available_slots(
        &state.pool,
        dining_id,
        date,
        query.exclude_reservation_id,
        SlotBoundary::default(),
    )
    .await?;

    Ok(success(slots, "Available times fetched").into_response())
}

use chrono::{DateTime, Duration, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{DiningArea, Restaurant};
use crate::scheduling::slots::{self, OpeningHours, SlotBoundary, OCCUPANCY};
use crate::utils::error::AppError;

/// Half-open interval overlap: `[a_start, a_end)` intersects
/// `[b_start, b_end)`.
pub fn overlaps(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && b_start < a_end
}

/// True iff no non-cancelled reservation's one-hour window intersects
/// `[candidate_start, candidate_start + 1h)` on this dining area.
/// `exclude_reservation_id` skips the caller's own booking when
/// re-checking during modification.
///
/// This is the read path; it may observe stale state under concurrent
/// writes. The write path re-validates inside its own transaction and
/// the schema's exclusion constraint is the final arbiter.
pub async fn is_available(
    pool: &PgPool,
    dining_area_id: Uuid,
    candidate_start: DateTime<Utc>,
    exclude_reservation_id: Option<Uuid>,
) -> Result<bool, AppError> {
    let candidate_end = candidate_start + OCCUPANCY;

    let taken: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM reservations
            WHERE dining_area_id = $1
              AND status <> 'Cancelled'
              AND reservation_datetime < $2
              AND reservation_datetime + interval '1 hour' > $3
              AND ($4::uuid IS NULL OR id <> $4)
        )
        "#,
    )
    .bind(dining_area_id)
    .bind(candidate_end)
    .bind(candidate_start)
    .bind(exclude_reservation_id)
    .fetch_one(pool)
    .await?;

    Ok(!taken)
}

/// Bookable `HH:MM` start times for a dining area on `date`: the slot
/// calendar minus anything whose occupancy window would collide with an
/// existing booking, minus already-past starts when `date` is today.
pub async fn available_slots(
    pool: &PgPool,
    dining_area_id: Uuid,
    date: NaiveDate,
    exclude_reservation_id: Option<Uuid>,
    boundary: SlotBoundary,
) -> Result<Vec<String>, AppError> {
    let dining: DiningArea =
        sqlx::query_as("SELECT * FROM dining_areas WHERE id = $1")
            .bind(dining_area_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Dining area not found".into()))?;

    let restaurant: Restaurant =
        sqlx::query_as("SELECT * FROM restaurants WHERE id = $1")
            .bind(dining.restaurant_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Restaurant not found".into()))?;

    let hours = OpeningHours::parse(&restaurant.opening_hours)?;
    let candidates = slots::generate_slots(hours, boundary);

    // One query for the whole day, overlap math in memory.
    let day_start = date.and_time(chrono::NaiveTime::MIN).and_utc();
    let day_end = day_start + Duration::days(1);

    let booked_starts: Vec<DateTime<Utc>> = sqlx::query_scalar(
        r#"
        SELECT reservation_datetime FROM reservations
        WHERE dining_area_id = $1
          AND status <> 'Cancelled'
          AND reservation_datetime >= $2
          AND reservation_datetime < $3
          AND ($4::uuid IS NULL OR id <> $4)
        "#,
    )
    .bind(dining_area_id)
    .bind(day_start)
    .bind(day_end)
    .bind(exclude_reservation_id)
    .fetch_all(pool)
    .await?;

    let now = Utc::now();

    let free = candidates
        .into_iter()
        .filter_map(|slot| {
            let start = date.and_time(slot).and_utc();
            if start <= now {
                return None;
            }
            let end = start + OCCUPANCY;
            let clash = booked_starts
                .iter()
                .any(|&booked| overlaps(start, end, booked, booked + OCCUPANCY));
            (!clash).then(|| slots::format_slot(slot))
        })
        .collect();

    Ok(free)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 9, 1, h, m, 0).unwrap()
    }

    #[test]
    fn identical_windows_overlap() {
        assert!(overlaps(at(13, 0), at(14, 0), at(13, 0), at(14, 0)));
    }

    #[test]
    fn adjacent_windows_do_not_overlap() {
        // [12:00, 13:00) and [13:00, 14:00) share only the boundary.
        assert!(!overlaps(at(12, 0), at(13, 0), at(13, 0), at(14, 0)));
        assert!(!overlaps(at(13, 0), at(14, 0), at(12, 0), at(13, 0)));
    }

    #[test]
    fn half_hour_offset_windows_overlap() {
        // A 13:00 booking blocks the 12:30 and 13:30 slots too.
        assert!(overlaps(at(12, 30), at(13, 30), at(13, 0), at(14, 0)));
        assert!(overlaps(at(13, 30), at(14, 30), at(13, 0), at(14, 0)));
    }

    #[test]
    fn disjoint_windows_do_not_overlap() {
        assert!(!overlaps(at(12, 0), at(13, 0), at(18, 0), at(19, 0)));
    }
}

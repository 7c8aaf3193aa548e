use chrono::{Duration, NaiveDate, NaiveTime, Timelike};
use thiserror::Error;

use crate::utils::error::AppError;

/// Slots are offered every 30 minutes; each booking still blocks a full
/// hour (see [`OCCUPANCY`]).
pub const SLOT_GRANULARITY: Duration = Duration::minutes(30);

/// Fixed occupancy window of one reservation, independent of slot
/// granularity.
pub const OCCUPANCY: Duration = Duration::minutes(60);

#[derive(Debug, Error)]
pub enum SlotError {
    #[error("invalid opening hours: {0}")]
    InvalidConfiguration(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl From<SlotError> for AppError {
    fn from(err: SlotError) -> Self {
        match err {
            SlotError::InvalidConfiguration(_) => {
                AppError::InternalServerError("Restaurant opening hours are misconfigured".into())
            }
            SlotError::InvalidInput(msg) => AppError::ValidationError(msg),
        }
    }
}

/// How the last slot relates to closing time. The source system offers
/// any slot strictly before close, so a booking's one-hour occupancy
/// window can extend past closing; whether that is intended is an open
/// product question, so both rules are supported rather than picking
/// one silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlotBoundary {
    /// Offer every slot whose start is strictly before close
    /// (source-system behavior).
    #[default]
    ExcludeClose,
    /// Offer only slots where start + granularity fits within close.
    FitWithinClose,
}

/// Parsed `"H:MM AM - H:MM PM"` opening-hours range. Ranges that cross
/// midnight (close <= open) are not expressible in the source format
/// and are rejected outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpeningHours {
    pub open: NaiveTime,
    pub close: NaiveTime,
}

impl OpeningHours {
    pub fn parse(raw: &str) -> Result<Self, SlotError> {
        let (open_str, close_str) = raw
            .split_once(" - ")
            .ok_or_else(|| SlotError::InvalidConfiguration(format!("missing ' - ' in {raw:?}")))?;

        let open = parse_12h(open_str.trim())?;
        let close = parse_12h(close_str.trim())?;

        if close <= open {
            return Err(SlotError::InvalidConfiguration(format!(
                "range {raw:?} closes at or before it opens; midnight-crossing hours are not supported"
            )));
        }

        Ok(Self { open, close })
    }
}

/// Parses the `YYYY-MM-DD` date the client supplies when asking for a
/// day's slots.
pub fn parse_date(raw: &str) -> Result<NaiveDate, SlotError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| SlotError::InvalidInput("Invalid date format".into()))
}

fn parse_12h(raw: &str) -> Result<NaiveTime, SlotError> {
    let (time, meridiem) = raw
        .split_once(' ')
        .ok_or_else(|| SlotError::InvalidConfiguration(format!("missing AM/PM in {raw:?}")))?;

    let (hour_str, minute_str) = time
        .split_once(':')
        .ok_or_else(|| SlotError::InvalidConfiguration(format!("missing ':' in {raw:?}")))?;

    let hour: u32 = hour_str
        .parse()
        .map_err(|_| SlotError::InvalidConfiguration(format!("bad hour in {raw:?}")))?;
    let minute: u32 = minute_str
        .parse()
        .map_err(|_| SlotError::InvalidConfiguration(format!("bad minute in {raw:?}")))?;

    if !(1..=12).contains(&hour) || minute > 59 {
        return Err(SlotError::InvalidConfiguration(format!(
            "hour/minute out of range in {raw:?}"
        )));
    }

    let hour24 = match meridiem {
        "AM" => hour % 12,
        "PM" => hour % 12 + 12,
        other => {
            return Err(SlotError::InvalidConfiguration(format!(
                "expected AM or PM, got {other:?}"
            )))
        }
    };

    NaiveTime::from_hms_opt(hour24, minute, 0)
        .ok_or_else(|| SlotError::InvalidConfiguration(format!("invalid time {raw:?}")))
}

/// Ordered candidate start times for one day, every 30 minutes from
/// open. Pure function of the opening hours and the boundary rule.
pub fn generate_slots(hours: OpeningHours, boundary: SlotBoundary) -> Vec<NaiveTime> {
    let mut slots = Vec::new();
    let mut current = hours.open;

    loop {
        let keep = match boundary {
            SlotBoundary::ExcludeClose => current < hours.close,
            SlotBoundary::FitWithinClose => current + SLOT_GRANULARITY <= hours.close,
        };
        if !keep {
            break;
        }
        slots.push(current);

        let next = current + SLOT_GRANULARITY;
        // NaiveTime addition wraps at midnight; a wrapped value would
        // loop forever against a same-day close.
        if next <= current {
            break;
        }
        current = next;
    }

    slots
}

pub fn format_slot(slot: NaiveTime) -> String {
    format!("{:02}:{:02}", slot.hour(), slot.minute())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hours(raw: &str) -> OpeningHours {
        OpeningHours::parse(raw).unwrap()
    }

    #[test]
    fn parses_noon_to_ten_pm() {
        let h = hours("12:00 PM - 10:00 PM");
        assert_eq!(h.open, NaiveTime::from_hms_opt(12, 0, 0).unwrap());
        assert_eq!(h.close, NaiveTime::from_hms_opt(22, 0, 0).unwrap());
    }

    #[test]
    fn parses_midnight_open() {
        let h = hours("12:00 AM - 11:30 PM");
        assert_eq!(h.open, NaiveTime::from_hms_opt(0, 0, 0).unwrap());
        assert_eq!(h.close, NaiveTime::from_hms_opt(23, 30, 0).unwrap());
    }

    #[test]
    fn rejects_midnight_crossing_range() {
        assert!(OpeningHours::parse("6:00 PM - 2:00 AM").is_err());
    }

    #[test]
    fn rejects_malformed_ranges() {
        for raw in ["", "12:00 PM", "12:00 - 22:00", "13:00 PM - 10:00 PM", "12:00 XM - 10:00 PM"] {
            assert!(OpeningHours::parse(raw).is_err(), "accepted {raw:?}");
        }
    }

    // "12:00 PM - 10:30 PM": first slot 12:00, last slot 22:00 under
    // either boundary rule.
    #[test]
    fn slot_grid_for_half_hour_close() {
        for boundary in [SlotBoundary::ExcludeClose, SlotBoundary::FitWithinClose] {
            let slots = generate_slots(hours("12:00 PM - 10:30 PM"), boundary);
            assert_eq!(format_slot(slots[0]), "12:00");
            assert_eq!(format_slot(*slots.last().unwrap()), "22:00");
            assert_eq!(slots.len(), 21);
        }
    }

    // The rules only diverge when close is not on the slot grid.
    #[test]
    fn boundary_rules_diverge_off_grid() {
        let h = hours("12:00 PM - 10:45 PM");

        let loose = generate_slots(h, SlotBoundary::ExcludeClose);
        assert_eq!(format_slot(*loose.last().unwrap()), "22:30");

        let strict = generate_slots(h, SlotBoundary::FitWithinClose);
        assert_eq!(format_slot(*strict.last().unwrap()), "22:00");
    }

    // On-grid close: ExcludeClose stops at close - 30min, never at close.
    #[test]
    fn close_itself_is_never_offered() {
        let slots = generate_slots(hours("12:00 PM - 10:00 PM"), SlotBoundary::ExcludeClose);
        assert_eq!(format_slot(*slots.last().unwrap()), "21:30");
    }

    #[test]
    fn parses_iso_dates() {
        assert_eq!(
            parse_date("2026-09-01").unwrap(),
            NaiveDate::from_ymd_opt(2026, 9, 1).unwrap()
        );
    }

    #[test]
    fn bad_dates_are_an_input_error() {
        for raw in ["not-a-date", "2026-13-01", "01-09-2026", ""] {
            let err = parse_date(raw).unwrap_err();
            assert!(matches!(err, SlotError::InvalidInput(_)), "accepted {raw:?}");
            // Client mistakes surface as a 400, not a server error.
            assert!(matches!(
                AppError::from(err),
                AppError::ValidationError(_)
            ));
        }
    }

    #[test]
    fn slots_are_ordered_and_half_hourly() {
        let slots = generate_slots(hours("9:00 AM - 11:00 AM"), SlotBoundary::ExcludeClose);
        let formatted: Vec<String> = slots.into_iter().map(format_slot).collect();
        assert_eq!(formatted, ["09:00", "09:30", "10:00", "10:30"]);
    }
}

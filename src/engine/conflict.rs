use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use ulid::Ulid;

use crate::model::*;

use super::EngineError;

/// Returns the id of the first reservation whose window collides with `span`.
/// `windows` must be sorted by start.
pub(crate) fn check_no_conflict(windows: &[OccupiedWindow], span: &Span) -> Result<(), Ulid> {
    // Everything from right_bound on starts at or after span.end.
    let right_bound = windows.partition_point(|w| w.span.start < span.end);
    match windows[..right_bound].iter().find(|w| w.span.overlaps(span)) {
        Some(w) => Err(w.reservation_id),
        None => Ok(()),
    }
}

/// Input checks that need the table catalogue but never the reservation store.
pub(crate) fn validate_request(
    tables: &[Table],
    party_size: u32,
    date: NaiveDate,
    desired_time: Option<NaiveTime>,
    now: NaiveDateTime,
) -> Result<(), EngineError> {
    let max_capacity = tables.iter().map(|t| t.capacity).max().unwrap_or(0);
    if party_size < 1 || (!tables.is_empty() && party_size > max_capacity) {
        return Err(EngineError::InvalidPartySize { party_size, max_capacity });
    }
    if date < now.date() {
        return Err(EngineError::InvalidReservationWindow("date is in the past"));
    }
    if let Some(t) = desired_time {
        if date == now.date() && t < now.time() {
            return Err(EngineError::InvalidReservationWindow("time is in the past"));
        }
        let m = minute_of_day(t);
        if !tables.is_empty() && !tables.iter().any(|tb| tb.opening_hours().contains_instant(m)) {
            return Err(EngineError::InvalidReservationWindow(
                "time is outside every table's operating hours",
            ));
        }
    }
    Ok(())
}

pub(crate) fn validate_customer(customer: &CustomerInfo) -> Result<(), EngineError> {
    use crate::limits::*;
    if customer.contact_name.len() > MAX_CONTACT_NAME_LEN {
        return Err(EngineError::LimitExceeded("contact name too long"));
    }
    if customer.contact_phone.as_ref().is_some_and(|p| p.len() > MAX_CONTACT_PHONE_LEN) {
        return Err(EngineError::LimitExceeded("contact phone too long"));
    }
    Ok(())
}

/// First minute a walk-in on `date` may be seated: the next whole minute
/// today, or midnight for a later day (opening hours clamp it further).
pub(crate) fn earliest_start(date: NaiveDate, now: NaiveDateTime) -> Minute {
    if date > now.date() {
        return 0;
    }
    let t = now.time();
    let m = minute_of_day(t);
    if t.second() > 0 || t.nanosecond() > 0 { m + 1 } else { m }
}

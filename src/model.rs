use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Minutes since local midnight — the only time-of-day unit inside the engine.
/// Signed so that a buffer may reach back past midnight without wrapping.
pub type Minute = i32;

pub const MINUTES_PER_DAY: Minute = 24 * 60;

pub fn minute_of_day(t: NaiveTime) -> Minute {
    (t.hour() * 60 + t.minute()) as Minute
}

/// Inverse of [`minute_of_day`]. `None` outside `[0, 1440)`.
pub fn time_of_minute(m: Minute) -> Option<NaiveTime> {
    if !(0..MINUTES_PER_DAY).contains(&m) {
        return None;
    }
    NaiveTime::from_hms_opt((m / 60) as u32, (m % 60) as u32, 0)
}

/// Half-open interval `[start, end)` in minutes of a single day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: Minute,
    pub end: Minute,
}

impl Span {
    pub fn new(start: Minute, end: Minute) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration(&self) -> Minute {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_instant(&self, t: Minute) -> bool {
        self.start <= t && t < self.end
    }

    /// Returns true if `self` fully contains `other`.
    pub fn contains_span(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// A bookable dining table. Read-only to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub id: Ulid,
    #[serde(default)]
    pub name: Option<String>,
    /// Max seats.
    pub capacity: u32,
    #[serde(default = "default_min_capacity")]
    pub min_capacity: u32,
    pub optimal_capacity: u32,
    /// Lower is preferred.
    #[serde(default)]
    pub priority: i32,
    pub open_time: NaiveTime,
    pub close_time: NaiveTime,
    #[serde(default = "default_duration")]
    pub reservation_duration_minutes: u32,
    #[serde(default)]
    pub buffer_before_minutes: u32,
    #[serde(default)]
    pub buffer_after_minutes: u32,
}

fn default_min_capacity() -> u32 {
    1
}

fn default_duration() -> u32 {
    60
}

impl Table {
    /// `[open_time, close_time)` as minutes.
    pub fn opening_hours(&self) -> Span {
        Span::new(minute_of_day(self.open_time), minute_of_day(self.close_time))
    }

    /// Hard capacity bounds: `min_capacity <= party <= capacity`.
    pub fn seats(&self, party_size: u32) -> bool {
        self.min_capacity <= party_size && party_size <= self.capacity
    }

    pub fn fit_for(&self, party_size: u32) -> Fit {
        if party_size <= self.optimal_capacity {
            Fit::Optimal
        } else {
            Fit::Overflow
        }
    }

    /// Occupied window for a booking starting at `start`, buffers included.
    /// Saturates rather than wrapping on durations no valid table carries.
    pub fn window_at(&self, start: Minute) -> Span {
        let minutes = |m: u32| Minute::try_from(m).unwrap_or(Minute::MAX);
        Span::new(
            start.saturating_sub(minutes(self.buffer_before_minutes)),
            start
                .saturating_add(minutes(self.reservation_duration_minutes))
                .saturating_add(minutes(self.buffer_after_minutes)),
        )
    }

    /// Minutes one seating holds, buffers included.
    pub fn window_minutes(&self) -> u64 {
        u64::from(self.buffer_before_minutes)
            + u64::from(self.reservation_duration_minutes)
            + u64::from(self.buffer_after_minutes)
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.capacity == 0 {
            return Err("capacity must be at least 1");
        }
        if !(self.min_capacity <= self.optimal_capacity && self.optimal_capacity <= self.capacity) {
            return Err("expected min_capacity <= optimal_capacity <= capacity");
        }
        if self.open_time >= self.close_time {
            return Err("open_time must be before close_time");
        }
        if self.reservation_duration_minutes == 0 {
            return Err("reservation duration must be positive");
        }
        let open_minutes = minute_of_day(self.close_time) - minute_of_day(self.open_time);
        if self.window_minutes() > u64::try_from(open_minutes).unwrap_or(0) {
            return Err("seating window with buffers does not fit in opening hours");
        }
        Ok(())
    }
}

/// Whether a table is the right size for a party or merely large enough.
/// Ordered so that `Optimal` ranks first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Fit {
    Optimal,
    Overflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
    NoShow,
}

impl ReservationStatus {
    /// Statuses whose reservations hold their table's window.
    pub fn occupies(self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }

    pub fn is_terminal(self) -> bool {
        !self.occupies()
    }

    pub fn can_transition_to(self, next: ReservationStatus) -> bool {
        use ReservationStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, Cancelled)
                | (Confirmed, Completed)
                | (Confirmed, NoShow)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Cancelled => "CANCELLED",
            Self::Completed => "COMPLETED",
            Self::NoShow => "NO_SHOW",
        }
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who the booking is for. Customers themselves live outside the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerInfo {
    pub customer_id: Option<Ulid>,
    pub contact_name: String,
    pub contact_phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Ulid,
    pub table_id: Option<Ulid>,
    pub customer_id: Option<Ulid>,
    pub contact_name: String,
    pub contact_phone: Option<String>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub party_size: u32,
    pub status: ReservationStatus,
    /// Set once the party has arrived; checked-in reservations are never reclaimed.
    pub checked_in_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

impl Reservation {
    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }
}

/// Derived occupancy of a table by one reservation. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OccupiedWindow {
    pub reservation_id: Ulid,
    pub table_id: Ulid,
    pub date: NaiveDate,
    pub span: Span,
}

/// `[time - buffer_before, time + duration + buffer_after)` on the reservation's date.
pub fn window_for(reservation: &Reservation, table: &Table) -> OccupiedWindow {
    OccupiedWindow {
        reservation_id: reservation.id,
        table_id: reservation.table_id.unwrap_or(table.id),
        date: reservation.date,
        span: table.window_at(minute_of_day(reservation.time)),
    }
}

/// Windows held by the occupying reservations in `reservations`, sorted by start.
pub fn occupied_windows<'a>(
    reservations: impl IntoIterator<Item = &'a Reservation>,
    table: &Table,
) -> Vec<OccupiedWindow> {
    let mut windows: Vec<OccupiedWindow> = reservations
        .into_iter()
        .filter(|r| r.status.occupies())
        .map(|r| window_for(r, table))
        .collect();
    windows.sort_by_key(|w| (w.span.start, w.reservation_id));
    windows
}

/// One eligible table with the window it can grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSlot {
    pub table_id: Ulid,
    pub date: NaiveDate,
    /// Seating time the reservation would be booked at.
    pub time: NaiveTime,
    /// Occupied window the booking would hold, buffers included.
    pub window: Span,
    pub fit: Fit,
    /// `|optimal_capacity - party_size|`.
    pub gap: u32,
    pub priority: i32,
}

impl TableSlot {
    pub fn rank_key(&self) -> (Fit, u32, i32, Ulid) {
        (self.fit, self.gap, self.priority, self.table_id)
    }
}

/// The WAL record format — flat, no nesting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    TableSaved {
        table: Table,
    },
    TableRemoved {
        id: Ulid,
    },
    ReservationInserted {
        reservation: Reservation,
    },
    ReservationStatusChanged {
        id: Ulid,
        status: ReservationStatus,
    },
    ReservationCheckedIn {
        id: Ulid,
        at: NaiveDateTime,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    NoShow,
    Manual,
}

impl CancelReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoShow => "no_show",
            Self::Manual => "manual",
        }
    }
}

/// Events published to notification and loyalty collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DomainEvent {
    ReservationConfirmed {
        reservation_id: Ulid,
        table_id: Option<Ulid>,
        customer_id: Option<Ulid>,
        date: NaiveDate,
        time: NaiveTime,
        party_size: u32,
    },
    ReservationCancelled {
        reservation_id: Ulid,
        table_id: Option<Ulid>,
        reason: CancelReason,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn table() -> Table {
        Table {
            id: Ulid::new(),
            name: Some("T1".into()),
            capacity: 2,
            min_capacity: 1,
            optimal_capacity: 2,
            priority: 0,
            open_time: t(9, 0),
            close_time: t(23, 0),
            reservation_duration_minutes: 60,
            buffer_before_minutes: 5,
            buffer_after_minutes: 5,
        }
    }

    fn reservation_at(table: &Table, time: NaiveTime, status: ReservationStatus) -> Reservation {
        let date = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
        Reservation {
            id: Ulid::new(),
            table_id: Some(table.id),
            customer_id: None,
            contact_name: "Ada".into(),
            contact_phone: None,
            date,
            time,
            party_size: 2,
            status,
            checked_in_at: None,
            created_at: date.and_time(t(8, 0)),
        }
    }

    #[test]
    fn span_basics() {
        let s = Span::new(100, 200);
        assert_eq!(s.duration(), 100);
        assert!(s.contains_instant(100));
        assert!(s.contains_instant(199));
        assert!(!s.contains_instant(200)); // half-open
    }

    #[test]
    fn span_overlap() {
        let a = Span::new(100, 200);
        let b = Span::new(150, 250);
        let c = Span::new(200, 300);
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c)); // adjacent, not overlapping
        assert!(!c.overlaps(&a));
    }

    #[test]
    fn span_single_minute_overlap() {
        let a = Span::new(100, 201);
        let b = Span::new(200, 300);
        assert!(a.overlaps(&b));
    }

    #[test]
    fn span_contains_span() {
        let outer = Span::new(100, 400);
        let inner = Span::new(150, 300);
        let partial = Span::new(50, 200);
        assert!(outer.contains_span(&inner));
        assert!(outer.contains_span(&outer)); // self-containment
        assert!(!outer.contains_span(&partial));
    }

    #[test]
    fn minute_conversions() {
        assert_eq!(minute_of_day(t(13, 5)), 13 * 60 + 5);
        assert_eq!(time_of_minute(13 * 60 + 5), Some(t(13, 5)));
        assert_eq!(time_of_minute(-5), None);
        assert_eq!(time_of_minute(MINUTES_PER_DAY), None);
    }

    #[test]
    fn window_includes_buffers() {
        let tbl = table();
        let r = reservation_at(&tbl, t(13, 0), ReservationStatus::Confirmed);
        let w = window_for(&r, &tbl);
        assert_eq!(w.table_id, tbl.id);
        assert_eq!(w.span, Span::new(12 * 60 + 55, 14 * 60 + 5));
    }

    #[test]
    fn occupied_windows_skip_released_reservations() {
        let tbl = table();
        let rs = vec![
            reservation_at(&tbl, t(18, 0), ReservationStatus::Pending),
            reservation_at(&tbl, t(12, 0), ReservationStatus::Confirmed),
            reservation_at(&tbl, t(15, 0), ReservationStatus::Cancelled),
            reservation_at(&tbl, t(16, 0), ReservationStatus::Completed),
            reservation_at(&tbl, t(20, 0), ReservationStatus::NoShow),
        ];
        let windows = occupied_windows(&rs, &tbl);
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].span.start, 11 * 60 + 55);
        assert_eq!(windows[1].span.start, 17 * 60 + 55);
    }

    #[test]
    fn fit_classification() {
        let mut tbl = table();
        tbl.capacity = 6;
        tbl.optimal_capacity = 4;
        assert_eq!(tbl.fit_for(4), Fit::Optimal);
        assert_eq!(tbl.fit_for(5), Fit::Overflow);
        assert!(Fit::Optimal < Fit::Overflow);
        assert!(tbl.seats(6));
        assert!(!tbl.seats(7));
    }

    #[test]
    fn table_validation() {
        let mut tbl = table();
        assert!(tbl.validate().is_ok());
        tbl.optimal_capacity = 3;
        assert!(tbl.validate().is_err());
        let mut tbl = table();
        tbl.close_time = tbl.open_time;
        assert!(tbl.validate().is_err());
    }

    #[test]
    fn oversized_seating_window_rejected() {
        let mut tbl = table();
        tbl.reservation_duration_minutes = 3_000_000_000;
        assert!(tbl.validate().is_err());

        let mut tbl = table();
        tbl.buffer_after_minutes = u32::MAX;
        assert!(tbl.validate().is_err());

        // 14 hours open: 830 + 5 + 5 fits exactly, one more minute does not.
        let mut tbl = table();
        tbl.reservation_duration_minutes = 830;
        assert!(tbl.validate().is_ok());
        tbl.reservation_duration_minutes = 831;
        assert!(tbl.validate().is_err());
    }

    #[test]
    fn window_at_saturates_instead_of_wrapping() {
        let mut tbl = table();
        tbl.reservation_duration_minutes = 3_000_000_000;
        tbl.buffer_before_minutes = u32::MAX;
        let w = tbl.window_at(600);
        assert!(w.start < 0);
        assert_eq!(w.end, Minute::MAX);
        assert!(!tbl.opening_hours().contains_span(&w));
    }

    #[test]
    fn status_transitions() {
        use ReservationStatus::*;
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Confirmed.can_transition_to(Cancelled));
        assert!(Confirmed.can_transition_to(Completed));
        assert!(!Cancelled.can_transition_to(Confirmed));
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!Pending.can_transition_to(Completed));
        assert!(Pending.occupies() && Confirmed.occupies());
        assert!(Cancelled.is_terminal() && NoShow.is_terminal());
    }

    #[test]
    fn cancel_reason_wire_names() {
        let json = serde_json::to_string(&CancelReason::NoShow).unwrap();
        assert_eq!(json, "\"no_show\"");
        assert_eq!(CancelReason::Manual.as_str(), "manual");
    }

    #[test]
    fn table_catalogue_defaults() {
        let json = format!(
            r#"{{"id":"{}","capacity":4,"optimal_capacity":4,"open_time":"09:00:00","close_time":"23:00:00"}}"#,
            Ulid::new()
        );
        let tbl: Table = serde_json::from_str(&json).unwrap();
        assert_eq!(tbl.min_capacity, 1);
        assert_eq!(tbl.reservation_duration_minutes, 60);
        assert_eq!(tbl.buffer_before_minutes, 0);
        assert!(tbl.validate().is_ok());
    }

    #[test]
    fn event_serialization_roundtrip() {
        let tbl = table();
        let event = Event::ReservationInserted {
            reservation: reservation_at(&tbl, t(19, 30), ReservationStatus::Pending),
        };
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: Event = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
    }
}

use std::time::Instant;

use chrono::{Duration, NaiveDateTime};
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::model::*;
use crate::observability::*;

use super::{Engine, EngineError};

/// Outcome of one no-show scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReclaimReport {
    /// CONFIRMED reservations looked at.
    pub scanned: usize,
    /// Reservations cancelled as no-shows in this run.
    pub cancelled: Vec<Ulid>,
    /// Reservations that could not be cancelled, with the reason.
    pub failed: Vec<(Ulid, String)>,
}

impl ReclaimReport {
    pub fn is_quiet(&self) -> bool {
        self.cancelled.is_empty() && self.failed.is_empty()
    }
}

fn is_overdue(r: &Reservation, now: NaiveDateTime, grace: Duration) -> bool {
    r.status == ReservationStatus::Confirmed && r.checked_in_at.is_none() && now > r.starts_at() + grace
}

impl Engine {
    /// Cancel every CONFIRMED reservation whose party has not checked in by
    /// the booked time plus the grace period.
    ///
    /// Safe to run repeatedly. A failure on one reservation is recorded in the
    /// report and does not stop the rest of the batch; only a failure to list
    /// reservations at all is returned as an error.
    pub async fn reclaim_no_shows(&self) -> Result<ReclaimReport, EngineError> {
        let started = Instant::now();
        let now = self.clock.now();
        let grace = Duration::minutes(i64::from(self.config.grace_period_minutes));

        let confirmed = self.reservations.find_by_status(ReservationStatus::Confirmed).await?;
        let mut report = ReclaimReport { scanned: confirmed.len(), ..Default::default() };

        for r in confirmed.iter().filter(|r| is_overdue(r, now, grace)) {
            match self.reclaim_one(r.id, now, grace).await {
                Ok(true) => {
                    info!("reclaimed no-show {} on table {:?} ({} {})", r.id, r.table_id, r.date, r.time);
                    metrics::counter!(RECLAIMED_TOTAL).increment(1);
                    report.cancelled.push(r.id);
                }
                Ok(false) => debug!("reclaim skip {}: no longer overdue", r.id),
                Err(e) => {
                    warn!("reclaim of {} failed: {e}", r.id);
                    metrics::counter!(RECLAIM_FAILURES_TOTAL).increment(1);
                    report.failed.push((r.id, e.to_string()));
                }
            }
        }

        metrics::histogram!(RECLAIM_RUN_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        Ok(report)
    }

    /// Re-check one reservation under its table lock and cancel it.
    /// `Ok(false)` when someone else moved it first (checked in, cancelled, ...).
    async fn reclaim_one(&self, id: Ulid, now: NaiveDateTime, grace: Duration) -> Result<bool, EngineError> {
        let (lock, current) = self.lock_reservation(id).await?;
        if !is_overdue(&current, now, grace) {
            return Ok(false);
        }
        self.reservations.update_status(id, ReservationStatus::Cancelled).await?;
        drop(lock);
        self.notify.send(DomainEvent::ReservationCancelled {
            reservation_id: id,
            table_id: current.table_id,
            reason: CancelReason::NoShow,
        });
        Ok(true)
    }
}

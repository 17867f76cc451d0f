use std::collections::HashSet;
use std::time::Instant;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::model::*;
use crate::observability::*;

use super::conflict::{check_no_conflict, validate_customer, validate_request};
use super::{Engine, EngineError};

/// A request for a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationRequest {
    pub party_size: u32,
    pub date: NaiveDate,
    /// `None` for a walk-in: seat at the earliest free slot, confirmed at once.
    pub desired_time: Option<NaiveTime>,
    pub customer: CustomerInfo,
}

impl AllocationRequest {
    pub fn walk_in(party_size: u32, date: NaiveDate, customer: CustomerInfo) -> Self {
        Self { party_size, date, desired_time: None, customer }
    }

    pub fn booking(party_size: u32, date: NaiveDate, time: NaiveTime, customer: CustomerInfo) -> Self {
        Self { party_size, date, desired_time: Some(time), customer }
    }

    pub fn is_walk_in(&self) -> bool {
        self.desired_time.is_none()
    }
}

impl Engine {
    /// Find the best table for `request` and commit a reservation on it.
    ///
    /// Walk-ins (and bookings when `auto_confirm` is on) are born CONFIRMED;
    /// other bookings are PENDING until [`Engine::confirm`]. Exactly one
    /// reservation is written on success and none on failure.
    pub async fn allocate(&self, request: AllocationRequest) -> Result<Reservation, EngineError> {
        let started = Instant::now();
        let result = self.allocate_inner(&request).await;
        let outcome = match &result {
            Ok(_) => "allocated",
            Err(EngineError::NoTableAvailable) => "no_table",
            Err(e) if e.is_hard_failure() => "store_error",
            Err(_) => "rejected",
        };
        metrics::counter!(ALLOCATIONS_TOTAL, "outcome" => outcome).increment(1);
        metrics::histogram!(ALLOCATION_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        result
    }

    async fn allocate_inner(&self, request: &AllocationRequest) -> Result<Reservation, EngineError> {
        validate_customer(&request.customer)?;
        let now = self.clock.now();
        let tables = self.bookable_tables().await?;
        validate_request(&tables, request.party_size, request.date, request.desired_time, now)?;

        let deadline = tokio::time::Instant::now() + self.config.allocation_timeout;
        let mut excluded = HashSet::new();
        // Bounded by the length of the first candidate list.
        let mut attempts_left: Option<usize> = None;

        loop {
            let candidates = self
                .candidates_from(&tables, request.party_size, request.date, request.desired_time, now, &excluded)
                .await?;
            let budget = *attempts_left.get_or_insert(candidates.len());
            let Some(best) = candidates.into_iter().next().filter(|_| budget > 0) else {
                debug!(
                    "no table for party of {} on {} ({} table(s) lost to races)",
                    request.party_size,
                    request.date,
                    excluded.len()
                );
                return Err(EngineError::NoTableAvailable);
            };
            attempts_left = Some(budget - 1);

            let Some(table) = tables.iter().find(|t| t.id == best.table_id) else {
                return Err(EngineError::NotFound(best.table_id));
            };
            match self.commit(table, &best, request, now, deadline).await {
                Ok(reservation) => return Ok(reservation),
                Err(EngineError::ConcurrentAllocationConflict { table_id, holder }) => {
                    debug!("lost table {table_id} to reservation {holder}, trying next candidate");
                    metrics::counter!(ALLOCATION_RETRIES_TOTAL).increment(1);
                    excluded.insert(table_id);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Re-check `slot` under the table's lock and insert the reservation.
    async fn commit(
        &self,
        table: &Table,
        slot: &TableSlot,
        request: &AllocationRequest,
        now: NaiveDateTime,
        deadline: tokio::time::Instant,
    ) -> Result<Reservation, EngineError> {
        let lock = match tokio::time::timeout_at(
            deadline,
            self.reservations.lock_table_day(slot.table_id, slot.date),
        )
        .await
        {
            Ok(lock) => lock?,
            Err(_) => {
                warn!("allocation timed out waiting for table {} on {}", slot.table_id, slot.date);
                return Err(EngineError::NoTableAvailable);
            }
        };

        let existing = self.reservations.find_by_table_and_date(slot.table_id, slot.date).await?;
        let occupied = occupied_windows(&existing, table);
        if let Err(holder) = check_no_conflict(&occupied, &slot.window) {
            return Err(EngineError::ConcurrentAllocationConflict { table_id: slot.table_id, holder });
        }

        let status = if request.is_walk_in() || self.config.auto_confirm {
            ReservationStatus::Confirmed
        } else {
            ReservationStatus::Pending
        };
        let reservation = self
            .reservations
            .insert(Reservation {
                id: Ulid::new(),
                table_id: Some(slot.table_id),
                customer_id: request.customer.customer_id,
                contact_name: request.customer.contact_name.clone(),
                contact_phone: request.customer.contact_phone.clone(),
                date: slot.date,
                time: slot.time,
                party_size: request.party_size,
                status,
                checked_in_at: None,
                created_at: now,
            })
            .await?;
        drop(lock);

        info!(
            "reservation {} {} on table {} at {} {} for {}",
            reservation.id,
            reservation.status,
            slot.table_id,
            slot.date,
            slot.time,
            request.party_size
        );
        if reservation.status == ReservationStatus::Confirmed {
            self.notify.send(confirmed_event(&reservation));
        }
        Ok(reservation)
    }
}

pub(super) fn confirmed_event(r: &Reservation) -> DomainEvent {
    DomainEvent::ReservationConfirmed {
        reservation_id: r.id,
        table_id: r.table_id,
        customer_id: r.customer_id,
        date: r.date,
        time: r.time,
        party_size: r.party_size,
    }
}

use tracing::info;
use ulid::Ulid;

use crate::model::*;
use crate::store::TableDayLock;

use super::allocation::confirmed_event;
use super::{Engine, EngineError};

impl Engine {
    /// PENDING → CONFIRMED.
    pub async fn confirm(&self, id: Ulid) -> Result<Reservation, EngineError> {
        let updated = self.transition(id, ReservationStatus::Confirmed).await?;
        self.notify.send(confirmed_event(&updated));
        Ok(updated)
    }

    /// Manual cancellation of a PENDING or CONFIRMED reservation.
    pub async fn cancel(&self, id: Ulid) -> Result<Reservation, EngineError> {
        let updated = self.transition(id, ReservationStatus::Cancelled).await?;
        self.notify.send(DomainEvent::ReservationCancelled {
            reservation_id: id,
            table_id: updated.table_id,
            reason: CancelReason::Manual,
        });
        Ok(updated)
    }

    /// CONFIRMED → COMPLETED once service is over.
    pub async fn complete(&self, id: Ulid) -> Result<Reservation, EngineError> {
        self.transition(id, ReservationStatus::Completed).await
    }

    /// CONFIRMED → NO_SHOW, recorded by staff rather than the reclaimer.
    pub async fn mark_no_show(&self, id: Ulid) -> Result<Reservation, EngineError> {
        let updated = self.transition(id, ReservationStatus::NoShow).await?;
        self.notify.send(DomainEvent::ReservationCancelled {
            reservation_id: id,
            table_id: updated.table_id,
            reason: CancelReason::NoShow,
        });
        Ok(updated)
    }

    /// Record the party's arrival. Checked-in reservations are never reclaimed.
    /// Checking in twice keeps the first arrival time.
    pub async fn check_in(&self, id: Ulid) -> Result<Reservation, EngineError> {
        let (_lock, current) = self.lock_reservation(id).await?;
        if current.status != ReservationStatus::Confirmed {
            return Err(EngineError::NotConfirmed { id, status: current.status });
        }
        if current.checked_in_at.is_some() {
            return Ok(current);
        }
        let at = self.clock.now();
        self.reservations.mark_checked_in(id, at).await?;
        info!("reservation {id} checked in at {at}");
        Ok(Reservation { checked_in_at: Some(at), ..current })
    }

    async fn transition(&self, id: Ulid, to: ReservationStatus) -> Result<Reservation, EngineError> {
        let (_lock, current) = self.lock_reservation(id).await?;
        if !current.status.can_transition_to(to) {
            return Err(EngineError::InvalidTransition { id, from: current.status, to });
        }
        self.reservations.update_status(id, to).await?;
        info!("reservation {id} {} -> {to}", current.status);
        Ok(Reservation { status: to, ..current })
    }

    /// Lock the reservation's table for its date, then read the reservation
    /// fresh under that lock.
    pub(super) async fn lock_reservation(
        &self,
        id: Ulid,
    ) -> Result<(Option<TableDayLock>, Reservation), EngineError> {
        let found = self.reservations.get(id).await?.ok_or(EngineError::NotFound(id))?;
        let lock = match found.table_id {
            Some(table_id) => Some(self.lock_for_update(table_id, found.date).await?),
            None => None,
        };
        let current = self.reservations.get(id).await?.ok_or(EngineError::NotFound(id))?;
        Ok((lock, current))
    }
}

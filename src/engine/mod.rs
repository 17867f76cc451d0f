mod allocation;
mod availability;
mod conflict;
mod error;
mod lifecycle;
mod queries;
mod reclaim;

pub use allocation::AllocationRequest;
pub use availability::{free_windows, merge_overlapping, rank_slots, slot_for_table, subtract_intervals, SlotQuery};
pub use error::EngineError;
pub use reclaim::ReclaimReport;

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use ulid::Ulid;

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::notify::NotifyHub;
use crate::store::{ReservationStore, TableDayLock, TableStore};

/// The table and time-slot allocation engine.
///
/// Holds no booking state of its own: occupancy is always derived from the
/// reservation store, and the store's per-table-per-date lock is what keeps
/// two callers from committing colliding windows.
pub struct Engine {
    pub(super) tables: Arc<dyn TableStore>,
    pub(super) reservations: Arc<dyn ReservationStore>,
    pub(super) clock: Arc<dyn Clock>,
    pub notify: Arc<NotifyHub>,
    pub(super) config: EngineConfig,
}

impl Engine {
    pub fn new(
        tables: Arc<dyn TableStore>,
        reservations: Arc<dyn ReservationStore>,
        clock: Arc<dyn Clock>,
        notify: Arc<NotifyHub>,
        config: EngineConfig,
    ) -> Self {
        Self {
            tables,
            reservations,
            clock,
            notify,
            config,
        }
    }

    /// Build an engine over one store that serves both tables and reservations.
    pub fn with_store<S>(store: Arc<S>, clock: Arc<dyn Clock>, notify: Arc<NotifyHub>, config: EngineConfig) -> Self
    where
        S: TableStore + ReservationStore + 'static,
    {
        Self::new(store.clone(), store, clock, notify, config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    /// Table lock for status writes, bounded by `lock_timeout`.
    pub(super) async fn lock_for_update(&self, table_id: Ulid, date: NaiveDate) -> Result<TableDayLock, EngineError> {
        match tokio::time::timeout(self.config.lock_timeout, self.reservations.lock_table_day(table_id, date)).await {
            Ok(lock) => Ok(lock?),
            Err(_) => Err(EngineError::LockTimeout { table_id }),
        }
    }
}

use std::io;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::wal::{wal_writer_loop, Wal, WalCommand};

use super::{ReservationStore, StoreError, TableDayLock, TableStore};

type DayKey = (Ulid, NaiveDate);

/// In-memory table and reservation store, made durable by a write-ahead log.
///
/// Every mutation is appended to the WAL first and applied to memory only
/// once the group-commit writer has fsynced it.
pub struct MemoryStore {
    tables: DashMap<Ulid, Table>,
    reservations: DashMap<Ulid, Reservation>,
    /// (table, date) → reservation ids on that table that day.
    by_table_day: DashMap<DayKey, Vec<Ulid>>,
    day_locks: DashMap<DayKey, Arc<Mutex<()>>>,
    wal_tx: mpsc::Sender<WalCommand>,
    /// Shared by writers, exclusive for compaction, so a compaction snapshot
    /// never misses a write that has already reached the log.
    write_gate: RwLock<()>,
}

impl MemoryStore {
    /// Replay `wal_path` (if present), cut off any torn tail, and start the
    /// WAL writer task. Must be called from inside a tokio runtime.
    pub fn open(wal_path: &Path) -> io::Result<Self> {
        let (wal, events) = Wal::recover(wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let store = Self {
            tables: DashMap::new(),
            reservations: DashMap::new(),
            by_table_day: DashMap::new(),
            day_locks: DashMap::new(),
            wal_tx,
            write_gate: RwLock::new(()),
        };
        for event in &events {
            store.apply(event);
        }
        tracing::debug!(
            "store opened from {}: {} event(s), {} table(s), {} reservation(s)",
            wal_path.display(),
            events.len(),
            store.tables.len(),
            store.reservations.len()
        );
        Ok(store)
    }

    fn apply(&self, event: &Event) {
        match event {
            Event::TableSaved { table } => {
                self.tables.insert(table.id, table.clone());
            }
            Event::TableRemoved { id } => {
                self.tables.remove(id);
            }
            Event::ReservationInserted { reservation } => {
                if let Some(table_id) = reservation.table_id {
                    self.by_table_day
                        .entry((table_id, reservation.date))
                        .or_default()
                        .push(reservation.id);
                }
                self.reservations.insert(reservation.id, reservation.clone());
            }
            Event::ReservationStatusChanged { id, status } => {
                if let Some(mut r) = self.reservations.get_mut(id) {
                    r.status = *status;
                }
            }
            Event::ReservationCheckedIn { id, at } => {
                if let Some(mut r) = self.reservations.get_mut(id) {
                    r.checked_in_at = Some(*at);
                }
            }
        }
    }

    async fn wal_send(&self, cmd: WalCommand) -> Result<(), StoreError> {
        self.wal_tx
            .send(cmd)
            .await
            .map_err(|_| StoreError::Unavailable("WAL writer shut down".into()))
    }

    /// WAL-append then apply, under the shared write gate.
    async fn persist_and_apply(&self, event: Event) -> Result<(), StoreError> {
        let _gate = self.write_gate.read().await;
        let (tx, rx) = oneshot::channel();
        self.wal_send(WalCommand::Append { event: event.clone(), response: tx })
            .await?;
        rx.await
            .map_err(|_| StoreError::Unavailable("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        self.apply(&event);
        Ok(())
    }

    // ── Catalogue administration ─────────────────────────────

    /// Insert or replace a table. Used to seed the catalogue.
    pub async fn save_table(&self, table: Table) -> Result<(), StoreError> {
        table.validate().map_err(StoreError::Invalid)?;
        if table.name.as_ref().is_some_and(|n| n.len() > MAX_TABLE_NAME_LEN) {
            return Err(StoreError::LimitExceeded("table name too long"));
        }
        if !self.tables.contains_key(&table.id) && self.tables.len() >= MAX_TABLES {
            return Err(StoreError::LimitExceeded("too many tables"));
        }
        self.persist_and_apply(Event::TableSaved { table }).await
    }

    pub async fn remove_table(&self, id: Ulid) -> Result<(), StoreError> {
        if !self.tables.contains_key(&id) {
            return Err(StoreError::NotFound(id));
        }
        self.persist_and_apply(Event::TableRemoved { id }).await
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    pub fn reservation_count(&self) -> usize {
        self.reservations.len()
    }

    // ── Compaction ───────────────────────────────────────────

    /// Rewrite the WAL as the minimal event list that recreates current state.
    pub async fn compact(&self) -> Result<(), StoreError> {
        let _gate = self.write_gate.write().await;

        let mut tables: Vec<Table> = self.tables.iter().map(|e| e.value().clone()).collect();
        tables.sort_by_key(|t| t.id);
        let mut reservations: Vec<Reservation> =
            self.reservations.iter().map(|e| e.value().clone()).collect();
        reservations.sort_by_key(|r| r.id);

        let events: Vec<Event> = tables
            .into_iter()
            .map(|table| Event::TableSaved { table })
            .chain(
                reservations
                    .into_iter()
                    .map(|reservation| Event::ReservationInserted { reservation }),
            )
            .collect();

        let (tx, rx) = oneshot::channel();
        self.wal_send(WalCommand::Rewrite { events, response: tx }).await?;
        rx.await
            .map_err(|_| StoreError::Unavailable("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self.wal_send(WalCommand::AppendsSinceCompact { response: tx }).await.is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

#[async_trait]
impl TableStore for MemoryStore {
    async fn list_tables(&self) -> Result<Vec<Table>, StoreError> {
        let mut tables: Vec<Table> = self.tables.iter().map(|e| e.value().clone()).collect();
        tables.sort_by_key(|t| t.id);
        Ok(tables)
    }

    async fn get_table(&self, id: Ulid) -> Result<Option<Table>, StoreError> {
        Ok(self.tables.get(&id).map(|e| e.value().clone()))
    }
}

#[async_trait]
impl ReservationStore for MemoryStore {
    async fn find_by_table_and_date(
        &self,
        table_id: Ulid,
        date: NaiveDate,
    ) -> Result<Vec<Reservation>, StoreError> {
        let ids = self
            .by_table_day
            .get(&(table_id, date))
            .map(|e| e.value().clone())
            .unwrap_or_default();
        let mut found: Vec<Reservation> = ids
            .iter()
            .filter_map(|id| self.reservations.get(id).map(|r| r.value().clone()))
            .collect();
        found.sort_by_key(|r| (r.time, r.id));
        Ok(found)
    }

    async fn find_by_status(&self, status: ReservationStatus) -> Result<Vec<Reservation>, StoreError> {
        let mut found: Vec<Reservation> = self
            .reservations
            .iter()
            .filter(|e| e.value().status == status)
            .map(|e| e.value().clone())
            .collect();
        found.sort_by_key(|r| (r.date, r.time, r.id));
        Ok(found)
    }

    async fn get(&self, id: Ulid) -> Result<Option<Reservation>, StoreError> {
        Ok(self.reservations.get(&id).map(|e| e.value().clone()))
    }

    async fn insert(&self, reservation: Reservation) -> Result<Reservation, StoreError> {
        if self.reservations.contains_key(&reservation.id) {
            return Err(StoreError::AlreadyExists(reservation.id));
        }
        if let Some(table_id) = reservation.table_id
            && self
                .by_table_day
                .get(&(table_id, reservation.date))
                .is_some_and(|ids| ids.len() >= MAX_RESERVATIONS_PER_TABLE_DAY)
        {
            return Err(StoreError::LimitExceeded("too many reservations on table for date"));
        }
        self.persist_and_apply(Event::ReservationInserted { reservation: reservation.clone() })
            .await?;
        Ok(reservation)
    }

    async fn update_status(&self, id: Ulid, status: ReservationStatus) -> Result<(), StoreError> {
        if !self.reservations.contains_key(&id) {
            return Err(StoreError::NotFound(id));
        }
        self.persist_and_apply(Event::ReservationStatusChanged { id, status }).await
    }

    async fn mark_checked_in(&self, id: Ulid, at: NaiveDateTime) -> Result<(), StoreError> {
        if !self.reservations.contains_key(&id) {
            return Err(StoreError::NotFound(id));
        }
        self.persist_and_apply(Event::ReservationCheckedIn { id, at }).await
    }

    async fn lock_table_day(&self, table_id: Ulid, date: NaiveDate) -> Result<TableDayLock, StoreError> {
        let lock = self
            .day_locks
            .entry((table_id, date))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock_owned().await;
        Ok(TableDayLock::new(table_id, date, guard))
    }
}

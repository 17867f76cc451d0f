mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use ulid::Ulid;

use crate::model::{Reservation, ReservationStatus, Table};

#[derive(Debug)]
pub enum StoreError {
    NotFound(Ulid),
    AlreadyExists(Ulid),
    Invalid(&'static str),
    LimitExceeded(&'static str),
    /// The backing store could not be reached or failed to persist.
    Unavailable(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound(id) => write!(f, "not found: {id}"),
            StoreError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            StoreError::Invalid(msg) => write!(f, "invalid record: {msg}"),
            StoreError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            StoreError::Unavailable(e) => write!(f, "store unavailable: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Exclusive hold on one table for one date. Dropping it releases the table.
///
/// Every write that changes what a table holds on a date (inserting a
/// reservation, moving its status, checking it in) happens while one of
/// these is alive.
pub struct TableDayLock {
    table_id: Ulid,
    date: NaiveDate,
    _guard: Box<dyn Send + Sync>,
}

impl TableDayLock {
    pub fn new(table_id: Ulid, date: NaiveDate, guard: impl Send + Sync + 'static) -> Self {
        Self {
            table_id,
            date,
            _guard: Box::new(guard),
        }
    }

    pub fn table_id(&self) -> Ulid {
        self.table_id
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }
}

impl std::fmt::Debug for TableDayLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableDayLock")
            .field("table_id", &self.table_id)
            .field("date", &self.date)
            .finish_non_exhaustive()
    }
}

/// Read side of the table catalogue.
#[async_trait]
pub trait TableStore: Send + Sync {
    async fn list_tables(&self) -> Result<Vec<Table>, StoreError>;
    async fn get_table(&self, id: Ulid) -> Result<Option<Table>, StoreError>;
}

#[async_trait]
pub trait ReservationStore: Send + Sync {
    async fn find_by_table_and_date(
        &self,
        table_id: Ulid,
        date: NaiveDate,
    ) -> Result<Vec<Reservation>, StoreError>;

    async fn find_by_status(&self, status: ReservationStatus) -> Result<Vec<Reservation>, StoreError>;

    async fn get(&self, id: Ulid) -> Result<Option<Reservation>, StoreError>;

    /// Persist a new reservation. Fails with `AlreadyExists` on a duplicate id.
    async fn insert(&self, reservation: Reservation) -> Result<Reservation, StoreError>;

    async fn update_status(&self, id: Ulid, status: ReservationStatus) -> Result<(), StoreError>;

    async fn mark_checked_in(&self, id: Ulid, at: NaiveDateTime) -> Result<(), StoreError>;

    /// Wait for exclusive access to `table_id` on `date`.
    async fn lock_table_day(&self, table_id: Ulid, date: NaiveDate) -> Result<TableDayLock, StoreError>;
}

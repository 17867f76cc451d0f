use ulid::Ulid;

use crate::model::ReservationStatus;
use crate::store::StoreError;

#[derive(Debug)]
pub enum EngineError {
    /// Party smaller than one or larger than every table.
    InvalidPartySize { party_size: u32, max_capacity: u32 },
    InvalidReservationWindow(&'static str),
    /// Nothing can seat the party. A normal outcome, not a fault.
    NoTableAvailable,
    /// Lost a commit race on a table. Retried inside `allocate`, never returned by it.
    ConcurrentAllocationConflict { table_id: Ulid, holder: Ulid },
    /// Store failure. Not retried by the engine.
    StoreUnavailable(String),
    NotFound(Ulid),
    InvalidTransition {
        id: Ulid,
        from: ReservationStatus,
        to: ReservationStatus,
    },
    /// Check-in needs a CONFIRMED reservation.
    NotConfirmed { id: Ulid, status: ReservationStatus },
    LockTimeout { table_id: Ulid },
    LimitExceeded(&'static str),
}

impl EngineError {
    /// True for failures the caller may want to retry or alert on, as opposed
    /// to ordinary "no" answers.
    pub fn is_hard_failure(&self) -> bool {
        matches!(self, EngineError::StoreUnavailable(_))
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidPartySize { party_size, max_capacity } => write!(
                f,
                "invalid party size {party_size}: must be between 1 and {max_capacity}"
            ),
            EngineError::InvalidReservationWindow(why) => {
                write!(f, "invalid reservation window: {why}")
            }
            EngineError::NoTableAvailable => write!(f, "no table available"),
            EngineError::ConcurrentAllocationConflict { table_id, holder } => write!(
                f,
                "table {table_id} was taken concurrently by reservation {holder}"
            ),
            EngineError::StoreUnavailable(e) => write!(f, "store unavailable: {e}"),
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::InvalidTransition { id, from, to } => {
                write!(f, "reservation {id} cannot move from {from} to {to}")
            }
            EngineError::NotConfirmed { id, status } => {
                write!(f, "reservation {id} is {status}, not CONFIRMED")
            }
            EngineError::LockTimeout { table_id } => {
                write!(f, "timed out waiting for table {table_id}")
            }
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => EngineError::NotFound(id),
            StoreError::LimitExceeded(msg) => EngineError::LimitExceeded(msg),
            other => EngineError::StoreUnavailable(other.to_string()),
        }
    }
}

//! Table and time-slot allocation for a restaurant: finds a table that can
//! seat a party at a time, commits the booking without ever double-booking a
//! window, and reclaims tables from parties that never show up.

pub mod clock;
pub mod config;
pub mod engine;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod reclaimer;
pub mod store;
pub mod wal;

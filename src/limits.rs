// Hard input limits. Anything past these is rejected with `LimitExceeded`.

pub const MAX_TABLES: usize = 1_000;
pub const MAX_TABLE_NAME_LEN: usize = 128;
pub const MAX_CONTACT_NAME_LEN: usize = 256;
pub const MAX_CONTACT_PHONE_LEN: usize = 32;
/// Upper bound on reservations kept per table per day.
pub const MAX_RESERVATIONS_PER_TABLE_DAY: usize = 512;
/// Walk-in scans never step more often than this.
pub const MIN_SLOT_STEP_MINUTES: u32 = 1;

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Tunables the engine itself reads.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Walk-in scan increment.
    pub slot_step_minutes: u32,
    /// How long after the booked time a CONFIRMED reservation may go unclaimed.
    pub grace_period_minutes: u32,
    /// Upper bound on one `allocate` call, lock waits included.
    pub allocation_timeout: Duration,
    /// Upper bound on one lock wait inside the reclaimer and status updates.
    pub lock_timeout: Duration,
    /// Confirm advance bookings immediately instead of leaving them PENDING.
    pub auto_confirm: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            slot_step_minutes: 15,
            grace_period_minutes: 15,
            allocation_timeout: Duration::from_secs(2),
            lock_timeout: Duration::from_secs(1),
            auto_confirm: false,
        }
    }
}

/// Process configuration, read from `SEATWISE_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    /// Optional JSON file with the table catalogue to seed on startup.
    pub tables_file: Option<PathBuf>,
    pub reclaim_interval: Duration,
    pub compact_threshold: u64,
    pub metrics_port: Option<u16>,
    pub engine: EngineConfig,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = EngineConfig::default();
        let engine = EngineConfig {
            slot_step_minutes: env_or("SEATWISE_SLOT_STEP_MINUTES", defaults.slot_step_minutes)
                .max(crate::limits::MIN_SLOT_STEP_MINUTES),
            grace_period_minutes: env_or("SEATWISE_GRACE_MINUTES", defaults.grace_period_minutes),
            allocation_timeout: Duration::from_millis(env_or("SEATWISE_ALLOCATION_TIMEOUT_MS", 2_000)),
            lock_timeout: Duration::from_millis(env_or("SEATWISE_LOCK_TIMEOUT_MS", 1_000)),
            auto_confirm: env_or("SEATWISE_AUTO_CONFIRM", defaults.auto_confirm),
        };
        Self {
            data_dir: PathBuf::from(
                std::env::var("SEATWISE_DATA_DIR").unwrap_or_else(|_| "./data".into()),
            ),
            tables_file: std::env::var("SEATWISE_TABLES").ok().map(PathBuf::from),
            reclaim_interval: Duration::from_secs(env_or("SEATWISE_RECLAIM_INTERVAL_SECS", 300)),
            compact_threshold: env_or("SEATWISE_COMPACT_THRESHOLD", 1_000),
            metrics_port: std::env::var("SEATWISE_METRICS_PORT")
                .ok()
                .and_then(|s| s.parse().ok()),
            engine,
        }
    }
}

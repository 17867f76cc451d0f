use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::Engine;
use crate::store::MemoryStore;

/// Periodically cancel no-show reservations until `shutdown` fires.
/// The first scan runs immediately.
pub async fn run_reclaimer(engine: Arc<Engine>, every: Duration, shutdown: CancellationToken) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {}
        }
        match engine.reclaim_no_shows().await {
            Ok(report) if report.is_quiet() => debug!("reclaim: {} confirmed, nothing overdue", report.scanned),
            Ok(report) => info!(
                "reclaim: {} cancelled, {} failed of {} confirmed",
                report.cancelled.len(),
                report.failed.len(),
                report.scanned
            ),
            Err(e) => warn!("reclaim scan failed: {e}"),
        }
    }
    debug!("reclaimer stopped");
}

/// Periodically compact the store's WAL once `threshold` appends have piled up.
pub async fn run_compactor(store: Arc<MemoryStore>, threshold: u64, every: Duration, shutdown: CancellationToken) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {}
        }
        let appends = store.wal_appends_since_compact().await;
        if appends < threshold {
            continue;
        }
        match store.compact().await {
            Ok(()) => {
                metrics::counter!(crate::observability::WAL_COMPACTIONS_TOTAL).increment(1);
                info!("compacted WAL after {appends} appends");
            }
            Err(e) => warn!("WAL compaction failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::EngineConfig;
    use crate::model::*;
    use crate::notify::NotifyHub;
    use crate::store::ReservationStore;
    use chrono::{NaiveDate, NaiveTime};
    use std::path::PathBuf;
    use ulid::Ulid;

    fn test_wal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("seatwise_test_reclaimer");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    #[tokio::test]
    async fn reclaimer_task_cancels_overdue_and_stops() {
        let store = Arc::new(MemoryStore::open(&test_wal_path("reclaimer_task.wal")).unwrap());
        let date = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
        let noon = NaiveTime::from_hms_opt(12, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(date.and_hms_opt(12, 16, 0).unwrap()));
        let notify = Arc::new(NotifyHub::new());
        let engine = Arc::new(Engine::with_store(store.clone(), clock, notify.clone(), EngineConfig::default()));

        let id = Ulid::new();
        store
            .insert(Reservation {
                id,
                table_id: None,
                customer_id: None,
                contact_name: "Late".into(),
                contact_phone: None,
                date,
                time: noon,
                party_size: 2,
                status: ReservationStatus::Confirmed,
                checked_in_at: None,
                created_at: date.and_hms_opt(9, 0, 0).unwrap(),
            })
            .await
            .unwrap();

        let mut events = notify.subscribe();
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(run_reclaimer(engine, Duration::from_millis(10), shutdown.clone()));

        let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            event,
            DomainEvent::ReservationCancelled { reservation_id: id, table_id: None, reason: CancelReason::NoShow }
        );
        assert_eq!(store.get(id).await.unwrap().unwrap().status, ReservationStatus::Cancelled);

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn compactor_rewrites_past_threshold() {
        let store = Arc::new(MemoryStore::open(&test_wal_path("compactor.wal")).unwrap());
        let table = Table {
            id: Ulid::new(),
            name: None,
            capacity: 2,
            min_capacity: 1,
            optimal_capacity: 2,
            priority: 0,
            open_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            close_time: NaiveTime::from_hms_opt(23, 0, 0).unwrap(),
            reservation_duration_minutes: 60,
            buffer_before_minutes: 0,
            buffer_after_minutes: 0,
        };
        for _ in 0..5 {
            store.save_table(table.clone()).await.unwrap();
        }

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(run_compactor(store.clone(), 3, Duration::from_millis(10), shutdown.clone()));

        let mut compacted = false;
        for _ in 0..200 {
            if store.wal_appends_since_compact().await == 0 {
                compacted = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        shutdown.cancel();
        task.await.unwrap();

        assert!(compacted, "compactor never ran");
        assert_eq!(store.table_count(), 1);
    }
}

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::info;

use seatwise::clock::SystemClock;
use seatwise::config::Config;
use seatwise::engine::Engine;
use seatwise::model::Table;
use seatwise::notify::NotifyHub;
use seatwise::reclaimer;
use seatwise::store::MemoryStore;

const COMPACT_CHECK_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env();
    seatwise::observability::init(config.metrics_port)?;

    std::fs::create_dir_all(&config.data_dir)?;
    let store = Arc::new(MemoryStore::open(&config.data_dir.join("seatwise.wal"))?);

    if let Some(path) = &config.tables_file {
        let tables: Vec<Table> = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        for table in tables {
            store.save_table(table).await?;
        }
        info!("seeded tables from {}", path.display());
    }

    let notify = Arc::new(NotifyHub::new());
    let engine = Arc::new(Engine::with_store(
        store.clone(),
        Arc::new(SystemClock),
        notify.clone(),
        config.engine.clone(),
    ));

    info!("seatwise started");
    info!("  data_dir: {}", config.data_dir.display());
    info!("  tables: {}", store.table_count());
    info!("  reservations: {}", store.reservation_count());
    info!("  grace period: {} min", config.engine.grace_period_minutes);
    info!("  reclaim every: {:?}", config.reclaim_interval);
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    let shutdown = CancellationToken::new();
    let reclaim_task = tokio::spawn(reclaimer::run_reclaimer(
        engine.clone(),
        config.reclaim_interval,
        shutdown.clone(),
    ));
    let compact_task = tokio::spawn(reclaimer::run_compactor(
        store.clone(),
        config.compact_threshold,
        COMPACT_CHECK_INTERVAL,
        shutdown.clone(),
    ));

    // Log domain events until collaborators are wired in.
    let mut events = notify.subscribe();
    let event_log = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => info!("event: {}", serde_json::to_string(&event).unwrap_or_default()),
                Err(RecvError::Lagged(n)) => tracing::warn!("event log skipped {n} event(s)"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await?;
    }

    info!("shutdown signal received");
    shutdown.cancel();
    let _ = tokio::join!(reclaim_task, compact_task);
    event_log.abort();

    store.compact().await?;
    info!("seatwise stopped");
    Ok(())
}

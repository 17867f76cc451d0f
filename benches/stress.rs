use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{NaiveDate, NaiveTime};
use ulid::Ulid;

use seatwise::clock::ManualClock;
use seatwise::config::EngineConfig;
use seatwise::engine::{AllocationRequest, Engine, EngineError};
use seatwise::model::{CustomerInfo, Table};
use seatwise::notify::NotifyHub;
use seatwise::store::MemoryStore;

const DAYS: u32 = 30;

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    if latencies.is_empty() {
        println!("  {label}: no samples");
        return;
    }
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.2}ms, p50={:.2}ms, p95={:.2}ms, p99={:.2}ms, max={:.2}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies.last().map_or(0.0, |d| d.as_secs_f64() * 1000.0),
    );
}

fn first_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 1, 1).unwrap()
}

fn guest() -> CustomerInfo {
    CustomerInfo { customer_id: Some(Ulid::new()), contact_name: "bench".into(), contact_phone: None }
}

async fn setup(name: &str) -> (Arc<MemoryStore>, Arc<Engine>) {
    let dir = std::env::temp_dir().join(format!("seatwise_bench_{name}_{}", Ulid::new()));
    std::fs::create_dir_all(&dir).unwrap();
    let store = Arc::new(MemoryStore::open(&dir.join("seatwise.wal")).unwrap());

    let capacities = [(2, 2), (2, 2), (2, 2), (4, 4), (4, 4), (4, 3), (6, 6), (6, 5), (8, 8), (10, 8)];
    for (i, &(capacity, optimal)) in capacities.iter().enumerate() {
        store
            .save_table(Table {
                id: Ulid::new(),
                name: Some(format!("T{}", i + 1)),
                capacity,
                min_capacity: 1,
                optimal_capacity: optimal,
                priority: 0,
                open_time: NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
                close_time: NaiveTime::from_hms_opt(23, 0, 0).unwrap(),
                reservation_duration_minutes: 90,
                buffer_before_minutes: 10,
                buffer_after_minutes: 10,
            })
            .await
            .unwrap();
    }
    println!("  created {} tables", capacities.len());

    let clock = Arc::new(ManualClock::new(first_day().pred_opt().unwrap().and_hms_opt(9, 0, 0).unwrap()));
    let engine = Arc::new(Engine::with_store(
        store.clone(),
        clock,
        Arc::new(NotifyHub::new()),
        EngineConfig::default(),
    ));
    (store, engine)
}

fn slot(i: u32) -> (NaiveDate, NaiveTime) {
    let day = first_day() + chrono::Duration::days(i64::from(i % DAYS));
    let minute = 11 * 60 + 10 + (i / DAYS % 40) * 15;
    let time = NaiveTime::from_hms_opt(minute / 60, minute % 60, 0).unwrap();
    (day, time)
}

async fn phase1_sequential() {
    let (_store, engine) = setup("sequential").await;
    let n = 2000;
    let mut latencies = Vec::with_capacity(n as usize);
    let mut granted = 0;
    let start = Instant::now();

    for i in 0..n {
        let (day, time) = slot(i);
        let t = Instant::now();
        if engine.allocate(AllocationRequest::booking(2, day, time, guest())).await.is_ok() {
            granted += 1;
        }
        latencies.push(t.elapsed());
    }

    let elapsed = start.elapsed();
    let ops = f64::from(n) / elapsed.as_secs_f64();
    println!("  {n} requests ({granted} granted) in {:.2}s = {ops:.0} ops/sec", elapsed.as_secs_f64());
    print_latency("allocate latency", &mut latencies);
}

async fn phase2_contended() {
    let (store, engine) = setup("contended").await;
    let n_tasks = 16;
    let n_per_task = 200;

    let start = Instant::now();
    let mut handles = Vec::new();
    for task in 0..n_tasks {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            let mut latencies = Vec::with_capacity(n_per_task);
            let mut outcomes = (0usize, 0usize);
            for j in 0..n_per_task as u32 {
                // Every task walks the same slots, so most requests collide.
                let (day, time) = slot(j * 7 + task % 3);
                let party = 1 + (j + task) % 6;
                let t = Instant::now();
                match engine.allocate(AllocationRequest::booking(party, day, time, guest())).await {
                    Ok(_) => outcomes.0 += 1,
                    Err(EngineError::NoTableAvailable) => outcomes.1 += 1,
                    Err(e) => eprintln!("allocate failed: {e}"),
                }
                latencies.push(t.elapsed());
            }
            (latencies, outcomes)
        }));
    }

    let mut all_latencies = Vec::new();
    let (mut granted, mut refused) = (0, 0);
    for h in handles {
        let (latencies, (ok, no)) = h.await.unwrap();
        all_latencies.extend(latencies);
        granted += ok;
        refused += no;
    }

    let elapsed = start.elapsed();
    let total = n_tasks as usize * n_per_task;
    println!(
        "  {n_tasks} tasks x {n_per_task} requests = {total} in {:.2}s = {:.0} ops/sec \
         ({granted} granted, {refused} refused)",
        elapsed.as_secs_f64(),
        total as f64 / elapsed.as_secs_f64()
    );
    assert_eq!(store.reservation_count(), granted, "granted count must match stored reservations");
    print_latency("contended allocate latency", &mut all_latencies);
}

async fn phase3_search_under_load() {
    let (_store, engine) = setup("search").await;
    for i in 0..1000 {
        let (day, time) = slot(i);
        let _ = engine.allocate(AllocationRequest::booking(4, day, time, guest())).await;
    }

    let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let mut writers = Vec::new();
    for w in 0..4u32 {
        let engine = engine.clone();
        let stop = stop.clone();
        writers.push(tokio::spawn(async move {
            let mut i = 0u32;
            while !stop.load(std::sync::atomic::Ordering::Relaxed) {
                let (day, time) = slot(w * 10_000 + i);
                let _ = engine.allocate(AllocationRequest::booking(2, day, time, guest())).await;
                i += 1;
            }
        }));
    }

    let mut readers = Vec::new();
    for r in 0..8u32 {
        let engine = engine.clone();
        readers.push(tokio::spawn(async move {
            let mut latencies = Vec::with_capacity(500);
            for i in 0..500u32 {
                let (day, time) = slot(r * 500 + i);
                let t = Instant::now();
                let _ = engine.find_candidates(3, day, Some(time)).await;
                latencies.push(t.elapsed());
            }
            latencies
        }));
    }

    let mut all_latencies = Vec::new();
    for h in readers {
        all_latencies.extend(h.await.unwrap());
    }
    stop.store(true, std::sync::atomic::Ordering::Relaxed);
    for h in writers {
        let _ = h.await;
    }
    print_latency("candidate search", &mut all_latencies);
}

#[tokio::main]
async fn main() {
    println!("=== seatwise allocation benchmark ===\n");

    println!("[phase 1] sequential bookings");
    phase1_sequential().await;

    println!("\n[phase 2] contended bookings");
    phase2_contended().await;

    println!("\n[phase 3] candidate search under booking load");
    phase3_search_under_load().await;

    println!("\n=== benchmark complete ===");
}

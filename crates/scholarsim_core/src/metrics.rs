//! Run counters and logging setup.

use crate::orchestrator::TickReport;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub const MISSING_FACTOR: &str = "missing_factor";
pub const DUPLICATE_KEY: &str = "duplicate_key";
pub const STORE_CONFLICT: &str = "store_conflict";
pub const STUDENT_FAILURE: &str = "student_failure";

/// Counters shared by everything that drives one run.
pub struct Metrics {
    tick_count: AtomicU64,
    score_count: AtomicU64,
    failure_count: AtomicU64,
    counters: Mutex<HashMap<String, AtomicU64>>,
    start_time: Instant,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tick_count: AtomicU64::new(0),
            score_count: AtomicU64::new(0),
            failure_count: AtomicU64::new(0),
            counters: Mutex::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }

    /// Records a completed tick and logs its summary.
    pub fn record_tick(&self, duration: Duration, report: &TickReport) {
        self.tick_count.fetch_add(1, Ordering::Relaxed);
        self.score_count
            .fetch_add(report.scores.len() as u64, Ordering::Relaxed);
        self.failure_count
            .fetch_add(report.failures.len() as u64, Ordering::Relaxed);
        self.add_to_counter(MISSING_FACTOR, report.missing_factor_count() as u64);
        self.add_to_counter(STUDENT_FAILURE, report.failures.len() as u64);

        tracing::info!(
            tick = report.tick,
            scores = report.scores.len(),
            failures = report.failures.len(),
            duration_ms = duration.as_millis() as u64,
            "Simulation tick"
        );
    }

    pub fn increment_counter(&self, name: &str) {
        self.add_to_counter(name, 1);
    }

    pub fn add_to_counter(&self, name: &str, amount: u64) {
        if amount == 0 {
            return;
        }
        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        counters
            .entry(name.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(amount, Ordering::Relaxed);
    }

    #[must_use]
    pub fn counter(&self, name: &str) -> u64 {
        let counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        counters
            .get(name)
            .map_or(0, |c| c.load(Ordering::Relaxed))
    }

    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.tick_count.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn score_count(&self) -> u64 {
        self.score_count.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

/// Installs the global fmt subscriber. `RUST_LOG` overrides the `info`
/// default; a second call is a no-op.
pub fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .finish(),
    )
    .ok();
}

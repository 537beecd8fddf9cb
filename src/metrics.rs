// Workflow metrics module
//
// Lightweight counters for subprocess and workflow activity, logged on shutdown

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Session-wide counters.
///
/// Uses atomic operations so the runner and the console can record without
/// locks.
#[derive(Debug)]
pub struct Metrics {
    /// External commands started
    pub invocations: AtomicU64,

    /// Fallback attempts that failed (extraction, pack or replace variants)
    pub failed_attempts: AtomicU64,

    /// Extractions that produced files
    pub extractions: AtomicUsize,

    /// Extractions that ended in an error
    pub extractions_failed: AtomicUsize,

    /// Repacks that replaced an original archive
    pub replacements: AtomicUsize,

    /// Repacks that ended in an error
    pub repacks_failed: AtomicUsize,

    /// Time spent in extraction and repack, in milliseconds
    pub workflow_time_ms: AtomicU64,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            invocations: AtomicU64::new(0),
            failed_attempts: AtomicU64::new(0),
            extractions: AtomicUsize::new(0),
            extractions_failed: AtomicUsize::new(0),
            replacements: AtomicUsize::new(0),
            repacks_failed: AtomicUsize::new(0),
            workflow_time_ms: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_invocation(&self) {
        self.invocations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed_attempts(&self, count: usize) {
        self.failed_attempts
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_extraction(&self, succeeded: bool) {
        let counter = if succeeded {
            &self.extractions
        } else {
            &self.extractions_failed
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_repack(&self, succeeded: bool) {
        let counter = if succeeded {
            &self.replacements
        } else {
            &self.repacks_failed
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_workflow_time(&self, duration: Duration) {
        self.workflow_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        tracing::info!("=== Session Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Commands run: {}, failed fallback attempts: {}",
            self.invocations.load(Ordering::Relaxed),
            self.failed_attempts.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Extractions: {} succeeded, {} failed",
            self.extractions.load(Ordering::Relaxed),
            self.extractions_failed.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Repacks: {} replaced, {} failed",
            self.replacements.load(Ordering::Relaxed),
            self.repacks_failed.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Time in extract/repack: {:.2}s",
            self.workflow_time_ms.load(Ordering::Relaxed) as f64 / 1000.0
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

//! Global atomic counters for sweep observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event at the end of a run.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    objects_created: AtomicU64,
    construction_failures: AtomicU64,
    grid_records_applied: AtomicU64,
    switches_logged: AtomicU64,
    switches_dropped: AtomicU64,
    close_failures: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            objects_created: AtomicU64::new(0),
            construction_failures: AtomicU64::new(0),
            grid_records_applied: AtomicU64::new(0),
            switches_logged: AtomicU64::new(0),
            switches_dropped: AtomicU64::new(0),
            close_failures: AtomicU64::new(0),
        }
    }

    pub fn inc_objects_created(&self) {
        self.objects_created.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "objects_created", "counter incremented");
    }

    pub fn inc_construction_failures(&self) {
        self.construction_failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "construction_failures", "counter incremented");
    }

    pub fn inc_grid_records(&self) {
        self.grid_records_applied.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "grid_records_applied", "counter incremented");
    }

    /// A stellar-type switch was written to the binary switch log.
    pub fn inc_switches_logged(&self) {
        self.switches_logged.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "switches_logged", "counter incremented");
    }

    /// A switch notification arrived while no binary was evolving.
    pub fn inc_switches_dropped(&self) {
        self.switches_dropped.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "switches_dropped", "counter incremented");
    }

    pub fn inc_close_failures(&self) {
        self.close_failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "close_failures", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            objects_created = self.objects_created(),
            construction_failures = self.construction_failures(),
            grid_records_applied = self.grid_records_applied(),
            switches_logged = self.switches_logged(),
            switches_dropped = self.switches_dropped(),
            close_failures = self.close_failures(),
        );
    }

    pub fn objects_created(&self) -> u64 {
        self.objects_created.load(Ordering::Relaxed)
    }

    pub fn construction_failures(&self) -> u64 {
        self.construction_failures.load(Ordering::Relaxed)
    }

    pub fn grid_records_applied(&self) -> u64 {
        self.grid_records_applied.load(Ordering::Relaxed)
    }

    pub fn switches_logged(&self) -> u64 {
        self.switches_logged.load(Ordering::Relaxed)
    }

    pub fn switches_dropped(&self) -> u64 {
        self.switches_dropped.load(Ordering::Relaxed)
    }

    pub fn close_failures(&self) -> u64 {
        self.close_failures.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.objects_created.store(0, Ordering::Relaxed);
        self.construction_failures.store(0, Ordering::Relaxed);
        self.grid_records_applied.store(0, Ordering::Relaxed);
        self.switches_logged.store(0, Ordering::Relaxed);
        self.switches_dropped.store(0, Ordering::Relaxed);
        self.close_failures.store(0, Ordering::Relaxed);
    }
}

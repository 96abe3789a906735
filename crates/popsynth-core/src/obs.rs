//! Structured observability hooks for sweep lifecycle events.
//!
//! - `SweepSpan`: RAII guard tagging everything inside a sweep
//! - `emit_*`: one function per lifecycle event
//!
//! Events are emitted at `info!` level unless noted. Filter with `RUST_LOG`.

use tracing::{debug, info, warn};

use crate::domain::{LogError, RequestedCount};
use crate::logging::LogFile;
use crate::options::SweepMode;
use crate::summary::RunSummary;

/// RAII guard that enters a sweep-scoped tracing span.
///
/// ```ignore
/// let _span = SweepSpan::enter(SweepMode::Binary, 1234);
/// // every event below carries mode=binary base_seed=1234
/// ```
pub struct SweepSpan {
    _span: tracing::span::EnteredSpan,
}

impl SweepSpan {
    pub fn enter(mode: SweepMode, base_seed: u64) -> Self {
        let span = tracing::info_span!("popsynth.sweep", mode = ?mode, base_seed = base_seed);
        Self {
            _span: span.entered(),
        }
    }
}

pub fn emit_sweep_started(mode: SweepMode, requested: Option<usize>, using_grid: bool) {
    info!(
        event = "sweep.started",
        mode = ?mode,
        requested = ?requested,
        grid = using_grid,
    );
}

/// Per-object events are `debug!` so large sweeps stay quiet by default.
pub fn emit_object_evolved(index: usize, seed: u64, outcome: &str) {
    debug!(event = "object.evolved", index = index, seed = seed, outcome = %outcome);
}

pub fn emit_construction_failed(index: usize, seed: u64, error: &dyn std::fmt::Display) {
    warn!(event = "object.construction_failed", index = index, seed = seed, error = %error);
}

pub fn emit_grid_stopped(error: &dyn std::fmt::Display) {
    warn!(event = "grid.stopped", error = %error);
}

pub fn emit_file_close_failed(index: usize, file: LogFile, error: &LogError) {
    warn!(event = "log.close_failed", index = index, file = %file, error = %error);
}

pub fn emit_sampler_early_stop(index: usize, created: usize) {
    warn!(
        event = "sampler.early_stop",
        index = index,
        created = created,
        "exploratory phase stopped the sweep early"
    );
}

pub fn emit_sweep_finished(summary: &RunSummary) {
    let requested = match summary.requested {
        RequestedCount::Known(n) => n as i64,
        RequestedCount::Unknown => -1,
    };
    info!(
        event = "sweep.finished",
        status = %summary.status,
        created = summary.created,
        requested = requested,
        early_stopped = summary.early_stopped,
        cpu_seconds = summary.cpu_seconds,
        wall_seconds = summary.wall_seconds,
    );
}

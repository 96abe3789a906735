//! End-of-run summary and the run details record.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use cpu_time::ProcessTime;
use serde::{Deserialize, Serialize};

use crate::domain::{EvolutionStatus, RequestedCount};
use crate::options::{ProgramOptions, SweepMode};

/// Outcome of one sweep.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    pub mode: SweepMode,
    /// Final status after normalisation; never `Continue` once a sweep ends.
    pub status: EvolutionStatus,
    pub requested: RequestedCount,
    pub created: usize,
    /// The sampler's exploratory phase ended the sweep.
    pub early_stopped: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub cpu_seconds: f64,
    pub wall_seconds: f64,
}

impl RunSummary {
    /// Summary of a sweep that created nothing.
    #[cfg(test)]
    pub(crate) fn empty(mode: SweepMode) -> Self {
        let now = Utc::now();
        Self {
            mode,
            status: EvolutionStatus::Done,
            requested: RequestedCount::Known(0),
            created: 0,
            early_stopped: false,
            started_at: now,
            finished_at: now,
            cpu_seconds: 0.0,
            wall_seconds: 0.0,
        }
    }

    /// "stars" or "binaries".
    pub fn noun(&self) -> &'static str {
        match self.mode {
            SweepMode::Single => "stars",
            SweepMode::Binary => "binaries",
        }
    }

    pub fn generated_line(&self) -> String {
        format!(
            "Generated {} of {} {} requested",
            self.created,
            self.requested,
            self.noun()
        )
    }

    pub fn cpu_line(&self) -> String {
        format!("Clock time = {} CPU seconds", self.cpu_seconds)
    }

    pub fn wall_line(&self) -> String {
        format!("Wall time  = {} (hh:mm:ss)", format_hms(self.wall_seconds))
    }

    pub fn succeeded(&self) -> bool {
        self.status == EvolutionStatus::Done
    }
}

/// Format whole seconds as `hh:mm:ss`. Hours are not wrapped at 24.
pub fn format_hms(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

/// Wall and process CPU clocks started together.
pub struct SweepTimer {
    started_at: DateTime<Utc>,
    wall: Instant,
    cpu: Option<ProcessTime>,
}

impl SweepTimer {
    pub fn start() -> Self {
        Self {
            started_at: Utc::now(),
            wall: Instant::now(),
            cpu: ProcessTime::try_now().ok(),
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn wall_elapsed(&self) -> Duration {
        self.wall.elapsed()
    }

    /// CPU time consumed since start; zero when the platform cannot report it.
    pub fn cpu_elapsed(&self) -> Duration {
        match (self.cpu, ProcessTime::try_now().ok()) {
            (Some(start), Some(now)) => now.as_duration().saturating_sub(start.as_duration()),
            _ => Duration::ZERO,
        }
    }
}

/// Everything recorded about a run when logging stops.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunDetails {
    pub run_id: String,
    pub version: String,
    pub options_digest: String,
    pub base_seed: u64,
    pub options: ProgramOptions,
    pub summary: RunSummary,
}

impl RunDetails {
    pub fn new(options: &ProgramOptions, base_seed: u64, summary: RunSummary) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            options_digest: options.digest(),
            base_seed,
            options: options.clone(),
            summary,
        }
    }
}

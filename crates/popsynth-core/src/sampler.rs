//! Adaptive importance sampling hooks for binary sweeps.

use tracing::info;

use crate::options::AisOptions;
use crate::physics::BinaryOutcome;

/// Observes each evolved binary and may end the exploratory phase early.
pub trait Sampler {
    /// Whether an exploratory phase is running.
    fn is_exploratory(&self) -> bool;

    fn observe(&mut self, index: usize, outcome: &BinaryOutcome);

    /// Checked after the binary at `index` has been observed.
    fn should_stop_exploratory(&self, index: usize) -> bool;

    /// Log the sampler settings at sweep start.
    fn announce(&self) {}
}

/// No importance sampling.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSampler;

impl Sampler for NoSampler {
    fn is_exploratory(&self) -> bool {
        false
    }

    fn observe(&mut self, _index: usize, _outcome: &BinaryOutcome) {}

    fn should_stop_exploratory(&self, _index: usize) -> bool {
        false
    }
}

/// Exploratory phase: sample at least `fraction` of the requested binaries,
/// then stop once `min_hits` double compact objects have been found.
#[derive(Debug, Clone)]
pub struct ExploratorySampler {
    min_samples: usize,
    min_hits: usize,
    hits: usize,
}

impl ExploratorySampler {
    /// `requested` is `None` for grid sweeps, whose size is not known up
    /// front; only the hit count applies then.
    pub fn new(requested: Option<usize>, options: &AisOptions) -> Self {
        let min_samples = requested
            .map(|n| (options.fraction * n as f64).ceil() as usize)
            .unwrap_or(0);
        Self {
            min_samples,
            min_hits: options.min_hits,
            hits: 0,
        }
    }

    pub fn hits(&self) -> usize {
        self.hits
    }
}

impl Sampler for ExploratorySampler {
    fn is_exploratory(&self) -> bool {
        true
    }

    fn observe(&mut self, _index: usize, outcome: &BinaryOutcome) {
        if outcome.is_double_compact_object() {
            self.hits += 1;
        }
    }

    fn should_stop_exploratory(&self, index: usize) -> bool {
        index + 1 >= self.min_samples && self.hits >= self.min_hits
    }

    fn announce(&self) {
        info!(
            event = "sampler.exploratory",
            min_samples = self.min_samples,
            min_hits = self.min_hits,
            "adaptive importance sampling exploratory phase enabled"
        );
    }
}

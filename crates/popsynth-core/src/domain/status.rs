//! Sweep status tracking.

use serde::{Deserialize, Serialize};

/// Status of a sweep.
///
/// `Continue` is the only non-terminal state. A sweep starts in `Continue`
/// and transitions at most once per iteration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvolutionStatus {
    Continue,
    Done,
    Stopped,
    Error,
    SamplerEarlyStop,
}

impl EvolutionStatus {
    /// Whether this status ends the sweep.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, EvolutionStatus::Continue)
    }

    /// Human-readable label used in the run summary.
    pub fn label(&self) -> &'static str {
        match self {
            EvolutionStatus::Continue => "Continuing",
            EvolutionStatus::Done => "Simulation completed",
            EvolutionStatus::Stopped => "Evolution stopped",
            EvolutionStatus::Error => "An error occurred",
            EvolutionStatus::SamplerEarlyStop => "AIS exploratory phase stopped early",
        }
    }
}

impl std::fmt::Display for EvolutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Number of objects a sweep was asked to create.
///
/// A grid sweep only learns its size by reading the grid to the end, so an
/// abnormally terminated grid sweep has no known request count.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "count", rename_all = "snake_case")]
pub enum RequestedCount {
    Known(usize),
    Unknown,
}

impl RequestedCount {
    pub fn known(&self) -> Option<usize> {
        match self {
            RequestedCount::Known(n) => Some(*n),
            RequestedCount::Unknown => None,
        }
    }
}

impl std::fmt::Display for RequestedCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestedCount::Known(n) => write!(f, "{n}"),
            RequestedCount::Unknown => f.write_str("<INCOMPLETE GRID>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_continue_is_non_terminal() {
        assert!(!EvolutionStatus::Continue.is_terminal());
        for status in [
            EvolutionStatus::Done,
            EvolutionStatus::Stopped,
            EvolutionStatus::Error,
            EvolutionStatus::SamplerEarlyStop,
        ] {
            assert!(status.is_terminal(), "{status:?} should be terminal");
        }
    }

    #[test]
    fn test_requested_count_display() {
        assert_eq!(RequestedCount::Known(12).to_string(), "12");
        assert_eq!(RequestedCount::Unknown.to_string(), "<INCOMPLETE GRID>");
        assert_eq!(RequestedCount::Unknown.known(), None);
    }

    #[test]
    fn test_status_serde_uses_screaming_case() {
        let json = serde_json::to_string(&EvolutionStatus::SamplerEarlyStop).expect("serialize");
        assert_eq!(json, "\"SAMPLER_EARLY_STOP\"");
    }
}

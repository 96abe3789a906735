//! Natal kick parameters handed to object construction.

use serde::{Deserialize, Serialize};

/// Explicit-or-derived natal kick settings for one star.
///
/// Single stars take these from the `kick-magnitude*` options, binary
/// constituents from the `kick-magnitude*-1` / `-2` options. The star itself
/// never needs to know which sweep produced it.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct KickParameters {
    pub magnitude_random_specified: bool,
    /// Uniform random number in [0, 1) used to draw the kick magnitude.
    pub magnitude_random: f64,
    pub magnitude_specified: bool,
    /// Kick magnitude in km/s.
    pub magnitude: f64,
}

impl KickParameters {
    /// Build from optional explicit values; an absent value is "not specified".
    pub fn from_options(magnitude_random: Option<f64>, magnitude: Option<f64>) -> Self {
        Self {
            magnitude_random_specified: magnitude_random.is_some(),
            magnitude_random: magnitude_random.unwrap_or(0.0),
            magnitude_specified: magnitude.is_some(),
            magnitude: magnitude.unwrap_or(0.0),
        }
    }
}

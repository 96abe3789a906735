//! Program options consumed by the sweep driver.
//!
//! `ProgramOptions` is the resolved configuration for one run. The CLI fills
//! it from command-line arguments and environment variables; tests build it
//! directly with struct-update syntax over `ProgramOptions::default()`.

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::{KickParameters, PopsynthError, Result};

/// Solar metallicity (Asplund et al. 2009).
pub const SOLAR_METALLICITY: f64 = 0.0142;

/// Which kind of object a sweep creates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SweepMode {
    Single,
    Binary,
}

impl FromStr for SweepMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "single" | "sse" => Ok(SweepMode::Single),
            "binary" | "bse" => Ok(SweepMode::Binary),
            other => Err(format!("unknown mode '{other}' (expected single or binary)")),
        }
    }
}

/// Chemically homogeneous evolution treatment.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheMode {
    #[default]
    None,
    Optimistic,
    Pessimistic,
}

impl FromStr for CheMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(CheMode::None),
            "optimistic" => Ok(CheMode::Optimistic),
            "pessimistic" => Ok(CheMode::Pessimistic),
            other => Err(format!(
                "unknown CHE mode '{other}' (expected none, optimistic or pessimistic)"
            )),
        }
    }
}

/// Field delimiter for record files.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Delimiter {
    #[default]
    Comma,
    Tab,
    Space,
}

impl Delimiter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Delimiter::Comma => ",",
            Delimiter::Tab => "\t",
            Delimiter::Space => " ",
        }
    }

    /// File extension matching the delimiter.
    pub fn extension(&self) -> &'static str {
        match self {
            Delimiter::Comma => "csv",
            Delimiter::Tab => "tsv",
            Delimiter::Space => "txt",
        }
    }
}

impl FromStr for Delimiter {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "comma" => Ok(Delimiter::Comma),
            "tab" => Ok(Delimiter::Tab),
            "space" => Ok(Delimiter::Space),
            other => Err(format!(
                "unknown delimiter '{other}' (expected comma, tab or space)"
            )),
        }
    }
}

/// Adaptive importance sampling settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AisOptions {
    /// Run the exploratory phase, which may stop a binary sweep early.
    pub exploratory: bool,
    /// Minimum fraction of the requested binaries to sample before stopping.
    pub fraction: f64,
    /// Minimum number of target systems to find before stopping.
    pub min_hits: usize,
}

impl Default for AisOptions {
    fn default() -> Self {
        Self {
            exploratory: false,
            fraction: 1.0,
            min_hits: 1,
        }
    }
}

/// Output container and log file settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputOptions {
    pub path: PathBuf,
    pub container: String,
    pub prefix: String,
    pub delimiter: Delimiter,
    /// Write per-object detailed output files.
    pub detailed_output: bool,
    pub sse_switch_log: bool,
    pub bse_switch_log: bool,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            path: PathBuf::from("."),
            container: "popsynth_Output".to_string(),
            prefix: String::new(),
            delimiter: Delimiter::Comma,
            detailed_output: false,
            sse_switch_log: false,
            bse_switch_log: false,
        }
    }
}

/// Resolved options for one run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgramOptions {
    pub mode: SweepMode,
    /// Fixed base random seed; `None` derives one from the clock.
    pub random_seed: Option<u64>,
    /// Grid file; `None` runs a linear sweep.
    pub grid_file: Option<PathBuf>,

    pub single_star_mass_min: f64,
    pub single_star_mass_max: f64,
    pub single_star_mass_steps: usize,
    pub number_of_binaries: usize,

    pub metallicity: f64,
    pub initial_mass: Option<f64>,
    pub initial_mass_1: Option<f64>,
    pub initial_mass_2: Option<f64>,
    pub semi_major_axis: Option<f64>,

    /// IMF range for drawn binary primary masses, in solar masses.
    pub initial_mass_min: f64,
    pub initial_mass_max: f64,
    /// Range for drawn separations, in AU.
    pub semi_major_axis_min: f64,
    pub semi_major_axis_max: f64,

    pub kick_magnitude: Option<f64>,
    pub kick_magnitude_random: Option<f64>,
    pub kick_magnitude_1: Option<f64>,
    pub kick_magnitude_2: Option<f64>,
    pub kick_magnitude_random_1: Option<f64>,
    pub kick_magnitude_random_2: Option<f64>,

    pub che_mode: CheMode,
    /// Evolution time limit in Myr.
    pub max_evolution_time: f64,
    pub max_timesteps: u64,

    pub ais: AisOptions,
    pub output: OutputOptions,
    pub quiet: bool,
}

impl Default for ProgramOptions {
    fn default() -> Self {
        Self {
            mode: SweepMode::Binary,
            random_seed: None,
            grid_file: None,
            single_star_mass_min: 5.0,
            single_star_mass_max: 100.0,
            single_star_mass_steps: 100,
            number_of_binaries: 10,
            metallicity: SOLAR_METALLICITY,
            initial_mass: None,
            initial_mass_1: None,
            initial_mass_2: None,
            semi_major_axis: None,
            initial_mass_min: 5.0,
            initial_mass_max: 150.0,
            semi_major_axis_min: 0.1,
            semi_major_axis_max: 1000.0,
            kick_magnitude: None,
            kick_magnitude_random: None,
            kick_magnitude_1: None,
            kick_magnitude_2: None,
            kick_magnitude_random_1: None,
            kick_magnitude_random_2: None,
            che_mode: CheMode::None,
            max_evolution_time: 13_700.0,
            max_timesteps: 100_000,
            ais: AisOptions::default(),
            output: OutputOptions::default(),
            quiet: false,
        }
    }
}

impl ProgramOptions {
    /// Check option consistency before a run starts.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(PopsynthError::InvalidOptions(msg));

        if !(self.single_star_mass_min > 0.0 && self.single_star_mass_min.is_finite()) {
            return invalid(format!(
                "single-star-mass-min must be positive, got {}",
                self.single_star_mass_min
            ));
        }
        if self.single_star_mass_max < self.single_star_mass_min {
            return invalid(format!(
                "single-star-mass-max ({}) is below single-star-mass-min ({})",
                self.single_star_mass_max, self.single_star_mass_min
            ));
        }
        if !(self.metallicity > 0.0 && self.metallicity < 1.0) {
            return invalid(format!(
                "metallicity must lie in (0, 1), got {}",
                self.metallicity
            ));
        }
        if !(self.initial_mass_min > 0.0 && self.initial_mass_max >= self.initial_mass_min) {
            return invalid(format!(
                "invalid initial mass range [{}, {}]",
                self.initial_mass_min, self.initial_mass_max
            ));
        }
        if !(self.semi_major_axis_min > 0.0 && self.semi_major_axis_max >= self.semi_major_axis_min)
        {
            return invalid(format!(
                "invalid semi-major axis range [{}, {}]",
                self.semi_major_axis_min, self.semi_major_axis_max
            ));
        }
        if !(self.ais.fraction > 0.0 && self.ais.fraction <= 1.0) {
            return invalid(format!(
                "ais-fraction must lie in (0, 1], got {}",
                self.ais.fraction
            ));
        }
        if self.max_evolution_time <= 0.0 {
            return invalid(format!(
                "max-evolution-time must be positive, got {}",
                self.max_evolution_time
            ));
        }
        if self.max_timesteps == 0 {
            return invalid("max-timesteps must be at least 1".to_string());
        }
        Ok(())
    }

    /// Whether the sweep reads its parameters from a grid file.
    pub fn using_grid(&self) -> bool {
        self.grid_file.is_some()
    }

    /// Per-object parameters before any grid record or linear sweep value is
    /// applied.
    pub fn base_parameters(&self) -> ObjectParameters {
        ObjectParameters {
            initial_mass: self.initial_mass,
            initial_mass_1: self.initial_mass_1,
            initial_mass_2: self.initial_mass_2,
            semi_major_axis: self.semi_major_axis,
            metallicity: self.metallicity,
            random_seed: None,
            kick_magnitude: self.kick_magnitude,
            kick_magnitude_random: self.kick_magnitude_random,
            kick_magnitude_1: self.kick_magnitude_1,
            kick_magnitude_2: self.kick_magnitude_2,
            kick_magnitude_random_1: self.kick_magnitude_random_1,
            kick_magnitude_random_2: self.kick_magnitude_random_2,
        }
    }

    /// SHA-256 of the serialized options, recorded with every run so two
    /// output containers can be checked for identical configuration.
    pub fn digest(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        hex::encode(hasher.finalize())
    }
}

/// Parameters for a single object, after grid/linear-sweep overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ObjectParameters {
    pub initial_mass: Option<f64>,
    pub initial_mass_1: Option<f64>,
    pub initial_mass_2: Option<f64>,
    pub semi_major_axis: Option<f64>,
    pub metallicity: f64,
    /// Base seed supplied by a grid record for this object only.
    pub random_seed: Option<u64>,
    pub kick_magnitude: Option<f64>,
    pub kick_magnitude_random: Option<f64>,
    pub kick_magnitude_1: Option<f64>,
    pub kick_magnitude_2: Option<f64>,
    pub kick_magnitude_random_1: Option<f64>,
    pub kick_magnitude_random_2: Option<f64>,
}

impl ObjectParameters {
    /// Kick parameters for a single star.
    pub fn single_kick(&self) -> KickParameters {
        KickParameters::from_options(self.kick_magnitude_random, self.kick_magnitude)
    }

    /// Kick parameters for the binary primary.
    pub fn primary_kick(&self) -> KickParameters {
        KickParameters::from_options(self.kick_magnitude_random_1, self.kick_magnitude_1)
    }

    /// Kick parameters for the binary secondary.
    pub fn secondary_kick(&self) -> KickParameters {
        KickParameters::from_options(self.kick_magnitude_random_2, self.kick_magnitude_2)
    }
}

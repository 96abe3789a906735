//! Per-iteration parameter supply: grid files and linear sweeps.
//!
//! A grid file holds one record per line. Each record is a list of
//! `--option value` pairs using the command-line option names, e.g.
//!
//! ```text
//! # primary, secondary, separation
//! --initial-mass-1 35.0 --initial-mass-2 31.0 --semi-major-axis 0.2
//! --initial-mass-1 12.0 --initial-mass-2 9.5 --metallicity 0.001
//! ```
//!
//! Options absent from a record keep their command-line values. Only
//! options of the sweep's mode are accepted: a single-star grid rejects
//! `--initial-mass-1` and a binary grid rejects `--initial-mass`. A record
//! that cannot be parsed stops the sweep rather than being skipped.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::debug;

use crate::domain::GridError;
use crate::options::{ObjectParameters, SweepMode};

/// Result of asking the grid for the next record.
#[derive(Debug)]
pub enum GridRead {
    /// The grid could not be read; the sweep must stop.
    StopError(GridError),
    /// No records remain.
    Exhausted,
    /// A record was read and merged over the defaults.
    RecordApplied(ObjectParameters),
}

/// Reads grid records one at a time and applies them over default
/// parameters.
pub struct GridSweepController<R> {
    reader: R,
    line: usize,
    mode: SweepMode,
    defaults: ObjectParameters,
}

impl GridSweepController<Box<dyn BufRead>> {
    /// Open a grid file on disk.
    pub fn open(
        path: &Path,
        mode: SweepMode,
        defaults: ObjectParameters,
    ) -> Result<Self, GridError> {
        let file = File::open(path)?;
        debug!(grid = %path.display(), "opened grid file");
        Ok(Self::new(Box::new(BufReader::new(file)), mode, defaults))
    }
}

impl<R: BufRead> GridSweepController<R> {
    pub fn new(reader: R, mode: SweepMode, defaults: ObjectParameters) -> Self {
        Self {
            reader,
            line: 0,
            mode,
            defaults,
        }
    }

    /// Consume the next record.
    pub fn next_record(&mut self) -> GridRead {
        loop {
            let mut buf = String::new();
            match self.reader.read_line(&mut buf) {
                Ok(0) => return GridRead::Exhausted,
                Ok(_) => {
                    self.line += 1;
                    let content = match buf.find('#') {
                        Some(pos) => &buf[..pos],
                        None => buf.as_str(),
                    };
                    if content.trim().is_empty() {
                        continue;
                    }
                    return match parse_record(content, self.line, self.mode, &self.defaults) {
                        Ok(params) => GridRead::RecordApplied(params),
                        Err(e) => GridRead::StopError(e),
                    };
                }
                Err(e) => return GridRead::StopError(GridError::Io(e)),
            }
        }
    }
}

/// Parse one grid record for a `mode` sweep, merging it over `defaults`.
pub fn parse_record(
    content: &str,
    line: usize,
    mode: SweepMode,
    defaults: &ObjectParameters,
) -> Result<ObjectParameters, GridError> {
    let mut params = defaults.clone();
    let mut tokens = content.split_whitespace();

    while let Some(token) = tokens.next() {
        let Some(option) = token.strip_prefix("--") else {
            return Err(GridError::UnexpectedToken {
                line,
                token: token.to_string(),
            });
        };

        let (option, value) = match option.split_once('=') {
            Some((option, value)) => (option, value),
            None => {
                let value = tokens.next().ok_or_else(|| GridError::MissingValue {
                    line,
                    option: option.to_string(),
                })?;
                (option, value)
            }
        };

        apply_option(&mut params, line, mode, option, value)?;
    }

    Ok(params)
}

fn apply_option(
    params: &mut ObjectParameters,
    line: usize,
    mode: SweepMode,
    option: &str,
    value: &str,
) -> Result<(), GridError> {
    let float = || -> Result<f64, GridError> {
        value
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| GridError::InvalidValue {
                line,
                option: option.to_string(),
                value: value.to_string(),
            })
    };

    use SweepMode::{Binary, Single};

    // Options of the other mode would be silently ignored, so they are
    // unknown here.
    match (mode, option) {
        (Single, "initial-mass") => params.initial_mass = Some(float()?),
        (Single, "kick-magnitude") => params.kick_magnitude = Some(float()?),
        (Single, "kick-magnitude-random") => params.kick_magnitude_random = Some(float()?),
        (Binary, "initial-mass-1") => params.initial_mass_1 = Some(float()?),
        (Binary, "initial-mass-2") => params.initial_mass_2 = Some(float()?),
        (Binary, "semi-major-axis") => params.semi_major_axis = Some(float()?),
        (Binary, "kick-magnitude-1") => params.kick_magnitude_1 = Some(float()?),
        (Binary, "kick-magnitude-2") => params.kick_magnitude_2 = Some(float()?),
        (Binary, "kick-magnitude-random-1") => params.kick_magnitude_random_1 = Some(float()?),
        (Binary, "kick-magnitude-random-2") => params.kick_magnitude_random_2 = Some(float()?),
        (_, "metallicity") => params.metallicity = float()?,
        (_, "random-seed") => {
            let seed = value.parse::<u64>().map_err(|_| GridError::InvalidValue {
                line,
                option: option.to_string(),
                value: value.to_string(),
            })?;
            params.random_seed = Some(seed);
        }
        _ => {
            return Err(GridError::UnknownOption {
                line,
                option: option.to_string(),
            })
        }
    }
    Ok(())
}

/// Linearly spaced single-star masses: `min + index * (max - min) / steps`.
///
/// The upper bound is exclusive. `steps == 0` is a single-point sweep at
/// `min`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearSweep {
    min: f64,
    increment: f64,
    steps: usize,
}

impl LinearSweep {
    pub fn new(min: f64, max: f64, steps: usize) -> Self {
        let increment = if steps == 0 {
            0.0
        } else {
            (max - min) / steps as f64
        };
        Self {
            min,
            increment,
            steps,
        }
    }

    /// Number of objects the sweep produces.
    pub fn len(&self) -> usize {
        self.steps.max(1)
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn increment(&self) -> f64 {
        self.increment
    }

    /// Value for the object at `index`.
    pub fn value(&self, index: usize) -> f64 {
        self.min + index as f64 * self.increment
    }
}

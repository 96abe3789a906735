//! Stellar evolution collaborators driven by the sweep.
//!
//! The models here are deliberately small: enough physics to produce a
//! realistic sequence of stellar-type switches, remnants, kicks and binary
//! outcomes for the driver to orchestrate. Stars talk to the outside world
//! only through [`EvolutionContext`], so a star never learns whether it is
//! evolving alone or inside a binary.

pub mod binary;
pub mod sampling;
pub mod star;
pub mod stellar_type;

pub use binary::{BinaryConfig, BinaryOutcome, BinaryStar, BinaryStatus};
pub use star::{Star, StarOutcome, StarStatus};
pub use stellar_type::StellarType;

use serde::{Deserialize, Serialize};

use crate::domain::error::ObjectError;
use crate::logging::{LogFile, LogRecord};
use crate::options::ProgramOptions;

/// A stellar-type change of one star.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SwitchEvent {
    pub object_id: u64,
    pub from: StellarType,
    pub to: StellarType,
    /// Mass of the switching star in solar masses.
    pub mass: f64,
    /// Age of the switching star in Myr.
    pub age: f64,
}

/// Out-of-band notifications raised from inside evolution stepping.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    StellarTypeSwitch(SwitchEvent),
    Supernova {
        object_id: u64,
        remnant: StellarType,
        /// Natal kick magnitude in km/s.
        kick: f64,
    },
}

/// Services available to an object while it is built and evolved.
pub trait EvolutionContext {
    /// Allocate a process-unique object id.
    fn next_object_id(&self) -> u64;

    /// Deliver a notification to whoever is listening. Returns once the
    /// notification has been handled.
    fn raise(&self, notification: Notification);

    /// Append a record to a log file.
    fn log(&self, file: LogFile, record: LogRecord);

    /// Record a per-object problem in the error catalog.
    fn report(&self, object_id: u64, error: ObjectError);
}

/// Modelled limits on a single evolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvolutionLimits {
    /// Maximum physical time in Myr.
    pub max_time: f64,
    pub max_timesteps: u64,
    /// Write a detailed-output record after every step.
    pub detailed_output: bool,
}

impl EvolutionLimits {
    pub fn from_options(options: &ProgramOptions) -> Self {
        Self {
            max_time: options.max_evolution_time,
            max_timesteps: options.max_timesteps,
            detailed_output: options.output.detailed_output,
        }
    }
}

impl Default for EvolutionLimits {
    fn default() -> Self {
        Self::from_options(&ProgramOptions::default())
    }
}

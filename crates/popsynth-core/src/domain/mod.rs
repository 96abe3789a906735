//! Domain models for popsynth.
//!
//! Canonical definitions shared by the sweep driver and its collaborators:
//! - `EvolutionStatus`: sweep state machine status
//! - `RequestedCount`: requested object count, possibly unknown
//! - `KickParameters`: natal kick settings passed to construction

pub mod error;
pub mod kick;
pub mod status;

pub use error::{ConstructionError, GridError, LogError, ObjectError, PopsynthError, Result};
pub use kick::KickParameters;
pub use status::{EvolutionStatus, RequestedCount};

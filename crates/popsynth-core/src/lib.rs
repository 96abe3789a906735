//! popsynth Core Library
//!
//! Population synthesis of single and binary stars: the sweep driver, its
//! seed and grid plumbing, the run context that bridges stellar-type
//! switches to the binary switch log, and the logging collaborator.

pub mod context;
pub mod domain;
pub mod driver;
pub mod fakes;
pub mod grid;
pub mod logging;
pub mod metrics;
pub mod obs;
pub mod options;
pub mod physics;
pub mod sampler;
pub mod seed;
pub mod summary;
pub mod switch_log;
pub mod telemetry;

pub use domain::{
    ConstructionError, EvolutionStatus, GridError, KickParameters, LogError, ObjectError,
    PopsynthError, RequestedCount, Result,
};

pub use context::{Console, ErrorCatalog, RunContext, StdoutConsole, SwitchObserver};
pub use driver::EvolutionDriver;
pub use grid::{GridRead, GridSweepController, LinearSweep};
pub use logging::{FileLogger, LogFile, LogRecord, LogSink};
pub use options::{
    AisOptions, CheMode, Delimiter, ObjectParameters, OutputOptions, ProgramOptions, SweepMode,
};
pub use physics::{
    BinaryOutcome, BinaryStar, BinaryStatus, EvolutionContext, Notification, Star, StarOutcome,
    StellarType, SwitchEvent,
};
pub use sampler::{ExploratorySampler, NoSampler, Sampler};
pub use seed::{ObjectSeed, SeedAllocator};
pub use summary::{format_hms, RunDetails, RunSummary};
pub use switch_log::SwitchLogBridge;

pub use metrics::METRICS;
pub use obs::SweepSpan;
pub use telemetry::init_tracing;

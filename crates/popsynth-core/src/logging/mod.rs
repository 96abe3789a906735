//! Record logging for a run.
//!
//! Every output file is a delimited table with a header row. Run-wide files
//! (system parameters, switch logs) accumulate rows across objects; detailed
//! output files are per object and carry the object index in their name.

pub mod file;

pub use file::FileLogger;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::LogError;
use crate::summary::RunDetails;

/// Name of the run details file written when logging stops.
pub const RUN_DETAILS_FILE: &str = "Run_Details.json";

/// Standard log files.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum LogFile {
    SseSystemParameters,
    SseDetailedOutput,
    SseSwitchLog,
    BseSystemParameters,
    BseDetailedOutput,
    BseSwitchLog,
}

impl LogFile {
    pub fn name(&self) -> &'static str {
        match self {
            LogFile::SseSystemParameters => "SSE_System_Parameters",
            LogFile::SseDetailedOutput => "SSE_Detailed_Output",
            LogFile::SseSwitchLog => "SSE_Switch_Log",
            LogFile::BseSystemParameters => "BSE_System_Parameters",
            LogFile::BseDetailedOutput => "BSE_Detailed_Output",
            LogFile::BseSwitchLog => "BSE_Switch_Log",
        }
    }

    /// Whether each object gets its own file.
    pub fn is_per_object(&self) -> bool {
        matches!(self, LogFile::SseDetailedOutput | LogFile::BseDetailedOutput)
    }
}

impl std::fmt::Display for LogFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One row of a log file: ordered `(column, value)` pairs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LogRecord {
    fields: Vec<(String, Value)>,
}

impl LogRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column.
    pub fn field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.push((name.to_string(), value.into()));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(column, _)| column.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.fields.iter().map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Render one value as a table cell.
pub(crate) fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Destination for run records.
///
/// Writes are fire-and-forget from the caller's perspective; a failed write
/// surfaces when the file is closed.
pub trait LogSink {
    /// The driver is about to build the object at `index`.
    fn begin_object(&mut self, index: usize);

    fn write(&mut self, file: LogFile, record: &LogRecord) -> Result<(), LogError>;

    /// Flush and close one file. Fails if the flush fails or if any write
    /// to the file failed since it was last closed. `Ok` when the file was
    /// not open.
    fn close_standard_file(&mut self, file: LogFile) -> Result<(), LogError>;

    fn close_all_standard_files(&mut self) -> Result<(), LogError>;

    /// Close everything and record the run details.
    fn stop(&mut self, details: &RunDetails) -> Result<(), LogError>;
}

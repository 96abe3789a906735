//! In-memory collaborators (testing only)
//!
//! `MemoryLogSink`, `MemoryConsole` and `RecordingContext` satisfy the
//! logging, console and evolution-context contracts without touching the
//! filesystem. Clones share state, so a test can keep one handle and give
//! the other to the code under test.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::context::Console;
use crate::domain::{LogError, ObjectError};
use crate::logging::{LogFile, LogRecord, LogSink};
use crate::physics::{EvolutionContext, Notification, SwitchEvent};
use crate::summary::RunDetails;

// ---------------------------------------------------------------------------
// MemoryLogSink
// ---------------------------------------------------------------------------

/// A record as the sink saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct WrittenRecord {
    pub file: LogFile,
    /// Object index current when the record was written.
    pub object: usize,
    pub record: LogRecord,
}

#[derive(Debug, Default)]
struct SinkState {
    object: usize,
    records: Vec<WrittenRecord>,
    closes: Vec<(LogFile, usize)>,
    fail_close: Option<(LogFile, usize)>,
    fail_writes: Vec<LogFile>,
    failed: Vec<LogFile>,
    stopped: Option<RunDetails>,
}

/// Log sink that keeps everything in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryLogSink {
    state: Rc<RefCell<SinkState>>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make closing `file` fail while the object at `index` is current.
    pub fn fail_close_at(&self, file: LogFile, index: usize) {
        self.state.borrow_mut().fail_close = Some((file, index));
    }

    /// Make every write to `file` fail. The failure is reported again when
    /// the file is next closed.
    pub fn fail_writes_to(&self, file: LogFile) {
        self.state.borrow_mut().fail_writes.push(file);
    }

    pub fn records(&self, file: LogFile) -> Vec<WrittenRecord> {
        self.state
            .borrow()
            .records
            .iter()
            .filter(|r| r.file == file)
            .cloned()
            .collect()
    }

    /// Every successful close as `(file, object index)`.
    pub fn closes(&self) -> Vec<(LogFile, usize)> {
        self.state.borrow().closes.clone()
    }

    pub fn stopped(&self) -> Option<RunDetails> {
        self.state.borrow().stopped.clone()
    }
}

impl LogSink for MemoryLogSink {
    fn begin_object(&mut self, index: usize) {
        self.state.borrow_mut().object = index;
    }

    fn write(&mut self, file: LogFile, record: &LogRecord) -> Result<(), LogError> {
        let mut state = self.state.borrow_mut();
        if state.stopped.is_some() {
            return Err(LogError::NotStarted);
        }
        if state.fail_writes.contains(&file) {
            if !state.failed.contains(&file) {
                state.failed.push(file);
            }
            return Err(LogError::Write {
                file: file.name().to_string(),
                source: std::io::Error::other("injected write failure"),
            });
        }
        let object = state.object;
        state.records.push(WrittenRecord {
            file,
            object,
            record: record.clone(),
        });
        Ok(())
    }

    fn close_standard_file(&mut self, file: LogFile) -> Result<(), LogError> {
        let mut state = self.state.borrow_mut();
        let object = state.object;
        let had_failed_write = state.failed.contains(&file);
        state.failed.retain(|f| *f != file);
        if had_failed_write || state.fail_close == Some((file, object)) {
            return Err(LogError::NotClosed {
                file: file.name().to_string(),
            });
        }
        state.closes.push((file, object));
        Ok(())
    }

    fn close_all_standard_files(&mut self) -> Result<(), LogError> {
        Ok(())
    }

    fn stop(&mut self, details: &RunDetails) -> Result<(), LogError> {
        self.state.borrow_mut().stopped = Some(details.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryConsole
// ---------------------------------------------------------------------------

/// Console that collects lines.
#[derive(Debug, Clone, Default)]
pub struct MemoryConsole {
    lines: Rc<RefCell<Vec<String>>>,
}

impl MemoryConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }
}

impl Console for MemoryConsole {
    fn say(&mut self, line: &str) {
        self.lines.borrow_mut().push(line.to_string());
    }
}

// ---------------------------------------------------------------------------
// RecordingContext
// ---------------------------------------------------------------------------

/// Evolution context that records everything and has no observer.
#[derive(Debug, Default)]
pub struct RecordingContext {
    next_id: Cell<u64>,
    notifications: RefCell<Vec<Notification>>,
    records: RefCell<Vec<(LogFile, LogRecord)>>,
    reports: RefCell<Vec<(u64, ObjectError)>>,
}

impl RecordingContext {
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.borrow().clone()
    }

    /// Stellar-type switches, in the order raised.
    pub fn switches(&self) -> Vec<SwitchEvent> {
        self.notifications
            .borrow()
            .iter()
            .filter_map(|n| match n {
                Notification::StellarTypeSwitch(e) => Some(*e),
                _ => None,
            })
            .collect()
    }

    pub fn records(&self, file: LogFile) -> Vec<LogRecord> {
        self.records
            .borrow()
            .iter()
            .filter(|(f, _)| *f == file)
            .map(|(_, r)| r.clone())
            .collect()
    }

    pub fn reports(&self) -> Vec<(u64, ObjectError)> {
        self.reports.borrow().clone()
    }
}

impl EvolutionContext for RecordingContext {
    fn next_object_id(&self) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    fn raise(&self, notification: Notification) {
        self.notifications.borrow_mut().push(notification);
    }

    fn log(&self, file: LogFile, record: LogRecord) {
        self.records.borrow_mut().push((file, record));
    }

    fn report(&self, object_id: u64, error: ObjectError) {
        self.reports.borrow_mut().push((object_id, error));
    }
}

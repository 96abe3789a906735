//! Delimited record files inside a per-run output container.

use std::collections::{HashMap, HashSet};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::{cell, LogFile, LogRecord, LogSink, RUN_DETAILS_FILE};
use crate::domain::LogError;
use crate::options::{Delimiter, OutputOptions};
use crate::summary::RunDetails;

struct OpenFile {
    path: PathBuf,
    writer: BufWriter<File>,
}

/// Writes log records as delimited tables under `{path}/{container}`.
///
/// If the container already exists a numbered sibling (`_1`, `_2`, ...) is
/// used instead, so an earlier run is never overwritten.
pub struct FileLogger {
    container: PathBuf,
    prefix: String,
    delimiter: Delimiter,
    object_index: usize,
    open: HashMap<LogFile, OpenFile>,
    headed: HashSet<PathBuf>,
    failed: HashSet<LogFile>,
    stopped: bool,
}

impl FileLogger {
    /// Create the output container and start logging.
    pub fn start(options: &OutputOptions) -> Result<Self, LogError> {
        let container = unique_container(&options.path.join(&options.container));
        std::fs::create_dir_all(&container).map_err(|source| LogError::ContainerCreate {
            path: container.clone(),
            source,
        })?;
        debug!(container = %container.display(), "logging started");

        Ok(Self {
            container,
            prefix: options.prefix.clone(),
            delimiter: options.delimiter,
            object_index: 0,
            open: HashMap::new(),
            headed: HashSet::new(),
            failed: HashSet::new(),
            stopped: false,
        })
    }

    /// Directory all files are written to.
    pub fn container(&self) -> &Path {
        &self.container
    }

    /// Path of `file` for the current object.
    pub fn path_for(&self, file: LogFile) -> PathBuf {
        let name = if file.is_per_object() {
            format!(
                "{}{}_{}.{}",
                self.prefix,
                file.name(),
                self.object_index,
                self.delimiter.extension()
            )
        } else {
            format!("{}{}.{}", self.prefix, file.name(), self.delimiter.extension())
        };
        self.container.join(name)
    }

    fn append(&mut self, file: LogFile, path: &Path, record: &LogRecord) -> Result<(), LogError> {
        let wrap = |source: std::io::Error| LogError::Write {
            file: file.name().to_string(),
            source,
        };

        if !self.open.contains_key(&file) {
            let handle = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(wrap)?;
            self.open.insert(
                file,
                OpenFile {
                    path: path.to_path_buf(),
                    writer: BufWriter::new(handle),
                },
            );
        }

        let write_header = self.headed.insert(path.to_path_buf());
        let delimiter = self.delimiter.as_str();
        let Some(open) = self.open.get_mut(&file) else {
            return Err(LogError::NotStarted);
        };

        if write_header {
            let header: Vec<&str> = record.columns().collect();
            writeln!(open.writer, "{}", header.join(delimiter)).map_err(wrap)?;
        }
        let row: Vec<String> = record.values().map(cell).collect();
        writeln!(open.writer, "{}", row.join(delimiter)).map_err(wrap)
    }

    /// Flush the handle left open for an earlier object. A failure stays
    /// recorded so the driver's close still reports it.
    fn flush_previous(&mut self, file: LogFile) -> Result<(), LogError> {
        let Some(mut open) = self.open.remove(&file) else {
            return Ok(());
        };
        open.writer.flush().map_err(|source| {
            self.failed.insert(file);
            LogError::Write {
                file: file.name().to_string(),
                source,
            }
        })
    }
}

fn unique_container(base: &Path) -> PathBuf {
    if !base.exists() {
        return base.to_path_buf();
    }
    let name = base
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut n = 1;
    loop {
        let candidate = base.with_file_name(format!("{name}_{n}"));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

impl LogSink for FileLogger {
    fn begin_object(&mut self, index: usize) {
        self.object_index = index;
    }

    fn write(&mut self, file: LogFile, record: &LogRecord) -> Result<(), LogError> {
        if self.stopped {
            return Err(LogError::NotStarted);
        }

        let path = self.path_for(file);
        let stale = self.open.get(&file).is_some_and(|open| open.path != path);
        if stale {
            self.flush_previous(file)?;
        }

        let result = self.append(file, &path, record);
        if let Err(ref e) = result {
            warn!(file = %file, error = %e, "log write failed");
            self.failed.insert(file);
        }
        result
    }

    fn close_standard_file(&mut self, file: LogFile) -> Result<(), LogError> {
        let failed = self.failed.remove(&file);
        if let Some(mut open) = self.open.remove(&file) {
            if let Err(e) = open.writer.flush() {
                warn!(file = %file, error = %e, "flush failed on close");
                return Err(LogError::NotClosed {
                    file: file.name().to_string(),
                });
            }
        }
        if failed {
            return Err(LogError::NotClosed {
                file: file.name().to_string(),
            });
        }
        Ok(())
    }

    fn close_all_standard_files(&mut self) -> Result<(), LogError> {
        let files: HashSet<LogFile> = self
            .open
            .keys()
            .chain(self.failed.iter())
            .copied()
            .collect();

        let mut first_error = None;
        for file in files {
            if let Err(e) = self.close_standard_file(file) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn stop(&mut self, details: &RunDetails) -> Result<(), LogError> {
        let closed = self.close_all_standard_files();

        let json = serde_json::to_string_pretty(details)?;
        let path = self.container.join(RUN_DETAILS_FILE);
        std::fs::write(&path, json).map_err(|source| LogError::Write {
            file: RUN_DETAILS_FILE.to_string(),
            source,
        })?;
        self.stopped = true;
        debug!(container = %self.container.display(), "logging stopped");
        closed
    }
}

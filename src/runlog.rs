use chrono::{SecondsFormat, Utc};
use log::warn;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DEFAULT_LOG_FILE: &str = "profile_process.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogLevel::Info => "INFO",
            LogLevel::Success => "SUCCESS",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        })
    }
}

/// Append-only run log with one timestamped line per event.
///
/// Not synchronised: the dispatcher hands it to exactly one aggregation
/// thread, which is what keeps lines from interleaving.
pub struct RunLog {
    path: Option<PathBuf>,
    writer: Box<dyn Write + Send>,
}

impl RunLog {
    /// Creates (or truncates) the log file, creating its directory if needed.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        Ok(Self {
            path: Some(path.to_path_buf()),
            writer: Box::new(BufWriter::new(file)),
        })
    }

    pub fn from_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self { path: None, writer: Box::new(writer) }
    }

    /// A log that discards everything.
    pub fn discard() -> Self {
        Self::from_writer(io::sink())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Write failures are reported on the console and otherwise ignored;
    /// losing a log line must not fail a job.
    pub fn record(&mut self, level: LogLevel, message: &str) {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        if let Err(e) = writeln!(self.writer, "{} - {}: {}", timestamp, level, message) {
            warn!("Failed to write to run log: {}", e);
        }
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl fmt::Debug for RunLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunLog").field("path", &self.path).finish_non_exhaustive()
    }
}

impl Drop for RunLog {
    fn drop(&mut self) {
        if let Err(e) = self.writer.flush() {
            warn!("Failed to flush run log: {}", e);
        }
    }
}

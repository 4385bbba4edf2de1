use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// Run-level failures of the dispatcher. Any of these aborts the run.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("cannot enumerate input directory {}: {source}", dir.display())]
    Discovery { dir: PathBuf, source: io::Error },

    #[error("invalid input pattern '{pattern}': {source}")]
    InvalidPattern { pattern: String, source: glob::PatternError },

    #[error("worker count must be at least 1 (got {0})")]
    InvalidWorkerCount(usize),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Per-job failures. These are counted as `failed` and never stop the run.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("failed to read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to start '{program}': {source}")]
    Spawn { program: String, source: io::Error },

    #[error("failed to write to stdin of '{program}': {source}")]
    Pipe { program: String, source: io::Error },

    #[error("failed waiting for '{program}': {source}")]
    Wait { program: String, source: io::Error },

    #[error("'{program}' exited with {status}")]
    ExitStatus { program: String, status: ExitStatus },
}

#[derive(Debug, Error)]
pub enum TableError {
    #[error("table {} has no records", path.display())]
    Empty { path: PathBuf },

    #[error("failed to open table {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to parse table {}: {source}", path.display())]
    Parse { path: PathBuf, source: csv::Error },

    #[error("failed to write table {}: {source}", path.display())]
    Write { path: PathBuf, source: csv::Error },
}

#[derive(Debug, Error)]
pub enum MergeError {
    #[error(transparent)]
    Table(#[from] TableError),

    #[error("cannot enumerate artifact directory {}: {source}", dir.display())]
    Discovery { dir: PathBuf, source: io::Error },

    #[error("headline and body both target column '{0}'")]
    SameColumn(String),
}

#[derive(Debug, Error)]
pub enum SplitError {
    #[error("failed to open {}: {source}", path.display())]
    Open { path: PathBuf, source: io::Error },

    #[error("failed to read line {line} of {}: {source}", path.display())]
    Read { path: PathBuf, line: usize, source: io::Error },

    #[error("failed to create output directory {}: {source}", path.display())]
    CreateDir { path: PathBuf, source: io::Error },
}

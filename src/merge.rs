//! Attaches generated text artifacts to the table rows they were built from.
//!
//! Each artifact's base identifier (file name without extension) is looked up
//! in the table: rows are scanned in order, fields left to right, and the first
//! row with a matching field wins. Matching is containment by default, so an
//! identifier also matches inside URLs or other longer values.

use crate::artifact::base_identifier;
use crate::error::MergeError;
use crate::table::{ColumnHandle, LineEnding, Table};
use log::{debug, error, info, warn};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_ARTIFACT_EXTENSION: &str = "md";
pub const DEFAULT_SUMMARY_COLUMN: &str = "linkedin_profile_summary";
pub const DEFAULT_HEADLINE_COLUMN: &str = "headline";
pub const DEFAULT_BODY_COLUMN: &str = "body";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeMode {
    /// The whole artifact goes into one column.
    Combined { column: String },
    /// First line into `headline`, second line into `body`.
    HeadlineBody { headline: String, body: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchStrategy {
    #[default]
    Contains,
    Exact,
}

impl MatchStrategy {
    fn matches(self, field: &str, base_id: &str) -> bool {
        match self {
            MatchStrategy::Contains => field.contains(base_id),
            MatchStrategy::Exact => field == base_id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MergeOptions {
    pub mode: MergeMode,
    pub strategy: MatchStrategy,
    pub extension: String,
}

impl MergeOptions {
    pub fn combined(column: impl Into<String>) -> Self {
        Self {
            mode: MergeMode::Combined { column: column.into() },
            strategy: MatchStrategy::default(),
            extension: DEFAULT_ARTIFACT_EXTENSION.to_string(),
        }
    }

    pub fn headline_body(headline: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            mode: MergeMode::HeadlineBody { headline: headline.into(), body: body.into() },
            strategy: MatchStrategy::default(),
            extension: DEFAULT_ARTIFACT_EXTENSION.to_string(),
        }
    }

    pub fn with_strategy(mut self, strategy: MatchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub attached: usize,
    pub not_found: usize,
    pub unreadable: usize,
}

/// Where one artifact's content goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub artifact: PathBuf,
    pub row: Option<usize>,
}

enum Targets {
    Combined(ColumnHandle),
    HeadlineBody(ColumnHandle, ColumnHandle),
}

/// Lists artifacts with the given extension in file-name order. Directories
/// and other extensions are ignored.
pub fn discover_text_artifacts(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, MergeError> {
    let entries = fs::read_dir(dir).map_err(|source| MergeError::Discovery { dir: dir.to_path_buf(), source })?;
    let mut paths = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                continue;
            }
        };
        let path = entry.path();
        let has_extension = path.extension().map_or(false, |e| e == extension);
        if has_extension && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Index of the first data row with a field matching `base_id`.
pub fn find_matching_row(table: &Table, base_id: &str, strategy: MatchStrategy) -> Option<usize> {
    table
        .rows()
        .iter()
        .position(|row| row.iter().any(|field| strategy.matches(field, base_id)))
}

/// Splits an artifact into its first and second lines. Missing lines are
/// empty strings; anything after the second line is dropped.
pub fn split_headline_body(content: &str) -> (String, String) {
    let mut lines = content.lines();
    let headline = lines.next().unwrap_or_default().to_string();
    let body = lines.next().unwrap_or_default().to_string();
    (headline, body)
}

/// Writes every artifact in `artifacts_dir` into its matching row of `table`.
/// Columns are resolved (and added if missing) before any row is touched.
pub fn merge(table: &mut Table, artifacts_dir: &Path, options: &MergeOptions) -> Result<MergeStats, MergeError> {
    let targets = resolve_targets(table, &options.mode)?;
    let artifacts = discover_text_artifacts(artifacts_dir, &options.extension)?;
    info!("Found {} .{} files in {}", artifacts.len(), options.extension, artifacts_dir.display());

    let mut stats = MergeStats::default();
    for path in artifacts {
        let base_id = base_identifier(&path);
        debug!("Processing artifact: {}", base_id);

        let content = match fs::read(&path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                error!("Error reading artifact {}: {}", path.display(), e);
                stats.unreadable += 1;
                continue;
            }
        };

        let result = MatchResult { row: find_matching_row(table, &base_id, options.strategy), artifact: path };
        let Some(row) = result.row else {
            warn!("Could not find matching row for {}", base_id);
            stats.not_found += 1;
            continue;
        };

        match &targets {
            Targets::Combined(column) => table.set_cell(row, column, content),
            Targets::HeadlineBody(headline_col, body_col) => {
                let (headline, body) = split_headline_body(&content);
                table.set_cell(row, headline_col, headline);
                table.set_cell(row, body_col, body);
            }
        }
        debug!("Matched {} to row {}", result.artifact.display(), row + 1);
        info!("Attached {}", base_id);
        stats.attached += 1;
    }
    Ok(stats)
}

/// Loads `table_path`, merges `artifacts_dir` into it and writes the result
/// to `output_path`.
pub fn merge_file(
    table_path: &Path,
    artifacts_dir: &Path,
    output_path: &Path,
    options: &MergeOptions,
    delimiter: u8,
    line_ending: LineEnding,
) -> Result<MergeStats, MergeError> {
    let mut table = Table::load(table_path, delimiter)?;
    info!("Read {} rows from {}", table.row_count() + 1, table_path.display());
    let stats = merge(&mut table, artifacts_dir, options)?;
    table.save(output_path, line_ending)?;
    info!("Wrote updated table to {}", output_path.display());
    Ok(stats)
}

/// Fails before touching the table when both halves of a headline/body
/// split would land in one column.
fn resolve_targets(table: &mut Table, mode: &MergeMode) -> Result<Targets, MergeError> {
    match mode {
        MergeMode::Combined { column } => Ok(Targets::Combined(resolve_logged(table, column))),
        MergeMode::HeadlineBody { headline, body } if headline == body => {
            Err(MergeError::SameColumn(headline.clone()))
        }
        MergeMode::HeadlineBody { headline, body } => {
            let headline = resolve_logged(table, headline);
            let body = resolve_logged(table, body);
            Ok(Targets::HeadlineBody(headline, body))
        }
    }
}

fn resolve_logged(table: &mut Table, name: &str) -> ColumnHandle {
    let (handle, added) = table.resolve_column(name);
    if added {
        debug!("Added new column '{}' at index {}", handle.name, handle.index);
    } else {
        debug!("Found existing column '{}' at index {}", handle.name, handle.index);
    }
    handle
}

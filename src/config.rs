use crate::table::LineEnding;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs::File;
use std::path::{Path, PathBuf};

pub const DEFAULT_WORKERS: usize = 5;

/// Optional defaults for every subcommand, loaded from a YAML file.
/// Command-line flags take precedence over anything set here.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ToolkitConfig {
    pub split: SplitSection,
    pub process: ProcessSection,
    pub attach: AttachSection,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SplitSection {
    pub identifier_field: Option<String>,
    pub fallback_prefix: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessSection {
    pub tool: Option<String>,
    pub pattern: Option<String>,
    pub workers: Option<usize>,
    pub input_patterns: Option<Vec<String>>,
    pub output_extension: Option<String>,
    pub log_dir: Option<PathBuf>,
    pub log_file: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AttachSection {
    pub extension: Option<String>,
    pub delimiter: Option<char>,
    pub line_ending: Option<LineEnding>,
    pub exact_match: Option<bool>,
}

impl ToolkitConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open configuration file: {}", path.display()))?;
        let config: ToolkitConfig = serde_yaml::from_reader(file)
            .with_context(|| format!("Failed to parse configuration YAML from {}", path.display()))?;
        Ok(config)
    }

    pub fn load_optional(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

/// Converts a delimiter character to the single byte the CSV layer expects.
pub fn delimiter_byte(delimiter: char) -> Result<u8> {
    if !delimiter.is_ascii() || delimiter == '"' || delimiter == '\n' || delimiter == '\r' {
        bail!("Unsupported delimiter {:?}: must be a single ASCII character other than a quote or newline", delimiter);
    }
    Ok(delimiter as u8)
}

/// `0` means one worker per CPU core.
pub fn resolve_workers(requested: usize) -> usize {
    if requested == 0 {
        num_cpus::get()
    } else {
        requested
    }
}

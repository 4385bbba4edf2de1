use crate::error::SplitError;
use crate::naming::{sanitize_identifier, DuplicateResolver, DEFAULT_TOKEN};
use flate2::read::GzDecoder;
use log::{debug, info, warn};
use serde_json::Value;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

pub const DEFAULT_IDENTIFIER_FIELD: &str = "publicIdentifier";

#[derive(Debug, Clone)]
pub struct SplitOptions {
    pub identifier_field: String,
    pub fallback_prefix: String,
    pub pretty: bool,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            identifier_field: DEFAULT_IDENTIFIER_FIELD.to_string(),
            fallback_prefix: DEFAULT_TOKEN.to_string(),
            pretty: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SplitStats {
    pub lines: usize,
    pub written: usize,
    pub invalid: usize,
    pub failed: usize,
}

/// Opens `path`, transparently decompressing `.gz` files.
fn open_lines(path: &Path) -> Result<Box<dyn BufRead>, SplitError> {
    let file = File::open(path).map_err(|source| SplitError::Open { path: path.to_path_buf(), source })?;
    let is_gz = path.extension().map_or(false, |e| e.eq_ignore_ascii_case("gz"));
    let reader: Box<dyn Read> = if is_gz { Box::new(GzDecoder::new(file)) } else { Box::new(file) };
    Ok(Box::new(BufReader::new(reader)))
}

/// Writes each JSON object line of `input` to its own file in `output_dir`,
/// named after the record's identifier field.
pub fn split_records(input: &Path, output_dir: &Path, options: &SplitOptions) -> Result<SplitStats, SplitError> {
    fs::create_dir_all(output_dir).map_err(|source| SplitError::CreateDir { path: output_dir.to_path_buf(), source })?;
    let reader = open_lines(input)?;

    let mut names = DuplicateResolver::new();
    let mut stats = SplitStats::default();
    for (index, line) in reader.lines().enumerate() {
        let line_num = index + 1;
        stats.lines += 1;
        let line = line.map_err(|source| SplitError::Read { path: input.to_path_buf(), line: line_num, source })?;
        if line.trim().is_empty() {
            continue;
        }

        let record = match serde_json::from_str::<Value>(&line) {
            Ok(value @ Value::Object(_)) => value,
            Ok(_) => {
                warn!("Line {} of {} is not a JSON object, skipping", line_num, input.display());
                stats.invalid += 1;
                continue;
            }
            Err(e) => {
                warn!("Error parsing line {} of {}: {}", line_num, input.display(), e);
                stats.invalid += 1;
                continue;
            }
        };

        let token = record_token(&record, line_num, options);
        let output_path = output_dir.join(format!("{}.json", names.resolve(&token)));
        match write_record(&record, &output_path, options.pretty) {
            Ok(()) => {
                debug!("Created file: {}", output_path.display());
                stats.written += 1;
            }
            Err(e) => {
                warn!("Error writing line {} to {}: {}", line_num, output_path.display(), e);
                stats.failed += 1;
            }
        }
    }
    info!(
        "Processed {} lines, created {} files in {}",
        stats.lines,
        stats.written,
        output_dir.display()
    );
    Ok(stats)
}

fn record_token(record: &Value, line_num: usize, options: &SplitOptions) -> String {
    match record.get(&options.identifier_field).and_then(Value::as_str) {
        Some(id) => sanitize_identifier(id, &options.fallback_prefix),
        None => format!("{}_{}", options.fallback_prefix, line_num),
    }
}

fn write_record(record: &Value, path: &Path, pretty: bool) -> anyhow::Result<()> {
    let bytes = if pretty { serde_json::to_vec_pretty(record)? } else { serde_json::to_vec(record)? };
    fs::write(path, bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::TempDir;

    fn names_in(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn splits_lines_into_named_files() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("profiles.jsonl");
        fs::write(
            &input,
            concat!(
                "{\"publicIdentifier\":\"alice\",\"n\":1}\n",
                "\n",
                "{\"publicIdentifier\":\"alice\",\"n\":2}\n",
                "{\"publicIdentifier\":\"Jo/hn:Doe\"}\n",
                "{\"publicIdentifier\":42}\n",
                "{\"other\":true}\n",
                "not json\n",
                "[1,2]\n",
            ),
        )
        .unwrap();
        let out = dir.path().join("split");
        let stats = split_records(&input, &out, &SplitOptions::default()).unwrap();
        assert_eq!(stats, SplitStats { lines: 8, written: 5, invalid: 2, failed: 0 });
        assert_eq!(
            names_in(&out),
            vec!["Jo_hn_Doe.json", "alice.json", "alice_1.json", "item_5.json", "item_6.json"]
        );
        let second: Value = serde_json::from_str(&fs::read_to_string(out.join("alice_1.json")).unwrap()).unwrap();
        assert_eq!(second["n"], 2);
    }

    #[test]
    fn reads_gzip_input() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("profiles.jsonl.gz");
        let mut encoder = GzEncoder::new(File::create(&input).unwrap(), Compression::default());
        encoder.write_all(b"{\"publicIdentifier\":\"bob\"}\n").unwrap();
        encoder.finish().unwrap();

        let out = dir.path().join("split");
        let options = SplitOptions { pretty: true, ..SplitOptions::default() };
        let stats = split_records(&input, &out, &options).unwrap();
        assert_eq!(stats.written, 1);
        let content = fs::read_to_string(out.join("bob.json")).unwrap();
        assert!(content.contains("\n  \"publicIdentifier\": \"bob\""));
    }

    #[test]
    fn missing_input_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = split_records(&dir.path().join("missing.jsonl"), dir.path(), &SplitOptions::default()).unwrap_err();
        assert!(matches!(err, SplitError::Open { .. }));
    }
}

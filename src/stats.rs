use crate::artifact::ArtifactKind;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::time::Duration;

const MAX_LISTED_FAILURES: usize = 10;

/// Counters for one dispatch run. `total` is fixed up front, so
/// `successful + failed + skipped <= total` holds while jobs are in flight
/// and becomes an equality once every job has reported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessingStats {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    pub successful_by_kind: BTreeMap<ArtifactKind, usize>,
    pub failed_paths: Vec<PathBuf>,
    pub elapsed: Duration,
}

impl ProcessingStats {
    pub fn new(total: usize) -> Self {
        Self { total, ..Default::default() }
    }

    pub fn record_success(&mut self, kind: ArtifactKind) {
        self.successful += 1;
        *self.successful_by_kind.entry(kind).or_insert(0) += 1;
    }

    pub fn record_failure(&mut self, path: PathBuf) {
        self.failed += 1;
        self.failed_paths.push(path);
    }

    pub fn record_skip(&mut self) {
        self.skipped += 1;
    }

    pub fn completed(&self) -> usize {
        self.successful + self.failed + self.skipped
    }

    pub fn is_complete(&self) -> bool {
        self.completed() == self.total
    }

    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Total execution time: {}", format_elapsed(self.elapsed));
        let _ = writeln!(out, "Artifacts found: {}", self.total);
        let _ = writeln!(out, "Processed successfully: {}", self.successful);
        for (kind, count) in &self.successful_by_kind {
            let _ = writeln!(out, "  - {}: {}", kind, count);
        }
        let _ = writeln!(out, "Failed: {}", self.failed);
        for path in self.failed_paths.iter().take(MAX_LISTED_FAILURES) {
            let _ = writeln!(out, "  - {}", path.display());
        }
        if self.failed_paths.len() > MAX_LISTED_FAILURES {
            let _ = writeln!(out, "  ... (and {} more)", self.failed_paths.len() - MAX_LISTED_FAILURES);
        }
        let _ = write!(out, "Skipped: {}", self.skipped);
        out
    }
}

pub fn format_elapsed(elapsed: Duration) -> String {
    let total_secs = elapsed.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    let millis = elapsed.subsec_millis();
    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}.{:03}s", seconds, millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_add_up_to_total() {
        let mut stats = ProcessingStats::new(4);
        stats.record_success(ArtifactKind::Structured);
        stats.record_success(ArtifactKind::Text);
        assert!(!stats.is_complete());
        stats.record_failure(PathBuf::from("broken.json"));
        stats.record_skip();
        assert!(stats.is_complete());
        assert_eq!(stats.successful_by_kind.get(&ArtifactKind::Structured), Some(&1));
        assert_eq!(stats.successful_by_kind.get(&ArtifactKind::Text), Some(&1));
    }

    #[test]
    fn summary_truncates_failure_list() {
        let mut stats = ProcessingStats::new(12);
        for i in 0..12 {
            stats.record_failure(PathBuf::from(format!("f{}.json", i)));
        }
        let summary = stats.summary();
        assert!(summary.contains("Failed: 12"));
        assert!(summary.contains("f9.json"));
        assert!(!summary.contains("f10.json"));
        assert!(summary.contains("(and 2 more)"));
    }

    #[test]
    fn elapsed_formatting() {
        assert_eq!(format_elapsed(Duration::from_millis(1_250)), "1.250s");
        assert_eq!(format_elapsed(Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_elapsed(Duration::from_secs(3_725)), "1h 2m 5s");
    }
}

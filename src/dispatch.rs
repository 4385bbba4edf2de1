//! Bounded-concurrency fan-out of artifact transformations.
//!
//! Jobs run on a dedicated rayon pool sized to the worker limit, so at most
//! `max_workers` transformer calls are in flight at any instant. Workers never
//! touch shared state directly: each one sends a [`JobReport`] over a channel
//! to a single aggregation thread, which owns the [`ProcessingStats`] and the
//! [`RunLog`] for the duration of the run.

use crate::artifact::{ArtifactFile, ArtifactKind, TransformJob};
use crate::error::{DispatchError, JobError};
use crate::runlog::{LogLevel, RunLog};
use crate::stats::{format_elapsed, ProcessingStats};
use crate::transform::Transformer;
use crossbeam_channel::{bounded, Receiver};
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Instant;

pub const DEFAULT_INPUT_PATTERNS: [&str; 2] = ["*.json", "*.txt"];
pub const DEFAULT_OUTPUT_EXTENSION: &str = "md";

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Glob patterns relative to the input directory, scanned in order.
    pub input_patterns: Vec<String>,
    pub output_extension: String,
    pub show_progress: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            input_patterns: DEFAULT_INPUT_PATTERNS.iter().map(|p| p.to_string()).collect(),
            output_extension: DEFAULT_OUTPUT_EXTENSION.to_string(),
            show_progress: false,
        }
    }
}

#[derive(Debug)]
pub enum JobOutcome {
    Succeeded,
    Skipped,
    Failed(JobError),
}

#[derive(Debug)]
pub struct JobReport {
    pub job: TransformJob,
    pub outcome: JobOutcome,
}

pub struct Dispatcher {
    transformer: Box<dyn Transformer>,
    config: DispatchConfig,
    log: RunLog,
}

impl Dispatcher {
    pub fn new(transformer: Box<dyn Transformer>, config: DispatchConfig, log: RunLog) -> Self {
        Self { transformer, config, log }
    }

    pub fn into_log(self) -> RunLog {
        self.log
    }

    /// Transforms every recognised artifact in `input_dir` into
    /// `output_dir`, running at most `max_workers` jobs at once. Returns only
    /// after every job has reported. Job failures are counted, not returned.
    pub fn run(
        &mut self,
        input_dir: &Path,
        output_dir: &Path,
        max_workers: usize,
    ) -> Result<ProcessingStats, DispatchError> {
        let start_time = Instant::now();
        if max_workers == 0 {
            return Err(DispatchError::InvalidWorkerCount(max_workers));
        }
        let Self { transformer, config, log } = self;
        let transformer: &dyn Transformer = &**transformer;

        let describe = transformer.describe();
        info!("Using transformer: {}", describe);
        log.record(LogLevel::Info, &format!("Using transformer: {}", describe));

        let artifacts = match discover_artifacts(input_dir, &config.input_patterns) {
            Ok(found) => found,
            Err(e) => {
                log.record(LogLevel::Error, &format!("Failed to discover input files: {}", e));
                return Err(e);
            }
        };

        if artifacts.is_empty() {
            let message = format!("No input files found in {}", input_dir.display());
            warn!("{}", message);
            log.record(LogLevel::Warning, &message);
            return Ok(ProcessingStats::new(0));
        }
        let message = format!("Found {} files to process", artifacts.len());
        info!("{}", message);
        log.record(LogLevel::Info, &message);

        let jobs: Vec<TransformJob> = artifacts
            .into_iter()
            .map(|artifact| TransformJob::new(artifact, output_dir, &config.output_extension))
            .collect();
        let stats = ProcessingStats::new(jobs.len());

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(max_workers)
            .thread_name(|i| format!("transform-worker-{}", i))
            .build()?;
        info!("Using {} workers.", max_workers);

        let progress_bar = make_progress_bar(jobs.len(), config.show_progress);
        let channel_capacity = (max_workers * 2).max(16);
        let (report_sender, report_receiver) = bounded::<JobReport>(channel_capacity);

        let mut stats = thread::scope(|scope| {
            let log = &mut *log;
            let progress = &progress_bar;
            let describe = describe.as_str();
            let aggregator = scope.spawn(move || aggregate(report_receiver, stats, log, progress, describe));

            pool.install(|| {
                jobs.into_par_iter().for_each_with(report_sender, |sender, job| {
                    let outcome = execute(transformer, &job);
                    if let Err(e) = sender.send(JobReport { job, outcome }) {
                        error!("Aggregation thread stopped early; dropping report for {}", e.0.job.artifact.path.display());
                    }
                });
            });

            match aggregator.join() {
                Ok(stats) => stats,
                Err(panic) => std::panic::resume_unwind(panic),
            }
        });

        stats.elapsed = start_time.elapsed();
        progress_bar.finish_with_message(format!(
            "Processing finished. {} OK, {} failed, {} skipped.",
            stats.successful, stats.failed, stats.skipped
        ));

        let message = format!(
            "Processing completed. Processed {} files in {}.",
            stats.total,
            format_elapsed(stats.elapsed)
        );
        info!("{}", message);
        log.record(LogLevel::Info, &message);
        for line in stats.summary().lines() {
            log.record(LogLevel::Info, line);
        }
        if let Err(e) = log.flush() {
            warn!("Failed to flush run log: {}", e);
        }
        Ok(stats)
    }
}

/// Scans `input_dir` once per pattern and concatenates the results, so the
/// order is pattern-major then file-name order. Paths matched by more than
/// one pattern are kept only at their first position.
pub fn discover_artifacts(input_dir: &Path, patterns: &[String]) -> Result<Vec<ArtifactFile>, DispatchError> {
    fs::read_dir(input_dir).map_err(|source| DispatchError::Discovery {
        dir: input_dir.to_path_buf(),
        source,
    })?;

    let escaped_dir = glob::Pattern::escape(&input_dir.to_string_lossy());
    let mut seen: HashSet<PathBuf> = HashSet::new();
    let mut artifacts = Vec::new();
    for pattern in patterns {
        let full_pattern = Path::new(&escaped_dir).join(pattern);
        let pattern_str = full_pattern.to_string_lossy();
        debug!("Searching for files matching pattern: {}", pattern_str);
        let entries = glob(&pattern_str).map_err(|source| DispatchError::InvalidPattern {
            pattern: pattern.clone(),
            source,
        })?;
        for entry in entries {
            match entry {
                Ok(path) => {
                    if seen.insert(path.clone()) {
                        artifacts.push(ArtifactFile::new(path));
                    }
                }
                Err(e) => warn!("Skipping unreadable entry {}: {}", e.path().display(), e.error()),
            }
        }
    }
    Ok(artifacts)
}

fn execute(transformer: &dyn Transformer, job: &TransformJob) -> JobOutcome {
    if job.artifact.kind == ArtifactKind::Unknown {
        return JobOutcome::Skipped;
    }
    debug!("Transforming {} -> {}", job.artifact.path.display(), job.output_path.display());
    let content = match fs::read(&job.artifact.path) {
        Ok(content) => content,
        Err(source) => {
            return JobOutcome::Failed(JobError::Read { path: job.artifact.path.clone(), source });
        }
    };
    match transformer.transform(&content, &job.output_path) {
        Ok(()) => JobOutcome::Succeeded,
        Err(e) => JobOutcome::Failed(e),
    }
}

fn aggregate(
    reports: Receiver<JobReport>,
    mut stats: ProcessingStats,
    log: &mut RunLog,
    progress: &ProgressBar,
    describe: &str,
) -> ProcessingStats {
    for report in reports {
        let artifact = &report.job.artifact;
        match report.outcome {
            JobOutcome::Succeeded => {
                stats.record_success(artifact.kind);
                let message = format!("Processed '{}' successfully with '{}'.", artifact.path.display(), describe);
                debug!("{}", message);
                log.record(LogLevel::Success, &message);
                progress.set_message(format!("OK: {}", artifact.display_name()));
            }
            JobOutcome::Skipped => {
                stats.record_skip();
                let message = format!("Skipped '{}': unrecognised artifact kind.", artifact.path.display());
                info!("{}", message);
                log.record(LogLevel::Warning, &message);
                progress.set_message(format!("SKIP: {}", artifact.display_name()));
            }
            JobOutcome::Failed(e) => {
                stats.record_failure(artifact.path.clone());
                let message = format!("Failed to process '{}' with '{}': {}", artifact.path.display(), describe, e);
                error!("{}", message);
                log.record(LogLevel::Error, &message);
                progress.set_message(format!("ERR: {}", artifact.display_name()));
            }
        }
        progress.inc(1);
    }
    stats
}

fn make_progress_bar(len: usize, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let progress_bar = ProgressBar::new(len as u64);
    match ProgressStyle::default_bar()
        .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta} @ {per_sec}) {msg}")
    {
        Ok(style) => progress_bar.set_style(style.progress_chars("=> ")),
        Err(e) => warn!("Invalid progress bar template: {}", e),
    }
    progress_bar.set_message("Starting processing...");
    progress_bar
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Copies input to output, tracking how many calls overlap.
    #[derive(Default)]
    struct GaugeTransformer {
        active: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
        calls: Arc<AtomicUsize>,
    }

    impl Transformer for GaugeTransformer {
        fn transform(&self, input: &[u8], output_path: &Path) -> Result<(), JobError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(15));
            let result = fs::write(output_path, input).map_err(|source| JobError::Pipe { program: "gauge".into(), source });
            self.active.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }

    /// Fails every artifact whose name starts with `bad`.
    struct PickyTransformer;

    impl Transformer for PickyTransformer {
        fn transform(&self, input: &[u8], output_path: &Path) -> Result<(), JobError> {
            let name = output_path.file_name().unwrap().to_string_lossy();
            if name.starts_with("bad") {
                return Err(JobError::Spawn {
                    program: "picky".into(),
                    source: io::Error::new(io::ErrorKind::PermissionDenied, format!("refused {}", name)),
                });
            }
            fs::write(output_path, input).map_err(|source| JobError::Pipe { program: "picky".into(), source })
        }
    }

    fn setup(files: &[&str]) -> (TempDir, PathBuf, PathBuf) {
        let root = TempDir::new().unwrap();
        let input = root.path().join("in");
        let output = root.path().join("out");
        fs::create_dir_all(&input).unwrap();
        fs::create_dir_all(&output).unwrap();
        for name in files {
            fs::write(input.join(name), format!("{{\"id\":\"{}\"}}", name)).unwrap();
        }
        (root, input, output)
    }

    #[test]
    fn never_exceeds_worker_limit() {
        let names: Vec<String> = (0..12).map(|i| format!("p{:02}.json", i)).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        for workers in [1, 2, 3, 5] {
            let (_root, input, output) = setup(&refs);
            let gauge = GaugeTransformer::default();
            let peak = Arc::clone(&gauge.peak);
            let calls = Arc::clone(&gauge.calls);
            let mut dispatcher = Dispatcher::new(Box::new(gauge), DispatchConfig::default(), RunLog::discard());
            let stats = dispatcher.run(&input, &output, workers).unwrap();
            assert_eq!(stats.total, 12);
            assert_eq!(stats.successful, 12);
            assert_eq!(calls.load(Ordering::SeqCst), 12);
            let observed = peak.load(Ordering::SeqCst);
            assert!(observed >= 1 && observed <= workers, "peak {} with {} workers", observed, workers);
        }
    }

    #[test]
    fn empty_input_is_a_successful_noop() {
        let (_root, input, output) = setup(&[]);
        let mut dispatcher = Dispatcher::new(Box::new(GaugeTransformer::default()), DispatchConfig::default(), RunLog::discard());
        let stats = dispatcher.run(&input, &output, 3).unwrap();
        assert_eq!(stats.total, 0);
        assert!(stats.is_complete());
    }

    #[test]
    fn failures_are_counted_and_do_not_stop_the_run() {
        let (_root, input, output) = setup(&["bad_one.json", "good.json", "bad_two.txt", "fine.txt"]);
        let mut dispatcher = Dispatcher::new(Box::new(PickyTransformer), DispatchConfig::default(), RunLog::discard());
        let stats = dispatcher.run(&input, &output, 2).unwrap();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.successful, 2);
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.total, stats.successful + stats.failed + stats.skipped);
        assert_eq!(stats.successful_by_kind.get(&ArtifactKind::Structured), Some(&1));
        assert_eq!(stats.successful_by_kind.get(&ArtifactKind::Text), Some(&1));
        assert!(output.join("good.md").exists());
        assert!(!output.join("bad_one.md").exists());
    }

    #[test]
    fn unknown_kinds_are_skipped_without_invoking_the_transformer() {
        let (_root, input, output) = setup(&["a.json", "b.csv"]);
        let gauge = GaugeTransformer::default();
        let calls = Arc::clone(&gauge.calls);
        let config = DispatchConfig {
            input_patterns: vec!["*.json".into(), "*.csv".into()],
            ..DispatchConfig::default()
        };
        let mut dispatcher = Dispatcher::new(Box::new(gauge), config, RunLog::discard());
        let stats = dispatcher.run(&input, &output, 2).unwrap();
        assert_eq!((stats.total, stats.successful, stats.skipped), (2, 1, 1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn missing_input_directory_is_fatal() {
        let root = TempDir::new().unwrap();
        let mut dispatcher = Dispatcher::new(Box::new(PickyTransformer), DispatchConfig::default(), RunLog::discard());
        let err = dispatcher
            .run(&root.path().join("nope"), root.path(), 2)
            .unwrap_err();
        assert!(matches!(err, DispatchError::Discovery { .. }));
    }

    #[test]
    fn zero_workers_is_rejected() {
        let (_root, input, output) = setup(&["a.json"]);
        let mut dispatcher = Dispatcher::new(Box::new(PickyTransformer), DispatchConfig::default(), RunLog::discard());
        assert!(matches!(
            dispatcher.run(&input, &output, 0),
            Err(DispatchError::InvalidWorkerCount(0))
        ));
    }

    #[test]
    fn discovery_is_pattern_major_and_deduplicated() {
        let (_root, input, _output) = setup(&["b.txt", "a.txt", "z.json", "c.json"]);
        let patterns = vec!["*.json".to_string(), "*.txt".to_string(), "*".to_string()];
        let found = discover_artifacts(&input, &patterns).unwrap();
        let names: Vec<String> = found.iter().map(|a| a.display_name()).collect();
        assert_eq!(names, vec!["c.json", "z.json", "a.txt", "b.txt"]);
    }

    #[test]
    fn run_log_gets_one_line_per_job() {
        let (root, input, output) = setup(&["good.json", "bad.json"]);
        let log_path = root.path().join("logs").join("run.log");
        let log = RunLog::create(&log_path).unwrap();
        let mut dispatcher = Dispatcher::new(Box::new(PickyTransformer), DispatchConfig::default(), log);
        dispatcher.run(&input, &output, 2).unwrap();
        let log = dispatcher.into_log();
        assert_eq!(log.path(), Some(log_path.as_path()));
        drop(log);
        let content = fs::read_to_string(&log_path).unwrap();
        assert_eq!(content.lines().filter(|l| l.contains(" - SUCCESS: ")).count(), 1);
        assert_eq!(content.lines().filter(|l| l.contains(" - ERROR: ")).count(), 1);
        assert!(content.lines().all(|l| l.contains(" - ")));
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_artifact_is_a_failed_job() {
        use std::os::unix::fs::PermissionsExt;

        let (_root, input, output) = setup(&["locked.json", "open.json", "notes.txt"]);
        let locked = input.join("locked.json");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        if fs::read(&locked).is_ok() {
            // Privileged users ignore file modes; there is nothing to observe.
            return;
        }

        let gauge = GaugeTransformer::default();
        let calls = Arc::clone(&gauge.calls);
        let mut dispatcher = Dispatcher::new(Box::new(gauge), DispatchConfig::default(), RunLog::discard());
        let stats = dispatcher.run(&input, &output, 2).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();

        assert_eq!(stats.total, 3);
        assert_eq!((stats.successful, stats.failed, stats.skipped), (2, 1, 0));
        assert_eq!(stats.total, stats.successful + stats.failed + stats.skipped);
        assert_eq!(stats.failed_paths, vec![locked]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!output.join("locked.md").exists());
        assert!(output.join("open.md").exists());
        assert!(output.join("notes.md").exists());
    }

    #[test]
    fn read_failure_reports_the_artifact_path() {
        let root = TempDir::new().unwrap();
        let missing = root.path().join("gone.json");
        let job = TransformJob::new(
            ArtifactFile { path: missing.clone(), kind: ArtifactKind::Structured, base_id: "gone".into() },
            root.path(),
            "md",
        );
        match execute(&PickyTransformer, &job) {
            JobOutcome::Failed(JobError::Read { path, .. }) => assert_eq!(path, missing),
            _ => panic!("expected a read failure"),
        }
    }
}

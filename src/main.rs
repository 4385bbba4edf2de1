use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{error, info, warn, LevelFilter};
use profile_pipeline::config::{delimiter_byte, resolve_workers, ToolkitConfig, DEFAULT_WORKERS};
use profile_pipeline::dispatch::{DispatchConfig, Dispatcher, DEFAULT_INPUT_PATTERNS, DEFAULT_OUTPUT_EXTENSION};
use profile_pipeline::merge::{
    merge_file, MatchStrategy, MergeOptions, DEFAULT_ARTIFACT_EXTENSION, DEFAULT_BODY_COLUMN,
    DEFAULT_HEADLINE_COLUMN, DEFAULT_SUMMARY_COLUMN,
};
use profile_pipeline::runlog::{RunLog, DEFAULT_LOG_DIR, DEFAULT_LOG_FILE};
use profile_pipeline::split::{split_records, SplitOptions};
use profile_pipeline::stats::format_elapsed;
use profile_pipeline::table::LineEnding;
use profile_pipeline::transform::{CommandTransformer, DEFAULT_PATTERN, DEFAULT_TOOL};
use simple_logger::SimpleLogger;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;
use time::macros::format_description;

#[derive(Parser)]
#[command(name = "profile-pipeline")]
#[command(about = "Splits record dumps, summarises each record with an external tool, and attaches the summaries to a CSV table.")]
#[command(version)]
struct Cli {
    #[arg(short, long, global = true, default_value = "INFO", help = "Logging level (DEBUG, INFO, WARN, ERROR)")]
    log_level: String,
    #[arg(short, long, global = true, help = "Enable verbose output (same as --log-level DEBUG)")]
    verbose: bool,
    #[arg(long, global = true, help = "Path to a YAML file with default settings")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Split a JSONL file (optionally gzipped) into one JSON file per record
    Split(SplitArgs),
    /// Run every input file through the summarisation tool
    Process(ProcessArgs),
    /// Attach whole artifacts to one column of a CSV file
    Attach(AttachArgs),
    /// Attach headline/body artifacts to two columns of a CSV file
    AttachMessage(AttachMessageArgs),
}

#[derive(Args)]
struct SplitArgs {
    #[arg(short, long, help = "Path to the JSONL file (.gz is decompressed)")]
    input: PathBuf,
    #[arg(short, long, default_value = "output", help = "Directory to store the output JSON files")]
    output: PathBuf,
    #[arg(long, help = "Record field used to name output files [default: publicIdentifier]")]
    identifier_field: Option<String>,
    #[arg(long, help = "Prefix for output filenames when the identifier is missing [default: item]")]
    fallback_prefix: Option<String>,
    #[arg(long, help = "Format JSON with indentation")]
    pretty: bool,
}

#[derive(Args)]
struct ProcessArgs {
    #[arg(short, long, default_value = "data/test/split", help = "Folder containing input files")]
    input: PathBuf,
    #[arg(short, long, default_value = "data/test/profile", help = "Folder for generated artifacts")]
    output: PathBuf,
    #[arg(long, help = "Folder for the run log [default: logs]")]
    logdir: Option<PathBuf>,
    #[arg(long, help = "Run log file name [default: profile_process.log]")]
    log_file: Option<String>,
    #[arg(short, long, help = "Maximum number of concurrent workers, 0 for one per core [default: 5]")]
    workers: Option<usize>,
    #[arg(long, help = "Summarisation program to invoke [default: fabric]")]
    tool: Option<String>,
    #[arg(long, alias = "fabric-cmd", help = "Pattern passed after -p; extra words become extra arguments [default: summarize_linkedin_profile]")]
    pattern: Option<String>,
    #[arg(long = "input-pattern", help = "Glob for input files, repeatable [default: *.json, *.txt]")]
    input_patterns: Vec<String>,
    #[arg(long, help = "Extension of generated artifacts [default: md]")]
    output_ext: Option<String>,
    #[arg(long, help = "Disable the progress bar")]
    no_progress: bool,
}

#[derive(Args)]
struct TableArgs {
    #[arg(long, default_value = "data/test/csv/data.csv", help = "Path to the CSV file")]
    csv: PathBuf,
    #[arg(long, help = "Output CSV path (defaults to overwriting the input CSV)")]
    output: Option<PathBuf>,
    #[arg(long, help = "Field delimiter [default: ,]")]
    delimiter: Option<char>,
    #[arg(long, help = "Output line ending, crlf or lf [default: crlf]")]
    line_ending: Option<LineEnding>,
    #[arg(long, help = "Require a field equal to the artifact name instead of containing it")]
    exact_match: bool,
    #[arg(long, help = "Artifact file extension [default: md]")]
    extension: Option<String>,
}

#[derive(Args)]
struct AttachArgs {
    #[command(flatten)]
    table: TableArgs,
    #[arg(long, alias = "profiles", default_value = "data/test/profile", help = "Directory containing artifacts")]
    artifacts: PathBuf,
    #[arg(long, default_value = DEFAULT_SUMMARY_COLUMN, help = "Name of the column to add/update")]
    column: String,
}

#[derive(Args)]
struct AttachMessageArgs {
    #[command(flatten)]
    table: TableArgs,
    #[arg(long, alias = "messages", default_value = "data/test/message", help = "Directory containing artifacts")]
    artifacts: PathBuf,
    #[arg(long, default_value = DEFAULT_HEADLINE_COLUMN, help = "Name of the headline column to add/update")]
    head: String,
    #[arg(long, default_value = DEFAULT_BODY_COLUMN, help = "Name of the body column to add/update")]
    body: String,
}

fn parse_level(level: &str) -> LevelFilter {
    match level.to_uppercase().as_str() {
        "DEBUG" => LevelFilter::Debug,
        "INFO" => LevelFilter::Info,
        "WARN" | "WARNING" => LevelFilter::Warn,
        "ERROR" => LevelFilter::Error,
        _ => {
            eprintln!("Invalid log level '{}', defaulting to INFO.", level);
            LevelFilter::Info
        }
    }
}

fn run_split(args: SplitArgs, config: &ToolkitConfig) -> Result<()> {
    let defaults = SplitOptions::default();
    let options = SplitOptions {
        identifier_field: args
            .identifier_field
            .or_else(|| config.split.identifier_field.clone())
            .unwrap_or(defaults.identifier_field),
        fallback_prefix: args
            .fallback_prefix
            .or_else(|| config.split.fallback_prefix.clone())
            .unwrap_or(defaults.fallback_prefix),
        pretty: args.pretty,
    };
    info!("Splitting {} into {}", args.input.display(), args.output.display());
    let stats = split_records(&args.input, &args.output, &options)
        .with_context(|| format!("Failed to split {}", args.input.display()))?;
    if stats.invalid > 0 || stats.failed > 0 {
        warn!("{} invalid lines, {} records could not be written", stats.invalid, stats.failed);
    }
    Ok(())
}

fn run_process(args: ProcessArgs, config: &ToolkitConfig) -> Result<()> {
    let section = &config.process;
    let tool = args.tool.or_else(|| section.tool.clone()).unwrap_or_else(|| DEFAULT_TOOL.to_string());
    let pattern = args.pattern.or_else(|| section.pattern.clone()).unwrap_or_else(|| DEFAULT_PATTERN.to_string());
    let workers = resolve_workers(args.workers.or(section.workers).unwrap_or(DEFAULT_WORKERS));
    let input_patterns = if !args.input_patterns.is_empty() {
        args.input_patterns
    } else {
        section
            .input_patterns
            .clone()
            .unwrap_or_else(|| DEFAULT_INPUT_PATTERNS.iter().map(|p| p.to_string()).collect())
    };
    let output_extension = args
        .output_ext
        .or_else(|| section.output_extension.clone())
        .unwrap_or_else(|| DEFAULT_OUTPUT_EXTENSION.to_string());
    let log_dir = args
        .logdir
        .or_else(|| section.log_dir.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR));
    let log_file = args
        .log_file
        .or_else(|| section.log_file.clone())
        .unwrap_or_else(|| DEFAULT_LOG_FILE.to_string());

    fs::create_dir_all(&args.output)
        .with_context(|| format!("Failed to create output directory: {}", args.output.display()))?;
    let log_path = log_dir.join(log_file);
    let run_log = RunLog::create(&log_path)
        .with_context(|| format!("Failed to initialise log file: {}", log_path.display()))?;
    info!("Initialized log file: {}", log_path.display());

    let transformer = CommandTransformer::new(tool, &pattern);
    let dispatch_config = DispatchConfig {
        input_patterns,
        output_extension,
        show_progress: !args.no_progress,
    };
    let mut dispatcher = Dispatcher::new(Box::new(transformer), dispatch_config, run_log);
    let stats = dispatcher
        .run(&args.input, &args.output, workers)
        .with_context(|| format!("Failed to process files in {}", args.input.display()))?;

    info!("-------------------- FINAL SUMMARY --------------------");
    for line in stats.summary().lines() {
        info!("{}", line);
    }
    if stats.failed > 0 {
        error!("{} of {} files failed; see {}", stats.failed, stats.total, log_path.display());
    }
    info!("-------------------------------------------------------");
    Ok(())
}

fn run_attach(table: TableArgs, artifacts: PathBuf, options: MergeOptions, config: &ToolkitConfig) -> Result<()> {
    let section = &config.attach;
    let delimiter = delimiter_byte(table.delimiter.or(section.delimiter).unwrap_or(','))?;
    let line_ending = table.line_ending.or(section.line_ending).unwrap_or_default();
    let strategy = if table.exact_match || section.exact_match.unwrap_or(false) {
        MatchStrategy::Exact
    } else {
        MatchStrategy::Contains
    };
    let extension = table
        .extension
        .or_else(|| section.extension.clone())
        .unwrap_or_else(|| DEFAULT_ARTIFACT_EXTENSION.to_string());
    let options = options.with_strategy(strategy).with_extension(extension);
    let output = table.output.unwrap_or_else(|| table.csv.clone());

    info!("Processing CSV file: {}", table.csv.display());
    info!("Artifact directory: {}", artifacts.display());
    info!("Output will be written to: {}", output.display());

    let stats = merge_file(&table.csv, &artifacts, &output, &options, delimiter, line_ending)
        .with_context(|| format!("Failed to update {}", table.csv.display()))?;

    info!("CSV update summary:");
    info!("- Attached: {}", stats.attached);
    info!("- Not found: {}", stats.not_found);
    if stats.unreadable > 0 {
        warn!("- Unreadable: {}", stats.unreadable);
    }
    info!("Successfully updated CSV at {}", output.display());
    Ok(())
}

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();

    let log_level = if cli.verbose { LevelFilter::Debug } else { parse_level(&cli.log_level) };
    SimpleLogger::new()
        .with_level(log_level)
        .with_timestamp_format(format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"))
        .init()?;

    let config = ToolkitConfig::load_optional(cli.config.as_deref())?;
    if let Some(path) = &cli.config {
        info!("Loaded configuration from {}", path.display());
    }

    match cli.command {
        Command::Split(args) => run_split(args, &config)?,
        Command::Process(args) => run_process(args, &config)?,
        Command::Attach(args) => {
            let options = MergeOptions::combined(args.column);
            run_attach(args.table, args.artifacts, options, &config)?
        }
        Command::AttachMessage(args) => {
            let options = MergeOptions::headline_body(args.head, args.body);
            run_attach(args.table, args.artifacts, options, &config)?
        }
    }

    info!("Finished in {}", format_elapsed(start_time.elapsed()));
    Ok(())
}

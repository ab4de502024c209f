//! Nocturne CLI - Command-line interface for the Nocturne engine
//!
//! Commands:
//! - sessions: Build per-day sessions from a records file
//! - metrics: Compute time-in-bed/time-asleep for a records file
//! - rollup: Validate cached period rows into weekly/monthly averages
//! - bucket: Map wall-clock times onto the six-PM reference axis
//! - doctor: Diagnose engine configuration

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::{FixedOffset, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use nocturne::bucket::{consistency_band, offset_from_six_pm, reference_instant};
use nocturne::metrics::{stage_durations, window_summary};
use nocturne::rollup::{parse_time_of_day, validate_period_averages};
use nocturne::sessions::build_day_sessions;
use nocturne::types::{AggregatedPeriod, ManualEntry, PeriodType, StageSegment};
use nocturne::{EngineError, ENGINE_VERSION, PRODUCER_NAME};

/// Nocturne - Session segmentation and aggregation engine for sleep timelines
#[derive(Parser)]
#[command(name = "nocturne")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Segment and aggregate sleep timeline data", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build per-day sessions from a records file
    Sessions {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// First day of the range (YYYY-MM-DD)
        #[arg(long)]
        start_date: NaiveDate,

        /// Last day of the range (YYYY-MM-DD)
        #[arg(long)]
        end_date: NaiveDate,

        /// Local UTC offset in seconds (e.g. -18000 for UTC-5)
        #[arg(long, default_value = "0")]
        utc_offset: i32,

        /// Output format
        #[arg(long, default_value = "json")]
        output_format: OutputFormat,
    },

    /// Compute summary metrics for the segments in a records file
    Metrics {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate cached period rows into weekly/monthly averages
    Rollup {
        /// Input file path with aggregated rows (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Period granularity to validate
        #[arg(long, value_enum, default_value = "weekly")]
        period: PeriodArg,

        /// Output format
        #[arg(long, default_value = "json")]
        output_format: OutputFormat,
    },

    /// Map wall-clock times onto the six-PM reference axis
    Bucket {
        /// Times of day (HH:MM or HH:MM:SS)
        #[arg(required = true)]
        times: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose engine configuration
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

#[derive(Clone, Copy, ValueEnum)]
enum PeriodArg {
    Weekly,
    Monthly,
}

impl From<PeriodArg> for PeriodType {
    fn from(arg: PeriodArg) -> Self {
        match arg {
            PeriodArg::Weekly => PeriodType::Weekly,
            PeriodArg::Monthly => PeriodType::Monthly,
        }
    }
}

/// Records file accepted by `sessions` and `metrics`
#[derive(Deserialize)]
struct RecordsInput {
    #[serde(default)]
    segments: Vec<StageSegment>,
    #[serde(default)]
    manual_entries: Vec<ManualEntry>,
}

#[derive(Serialize)]
struct BucketLine {
    time: String,
    offset_minutes: i64,
    reference_instant: String,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Sessions {
            input,
            start_date,
            end_date,
            utc_offset,
            output_format,
        } => cmd_sessions(&input, start_date, end_date, utc_offset, output_format),

        Commands::Metrics { input, json } => cmd_metrics(&input, json),

        Commands::Rollup {
            input,
            period,
            output_format,
        } => cmd_rollup(&input, period.into(), output_format),

        Commands::Bucket { times, json } => cmd_bucket(&times, json),

        Commands::Doctor { json } => cmd_doctor(json),
    }
}

fn cmd_sessions(
    input: &Path,
    start_date: NaiveDate,
    end_date: NaiveDate,
    utc_offset: i32,
    output_format: OutputFormat,
) -> Result<(), CliError> {
    let records: RecordsInput = serde_json::from_str(&read_input(input)?)?;
    let offset = FixedOffset::east_opt(utc_offset)
        .ok_or_else(|| CliError::BadArgument(format!("offset {utc_offset} out of range")))?;

    let sessions = build_day_sessions(
        &records.segments,
        &records.manual_entries,
        start_date,
        end_date,
        offset,
    )?;

    println!("{}", format_json(&sessions, &output_format)?);
    Ok(())
}

fn cmd_metrics(input: &Path, json: bool) -> Result<(), CliError> {
    let records: RecordsInput = serde_json::from_str(&read_input(input)?)?;
    let summary = window_summary(&records.segments, &records.manual_entries);
    let stages = stage_durations(&records.segments);

    if json {
        let report = serde_json::json!({
            "summary": summary,
            "stages": stages,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    match summary {
        Some(summary) => {
            println!("Time in bed: {} min", summary.time_in_bed_seconds / 60);
            println!("Time asleep: {} min", summary.time_asleep_seconds / 60);
            println!(
                "Stages: deep {} min, core {} min, rem {} min, awake {} min",
                stages.deep_seconds / 60,
                stages.core_seconds / 60,
                stages.rem_seconds / 60,
                stages.awake_seconds / 60
            );
        }
        None => println!("No data"),
    }
    Ok(())
}

fn cmd_rollup(
    input: &Path,
    period_type: PeriodType,
    output_format: OutputFormat,
) -> Result<(), CliError> {
    let rows: Vec<AggregatedPeriod> = serde_json::from_str(&read_input(input)?)?;
    let averages = validate_period_averages(&rows, period_type)?;
    println!("{}", format_json(&averages, &output_format)?);
    Ok(())
}

fn cmd_bucket(times: &[String], json: bool) -> Result<(), CliError> {
    let mut parsed: Vec<(String, NaiveTime)> = Vec::new();
    for raw in times {
        let time = parse_time_of_day(raw)
            .ok_or_else(|| CliError::BadArgument(format!("unparseable time {raw:?}")))?;
        parsed.push((raw.clone(), time));
    }

    let lines: Vec<BucketLine> = parsed
        .iter()
        .map(|(raw, time)| {
            Ok(BucketLine {
                time: raw.clone(),
                offset_minutes: offset_from_six_pm(*time),
                reference_instant: reference_instant(*time)?.to_rfc3339(),
            })
        })
        .collect::<Result<_, EngineError>>()?;
    let band = consistency_band(&parsed.iter().map(|(_, t)| *t).collect::<Vec<_>>());

    if json {
        let report = serde_json::json!({
            "times": lines,
            "consistency_band": band.map(|b| {
                serde_json::json!({
                    "mean_offset_minutes": b.mean_offset_minutes,
                    "lower_minutes": b.lower_minutes,
                    "upper_minutes": b.upper_minutes,
                })
            }),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for line in &lines {
        println!(
            "{}  offset {} min  ({})",
            line.time, line.offset_minutes, line.reference_instant
        );
    }
    if let Some(band) = band {
        println!(
            "Consistency band: {:.1} min ± 30 ({:.1}..{:.1})",
            band.mean_offset_minutes, band.lower_minutes, band.upper_minutes
        );
    }
    Ok(())
}

fn cmd_doctor(json: bool) -> Result<(), CliError> {
    let stdin_mode = if atty::is(atty::Stream::Stdin) {
        "stdin is a TTY (interactive mode)"
    } else {
        "stdin is a pipe (records can be streamed)"
    };

    if json {
        let report = serde_json::json!({
            "producer": PRODUCER_NAME,
            "version": ENGINE_VERSION,
            "stdin": stdin_mode,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Nocturne Doctor Report");
        println!("======================");
        println!("Producer: {PRODUCER_NAME}");
        println!("Version:  {ENGINE_VERSION}");
        println!("Stdin:    {stdin_mode}");
    }
    Ok(())
}

// Helper functions

fn read_input(path: &Path) -> Result<String, CliError> {
    if path.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

fn format_json<T: Serialize>(value: &T, format: &OutputFormat) -> Result<String, CliError> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string(value)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(value)?),
    }
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("{0}")]
    BadArgument(String),
}

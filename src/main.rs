// Replay and inspection tool for the plate / ID-card normalization pipeline

use chrono::Utc;
use clap::{Parser, Subcommand};
use gatepass::{
    models::{Domain, RawObservation, RecordState},
    pipeline::{ObservationOutcome, PipelineSummary},
    processing::Normalizer,
    sink::JsonLinesSink,
    utils::GateError,
    verification::AccessEvent,
    ObservationPipeline, PipelineConfig,
};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "gatepass", version, about = "Normalize and deduplicate plate and ID-card OCR reads")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay newline-delimited JSON observations through one session
    Replay {
        /// Observations file, `-` for stdin
        input: PathBuf,
        /// Pipeline configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Write eligible records here as JSON lines
        #[arg(short, long)]
        records: Option<PathBuf>,
        /// Pair plates with ID cards seen close together
        #[arg(long)]
        match_access: bool,
        /// Print the session summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Normalize a single OCR string
    Normalize {
        #[arg(short, long, default_value = "vehicle_plate")]
        domain: Domain,
        text: String,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Write the default configuration to a file
    InitConfig { path: PathBuf },
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig, GateError> {
    match path {
        Some(path) => PipelineConfig::load(path),
        None => Ok(PipelineConfig::default()),
    }
}

#[derive(Serialize)]
struct ReplayReport {
    #[serde(flatten)]
    summary: PipelineSummary,
    access_events: Vec<AccessEvent>,
}

fn replay(
    input: &Path,
    config: PipelineConfig,
    records: Option<&Path>,
) -> Result<ReplayReport, GateError> {
    let reader: Box<dyn BufRead> = if input.as_os_str() == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        Box::new(BufReader::new(File::open(input)?))
    };

    let label = input.display().to_string();
    let mut pipeline = ObservationPipeline::new(&config, label)?;
    if let Some(path) = records {
        let writer = BufWriter::new(File::create(path)?);
        pipeline = pipeline.with_sink(Box::new(JsonLinesSink::new(writer)));
    }

    let mut access_events = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let observation: RawObservation = match serde_json::from_str(&line) {
            Ok(observation) => observation,
            Err(err) => {
                log::warn!("line {}: skipping unreadable observation: {}", line_no + 1, err);
                continue;
            }
        };
        if let ObservationOutcome::Accepted(accepted) = pipeline.process(&observation) {
            access_events.extend(accepted.access_events);
        }
    }

    // end of input: nothing else can arrive for reads still waiting
    access_events.extend(pipeline.expire_access(Utc::now()));

    Ok(ReplayReport {
        summary: pipeline.finish(),
        access_events,
    })
}

fn print_report(report: &ReplayReport) {
    let summary = &report.summary;
    let session = &summary.session;
    println!("\n===============================================");
    println!("      SESSION REPORT: {}", session.label);
    println!("===============================================\n");

    println!("RECORDS:");
    if session.records.is_empty() {
        println!("  (none)");
    }
    for record in &session.records {
        println!(
            "  {:<14} {:<14} seen {:>3}x  best {:.3}  first source {}  {}",
            record.display_text,
            record.domain.to_string(),
            record.observation_count,
            record.best_confidence,
            record.first_seen,
            match record.state {
                RecordState::Eligible => "ELIGIBLE",
                RecordState::Pending => "PENDING",
            }
        );
    }

    println!("\nREJECTION RATES:");
    for domain in Domain::ALL {
        let stats = session.stats.domain(domain);
        println!(
            "  {:<14} {:>5} observed  {:>5} malformed  {:>5} mismatched  ({:.1}% rejected)",
            domain.to_string(),
            stats.observations,
            stats.rejected_malformed,
            stats.rejected_grammar,
            stats.rejection_rate() * 100.0
        );
    }
    if session.stats.sink_failures > 0 {
        println!("  record sink failures: {}", session.stats.sink_failures);
    }

    if let Some(access) = &summary.access {
        println!("\nACCESS:");
        println!("  Total Attempts: {}", access.stats.total_attempts);
        println!("  Access Granted: {}", access.stats.access_granted);
        println!("  Access Denied:  {}", access.stats.access_denied);
        println!("  Both Verified:  {}", access.stats.both_verified);
        println!("  Vehicle Only:   {}", access.stats.vehicle_only);
        println!("  ID Card Only:   {}", access.stats.id_card_only);
        println!("  Unmatched:      {}", access.unmatched);
        for event in &report.access_events {
            println!(
                "  {}  {:<9} {:<8} plate {:<12} id {:<10} {}",
                event.at.format("%Y-%m-%d %H:%M:%S"),
                format!("{:?}", event.status),
                format!("{:?}", event.decision),
                event.plate.as_deref().unwrap_or("-"),
                event.moodle_id.as_deref().unwrap_or("-"),
                event.reason.as_deref().unwrap_or("")
            );
        }
    }
}

fn main() -> Result<(), GateError> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Replay {
            input,
            config,
            records,
            match_access,
            json,
        } => {
            let mut config = load_config(config.as_deref())?;
            if match_access {
                config.access.enabled = true;
            }
            let report = replay(&input, config, records.as_deref())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }
        Command::Normalize {
            domain,
            text,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            let normalizer = Normalizer::from_config(&config)?;
            match normalizer.normalize(&text, domain) {
                Ok(normalized) => {
                    println!("key:     {}", normalized.canonical_key);
                    println!("display: {}", normalized.display_text);
                }
                Err(rejection) => println!("rejected: {}", rejection),
            }
        }
        Command::InitConfig { path } => {
            PipelineConfig::default().save(&path)?;
            println!("Default configuration written to {}", path.display());
        }
    }

    Ok(())
}

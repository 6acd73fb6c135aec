//! PDF Redaction Audit - Command Line Interface
//! Author: kartik4091
//! Created: 2025-06-06
//!
//! Audits a PDF or a directory of PDFs for overlay redactions and privacy
//! risks, and writes a text, JSON or CSV report.

use std::path::{Path, PathBuf};
use std::process;

use clap::{Arg, ArgAction, ArgMatches, Command, ValueEnum};
use pdx_audit::config::{AuditConfig, ExtractionMode, TierScheme};
use pdx_audit::report::{write_atomic, TOOL_NAME};
use pdx_audit::{collect_inputs, run_on_audit_runtime, AuditPipeline, BatchReport, CancellationFlag, Error, ReportFormat, ReportFormatter};
use tracing::{error, info, warn};

const DEFAULT_PREVIEW_CHARS: usize = 40;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable summary (default)
    Text,
    /// Full batch report as JSON
    Json,
    /// One row per document
    Csv,
}

impl From<OutputFormat> for ReportFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Text => ReportFormat::PlainText,
            OutputFormat::Json => ReportFormat::Json,
            OutputFormat::Csv => ReportFormat::Csv,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    /// Error messages only
    Error,
    /// Warning and error messages
    Warn,
    /// Info, warning, and error messages (default)
    Info,
    /// Debug and all messages
    Debug,
    /// Trace and all messages (most verbose)
    Trace,
}

fn main() {
    let matches = match build_cli().try_get_matches() {
        Ok(matches) => matches,
        Err(e) => {
            // --help and --version land here too
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            process::exit(code);
        }
    };

    let log_level = if matches.get_flag("quiet") {
        LogLevel::Error
    } else {
        matches.get_one::<LogLevel>("verbose").copied().unwrap_or(LogLevel::Info)
    };
    init_logging(log_level);

    info!("🚀 {} v{} - Starting...", TOOL_NAME, env!("CARGO_PKG_VERSION"));

    // Audits abandoned after a timeout must not keep the process alive
    let outcome = run_on_audit_runtime(run(&matches)).and_then(|result| result);
    if let Err(e) = outcome {
        if e.is_fatal() {
            error!("❌ Cannot start audit: {}", e);
        } else {
            error!("❌ Audit run failed: {}", e);
        }
        process::exit(1);
    }
}

async fn run(matches: &ArgMatches) -> Result<(), Error> {
    let config = build_config(matches)?;
    let input = matches
        .get_one::<PathBuf>("input")
        .ok_or_else(|| Error::InvalidArgument("missing INPUT".into()))?;
    let format: ReportFormat = matches
        .get_one::<OutputFormat>("format")
        .copied()
        .unwrap_or(OutputFormat::Text)
        .into();
    let output = matches.get_one::<PathBuf>("output");

    let paths = collect_inputs(input, config.batch.recursive)?;
    if paths.is_empty() {
        warn!("⚠️  No PDF files found under {}", input.display());
    }
    display_config_summary(&config, input, paths.len());

    let pipeline = AuditPipeline::with_lopdf(config);
    let cancel = CancellationFlag::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("🛑 Interrupt received, finishing documents in flight");
            on_interrupt.cancel();
        }
    });

    let reports = pipeline.audit_corpus(paths, cancel).await;
    let batch = BatchReport::new(reports);
    let rendered = ReportFormatter::format(&batch, format)?;

    match output {
        Some(path) => {
            write_atomic(path, &rendered)?;
            info!("📋 Report written: {}", path.display());
        }
        None => print!("{}", rendered),
    }

    display_completion_summary(&batch);
    pipeline.metrics().snapshot().log();
    Ok(())
}

fn build_cli() -> Command {
    Command::new("redaction-audit")
        .version(env!("CARGO_PKG_VERSION"))
        .author("kartik4091")
        .about("Audits PDFs for overlay redactions and privacy risks without extracting their text")
        .long_about("Flags pages where opaque boxes cover live text, detects hidden text and scores \
                    each document on metadata, signatures, scripts, OCR layers, attachments and \
                    revision history. Findings are risk indicators that require manual verification.")

        // Input/Output
        .arg(Arg::new("input")
            .value_name("INPUT")
            .value_parser(clap::value_parser!(PathBuf))
            .help("PDF file or directory of PDFs")
            .required(true))

        .arg(Arg::new("recursive")
            .short('r')
            .long("recursive")
            .action(ArgAction::SetTrue)
            .help("Descend into subdirectories"))

        .arg(Arg::new("output")
            .short('o')
            .long("output")
            .value_name("FILE")
            .value_parser(clap::value_parser!(PathBuf))
            .help("Write the report to FILE instead of stdout"))

        .arg(Arg::new("format")
            .short('f')
            .long("format")
            .value_parser(clap::value_parser!(OutputFormat))
            .default_value("text")
            .help("Report format"))

        // Configuration
        .arg(Arg::new("config")
            .short('c')
            .long("config")
            .value_name("FILE")
            .value_parser(clap::value_parser!(PathBuf))
            .help("Configuration file (JSON/YAML)"))

        // Detection thresholds
        .arg(Arg::new("black-threshold")
            .long("black-threshold")
            .value_name("VALUE")
            .value_parser(clap::value_parser!(f64))
            .help("Maximum channel value of a near-black fill [default: 0.15]"))

        .arg(Arg::new("min-overlap-area")
            .long("min-overlap-area")
            .value_name("PT2")
            .value_parser(clap::value_parser!(f64))
            .help("Minimum fill/text intersection area in square points [default: 4.0]"))

        .arg(Arg::new("min-hits")
            .long("min-hits")
            .value_name("N")
            .value_parser(clap::value_parser!(usize))
            .help("Overlapping fills needed to flag a page [default: 1]"))

        .arg(Arg::new("no-security-audit")
            .long("no-security-audit")
            .action(ArgAction::SetTrue)
            .help("Only run the overlay detector"))

        .arg(Arg::new("tier-scheme")
            .long("tier-scheme")
            .value_parser(clap::value_parser!(TierScheme))
            .help("Risk tier thresholds [default: default]"))

        .arg(Arg::new("validation-mode")
            .long("validation-mode")
            .action(ArgAction::SetTrue)
            .help("Include short previews of flagged text for manual verification"))

        .arg(Arg::new("preview-chars")
            .long("preview-chars")
            .value_name("N")
            .value_parser(clap::value_parser!(usize))
            .requires("validation-mode")
            .help("Characters kept per preview in validation mode [default: 40]"))

        // Execution
        .arg(Arg::new("jobs")
            .short('j')
            .long("jobs")
            .value_name("N")
            .value_parser(clap::value_parser!(usize))
            .help("Documents audited concurrently [default: number of CPUs]"))

        .arg(Arg::new("timeout")
            .long("timeout")
            .value_name("SECS")
            .value_parser(clap::value_parser!(u64))
            .help("Time budget per document in seconds [default: 120]"))

        // Logging
        .arg(Arg::new("verbose")
            .short('v')
            .long("verbose")
            .value_parser(clap::value_parser!(LogLevel))
            .default_value("info")
            .help("Set logging verbosity"))

        .arg(Arg::new("quiet")
            .short('q')
            .long("quiet")
            .action(ArgAction::SetTrue)
            .help("Suppress all output except errors"))
}

/// Config file (if any) with command-line overrides applied
fn build_config(matches: &ArgMatches) -> Result<AuditConfig, Error> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => AuditConfig::load(path)?,
        None => AuditConfig::default(),
    };

    if let Some(&value) = matches.get_one::<f64>("black-threshold") {
        config.overlay.black_threshold = value;
    }
    if let Some(&value) = matches.get_one::<f64>("min-overlap-area") {
        config.overlay.min_overlap_area = value;
    }
    if let Some(&value) = matches.get_one::<usize>("min-hits") {
        config.overlay.min_hits = value;
    }
    if let Some(&scheme) = matches.get_one::<TierScheme>("tier-scheme") {
        config.tiers.scheme = scheme;
    }
    if let Some(&jobs) = matches.get_one::<usize>("jobs") {
        config.batch.max_concurrent = jobs;
    }
    if let Some(&secs) = matches.get_one::<u64>("timeout") {
        config.batch.document_timeout_secs = secs;
    }
    if matches.get_flag("recursive") {
        config.batch.recursive = true;
    }
    if matches.get_flag("no-security-audit") {
        config.structural.enabled = false;
    }
    if matches.get_flag("validation-mode") {
        let preview_chars = matches
            .get_one::<usize>("preview-chars")
            .copied()
            .or(config.extraction.preview_chars())
            .unwrap_or(DEFAULT_PREVIEW_CHARS);
        config.extraction = ExtractionMode::Validation { preview_chars };
    }

    config
        .validate()
        .map_err(|e| match e {
            Error::InvalidConfiguration(msg) => Error::InvalidArgument(msg),
            other => other,
        })?;
    Ok(config)
}

fn init_logging(level: LogLevel) {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    let filter_level = match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::new(format!(
            "pdx_audit={0},redaction_audit={0}",
            filter_level
        )))
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

fn display_config_summary(config: &AuditConfig, input: &Path, documents: usize) {
    info!("📋 Configuration Summary:");
    info!("   Input: {} ({} PDFs)", input.display(), documents);
    info!(
        "   Overlay: black <= {}, overlap >= {} pt2, hits >= {}",
        config.overlay.black_threshold, config.overlay.min_overlap_area, config.overlay.min_hits
    );
    info!("   Tier scheme: {:?}", config.tiers.scheme);
    if !config.structural.enabled {
        info!("   Security audit: disabled");
    }
    if config.extraction.is_validation() {
        warn!("⚠️  Validation mode: report will contain text previews");
    }
}

fn display_completion_summary(batch: &BatchReport) {
    let summary = &batch.summary;
    info!("📊 Audit Summary:");
    info!("   PDFs: {} ({} with errors)", summary.total_pdfs, summary.pdfs_with_errors);
    info!("   Pages: {} ({} flagged)", summary.total_pages, summary.total_flagged_pages);
    info!(
        "   Tiers: {} high, {} medium, {} low",
        summary.high, summary.medium, summary.low
    );
}

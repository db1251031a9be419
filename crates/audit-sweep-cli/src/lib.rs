//! # Audit-Sweep CLI
//!
//! Command-line interface for running audit-log reports.
//!
//! This module provides CLI commands for:
//! - Free-form audit log search
//! - Mailbox forwarding, licence change and file deletion reports
//! - Configuration validation
//! - Shell completion generation

use audit_sweep_core::{
    default_export_path, AuditSearch, AuditSweepError, CsvExportSink, ExportError, ExportSink,
    ExportSummary, HttpAuditLogSource, QueryOutcome, QuerySpec, QueryWindow, RecordType,
    ReportProfile, SummaryField, Timestamp, ValidationError, WorkloadFilter,
};
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod config;

pub use config::{AppConfig, ConfigError, LogFormat};

// ============================================================================
// CLI Structure
// ============================================================================

/// Audit-Sweep CLI - compliance audit log reports
#[derive(Parser, Debug)]
#[command(name = "audit-sweep")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Query the compliance audit log and export reports")]
#[command(
    long_about = "Audit-Sweep pages through the compliance audit log under a single query session, normalises each record and exports the result as CSV"
)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "AUDIT_SWEEP_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Logging level or filter directive; overrides the configured level
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search the audit log with arbitrary filters
    Search {
        #[command(flatten)]
        common: CommonArgs,

        #[command(flatten)]
        filters: SearchFilters,
    },

    /// Report inbox-rule and mailbox forwarding changes
    Forwarding {
        #[command(flatten)]
        common: CommonArgs,
    },

    /// Report user licence changes
    LicenseChanges {
        #[command(flatten)]
        common: CommonArgs,
    },

    /// Report file deletions and recycle-bin activity
    FileDeletions {
        #[command(flatten)]
        common: CommonArgs,
    },

    /// Validate configuration
    Config {
        /// Show resolved configuration
        #[arg(short, long)]
        show: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Flags shared by every report
#[derive(Args, Debug, Clone, Default)]
pub struct CommonArgs {
    /// Window start (RFC 3339 or YYYY-MM-DD); defaults to the report's lookback
    #[arg(long, value_parser = parse_timestamp)]
    pub start: Option<Timestamp>,

    /// Window end (RFC 3339 or YYYY-MM-DD); defaults to now
    #[arg(long, value_parser = parse_timestamp)]
    pub end: Option<Timestamp>,

    /// Look back this many days from now
    #[arg(long, conflicts_with = "start")]
    pub days: Option<u32>,

    /// Restrict to a user id (repeatable or comma-separated)
    #[arg(short, long = "user", value_delimiter = ',')]
    pub users: Vec<String>,

    /// CSV output path; defaults to a timestamped file in the export directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Number of top actors to print
    #[arg(long, default_value_t = 10)]
    pub top: usize,

    /// Records requested per fetch
    #[arg(long)]
    pub page_size: Option<usize>,

    /// Maximum records retrieved per query
    #[arg(long)]
    pub hard_cap: Option<usize>,

    /// Bearer token for the audit endpoint
    #[arg(long, env = "AUDIT_SWEEP_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

/// Filters only the generic search exposes
#[derive(Args, Debug, Clone, Default)]
pub struct SearchFilters {
    /// Restrict to an operation (repeatable or comma-separated)
    #[arg(long = "operation", value_delimiter = ',')]
    pub operations: Vec<String>,

    /// Restrict to one record type
    #[arg(long)]
    pub record_type: Option<String>,

    /// Keep only events whose workload contains this value
    #[arg(long)]
    pub workload: Option<String>,

    /// Keep only events whose workload equals this value
    #[arg(long, conflicts_with = "workload")]
    pub workload_exact: Option<String>,
}

fn parse_timestamp(value: &str) -> Result<Timestamp, ValidationError> {
    Timestamp::parse_lenient(value)
}

// ============================================================================
// CLI Error Types
// ============================================================================

/// CLI-specific errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Invalid argument: {arg} - {message}")]
    InvalidArgument { arg: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    AuditSweep(#[from] AuditSweepError),
}

impl CliError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) => 1,
            Self::InvalidArgument { .. } => 2,
            Self::AuditSweep(e) => match e {
                AuditSweepError::Configuration { .. } => 1,
                AuditSweepError::Window(_) | AuditSweepError::Validation(_) => 2,
                AuditSweepError::Fetch(_) => 3,
                AuditSweepError::Export(_) => 4,
            },
            Self::Io(_) => 5,
        }
    }
}

impl From<ExportError> for CliError {
    fn from(e: ExportError) -> Self {
        Self::AuditSweep(AuditSweepError::Export(e))
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

/// Main CLI entry point
pub async fn run_cli() -> Result<(), CliError> {
    run(Cli::parse()).await
}

/// Execute an already-parsed command line
pub async fn run(cli: Cli) -> Result<(), CliError> {
    // Completions need neither configuration nor logging
    if let Commands::Completions { shell } = cli.command {
        return execute_completions_command(shell, &mut std::io::stdout());
    }

    let config = AppConfig::load(cli.config.as_deref())?;
    initialize_logging(&cli, &config)?;

    match cli.command {
        Commands::Search { common, filters } => {
            execute_report_command(ReportProfile::Search, &common, Some(&filters), &config).await
        }
        Commands::Forwarding { common } => {
            execute_report_command(ReportProfile::MailboxForwarding, &common, None, &config).await
        }
        Commands::LicenseChanges { common } => {
            execute_report_command(ReportProfile::LicenseChange, &common, None, &config).await
        }
        Commands::FileDeletions { common } => {
            execute_report_command(ReportProfile::FileDeletion, &common, None, &config).await
        }
        Commands::Config { show } => execute_config_command(show, &config, &mut std::io::stdout()),
        Commands::Completions { .. } => Ok(()),
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// Initialize logging from CLI flags, falling back to configuration
///
/// `RUST_LOG` takes precedence over both. Logs go to stderr so the report
/// summary on stdout stays clean.
fn initialize_logging(cli: &Cli, config: &AppConfig) -> Result<(), CliError> {
    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&level).map_err(|e| CliError::InvalidArgument {
            arg: "log-level".to_string(),
            message: e.to_string(),
        })?,
    };

    let json = cli.json_logs || config.logging.format == LogFormat::Json;
    let registry = tracing_subscriber::registry().with(filter);

    // A subscriber may already be installed when running inside a test harness
    let _ = if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };

    Ok(())
}

/// A fully validated report run, ready to execute
#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub profile: ReportProfile,
    pub search: AuditSearch,
    pub output: PathBuf,
}

/// Turn command-line arguments and configuration into a report request
///
/// Every input is validated here so that a bad window or filter is rejected
/// before any credentials are needed or any fetch is issued.
pub fn build_report_request(
    profile: ReportProfile,
    common: &CommonArgs,
    filters: Option<&SearchFilters>,
    config: &AppConfig,
    now: Timestamp,
) -> Result<ReportRequest, CliError> {
    let lookback_days = common
        .days
        .unwrap_or_else(|| profile.default_lookback_days());

    let window = QueryWindow::from_request(
        common.start,
        common.end,
        lookback_days,
        now,
        config.query.max_retention_days,
    )
    .map_err(AuditSweepError::from)?;

    let actors = common
        .users
        .iter()
        .map(|u| u.trim())
        .filter(|u| !u.is_empty())
        .map(str::to_string);

    let mut builder = profile.apply(
        QuerySpec::builder(window)
            .actors(actors)
            .page_size(common.page_size.unwrap_or(config.query.page_size))
            .hard_cap(common.hard_cap.unwrap_or(config.query.hard_cap)),
    );

    let mut workload_filter = profile.workload_filter();

    if let Some(filters) = filters {
        builder = builder.operations(
            filters
                .operations
                .iter()
                .map(|o| o.trim())
                .filter(|o| !o.is_empty())
                .map(str::to_string),
        );

        if let Some(record_type) = filters.record_type.as_deref() {
            let record_type = RecordType::new(record_type).map_err(AuditSweepError::from)?;
            builder = builder.record_type(record_type);
        }

        if let Some(token) = filters.workload.as_deref() {
            workload_filter = WorkloadFilter::contains(token);
        } else if let Some(token) = filters.workload_exact.as_deref() {
            workload_filter = WorkloadFilter::exact(token);
        }
    }

    let spec = builder.build().map_err(AuditSweepError::from)?;

    let output = common
        .output
        .clone()
        .unwrap_or_else(|| default_export_path(&config.export.directory, profile.name(), now));

    Ok(ReportRequest {
        profile,
        search: AuditSearch::new(spec).with_workload_filter(workload_filter),
        output,
    })
}

/// Execute one of the report commands
async fn execute_report_command(
    profile: ReportProfile,
    common: &CommonArgs,
    filters: Option<&SearchFilters>,
    config: &AppConfig,
) -> Result<(), CliError> {
    let request = build_report_request(profile, common, filters, config, Timestamp::now())?;

    if config.endpoint.base_url.trim().is_empty() {
        return Err(ConfigError::MissingRequired {
            key: "endpoint.base_url".to_string(),
        }
        .into());
    }

    let token = common
        .token
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ConfigError::MissingRequired {
            key: "token (--token or AUDIT_SWEEP_TOKEN)".to_string(),
        })?;

    info!(
        report = %profile,
        start = %request.search.spec().window().effective_start(),
        end = %request.search.spec().window().end(),
        output = %request.output.display(),
        "Running audit report"
    );

    let source = HttpAuditLogSource::new(&config.client_config(), token)?;
    let outcome = request.search.run(&source).await?;

    let sink = CsvExportSink::new(profile);
    let export = sink.export(&outcome.result.events, &request.output).await;

    let mut stdout = std::io::stdout();
    print_report_summary(&mut stdout, profile, &outcome, export.as_ref().ok(), common.top)?;

    export?;
    Ok(())
}

/// Write the post-run summary
pub fn print_report_summary<W: Write>(
    out: &mut W,
    profile: ReportProfile,
    outcome: &QueryOutcome,
    export: Option<&ExportSummary>,
    top: usize,
) -> std::io::Result<()> {
    let summary = &outcome.result.summary;

    writeln!(out, "Report:        {}", profile)?;
    writeln!(out, "Session:       {}", outcome.session_id)?;
    writeln!(out, "Termination:   {}", outcome.termination)?;
    writeln!(
        out,
        "Retrieved:     {} records in {} batches",
        outcome.cumulative_count, outcome.batch_count
    )?;
    writeln!(
        out,
        "Events:        {} ({} filtered by workload, {} duplicates)",
        summary.total_count, outcome.filtered_out, summary.duplicates_skipped
    )?;
    writeln!(out, "Parse errors:  {}", outcome.result.parse_errors.count())?;
    for sample in outcome.result.parse_errors.samples() {
        writeln!(
            out,
            "  {}: {}",
            sample.record_id.as_deref().unwrap_or("<no id>"),
            sample.message
        )?;
    }

    if let Some(warning) = &outcome.clamp_warning {
        writeln!(out, "Warning:       {}", warning)?;
    }
    if outcome.is_truncated() {
        writeln!(
            out,
            "Warning:       hard cap reached; the log may hold more matching records"
        )?;
    }

    match export {
        Some(export) if export.written => writeln!(
            out,
            "Exported:      {} ({} rows)",
            export.path.display(),
            export.rows
        )?,
        Some(_) => writeln!(out, "Exported:      nothing (no events)")?,
        None => writeln!(out, "Exported:      failed")?,
    }

    let top_actors = outcome.result.top_n(SummaryField::Actor, top);
    if !top_actors.is_empty() {
        writeln!(out, "Top actors:")?;
        for (actor, count) in top_actors {
            writeln!(out, "  {:>6}  {}", count, actor)?;
        }
    }

    Ok(())
}

/// Execute config command
fn execute_config_command<W: Write>(
    show: bool,
    config: &AppConfig,
    out: &mut W,
) -> Result<(), CliError> {
    if show {
        write!(out, "{}", config.to_toml()?)?;
    } else {
        writeln!(out, "Configuration is valid")?;
    }
    Ok(())
}

/// Execute completions command
fn execute_completions_command<W: Write>(
    shell: clap_complete::Shell,
    out: &mut W,
) -> Result<(), CliError> {
    let mut command = Cli::command();
    clap_complete::generate(shell, &mut command, "audit-sweep", out);
    Ok(())
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

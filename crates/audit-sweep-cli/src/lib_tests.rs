//! Tests for the audit-sweep-cli library module.

use super::*;
use audit_sweep_core::{
    FetchError, NormalizedEvent, ReportAccumulator, ParseErrorLog, SessionId, TerminationReason,
    WindowError,
};
use std::collections::BTreeMap;
use std::path::Path;

fn now() -> Timestamp {
    Timestamp::from_rfc3339("2024-06-30T12:00:00Z").unwrap()
}

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(args).unwrap()
}

fn common_of(cli: Cli) -> CommonArgs {
    match cli.command {
        Commands::Search { common, .. }
        | Commands::Forwarding { common }
        | Commands::LicenseChanges { common }
        | Commands::FileDeletions { common } => common,
        other => panic!("Expected a report command, got {:?}", other),
    }
}

// ============================================================================
// Argument Parsing
// ============================================================================

#[test]
fn test_search_parsing() {
    let cli = parse(&[
        "audit-sweep",
        "search",
        "--start",
        "2024-06-01",
        "--user",
        "alice@contoso.com,bob@contoso.com",
        "--operation",
        "FileDeleted",
        "--operation",
        "FileRecycled",
        "--workload",
        "OneDrive",
        "--json-logs",
    ]);

    assert!(cli.json_logs);
    match cli.command {
        Commands::Search { common, filters } => {
            assert_eq!(
                common.start,
                Some(Timestamp::from_rfc3339("2024-06-01T00:00:00Z").unwrap())
            );
            assert_eq!(common.users, vec!["alice@contoso.com", "bob@contoso.com"]);
            assert_eq!(filters.operations, vec!["FileDeleted", "FileRecycled"]);
            assert_eq!(filters.workload.as_deref(), Some("OneDrive"));
            assert_eq!(common.top, 10);
        }
        other => panic!("Expected Search command, got {:?}", other),
    }
}

#[test]
fn test_report_commands_parse() {
    for name in ["forwarding", "license-changes", "file-deletions"] {
        let cli = Cli::try_parse_from(["audit-sweep", name, "--days", "30"]);
        assert!(cli.is_ok(), "{} failed to parse", name);
        assert_eq!(common_of(cli.unwrap()).days, Some(30));
    }
}

#[test]
fn test_report_commands_reject_search_filters() {
    let cli = Cli::try_parse_from(["audit-sweep", "forwarding", "--operation", "Set-Mailbox"]);
    assert!(cli.is_err());
}

#[test]
fn test_days_conflicts_with_start() {
    let cli = Cli::try_parse_from([
        "audit-sweep",
        "search",
        "--days",
        "3",
        "--start",
        "2024-06-01",
    ]);
    assert!(cli.is_err());
}

#[test]
fn test_invalid_date_is_rejected() {
    let cli = Cli::try_parse_from(["audit-sweep", "search", "--end", "last tuesday"]);
    assert!(cli.is_err());
}

// ============================================================================
// Request Building
// ============================================================================

#[test]
fn test_profile_lookback_is_default_window() {
    let common = common_of(parse(&["audit-sweep", "file-deletions"]));

    let request = build_report_request(
        ReportProfile::FileDeletion,
        &common,
        None,
        &AppConfig::default(),
        now(),
    )
    .unwrap();

    let window = request.search.spec().window();
    assert_eq!(window.requested_start(), now().subtract_days(180).unwrap());
    assert_eq!(window.effective_start(), now().subtract_days(90).unwrap());
    assert!(window.was_clamped());
    assert_eq!(
        request.search.workload_filter(),
        &WorkloadFilter::contains("SharePoint")
    );
}

#[test]
fn test_flags_override_configuration() {
    let common = common_of(parse(&[
        "audit-sweep",
        "search",
        "--days",
        "2",
        "--page-size",
        "100",
        "--hard-cap",
        "500",
        "--output",
        "/tmp/out.csv",
    ]));
    let mut config = AppConfig::default();
    config.query.page_size = 1000;
    config.query.hard_cap = 2000;

    let request = build_report_request(ReportProfile::Search, &common, None, &config, now()).unwrap();

    let spec = request.search.spec();
    assert_eq!(spec.page_size(), 100);
    assert_eq!(spec.hard_cap(), 500);
    assert_eq!(spec.window().effective_start(), now().subtract_days(2).unwrap());
    assert_eq!(request.output, PathBuf::from("/tmp/out.csv"));
}

#[test]
fn test_search_filters_reach_the_query() {
    let cli = parse(&[
        "audit-sweep",
        "search",
        "--operation",
        "MailItemsAccessed, ,Send",
        "--record-type",
        "ExchangeItem",
        "--workload",
        "Exchange",
    ]);
    let (common, filters) = match cli.command {
        Commands::Search { common, filters } => (common, filters),
        other => panic!("Expected Search command, got {:?}", other),
    };

    let request = build_report_request(
        ReportProfile::Search,
        &common,
        Some(&filters),
        &AppConfig::default(),
        now(),
    )
    .unwrap();

    let spec = request.search.spec();
    assert_eq!(spec.operation_filter().len(), 2);
    assert_eq!(spec.record_type_filter().map(|r| r.as_str()), Some("ExchangeItem"));
    assert_eq!(
        request.search.workload_filter(),
        &WorkloadFilter::contains("Exchange")
    );
}

#[test]
fn test_exact_workload_filter() {
    let cli = parse(&["audit-sweep", "search", "--workload-exact", "OneDrive"]);
    let (common, filters) = match cli.command {
        Commands::Search { common, filters } => (common, filters),
        other => panic!("Expected Search command, got {:?}", other),
    };

    let request = build_report_request(
        ReportProfile::Search,
        &common,
        Some(&filters),
        &AppConfig::default(),
        now(),
    )
    .unwrap();

    assert_eq!(
        request.search.workload_filter(),
        &WorkloadFilter::exact("OneDrive")
    );
}

#[test]
fn test_workload_flags_conflict() {
    let cli = Cli::try_parse_from([
        "audit-sweep",
        "search",
        "--workload",
        "Share",
        "--workload-exact",
        "SharePoint",
    ]);
    assert!(cli.is_err());
}

#[test]
fn test_default_output_uses_export_directory() {
    let common = common_of(parse(&["audit-sweep", "license-changes"]));
    let mut config = AppConfig::default();
    config.export.directory = PathBuf::from("/reports");

    let request =
        build_report_request(ReportProfile::LicenseChange, &common, None, &config, now()).unwrap();

    assert_eq!(
        request.output,
        Path::new("/reports").join("LicenseChanges_2024-06-30_12-00-00.csv")
    );
}

#[test]
fn test_inverted_window_is_argument_error() {
    let common = common_of(parse(&[
        "audit-sweep",
        "search",
        "--start",
        "2024-06-20",
        "--end",
        "2024-06-10",
    ]));

    let err = build_report_request(
        ReportProfile::Search,
        &common,
        None,
        &AppConfig::default(),
        now(),
    )
    .unwrap_err();

    assert!(matches!(
        err,
        CliError::AuditSweep(AuditSweepError::Window(WindowError::InvalidRange { .. }))
    ));
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn test_unrepresentable_days_is_argument_error() {
    let common = common_of(parse(&["audit-sweep", "search", "--days", "4294967295"]));

    let err = build_report_request(
        ReportProfile::Search,
        &common,
        None,
        &AppConfig::default(),
        now(),
    )
    .unwrap_err();

    assert!(matches!(
        err,
        CliError::AuditSweep(AuditSweepError::Window(WindowError::OutOfRange { .. }))
    ));
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn test_end_before_profile_lookback_is_argument_error() {
    let common = common_of(parse(&["audit-sweep", "search", "--end", "2024-06-20"]));

    let err = build_report_request(
        ReportProfile::Search,
        &common,
        None,
        &AppConfig::default(),
        now(),
    )
    .unwrap_err();

    assert!(matches!(
        err,
        CliError::AuditSweep(AuditSweepError::Window(WindowError::InvalidRange { .. }))
    ));
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn test_invalid_page_size_is_argument_error() {
    let common = common_of(parse(&["audit-sweep", "search", "--page-size", "9000"]));

    let err = build_report_request(
        ReportProfile::Search,
        &common,
        None,
        &AppConfig::default(),
        now(),
    )
    .unwrap_err();

    assert_eq!(err.exit_code(), 2);
}

// ============================================================================
// Exit Codes
// ============================================================================

#[test]
fn test_exit_codes() {
    let config: CliError = ConfigError::MissingRequired {
        key: "endpoint.base_url".to_string(),
    }
    .into();
    assert_eq!(config.exit_code(), 1);

    let fetch: CliError = AuditSweepError::Fetch(FetchError::Timeout).into();
    assert_eq!(fetch.exit_code(), 3);

    let export: CliError = ExportError::Io {
        path: PathBuf::from("/x"),
        source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
    }
    .into();
    assert_eq!(export.exit_code(), 4);

    let io: CliError = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe").into();
    assert_eq!(io.exit_code(), 5);
}

// ============================================================================
// Output
// ============================================================================

fn outcome() -> QueryOutcome {
    let mut accumulator = ReportAccumulator::new();
    for (id, actor) in [("1", "alice"), ("2", "bob"), ("3", "alice")] {
        accumulator.push(NormalizedEvent {
            record_id: Some(id.to_string()),
            timestamp: now(),
            actor: actor.to_string(),
            operation: "FileDeleted".to_string(),
            record_type: "SharePointFileOperation".to_string(),
            workload: "SharePoint".to_string(),
            object_id: String::new(),
            client_ip: String::new(),
            user_agent: String::new(),
            extra_fields: BTreeMap::new(),
        });
    }

    QueryOutcome {
        result: accumulator.finish(ParseErrorLog::new()),
        termination: TerminationReason::CapReached,
        session_id: SessionId::new("session-1").unwrap(),
        cumulative_count: 3,
        batch_count: 1,
        filtered_out: 0,
        clamp_warning: None,
    }
}

#[test]
fn test_summary_lists_termination_and_top_actors() {
    let export = ExportSummary {
        path: PathBuf::from("out.csv"),
        rows: 3,
        written: true,
    };
    let mut buffer = Vec::new();

    print_report_summary(&mut buffer, ReportProfile::FileDeletion, &outcome(), Some(&export), 1)
        .unwrap();

    let text = String::from_utf8(buffer).unwrap();
    assert!(text.contains("Termination:   cap reached"));
    assert!(text.contains("hard cap reached"));
    assert!(text.contains("out.csv (3 rows)"));
    assert!(text.contains("Top actors:"));
    assert!(text.contains("alice"));
    assert!(!text.contains("bob"));
}

#[test]
fn test_config_command_output() {
    let mut buffer = Vec::new();
    execute_config_command(false, &AppConfig::default(), &mut buffer).unwrap();
    assert_eq!(String::from_utf8(buffer).unwrap(), "Configuration is valid\n");

    let mut buffer = Vec::new();
    execute_config_command(true, &AppConfig::default(), &mut buffer).unwrap();
    assert!(String::from_utf8(buffer).unwrap().contains("[endpoint]"));
}

#[test]
fn test_completions_generate_script() {
    let mut buffer = Vec::new();
    execute_completions_command(clap_complete::Shell::Bash, &mut buffer).unwrap();

    let script = String::from_utf8(buffer).unwrap();
    assert!(script.contains("audit-sweep"));
    assert!(script.contains("file-deletions"));
}

#[test]
fn test_cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

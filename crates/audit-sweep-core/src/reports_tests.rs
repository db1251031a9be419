//! Tests for report profile presets.

use super::*;
use crate::query::QuerySpec;
use crate::window::QueryWindow;
use crate::Timestamp;

fn window() -> QueryWindow {
    let now = Timestamp::from_rfc3339("2024-06-30T12:00:00Z").unwrap();
    QueryWindow::last_days(30, now, 90).unwrap()
}

#[test]
fn test_lookback_defaults() {
    assert_eq!(ReportProfile::Search.default_lookback_days(), 7);
    assert_eq!(ReportProfile::MailboxForwarding.default_lookback_days(), 90);
    assert_eq!(ReportProfile::LicenseChange.default_lookback_days(), 90);
    assert_eq!(ReportProfile::FileDeletion.default_lookback_days(), 180);
}

#[test]
fn test_file_deletion_applies_operations() {
    let spec = ReportProfile::FileDeletion
        .apply(QuerySpec::builder(window()))
        .build()
        .unwrap();

    let operations: Vec<&str> = spec.operation_filter().iter().map(String::as_str).collect();
    assert_eq!(
        operations,
        vec![
            "FileDeleted",
            "FileDeletedFirstStageRecycleBin",
            "FileDeletedSecondStageRecycleBin",
            "FileRecycled",
        ]
    );
    assert!(spec.record_type_filter().is_none());
}

#[test]
fn test_license_change_sets_record_type() {
    let spec = ReportProfile::LicenseChange
        .apply(QuerySpec::builder(window()))
        .build()
        .unwrap();

    assert_eq!(
        spec.record_type_filter().map(|r| r.as_str()),
        Some("AzureActiveDirectory")
    );
    assert!(spec.operation_filter().contains("Change user license."));
}

#[test]
fn test_search_keeps_caller_operations() {
    let spec = ReportProfile::Search
        .apply(QuerySpec::builder(window()).operation("MailItemsAccessed"))
        .build()
        .unwrap();

    assert_eq!(spec.operation_filter().len(), 1);
    assert!(spec.record_type_filter().is_none());
}

#[test]
fn test_workload_filters() {
    assert!(ReportProfile::Search.workload_filter().is_any());
    assert_eq!(
        ReportProfile::FileDeletion.workload_filter(),
        WorkloadFilter::Contains("SharePoint".to_string())
    );
    assert_eq!(
        ReportProfile::MailboxForwarding.workload_filter(),
        WorkloadFilter::Contains("Exchange".to_string())
    );
}

#[test]
fn test_only_search_carries_audit_data() {
    for profile in ReportProfile::ALL {
        assert_eq!(
            profile.includes_audit_data(),
            profile == ReportProfile::Search,
            "{}",
            profile
        );
    }
}

#[test]
fn test_columns_have_unique_headers() {
    for profile in ReportProfile::ALL {
        let mut headers: Vec<_> = profile.columns().iter().map(|c| c.header).collect();
        let total = headers.len();
        headers.sort_unstable();
        headers.dedup();
        assert_eq!(headers.len(), total, "{}", profile);
    }
    assert!(ReportProfile::FileDeletion
        .columns()
        .iter()
        .any(|c| c.header == "SiteUrl"));
}

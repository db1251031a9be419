//! Tests for workload filtering.

use super::*;
use crate::Timestamp;
use std::collections::BTreeMap;

fn event(workload: &str) -> NormalizedEvent {
    NormalizedEvent {
        record_id: None,
        timestamp: Timestamp::from_rfc3339("2024-06-01T10:00:00Z").unwrap(),
        actor: "alice@contoso.com".to_string(),
        operation: "Op".to_string(),
        record_type: "Any".to_string(),
        workload: workload.to_string(),
        object_id: String::new(),
        client_ip: String::new(),
        user_agent: String::new(),
        extra_fields: BTreeMap::new(),
    }
}

fn mixed() -> Vec<NormalizedEvent> {
    vec![
        event("SharePoint"),
        event("Exchange"),
        event("OneDrive"),
        event("sharepoint"),
        event(""),
    ]
}

#[test]
fn test_any_is_identity() {
    let filter = WorkloadFilter::default();
    let events = mixed();
    let kept: Vec<_> = events.iter().filter(|e| filter.matches(e)).cloned().collect();

    assert!(filter.is_any());
    assert_eq!(kept, events);
}

#[test]
fn test_contains_is_case_insensitive_subset() {
    let filter = WorkloadFilter::contains("SharePoint");
    let events = mixed();
    let kept: Vec<_> = events.iter().filter(|e| filter.matches(e)).collect();

    assert_eq!(kept.len(), 2);
    assert!(kept.iter().all(|e| e.workload.eq_ignore_ascii_case("sharepoint")));
    assert!(kept.len() < events.len());
}

#[test]
fn test_contains_matches_token_inside_workload() {
    let filter = WorkloadFilter::contains("point");

    assert!(filter.matches(&event("SharePoint")));
    assert!(!filter.matches(&event("Exchange")));
}

#[test]
fn test_exact_requires_full_value() {
    let filter = WorkloadFilter::exact("exchange");

    assert!(filter.matches(&event("Exchange")));
    assert!(!filter.matches(&event("ExchangeItemGroup")));
}

#[test]
fn test_contains_and_exact_fold_non_ascii_alike() {
    let workload = event("ÜBERSICHT");

    assert!(WorkloadFilter::contains("übersicht").matches(&workload));
    assert!(WorkloadFilter::exact("übersicht").matches(&workload));
    assert!(!WorkloadFilter::exact("übersich").matches(&workload));
}

#[test]
fn test_filter_with_no_matches_yields_empty_subset() {
    let filter = WorkloadFilter::contains("Teams");

    assert_eq!(mixed().iter().filter(|e| filter.matches(e)).count(), 0);
}

#[test]
fn test_blank_token_means_any() {
    assert_eq!(WorkloadFilter::contains("  "), WorkloadFilter::Any);
    assert_eq!(WorkloadFilter::exact(""), WorkloadFilter::Any);
}

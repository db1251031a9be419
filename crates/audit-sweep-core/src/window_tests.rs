//! Tests for query window validation and clamping.

use super::*;

fn fixed_now() -> Timestamp {
    Timestamp::from_rfc3339("2024-06-30T12:00:00Z").unwrap()
}

#[test]
fn test_window_within_retention_is_not_clamped() {
    let now = fixed_now();
    let window = QueryWindow::last_days(7, now, 90).unwrap();

    assert_eq!(window.effective_start(), now.subtract_days(7).unwrap());
    assert_eq!(window.requested_start(), now.subtract_days(7).unwrap());
    assert_eq!(window.end(), now);
    assert!(!window.was_clamped());
    assert!(window.clamp_warning().is_none());
}

/// Scenario B: a 120-day request against a 90-day horizon is clamped, not rejected.
#[test]
fn test_window_beyond_retention_is_clamped_with_warning() {
    let now = fixed_now();
    let window = QueryWindow::new(now.subtract_days(120).unwrap(), now, now, 90).unwrap();

    assert_eq!(window.effective_start(), now.subtract_days(90).unwrap());
    assert_eq!(window.requested_start(), now.subtract_days(120).unwrap());

    let warning = window.clamp_warning().expect("clamp warning recorded");
    assert_eq!(warning.requested_start, now.subtract_days(120).unwrap());
    assert_eq!(warning.effective_start, now.subtract_days(90).unwrap());
    assert_eq!(warning.max_retention_days, 90);
}

#[test]
fn test_effective_start_never_precedes_horizon() {
    let now = fixed_now();
    let horizon = now.subtract_days(90).unwrap();

    for days in [0u32, 1, 30, 89, 90, 91, 365, 3650] {
        let window = QueryWindow::new(now.subtract_days(days).unwrap(), now, now, 90).unwrap();
        assert!(window.effective_start() >= horizon, "days = {}", days);
        assert_eq!(window.was_clamped(), days > 90, "days = {}", days);
    }
}

#[test]
fn test_start_after_end_is_rejected() {
    let now = fixed_now();
    let result = QueryWindow::new(now, now.subtract_days(1).unwrap(), now, 90);

    assert!(matches!(result, Err(WindowError::InvalidRange { .. })));
}

#[test]
fn test_window_entirely_outside_retention_is_rejected() {
    let now = fixed_now();
    let start = now.subtract_days(200).unwrap();
    let end = now.subtract_days(150).unwrap();
    let result = QueryWindow::new(start, end, now, 90);

    assert!(matches!(result, Err(WindowError::OutsideRetention { .. })));
}

#[test]
fn test_zero_retention_is_rejected() {
    let now = fixed_now();
    let result = QueryWindow::last_days(1, now, 0);

    assert_eq!(result, Err(WindowError::InvalidRetention));
}

#[test]
fn test_from_request_defaults() {
    let now = fixed_now();
    let window = QueryWindow::from_request(None, None, 30, now, 90).unwrap();

    assert_eq!(window.end(), now);
    assert_eq!(window.effective_start(), now.subtract_days(30).unwrap());
}

#[test]
fn test_from_request_lookback_is_relative_to_now() {
    let now = fixed_now();
    let end = now.subtract_days(2).unwrap();
    let window = QueryWindow::from_request(None, Some(end), 7, now, 90).unwrap();

    assert_eq!(window.end(), end);
    assert_eq!(window.requested_start(), now.subtract_days(7).unwrap());
}

#[test]
fn test_from_request_end_older_than_lookback_is_inverted() {
    let now = fixed_now();
    let end = Timestamp::from_rfc3339("2024-06-20T12:00:00Z").unwrap();

    let result = QueryWindow::from_request(None, Some(end), 7, now, 90);

    assert_eq!(
        result,
        Err(WindowError::InvalidRange {
            start: Timestamp::from_rfc3339("2024-06-23T12:00:00Z").unwrap(),
            end,
        })
    );
}

#[test]
fn test_unrepresentable_lookback_is_rejected() {
    let now = fixed_now();

    assert_eq!(
        QueryWindow::last_days(u32::MAX, now, 90),
        Err(WindowError::OutOfRange {
            days: u32::MAX,
            from: now
        })
    );
    assert!(matches!(
        QueryWindow::from_request(None, None, u32::MAX, now, 90),
        Err(WindowError::OutOfRange { .. })
    ));
    assert!(matches!(
        QueryWindow::last_days(1, now, u32::MAX),
        Err(WindowError::OutOfRange { .. })
    ));
}

#[test]
fn test_clamp_warning_display_mentions_horizon() {
    let now = fixed_now();
    let window = QueryWindow::new(now.subtract_days(120).unwrap(), now, now, 90).unwrap();
    let text = window.clamp_warning().unwrap().to_string();

    assert!(text.contains("90-day"));
}

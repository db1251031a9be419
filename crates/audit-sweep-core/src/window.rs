//! # Query Window
//!
//! Validates a requested `[start, end]` range and clamps its start to the
//! platform's retention horizon.
//!
//! Clamping is never an error: the query proceeds with the clamped window and a
//! single [`RetentionClampWarning`] is recorded on the window. Once constructed a
//! window is authoritative for the rest of the pipeline.

use crate::Timestamp;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Maximum age, in days, of audit data the platform serves by default
pub const DEFAULT_MAX_RETENTION_DAYS: u32 = 90;

/// Validated, retention-clamped time range for one query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryWindow {
    start: Timestamp,
    end: Timestamp,
    effective_start: Timestamp,
    max_retention_days: u32,
    clamp_warning: Option<RetentionClampWarning>,
}

impl QueryWindow {
    /// Build a window from explicit bounds
    ///
    /// # Arguments
    ///
    /// * `start` - Requested start of the range
    /// * `end` - Requested end of the range
    /// * `now` - Reference instant the retention horizon is measured from
    /// * `max_retention_days` - Platform retention horizon in days
    ///
    /// # Errors
    ///
    /// - [`WindowError::InvalidRange`] if `start > end`
    /// - [`WindowError::InvalidRetention`] if `max_retention_days` is zero
    /// - [`WindowError::OutsideRetention`] if the whole range is older than the horizon
    /// - [`WindowError::OutOfRange`] if the horizon falls outside the representable dates
    pub fn new(
        start: Timestamp,
        end: Timestamp,
        now: Timestamp,
        max_retention_days: u32,
    ) -> Result<Self, WindowError> {
        if start > end {
            return Err(WindowError::InvalidRange { start, end });
        }

        if max_retention_days == 0 {
            return Err(WindowError::InvalidRetention);
        }

        let horizon = days_before(now, max_retention_days)?;
        if end < horizon {
            return Err(WindowError::OutsideRetention { end, horizon });
        }

        let (effective_start, clamp_warning) = if start < horizon {
            let warning = RetentionClampWarning {
                requested_start: start,
                effective_start: horizon,
                max_retention_days,
            };
            warn!(
                requested_start = %start,
                effective_start = %horizon,
                max_retention_days = max_retention_days,
                "Requested window exceeds retention; start clamped"
            );
            (horizon, Some(warning))
        } else {
            (start, None)
        };

        Ok(Self {
            start,
            end,
            effective_start,
            max_retention_days,
            clamp_warning,
        })
    }

    /// Build a window from optional bounds
    ///
    /// `end` defaults to `now`; `start` defaults to `now - default_lookback_days`,
    /// so an explicit `end` older than the lookback without an explicit `start`
    /// is an inverted range.
    pub fn from_request(
        start: Option<Timestamp>,
        end: Option<Timestamp>,
        default_lookback_days: u32,
        now: Timestamp,
        max_retention_days: u32,
    ) -> Result<Self, WindowError> {
        let end = end.unwrap_or(now);
        let start = match start {
            Some(start) => start,
            None => days_before(now, default_lookback_days)?,
        };
        Self::new(start, end, now, max_retention_days)
    }

    /// Window covering the last `days` days up to `now`
    pub fn last_days(days: u32, now: Timestamp, max_retention_days: u32) -> Result<Self, WindowError> {
        Self::new(days_before(now, days)?, now, now, max_retention_days)
    }

    /// Start as originally requested
    pub fn requested_start(&self) -> Timestamp {
        self.start
    }

    /// Start actually sent to the remote endpoint
    pub fn effective_start(&self) -> Timestamp {
        self.effective_start
    }

    pub fn end(&self) -> Timestamp {
        self.end
    }

    pub fn max_retention_days(&self) -> u32 {
        self.max_retention_days
    }

    /// Warning recorded when the start was clamped, if any
    pub fn clamp_warning(&self) -> Option<&RetentionClampWarning> {
        self.clamp_warning.as_ref()
    }

    pub fn was_clamped(&self) -> bool {
        self.clamp_warning.is_some()
    }
}

fn days_before(instant: Timestamp, days: u32) -> Result<Timestamp, WindowError> {
    instant
        .subtract_days(days)
        .ok_or(WindowError::OutOfRange { days, from: instant })
}

/// Non-fatal notice that the requested start preceded the retention horizon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionClampWarning {
    pub requested_start: Timestamp,
    pub effective_start: Timestamp,
    pub max_retention_days: u32,
}

impl std::fmt::Display for RetentionClampWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "requested start {} is older than the {}-day retention horizon; using {}",
            self.requested_start, self.max_retention_days, self.effective_start
        )
    }
}

/// Errors raised while constructing a query window
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WindowError {
    #[error("start {start} is after end {end}")]
    InvalidRange { start: Timestamp, end: Timestamp },

    #[error("window ending {end} lies entirely before the retention horizon {horizon}")]
    OutsideRetention { end: Timestamp, horizon: Timestamp },

    #[error("maximum retention must be at least one day")]
    InvalidRetention,

    #[error("{days} days before {from} is outside the supported date range")]
    OutOfRange { days: u32, from: Timestamp },
}

#[cfg(test)]
#[path = "window_tests.rs"]
mod tests;

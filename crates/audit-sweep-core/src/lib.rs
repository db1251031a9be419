//! # Audit-Sweep Core
//!
//! Retrieval and normalisation engine for the platform's compliance audit log.
//!
//! This crate turns one logical audit query into a bounded, de-duplicated,
//! typed event stream. A query flows through the pipeline in this order:
//!
//! 1. [`QueryWindow`] validates and clamps the requested time range against the
//!    platform retention horizon.
//! 2. [`QuerySpec`] captures the window, filters, page size and hard cap.
//! 3. [`RetrievalSession`] pages through the remote log under a single session
//!    identifier until the log is exhausted or the hard cap is reached.
//! 4. [`RecordNormalizer`] turns each raw record into a [`NormalizedEvent`],
//!    skipping (and logging) records whose payload cannot be read.
//! 5. [`WorkloadFilter`] optionally narrows events to one subsystem.
//! 6. [`ReportAccumulator`] collects the events and running aggregates and
//!    produces the final [`ReportResult`] handed to an [`ExportSink`].
//!
//! ## Architecture
//!
//! - The engine depends only on the [`AuditLogSource`] trait; the HTTP transport
//!   in [`client`] is one implementation of it
//! - Processing is strictly sequential: batch N+1 is never requested before
//!   batch N has been normalised and accumulated
//! - No state is shared between queries
//!
//! ## Usage
//!
//! ```rust
//! use audit_sweep_core::{SessionId, Timestamp};
//!
//! let session_id = SessionId::generate();
//! let now = Timestamp::now();
//! assert!(!session_id.as_str().is_empty());
//! assert!(now.subtract_days(7).is_some_and(|week_ago| week_ago < now));
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Standard result type for audit-sweep operations
pub type AuditSweepResult<T> = Result<T, AuditSweepError>;

// ============================================================================
// Domain Identifier Types
// ============================================================================

/// Opaque token tying every fetch of one logical query together
///
/// The remote service uses this identifier to keep a stable, non-overlapping
/// cursor over a log that may be appended to while the query runs. The same
/// value must be presented on every fetch belonging to one query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Create new session ID with validation
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if value.is_empty() {
            return Err(ValidationError::Required {
                field: "session_id".to_string(),
            });
        }

        if value.len() > 128 {
            return Err(ValidationError::TooLong {
                field: "session_id".to_string(),
                max_length: 128,
            });
        }

        if !value.chars().all(|c| c.is_ascii_graphic()) {
            return Err(ValidationError::InvalidCharacters {
                field: "session_id".to_string(),
                invalid_chars: "non-ASCII or whitespace".to_string(),
            });
        }

        Ok(Self(value))
    }

    /// Generate a fresh random session ID
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Platform record-type name (e.g. `ExchangeAdmin`, `SharePointFileOperation`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordType(String);

impl RecordType {
    /// Create new record type with validation
    pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "record_type".to_string(),
            });
        }

        if !name.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ValidationError::InvalidCharacters {
                field: "record_type".to_string(),
                invalid_chars: "non-alphanumeric".to_string(),
            });
        }

        Ok(Self(name))
    }

    /// Get string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

// ============================================================================
// Time Types
// ============================================================================

/// UTC timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create timestamp for current moment
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Wrap an existing UTC datetime
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Parse timestamp from RFC3339 string
    pub fn from_rfc3339(s: &str) -> Result<Self, ValidationError> {
        let dt = DateTime::parse_from_rfc3339(s)
            .map_err(|_| ValidationError::InvalidFormat {
                field: "timestamp".to_string(),
                message: format!("expected RFC3339 datetime, got '{}'", s),
            })?
            .with_timezone(&Utc);
        Ok(Self(dt))
    }

    /// Parse either an RFC3339 datetime or a bare `YYYY-MM-DD` date (midnight UTC)
    pub fn parse_lenient(s: &str) -> Result<Self, ValidationError> {
        let s = s.trim();
        if let Ok(ts) = Self::from_rfc3339(s) {
            return Ok(ts);
        }

        // The platform emits naive UTC datetimes without an offset
        if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
            return Ok(Self(naive.and_utc()));
        }

        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| Self(naive.and_utc()))
            .ok_or_else(|| ValidationError::InvalidFormat {
                field: "timestamp".to_string(),
                message: format!("expected RFC3339 datetime or YYYY-MM-DD, got '{}'", s),
            })
    }

    /// Convert to RFC3339 string
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
    }

    /// Get underlying DateTime
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Subtract whole days from timestamp
    ///
    /// Returns `None` when the result falls outside the representable range.
    pub fn subtract_days(&self, days: u32) -> Option<Self> {
        self.0
            .checked_sub_signed(chrono::Duration::days(i64::from(days)))
            .map(Self)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_rfc3339())
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// High-level error categorization for reporting and exit codes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Temporary failures that may succeed when the query is rerun
    Transient,
    /// Permanent failures that won't succeed on rerun
    Permanent,
    /// Configuration errors preventing the query from starting
    Configuration,
}

/// Error type for input validation failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required { field: String },

    #[error("Field '{field}' has invalid format: {message}")]
    InvalidFormat { field: String, message: String },

    #[error("Field '{field}' is out of range: {message}")]
    OutOfRange { field: String, message: String },

    #[error("Field '{field}' exceeds maximum length of {max_length}")]
    TooLong { field: String, max_length: usize },

    #[error("Field '{field}' contains invalid characters: {invalid_chars}")]
    InvalidCharacters {
        field: String,
        invalid_chars: String,
    },
}

/// Top-level error type for audit-sweep operations
#[derive(Debug, thiserror::Error)]
pub enum AuditSweepError {
    #[error("Invalid query window: {0}")]
    Window(#[from] WindowError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Export failed: {0}")]
    Export(#[from] ExportError),

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl AuditSweepError {
    /// Check if rerunning the same query could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Fetch(e) => e.is_transient(),
            Self::Export(_) => true,
            Self::Window(_) => false,
            Self::Validation(_) => false,
            Self::Configuration { .. } => false,
        }
    }

    /// Get error category for reporting
    pub fn error_category(&self) -> ErrorCategory {
        match self {
            Self::Window(_) => ErrorCategory::Permanent,
            Self::Validation(_) => ErrorCategory::Permanent,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Fetch(e) if e.is_transient() => ErrorCategory::Transient,
            Self::Fetch(_) => ErrorCategory::Permanent,
            Self::Export(_) => ErrorCategory::Transient,
        }
    }
}

// ============================================================================
// Module declarations
// ============================================================================

/// Time-range validation and retention clamping
pub mod window;

/// Immutable description of one logical query
pub mod query;

/// Raw and normalised audit record types
pub mod record;

/// Per-record payload parsing
pub mod normalizer;

/// Post-parse workload selection
pub mod workload;

/// Event collection and summary aggregates
pub mod accumulator;

/// Paginated, session-affine fetch loop
pub mod session;

/// HTTP transport for the remote audit-query endpoint
pub mod client;

/// Export sink and CSV implementation
pub mod export;

/// Presets for the specialised audit reports
pub mod reports;

/// End-to-end query pipeline
pub mod pipeline;

// Re-export key types for convenience
pub use accumulator::{ReportAccumulator, ReportResult, ReportSummary, SummaryField};
pub use client::{ClientConfig, ClientConfigBuilder, HttpAuditLogSource};
pub use export::{default_export_path, CsvExportSink, ExportError, ExportSink, ExportSummary};
pub use normalizer::{ParseError, ParseErrorLog, ParseErrorSample, RecordNormalizer};
pub use pipeline::{AuditSearch, QueryOutcome};
pub use query::{QuerySpec, QuerySpecBuilder, DEFAULT_HARD_CAP, MAX_PAGE_SIZE};
pub use record::{AuditBatch, BatchEntry, NormalizedEvent, RawAuditRecord};
pub use reports::{ReportColumn, ReportProfile};
pub use session::{
    is_cap_reached, is_short_batch, termination_after_batch, AuditLogSource, FetchError,
    FetchRequest, RetrievalSession, SessionCommand, TerminationReason,
};
pub use window::{QueryWindow, RetentionClampWarning, WindowError, DEFAULT_MAX_RETENTION_DAYS};
pub use workload::WorkloadFilter;

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

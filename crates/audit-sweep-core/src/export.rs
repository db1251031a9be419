//! # Export
//!
//! Writes a finished report to disk.
//!
//! Export runs after retrieval completes and owns column layout, encoding and
//! file I/O. An export failure is reported to the caller but leaves the
//! in-memory [`crate::ReportResult`] untouched.

use crate::record::NormalizedEvent;
use crate::reports::ReportProfile;
use crate::Timestamp;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Columns present in every export, in order
pub const BASE_COLUMNS: [&str; 8] = [
    "Timestamp",
    "Actor",
    "Operation",
    "RecordType",
    "Workload",
    "ObjectId",
    "ClientIP",
    "UserAgent",
];

/// Header of the JSON column carrying unmapped extra fields
pub const AUDIT_DATA_COLUMN: &str = "AuditData";

/// Sink-side failure
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV encoding failed: {0}")]
    Csv(#[from] csv::Error),
}

/// What an export did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub rows: usize,
    /// False when there was nothing to write and no file was created
    pub written: bool,
}

/// Destination for finished report rows
#[async_trait]
pub trait ExportSink: Send + Sync {
    /// Write `events` to `path`
    ///
    /// With no events nothing is written and the summary says so.
    async fn export(
        &self,
        events: &[NormalizedEvent],
        path: &Path,
    ) -> Result<ExportSummary, ExportError>;
}

/// Default export location for `report_name`, stamped with `now`
///
/// Produces `<dir>/<report_name>_<YYYY-MM-DD_HH-MM-SS>.csv`.
pub fn default_export_path(dir: &Path, report_name: &str, now: Timestamp) -> PathBuf {
    let stamp = now.as_datetime().format("%Y-%m-%d_%H-%M-%S");
    dir.join(format!("{}_{}.csv", report_name, stamp))
}

/// CSV writer laid out for one report profile
#[derive(Debug, Clone, Copy)]
pub struct CsvExportSink {
    profile: ReportProfile,
}

impl CsvExportSink {
    pub fn new(profile: ReportProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> ReportProfile {
        self.profile
    }

    /// Header row for this profile
    pub fn headers(&self) -> Vec<&'static str> {
        let mut headers: Vec<&'static str> = BASE_COLUMNS.to_vec();
        headers.extend(self.profile.columns().iter().map(|c| c.header));
        if self.profile.includes_audit_data() {
            headers.push(AUDIT_DATA_COLUMN);
        }
        headers
    }

    fn row(&self, event: &NormalizedEvent) -> Vec<String> {
        let mut row = vec![
            event.timestamp.to_rfc3339(),
            event.actor.clone(),
            event.operation.clone(),
            event.record_type.clone(),
            event.workload.clone(),
            event.object_id.clone(),
            event.client_ip.clone(),
            event.user_agent.clone(),
        ];

        let columns = self.profile.columns();
        row.extend(columns.iter().map(|c| event.extra(c.field).to_string()));

        if self.profile.includes_audit_data() {
            let remaining: Map<String, Value> = event
                .extra_fields
                .iter()
                .filter(|(k, _)| !columns.iter().any(|c| c.field == k.as_str()))
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            row.push(Value::Object(remaining).to_string());
        }

        row
    }

    /// Render `events` as CSV bytes, header included
    pub fn render(&self, events: &[NormalizedEvent]) -> Result<Vec<u8>, ExportError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(self.headers())?;
        for event in events {
            writer.write_record(self.row(event))?;
        }
        writer
            .into_inner()
            .map_err(|e| ExportError::Csv(csv::Error::from(e.into_error())))
    }
}

#[async_trait]
impl ExportSink for CsvExportSink {
    async fn export(
        &self,
        events: &[NormalizedEvent],
        path: &Path,
    ) -> Result<ExportSummary, ExportError> {
        if events.is_empty() {
            warn!(report = %self.profile, path = %path.display(), "No events to export");
            return Ok(ExportSummary {
                path: path.to_path_buf(),
                rows: 0,
                written: false,
            });
        }

        let bytes = self.render(events)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| ExportError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        tokio::fs::write(path, bytes)
            .await
            .map_err(|source| ExportError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        info!(
            report = %self.profile,
            path = %path.display(),
            rows = events.len(),
            "Report exported"
        );

        Ok(ExportSummary {
            path: path.to_path_buf(),
            rows: events.len(),
            written: true,
        })
    }
}

#[cfg(test)]
#[path = "export_tests.rs"]
mod tests;

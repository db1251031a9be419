//! # Report Profiles
//!
//! Presets over the retrieval engine for the specialised audit reports.
//!
//! A profile fixes the default lookback, the operation and record-type filters
//! sent to the server, the workload filter applied after normalisation, and the
//! report-specific CSV columns pulled from each event's extra fields.

use crate::query::QuerySpecBuilder;
use crate::workload::WorkloadFilter;
use crate::RecordType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One report-specific export column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportColumn {
    /// CSV header
    pub header: &'static str,
    /// Key in [`crate::NormalizedEvent::extra_fields`]
    pub field: &'static str,
}

const fn column(header: &'static str, field: &'static str) -> ReportColumn {
    ReportColumn { header, field }
}

const FORWARDING_OPERATIONS: &[&str] = &[
    "New-InboxRule",
    "Set-InboxRule",
    "Set-Mailbox",
    "UpdateInboxRules",
];

const FORWARDING_COLUMNS: &[ReportColumn] = &[
    column("RuleName", "Parameters.Name"),
    column("ForwardTo", "Parameters.ForwardTo"),
    column("ForwardAsAttachmentTo", "Parameters.ForwardAsAttachmentTo"),
    column("RedirectTo", "Parameters.RedirectTo"),
    column("ForwardingSmtpAddress", "Parameters.ForwardingSmtpAddress"),
    column("ForwardingAddress", "Parameters.ForwardingAddress"),
    column("DeliverToMailboxAndForward", "Parameters.DeliverToMailboxAndForward"),
];

const LICENSE_OPERATIONS: &[&str] = &["Change user license.", "Update user."];

const LICENSE_COLUMNS: &[ReportColumn] = &[
    column("Target", "Target"),
    column("ResultStatus", "ResultStatus"),
    column("AssignedLicenseOld", "ModifiedProperties.AssignedLicense.OldValue"),
    column("AssignedLicenseNew", "ModifiedProperties.AssignedLicense.NewValue"),
    column("AssignedPlanOld", "ModifiedProperties.AssignedPlan.OldValue"),
    column("AssignedPlanNew", "ModifiedProperties.AssignedPlan.NewValue"),
];

const FILE_DELETION_OPERATIONS: &[&str] = &[
    "FileDeleted",
    "FileDeletedFirstStageRecycleBin",
    "FileDeletedSecondStageRecycleBin",
    "FileRecycled",
];

const FILE_DELETION_COLUMNS: &[ReportColumn] = &[
    column("SiteUrl", "SiteUrl"),
    column("SourceRelativeUrl", "SourceRelativeUrl"),
    column("SourceFileName", "SourceFileName"),
    column("SourceFileExtension", "SourceFileExtension"),
    column("ItemType", "ItemType"),
];

/// The audit reports the tool can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportProfile {
    /// Free-form audit log search; every filter comes from the caller
    Search,
    /// Inbox-rule and mailbox forwarding changes
    MailboxForwarding,
    /// User licence assignment changes
    LicenseChange,
    /// File deletions and recycle-bin activity
    FileDeletion,
}

impl ReportProfile {
    pub const ALL: [ReportProfile; 4] = [
        Self::Search,
        Self::MailboxForwarding,
        Self::LicenseChange,
        Self::FileDeletion,
    ];

    /// Name used in export file names and log fields
    pub fn name(&self) -> &'static str {
        match self {
            Self::Search => "AuditLogSearch",
            Self::MailboxForwarding => "MailboxForwarding",
            Self::LicenseChange => "LicenseChanges",
            Self::FileDeletion => "FileDeletions",
        }
    }

    /// Lookback used when the caller gives no start date
    pub fn default_lookback_days(&self) -> u32 {
        match self {
            Self::Search => 7,
            Self::MailboxForwarding => 90,
            Self::LicenseChange => 90,
            Self::FileDeletion => 180,
        }
    }

    /// Operations requested from the server
    pub fn operations(&self) -> &'static [&'static str] {
        match self {
            Self::Search => &[],
            Self::MailboxForwarding => FORWARDING_OPERATIONS,
            Self::LicenseChange => LICENSE_OPERATIONS,
            Self::FileDeletion => FILE_DELETION_OPERATIONS,
        }
    }

    /// Default workload narrowing applied after normalisation
    pub fn workload_filter(&self) -> WorkloadFilter {
        match self {
            Self::Search => WorkloadFilter::Any,
            Self::MailboxForwarding => WorkloadFilter::contains("Exchange"),
            Self::LicenseChange => WorkloadFilter::contains("AzureActiveDirectory"),
            Self::FileDeletion => WorkloadFilter::contains("SharePoint"),
        }
    }

    /// Columns appended after the base columns in the export
    pub fn columns(&self) -> &'static [ReportColumn] {
        match self {
            Self::Search => &[],
            Self::MailboxForwarding => FORWARDING_COLUMNS,
            Self::LicenseChange => LICENSE_COLUMNS,
            Self::FileDeletion => FILE_DELETION_COLUMNS,
        }
    }

    /// Whether the export carries the remaining extra fields as a JSON column
    pub fn includes_audit_data(&self) -> bool {
        matches!(self, Self::Search)
    }

    /// Add this profile's server-side filters to a query
    ///
    /// Operations already on the builder are kept, so a search can combine
    /// caller-supplied operations with none of its own.
    pub fn apply(&self, builder: QuerySpecBuilder) -> QuerySpecBuilder {
        let builder = builder.operations(self.operations().iter().copied());
        match self.record_type() {
            Some(record_type) => builder.record_type(record_type),
            None => builder,
        }
    }

    /// Record type for profiles that only ever query one
    pub fn record_type(&self) -> Option<RecordType> {
        match self {
            Self::LicenseChange => RecordType::new("AzureActiveDirectory").ok(),
            _ => None,
        }
    }
}

impl fmt::Display for ReportProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
#[path = "reports_tests.rs"]
mod tests;

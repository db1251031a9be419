//! # Workload Filter
//!
//! Post-parse selection of events by the subsystem that produced them.
//! Comparison is case-insensitive; a substring match lets a coarse token such
//! as `SharePoint` select every workload value containing it.

use crate::record::NormalizedEvent;
use serde::{Deserialize, Serialize};

/// Optional workload selection applied after normalisation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkloadFilter {
    /// Keep every event
    #[default]
    Any,
    /// Keep events whose workload contains the token
    Contains(String),
    /// Keep events whose workload equals the token
    Exact(String),
}

impl WorkloadFilter {
    /// Substring filter; a blank token keeps everything
    pub fn contains(token: impl Into<String>) -> Self {
        let token = token.into();
        if token.trim().is_empty() {
            Self::Any
        } else {
            Self::Contains(token.trim().to_string())
        }
    }

    /// Exact-match filter; a blank token keeps everything
    pub fn exact(token: impl Into<String>) -> Self {
        let token = token.into();
        if token.trim().is_empty() {
            Self::Any
        } else {
            Self::Exact(token.trim().to_string())
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }

    /// Whether `event` passes this filter
    pub fn matches(&self, event: &NormalizedEvent) -> bool {
        match self {
            Self::Any => true,
            Self::Contains(token) => fold_case(&event.workload).contains(&fold_case(token)),
            Self::Exact(token) => fold_case(&event.workload) == fold_case(token),
        }
    }
}

/// Both variants compare under the same Unicode case folding
fn fold_case(value: &str) -> String {
    value.to_lowercase()
}

#[cfg(test)]
#[path = "workload_tests.rs"]
mod tests;

//! # Audit Record Types
//!
//! Raw records exactly as the remote endpoint returns them, and the flat typed
//! event the normaliser produces from each one.

use crate::normalizer::ParseError;
use crate::Timestamp;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

// ============================================================================
// Raw Records
// ============================================================================

/// One record from the remote audit log
///
/// The envelope fields are typed; the `AuditData` payload is kept opaque until
/// the normaliser reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawAuditRecord {
    /// Platform record identity, used for de-duplication
    #[serde(rename = "Identity", default)]
    pub record_id: Option<String>,

    #[serde(rename = "CreationDate", deserialize_with = "deserialize_timestamp")]
    pub timestamp: Timestamp,

    #[serde(rename = "UserIds", default)]
    pub actor_id: String,

    #[serde(
        rename = "Operations",
        default,
        deserialize_with = "deserialize_operations"
    )]
    pub operations: BTreeSet<String>,

    #[serde(rename = "RecordType", default)]
    pub record_type: String,

    /// Embedded structured payload; either a JSON object or a string holding one
    #[serde(rename = "AuditData", default)]
    pub payload: Value,
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Timestamp, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Timestamp::parse_lenient(&raw).map_err(serde::de::Error::custom)
}

/// Operations arrive as a comma-separated string or as an array
fn deserialize_operations<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Operations {
        Joined(String),
        List(Vec<String>),
    }

    let ops = match Option::<Operations>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(Operations::Joined(s)) => s.split(',').map(str::to_string).collect(),
        Some(Operations::List(list)) => list,
    };

    Ok(ops
        .into_iter()
        .map(|op| op.trim().to_string())
        .filter(|op| !op.is_empty())
        .collect())
}

impl RawAuditRecord {
    /// Decode one element of a search response
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidEnvelope`] when the element is not a
    /// record envelope, for example a `CreationDate` that is not a date.
    pub fn from_json(value: Value) -> Result<Self, ParseError> {
        let record_id = value
            .get("Identity")
            .and_then(Value::as_str)
            .map(str::to_string);

        serde_json::from_value(value).map_err(|e| ParseError::InvalidEnvelope {
            record_id,
            message: e.to_string(),
        })
    }
}

/// One element of a fetched batch
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEntry {
    Record(RawAuditRecord),
    /// Element whose envelope could not be decoded; still counts towards the page
    Malformed(ParseError),
}

impl From<RawAuditRecord> for BatchEntry {
    fn from(record: RawAuditRecord) -> Self {
        Self::Record(record)
    }
}

/// Ordered records returned by one fetch call
///
/// Transient: consumed by the normaliser as soon as it arrives. The length
/// counts every element the server returned, malformed ones included, since
/// that is what pagination compares against the page size.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditBatch {
    entries: Vec<BatchEntry>,
}

impl AuditBatch {
    pub fn new(records: Vec<RawAuditRecord>) -> Self {
        records.into_iter().collect()
    }

    /// Decode a response array element by element
    ///
    /// A bad element becomes a [`BatchEntry::Malformed`] instead of failing the
    /// whole batch.
    pub fn from_json_values(values: Vec<Value>) -> Self {
        let entries = values
            .into_iter()
            .map(|value| match RawAuditRecord::from_json(value) {
                Ok(record) => BatchEntry::Record(record),
                Err(e) => BatchEntry::Malformed(e),
            })
            .collect();
        Self { entries }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[BatchEntry] {
        &self.entries
    }

    /// Successfully decoded records, in server order
    pub fn records(&self) -> impl Iterator<Item = &RawAuditRecord> {
        self.entries.iter().filter_map(|entry| match entry {
            BatchEntry::Record(record) => Some(record),
            BatchEntry::Malformed(_) => None,
        })
    }

    /// Keep only the first `len` entries
    pub fn truncate(&mut self, len: usize) {
        self.entries.truncate(len);
    }
}

impl IntoIterator for AuditBatch {
    type Item = BatchEntry;
    type IntoIter = std::vec::IntoIter<BatchEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl FromIterator<RawAuditRecord> for AuditBatch {
    fn from_iter<I: IntoIterator<Item = RawAuditRecord>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(BatchEntry::Record).collect(),
        }
    }
}

// ============================================================================
// Normalized Events
// ============================================================================

/// Flat typed event built from one raw record
///
/// Absent payload fields are empty strings, never errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    pub record_id: Option<String>,
    pub timestamp: Timestamp,
    pub actor: String,
    pub operation: String,
    pub record_type: String,
    pub workload: String,
    pub object_id: String,
    pub client_ip: String,
    pub user_agent: String,
    pub extra_fields: BTreeMap<String, String>,
}

impl NormalizedEvent {
    /// Look up an extra field, returning an empty string when absent
    pub fn extra(&self, name: &str) -> &str {
        self.extra_fields.get(name).map(String::as_str).unwrap_or("")
    }
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;

//! # Record Normalizer
//!
//! Reads the embedded `AuditData` payload of each raw record into a typed
//! optional-field struct and flattens it into a [`NormalizedEvent`].
//!
//! Missing fields are a modelled case: every field has an explicit fallback and
//! defaults to an empty string. Only an envelope or payload that cannot be read
//! at all produces a [`ParseError`]; that record is skipped and the error is kept in a
//! [`ParseErrorLog`] for the end-of-query summary. A bad record never aborts
//! the batch.

use crate::record::{BatchEntry, NormalizedEvent, RawAuditRecord};
use crate::Timestamp;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::warn;

/// Number of parse-error samples retained per query
pub const MAX_PARSE_ERROR_SAMPLES: usize = 10;

// ============================================================================
// Payload Shape
// ============================================================================

/// Known `AuditData` fields; everything else lands in `rest`
#[derive(Debug, Default, Deserialize)]
struct AuditPayload {
    #[serde(rename = "CreationTime", default, deserialize_with = "lenient_string")]
    creation_time: Option<String>,

    #[serde(rename = "UserId", default, deserialize_with = "lenient_string")]
    user_id: Option<String>,

    #[serde(rename = "Operation", default, deserialize_with = "lenient_string")]
    operation: Option<String>,

    #[serde(rename = "Workload", default, deserialize_with = "lenient_string")]
    workload: Option<String>,

    #[serde(rename = "ObjectId", default, deserialize_with = "lenient_string")]
    object_id: Option<String>,

    #[serde(rename = "ClientIP", default, deserialize_with = "lenient_string")]
    client_ip: Option<String>,

    #[serde(rename = "ClientIPAddress", default, deserialize_with = "lenient_string")]
    client_ip_address: Option<String>,

    #[serde(rename = "UserAgent", default, deserialize_with = "lenient_string")]
    user_agent: Option<String>,

    #[serde(rename = "ExtendedProperties", default, deserialize_with = "null_as_empty")]
    extended_properties: Vec<NamedValue>,

    #[serde(rename = "Parameters", default, deserialize_with = "null_as_empty")]
    parameters: Vec<NamedValue>,

    #[serde(rename = "ModifiedProperties", default, deserialize_with = "null_as_empty")]
    modified_properties: Vec<ModifiedProperty>,

    #[serde(flatten)]
    rest: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct NamedValue {
    #[serde(rename = "Name", default, deserialize_with = "lenient_string")]
    name: Option<String>,

    #[serde(rename = "Value", default)]
    value: Value,
}

#[derive(Debug, Deserialize)]
struct ModifiedProperty {
    #[serde(rename = "Name", default, deserialize_with = "lenient_string")]
    name: Option<String>,

    #[serde(rename = "NewValue", default)]
    new_value: Value,

    #[serde(rename = "OldValue", default)]
    old_value: Value,
}

impl NamedValue {
    fn name(&self) -> Option<&str> {
        usable_name(&self.name)
    }
}

impl ModifiedProperty {
    fn name(&self) -> Option<&str> {
        usable_name(&self.name)
    }
}

/// Entries without a usable name are dropped rather than failing the record
fn usable_name(name: &Option<String>) -> Option<&str> {
    name.as_deref().map(str::trim).filter(|n| !n.is_empty())
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accept strings, numbers and booleans; treat null as absent
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        other => Err(serde::de::Error::custom(format!(
            "expected a scalar, found {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Render any JSON value as a flat string cell
fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        nested => nested.to_string(),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// ============================================================================
// Errors
// ============================================================================

/// A single record whose envelope or payload could not be read
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("record {}: envelope is malformed: {message}", display_id(.record_id))]
    InvalidEnvelope {
        record_id: Option<String>,
        message: String,
    },

    #[error("record {}: payload is missing", display_id(.record_id))]
    MissingPayload { record_id: Option<String> },

    #[error("record {}: payload is not valid JSON: {message}", display_id(.record_id))]
    InvalidJson {
        record_id: Option<String>,
        message: String,
    },

    #[error("record {}: payload is a JSON {found}, expected an object", display_id(.record_id))]
    UnexpectedShape {
        record_id: Option<String>,
        found: &'static str,
    },

    #[error("record {}: payload field has unexpected type: {message}", display_id(.record_id))]
    InvalidField {
        record_id: Option<String>,
        message: String,
    },
}

fn display_id(record_id: &Option<String>) -> &str {
    record_id.as_deref().unwrap_or("<no id>")
}

impl ParseError {
    /// Identity of the record that failed, when the envelope carried one
    pub fn record_id(&self) -> Option<&str> {
        match self {
            Self::MissingPayload { record_id }
            | Self::InvalidEnvelope { record_id, .. }
            | Self::InvalidJson { record_id, .. }
            | Self::UnexpectedShape { record_id, .. }
            | Self::InvalidField { record_id, .. } => record_id.as_deref(),
        }
    }
}

/// One retained parse failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseErrorSample {
    pub record_id: Option<String>,
    pub message: String,
}

/// Count and first few samples of records skipped during a query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseErrorLog {
    count: usize,
    samples: Vec<ParseErrorSample>,
}

impl ParseErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one failure; only the first [`MAX_PARSE_ERROR_SAMPLES`] are kept verbatim
    pub fn record(&mut self, error: &ParseError) {
        self.count += 1;
        if self.samples.len() < MAX_PARSE_ERROR_SAMPLES {
            self.samples.push(ParseErrorSample {
                record_id: error.record_id().map(str::to_string),
                message: error.to_string(),
            });
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn samples(&self) -> &[ParseErrorSample] {
        &self.samples
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

// ============================================================================
// Normalizer
// ============================================================================

/// Turns raw records into normalised events, collecting failures as it goes
#[derive(Debug, Default)]
pub struct RecordNormalizer {
    errors: ParseErrorLog,
}

impl RecordNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalise one batch entry, logging and recording the failure if it is malformed
    ///
    /// Returns `None` for a skipped record.
    pub fn process(&mut self, entry: impl Into<BatchEntry>) -> Option<NormalizedEvent> {
        let normalized = match entry.into() {
            BatchEntry::Record(record) => Self::normalize(record),
            BatchEntry::Malformed(e) => Err(e),
        };

        match normalized {
            Ok(event) => Some(event),
            Err(e) => {
                warn!(
                    record_id = e.record_id().unwrap_or("<no id>"),
                    error = %e,
                    "Skipping unreadable audit record"
                );
                self.errors.record(&e);
                None
            }
        }
    }

    /// Failures recorded so far
    pub fn error_log(&self) -> &ParseErrorLog {
        &self.errors
    }

    pub fn into_error_log(self) -> ParseErrorLog {
        self.errors
    }

    /// Normalise one record without side effects
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] when the payload is absent, is not JSON, is not a
    /// JSON object, or has a non-scalar value where a scalar is expected.
    pub fn normalize(record: RawAuditRecord) -> Result<NormalizedEvent, ParseError> {
        let record_id = record.record_id.clone();
        let payload = Self::read_payload(&record)?;

        let AuditPayload {
            creation_time,
            user_id,
            operation,
            workload,
            object_id,
            client_ip,
            client_ip_address,
            user_agent,
            extended_properties,
            parameters,
            modified_properties,
            rest,
        } = payload;

        let timestamp = creation_time
            .as_deref()
            .and_then(|t| Timestamp::parse_lenient(t).ok())
            .unwrap_or(record.timestamp);

        let actor = non_empty(user_id).unwrap_or_else(|| record.actor_id.clone());

        let operation = non_empty(operation)
            .or_else(|| record.operations.iter().next().cloned())
            .unwrap_or_default();

        let client_ip = non_empty(client_ip)
            .or_else(|| non_empty(client_ip_address))
            .unwrap_or_default();

        let user_agent = non_empty(user_agent)
            .or_else(|| {
                extended_properties
                    .iter()
                    .find(|p| p.name().is_some_and(|n| n.eq_ignore_ascii_case("UserAgent")))
                    .map(|p| value_to_string(&p.value))
            })
            .unwrap_or_default();

        let mut extra_fields = BTreeMap::new();
        for (key, value) in &rest {
            if !value.is_null() {
                extra_fields.insert(key.clone(), value_to_string(value));
            }
        }
        for (prefix, entries) in [
            ("ExtendedProperties", &extended_properties),
            ("Parameters", &parameters),
        ] {
            for entry in entries {
                if let Some(name) = entry.name() {
                    extra_fields.insert(
                        format!("{}.{}", prefix, name),
                        value_to_string(&entry.value),
                    );
                }
            }
        }
        for prop in &modified_properties {
            if let Some(name) = prop.name() {
                extra_fields.insert(
                    format!("ModifiedProperties.{}.NewValue", name),
                    value_to_string(&prop.new_value),
                );
                extra_fields.insert(
                    format!("ModifiedProperties.{}.OldValue", name),
                    value_to_string(&prop.old_value),
                );
            }
        }

        Ok(NormalizedEvent {
            record_id,
            timestamp,
            actor,
            operation,
            record_type: record.record_type,
            workload: workload.unwrap_or_default(),
            object_id: object_id.unwrap_or_default(),
            client_ip,
            user_agent,
            extra_fields,
        })
    }

    fn read_payload(record: &RawAuditRecord) -> Result<AuditPayload, ParseError> {
        let record_id = record.record_id.clone();

        let object = match &record.payload {
            Value::Null => return Err(ParseError::MissingPayload { record_id }),
            Value::String(s) if s.trim().is_empty() => {
                return Err(ParseError::MissingPayload { record_id })
            }
            Value::String(s) => {
                serde_json::from_str::<Value>(s).map_err(|e| ParseError::InvalidJson {
                    record_id: record_id.clone(),
                    message: e.to_string(),
                })?
            }
            other => other.clone(),
        };

        if !object.is_object() {
            return Err(ParseError::UnexpectedShape {
                record_id,
                found: json_kind(&object),
            });
        }

        serde_json::from_value(object).map_err(|e| ParseError::InvalidField {
            record_id,
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
#[path = "normalizer_tests.rs"]
mod tests;

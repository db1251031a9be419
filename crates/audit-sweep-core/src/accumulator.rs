//! # Report Accumulator
//!
//! Collects kept events in arrival order and keeps the summary counters up to
//! date as each event is appended, so no second pass over the data is needed.
//!
//! An accumulator lives for exactly one query and is consumed by
//! [`ReportAccumulator::finish`]; there is no removal or eviction.

use crate::normalizer::ParseErrorLog;
use crate::record::NormalizedEvent;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Field a top-N summary can be computed over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SummaryField {
    Actor,
    Operation,
    Workload,
}

/// Aggregates maintained while events arrive
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_count: usize,
    pub counts_by_actor: HashMap<String, usize>,
    pub counts_by_operation: HashMap<String, usize>,
    pub counts_by_workload: HashMap<String, usize>,
    /// Events dropped because their record id was already seen in this query
    pub duplicates_skipped: usize,
}

impl ReportSummary {
    fn counts(&self, field: SummaryField) -> &HashMap<String, usize> {
        match field {
            SummaryField::Actor => &self.counts_by_actor,
            SummaryField::Operation => &self.counts_by_operation,
            SummaryField::Workload => &self.counts_by_workload,
        }
    }

    /// The `n` most frequent values of `field`
    ///
    /// Ordered by count descending, ties broken by value ascending.
    pub fn top_n(&self, field: SummaryField, n: usize) -> Vec<(String, usize)> {
        let mut entries: Vec<(String, usize)> = self
            .counts(field)
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        entries.truncate(n);
        entries
    }
}

/// Final output of one query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportResult {
    pub events: Vec<NormalizedEvent>,
    pub summary: ReportSummary,
    pub parse_errors: ParseErrorLog,
}

impl ReportResult {
    /// See [`ReportSummary::top_n`]
    pub fn top_n(&self, field: SummaryField, n: usize) -> Vec<(String, usize)> {
        self.summary.top_n(field, n)
    }
}

/// Incremental builder for a [`ReportResult`]
#[derive(Debug, Default)]
pub struct ReportAccumulator {
    events: Vec<NormalizedEvent>,
    summary: ReportSummary,
    seen_ids: HashSet<String>,
}

impl ReportAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event, updating every counter
    ///
    /// Returns `false` when the event duplicates a record already accumulated.
    pub fn push(&mut self, event: NormalizedEvent) -> bool {
        if let Some(id) = &event.record_id {
            if !self.seen_ids.insert(id.clone()) {
                self.summary.duplicates_skipped += 1;
                return false;
            }
        }

        self.summary.total_count += 1;
        *self
            .summary
            .counts_by_actor
            .entry(event.actor.clone())
            .or_insert(0) += 1;
        *self
            .summary
            .counts_by_operation
            .entry(event.operation.clone())
            .or_insert(0) += 1;
        *self
            .summary
            .counts_by_workload
            .entry(event.workload.clone())
            .or_insert(0) += 1;

        self.events.push(event);
        true
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn summary(&self) -> &ReportSummary {
        &self.summary
    }

    /// See [`ReportSummary::top_n`]
    pub fn top_n(&self, field: SummaryField, n: usize) -> Vec<(String, usize)> {
        self.summary.top_n(field, n)
    }

    /// Finalise the report, attaching the parse-error log of the query
    pub fn finish(self, parse_errors: ParseErrorLog) -> ReportResult {
        ReportResult {
            events: self.events,
            summary: self.summary,
            parse_errors,
        }
    }
}

#[cfg(test)]
#[path = "accumulator_tests.rs"]
mod tests;

//! # Query Pipeline
//!
//! Runs one logical audit query end to end: paginated retrieval, per-record
//! normalisation, workload filtering and accumulation.
//!
//! Each batch is fully normalised and accumulated before the next one is
//! requested. A fetch failure aborts the query and discards everything gathered
//! so far; malformed records are skipped and reported in the result.

use crate::accumulator::{ReportAccumulator, ReportResult};
use crate::normalizer::RecordNormalizer;
use crate::query::QuerySpec;
use crate::session::{AuditLogSource, RetrievalSession, TerminationReason};
use crate::window::RetentionClampWarning;
use crate::workload::WorkloadFilter;
use crate::{AuditSweepResult, SessionId};
use tracing::{info, instrument};

/// Result of a completed query plus how retrieval ended
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub result: ReportResult,
    pub termination: TerminationReason,
    pub session_id: SessionId,
    /// Raw records retrieved, before normalisation and filtering
    pub cumulative_count: usize,
    pub batch_count: usize,
    /// Normalised events dropped by the workload filter
    pub filtered_out: usize,
    pub clamp_warning: Option<RetentionClampWarning>,
}

impl QueryOutcome {
    /// True when the hard cap stopped retrieval and more data may exist
    pub fn is_truncated(&self) -> bool {
        self.termination == TerminationReason::CapReached
    }
}

/// One configured audit query
#[derive(Debug, Clone)]
pub struct AuditSearch {
    spec: QuerySpec,
    workload_filter: WorkloadFilter,
}

impl AuditSearch {
    pub fn new(spec: QuerySpec) -> Self {
        Self {
            spec,
            workload_filter: WorkloadFilter::Any,
        }
    }

    pub fn with_workload_filter(mut self, workload_filter: WorkloadFilter) -> Self {
        self.workload_filter = workload_filter;
        self
    }

    pub fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    pub fn workload_filter(&self) -> &WorkloadFilter {
        &self.workload_filter
    }

    /// Run the query under a freshly generated session
    ///
    /// # Errors
    ///
    /// Returns [`crate::AuditSweepError::Fetch`] if any fetch fails. Partial
    /// results are discarded.
    pub async fn run<S>(&self, source: &S) -> AuditSweepResult<QueryOutcome>
    where
        S: AuditLogSource + ?Sized,
    {
        self.run_in_session(source, RetrievalSession::new()).await
    }

    /// Run the query under a caller-provided session
    #[instrument(skip_all, fields(session_id = %session.session_id()))]
    pub async fn run_in_session<S>(
        &self,
        source: &S,
        mut session: RetrievalSession,
    ) -> AuditSweepResult<QueryOutcome>
    where
        S: AuditLogSource + ?Sized,
    {
        let mut normalizer = RecordNormalizer::new();
        let mut accumulator = ReportAccumulator::new();
        let mut filtered_out = 0usize;
        let workload_filter = &self.workload_filter;

        let termination = session
            .run(source, &self.spec, |batch| {
                for entry in batch {
                    let Some(event) = normalizer.process(entry) else {
                        continue;
                    };
                    if workload_filter.matches(&event) {
                        accumulator.push(event);
                    } else {
                        filtered_out += 1;
                    }
                }
            })
            .await?;

        let result = accumulator.finish(normalizer.into_error_log());

        info!(
            termination = %termination,
            retrieved = session.cumulative_count(),
            kept = result.summary.total_count,
            filtered_out,
            duplicates_skipped = result.summary.duplicates_skipped,
            parse_errors = result.parse_errors.count(),
            "Audit query complete"
        );

        Ok(QueryOutcome {
            result,
            termination,
            session_id: session.session_id().clone(),
            cumulative_count: session.cumulative_count(),
            batch_count: session.batch_number(),
            filtered_out,
            clamp_warning: self.spec.window().clamp_warning().cloned(),
        })
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;

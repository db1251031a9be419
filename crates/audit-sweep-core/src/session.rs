//! # Retrieval Session
//!
//! Paginated, session-affine fetch loop over the remote audit log.
//!
//! One [`RetrievalSession`] serves exactly one logical query. Every fetch it
//! issues carries the same [`SessionId`], which is how the remote service keeps
//! a stable, non-overlapping cursor over a log that may be appended to while the
//! query runs. Batches are handed to the caller as soon as they arrive and the
//! next batch is not requested until the callback returns, so peak memory is one
//! batch plus whatever the caller retains.
//!
//! The loop stops on the first of:
//! - an empty batch, or a batch shorter than the page size ([`TerminationReason::Exhausted`])
//! - the cumulative record count reaching the hard cap ([`TerminationReason::CapReached`])
//! - a fetch failure ([`TerminationReason::Error`]); there is no automatic retry

use crate::query::QuerySpec;
use crate::record::AuditBatch;
use crate::{RecordType, SessionId, Timestamp};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};

// ============================================================================
// Remote Source Interface
// ============================================================================

/// Continuation mode sent with every fetch of a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionCommand {
    /// Page through the full result set under one session cursor
    #[default]
    ReturnLargeSet,
}

impl SessionCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReturnLargeSet => "ReturnLargeSet",
        }
    }
}

/// Parameters of one fetch call
///
/// Identical for every fetch of a session; the server advances the cursor
/// from the session identifier alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub start_date: Timestamp,
    pub end_date: Timestamp,
    pub result_size: usize,
    pub session_id: SessionId,
    pub session_command: SessionCommand,
    pub user_ids: Vec<String>,
    pub operations: Vec<String>,
    pub record_type: Option<RecordType>,
}

impl FetchRequest {
    /// Build the request every fetch of `spec` will send under `session_id`
    pub fn for_query(spec: &QuerySpec, session_id: SessionId) -> Self {
        Self {
            start_date: spec.window().effective_start(),
            end_date: spec.window().end(),
            result_size: spec.page_size(),
            session_id,
            session_command: SessionCommand::ReturnLargeSet,
            user_ids: spec.actor_filter().to_vec(),
            operations: spec.operation_filter().iter().cloned().collect(),
            record_type: spec.record_type_filter().cloned(),
        }
    }
}

/// Remote audit-query endpoint
///
/// Implementations own transport concerns (authentication, timeouts). They
/// must not retry on their own behalf: a failed fetch ends the query.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditLogSource: Send + Sync {
    /// Fetch the next batch for the session named in `request`
    ///
    /// An empty batch means the server has no more data.
    async fn fetch_batch(&self, request: &FetchRequest) -> Result<AuditBatch, FetchError>;
}

/// Transport, authentication or server failure during a fetch
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("transport failure: {message}")]
    Transport { message: String },

    #[error("request timed out")]
    Timeout,

    #[error("not authorised ({status}): {message}")]
    Unauthorized { status: u16, message: String },

    #[error("server returned {status}: {message}")]
    Http { status: u16, message: String },

    #[error("response could not be decoded: {message}")]
    InvalidResponse { message: String },

    #[error("session already terminated ({reason})")]
    SessionTerminated { reason: TerminationReason },
}

impl FetchError {
    /// Check if rerunning the query could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Timeout => true,
            Self::Unauthorized { .. } => false,
            Self::Http { status, .. } => *status >= 500 || *status == 429,
            Self::InvalidResponse { .. } => false,
            Self::SessionTerminated { .. } => false,
        }
    }
}

// ============================================================================
// Termination
// ============================================================================

/// Why a session stopped fetching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationReason {
    /// The server has no more data for this query
    Exhausted,
    /// The client-side hard cap was reached
    CapReached,
    /// A fetch failed and the query was aborted
    Error,
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Exhausted => "exhausted",
            Self::CapReached => "cap reached",
            Self::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// A batch shorter than the requested page means the server has no more data
pub fn is_short_batch(batch_size: usize, page_size: usize) -> bool {
    batch_size < page_size
}

/// The client-side safety limit has been hit
pub fn is_cap_reached(cumulative_count: usize, hard_cap: usize) -> bool {
    cumulative_count >= hard_cap
}

/// Decide whether to stop after a non-empty batch
///
/// `cumulative_count` includes every record returned so far, before any
/// truncation to the hard cap. When it overshoots the cap the server still had
/// data, so the cap wins over a short batch; otherwise a short batch means
/// exhaustion even if it happens to land exactly on the cap.
pub fn termination_after_batch(
    batch_size: usize,
    page_size: usize,
    cumulative_count: usize,
    hard_cap: usize,
) -> Option<TerminationReason> {
    if cumulative_count > hard_cap {
        Some(TerminationReason::CapReached)
    } else if is_short_batch(batch_size, page_size) {
        Some(TerminationReason::Exhausted)
    } else if is_cap_reached(cumulative_count, hard_cap) {
        Some(TerminationReason::CapReached)
    } else {
        None
    }
}

// ============================================================================
// Session
// ============================================================================

/// State of one paginated query against the remote log
#[derive(Debug, Clone)]
pub struct RetrievalSession {
    session_id: SessionId,
    batch_number: usize,
    cumulative_count: usize,
    termination: Option<TerminationReason>,
}

impl RetrievalSession {
    /// Start a session with a freshly generated identifier
    pub fn new() -> Self {
        Self::with_session_id(SessionId::generate())
    }

    /// Start a session with a caller-chosen identifier
    pub fn with_session_id(session_id: SessionId) -> Self {
        Self {
            session_id,
            batch_number: 0,
            cumulative_count: 0,
            termination: None,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Number of non-empty batches received
    pub fn batch_number(&self) -> usize {
        self.batch_number
    }

    /// Records handed to the caller so far; never exceeds the hard cap
    pub fn cumulative_count(&self) -> usize {
        self.cumulative_count
    }

    pub fn is_terminated(&self) -> bool {
        self.termination.is_some()
    }

    pub fn termination_reason(&self) -> Option<TerminationReason> {
        self.termination
    }

    /// Fetch every available batch for `spec`, handing each to `on_batch`
    ///
    /// Batches are delivered in server order. A batch that would take the
    /// cumulative count past the hard cap is truncated first.
    ///
    /// # Errors
    ///
    /// Returns the [`FetchError`] of the first failed fetch; the session is then
    /// terminated with [`TerminationReason::Error`]. A session serves one query:
    /// running it again returns [`FetchError::SessionTerminated`] without fetching.
    pub async fn run<S, F>(
        &mut self,
        source: &S,
        spec: &QuerySpec,
        mut on_batch: F,
    ) -> Result<TerminationReason, FetchError>
    where
        S: AuditLogSource + ?Sized,
        F: FnMut(AuditBatch),
    {
        if let Some(reason) = self.termination {
            return Err(FetchError::SessionTerminated { reason });
        }

        let request = FetchRequest::for_query(spec, self.session_id.clone());

        info!(
            session_id = %self.session_id,
            start = %request.start_date,
            end = %request.end_date,
            page_size = spec.page_size(),
            hard_cap = spec.hard_cap(),
            "Starting audit log retrieval"
        );

        loop {
            let mut batch = match source.fetch_batch(&request).await {
                Ok(batch) => batch,
                Err(e) => {
                    error!(
                        session_id = %self.session_id,
                        batch_number = self.batch_number + 1,
                        cumulative_count = self.cumulative_count,
                        error = %e,
                        "Audit log fetch failed; aborting query"
                    );
                    self.termination = Some(TerminationReason::Error);
                    return Err(e);
                }
            };

            if batch.is_empty() {
                debug!(session_id = %self.session_id, "Empty batch; log exhausted");
                return Ok(self.terminate(TerminationReason::Exhausted));
            }

            let returned = batch.len();
            let untruncated_total = self.cumulative_count + returned;
            let remaining = spec.hard_cap().saturating_sub(self.cumulative_count);
            if returned > remaining {
                batch.truncate(remaining);
            }

            self.cumulative_count += batch.len();
            self.batch_number += 1;

            info!(
                session_id = %self.session_id,
                batch_number = self.batch_number,
                batch_size = returned,
                cumulative_count = self.cumulative_count,
                "Received audit batch"
            );

            on_batch(batch);

            if let Some(reason) =
                termination_after_batch(returned, spec.page_size(), untruncated_total, spec.hard_cap())
            {
                return Ok(self.terminate(reason));
            }
        }
    }

    fn terminate(&mut self, reason: TerminationReason) -> TerminationReason {
        info!(
            session_id = %self.session_id,
            batches = self.batch_number,
            cumulative_count = self.cumulative_count,
            reason = %reason,
            "Audit log retrieval finished"
        );
        self.termination = Some(reason);
        reason
    }
}

impl Default for RetrievalSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;

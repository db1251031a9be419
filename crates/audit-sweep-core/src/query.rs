//! # Query Specification
//!
//! Immutable description of one logical audit query: the window, the optional
//! server-side filters, the requested page size and the client-side hard cap.

use crate::window::QueryWindow;
use crate::{RecordType, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Largest page the remote endpoint will return in one fetch
pub const MAX_PAGE_SIZE: usize = 5000;

/// Default client-side limit on records retrieved by one query
///
/// Kept as a configurable safety valve against very active tenants; the value
/// itself carries no business meaning.
pub const DEFAULT_HARD_CAP: usize = 50_000;

/// One logical audit query
///
/// Created once per invocation through [`QuerySpec::builder`] and never mutated.
///
/// # Examples
///
/// ```rust
/// use audit_sweep_core::{QuerySpec, QueryWindow, Timestamp};
///
/// let now = Timestamp::now();
/// let window = QueryWindow::last_days(7, now, 90).unwrap();
/// let spec = QuerySpec::builder(window)
///     .actor("alice@contoso.com")
///     .operation("FileDeleted")
///     .page_size(1000)
///     .build()
///     .unwrap();
///
/// assert_eq!(spec.page_size(), 1000);
/// assert_eq!(spec.actor_filter(), ["alice@contoso.com".to_string()]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySpec {
    window: QueryWindow,
    actor_filter: Vec<String>,
    operation_filter: BTreeSet<String>,
    record_type_filter: Option<RecordType>,
    page_size: usize,
    hard_cap: usize,
}

impl QuerySpec {
    /// Start building a query over `window`
    pub fn builder(window: QueryWindow) -> QuerySpecBuilder {
        QuerySpecBuilder::new(window)
    }

    pub fn window(&self) -> &QueryWindow {
        &self.window
    }

    /// User identifiers the server should restrict results to (empty = all)
    pub fn actor_filter(&self) -> &[String] {
        &self.actor_filter
    }

    /// Operation names the server should restrict results to (empty = all)
    pub fn operation_filter(&self) -> &BTreeSet<String> {
        &self.operation_filter
    }

    pub fn record_type_filter(&self) -> Option<&RecordType> {
        self.record_type_filter.as_ref()
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn hard_cap(&self) -> usize {
        self.hard_cap
    }

    /// Upper bound on fetch calls this query can issue
    ///
    /// Every full page adds `page_size` records, so the cap is reached after
    /// `ceil(hard_cap / page_size)` fetches; one more covers a trailing empty page.
    pub fn max_fetches(&self) -> usize {
        self.hard_cap.div_ceil(self.page_size) + 1
    }
}

/// Builder for [`QuerySpec`]
#[derive(Debug, Clone)]
pub struct QuerySpecBuilder {
    window: QueryWindow,
    actor_filter: Vec<String>,
    operation_filter: BTreeSet<String>,
    record_type_filter: Option<RecordType>,
    page_size: usize,
    hard_cap: usize,
}

impl QuerySpecBuilder {
    /// Create a builder with default page size and hard cap
    pub fn new(window: QueryWindow) -> Self {
        Self {
            window,
            actor_filter: Vec::new(),
            operation_filter: BTreeSet::new(),
            record_type_filter: None,
            page_size: MAX_PAGE_SIZE,
            hard_cap: DEFAULT_HARD_CAP,
        }
    }

    /// Restrict to one more user identifier
    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.actor_filter.push(actor.into());
        self
    }

    /// Restrict to several user identifiers
    pub fn actors<I, S>(mut self, actors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.actor_filter.extend(actors.into_iter().map(Into::into));
        self
    }

    /// Restrict to one more operation name
    pub fn operation(mut self, operation: impl Into<String>) -> Self {
        self.operation_filter.insert(operation.into());
        self
    }

    /// Restrict to several operation names
    pub fn operations<I, S>(mut self, operations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.operation_filter
            .extend(operations.into_iter().map(Into::into));
        self
    }

    pub fn record_type(mut self, record_type: RecordType) -> Self {
        self.record_type_filter = Some(record_type);
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn hard_cap(mut self, hard_cap: usize) -> Self {
        self.hard_cap = hard_cap;
        self
    }

    /// Validate and build the query
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if the page size is outside `1..=MAX_PAGE_SIZE`,
    /// the hard cap is zero, or a filter entry is blank.
    pub fn build(self) -> Result<QuerySpec, ValidationError> {
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(ValidationError::OutOfRange {
                field: "page_size".to_string(),
                message: format!(
                    "must be between 1 and {}, got {}",
                    MAX_PAGE_SIZE, self.page_size
                ),
            });
        }

        if self.hard_cap == 0 {
            return Err(ValidationError::OutOfRange {
                field: "hard_cap".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        if self.actor_filter.iter().any(|a| a.trim().is_empty()) {
            return Err(ValidationError::Required {
                field: "actor_filter".to_string(),
            });
        }

        if self.operation_filter.iter().any(|o| o.trim().is_empty()) {
            return Err(ValidationError::Required {
                field: "operation_filter".to_string(),
            });
        }

        Ok(QuerySpec {
            window: self.window,
            actor_filter: self.actor_filter,
            operation_filter: self.operation_filter,
            record_type_filter: self.record_type_filter,
            page_size: self.page_size,
            hard_cap: self.hard_cap,
        })
    }
}

#[cfg(test)]
#[path = "query_tests.rs"]
mod tests;

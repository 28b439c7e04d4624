//! Observable state of one cache entry

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use trakure_core::Error;

/// Lifecycle of a cached read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryStatus {
    /// Nothing requested yet
    Idle,
    /// First fetch in progress, no data yet
    Loading,
    /// Last fetch succeeded
    Success,
    /// Last fetch failed; earlier data, if any, is still available
    Error,
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Loading => write!(f, "loading"),
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Snapshot handed to subscribers
#[derive(Debug, Clone)]
pub struct QueryState<T> {
    /// Last successfully fetched value
    pub data: Option<T>,
    /// Outcome of the most recent completed fetch
    pub status: QueryStatus,
    /// Error of the most recent fetch, cleared on success
    pub error: Option<Arc<Error>>,
    /// Whether a fetch is running right now
    pub is_fetching: bool,
    /// When `data` was fetched
    pub updated_at: Option<DateTime<Utc>>,
    /// Consecutive failed fetches
    pub failure_count: u32,
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self::idle()
    }
}

impl<T> QueryState<T> {
    /// State of an entry that has never fetched
    #[must_use]
    pub const fn idle() -> Self {
        Self {
            data: None,
            status: QueryStatus::Idle,
            error: None,
            is_fetching: false,
            updated_at: None,
            failure_count: 0,
        }
    }

    /// First load still running
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self.status, QueryStatus::Loading)
    }

    /// Last fetch failed
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self.status, QueryStatus::Error)
    }

    /// No fetch running and at least one has completed
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        !self.is_fetching && matches!(self.status, QueryStatus::Success | QueryStatus::Error)
    }

    /// Something to render other than a skeleton: data, or an error with none
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        self.data.is_some() || self.is_error()
    }

    pub(crate) const fn begin_fetch(&mut self) {
        self.is_fetching = true;
        if self.data.is_none() {
            self.status = QueryStatus::Loading;
        }
    }

    pub(crate) fn resolve(&mut self, data: T) {
        self.data = Some(data);
        self.status = QueryStatus::Success;
        self.error = None;
        self.is_fetching = false;
        self.updated_at = Some(Utc::now());
        self.failure_count = 0;
    }

    pub(crate) fn reject(&mut self, error: Error) {
        self.status = QueryStatus::Error;
        self.error = Some(Arc::new(error));
        self.is_fetching = false;
        self.failure_count = self.failure_count.saturating_add(1);
    }
}

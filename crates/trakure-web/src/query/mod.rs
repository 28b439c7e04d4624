//! Deduplicating, stale-while-revalidate query cache
//!
//! Reads are keyed by a [`QueryKey`] (endpoint identity plus parameters). All
//! subscribers of a key share one cache entry and at most one in-flight fetch.
//! Within `stale_time` of a successful fetch, new subscribers are served from
//! the cache without touching the network; after that they still get the
//! cached value immediately while a background refetch runs. While a key has
//! subscribers a timer refetches it every `refetch_interval`. When the last
//! subscriber leaves, the timer stops and the entry is evicted after
//! `gc_time`.
//!
//! Fetch failures never escape as errors to subscribers: they become
//! [`QueryStatus::Error`] with the last good data kept alongside.
//!
//! Every fetch carries a per-key generation number. A response is applied
//! only if its generation is still the newest for the key and the entry has
//! not been evicted, so a slow response cannot overwrite a fresher one.

mod client;
mod entry;
mod key;
mod options;
mod state;
mod subscription;

pub use client::QueryClient;
pub use key::QueryKey;
pub use options::QueryOptions;
pub use state::{QueryState, QueryStatus};
pub use subscription::Subscription;

use async_trait::async_trait;
use std::sync::Arc;
use trakure_core::{Error, Result};

/// Outcome of a one-shot [`QueryClient::fetch_query`]
///
/// The error is shared with every subscriber of the key, hence the `Arc`.
pub type QueryResult<T> = std::result::Result<T, Arc<Error>>;

/// Bound for values that can live in the cache
pub trait QueryData: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> QueryData for T {}

/// A cacheable read
#[async_trait]
pub trait Query: Send + Sync + 'static {
    /// Decoded payload
    type Data: QueryData;

    /// Cache key; equal keys share one entry
    fn key(&self) -> QueryKey;

    /// Adjust the client defaults for this query
    fn options(&self, defaults: QueryOptions) -> QueryOptions {
        defaults
    }

    /// Perform one fetch
    async fn fetch(&self) -> Result<Self::Data>;
}

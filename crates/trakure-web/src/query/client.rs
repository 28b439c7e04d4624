//! Process-wide query cache

use super::entry::{ErasedEntry, QueryEntry};
use super::{Query, QueryData, QueryKey, QueryOptions, QueryResult, QueryState, Subscription};
use dashmap::DashMap;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::runtime::Handle;
use tracing::{debug, info};
use trakure_core::config::QueryConfig;
use trakure_core::{Error, Result};

/// One cached key: the typed entry behind `Any` plus its erased controls
struct CacheSlot {
    /// Distinguishes an entry from a later one created under the same key
    id: u64,
    data: Arc<dyn Any + Send + Sync>,
    control: Arc<dyn ErasedEntry>,
}

pub(crate) struct Shared {
    entries: DashMap<QueryKey, CacheSlot>,
    defaults: QueryOptions,
    next_id: AtomicU64,
    runtime: Handle,
}

impl Shared {
    fn entry_for<Q: Query>(&self, query: Arc<Q>) -> Result<Arc<QueryEntry<Q::Data>>> {
        let key = query.key();
        let data = {
            let slot = self.entries.entry(key.clone()).or_insert_with(|| {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let entry = Arc::new(QueryEntry::new(
                    id,
                    query,
                    self.defaults,
                    self.runtime.clone(),
                ));
                debug!(key = %key, id, "Created cache entry");
                CacheSlot {
                    id,
                    data: Arc::clone(&entry) as Arc<dyn Any + Send + Sync>,
                    control: entry,
                }
            });
            Arc::clone(&slot.data)
        };

        data.downcast::<QueryEntry<Q::Data>>()
            .map_err(|_| Error::Validation {
                field: "query_key".to_string(),
                message: format!("{key} is already cached with a different data type"),
            })
    }

    fn lookup<T: QueryData>(&self, key: &QueryKey) -> Option<Arc<QueryEntry<T>>> {
        let data = self.entries.get(key).map(|slot| Arc::clone(&slot.data))?;
        data.downcast::<QueryEntry<T>>().ok()
    }

    fn control(&self, key: &QueryKey) -> Option<Arc<dyn ErasedEntry>> {
        self.entries.get(key).map(|slot| Arc::clone(&slot.control))
    }

    /// Called when a subscription goes away
    pub(crate) fn release<T: QueryData>(self: &Arc<Self>, entry: &Arc<QueryEntry<T>>) {
        if !entry.detach() {
            return;
        }

        let gc_time = entry.options().gc_time;
        let client = Arc::downgrade(self);
        let target = Arc::downgrade(entry);
        debug!(
            key = %entry.key(),
            gc_ms = u64::try_from(gc_time.as_millis()).unwrap_or(u64::MAX),
            "Scheduling eviction"
        );

        let timer = self.runtime.spawn(async move {
            tokio::time::sleep(gc_time).await;
            if let (Some(client), Some(entry)) = (client.upgrade(), target.upgrade()) {
                client.evict(&entry);
            }
        });
        entry.schedule_gc(timer);
    }

    fn evict<T: QueryData>(&self, entry: &QueryEntry<T>) {
        if !entry.try_evict() {
            return;
        }
        let id = entry.id();
        if self.entries.remove_if(entry.key(), |_, slot| slot.id == id).is_some() {
            debug!(key = %entry.key(), id, "Evicted unused cache entry");
        }
    }
}

/// Shared cache of query results
///
/// Cloning is cheap; all clones see the same entries.
#[derive(Clone)]
pub struct QueryClient {
    shared: Arc<Shared>,
}

impl QueryClient {
    /// Create a client on the current tokio runtime
    ///
    /// # Errors
    ///
    /// Returns a configuration error when called outside a tokio runtime.
    pub fn new(defaults: QueryOptions) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|e| Error::Configuration {
            message: format!("Query client needs a tokio runtime: {e}"),
        })?;

        info!(
            stale_ms = u64::try_from(defaults.stale_time.as_millis()).unwrap_or(u64::MAX),
            gc_ms = u64::try_from(defaults.gc_time.as_millis()).unwrap_or(u64::MAX),
            retry = defaults.retry,
            "Query cache ready"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                entries: DashMap::new(),
                defaults,
                next_id: AtomicU64::new(1),
                runtime,
            }),
        })
    }

    /// Create a client from the `[query]` configuration section
    ///
    /// # Errors
    ///
    /// Returns a configuration error when called outside a tokio runtime.
    pub fn from_config(config: &QueryConfig) -> Result<Self> {
        Self::new(QueryOptions::from(config))
    }

    /// Options every query starts from
    #[must_use]
    pub fn defaults(&self) -> QueryOptions {
        self.shared.defaults
    }

    /// Subscribe to a query, fetching it if nothing fresh is cached
    ///
    /// # Errors
    ///
    /// Returns a validation error if the key is already cached with a
    /// different data type.
    pub fn subscribe<Q: Query>(&self, query: Q) -> Result<Subscription<Q::Data>> {
        let query = Arc::new(query);
        loop {
            let entry = self.shared.entry_for(Arc::clone(&query))?;
            if let Some(receiver) = entry.attach() {
                return Ok(Subscription::new(
                    entry,
                    receiver,
                    Arc::downgrade(&self.shared),
                ));
            }

            // Lost a race with eviction: drop the stale slot and start over.
            let id = entry.id();
            self.shared
                .entries
                .remove_if(entry.key(), |_, slot| slot.id == id);
        }
    }

    /// Subscribe, wait for the fetch to settle and return its outcome
    ///
    /// # Errors
    ///
    /// Returns the fetch error if the latest fetch failed, even when older
    /// data is cached.
    pub async fn fetch_query<Q: Query>(&self, query: Q) -> QueryResult<Q::Data> {
        let mut subscription = self.subscribe(query).map_err(Arc::new)?;
        let state = subscription.settled().await;

        if let Some(error) = state.error {
            return Err(error);
        }
        state.data.ok_or_else(|| {
            Arc::new(Error::Other(format!(
                "{} settled without data",
                subscription.key()
            )))
        })
    }

    /// Cached data for a key, if any
    #[must_use]
    pub fn get_query_data<T: QueryData>(&self, key: &QueryKey) -> Option<T> {
        self.shared.lookup::<T>(key)?.data()
    }

    /// Full cached state for a key
    #[must_use]
    pub fn get_query_state<T: QueryData>(&self, key: &QueryKey) -> Option<QueryState<T>> {
        self.shared.lookup::<T>(key).map(|entry| entry.snapshot())
    }

    /// Mark a key stale; refetches at once if it has subscribers
    ///
    /// Returns `false` if nothing is cached under the key.
    pub fn invalidate(&self, key: &QueryKey) -> bool {
        let Some(control) = self.shared.control(key) else {
            return false;
        };
        debug!(key = %key, "Invalidating query");
        control.invalidate_entry();
        true
    }

    /// Invalidate every cached key with the given scope, returning how many
    pub fn invalidate_scope(&self, scope: &str) -> usize {
        let controls: Vec<_> = self
            .shared
            .entries
            .iter()
            .filter(|slot| slot.key().scope() == scope)
            .map(|slot| Arc::clone(&slot.control))
            .collect();

        let count = controls.len();
        for control in controls {
            control.invalidate_entry();
        }
        debug!(scope, count, "Invalidated query scope");
        count
    }

    /// Drop a key from the cache, active subscriptions included
    ///
    /// Live subscriptions keep their last data but receive no more updates. A
    /// fetch still running for the key settles as an error.
    pub fn remove(&self, key: &QueryKey) -> bool {
        let Some((_, slot)) = self.shared.entries.remove(key) else {
            return false;
        };
        slot.control.evict_entry();
        debug!(key = %key, "Removed query");
        true
    }

    /// Drop every entry
    pub fn clear(&self) {
        let keys = self.keys();
        for key in &keys {
            if let Some((_, slot)) = self.shared.entries.remove(key) {
                slot.control.evict_entry();
            }
        }
        info!(count = keys.len(), "Cleared query cache");
    }

    /// Number of cached keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.entries.len()
    }

    /// Whether nothing is cached
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shared.entries.is_empty()
    }

    /// Cached keys, sorted
    #[must_use]
    pub fn keys(&self) -> Vec<QueryKey> {
        let mut keys: Vec<QueryKey> = self
            .shared
            .entries
            .iter()
            .map(|slot| slot.key().clone())
            .collect();
        keys.sort();
        keys
    }

    /// Active subscriptions for a key
    #[must_use]
    pub fn subscriber_count(&self, key: &QueryKey) -> usize {
        self.shared
            .control(key)
            .map_or(0, |control| control.subscriber_total())
    }
}

impl fmt::Debug for QueryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryClient")
            .field("entries", &self.shared.entries.len())
            .field("defaults", &self.shared.defaults)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, clippy::unwrap_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    struct Constant(&'static str, u32);

    #[async_trait]
    impl Query for Constant {
        type Data = u32;

        fn key(&self) -> QueryKey {
            QueryKey::new(self.0)
        }

        async fn fetch(&self) -> Result<u32> {
            Ok(self.1)
        }
    }

    struct Text(&'static str);

    #[async_trait]
    impl Query for Text {
        type Data = String;

        fn key(&self) -> QueryKey {
            QueryKey::new(self.0)
        }

        async fn fetch(&self) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn test_new_outside_runtime_fails() {
        let error = QueryClient::new(QueryOptions::default()).unwrap_err();
        assert!(matches!(error, Error::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_fetch_query_populates_cache() {
        let client = QueryClient::new(QueryOptions::default()).unwrap();

        assert_eq!(client.fetch_query(Constant("answer", 42)).await.unwrap(), 42);
        assert_eq!(client.get_query_data::<u32>(&QueryKey::new("answer")), Some(42));
        assert_eq!(client.len(), 1);
        assert_eq!(client.subscriber_count(&QueryKey::new("answer")), 0);
    }

    #[tokio::test]
    async fn test_type_mismatch_is_rejected() {
        let client = QueryClient::new(QueryOptions::default()).unwrap();
        let _numbers = client.subscribe(Constant("shared", 1)).unwrap();

        let error = client.subscribe(Text("shared")).unwrap_err();
        assert!(matches!(error, Error::Validation { ref field, .. } if field == "query_key"));
        assert_eq!(client.get_query_data::<String>(&QueryKey::new("shared")), None);
    }

    #[tokio::test]
    async fn test_keys_remove_and_clear() {
        let client = QueryClient::new(QueryOptions::default()).unwrap();
        client.fetch_query(Constant("b", 2)).await.unwrap();
        client.fetch_query(Constant("a", 1)).await.unwrap();

        assert_eq!(client.keys(), vec![QueryKey::new("a"), QueryKey::new("b")]);
        assert!(client.remove(&QueryKey::new("a")));
        assert!(!client.remove(&QueryKey::new("a")));
        assert_eq!(client.len(), 1);

        client.clear();
        assert!(client.is_empty());
        assert!(!client.invalidate(&QueryKey::new("b")));
    }
}

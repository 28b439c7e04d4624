//! Subscriber handle

use super::client::Shared;
use super::entry::QueryEntry;
use super::{QueryData, QueryKey, QueryState, QueryStatus};
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;

/// A live interest in one query key
///
/// While any subscription for a key exists, the key stays cached and its
/// periodic refetch keeps running. Dropping the subscription releases it.
pub struct Subscription<T: QueryData> {
    entry: Arc<QueryEntry<T>>,
    receiver: watch::Receiver<QueryState<T>>,
    client: Weak<Shared>,
}

impl<T: QueryData> Subscription<T> {
    pub(crate) const fn new(
        entry: Arc<QueryEntry<T>>,
        receiver: watch::Receiver<QueryState<T>>,
        client: Weak<Shared>,
    ) -> Self {
        Self {
            entry,
            receiver,
            client,
        }
    }

    /// Key this subscription watches
    #[must_use]
    pub fn key(&self) -> &QueryKey {
        self.entry.key()
    }

    /// Current state, without waiting
    #[must_use]
    pub fn state(&self) -> QueryState<T> {
        self.receiver.borrow().clone()
    }

    /// Current data, without waiting
    #[must_use]
    pub fn data(&self) -> Option<T> {
        self.receiver.borrow().data.clone()
    }

    /// Current status, without waiting
    #[must_use]
    pub fn status(&self) -> QueryStatus {
        self.receiver.borrow().status
    }

    /// Wait for the next state change
    ///
    /// A key removed with [`super::QueryClient::remove`] never changes again.
    pub async fn changed(&mut self) -> QueryState<T> {
        if self.receiver.changed().await.is_err() {
            return self.state();
        }
        self.receiver.borrow_and_update().clone()
    }

    /// Wait until no fetch is running and one has completed
    pub async fn settled(&mut self) -> QueryState<T> {
        self.wait_until(QueryState::is_settled).await
    }

    /// Wait until there is data or an error to show
    pub async fn ready(&mut self) -> QueryState<T> {
        self.wait_until(QueryState::is_ready).await
    }

    /// Like [`Self::ready`], giving up after `timeout`
    ///
    /// Returns `None` if the state is still not ready by then.
    pub async fn ready_within(&mut self, timeout: Duration) -> Option<QueryState<T>> {
        tokio::time::timeout(timeout, self.ready()).await.ok()
    }

    /// Fetch now, superseding any fetch in flight
    pub fn refetch(&self) {
        self.entry.refetch();
    }

    /// Release the subscription
    pub fn unsubscribe(self) {
        drop(self);
    }

    async fn wait_until(&mut self, condition: fn(&QueryState<T>) -> bool) -> QueryState<T> {
        let outcome = self
            .receiver
            .wait_for(condition)
            .await
            .map(|state| (*state).clone());
        outcome.unwrap_or_else(|_| self.state())
    }
}

impl<T: QueryData> Drop for Subscription<T> {
    fn drop(&mut self) {
        match self.client.upgrade() {
            Some(client) => client.release(&self.entry),
            None => {
                self.entry.detach();
            }
        }
    }
}

impl<T: QueryData> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.receiver.borrow();
        f.debug_struct("Subscription")
            .field("key", self.entry.key())
            .field("status", &state.status)
            .field("is_fetching", &state.is_fetching)
            .finish_non_exhaustive()
    }
}

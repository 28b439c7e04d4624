//! Per-key cache entry: shared state, fetch scheduling and timers

use super::{Query, QueryData, QueryKey, QueryOptions, QueryState};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, trace, warn};
use trakure_core::{Error, Result};

/// Mutable bookkeeping guarded by the entry lock
#[derive(Debug, Default)]
struct Bookkeeping {
    subscribers: usize,
    /// Bumped for every fetch started and on eviction
    generation: u64,
    /// Generation of the fetch currently running
    in_flight: Option<u64>,
    last_fetched_at: Option<Instant>,
    invalidated: bool,
    evicted: bool,
    refetch_timer: Option<JoinHandle<()>>,
    gc_timer: Option<JoinHandle<()>>,
}

pub(crate) struct QueryEntry<T: QueryData> {
    id: u64,
    key: QueryKey,
    query: Arc<dyn Query<Data = T>>,
    options: QueryOptions,
    runtime: Handle,
    book: Mutex<Bookkeeping>,
    state: watch::Sender<QueryState<T>>,
}

/// Type-erased operations the client needs without knowing `T`
pub(crate) trait ErasedEntry: Send + Sync {
    fn invalidate_entry(self: Arc<Self>);
    fn evict_entry(&self);
    fn subscriber_total(&self) -> usize;
}

impl<T: QueryData> QueryEntry<T> {
    pub(crate) fn new(
        id: u64,
        query: Arc<dyn Query<Data = T>>,
        defaults: QueryOptions,
        runtime: Handle,
    ) -> Self {
        let key = query.key();
        let options = query.options(defaults);
        let (state, _) = watch::channel(QueryState::idle());

        Self {
            id,
            key,
            query,
            options,
            runtime,
            book: Mutex::new(Bookkeeping::default()),
            state,
        }
    }

    pub(crate) const fn id(&self) -> u64 {
        self.id
    }

    pub(crate) const fn key(&self) -> &QueryKey {
        &self.key
    }

    pub(crate) const fn options(&self) -> &QueryOptions {
        &self.options
    }

    pub(crate) fn snapshot(&self) -> QueryState<T> {
        self.state.borrow().clone()
    }

    pub(crate) fn data(&self) -> Option<T> {
        self.state.borrow().data.clone()
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.book.lock().subscribers
    }

    /// Register a subscriber.
    ///
    /// Returns `None` if the entry was evicted in the meantime; the caller must
    /// then create a fresh entry.
    pub(crate) fn attach(self: &Arc<Self>) -> Option<watch::Receiver<QueryState<T>>> {
        let mut book = self.book.lock();
        if book.evicted {
            return None;
        }

        book.subscribers += 1;
        if let Some(timer) = book.gc_timer.take() {
            timer.abort();
            trace!(key = %self.key, "Cancelled pending eviction");
        }
        if book.subscribers == 1
            && let Some(period) = self.options.refetch_interval
        {
            book.refetch_timer = Some(self.spawn_refetch_timer(period));
        }

        let receiver = self.state.subscribe();
        if self.needs_fetch(&book) {
            self.begin_fetch(&mut book, false);
        }
        drop(book);

        Some(receiver)
    }

    /// Drop a subscriber. Returns `true` if it was the last one.
    pub(crate) fn detach(&self) -> bool {
        let mut book = self.book.lock();
        book.subscribers = book.subscribers.saturating_sub(1);
        if book.subscribers > 0 {
            return false;
        }

        if let Some(timer) = book.refetch_timer.take() {
            timer.abort();
            debug!(key = %self.key, "Last subscriber left, stopped refetch timer");
        }
        true
    }

    /// Hand over the eviction timer. Aborted right away if a subscriber
    /// arrived between [`Self::detach`] and this call.
    pub(crate) fn schedule_gc(&self, timer: JoinHandle<()>) {
        let mut book = self.book.lock();
        if book.subscribers == 0 && !book.evicted {
            if let Some(previous) = book.gc_timer.replace(timer) {
                previous.abort();
            }
        } else {
            timer.abort();
        }
    }

    /// Mark the entry evicted if it is still unsubscribed
    pub(crate) fn try_evict(&self) -> bool {
        let mut book = self.book.lock();
        if book.subscribers > 0 || book.evicted {
            return false;
        }
        self.retire(&mut book);
        // The caller is the GC timer itself; dropping the handle detaches it.
        book.gc_timer = None;
        true
    }

    pub(crate) fn invalidate(self: &Arc<Self>) {
        let mut book = self.book.lock();
        if book.evicted {
            return;
        }
        book.invalidated = true;
        if book.subscribers > 0 {
            self.begin_fetch(&mut book, true);
        }
    }

    /// Start a fetch that supersedes whatever is in flight
    pub(crate) fn refetch(self: &Arc<Self>) {
        let mut book = self.book.lock();
        self.begin_fetch(&mut book, true);
    }

    /// Stop all activity. A fetch cut short settles as an error so that
    /// nobody waiting on it hangs.
    fn retire(&self, book: &mut Bookkeeping) {
        book.evicted = true;
        book.generation += 1;
        if let Some(timer) = book.refetch_timer.take() {
            timer.abort();
        }
        if let Some(generation) = book.in_flight.take() {
            debug!(key = %self.key, generation, "Cancelled in-flight fetch on eviction");
            let error = Error::Other(format!("{} was removed from the cache", self.key));
            self.state.send_modify(|state| state.reject(error));
        }
    }

    fn needs_fetch(&self, book: &Bookkeeping) -> bool {
        book.invalidated
            || book
                .last_fetched_at
                .is_none_or(|fetched_at| fetched_at.elapsed() >= self.options.stale_time)
    }

    fn begin_fetch(self: &Arc<Self>, book: &mut Bookkeeping, supersede: bool) {
        if book.evicted {
            return;
        }
        if let Some(generation) = book.in_flight
            && !supersede
        {
            trace!(key = %self.key, generation, "Fetch already in flight, attaching");
            return;
        }

        book.generation += 1;
        let generation = book.generation;
        book.in_flight = Some(generation);
        self.state.send_modify(QueryState::begin_fetch);
        debug!(key = %self.key, generation, supersede, "Starting fetch");

        let entry = Arc::clone(self);
        self.runtime.spawn(async move {
            let outcome = entry.fetch_with_retry(generation).await;
            entry.settle(generation, outcome);
        });
    }

    async fn fetch_with_retry(&self, generation: u64) -> Result<T> {
        let mut attempt: u32 = 0;
        loop {
            let error = match self.query.fetch().await {
                Ok(data) => return Ok(data),
                Err(error) => error,
            };

            if attempt >= self.options.retry
                || !error.is_retryable()
                || !self.is_current(generation)
            {
                return Err(error);
            }

            let delay = self.options.retry_delay_for(attempt);
            attempt += 1;
            warn!(
                key = %self.key,
                attempt,
                max_retries = self.options.retry,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %error,
                "Fetch failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        let book = self.book.lock();
        !book.evicted && book.generation == generation
    }

    fn settle(&self, generation: u64, outcome: Result<T>) {
        let mut book = self.book.lock();
        if book.evicted || book.generation != generation {
            debug!(
                key = %self.key,
                generation,
                current = book.generation,
                evicted = book.evicted,
                "Discarding superseded response"
            );
            return;
        }

        book.in_flight = None;
        match outcome {
            Ok(data) => {
                book.last_fetched_at = Some(Instant::now());
                book.invalidated = false;
                self.state.send_modify(|state| state.resolve(data));
                debug!(key = %self.key, generation, "Fetch succeeded");
            }
            Err(error) => {
                warn!(
                    key = %self.key,
                    generation,
                    error = %error,
                    "Fetch failed, keeping last known data"
                );
                self.state.send_modify(|state| state.reject(error));
            }
        }
    }

    fn spawn_refetch_timer(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        let start = Instant::now() + period;
        debug!(
            key = %self.key,
            period_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX),
            "Started refetch timer"
        );

        self.runtime.spawn(async move {
            let mut ticker = tokio::time::interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(entry) = weak.upgrade() else {
                    break;
                };
                entry.on_refetch_tick();
            }
        })
    }

    fn on_refetch_tick(self: &Arc<Self>) {
        let mut book = self.book.lock();
        if book.subscribers == 0 || book.evicted {
            return;
        }
        trace!(key = %self.key, "Refetch interval elapsed");
        self.begin_fetch(&mut book, false);
    }
}

impl<T: QueryData> ErasedEntry for QueryEntry<T> {
    fn invalidate_entry(self: Arc<Self>) {
        self.invalidate();
    }

    fn evict_entry(&self) {
        let mut book = self.book.lock();
        if book.evicted {
            return;
        }
        self.retire(&mut book);
        if let Some(timer) = book.gc_timer.take() {
            timer.abort();
        }
    }

    fn subscriber_total(&self) -> usize {
        self.subscriber_count()
    }
}

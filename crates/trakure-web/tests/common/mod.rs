//! Shared helpers for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::Once;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use trakure_core::{Error, Result};
use trakure_web::QueryKey;
use trakure_web::QueryOptions;
use trakure_web::query::Query;

static INIT_LOGGER: Once = Once::new();

/// Initialize test logging once per binary
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("trakure_web=debug")
            .with_test_writer()
            .try_init();
    });
}

type Responder = dyn Fn(usize) -> (Duration, Result<u32>) + Send + Sync;

/// A query whose answers are scripted per call
///
/// The responder gets the zero-based call index and returns how long the
/// fetch takes and what it yields. Clones share the call counter.
#[derive(Clone)]
pub struct ScriptedQuery {
    key: QueryKey,
    options: Option<QueryOptions>,
    calls: Arc<AtomicUsize>,
    respond: Arc<Responder>,
}

impl ScriptedQuery {
    pub fn new(
        key: &'static str,
        respond: impl Fn(usize) -> (Duration, Result<u32>) + Send + Sync + 'static,
    ) -> Self {
        Self {
            key: QueryKey::new(key),
            options: None,
            calls: Arc::new(AtomicUsize::new(0)),
            respond: Arc::new(respond),
        }
    }

    /// Answers instantly with the call number, starting at 1
    pub fn counting(key: &'static str) -> Self {
        Self::new(key, |call| (Duration::ZERO, Ok(call_number(call))))
    }

    /// Replace the client defaults for this query
    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Query for ScriptedQuery {
    type Data = u32;

    fn key(&self) -> QueryKey {
        self.key.clone()
    }

    fn options(&self, defaults: QueryOptions) -> QueryOptions {
        self.options.unwrap_or(defaults)
    }

    async fn fetch(&self) -> Result<u32> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let (delay, outcome) = (self.respond)(call);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        outcome
    }
}

/// One-based call number as a payload
pub fn call_number(call: usize) -> u32 {
    u32::try_from(call + 1).unwrap_or(u32::MAX)
}

pub fn server_error() -> Error {
    Error::RequestFailed {
        endpoint: "/api/test".to_string(),
        status: 500,
    }
}

pub fn network_error() -> Error {
    Error::Network {
        endpoint: "/api/test".to_string(),
        message: "connection refused".to_string(),
    }
}

/// Let every runnable task make progress without moving the clock far
pub async fn run_pending() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

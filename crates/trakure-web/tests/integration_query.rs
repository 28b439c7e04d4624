//! Timing behavior of the query cache, run on a paused clock

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

mod common;

use common::*;
use pretty_assertions::assert_eq;
use std::time::Duration;
use tokio::time::sleep;
use trakure_core::Error;
use trakure_web::query::Query;
use trakure_web::{QueryClient, QueryOptions, QueryStatus};

fn options() -> QueryOptions {
    QueryOptions::default()
        .with_stale_time(Duration::from_secs(30))
        .with_gc_time(Duration::from_secs(300))
        .with_retry(0)
}

fn client() -> QueryClient {
    init_test_logging();
    QueryClient::new(options()).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_fresh_window_makes_no_network_calls() {
    let client = client();
    let query = ScriptedQuery::counting("stats");

    let mut first = client.subscribe(query.clone()).unwrap();
    assert_eq!(first.settled().await.data, Some(1));

    let second = client.subscribe(query.clone()).unwrap();
    let state = second.state();
    assert_eq!(state.data, Some(1));
    assert!(!state.is_fetching);

    sleep(Duration::from_secs(29)).await;
    let mut third = client.subscribe(query.clone()).unwrap();
    assert_eq!(third.settled().await.data, Some(1));
    assert_eq!(query.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_subscribers_share_one_fetch() {
    let client = client();
    let query = ScriptedQuery::new("bottlenecks", |call| {
        (Duration::from_millis(200), Ok(call_number(call)))
    });

    let mut a = client.subscribe(query.clone()).unwrap();
    let mut b = client.subscribe(query.clone()).unwrap();
    assert!(a.state().is_loading());

    let (a_state, b_state) = tokio::join!(a.settled(), b.settled());
    assert_eq!(a_state.data, Some(1));
    assert_eq!(b_state.data, Some(1));
    assert_eq!(query.calls(), 1);
    assert_eq!(client.subscriber_count(&query.key()), 2);
}

#[tokio::test(start_paused = true)]
async fn test_stale_data_is_served_while_refetching() {
    let client = client();
    let query = ScriptedQuery::new("movement", |call| {
        (Duration::from_millis(100), Ok(call_number(call)))
    })
    .with_options(options().with_stale_time(Duration::from_secs(1)));

    let mut first = client.subscribe(query.clone()).unwrap();
    assert_eq!(first.settled().await.data, Some(1));

    sleep(Duration::from_secs(2)).await;
    let mut second = client.subscribe(query.clone()).unwrap();
    let state = second.state();
    assert_eq!(state.data, Some(1));
    assert_eq!(state.status, QueryStatus::Success);
    assert!(state.is_fetching);

    assert_eq!(second.settled().await.data, Some(2));
    assert_eq!(query.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failed_refetch_keeps_last_good_data() {
    let client = client();
    let query = ScriptedQuery::new("stats", |call| {
        if call == 0 {
            (Duration::ZERO, Ok(7))
        } else {
            (Duration::ZERO, Err(server_error()))
        }
    });

    let mut subscription = client.subscribe(query.clone()).unwrap();
    assert_eq!(subscription.settled().await.data, Some(7));

    subscription.refetch();
    let state = subscription.settled().await;
    assert_eq!(state.status, QueryStatus::Error);
    assert_eq!(state.data, Some(7));
    assert_eq!(state.error.and_then(|e| e.status()), Some(500));
    assert_eq!(client.get_query_data::<u32>(&query.key()), Some(7));
}

#[tokio::test(start_paused = true)]
async fn test_refetch_timer_runs_only_while_subscribed() {
    let client = client();
    let query = ScriptedQuery::counting("stats")
        .with_options(options().with_refetch_interval(Duration::from_secs(10)));

    let mut subscription = client.subscribe(query.clone()).unwrap();
    subscription.settled().await;
    assert_eq!(query.calls(), 1);

    sleep(Duration::from_millis(10_001)).await;
    run_pending().await;
    assert_eq!(query.calls(), 2);

    sleep(Duration::from_secs(10)).await;
    run_pending().await;
    assert_eq!(query.calls(), 3);
    assert_eq!(subscription.data(), Some(3));

    subscription.unsubscribe();
    sleep(Duration::from_secs(45)).await;
    run_pending().await;
    assert_eq!(query.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_superseded_response_is_discarded() {
    let client = client();
    // The first request is slow, the second fast: the first answer arrives last.
    let query = ScriptedQuery::new("movement", |call| match call {
        0 => (Duration::from_secs(5), Ok(100)),
        _ => (Duration::from_secs(1), Ok(200)),
    });

    let mut subscription = client.subscribe(query.clone()).unwrap();
    run_pending().await;
    subscription.refetch();

    assert_eq!(subscription.settled().await.data, Some(200));

    sleep(Duration::from_secs(10)).await;
    run_pending().await;
    assert_eq!(query.calls(), 2);
    assert_eq!(subscription.data(), Some(200));
    assert!(!subscription.state().is_fetching);
}

#[tokio::test(start_paused = true)]
async fn test_unused_entry_is_evicted_after_gc_time() {
    let client = client();
    let query = ScriptedQuery::counting("stats")
        .with_options(options().with_gc_time(Duration::from_secs(5)));

    assert_eq!(client.fetch_query(query.clone()).await.ok(), Some(1));
    assert_eq!(client.len(), 1);

    sleep(Duration::from_secs(6)).await;
    run_pending().await;
    assert!(client.is_empty());

    // Behaves like a first fetch again.
    assert_eq!(client.fetch_query(query.clone()).await.ok(), Some(2));
    assert_eq!(query.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_resubscribing_cancels_eviction() {
    let client = client();
    let query = ScriptedQuery::counting("stats")
        .with_options(options().with_gc_time(Duration::from_secs(5)));

    let mut first = client.subscribe(query.clone()).unwrap();
    first.settled().await;
    drop(first);

    sleep(Duration::from_secs(3)).await;
    let second = client.subscribe(query.clone()).unwrap();

    sleep(Duration::from_secs(10)).await;
    run_pending().await;
    assert_eq!(client.len(), 1);
    assert_eq!(second.data(), Some(1));
    assert_eq!(query.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_retry_up_to_the_bound() {
    let client = client();
    let query = ScriptedQuery::new("stats", |_| (Duration::ZERO, Err(network_error())))
        .with_options(
            options()
                .with_retry(2)
                .with_retry_delay(Duration::from_secs(1)),
        );

    let mut subscription = client.subscribe(query.clone()).unwrap();
    let state = subscription.settled().await;

    assert_eq!(query.calls(), 3);
    assert_eq!(state.status, QueryStatus::Error);
    assert_eq!(state.failure_count, 1);
    assert!(state.data.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_permanent_failures_are_not_retried() {
    let client = client();
    let query = ScriptedQuery::new("stats", |_| {
        (
            Duration::ZERO,
            Err(Error::ParseFailed {
                endpoint: "/api/test".to_string(),
                message: "expected value".to_string(),
            }),
        )
    })
    .with_options(options().with_retry(3));

    let error = client.fetch_query(query.clone()).await.unwrap_err();

    assert!(matches!(*error, Error::ParseFailed { .. }));
    assert_eq!(query.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_invalidate_refetches_active_key() {
    let client = client();
    let query = ScriptedQuery::counting("stats");

    let mut subscription = client.subscribe(query.clone()).unwrap();
    subscription.settled().await;

    assert!(client.invalidate(&query.key()));
    assert_eq!(subscription.settled().await.data, Some(2));
    assert_eq!(query.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_invalidated_idle_key_refetches_on_next_subscribe() {
    let client = client();
    let query = ScriptedQuery::counting("stats");

    assert_eq!(client.fetch_query(query.clone()).await.ok(), Some(1));
    assert!(client.invalidate(&query.key()));
    run_pending().await;
    assert_eq!(query.calls(), 1);

    assert_eq!(client.fetch_query(query.clone()).await.ok(), Some(2));
}

#[tokio::test(start_paused = true)]
async fn test_removed_key_starts_over() {
    let client = client();
    let query = ScriptedQuery::counting("stats");

    let mut old = client.subscribe(query.clone()).unwrap();
    old.settled().await;
    assert!(client.remove(&query.key()));
    assert!(client.is_empty());

    let mut fresh = client.subscribe(query.clone()).unwrap();
    assert_eq!(fresh.settled().await.data, Some(2));
    drop(old);
    assert_eq!(client.subscriber_count(&query.key()), 1);
}

#[tokio::test(start_paused = true)]
async fn test_removing_key_mid_fetch_settles_waiters() {
    let client = client();
    let query = ScriptedQuery::new("stats", |call| {
        (Duration::from_secs(1), Ok(call_number(call)))
    });

    let mut subscription = client.subscribe(query.clone()).unwrap();
    assert!(subscription.state().is_fetching);
    assert!(client.remove(&query.key()));

    let state = tokio::time::timeout(Duration::from_secs(60), subscription.settled())
        .await
        .unwrap();
    assert_eq!(state.status, QueryStatus::Error);
    assert!(!state.is_fetching);
    assert!(state.data.is_none());

    // The cancelled response never lands.
    sleep(Duration::from_secs(2)).await;
    assert!(subscription.data().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_clear_mid_fetch_fails_pending_fetch_query() {
    let client = client();
    let query = ScriptedQuery::new("stats", |call| {
        (Duration::from_secs(1), Ok(call_number(call)))
    });

    let pending = tokio::spawn({
        let client = client.clone();
        let query = query.clone();
        async move { client.fetch_query(query).await }
    });
    run_pending().await;
    assert_eq!(client.len(), 1);
    client.clear();

    let outcome = tokio::time::timeout(Duration::from_secs(60), pending)
        .await
        .unwrap()
        .unwrap();
    let error = outcome.unwrap_err();
    assert!(matches!(*error, Error::Other(ref message) if message.contains("removed")));
}

//! Pages composed from components

pub mod dashboard;
pub mod not_found;
pub mod workflow;

use crate::query::{QueryData, QueryState, Subscription};
use std::time::Duration;

/// Wait up to `timeout` for something to render, then take whatever is there
///
/// A first load that is still running after `timeout` renders as a loading
/// skeleton instead of holding the request open.
pub async fn ready_state<T: QueryData>(
    subscription: &mut Subscription<T>,
    timeout: Duration,
) -> QueryState<T> {
    match subscription.ready_within(timeout).await {
        Some(state) => state,
        None => subscription.state(),
    }
}

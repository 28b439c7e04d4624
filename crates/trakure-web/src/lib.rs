//! Trakure dashboard front-end
//!
//! Server-rendered dashboard for the Trakure workflow tracker. Every read
//! goes through a shared query cache that deduplicates requests, serves
//! stale data while revalidating, and refreshes mounted queries on a timer.

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

pub mod api_client;
pub mod components;
pub mod handlers;
pub mod hooks;
pub mod pages;
pub mod query;
pub mod routes;
pub mod server;
pub mod state;

// Re-export the main entry points
pub use api_client::ApiClient;
pub use hooks::DashboardHooks;
pub use query::{QueryClient, QueryKey, QueryOptions, QueryState, QueryStatus, Subscription};
pub use server::build_app;
pub use state::AppState;

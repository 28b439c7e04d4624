//! Application state management

use crate::api_client::ApiClient;
use crate::components::Renderer;
use crate::hooks::DashboardHooks;
use crate::query::{QueryClient, Subscription};
use std::time::Duration;
use tracing::info;
use trakure_core::{BottleneckItem, Config, DashboardStats, MovementStatsData, Result};

/// Subscriptions for the default dashboard view
///
/// Holding them keeps the default keys cached and their refetch timers
/// running, so a page request usually finds fresh data waiting.
#[derive(Debug)]
pub struct MountedDashboard {
    /// Headline counters
    pub stats: Subscription<DashboardStats>,
    /// Bottleneck list at the default limit
    pub bottlenecks: Subscription<Vec<BottleneckItem>>,
    /// Movement series at the default window
    pub movement: Subscription<Vec<MovementStatsData>>,
}

impl MountedDashboard {
    fn mount(hooks: &DashboardHooks) -> Result<Self> {
        Ok(Self {
            stats: hooks.use_dashboard_stats()?,
            bottlenecks: hooks.use_bottleneck_items(None)?,
            movement: hooks.use_movement_stats(None)?,
        })
    }
}

/// Application state shared by every handler
#[derive(Debug)]
pub struct AppState {
    /// Application configuration
    pub config: Config,
    /// Cached reads
    pub hooks: DashboardHooks,
    /// Page and component templates
    pub renderer: Renderer,
    mounted: MountedDashboard,
}

impl AppState {
    /// Create the state and mount the default dashboard queries
    ///
    /// Must run inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no runtime or a template does not compile.
    pub fn new(config: Config) -> Result<Self> {
        let api = ApiClient::from_config(&config.api);
        let client = QueryClient::from_config(&config.query)?;
        let hooks = DashboardHooks::new(api, client, config.dashboard.clone());
        let renderer = Renderer::new()?;
        let mounted = MountedDashboard::mount(&hooks)?;

        info!(
            api = %config.api.base_url,
            cached_queries = hooks.client().len(),
            "Dashboard queries mounted"
        );

        Ok(Self {
            config,
            hooks,
            renderer,
            mounted,
        })
    }

    /// The shared query cache
    #[must_use]
    pub const fn query_client(&self) -> &QueryClient {
        self.hooks.client()
    }

    /// The always-on dashboard subscriptions
    #[must_use]
    pub const fn mounted(&self) -> &MountedDashboard {
        &self.mounted
    }

    /// How long a request waits for a first load
    #[must_use]
    pub const fn render_timeout(&self) -> Duration {
        self.config.webserver.render_timeout()
    }
}

//! Configuration management for the Trakure dashboard

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Upstream Trakure API configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// Query cache defaults
    #[serde(default)]
    pub query: QueryConfig,

    /// Dashboard refresh policy
    #[serde(default)]
    pub dashboard: DashboardConfig,

    /// Web server configuration
    #[serde(default)]
    pub webserver: WebServerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Upstream API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the Trakure API (scheme, host and port)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Optional API key sent as `X-API-Key`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// Query cache defaults applied to every query unless it overrides them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// How long fetched data is considered fresh, in milliseconds
    #[serde(default = "default_stale_time_ms")]
    pub stale_time_ms: u64,

    /// How long an unsubscribed entry stays cached, in milliseconds
    #[serde(default = "default_gc_time_ms")]
    pub gc_time_ms: u64,

    /// Retries after a transient fetch failure
    #[serde(default = "default_retry")]
    pub retry: u32,

    /// Delay before the first retry, in milliseconds (doubles per attempt)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Upper bound for the retry delay, in milliseconds
    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,
}

/// Dashboard refresh policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Refetch interval for the headline stats, in milliseconds
    #[serde(default = "default_stats_refetch_ms")]
    pub stats_refetch_ms: u64,

    /// Refetch interval for bottleneck items, in milliseconds
    #[serde(default = "default_bottleneck_refetch_ms")]
    pub bottleneck_refetch_ms: u64,

    /// Refetch interval for movement stats, in milliseconds
    #[serde(default = "default_movement_refetch_ms")]
    pub movement_refetch_ms: u64,

    /// Number of bottleneck items requested when the caller gives none
    #[serde(default = "default_bottleneck_limit")]
    pub default_bottleneck_limit: u32,

    /// Movement window in days when the caller gives none
    #[serde(default = "default_movement_days")]
    pub default_movement_days: u32,
}

/// Web server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// How long a page waits for a first load before rendering a skeleton
    #[serde(default = "default_render_timeout_ms")]
    pub render_timeout_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json or text)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_base_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

const fn default_request_timeout_ms() -> u64 {
    30_000
}

const fn default_stale_time_ms() -> u64 {
    30_000
}

const fn default_gc_time_ms() -> u64 {
    300_000 // 5 minutes
}

const fn default_retry() -> u32 {
    3
}

const fn default_retry_delay_ms() -> u64 {
    1_000
}

const fn default_max_retry_delay_ms() -> u64 {
    30_000
}

const fn default_stats_refetch_ms() -> u64 {
    30_000
}

const fn default_bottleneck_refetch_ms() -> u64 {
    60_000
}

const fn default_movement_refetch_ms() -> u64 {
    300_000
}

const fn default_bottleneck_limit() -> u32 {
    10
}

const fn default_movement_days() -> u32 {
    90
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    8080
}

const fn default_render_timeout_ms() -> u64 {
    5_000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_ms: default_request_timeout_ms(),
            api_key: None,
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            stale_time_ms: default_stale_time_ms(),
            gc_time_ms: default_gc_time_ms(),
            retry: default_retry(),
            retry_delay_ms: default_retry_delay_ms(),
            max_retry_delay_ms: default_max_retry_delay_ms(),
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            stats_refetch_ms: default_stats_refetch_ms(),
            bottleneck_refetch_ms: default_bottleneck_refetch_ms(),
            movement_refetch_ms: default_movement_refetch_ms(),
            default_bottleneck_limit: default_bottleneck_limit(),
            default_movement_days: default_movement_days(),
        }
    }
}

impl Default for WebServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            render_timeout_ms: default_render_timeout_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl ApiConfig {
    /// Request timeout as a [`Duration`]
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl WebServerConfig {
    /// Render timeout as a [`Duration`]
    #[must_use]
    pub const fn render_timeout(&self) -> Duration {
        Duration::from_millis(self.render_timeout_ms)
    }
}

impl Config {
    /// Load configuration from an optional `trakure` file and the environment.
    ///
    /// Environment variables use the `TRAKURE` prefix and a double underscore
    /// between section and key, e.g. `TRAKURE__API__BASE_URL`.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded, parsed or validated.
    pub fn load() -> crate::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("trakure").required(false))
            .add_source(
                config::Environment::with_prefix("TRAKURE")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .map_err(|e| crate::Error::Configuration {
                message: e.to_string(),
            })?;

        let config: Self = config
            .try_deserialize()
            .map_err(|e| crate::Error::Configuration {
                message: e.to_string(),
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Check values that serde accepts but the dashboard cannot run with
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Validation`] naming the first offending field.
    pub fn validate(&self) -> crate::Result<()> {
        let invalid = |field: &str, message: &str| crate::Error::Validation {
            field: field.to_string(),
            message: message.to_string(),
        };

        if self.api.base_url.trim().is_empty() {
            return Err(invalid("api.base_url", "must not be empty"));
        }
        if self.api.request_timeout_ms == 0 {
            return Err(invalid("api.request_timeout_ms", "must be greater than zero"));
        }
        if self.webserver.port == 0 {
            return Err(invalid("webserver.port", "must be greater than zero"));
        }
        if self.dashboard.default_bottleneck_limit == 0 {
            return Err(invalid(
                "dashboard.default_bottleneck_limit",
                "must be greater than zero",
            ));
        }
        if !(1..=366).contains(&self.dashboard.default_movement_days) {
            return Err(invalid(
                "dashboard.default_movement_days",
                "must be between 1 and 366",
            ));
        }
        if self.query.retry_delay_ms > self.query.max_retry_delay_ms {
            return Err(invalid(
                "query.retry_delay_ms",
                "must not exceed query.max_retry_delay_ms",
            ));
        }
        Ok(())
    }
}

//! Cached reads behind every dashboard widget
//!
//! Each query pairs one [`ApiClient`] fetcher with its cache key and refresh
//! policy. [`DashboardHooks`] hands out subscriptions the way a component
//! would mount them.

use crate::api_client::ApiClient;
use crate::query::{Query, QueryClient, QueryKey, QueryOptions, Subscription};
use async_trait::async_trait;
use std::time::Duration;
use trakure_core::config::DashboardConfig;
use trakure_core::{
    BottleneckItem, DashboardStats, Error, MovementStatsData, Result, WorkItem, WorkflowStage,
};

/// Cache scope of the headline counters
pub const DASHBOARD_STATS_KEY: &str = "dashboard-stats";
/// Cache scope of the bottleneck list
pub const BOTTLENECK_ITEMS_KEY: &str = "bottleneck-items";
/// Cache scope of the movement series
pub const MOVEMENT_STATS_KEY: &str = "movement-stats";
/// Cache scope of image probes
pub const IMAGE_EXISTS_KEY: &str = "image-exists";
/// Cache scope of the stage definitions
pub const WORKFLOW_STAGES_KEY: &str = "workflow-stages";
/// Cache scope of per-stage item lists
pub const STAGE_ITEMS_KEY: &str = "stage-items";

/// Longest movement window the API serves
pub const MAX_MOVEMENT_DAYS: u32 = 366;

const IMAGE_STALE_TIME: Duration = Duration::from_secs(5 * 60);

/// Headline counters, refreshed on a timer
#[derive(Debug, Clone)]
pub struct DashboardStatsQuery {
    api: ApiClient,
    refetch_interval: Duration,
}

#[async_trait]
impl Query for DashboardStatsQuery {
    type Data = DashboardStats;

    fn key(&self) -> QueryKey {
        QueryKey::new(DASHBOARD_STATS_KEY)
    }

    fn options(&self, defaults: QueryOptions) -> QueryOptions {
        defaults.with_refetch_interval(self.refetch_interval)
    }

    async fn fetch(&self) -> Result<DashboardStats> {
        self.api.get_dashboard_stats().await
    }
}

/// Items stuck longest in their stage
#[derive(Debug, Clone)]
pub struct BottleneckItemsQuery {
    api: ApiClient,
    limit: u32,
    refetch_interval: Duration,
}

impl BottleneckItemsQuery {
    /// Number of items requested
    #[must_use]
    pub const fn limit(&self) -> u32 {
        self.limit
    }
}

#[async_trait]
impl Query for BottleneckItemsQuery {
    type Data = Vec<BottleneckItem>;

    fn key(&self) -> QueryKey {
        QueryKey::new(BOTTLENECK_ITEMS_KEY).with_param("limit", self.limit)
    }

    fn options(&self, defaults: QueryOptions) -> QueryOptions {
        defaults.with_refetch_interval(self.refetch_interval)
    }

    async fn fetch(&self) -> Result<Vec<BottleneckItem>> {
        self.api.get_bottleneck_items(self.limit).await
    }
}

/// Daily forward and rework movement
#[derive(Debug, Clone)]
pub struct MovementStatsQuery {
    api: ApiClient,
    days: u32,
    refetch_interval: Duration,
}

impl MovementStatsQuery {
    /// Window length in days
    #[must_use]
    pub const fn days(&self) -> u32 {
        self.days
    }
}

#[async_trait]
impl Query for MovementStatsQuery {
    type Data = Vec<MovementStatsData>;

    fn key(&self) -> QueryKey {
        QueryKey::new(MOVEMENT_STATS_KEY).with_param("days", self.days)
    }

    fn options(&self, defaults: QueryOptions) -> QueryOptions {
        defaults.with_refetch_interval(self.refetch_interval)
    }

    async fn fetch(&self) -> Result<Vec<MovementStatsData>> {
        self.api.get_movement_stats(self.days).await
    }
}

/// Whether an image URL resolves
///
/// A missing image is an answer, not a failure: 404 yields `false`. Probes are
/// never retried.
#[derive(Debug, Clone)]
pub struct ImageExistsQuery {
    api: ApiClient,
    url: String,
}

#[async_trait]
impl Query for ImageExistsQuery {
    type Data = bool;

    fn key(&self) -> QueryKey {
        QueryKey::new(IMAGE_EXISTS_KEY).with_param("url", &self.url)
    }

    fn options(&self, defaults: QueryOptions) -> QueryOptions {
        defaults.with_retry(0).with_stale_time(IMAGE_STALE_TIME)
    }

    async fn fetch(&self) -> Result<bool> {
        match self.api.probe_image(&self.url).await {
            Ok(()) => Ok(true),
            Err(Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Stage definitions in display order
#[derive(Debug, Clone)]
pub struct WorkflowStagesQuery {
    api: ApiClient,
}

#[async_trait]
impl Query for WorkflowStagesQuery {
    type Data = Vec<WorkflowStage>;

    fn key(&self) -> QueryKey {
        QueryKey::new(WORKFLOW_STAGES_KEY)
    }

    async fn fetch(&self) -> Result<Vec<WorkflowStage>> {
        self.api.get_workflow_stages().await
    }
}

/// Items waiting in one stage
#[derive(Debug, Clone)]
pub struct StageItemsQuery {
    api: ApiClient,
    stage_id: String,
    refetch_interval: Duration,
}

#[async_trait]
impl Query for StageItemsQuery {
    type Data = Vec<WorkItem>;

    fn key(&self) -> QueryKey {
        QueryKey::new(STAGE_ITEMS_KEY).with_param("stage", &self.stage_id)
    }

    fn options(&self, defaults: QueryOptions) -> QueryOptions {
        defaults.with_refetch_interval(self.refetch_interval)
    }

    async fn fetch(&self) -> Result<Vec<WorkItem>> {
        self.api.get_stage_items(&self.stage_id).await
    }
}

/// Query factory and subscription entry point for the dashboard
#[derive(Debug, Clone)]
pub struct DashboardHooks {
    api: ApiClient,
    client: QueryClient,
    refresh: DashboardConfig,
}

impl DashboardHooks {
    /// Bind the hooks to an API client, a cache and a refresh policy
    #[must_use]
    pub const fn new(api: ApiClient, client: QueryClient, refresh: DashboardConfig) -> Self {
        Self {
            api,
            client,
            refresh,
        }
    }

    /// The cache the hooks subscribe through
    #[must_use]
    pub const fn client(&self) -> &QueryClient {
        &self.client
    }

    /// Refresh policy in use
    #[must_use]
    pub const fn refresh(&self) -> &DashboardConfig {
        &self.refresh
    }

    /// Bottleneck limit after applying the default; zero means "use the default"
    #[must_use]
    pub fn bottleneck_limit(&self, limit: Option<u32>) -> u32 {
        limit
            .filter(|limit| *limit > 0)
            .unwrap_or(self.refresh.default_bottleneck_limit)
    }

    /// Movement window after applying the default, clamped to what the API serves
    #[must_use]
    pub fn movement_days(&self, days: Option<u32>) -> u32 {
        days.unwrap_or(self.refresh.default_movement_days)
            .clamp(1, MAX_MOVEMENT_DAYS)
    }

    /// Headline counters query
    #[must_use]
    pub fn dashboard_stats_query(&self) -> DashboardStatsQuery {
        DashboardStatsQuery {
            api: self.api.clone(),
            refetch_interval: Duration::from_millis(self.refresh.stats_refetch_ms),
        }
    }

    /// Bottleneck list query
    #[must_use]
    pub fn bottleneck_items_query(&self, limit: Option<u32>) -> BottleneckItemsQuery {
        BottleneckItemsQuery {
            api: self.api.clone(),
            limit: self.bottleneck_limit(limit),
            refetch_interval: Duration::from_millis(self.refresh.bottleneck_refetch_ms),
        }
    }

    /// Movement series query
    #[must_use]
    pub fn movement_stats_query(&self, days: Option<u32>) -> MovementStatsQuery {
        MovementStatsQuery {
            api: self.api.clone(),
            days: self.movement_days(days),
            refetch_interval: Duration::from_millis(self.refresh.movement_refetch_ms),
        }
    }

    /// Image probe query
    #[must_use]
    pub fn image_exists_query(&self, url: impl Into<String>) -> ImageExistsQuery {
        ImageExistsQuery {
            api: self.api.clone(),
            url: url.into(),
        }
    }

    /// Stage definitions query
    #[must_use]
    pub fn workflow_stages_query(&self) -> WorkflowStagesQuery {
        WorkflowStagesQuery {
            api: self.api.clone(),
        }
    }

    /// Items of one stage, refreshed like the bottleneck list
    #[must_use]
    pub fn stage_items_query(&self, stage_id: impl Into<String>) -> StageItemsQuery {
        StageItemsQuery {
            api: self.api.clone(),
            stage_id: stage_id.into(),
            refetch_interval: Duration::from_millis(self.refresh.bottleneck_refetch_ms),
        }
    }

    /// Subscribe to the headline counters
    ///
    /// # Errors
    ///
    /// Returns an error if the key is cached with another data type.
    pub fn use_dashboard_stats(&self) -> Result<Subscription<DashboardStats>> {
        self.client.subscribe(self.dashboard_stats_query())
    }

    /// Subscribe to the bottleneck list
    ///
    /// # Errors
    ///
    /// Returns an error if the key is cached with another data type.
    pub fn use_bottleneck_items(
        &self,
        limit: Option<u32>,
    ) -> Result<Subscription<Vec<BottleneckItem>>> {
        self.client.subscribe(self.bottleneck_items_query(limit))
    }

    /// Subscribe to the movement series
    ///
    /// # Errors
    ///
    /// Returns an error if the key is cached with another data type.
    pub fn use_movement_stats(
        &self,
        days: Option<u32>,
    ) -> Result<Subscription<Vec<MovementStatsData>>> {
        self.client.subscribe(self.movement_stats_query(days))
    }

    /// Subscribe to an image probe
    ///
    /// # Errors
    ///
    /// Returns an error if the key is cached with another data type.
    pub fn use_image_exists(&self, url: impl Into<String>) -> Result<Subscription<bool>> {
        self.client.subscribe(self.image_exists_query(url))
    }

    /// Subscribe to the stage definitions
    ///
    /// # Errors
    ///
    /// Returns an error if the key is cached with another data type.
    pub fn use_workflow_stages(&self) -> Result<Subscription<Vec<WorkflowStage>>> {
        self.client.subscribe(self.workflow_stages_query())
    }

    /// Subscribe to the items of one stage
    ///
    /// # Errors
    ///
    /// Returns an error if the key is cached with another data type.
    pub fn use_stage_items(
        &self,
        stage_id: impl Into<String>,
    ) -> Result<Subscription<Vec<WorkItem>>> {
        self.client.subscribe(self.stage_items_query(stage_id))
    }

    /// Whether `url` is the image of some cached bottleneck item
    ///
    /// Only these URLs may be probed; anything else would let callers point
    /// the server at arbitrary hosts.
    #[must_use]
    pub fn is_known_image(&self, url: &str) -> bool {
        self.client
            .keys()
            .iter()
            .filter(|key| key.scope() == BOTTLENECK_ITEMS_KEY)
            .filter_map(|key| self.client.get_query_data::<Vec<BottleneckItem>>(key))
            .flatten()
            .any(|item| item.image_url.as_deref() == Some(url))
    }

    /// Mark every dashboard widget stale, returning how many keys were hit
    ///
    /// Mounted widgets refetch at once; the rest refetch on next use.
    pub fn refresh_dashboard(&self) -> usize {
        let stats = usize::from(self.client.invalidate(&QueryKey::new(DASHBOARD_STATS_KEY)));
        stats
            + self.client.invalidate_scope(BOTTLENECK_ITEMS_KEY)
            + self.client.invalidate_scope(MOVEMENT_STATS_KEY)
    }
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::query::QueryStatus;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn hooks(server_uri: &str) -> DashboardHooks {
        let client = QueryClient::new(QueryOptions::default().with_retry(0)).unwrap();
        DashboardHooks::new(ApiClient::new(server_uri), client, DashboardConfig::default())
    }

    #[rstest]
    #[case(None, 10)]
    #[case(Some(0), 10)]
    #[case(Some(5), 5)]
    #[tokio::test]
    async fn test_bottleneck_limit_defaults(#[case] limit: Option<u32>, #[case] expected: u32) {
        let hooks = hooks("http://127.0.0.1:9");
        let query = hooks.bottleneck_items_query(limit);

        assert_eq!(query.limit(), expected);
        assert_eq!(
            query.key().to_string(),
            format!("bottleneck-items?limit={expected}")
        );
    }

    #[rstest]
    #[case(None, 90)]
    #[case(Some(30), 30)]
    #[case(Some(0), 1)]
    #[case(Some(5000), 366)]
    #[tokio::test]
    async fn test_movement_days_clamped(#[case] days: Option<u32>, #[case] expected: u32) {
        let hooks = hooks("http://127.0.0.1:9");
        assert_eq!(hooks.movement_stats_query(days).days(), expected);
    }

    #[tokio::test]
    async fn test_refresh_intervals_come_from_config() {
        let hooks = hooks("http://127.0.0.1:9");
        let defaults = QueryOptions::default();

        assert_eq!(
            hooks.dashboard_stats_query().options(defaults).refetch_interval,
            Some(Duration::from_secs(30))
        );
        assert_eq!(
            hooks.bottleneck_items_query(None).options(defaults).refetch_interval,
            Some(Duration::from_secs(60))
        );
        assert_eq!(
            hooks.movement_stats_query(None).options(defaults).refetch_interval,
            Some(Duration::from_secs(300))
        );

        let image = hooks.image_exists_query("http://img/x.png").options(defaults);
        assert_eq!(image.retry, 0);
        assert!(image.refetch_interval.is_none());
    }

    #[tokio::test]
    async fn test_use_dashboard_stats_loads() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/dashboard/stats"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "activeItems": 3,
                "activeOrders": 2,
                "itemsInRework": 1,
                "itemsWaitingOver7Days": 0
            })))
            .expect(1)
            .mount(&server)
            .await;

        let hooks = hooks(&server.uri());
        let mut stats = hooks.use_dashboard_stats().unwrap();
        let state = stats.settled().await;

        assert_eq!(state.status, QueryStatus::Success);
        assert_eq!(state.data.map(|s| s.active_items), Some(3));
    }

    #[tokio::test]
    async fn test_missing_image_is_false_not_error() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/missing.png"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let hooks = hooks(&server.uri());
        let url = format!("{}/missing.png", server.uri());
        let exists = hooks.client().fetch_query(hooks.image_exists_query(url)).await;

        assert_eq!(exists.ok(), Some(false));
    }

    #[tokio::test]
    async fn test_image_probe_failure_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/broken.png"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let client = QueryClient::new(QueryOptions::default().with_retry(3)).unwrap();
        let hooks = DashboardHooks::new(
            ApiClient::new(server.uri()),
            client,
            DashboardConfig::default(),
        );
        let mut probe = hooks
            .use_image_exists(format!("{}/broken.png", server.uri()))
            .unwrap();
        let state = probe.settled().await;

        assert_eq!(state.status, QueryStatus::Error);
        assert!(state.data.is_none());
    }

    #[tokio::test]
    async fn test_stage_items_keyed_per_stage() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/workflow/stages/cut/items"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": "i1", "name": "Panel", "stageId": "cut" }
            ])))
            .mount(&server)
            .await;

        let hooks = hooks(&server.uri());
        let items = hooks
            .client()
            .fetch_query(hooks.stage_items_query("cut"))
            .await
            .unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(
            hooks.stage_items_query("cut").key().to_string(),
            "stage-items?stage=cut"
        );
        assert_eq!(hooks.client().len(), 1);
    }

    #[tokio::test]
    async fn test_only_listed_images_are_known() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/dashboard/bottleneck-items"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": "b1", "itemName": "Door", "imageUrl": "https://img.example/door.png" },
                { "id": "b2", "itemName": "Panel" }
            ])))
            .mount(&server)
            .await;

        let hooks = hooks(&server.uri());
        assert!(!hooks.is_known_image("https://img.example/door.png"));

        let mut bottlenecks = hooks.use_bottleneck_items(Some(5)).unwrap();
        bottlenecks.settled().await;

        assert!(hooks.is_known_image("https://img.example/door.png"));
        assert!(!hooks.is_known_image("http://169.254.169.254/latest/meta-data"));
        assert!(!hooks.is_known_image(""));
    }

    #[tokio::test]
    async fn test_refresh_dashboard_refetches_mounted_widgets() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/dashboard/stats"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "activeItems": 3,
                "activeOrders": 2,
                "itemsInRework": 1,
                "itemsWaitingOver7Days": 0
            })))
            .expect(2)
            .mount(&server)
            .await;

        let hooks = hooks(&server.uri());
        assert_eq!(hooks.refresh_dashboard(), 0);

        let mut stats = hooks.use_dashboard_stats().unwrap();
        stats.settled().await;
        assert_eq!(hooks.refresh_dashboard(), 1);

        let state = stats.changed().await;
        assert!(state.is_fetching);
        assert_eq!(stats.settled().await.status, QueryStatus::Success);
    }
}

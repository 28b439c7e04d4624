//! HTTP client for communicating with the Trakure API
//!
//! Every fetcher performs exactly one request and either returns the decoded,
//! validated payload or fails. Retries belong to the query layer.

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use trakure_core::config::ApiConfig;
use trakure_core::types::{sort_stages, validate_movement_series};
use trakure_core::{
    BottleneckItem, DashboardStats, Error, MovementStatsData, Result, WorkItem, WorkflowStage,
};
use validator::Validate;

/// Headline counters endpoint
pub const STATS_ENDPOINT: &str = "/api/dashboard/stats";
/// Bottleneck items endpoint
pub const BOTTLENECK_ENDPOINT: &str = "/api/dashboard/bottleneck-items";
/// Daily movement endpoint
pub const MOVEMENT_ENDPOINT: &str = "/api/dashboard/movement-stats";
/// Workflow stage definitions endpoint
pub const STAGES_ENDPOINT: &str = "/api/workflow/stages";

/// Bottleneck items requested when the caller does not say
pub const DEFAULT_BOTTLENECK_LIMIT: u32 = 10;
/// Movement window in days when the caller does not say
pub const DEFAULT_MOVEMENT_DAYS: u32 = 90;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// API client for making HTTP requests to the Trakure API server
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Create a client from the `[api]` configuration section
    #[must_use]
    pub fn from_config(config: &ApiConfig) -> Self {
        let client = Self::new(config.base_url.clone()).with_timeout(config.request_timeout());
        match &config.api_key {
            Some(api_key) => client.with_api_key(api_key.clone()),
            None => client,
        }
    }

    /// Set the API key for authentication
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the per-request timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Base URL requests are made against
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the headline dashboard counters
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP request fails or the response cannot be parsed.
    pub async fn get_dashboard_stats(&self) -> Result<DashboardStats> {
        let url = format!("{}{STATS_ENDPOINT}", self.base_url);
        self.get_json(STATS_ENDPOINT, &url).await
    }

    /// Get up to `limit` bottleneck items in server order
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP request fails or the response cannot be parsed.
    pub async fn get_bottleneck_items(&self, limit: u32) -> Result<Vec<BottleneckItem>> {
        let url = format!("{}{BOTTLENECK_ENDPOINT}?limit={limit}", self.base_url);
        let mut items: Vec<BottleneckItem> = self.get_json(BOTTLENECK_ENDPOINT, &url).await?;

        let max = usize::try_from(limit).unwrap_or(usize::MAX);
        if items.len() > max {
            debug!(
                endpoint = BOTTLENECK_ENDPOINT,
                received = items.len(),
                limit,
                "Server returned more bottleneck items than requested, truncating"
            );
            items.truncate(max);
        }

        Ok(items)
    }

    /// Get one movement entry per day for the last `days` days
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP request fails, the response cannot be
    /// parsed, or the series is not in chronological order.
    pub async fn get_movement_stats(&self, days: u32) -> Result<Vec<MovementStatsData>> {
        let url = format!("{}{MOVEMENT_ENDPOINT}?days={days}", self.base_url);
        let points: Vec<MovementStatsData> = self.get_json(MOVEMENT_ENDPOINT, &url).await?;

        validate_movement_series(&points).map_err(|e| Error::ParseFailed {
            endpoint: MOVEMENT_ENDPOINT.to_string(),
            message: e.to_string(),
        })?;

        Ok(points)
    }

    /// Check whether an image exists without downloading it
    ///
    /// Sends a `HEAD` request, so the body is never transferred. The API key is
    /// not attached since image URLs may point outside the Trakure API.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] on 404, [`Error::RequestFailed`] on any other
    /// non-2xx status, and a transport error if no response arrives.
    pub async fn probe_image(&self, url: &str) -> Result<()> {
        let response = self
            .client
            .head(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.transport_error(url, &e))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else if status == StatusCode::NOT_FOUND {
            Err(Error::NotFound {
                resource: url.to_string(),
            })
        } else {
            Err(Error::RequestFailed {
                endpoint: url.to_string(),
                status: status.as_u16(),
            })
        }
    }

    /// Get the workflow stage definitions in display order
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP request fails, the response cannot be
    /// parsed, or a stage's sub-stages do not belong to it.
    pub async fn get_workflow_stages(&self) -> Result<Vec<WorkflowStage>> {
        let url = format!("{}{STAGES_ENDPOINT}", self.base_url);
        let mut stages: Vec<WorkflowStage> = self.get_json(STAGES_ENDPOINT, &url).await?;

        for stage in &stages {
            stage.validate()?;
        }
        sort_stages(&mut stages);

        Ok(stages)
    }

    /// Get the items currently sitting in a stage
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP request fails or the response cannot be parsed.
    pub async fn get_stage_items(&self, stage_id: &str) -> Result<Vec<WorkItem>> {
        let endpoint = format!("{STAGES_ENDPOINT}/{}/items", urlencoding::encode(stage_id));
        let url = format!("{}{endpoint}", self.base_url);
        self.get_json(&endpoint, &url).await
    }

    fn get(&self, url: &str) -> RequestBuilder {
        let mut request = self.client.get(url).timeout(self.timeout);

        if let Some(ref api_key) = self.api_key {
            request = request.header("X-API-Key", api_key);
        }

        request
    }

    async fn send(&self, endpoint: &str, request: RequestBuilder) -> Result<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| self.transport_error(endpoint, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::RequestFailed {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str, url: &str) -> Result<T> {
        debug!(endpoint, url, "Fetching");

        let response = self.send(endpoint, self.get(url)).await?;
        let body = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(endpoint, &e))?;

        serde_json::from_slice(&body).map_err(|e| Error::ParseFailed {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })
    }

    fn transport_error(&self, endpoint: &str, error: &reqwest::Error) -> Error {
        if error.is_timeout() {
            Error::Timeout {
                duration_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            }
        } else {
            Error::Network {
                endpoint: endpoint.to_string(),
                message: error.to_string(),
            }
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::missing_panics_doc,
    clippy::unwrap_used,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, NaiveDate};
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn movement_fixture(start: NaiveDate, days: i64) -> Value {
        let points: Vec<Value> = (0..days)
            .map(|offset| {
                let date = start + ChronoDuration::days(offset);
                json!({"date": date.to_string(), "forward": offset * 2, "rework": offset % 3})
            })
            .collect();
        Value::Array(points)
    }

    fn bottleneck_fixture(count: usize) -> Value {
        let items: Vec<Value> = (0..count)
            .map(|i| {
                json!({
                    "id": format!("item-{i}"),
                    "itemName": format!("Crate {i}"),
                    "stageName": "Packing",
                    "daysInStage": 20 - i,
                })
            })
            .collect();
        Value::Array(items)
    }

    #[tokio::test]
    async fn test_get_dashboard_stats() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(STATS_ENDPOINT))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "activeItems": 42,
                "activeOrders": 7,
                "itemsInRework": 2,
                "itemsWaitingOver7Days": 4
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ApiClient::new(server.uri());
        let stats = client.get_dashboard_stats().await.unwrap();

        assert_eq!(stats.active_items, 42);
        assert_eq!(stats.items_waiting_over_7_days, 4);
    }

    #[tokio::test]
    async fn test_bottleneck_items_requests_limit_and_preserves_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(BOTTLENECK_ENDPOINT))
            .and(query_param("limit", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(bottleneck_fixture(5)))
            .expect(1)
            .mount(&server)
            .await;

        let client = ApiClient::new(server.uri());
        let items = client.get_bottleneck_items(5).await.unwrap();

        let ids: Vec<&str> = items.iter().map(|item| item.id.as_str()).collect();
        assert_eq!(ids, vec!["item-0", "item-1", "item-2", "item-3", "item-4"]);
    }

    #[tokio::test]
    async fn test_bottleneck_items_truncates_oversized_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(BOTTLENECK_ENDPOINT))
            .and(query_param("limit", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(bottleneck_fixture(8)))
            .mount(&server)
            .await;

        let client = ApiClient::new(server.uri());
        let items = client.get_bottleneck_items(5).await.unwrap();

        assert_eq!(items.len(), 5);
        assert_eq!(items[0].id, "item-0");
        assert_eq!(items[4].id, "item-4");
    }

    #[tokio::test]
    async fn test_movement_stats_thirty_day_window() {
        let server = MockServer::start().await;
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        Mock::given(method("GET"))
            .and(path(MOVEMENT_ENDPOINT))
            .and(query_param("days", "30"))
            .respond_with(ResponseTemplate::new(200).set_body_json(movement_fixture(start, 30)))
            .expect(1)
            .mount(&server)
            .await;

        let client = ApiClient::new(server.uri());
        let points = client.get_movement_stats(30).await.unwrap();

        assert_eq!(points.len(), 30);
        assert_eq!(points[0].date, start);
        assert_eq!(points[29].date, NaiveDate::from_ymd_opt(2024, 3, 30).unwrap());
        assert_eq!(points[29].forward, 58);
    }

    #[tokio::test]
    async fn test_movement_stats_rejects_unordered_series() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(MOVEMENT_ENDPOINT))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"date": "2024-03-02", "forward": 1, "rework": 0},
                {"date": "2024-03-01", "forward": 1, "rework": 0}
            ])))
            .mount(&server)
            .await;

        let client = ApiClient::new(server.uri());
        let error = client.get_movement_stats(2).await.unwrap_err();

        assert!(matches!(error, Error::ParseFailed { ref endpoint, .. } if endpoint == MOVEMENT_ENDPOINT));
    }

    #[tokio::test]
    async fn test_non_success_status_is_request_failed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(STATS_ENDPOINT))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = ApiClient::new(server.uri());
        let error = client.get_dashboard_stats().await.unwrap_err();

        match error {
            Error::RequestFailed { endpoint, status } => {
                assert_eq!(endpoint, STATS_ENDPOINT);
                assert_eq!(status, 503);
            }
            other => panic!("Expected RequestFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_parse_failed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(STATS_ENDPOINT))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let client = ApiClient::new(server.uri());
        let error = client.get_dashboard_stats().await.unwrap_err();

        assert!(matches!(error, Error::ParseFailed { .. }));
        assert!(!error.is_retryable());
    }

    #[tokio::test]
    async fn test_api_key_header_is_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(STATS_ENDPOINT))
            .and(header("X-API-Key", "k-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "activeItems": 1,
                "activeOrders": 1,
                "itemsInRework": 0,
                "itemsWaitingOver7Days": 0
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ApiClient::new(format!("{}/", server.uri())).with_api_key("k-123");
        assert!(client.get_dashboard_stats().await.is_ok());
    }

    #[tokio::test]
    async fn test_probe_image_uses_head() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/images/present.png"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = ApiClient::new(server.uri());
        let url = format!("{}/images/present.png", server.uri());

        assert!(client.probe_image(&url).await.is_ok());
    }

    #[tokio::test]
    async fn test_probe_image_missing_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = ApiClient::new(server.uri());
        let url = format!("{}/images/missing.png", server.uri());
        let error = client.probe_image(&url).await.unwrap_err();

        assert!(matches!(error, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_timeout_maps_to_timeout_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(STATS_ENDPOINT))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let client = ApiClient::new(server.uri()).with_timeout(Duration::from_millis(50));
        let error = client.get_dashboard_stats().await.unwrap_err();

        assert!(matches!(error, Error::Timeout { duration_ms: 50 }));
        assert!(error.is_retryable());
    }

    #[tokio::test]
    async fn test_workflow_stages_sorted_and_validated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(STAGES_ENDPOINT))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "s2", "organization_id": "o", "name": "Shipping", "sequence_order": 2},
                {"id": "s1", "organization_id": "o", "name": "Packing", "sequence_order": 1,
                 "sub_stages": [
                    {"id": "a", "stage_id": "s1", "organization_id": "o", "name": "Wrap", "sequence_order": 1}
                 ]}
            ])))
            .mount(&server)
            .await;

        let client = ApiClient::new(server.uri());
        let stages = client.get_workflow_stages().await.unwrap();

        assert_eq!(stages[0].id, "s1");
        assert_eq!(stages[1].id, "s2");
        assert_eq!(stages[0].sub_stages.len(), 1);
    }

    #[tokio::test]
    async fn test_workflow_stages_reject_foreign_sub_stage() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(STAGES_ENDPOINT))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "s1", "organization_id": "o", "name": "Packing",
                 "sub_stages": [
                    {"id": "a", "stage_id": "s9", "organization_id": "o", "name": "Wrap"}
                 ]}
            ])))
            .mount(&server)
            .await;

        let client = ApiClient::new(server.uri());
        let error = client.get_workflow_stages().await.unwrap_err();

        assert!(matches!(error, Error::Validation { .. }));
    }

    #[tokio::test]
    async fn test_stage_items_path_is_encoded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/workflow/stages/stage%201/items"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "w1", "name": "Crate 1", "stageId": "stage 1"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let client = ApiClient::new(server.uri());
        let items = client.get_stage_items("stage 1").await.unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].stage_id, "stage 1");
    }
}

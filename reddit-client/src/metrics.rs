use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiMetrics {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub rate_limited_requests: u64,
    pub average_response_time: Duration,
    pub last_request_time: Option<SystemTime>,
    pub last_error: Option<String>,
    pub requests_by_endpoint: HashMap<String, EndpointMetrics>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointMetrics {
    pub request_count: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub total_response_time: Duration,
    pub max_response_time: Duration,
}

#[derive(Debug, Clone)]
pub struct RequestMetrics {
    pub endpoint: String,
    pub method: String,
    pub status_code: Option<u16>,
    pub response_time: Duration,
    pub success: bool,
    pub rate_limited: bool,
    pub error_type: Option<String>,
}

impl EndpointMetrics {
    fn new() -> Self {
        Self {
            request_count: 0,
            success_count: 0,
            error_count: 0,
            total_response_time: Duration::from_millis(0),
            max_response_time: Duration::from_millis(0),
        }
    }

    fn update(&mut self, metrics: &RequestMetrics) {
        self.request_count += 1;
        self.total_response_time += metrics.response_time;
        self.max_response_time = self.max_response_time.max(metrics.response_time);

        if metrics.success {
            self.success_count += 1;
        } else {
            self.error_count += 1;
        }
    }

    pub fn average_response_time(&self) -> Duration {
        if self.request_count == 0 {
            Duration::from_millis(0)
        } else {
            self.total_response_time / self.request_count as u32
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.request_count == 0 {
            0.0
        } else {
            self.success_count as f64 / self.request_count as f64
        }
    }
}

/// Groups endpoints by shape so that every combination of subreddits or
/// every checked name does not get its own bucket.
///
/// `/r/news+rust/new` becomes `/r/{subreddits}/new`, `/r/rust/about`
/// becomes `/r/{subreddit}/about`.
pub fn endpoint_key(endpoint: &str) -> String {
    let path = endpoint.split('?').next().unwrap_or(endpoint);
    let segments: Vec<&str> = path.split('/').collect();

    match segments.as_slice() {
        ["", "r", names, rest @ ..] if !names.is_empty() => {
            let placeholder = if names.contains('+') {
                "{subreddits}"
            } else {
                "{subreddit}"
            };
            let mut key = format!("/r/{}", placeholder);
            for segment in rest {
                key.push('/');
                key.push_str(segment);
            }
            key
        }
        _ => path.to_string(),
    }
}

#[derive(Debug)]
pub struct MetricsCollector {
    metrics: Arc<RwLock<ApiMetrics>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            metrics: Arc::new(RwLock::new(ApiMetrics::default())),
        }
    }

    pub async fn record_request(&self, request_metrics: RequestMetrics) {
        let mut metrics = self.metrics.write().await;

        metrics.total_requests += 1;
        metrics.last_request_time = Some(SystemTime::now());

        if request_metrics.success {
            metrics.successful_requests += 1;
        } else {
            metrics.failed_requests += 1;
            metrics.last_error = request_metrics.error_type.clone();
        }

        if request_metrics.rate_limited {
            metrics.rate_limited_requests += 1;
        }

        // Running average over every request so far
        let total_time = metrics.average_response_time * (metrics.total_requests - 1) as u32
            + request_metrics.response_time;
        metrics.average_response_time = total_time / metrics.total_requests as u32;

        metrics
            .requests_by_endpoint
            .entry(endpoint_key(&request_metrics.endpoint))
            .or_insert_with(EndpointMetrics::new)
            .update(&request_metrics);
    }

    pub async fn get_metrics(&self) -> ApiMetrics {
        self.metrics.read().await.clone()
    }

    pub async fn get_endpoint_metrics(&self, endpoint: &str) -> Option<EndpointMetrics> {
        let metrics = self.metrics.read().await;
        metrics.requests_by_endpoint.get(&endpoint_key(endpoint)).cloned()
    }

    /// One-line digest for log output.
    pub async fn summary(&self) -> String {
        let metrics = self.metrics.read().await;
        format!(
            "{} requests ({} ok, {} failed, {} rate limited), avg {:?}",
            metrics.total_requests,
            metrics.successful_requests,
            metrics.failed_requests,
            metrics.rate_limited_requests,
            metrics.average_response_time
        )
    }

    pub async fn reset_metrics(&self) {
        let mut metrics = self.metrics.write().await;
        *metrics = ApiMetrics::default();
    }

    pub async fn export_metrics(&self) -> Result<String, serde_json::Error> {
        let metrics = self.get_metrics().await;
        serde_json::to_string_pretty(&metrics)
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(endpoint: &str, millis: u64, success: bool) -> RequestMetrics {
        RequestMetrics {
            endpoint: endpoint.to_string(),
            method: "GET".to_string(),
            status_code: Some(if success { 200 } else { 503 }),
            response_time: Duration::from_millis(millis),
            success,
            rate_limited: false,
            error_type: if success {
                None
            } else {
                Some("server_error".to_string())
            },
        }
    }

    #[test]
    fn test_endpoint_key() {
        assert_eq!(endpoint_key("/r/news+rust/new"), "/r/{subreddits}/new");
        assert_eq!(endpoint_key("/r/rust/about"), "/r/{subreddit}/about");
        assert_eq!(endpoint_key("/r/rust/new?limit=100"), "/r/{subreddit}/new");
        assert_eq!(endpoint_key("/api/v1/access_token"), "/api/v1/access_token");
    }

    #[tokio::test]
    async fn test_metrics_collection() {
        let collector = MetricsCollector::new();

        collector.record_request(request("/r/news+rust/new", 100, true)).await;
        collector.record_request(request("/r/news+rust/new", 300, false)).await;

        let metrics = collector.get_metrics().await;
        assert_eq!(metrics.total_requests, 2);
        assert_eq!(metrics.successful_requests, 1);
        assert_eq!(metrics.failed_requests, 1);
        assert_eq!(metrics.average_response_time, Duration::from_millis(200));
        assert_eq!(metrics.last_error.as_deref(), Some("server_error"));
        assert!(metrics.last_request_time.is_some());
    }

    #[tokio::test]
    async fn test_endpoint_metrics_are_grouped() {
        let collector = MetricsCollector::new();

        collector.record_request(request("/r/news/about", 100, true)).await;
        collector.record_request(request("/r/rust/about", 300, true)).await;

        let endpoint_metrics = collector.get_endpoint_metrics("/r/golang/about").await;
        let metrics = endpoint_metrics.unwrap();
        assert_eq!(metrics.request_count, 2);
        assert_eq!(metrics.success_rate(), 1.0);
        assert_eq!(metrics.average_response_time(), Duration::from_millis(200));
        assert_eq!(metrics.max_response_time, Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_summary_and_export() {
        let collector = MetricsCollector::new();
        collector.record_request(request("/r/rust/new", 150, true)).await;

        assert!(collector.summary().await.starts_with("1 requests (1 ok"));

        let exported = collector.export_metrics().await.unwrap();
        assert!(exported.contains("total_requests"));

        collector.reset_metrics().await;
        assert_eq!(collector.get_metrics().await.total_requests, 0);
    }
}

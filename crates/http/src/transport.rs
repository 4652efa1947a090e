//! HTTP transport with timeout, backpressure handling, and bounded retry
//!
//! Executes one `WireRequest` at a time: applies a fixed deadline,
//! normalizes status/headers/body into a `WireResponse`, raises on
//! HTTP >= 400, and honors the server's `Retry-After` signal with a
//! fixed-delay retry bounded by an explicit per-call budget. `Backoff` and
//! `Alert` headers are surfaced as advisory side effects on the shared
//! client state.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use carton_domain::constants::{HEADER_ALERT, HEADER_BACKOFF, HEADER_RETRY_AFTER};
use carton_domain::{CartonError, HttpMethod, Result, ServerInfo, WireRequest, WireResponse};
use carton_core::endpoints;
use serde_json::Value;
use tracing::{debug, warn};

use crate::state::{ClientEvent, SharedState};

/// Executes wire requests against one server.
#[derive(Debug)]
pub struct Transport {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
    state: Arc<SharedState>,
}

impl Transport {
    /// Create a transport for `base_url` with a fixed per-call timeout.
    pub fn new(base_url: &str, timeout: Duration, state: Arc<SharedState>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| CartonError::Config(format!("failed to build HTTP client: {err}")))?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_string(), timeout, state })
    }

    /// Shared state backing this transport's side effects.
    pub fn state(&self) -> &Arc<SharedState> {
        &self.state
    }

    /// Execute a request, retrying on `Retry-After` while budget remains.
    ///
    /// The retry is a fixed-delay resend of the identical request, bounded
    /// by `retry_budget`; callers not wanting the behavior pass 0. Budget
    /// exhaustion surfaces the final response as a normal server error.
    pub async fn send(&self, request: &WireRequest, retry_budget: u32) -> Result<WireResponse> {
        let mut budget = retry_budget;

        loop {
            let response = self.round_trip(request).await?;
            self.observe_backpressure(&response);

            if let Some(seconds) = header_seconds(&response, HEADER_RETRY_AFTER) {
                let release = SystemTime::now() + Duration::from_secs(seconds);
                self.state.emit(ClientEvent::RetryAfter { release });
                warn!(seconds, "server requested a retry delay");

                if budget > 0 {
                    budget -= 1;
                    tokio::time::sleep(Duration::from_secs(seconds)).await;
                    continue;
                }
            }

            if response.status >= 400 {
                return Err(CartonError::Server {
                    status: response.status,
                    data: response.body.unwrap_or(Value::Null),
                });
            }
            return Ok(response);
        }
    }

    /// Fetch the server's root metadata, caching it on success.
    pub async fn server_info(
        &self,
        headers: &BTreeMap<String, String>,
        retry_budget: u32,
    ) -> Result<ServerInfo> {
        if let Some(info) = self.state.cached_server_info() {
            return Ok(info);
        }

        let request = WireRequest {
            method: HttpMethod::Get,
            path: endpoints::root(),
            headers: headers.clone(),
            body: None,
        };
        let response = self.send(&request, retry_budget).await?;
        let body = response.body.unwrap_or(Value::Null);
        let info: ServerInfo = serde_json::from_value(body.clone()).map_err(|err| {
            CartonError::UnparseableResponse { raw: body.to_string(), reason: err.to_string() }
        })?;

        self.state.cache_server_info(info.clone());
        Ok(info)
    }

    /// One HTTP round trip: build, execute under the deadline, normalize.
    async fn round_trip(&self, request: &WireRequest) -> Result<WireResponse> {
        let url = self.url_for(&request.path);
        debug!(method = %request.method, %url, "sending request");

        let mut builder = self.http.request(reqwest_method(request.method), &url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = match tokio::time::timeout(self.timeout, builder.send()).await {
            Err(_) => return Err(CartonError::NetworkTimeout { request: request.redacted() }),
            Ok(Err(err)) if err.is_timeout() => {
                return Err(CartonError::NetworkTimeout { request: request.redacted() });
            }
            Ok(Err(err)) => return Err(CartonError::Network(err.to_string())),
            Ok(Ok(response)) => response,
        };

        let status = response.status().as_u16();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value.to_str().ok().map(|v| (name.to_string(), v.to_string()))
            })
            .collect();
        let declared_empty = response.content_length() == Some(0);
        let text = response.text().await.map_err(|err| CartonError::Network(err.to_string()))?;

        let body = if declared_empty || text.trim().is_empty() {
            None
        } else {
            Some(serde_json::from_str(&text).map_err(|err| CartonError::UnparseableResponse {
                raw: text.clone(),
                reason: err.to_string(),
            })?)
        };

        debug!(method = %request.method, %url, status, "received response");
        Ok(WireResponse { status, headers, body })
    }

    /// Surface `Alert` and `Backoff` headers as advisory side effects.
    fn observe_backpressure(&self, response: &WireResponse) {
        if let Some(alert) = response.header(HEADER_ALERT) {
            let parsed: Value = serde_json::from_str(alert).unwrap_or(Value::Null);
            let message = parsed
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("endpoint is deprecated")
                .to_string();
            let url =
                parsed.get("url").and_then(Value::as_str).unwrap_or_default().to_string();
            warn!(%message, %url, "server sent a deprecation alert");
            self.state.emit(ClientEvent::Deprecated { message, url });
        }

        if let Some(seconds) = header_seconds(response, HEADER_BACKOFF) {
            self.state.set_backoff(seconds);
            self.state.emit(ClientEvent::Backoff { seconds });
            debug!(seconds, "server advertised a backoff window");
        }
    }

    fn url_for(&self, path: &str) -> String {
        // Next-Page links are absolute and opaque; follow them verbatim.
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }
}

fn reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
        HttpMethod::Head => reqwest::Method::HEAD,
    }
}

fn header_seconds(response: &WireResponse, name: &str) -> Option<u64> {
    response.header(name).and_then(|raw| raw.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn transport(uri: &str) -> Transport {
        Transport::new(uri, Duration::from_secs(5), Arc::new(SharedState::new())).unwrap()
    }

    fn get(path: &str) -> WireRequest {
        WireRequest {
            method: HttpMethod::Get,
            path: path.to_string(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    #[tokio::test]
    async fn normalizes_a_json_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/buckets/blog"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"id": "blog"}})))
            .mount(&server)
            .await;

        let response = transport(&server.uri()).send(&get("/buckets/blog"), 0).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body.unwrap()["data"]["id"], "blog");
    }

    #[tokio::test]
    async fn empty_body_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let response = transport(&server.uri()).send(&get("/"), 0).await.unwrap();
        assert!(response.body.is_none());
    }

    #[tokio::test]
    async fn malformed_json_is_an_unparseable_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = transport(&server.uri()).send(&get("/"), 0).await.unwrap_err();
        match err {
            CartonError::UnparseableResponse { raw, .. } => assert_eq!(raw, "not json"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn status_400_and_above_is_a_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(403).set_body_json(json!({"message": "forbidden"})),
            )
            .mount(&server)
            .await;

        let err = transport(&server.uri()).send(&get("/"), 0).await.unwrap_err();
        match err {
            CartonError::Server { status, data } => {
                assert_eq!(status, 403);
                assert_eq!(data["message"], "forbidden");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn retry_after_with_budget_resends_and_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(503).insert_header("Retry-After", "0"),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&server)
            .await;

        let response = transport(&server.uri()).send(&get("/"), 1).await.unwrap();
        assert_eq!(response.status, 200);
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
    }

    #[tokio::test]
    async fn retry_after_without_budget_surfaces_the_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).insert_header("Retry-After", "0"))
            .expect(1)
            .mount(&server)
            .await;

        let err = transport(&server.uri()).send(&get("/"), 0).await.unwrap_err();
        assert!(matches!(err, CartonError::Server { status: 503, .. }));
    }

    #[tokio::test]
    async fn backoff_header_updates_shared_state_and_notifies() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Backoff", "30")
                    .set_body_json(json!({})),
            )
            .mount(&server)
            .await;

        let transport = transport(&server.uri());
        let mut events = transport.state().subscribe();
        transport.send(&get("/"), 0).await.unwrap();

        assert!(transport.state().backoff_remaining() > Duration::from_secs(25));
        assert!(matches!(events.try_recv(), Ok(ClientEvent::Backoff { seconds: 30 })));
    }

    #[tokio::test]
    async fn alert_header_emits_a_deprecation_notification() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header(
                        "Alert",
                        r#"{"code": "soft-eol", "message": "upgrade", "url": "http://doc"}"#,
                    )
                    .set_body_json(json!({})),
            )
            .mount(&server)
            .await;

        let transport = transport(&server.uri());
        let mut events = transport.state().subscribe();
        transport.send(&get("/"), 0).await.unwrap();

        match events.try_recv() {
            Ok(ClientEvent::Deprecated { message, url }) => {
                assert_eq!(message, "upgrade");
                assert_eq!(url, "http://doc");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn server_info_is_fetched_once_then_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "settings": {"batch_max_requests": 25},
                "capabilities": {"history": {}}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let transport = transport(&server.uri());
        let first = transport.server_info(&BTreeMap::new(), 0).await.unwrap();
        let second = transport.server_info(&BTreeMap::new(), 0).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.settings.chunk_limit(), Some(25));
    }

    #[tokio::test]
    async fn timeout_error_redacts_authorization() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let transport =
            Transport::new(&server.uri(), Duration::from_millis(50), Arc::new(SharedState::new()))
                .unwrap();
        let mut request = get("/");
        request
            .headers
            .insert("Authorization".to_string(), "Bearer secret".to_string());

        let err = transport.send(&request, 0).await.unwrap_err();
        match err {
            CartonError::NetworkTimeout { request } => {
                assert_eq!(request.header("Authorization"), Some("**** (suppressed)"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

//! Live client for the record storage API
//!
//! Entry point for callers: holds the transport, the default headers, and
//! the per-client shared state (cached server metadata, advisory backoff,
//! notifications). Resource handles hang off `bucket()`; batched execution
//! hangs off `batch()` (see `crate::batch`).

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use carton_core::pagination::ListOptions;
use carton_core::request::{
    create_request, delete_request, merge_headers, update_request, WriteOptions,
};
use carton_core::endpoints;
use carton_domain::constants::DEFAULT_TIMEOUT_SECS;
use carton_domain::{
    CartonError, ObjectBody, Result, ServerInfo, ServerSettings, WireRequest, WireResponse,
};
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tracing::instrument;

use crate::bucket::Bucket;
use crate::dispatch::Dispatch;
use crate::paginator::{paginate, PageSource, PaginatedList};
use crate::state::{ClientEvent, SharedState};
use crate::transport::Transport;

/// Client for one remote server.
#[derive(Debug)]
pub struct Client {
    transport: Arc<Transport>,
    headers: BTreeMap<String, String>,
    retry: u32,
}

impl Client {
    /// Start building a new client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new(base_url: &str) -> Result<Self> {
        Self::builder().base_url(base_url).build()
    }

    /// Replace/extend the default headers.
    ///
    /// Invalidates the cached server metadata: a server may answer
    /// differently (settings, capabilities) for different credentials.
    pub fn set_headers(&mut self, headers: BTreeMap<String, String>) {
        self.headers.extend(headers);
        self.transport.state().invalidate_server_info();
    }

    /// Subscribe to advisory notifications (deprecation alerts,
    /// backoff windows, retry-after signals).
    pub fn events(&self) -> broadcast::Receiver<ClientEvent> {
        self.transport.state().subscribe()
    }

    /// Remaining advisory backoff window; zero when none is active.
    pub fn backoff_remaining(&self) -> Duration {
        self.transport.state().backoff_remaining()
    }

    /// Fetch (and cache) the server's root metadata.
    #[instrument(skip(self))]
    pub async fn server_info(&self) -> Result<ServerInfo> {
        self.transport.server_info(&self.headers, self.retry).await
    }

    /// Server-advertised operational settings.
    pub async fn server_settings(&self) -> Result<ServerSettings> {
        Ok(self.server_info().await?.settings)
    }

    /// Server-advertised capability descriptors.
    pub async fn server_capabilities(&self) -> Result<BTreeMap<String, Value>> {
        Ok(self.server_info().await?.capabilities)
    }

    /// Guard an operation on a server capability.
    ///
    /// Explicit async probe in place of decorator-style gating: call it at
    /// the top of the operation and propagate the typed error.
    pub async fn ensure_capability(&self, capability: &str) -> Result<()> {
        let info = self.server_info().await?;
        if info.capabilities.contains_key(capability) {
            Ok(())
        } else {
            Err(CartonError::MissingCapability(capability.to_string()))
        }
    }

    /// Handle on a bucket, inheriting the client's headers and retry.
    pub fn bucket(&self, name: &str) -> Bucket {
        Bucket::new(name, self.dispatch(), self.headers.clone())
    }

    /// Execute one raw wire request (escape hatch).
    pub async fn execute(&self, request: WireRequest, retry: Option<u32>) -> Result<WireResponse> {
        self.dispatch().execute(request, retry).await
    }

    /// List buckets readable by the current principal.
    #[instrument(skip(self, options))]
    pub async fn list_buckets(&self, options: &ListOptions) -> Result<PaginatedList> {
        paginate(self.page_source(options), &endpoints::buckets(), options).await
    }

    /// Create a bucket with the given id.
    #[instrument(skip(self, options))]
    pub async fn create_bucket(&self, id: &str, options: &WriteOptions) -> Result<ObjectBody> {
        let request =
            create_request(&endpoints::buckets(), &json!({ "id": id }), None, &self.headers, options)?;
        let response = self.dispatch().execute(request, options.retry).await?;
        object_body(response)
    }

    /// Update a bucket's data; the data must carry the bucket id.
    #[instrument(skip(self, data, options))]
    pub async fn update_bucket(&self, data: &Value, options: &WriteOptions) -> Result<ObjectBody> {
        let id = data.get("id").and_then(Value::as_str).ok_or_else(|| {
            CartonError::Validation("bucket data must carry an id".to_string())
        })?;
        let request =
            update_request(&endpoints::bucket(id), data, None, &self.headers, options)?;
        let response = self.dispatch().execute(request, options.retry).await?;
        object_body(response)
    }

    /// Delete one bucket.
    #[instrument(skip(self, options))]
    pub async fn delete_bucket(&self, id: &str, options: &WriteOptions) -> Result<ObjectBody> {
        let request = delete_request(&endpoints::bucket(id), None, &self.headers, options)?;
        let response = self.dispatch().execute(request, options.retry).await?;
        object_body(response)
    }

    /// Delete every bucket writable by the current principal.
    #[instrument(skip(self, options))]
    pub async fn delete_buckets(&self, options: &WriteOptions) -> Result<()> {
        let request = delete_request(&endpoints::buckets(), None, &self.headers, options)?;
        self.dispatch().execute(request, options.retry).await?;
        Ok(())
    }

    pub(crate) fn dispatch(&self) -> Dispatch {
        Dispatch::Live { transport: Arc::clone(&self.transport), retry: self.retry }
    }

    pub(crate) fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }

    pub(crate) fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub(crate) fn default_retry(&self) -> u32 {
        self.retry
    }

    fn page_source(&self, options: &ListOptions) -> PageSource {
        PageSource::new(
            Arc::clone(&self.transport),
            merge_headers(&self.headers, &options.headers),
            options.retry.unwrap_or(self.retry),
        )
    }
}

/// Parse the `{ data, permissions }` body of a response; an empty body
/// (e.g. a locally queued batch sub-request) parses to the default.
pub(crate) fn object_body(response: WireResponse) -> Result<ObjectBody> {
    match response.body {
        None => Ok(ObjectBody::default()),
        Some(body) => serde_json::from_value(body.clone()).map_err(|err| {
            CartonError::UnparseableResponse { raw: body.to_string(), reason: err.to_string() }
        }),
    }
}

/// Builder for [`Client`].
#[derive(Debug, Default)]
pub struct ClientBuilder {
    base_url: Option<String>,
    headers: BTreeMap<String, String>,
    timeout: Option<Duration>,
    retry: u32,
}

impl ClientBuilder {
    /// Server root URL, e.g. `https://server/v1`.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Add one default header (e.g. `Authorization`).
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Replace the default headers wholesale.
    pub fn headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    /// Per-call transport deadline.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Default `Retry-After` retry budget for every call (default 0).
    pub fn retry(mut self, retry: u32) -> Self {
        self.retry = retry;
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<Client> {
        let base_url = self
            .base_url
            .ok_or_else(|| CartonError::Config("base URL not set".to_string()))?;
        let timeout = self.timeout.unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        let state = Arc::new(SharedState::new());
        let transport = Transport::new(&base_url, timeout, state)?;
        Ok(Client { transport: Arc::new(transport), headers: self.headers, retry: self.retry })
    }
}

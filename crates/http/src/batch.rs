//! Batch recording and flushing
//!
//! `Client::batch` hands the caller a recording client whose resource
//! handles queue built requests instead of sending them. Once the caller
//! returns, the queue is split into chunks no larger than the
//! server-advertised envelope size and flushed sequentially through
//! `POST /batch`; per-chunk replies are re-concatenated into one flat
//! list aligned 1:1 with the recorded requests.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use carton_core::batch::{chunk_requests, classify, ensure_aligned};
use carton_core::endpoints;
use carton_core::request::merge_headers;
use carton_domain::{
    AggregateResult, BatchDefaults, BatchEnvelope, CartonError, HttpMethod, Result, SubResponse,
    WireRequest,
};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::bucket::Bucket;
use crate::client::Client;
use crate::dispatch::Dispatch;

/// Per-call options for a batched execution.
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Classify sub-responses into published/conflicts/skipped/errors
    /// instead of returning them flat.
    pub aggregate: bool,
    /// Headers applied as envelope defaults, merged over the client's.
    pub headers: BTreeMap<String, String>,
    /// Per-call retry budget override for the outer batch calls.
    pub retry: Option<u32>,
}

/// What a batched execution returns.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    /// Flat sub-responses, positionally aligned with the recorded requests.
    Responses(Vec<SubResponse>),
    /// Four-way classification of the sub-responses.
    Aggregate(AggregateResult),
}

/// Recording twin of [`Client`], handed to the `batch()` closure.
///
/// Its resource handles build the same requests the live ones would, but
/// queue them for a single flush instead of sending them.
pub struct BatchClient {
    queue: Arc<Mutex<Vec<WireRequest>>>,
    headers: BTreeMap<String, String>,
}

impl BatchClient {
    fn new(queue: Arc<Mutex<Vec<WireRequest>>>, headers: BTreeMap<String, String>) -> Self {
        Self { queue, headers }
    }

    /// Handle on a bucket, recording instead of sending.
    pub fn bucket(&self, name: &str) -> Bucket {
        Bucket::new(name, Dispatch::Recording { queue: Arc::clone(&self.queue) }, self.headers.clone())
    }

    /// Queue one raw wire request.
    pub fn enqueue(&self, request: WireRequest) {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner).push(request);
    }

    /// Nested batches are not supported by the wire protocol; fail fast
    /// instead of silently inlining the inner requests.
    pub async fn batch<F, Fut>(&self, _build: F, _options: &BatchOptions) -> Result<BatchOutcome>
    where
        F: FnOnce(BatchClient) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        Err(CartonError::Validation("batch calls cannot be nested".to_string()))
    }
}

impl Client {
    /// Record the operations issued by `build` and flush them as one or
    /// more `POST /batch` envelopes.
    ///
    /// Sub-request failures are data in the outcome, not errors; only
    /// transport faults and misaligned replies fail the whole call.
    #[instrument(skip(self, build, options))]
    pub async fn batch<F, Fut>(&self, build: F, options: &BatchOptions) -> Result<BatchOutcome>
    where
        F: FnOnce(BatchClient) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let headers = merge_headers(self.headers(), &options.headers);
        let queue = Arc::new(Mutex::new(Vec::new()));
        build(BatchClient::new(Arc::clone(&queue), headers.clone())).await?;

        let requests =
            std::mem::take(&mut *queue.lock().unwrap_or_else(PoisonError::into_inner));
        if requests.is_empty() {
            return Ok(empty_outcome(options.aggregate));
        }

        let retry = options.retry.unwrap_or(self.default_retry());
        let limit = self
            .transport()
            .server_info(self.headers(), retry)
            .await?
            .settings
            .chunk_limit();

        let chunks = chunk_requests(requests, limit);
        debug!(chunks = chunks.len(), "flushing batch");

        let mut pairs = Vec::new();
        for chunk in chunks {
            let responses = self.flush_chunk(&chunk, &headers, retry).await?;
            ensure_aligned(chunk.len(), responses.len())?;
            pairs.extend(chunk.into_iter().zip(responses));
        }

        if options.aggregate {
            Ok(BatchOutcome::Aggregate(classify(pairs)))
        } else {
            Ok(BatchOutcome::Responses(pairs.into_iter().map(|(_, sub)| sub).collect()))
        }
    }

    /// Ship one chunk as a batch envelope and parse its reply list.
    async fn flush_chunk(
        &self,
        chunk: &[WireRequest],
        headers: &BTreeMap<String, String>,
        retry: u32,
    ) -> Result<Vec<SubResponse>> {
        let envelope = BatchEnvelope {
            defaults: BatchDefaults { headers: headers.clone() },
            requests: chunk.to_vec(),
        };
        let body = serde_json::to_value(&envelope).map_err(|err| {
            CartonError::Validation(format!("unserializable batch envelope: {err}"))
        })?;

        let request = WireRequest {
            method: HttpMethod::Post,
            path: endpoints::batch(),
            headers: headers.clone(),
            body: Some(body),
        };
        let response = self.transport().send(&request, retry).await?;

        let responses = response
            .body
            .as_ref()
            .and_then(|body| body.get("responses"))
            .cloned()
            .ok_or_else(|| CartonError::UnparseableResponse {
                raw: response.body.as_ref().map(Value::to_string).unwrap_or_default(),
                reason: "batch reply carries no responses list".to_string(),
            })?;
        serde_json::from_value(responses.clone()).map_err(|err| {
            CartonError::UnparseableResponse { raw: responses.to_string(), reason: err.to_string() }
        })
    }
}

fn empty_outcome(aggregate: bool) -> BatchOutcome {
    if aggregate {
        BatchOutcome::Aggregate(AggregateResult::default())
    } else {
        BatchOutcome::Responses(Vec::new())
    }
}

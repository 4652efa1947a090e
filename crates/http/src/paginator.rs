//! Cursor-based pagination walker
//!
//! List calls answer one page plus signal headers. The walker exposes the
//! page as a cursor: `next()` resumes from the server-provided opaque
//! `Next-Page` URL, and the `pages` option follows links sequentially,
//! aggregating results, until the budget or the data is exhausted.

use std::collections::BTreeMap;
use std::sync::Arc;

use carton_core::pagination::{parse_page_headers, build_query, ListOptions, Pages};
use carton_domain::{CartonError, HttpMethod, Result, WireRequest};
use serde_json::Value;
use tracing::debug;

use crate::transport::Transport;

/// Everything needed to fetch one more page.
#[derive(Debug, Clone)]
pub(crate) struct PageSource {
    transport: Arc<Transport>,
    headers: BTreeMap<String, String>,
    retry: u32,
}

impl PageSource {
    pub(crate) fn new(
        transport: Arc<Transport>,
        headers: BTreeMap<String, String>,
        retry: u32,
    ) -> Self {
        Self { transport, headers, retry }
    }
}

/// One page of a list call, usable as a cursor over the remainder.
#[derive(Debug)]
pub struct PaginatedList {
    /// Rows of this page (or of all aggregated pages).
    pub data: Vec<Value>,
    /// Collection ETag of the listing, unquoted.
    pub last_modified: Option<String>,
    /// Total record count, when the server reported one.
    pub total_records: Option<u64>,
    next_page: Option<String>,
    source: Option<PageSource>,
}

impl PaginatedList {
    /// Whether the server reported a further page.
    pub fn has_next_page(&self) -> bool {
        self.next_page.is_some() && self.source.is_some()
    }

    /// Fetch the next page from the literal `Next-Page` URL.
    ///
    /// Calling this when `has_next_page()` is `false` fails with a
    /// terminal pagination-exhausted error, never with silently empty data.
    pub async fn next(&self) -> Result<Self> {
        let (Some(next_page), Some(source)) = (&self.next_page, &self.source) else {
            return Err(CartonError::PaginationExhausted);
        };
        fetch_page(source, next_page).await
    }

    /// A terminal, non-paginable cursor wrapping reconstructed data.
    pub(crate) fn terminal(data: Vec<Value>, last_modified: Option<String>) -> Self {
        let total = u64::try_from(data.len()).ok();
        Self { data, last_modified, total_records: total, next_page: None, source: None }
    }
}

/// Issue a list call and walk its pages according to `options.pages`.
pub(crate) async fn paginate(
    source: PageSource,
    path: &str,
    options: &ListOptions,
) -> Result<PaginatedList> {
    // Query building validates `since` before any network call.
    let pairs = build_query(options)?;
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (name, value) in &pairs {
        serializer.append_pair(name, value);
    }
    let first_url = format!("{path}?{}", serializer.finish());

    let mut page = fetch_page(&source, &first_url).await?;

    if let Some(pages) = options.pages {
        let budget = match pages {
            Pages::All => u32::MAX,
            Pages::Exactly(n) => n.max(1),
        };
        let mut consumed = 1u32;
        while consumed < budget {
            let Some(next_page) = page.next_page.clone() else { break };
            debug!(%next_page, consumed, "following pagination link");
            let mut next = fetch_page(&source, &next_page).await?;
            let mut data = std::mem::take(&mut page.data);
            data.append(&mut next.data);
            next.data = data;
            page = next;
            consumed += 1;
        }
    }

    Ok(page)
}

/// Fetch one page from a literal URL (opaque — never reconstructed from
/// filters) and read its signal headers.
async fn fetch_page(source: &PageSource, url: &str) -> Result<PaginatedList> {
    let request = WireRequest {
        method: HttpMethod::Get,
        path: url.to_string(),
        headers: source.headers.clone(),
        body: None,
    };
    let response = source.transport.send(&request, source.retry).await?;
    let info = parse_page_headers(&response);

    let data = response
        .body
        .as_ref()
        .and_then(|body| body.get("data"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    Ok(PaginatedList {
        data,
        last_modified: info.etag,
        total_records: info.total_records,
        next_page: info.next_page,
        source: Some(source.clone()),
    })
}

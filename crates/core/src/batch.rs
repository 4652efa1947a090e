//! Batch chunking and aggregate classification
//!
//! A batched call ships many sub-requests inside one outer request. The
//! server advertises a maximum envelope size; recorded requests are split
//! into contiguous chunks no larger than that limit, preserving order, and
//! the per-chunk replies are concatenated back into one flat list aligned
//! 1:1 with the original requests. Sub-request failures are data, not
//! errors; the classifier buckets them for callers that asked for an
//! aggregate result.

use carton_domain::{
    AggregateResult, CartonError, ConflictEntry, ErrorEntry, Result, SkippedEntry, SubResponse,
    WireRequest,
};
use serde_json::Value;

/// Split requests into contiguous chunks of at most `limit` elements.
///
/// `None` (or a zero limit normalized upstream) means the server imposes no
/// bound and everything ships in a single chunk. An empty input produces no
/// chunks at all, letting the caller short-circuit without a network call.
pub fn chunk_requests(requests: Vec<WireRequest>, limit: Option<usize>) -> Vec<Vec<WireRequest>> {
    if requests.is_empty() {
        return Vec::new();
    }
    match limit {
        None => vec![requests],
        Some(limit) => {
            let mut chunks = Vec::with_capacity(requests.len().div_ceil(limit.max(1)));
            let mut current = Vec::new();
            for request in requests {
                if current.len() == limit.max(1) {
                    chunks.push(std::mem::take(&mut current));
                }
                current.push(request);
            }
            chunks.push(current);
            chunks
        }
    }
}

/// Check that a chunk's reply is positionally aligned with what was sent.
///
/// Order is the correlation key; a length mismatch means the reply cannot
/// be paired with its requests and the whole batch must fail.
pub fn ensure_aligned(sent: usize, received: usize) -> Result<()> {
    if sent == received {
        Ok(())
    } else {
        Err(CartonError::UnparseableResponse {
            raw: String::new(),
            reason: format!("batch reply carries {received} responses for {sent} requests"),
        })
    }
}

/// Bucket flattened (request, sub-response) pairs into published /
/// conflicts / skipped / errors.
///
/// Total partition: every pair lands in exactly one bucket, and ordering
/// within each bucket matches input order.
pub fn classify(pairs: Vec<(WireRequest, SubResponse)>) -> AggregateResult {
    let mut result = AggregateResult::default();

    for (request, response) in pairs {
        let path = if response.path.is_empty() { request.path.clone() } else { response.path.clone() };
        match response.status {
            200..=299 => {
                result.published.push(response.body);
            }
            412 => {
                // The server's conflicting version is surfaced verbatim,
                // even when the payload omits detail.
                let remote = response
                    .body
                    .get("details")
                    .and_then(|details| details.get("existing"))
                    .cloned()
                    .unwrap_or(Value::Null);
                let local = request
                    .body
                    .as_ref()
                    .and_then(|body| body.get("data"))
                    .cloned()
                    .unwrap_or(Value::Null);
                result.conflicts.push(ConflictEntry { path, local, remote });
            }
            500.. => {
                result.errors.push(ErrorEntry { path, sent: request, error: response.body });
            }
            _ => {
                result.skipped.push(SkippedEntry { path, error: response.body });
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use carton_domain::HttpMethod;
    use serde_json::json;

    use super::*;

    fn request(path: &str) -> WireRequest {
        WireRequest {
            method: HttpMethod::Post,
            path: path.to_string(),
            headers: BTreeMap::new(),
            body: Some(json!({"data": {"title": path}})),
        }
    }

    fn sub(status: u16, path: &str) -> SubResponse {
        SubResponse { status, path: path.to_string(), body: json!({"data": {"id": path}}) }
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(chunk_requests(Vec::new(), Some(3)).is_empty());
        assert!(chunk_requests(Vec::new(), None).is_empty());
    }

    #[test]
    fn no_limit_ships_everything_at_once() {
        let chunks = chunk_requests((0..7).map(|i| request(&format!("/r{i}"))).collect(), None);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), 7);
    }

    #[test]
    fn chunk_count_is_ceil_of_n_over_k() {
        for (n, k, expected) in [(7usize, 3usize, 3usize), (6, 3, 2), (1, 3, 1), (3, 1, 3)] {
            let chunks =
                chunk_requests((0..n).map(|i| request(&format!("/r{i}"))).collect(), Some(k));
            assert_eq!(chunks.len(), expected, "n={n} k={k}");
            assert_eq!(chunks.iter().map(Vec::len).sum::<usize>(), n);
            assert!(chunks.iter().all(|chunk| chunk.len() <= k));
        }
    }

    #[test]
    fn chunking_preserves_original_order() {
        let chunks =
            chunk_requests((0..5).map(|i| request(&format!("/r{i}"))).collect(), Some(2));
        let flattened: Vec<String> =
            chunks.into_iter().flatten().map(|request| request.path).collect();
        assert_eq!(flattened, vec!["/r0", "/r1", "/r2", "/r3", "/r4"]);
    }

    #[test]
    fn misaligned_reply_is_an_error() {
        assert!(ensure_aligned(3, 3).is_ok());
        let err = ensure_aligned(3, 2).unwrap_err();
        assert!(matches!(err, CartonError::UnparseableResponse { .. }));
    }

    #[test]
    fn classification_is_a_total_partition() {
        let statuses = [200u16, 201, 404, 412, 500, 503, 299, 301, 410, 412];
        let pairs: Vec<_> = statuses
            .iter()
            .enumerate()
            .map(|(i, status)| (request(&format!("/r{i}")), sub(*status, &format!("/r{i}"))))
            .collect();
        let total = pairs.len();

        let result = classify(pairs);
        let classified = result.published.len()
            + result.conflicts.len()
            + result.skipped.len()
            + result.errors.len();
        assert_eq!(classified, total);

        assert_eq!(result.published.len(), 3); // 200, 201, 299
        assert_eq!(result.conflicts.len(), 2); // both 412s
        assert_eq!(result.errors.len(), 2); // 500, 503
        assert_eq!(result.skipped.len(), 3); // 404, 301, 410
    }

    #[test]
    fn bucket_ordering_is_stable() {
        let pairs = vec![
            (request("/a"), sub(404, "/a")),
            (request("/b"), sub(200, "/b")),
            (request("/c"), sub(410, "/c")),
            (request("/d"), sub(404, "/d")),
        ];
        let result = classify(pairs);
        let skipped_paths: Vec<&str> =
            result.skipped.iter().map(|entry| entry.path.as_str()).collect();
        assert_eq!(skipped_paths, vec!["/a", "/c", "/d"]);
    }

    #[test]
    fn conflict_surfaces_server_payload_verbatim() {
        let mut response = sub(412, "/a");
        response.body = json!({"details": {"existing": {"id": "a", "last_modified": 9}}});
        let result = classify(vec![(request("/a"), response)]);
        assert_eq!(result.conflicts[0].remote["last_modified"], 9);
        assert_eq!(result.conflicts[0].local["title"], "/a");
    }

    #[test]
    fn conflict_without_detail_is_still_a_conflict() {
        let mut response = sub(412, "/a");
        response.body = json!({});
        let result = classify(vec![(request("/a"), response)]);
        assert_eq!(result.conflicts.len(), 1);
        assert!(result.conflicts[0].remote.is_null());
    }

    #[test]
    fn sub_response_path_falls_back_to_request_path() {
        let response = SubResponse { status: 404, path: String::new(), body: json!({}) };
        let result = classify(vec![(request("/fallback"), response)]);
        assert_eq!(result.skipped[0].path, "/fallback");
    }
}

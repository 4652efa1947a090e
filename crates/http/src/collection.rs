//! Collection resource accessors
//!
//! A collection holds records. Beyond plain CRUD this is where the
//! history-backed snapshot lives: the record list of the collection as of
//! an arbitrary past timestamp, rebuilt client-side from the bucket's
//! append-only history feed.

use std::collections::BTreeMap;
use std::sync::Arc;

use carton_core::pagination::{ListOptions, Pages};
use carton_core::request::{
    create_request, delete_request, merge_headers, update_request, ReadOptions, WriteOptions,
};
use carton_core::{endpoints, snapshot};
use carton_domain::constants::CAPABILITY_HISTORY;
use carton_domain::{
    CartonError, HistoryEntry, HttpMethod, ObjectBody, Permissions, Result, WireRequest,
};
use serde_json::Value;
use tracing::instrument;

use crate::client::object_body;
use crate::dispatch::Dispatch;
use crate::paginator::{paginate, PageSource, PaginatedList};

/// Handle on one collection of a bucket.
#[derive(Clone)]
pub struct Collection {
    bucket: String,
    name: String,
    dispatch: Dispatch,
    headers: BTreeMap<String, String>,
}

impl Collection {
    pub(crate) fn new(
        bucket: &str,
        name: &str,
        dispatch: Dispatch,
        headers: BTreeMap<String, String>,
    ) -> Self {
        Self {
            bucket: bucket.to_string(),
            name: name.to_string(),
            dispatch,
            headers,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn path(&self) -> String {
        endpoints::collection(&self.bucket, &self.name)
    }

    fn records_path(&self) -> String {
        endpoints::records(&self.bucket, &self.name)
    }

    /// Fetch the collection's data and permissions.
    #[instrument(skip(self, options))]
    pub async fn info(&self, options: &ReadOptions) -> Result<ObjectBody> {
        let request = WireRequest {
            method: HttpMethod::Get,
            path: self.path(),
            headers: merge_headers(&self.headers, &options.headers),
            body: None,
        };
        let response = self.dispatch.execute(request, options.retry).await?;
        object_body(response)
    }

    /// Replace (or patch) the collection's data.
    #[instrument(skip(self, data, options))]
    pub async fn set_data(&self, data: &Value, options: &WriteOptions) -> Result<ObjectBody> {
        let request = update_request(&self.path(), data, None, &self.headers, options)?;
        let response = self.dispatch.execute(request, options.retry).await?;
        object_body(response)
    }

    /// Fetch the collection's permissions.
    pub async fn get_permissions(&self, options: &ReadOptions) -> Result<Permissions> {
        Ok(self.info(options).await?.permissions)
    }

    /// Replace the collection's permissions.
    #[instrument(skip(self, permissions, options))]
    pub async fn set_permissions(
        &self,
        permissions: &Permissions,
        options: &WriteOptions,
    ) -> Result<ObjectBody> {
        let request =
            update_request(&self.path(), &Value::Null, Some(permissions), &self.headers, options)?;
        let response = self.dispatch.execute(request, options.retry).await?;
        object_body(response)
    }

    /// Fetch one record.
    #[instrument(skip(self, options))]
    pub async fn get_record(&self, id: &str, options: &ReadOptions) -> Result<ObjectBody> {
        let request = WireRequest {
            method: HttpMethod::Get,
            path: endpoints::record(&self.bucket, &self.name, id),
            headers: merge_headers(&self.headers, &options.headers),
            body: None,
        };
        let response = self.dispatch.execute(request, options.retry).await?;
        object_body(response)
    }

    /// Create a record. POSTs when the data carries no id, PUTs when it
    /// does; a non-string id is rejected before any network call.
    #[instrument(skip(self, data, options))]
    pub async fn create_record(&self, data: &Value, options: &WriteOptions) -> Result<ObjectBody> {
        let request =
            create_request(&self.records_path(), data, None, &self.headers, options)?;
        let response = self.dispatch.execute(request, options.retry).await?;
        object_body(response)
    }

    /// Update a record's data; the data must carry the record id.
    #[instrument(skip(self, data, options))]
    pub async fn update_record(&self, data: &Value, options: &WriteOptions) -> Result<ObjectBody> {
        let id = data.get("id").and_then(Value::as_str).ok_or_else(|| {
            CartonError::Validation("record data must carry an id".to_string())
        })?;
        let request = update_request(
            &endpoints::record(&self.bucket, &self.name, id),
            data,
            None,
            &self.headers,
            options,
        )?;
        let response = self.dispatch.execute(request, options.retry).await?;
        object_body(response)
    }

    /// Delete one record. A safe delete needs a version token in the
    /// options and fails fast without one.
    #[instrument(skip(self, options))]
    pub async fn delete_record(&self, id: &str, options: &WriteOptions) -> Result<ObjectBody> {
        let request = delete_request(
            &endpoints::record(&self.bucket, &self.name, id),
            None,
            &self.headers,
            options,
        )?;
        let response = self.dispatch.execute(request, options.retry).await?;
        object_body(response)
    }

    /// List the collection's records.
    #[instrument(skip(self, options))]
    pub async fn list_records(&self, options: &ListOptions) -> Result<PaginatedList> {
        match self.dispatch.live_transport() {
            Some(transport) => {
                let source = PageSource::new(
                    Arc::clone(transport),
                    merge_headers(&self.headers, &options.headers),
                    options.retry.unwrap_or(self.dispatch.default_retry()),
                );
                paginate(source, &self.records_path(), options).await
            }
            None => {
                let request = WireRequest {
                    method: HttpMethod::Get,
                    path: self.records_path(),
                    headers: merge_headers(&self.headers, &options.headers),
                    body: None,
                };
                self.dispatch.execute(request, options.retry).await?;
                Ok(PaginatedList::terminal(Vec::new(), None))
            }
        }
    }

    /// Current version token of the record listing, read off a HEAD call.
    #[instrument(skip(self, options))]
    pub async fn record_timestamp(&self, options: &ReadOptions) -> Result<Option<String>> {
        let request = WireRequest {
            method: HttpMethod::Head,
            path: self.records_path(),
            headers: merge_headers(&self.headers, &options.headers),
            body: None,
        };
        let response = self.dispatch.execute(request, options.retry).await?;
        let info = carton_core::pagination::parse_page_headers(&response);
        Ok(info.etag)
    }

    /// Rebuild the record list as of `at` (epoch milliseconds) from the
    /// bucket's history feed.
    ///
    /// Requires the server's history capability and a live client; the
    /// whole feed is fetched and replayed client-side, so the result is a
    /// terminal listing that cannot be paginated further.
    #[instrument(skip(self, options))]
    pub async fn snapshot_at(&self, at: u64, options: &ReadOptions) -> Result<PaginatedList> {
        let Some(transport) = self.dispatch.live_transport() else {
            return Err(CartonError::Validation(
                "snapshots cannot be reconstructed inside a batch".to_string(),
            ));
        };

        let retry = options.retry.unwrap_or(self.dispatch.default_retry());
        let info = transport.server_info(&self.headers, retry).await?;
        if !info.capabilities.contains_key(CAPABILITY_HISTORY) {
            return Err(CartonError::MissingCapability(CAPABILITY_HISTORY.to_string()));
        }

        let list_options = ListOptions {
            pages: Some(Pages::All),
            headers: options.headers.clone(),
            retry: options.retry,
            ..ListOptions::default()
        };
        let source = PageSource::new(
            Arc::clone(transport),
            merge_headers(&self.headers, &options.headers),
            retry,
        );
        let feed =
            paginate(source, &endpoints::history(&self.bucket), &list_options).await?;

        let entries: Vec<HistoryEntry> = serde_json::from_value(Value::Array(feed.data))
            .map_err(|err| CartonError::UnparseableResponse {
                raw: "history feed".to_string(),
                reason: err.to_string(),
            })?;

        let records = snapshot::snapshot_at(&entries, &self.name, at)?;
        Ok(PaginatedList::terminal(records, Some(at.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::client::Client;

    use super::*;

    async fn collection(server: &MockServer) -> Collection {
        Client::builder()
            .base_url(server.uri())
            .build()
            .unwrap()
            .bucket("blog")
            .collection("posts")
    }

    fn history_entry(action: &str, resource: &str, id: &str, modified: u64) -> Value {
        json!({
            "action": action,
            "resource_name": resource,
            "collection_id": "posts",
            "last_modified": modified,
            "target": {"data": {"id": id, "last_modified": modified}}
        })
    }

    #[tokio::test]
    async fn get_record_reads_the_object_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/buckets/blog/collections/posts/records/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"id": "abc", "title": "hello"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let record =
            collection(&server).await.get_record("abc", &ReadOptions::default()).await.unwrap();
        assert_eq!(record.data["title"], "hello");
    }

    #[tokio::test]
    async fn create_record_without_id_posts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/buckets/blog/collections/posts/records"))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({"data": {"id": "generated"}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        collection(&server)
            .await
            .create_record(&json!({"title": "hello"}), &WriteOptions::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn safe_update_sends_if_match() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/buckets/blog/collections/posts/records/abc"))
            .and(header("If-Match", "\"1337\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {}})))
            .expect(1)
            .mount(&server)
            .await;

        let data = json!({"id": "abc", "last_modified": 1337, "title": "edited"});
        let options = WriteOptions { safe: true, ..WriteOptions::default() };
        collection(&server).await.update_record(&data, &options).await.unwrap();
    }

    #[tokio::test]
    async fn safe_delete_without_token_makes_no_network_call() {
        let server = MockServer::start().await;
        let options = WriteOptions { safe: true, ..WriteOptions::default() };
        let err =
            collection(&server).await.delete_record("abc", &options).await.unwrap_err();
        assert!(matches!(err, CartonError::Precondition(_)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn record_timestamp_reads_the_listing_etag() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/buckets/blog/collections/posts/records"))
            .respond_with(ResponseTemplate::new(200).insert_header("ETag", "\"1700000000000\""))
            .expect(1)
            .mount(&server)
            .await;

        let timestamp =
            collection(&server).await.record_timestamp(&ReadOptions::default()).await.unwrap();
        assert_eq!(timestamp.as_deref(), Some("1700000000000"));
    }

    #[tokio::test]
    async fn snapshot_requires_the_history_capability() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"capabilities": {}})))
            .mount(&server)
            .await;

        let err =
            collection(&server).await.snapshot_at(25, &ReadOptions::default()).await.unwrap_err();
        assert!(matches!(err, CartonError::MissingCapability(name) if name == "history"));
    }

    #[tokio::test]
    async fn snapshot_replays_the_history_feed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "capabilities": {"history": {}}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/buckets/blog/history"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    history_entry("delete", "record", "1", 30),
                    history_entry("create", "record", "2", 20),
                    history_entry("create", "record", "1", 10),
                    history_entry("create", "collection", "posts", 1),
                ]
            })))
            .mount(&server)
            .await;

        let snapshot =
            collection(&server).await.snapshot_at(25, &ReadOptions::default()).await.unwrap();
        assert_eq!(snapshot.data.len(), 1);
        assert_eq!(snapshot.data[0]["id"], "2");
        assert!(!snapshot.has_next_page());
        assert_eq!(snapshot.last_modified.as_deref(), Some("25"));
    }

    #[tokio::test]
    async fn snapshot_rejects_an_incomplete_feed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "capabilities": {"history": {}}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/buckets/blog/history"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [history_entry("create", "record", "1", 10)]
            })))
            .mount(&server)
            .await;

        let err =
            collection(&server).await.snapshot_at(25, &ReadOptions::default()).await.unwrap_err();
        assert!(matches!(err, CartonError::IncompleteHistory));
    }
}

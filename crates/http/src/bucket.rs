//! Bucket resource accessors
//!
//! A bucket holds collections and groups, plus its own data/permissions
//! and the per-bucket history feed. Handles are cheap to construct and
//! carry the execution mode (live or recording) they were created with.

use std::collections::BTreeMap;

use carton_core::endpoints;
use carton_core::pagination::ListOptions;
use carton_core::request::{
    create_request, delete_request, merge_headers, update_request, ReadOptions, WriteOptions,
};
use carton_domain::{
    CartonError, HttpMethod, ObjectBody, Permissions, Result, WireRequest,
};
use serde_json::{json, Value};
use tracing::instrument;

use crate::client::object_body;
use crate::collection::Collection;
use crate::dispatch::Dispatch;
use crate::paginator::{paginate, PageSource, PaginatedList};

/// Handle on one bucket.
#[derive(Clone)]
pub struct Bucket {
    name: String,
    dispatch: Dispatch,
    headers: BTreeMap<String, String>,
}

impl Bucket {
    pub(crate) fn new(name: &str, dispatch: Dispatch, headers: BTreeMap<String, String>) -> Self {
        Self { name: name.to_string(), dispatch, headers }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handle on a collection of this bucket.
    pub fn collection(&self, name: &str) -> Collection {
        Collection::new(&self.name, name, self.dispatch.clone(), self.headers.clone())
    }

    /// Fetch the bucket's data and permissions.
    #[instrument(skip(self, options))]
    pub async fn info(&self, options: &ReadOptions) -> Result<ObjectBody> {
        let request = WireRequest {
            method: HttpMethod::Get,
            path: endpoints::bucket(&self.name),
            headers: merge_headers(&self.headers, &options.headers),
            body: None,
        };
        let response = self.dispatch.execute(request, options.retry).await?;
        object_body(response)
    }

    /// Replace (or patch) the bucket's data.
    #[instrument(skip(self, data, options))]
    pub async fn set_data(&self, data: &Value, options: &WriteOptions) -> Result<ObjectBody> {
        let request =
            update_request(&endpoints::bucket(&self.name), data, None, &self.headers, options)?;
        let response = self.dispatch.execute(request, options.retry).await?;
        object_body(response)
    }

    /// Fetch the bucket's permissions.
    pub async fn get_permissions(&self, options: &ReadOptions) -> Result<Permissions> {
        Ok(self.info(options).await?.permissions)
    }

    /// Replace the bucket's permissions.
    #[instrument(skip(self, permissions, options))]
    pub async fn set_permissions(
        &self,
        permissions: &Permissions,
        options: &WriteOptions,
    ) -> Result<ObjectBody> {
        let request = update_request(
            &endpoints::bucket(&self.name),
            &Value::Null,
            Some(permissions),
            &self.headers,
            options,
        )?;
        let response = self.dispatch.execute(request, options.retry).await?;
        object_body(response)
    }

    /// List the bucket's collections.
    #[instrument(skip(self, options))]
    pub async fn list_collections(&self, options: &ListOptions) -> Result<PaginatedList> {
        self.list(&endpoints::collections(&self.name), options).await
    }

    /// Create a collection; omitting the id lets the server pick one.
    #[instrument(skip(self, options))]
    pub async fn create_collection(
        &self,
        id: Option<&str>,
        options: &WriteOptions,
    ) -> Result<ObjectBody> {
        let data = match id {
            Some(id) => json!({ "id": id }),
            None => json!({}),
        };
        let request =
            create_request(&endpoints::collections(&self.name), &data, None, &self.headers, options)?;
        let response = self.dispatch.execute(request, options.retry).await?;
        object_body(response)
    }

    /// Delete a collection and every record it holds.
    #[instrument(skip(self, options))]
    pub async fn delete_collection(&self, id: &str, options: &WriteOptions) -> Result<ObjectBody> {
        let request =
            delete_request(&endpoints::collection(&self.name, id), None, &self.headers, options)?;
        let response = self.dispatch.execute(request, options.retry).await?;
        object_body(response)
    }

    /// List the bucket's groups.
    #[instrument(skip(self, options))]
    pub async fn list_groups(&self, options: &ListOptions) -> Result<PaginatedList> {
        self.list(&endpoints::groups(&self.name), options).await
    }

    /// Fetch one group.
    #[instrument(skip(self, options))]
    pub async fn get_group(&self, id: &str, options: &ReadOptions) -> Result<ObjectBody> {
        let request = WireRequest {
            method: HttpMethod::Get,
            path: endpoints::group(&self.name, id),
            headers: merge_headers(&self.headers, &options.headers),
            body: None,
        };
        let response = self.dispatch.execute(request, options.retry).await?;
        object_body(response)
    }

    /// Create a group with a member list.
    #[instrument(skip(self, members, options))]
    pub async fn create_group(
        &self,
        id: &str,
        members: &[String],
        options: &WriteOptions,
    ) -> Result<ObjectBody> {
        let data = json!({ "id": id, "members": members });
        let request =
            create_request(&endpoints::groups(&self.name), &data, None, &self.headers, options)?;
        let response = self.dispatch.execute(request, options.retry).await?;
        object_body(response)
    }

    /// Update a group's data; the data must carry the group id.
    #[instrument(skip(self, data, options))]
    pub async fn update_group(&self, data: &Value, options: &WriteOptions) -> Result<ObjectBody> {
        let id = data.get("id").and_then(Value::as_str).ok_or_else(|| {
            CartonError::Validation("group data must carry an id".to_string())
        })?;
        let request =
            update_request(&endpoints::group(&self.name, id), data, None, &self.headers, options)?;
        let response = self.dispatch.execute(request, options.retry).await?;
        object_body(response)
    }

    /// Delete one group.
    #[instrument(skip(self, options))]
    pub async fn delete_group(&self, id: &str, options: &WriteOptions) -> Result<ObjectBody> {
        let request =
            delete_request(&endpoints::group(&self.name, id), None, &self.headers, options)?;
        let response = self.dispatch.execute(request, options.retry).await?;
        object_body(response)
    }

    /// Walk the bucket's append-only history feed (newest first).
    #[instrument(skip(self, options))]
    pub async fn list_history(&self, options: &ListOptions) -> Result<PaginatedList> {
        self.list(&endpoints::history(&self.name), options).await
    }

    /// Shared list plumbing: live mode paginates, recording mode queues
    /// the bare GET and acknowledges with an empty page.
    async fn list(&self, path: &str, options: &ListOptions) -> Result<PaginatedList> {
        match self.dispatch.live_transport() {
            Some(transport) => {
                let source = PageSource::new(
                    std::sync::Arc::clone(transport),
                    merge_headers(&self.headers, &options.headers),
                    options.retry.unwrap_or(self.dispatch.default_retry()),
                );
                paginate(source, path, options).await
            }
            None => {
                let request = WireRequest {
                    method: HttpMethod::Get,
                    path: path.to_string(),
                    headers: merge_headers(&self.headers, &options.headers),
                    body: None,
                };
                self.dispatch.execute(request, options.retry).await?;
                Ok(PaginatedList::terminal(Vec::new(), None))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::client::Client;

    use super::*;

    async fn bucket(server: &MockServer) -> Bucket {
        Client::builder()
            .base_url(server.uri())
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap()
            .bucket("blog")
    }

    #[tokio::test]
    async fn info_reads_the_bucket_object() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/buckets/blog"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"id": "blog", "last_modified": 1337},
                "permissions": {"write": ["account:admin"]}
            })))
            .mount(&server)
            .await;

        let info = bucket(&server).await.info(&ReadOptions::default()).await.unwrap();
        assert_eq!(info.data["id"], "blog");
        assert_eq!(info.permissions["write"], vec!["account:admin".to_string()]);
    }

    #[tokio::test]
    async fn create_collection_without_id_posts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/buckets/blog/collections"))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({"data": {"id": "generated"}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let body = bucket(&server)
            .await
            .create_collection(None, &WriteOptions::default())
            .await
            .unwrap();
        assert_eq!(body.data["id"], "generated");
    }

    #[tokio::test]
    async fn create_group_puts_members() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/buckets/blog/groups/editors"))
            .and(body_partial_json(json!({"data": {"members": ["account:alice"]}})))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({"data": {"id": "editors"}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        bucket(&server)
            .await
            .create_group("editors", &["account:alice".to_string()], &WriteOptions::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn safe_set_data_sends_if_match() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/buckets/blog"))
            .and(header("If-Match", "\"1337\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {}})))
            .expect(1)
            .mount(&server)
            .await;

        let options = WriteOptions::safe_with(1337);
        bucket(&server).await.set_data(&json!({"status": "ok"}), &options).await.unwrap();
    }

    #[tokio::test]
    async fn update_group_requires_an_id() {
        let server = MockServer::start().await;
        let err = bucket(&server)
            .await
            .update_group(&json!({"members": []}), &WriteOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CartonError::Validation(_)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}

//! Server endpoint paths
//!
//! Path construction for the bucket -> collection -> record/group resource
//! hierarchy. All paths are relative to the server root.

/// Root endpoint, describes the server.
pub fn root() -> String {
    "/".to_string()
}

/// Outer batch endpoint.
pub fn batch() -> String {
    "/batch".to_string()
}

pub fn buckets() -> String {
    "/buckets".to_string()
}

pub fn bucket(id: &str) -> String {
    format!("/buckets/{id}")
}

pub fn collections(bucket: &str) -> String {
    format!("/buckets/{bucket}/collections")
}

pub fn collection(bucket: &str, id: &str) -> String {
    format!("/buckets/{bucket}/collections/{id}")
}

pub fn groups(bucket: &str) -> String {
    format!("/buckets/{bucket}/groups")
}

pub fn group(bucket: &str, id: &str) -> String {
    format!("/buckets/{bucket}/groups/{id}")
}

pub fn records(bucket: &str, collection: &str) -> String {
    format!("/buckets/{bucket}/collections/{collection}/records")
}

pub fn record(bucket: &str, collection: &str, id: &str) -> String {
    format!("/buckets/{bucket}/collections/{collection}/records/{id}")
}

/// Per-bucket append-only history feed.
pub fn history(bucket: &str) -> String {
    format!("/buckets/{bucket}/history")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_follow_the_resource_hierarchy() {
        assert_eq!(bucket("blog"), "/buckets/blog");
        assert_eq!(collection("blog", "posts"), "/buckets/blog/collections/posts");
        assert_eq!(record("blog", "posts", "1"), "/buckets/blog/collections/posts/records/1");
        assert_eq!(group("blog", "editors"), "/buckets/blog/groups/editors");
        assert_eq!(history("blog"), "/buckets/blog/history");
    }
}

//! Pinecone vector store over the REST API.
//!
//! Index management goes through the control plane (`/indexes`); record
//! operations go to the index's own data-plane host, which is resolved once
//! via `GET /indexes/{name}` and cached.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use threadkeeper_core::error::MemoryError;
use threadkeeper_core::memory::{
    IndexSpec, MemoryRecord, MetadataFilter, RecordMetadata, ScoredRecord, StoreCapabilities,
    VectorQuery, VectorStore,
};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const DEFAULT_CONTROL_PLANE: &str = "https://api.pinecone.io";
const API_VERSION: &str = "2024-07";

/// Pinecone caps upsert requests; 100 vectors of 1536 floats stays well under it.
const UPSERT_BATCH: usize = 100;

/// A Pinecone-backed vector store.
pub struct PineconeStore {
    api_key: String,
    control_plane: String,
    filtered_delete: bool,
    ready_attempts: u32,
    ready_interval: Duration,
    hosts: RwLock<HashMap<String, String>>,
    client: reqwest::Client,
}

impl PineconeStore {
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            api_key: api_key.into(),
            control_plane: DEFAULT_CONTROL_PLANE.into(),
            filtered_delete: false,
            ready_attempts: 30,
            ready_interval: Duration::from_secs(2),
            hosts: RwLock::new(HashMap::new()),
            client,
        }
    }

    /// Point the control plane somewhere else (a proxy or local emulator).
    pub fn with_control_plane(mut self, url: impl Into<String>) -> Self {
        self.control_plane = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Enable deletes by metadata filter. Serverless starter projects reject them.
    pub fn with_filtered_delete(mut self, enabled: bool) -> Self {
        self.filtered_delete = enabled;
        self
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
    }

    async fn send(&self, builder: reqwest::RequestBuilder, what: &str) -> Result<reqwest::Response, MemoryError> {
        let response = builder
            .send()
            .await
            .map_err(|e| MemoryError::Unavailable(format!("{what}: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), body = %body, "Pinecone {what} failed");
        Err(MemoryError::Unavailable(format!(
            "{what} returned {}: {body}",
            status.as_u16()
        )))
    }

    async fn describe(&self, index: &str) -> Result<IndexDescription, MemoryError> {
        let url = format!("{}/indexes/{index}", self.control_plane);
        let response = self
            .request(reqwest::Method::GET, &url)
            .send()
            .await
            .map_err(|e| MemoryError::Unavailable(format!("describe index: {e}")))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(MemoryError::IndexNotFound(index.to_string()));
        }
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(MemoryError::Unavailable(format!(
                "describe index returned {status}: {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| MemoryError::MalformedResponse(format!("describe index: {e}")))
    }

    /// Resolve (and cache) the data-plane base URL of an index.
    async fn host(&self, index: &str) -> Result<String, MemoryError> {
        if let Some(host) = self.hosts.read().await.get(index) {
            return Ok(host.clone());
        }

        let description = self.describe(index).await?;
        let host = normalize_host(&description.host);
        self.hosts
            .write()
            .await
            .insert(index.to_string(), host.clone());
        Ok(host)
    }

    async fn wait_until_ready(&self, index: &str) -> Result<(), MemoryError> {
        for attempt in 1..=self.ready_attempts {
            match self.describe(index).await {
                Ok(description) if description.status.ready => {
                    info!(index, attempt, "Pinecone index ready");
                    return Ok(());
                }
                Ok(_) | Err(MemoryError::IndexNotFound(_)) => {
                    debug!(index, attempt, "Waiting for Pinecone index");
                }
                Err(e) => return Err(e),
            }
            tokio::time::sleep(self.ready_interval).await;
        }
        Err(MemoryError::Unavailable(format!(
            "index {index} not ready after {} attempts",
            self.ready_attempts
        )))
    }
}

/// Pinecone hosts come back without a scheme.
fn normalize_host(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}

fn create_index_body(spec: &IndexSpec) -> serde_json::Value {
    serde_json::json!({
        "name": spec.name,
        "dimension": spec.dimension,
        "metric": "cosine",
        "spec": {
            "serverless": {
                "cloud": spec.cloud,
                "region": spec.region,
            }
        }
    })
}

fn upsert_body(records: &[MemoryRecord]) -> Result<serde_json::Value, MemoryError> {
    let vectors = records
        .iter()
        .map(|r| {
            let metadata = serde_json::to_value(&r.metadata)
                .map_err(|e| MemoryError::MalformedResponse(format!("metadata: {e}")))?;
            Ok(ApiVector {
                id: r.id.clone(),
                values: r.embedding.clone(),
                metadata,
            })
        })
        .collect::<Result<Vec<_>, MemoryError>>()?;
    Ok(serde_json::json!({ "vectors": vectors }))
}

fn query_body(query: &VectorQuery) -> serde_json::Value {
    serde_json::json!({
        "vector": query.vector,
        "topK": query.top_k,
        "includeMetadata": true,
        "includeValues": false,
    })
}

fn filter_body(filter: &MetadataFilter) -> serde_json::Value {
    let mut condition = serde_json::Map::new();
    condition.insert(
        filter.field.clone(),
        serde_json::json!({ "$eq": filter.equals }),
    );
    serde_json::json!({ "filter": condition })
}

/// Convert query matches, dropping any whose metadata is not ours.
fn parse_matches(response: QueryResponse, min_score: Option<f32>) -> Vec<ScoredRecord> {
    response
        .matches
        .into_iter()
        .filter(|m| min_score.is_none_or(|min| m.score > min))
        .filter_map(|m| {
            let metadata = m.metadata?;
            match serde_json::from_value::<RecordMetadata>(metadata) {
                Ok(metadata) => Some(ScoredRecord {
                    id: m.id,
                    score: m.score,
                    metadata,
                }),
                Err(e) => {
                    warn!(id = %m.id, error = %e, "Skipping match with foreign metadata");
                    None
                }
            }
        })
        .collect()
}

#[async_trait]
impl VectorStore for PineconeStore {
    fn name(&self) -> &str {
        "pinecone"
    }

    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities {
            filtered_delete: self.filtered_delete,
            recency_index: false,
        }
    }

    async fn list_indexes(&self) -> Result<Vec<String>, MemoryError> {
        let url = format!("{}/indexes", self.control_plane);
        let response = self.send(self.request(reqwest::Method::GET, &url), "list indexes").await?;
        let list: IndexList = response
            .json()
            .await
            .map_err(|e| MemoryError::MalformedResponse(format!("list indexes: {e}")))?;
        Ok(list.indexes.into_iter().map(|i| i.name).collect())
    }

    async fn create_index(&self, spec: &IndexSpec) -> Result<(), MemoryError> {
        let url = format!("{}/indexes", self.control_plane);
        info!(index = %spec.name, dimension = spec.dimension, region = %spec.region, "Creating Pinecone index");
        self.send(
            self.request(reqwest::Method::POST, &url).json(&create_index_body(spec)),
            "create index",
        )
        .await?;
        self.wait_until_ready(&spec.name).await
    }

    async fn upsert(&self, index: &str, records: Vec<MemoryRecord>) -> Result<(), MemoryError> {
        let host = self.host(index).await?;
        let url = format!("{host}/vectors/upsert");
        for batch in records.chunks(UPSERT_BATCH) {
            let body = upsert_body(batch)?;
            self.send(self.request(reqwest::Method::POST, &url).json(&body), "upsert")
                .await?;
            debug!(index, count = batch.len(), "Upserted vectors");
        }
        Ok(())
    }

    async fn query(&self, index: &str, query: VectorQuery) -> Result<Vec<ScoredRecord>, MemoryError> {
        let host = self.host(index).await?;
        let url = format!("{host}/query");
        let response = self
            .send(
                self.request(reqwest::Method::POST, &url).json(&query_body(&query)),
                "query",
            )
            .await?;
        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| MemoryError::MalformedResponse(format!("query: {e}")))?;
        Ok(parse_matches(parsed, query.min_score))
    }

    async fn delete_by_id(&self, index: &str, id: &str) -> Result<(), MemoryError> {
        let host = self.host(index).await?;
        let url = format!("{host}/vectors/delete");
        self.send(
            self.request(reqwest::Method::POST, &url)
                .json(&serde_json::json!({ "ids": [id] })),
            "delete",
        )
        .await?;
        Ok(())
    }

    async fn delete_by_filter(&self, index: &str, filter: &MetadataFilter) -> Result<(), MemoryError> {
        if !self.filtered_delete {
            return Err(MemoryError::Unsupported {
                backend: self.name().to_string(),
                operation: "delete_by_filter".into(),
            });
        }
        let host = self.host(index).await?;
        let url = format!("{host}/vectors/delete");
        self.send(
            self.request(reqwest::Method::POST, &url).json(&filter_body(filter)),
            "filtered delete",
        )
        .await?;
        Ok(())
    }
}

// --- Pinecone API types (internal) ---

#[derive(Debug, Serialize)]
struct ApiVector {
    id: String,
    values: Vec<f32>,
    metadata: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct IndexList {
    #[serde(default)]
    indexes: Vec<IndexDescription>,
}

#[derive(Debug, Deserialize)]
struct IndexDescription {
    name: String,
    #[serde(default)]
    host: String,
    #[serde(default)]
    status: IndexStatus,
}

#[derive(Debug, Default, Deserialize)]
struct IndexStatus {
    #[serde(default)]
    ready: bool,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<ApiMatch>,
}

#[derive(Debug, Deserialize)]
struct ApiMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use threadkeeper_core::memory::NewMemory;
    use threadkeeper_core::message::Role;

    #[test]
    fn hosts_get_a_scheme() {
        assert_eq!(
            normalize_host("idx-abc.svc.us-east-1.pinecone.io"),
            "https://idx-abc.svc.us-east-1.pinecone.io"
        );
        assert_eq!(normalize_host("http://localhost:5080/"), "http://localhost:5080");
    }

    #[test]
    fn create_body_is_serverless_cosine() {
        let body = create_index_body(&IndexSpec {
            name: "threadkeeper".into(),
            dimension: 1536,
            cloud: "aws".into(),
            region: "us-east-1".into(),
        });
        assert_eq!(body["dimension"], 1536);
        assert_eq!(body["metric"], "cosine");
        assert_eq!(body["spec"]["serverless"]["region"], "us-east-1");
    }

    #[test]
    fn upsert_body_carries_metadata() {
        let record = NewMemory::new(Role::Tool, vec!["a".to_string(), "b".to_string()])
            .with_channel("C1")
            .with_parent_message_ts("100.1")
            .into_record("id-1".into(), vec![0.5, 0.5], 7);
        let body = upsert_body(&[record]).unwrap();
        let vector = &body["vectors"][0];
        assert_eq!(vector["id"], "id-1");
        assert_eq!(vector["metadata"]["role"], "tool");
        assert_eq!(vector["metadata"]["content"], serde_json::json!(["a", "b"]));
        assert_eq!(vector["metadata"]["parent_message_ts"], "100.1");
        assert_eq!(vector["metadata"]["sequence"], 7);
    }

    #[test]
    fn query_body_requests_metadata() {
        let body = query_body(&VectorQuery {
            vector: vec![0.0; 3],
            top_k: 100,
            min_score: Some(0.5),
        });
        assert_eq!(body["topK"], 100);
        assert_eq!(body["includeMetadata"], true);
    }

    #[test]
    fn filter_body_uses_eq() {
        let body = filter_body(&MetadataFilter::message_ts("100.2"));
        assert_eq!(body["filter"]["message_ts"]["$eq"], "100.2");
    }

    #[test]
    fn parse_matches_filters_score_and_foreign_metadata() {
        let raw = serde_json::json!({
            "matches": [
                {"id": "a", "score": 0.9, "metadata": {
                    "content": "outage in eu-west", "role": "user", "user": "U1",
                    "channel": "C1", "message_ts": "100.2", "parent_message_ts": "", "sequence": 3
                }},
                {"id": "b", "score": 0.4, "metadata": {
                    "content": "lunch", "role": "user"
                }},
                {"id": "c", "score": 0.8, "metadata": {"unrelated": true}}
            ]
        });
        let response: QueryResponse = serde_json::from_value(raw).unwrap();
        let matches = parse_matches(response, Some(0.5));
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, "a");
        assert_eq!(matches[0].metadata.message_ts, "100.2");
    }

    #[test]
    fn capabilities_follow_configuration() {
        let store = PineconeStore::new("key");
        assert!(!store.capabilities().filtered_delete);
        assert!(!store.capabilities().recency_index);
        let store = store.with_filtered_delete(true);
        assert!(store.capabilities().filtered_delete);
    }
}

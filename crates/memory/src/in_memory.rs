//! In-memory vector store: useful for testing and local runs.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use threadkeeper_core::error::MemoryError;
use threadkeeper_core::memory::{
    IndexSpec, MemoryRecord, MetadataFilter, ScoredRecord, StoreCapabilities, VectorQuery, VectorStore,
};
use tokio::sync::RwLock;

use crate::vector::rank_records;

/// A vector store that keeps every index in a `HashMap`.
///
/// Queries rank by cosine similarity with ties broken newest-first, so the
/// zero-vector recency query behaves as intended here.
pub struct InMemoryVectorStore {
    indexes: Arc<RwLock<HashMap<String, Vec<MemoryRecord>>>>,
    capabilities: StoreCapabilities,
    deleted_ids: Mutex<Vec<String>>,
}

impl InMemoryVectorStore {
    /// A store with no indexes and every optional capability enabled.
    pub fn new() -> Self {
        Self {
            indexes: Arc::new(RwLock::new(HashMap::new())),
            capabilities: StoreCapabilities {
                filtered_delete: true,
                recency_index: true,
            },
            deleted_ids: Mutex::new(Vec::new()),
        }
    }

    /// Override the advertised capabilities.
    pub fn with_capabilities(mut self, capabilities: StoreCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Pre-create an empty index.
    pub fn with_index(self, name: impl Into<String>) -> Self {
        // Constructor runs before the store is shared, so try_write cannot contend.
        if let Ok(mut indexes) = self.indexes.try_write() {
            indexes.entry(name.into()).or_default();
        }
        self
    }

    /// Every id passed to `delete_by_id`, in call order.
    pub fn deleted_ids(&self) -> Vec<String> {
        self.deleted_ids
            .lock()
            .map(|ids| ids.clone())
            .unwrap_or_default()
    }

    /// All records of an index.
    pub async fn records(&self, index: &str) -> Vec<MemoryRecord> {
        self.indexes
            .read()
            .await
            .get(index)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn count(&self, index: &str) -> usize {
        self.indexes.read().await.get(index).map_or(0, Vec::len)
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

fn missing(index: &str) -> MemoryError {
    MemoryError::IndexNotFound(index.to_string())
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    fn capabilities(&self) -> StoreCapabilities {
        self.capabilities
    }

    async fn list_indexes(&self) -> Result<Vec<String>, MemoryError> {
        let mut names: Vec<String> = self.indexes.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn create_index(&self, spec: &IndexSpec) -> Result<(), MemoryError> {
        self.indexes.write().await.entry(spec.name.clone()).or_default();
        Ok(())
    }

    async fn upsert(&self, index: &str, records: Vec<MemoryRecord>) -> Result<(), MemoryError> {
        let mut indexes = self.indexes.write().await;
        let stored = indexes.get_mut(index).ok_or_else(|| missing(index))?;
        for record in records {
            stored.retain(|r| r.id != record.id);
            stored.push(record);
        }
        Ok(())
    }

    async fn query(&self, index: &str, query: VectorQuery) -> Result<Vec<ScoredRecord>, MemoryError> {
        let indexes = self.indexes.read().await;
        let stored = indexes.get(index).ok_or_else(|| missing(index))?;
        Ok(rank_records(stored, &query.vector, query.top_k, query.min_score))
    }

    async fn delete_by_id(&self, index: &str, id: &str) -> Result<(), MemoryError> {
        if let Ok(mut ids) = self.deleted_ids.lock() {
            ids.push(id.to_string());
        }
        let mut indexes = self.indexes.write().await;
        let stored = indexes.get_mut(index).ok_or_else(|| missing(index))?;
        stored.retain(|r| r.id != id);
        Ok(())
    }

    async fn delete_by_filter(&self, index: &str, filter: &MetadataFilter) -> Result<(), MemoryError> {
        if !self.capabilities.filtered_delete {
            return Err(MemoryError::Unsupported {
                backend: self.name().to_string(),
                operation: "delete_by_filter".into(),
            });
        }
        let mut indexes = self.indexes.write().await;
        let stored = indexes.get_mut(index).ok_or_else(|| missing(index))?;
        stored.retain(|r| !filter.matches(&r.metadata));
        Ok(())
    }

    async fn latest(&self, index: &str, count: usize) -> Result<Vec<ScoredRecord>, MemoryError> {
        if !self.capabilities.recency_index {
            return Err(MemoryError::Unsupported {
                backend: self.name().to_string(),
                operation: "latest".into(),
            });
        }
        let indexes = self.indexes.read().await;
        let stored = indexes.get(index).ok_or_else(|| missing(index))?;
        let mut records: Vec<&MemoryRecord> = stored.iter().collect();
        records.sort_by(|a, b| b.metadata.sequence.cmp(&a.metadata.sequence));
        Ok(records
            .into_iter()
            .take(count)
            .map(|r| ScoredRecord {
                id: r.id.clone(),
                score: 1.0,
                metadata: r.metadata.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use threadkeeper_core::memory::NewMemory;
    use threadkeeper_core::message::Role;

    fn record(id: &str, text: &str, ts: &str, embedding: Vec<f32>, sequence: u64) -> MemoryRecord {
        NewMemory::new(Role::User, text)
            .with_message_ts(ts)
            .into_record(id.into(), embedding, sequence)
    }

    fn spec(name: &str) -> IndexSpec {
        IndexSpec {
            name: name.into(),
            dimension: 2,
            cloud: "aws".into(),
            region: "us-east-1".into(),
        }
    }

    #[tokio::test]
    async fn create_and_list_indexes() {
        let store = InMemoryVectorStore::new();
        assert!(store.list_indexes().await.unwrap().is_empty());
        store.create_index(&spec("chat")).await.unwrap();
        assert_eq!(store.list_indexes().await.unwrap(), vec!["chat"]);
    }

    #[tokio::test]
    async fn upsert_into_missing_index_fails() {
        let store = InMemoryVectorStore::new();
        let err = store
            .upsert("nope", vec![record("a", "x", "1", vec![1.0, 0.0], 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::IndexNotFound(_)));
    }

    #[tokio::test]
    async fn upsert_replaces_same_id() {
        let store = InMemoryVectorStore::new().with_index("chat");
        store.upsert("chat", vec![record("a", "first", "1", vec![1.0, 0.0], 1)]).await.unwrap();
        store.upsert("chat", vec![record("a", "second", "1", vec![1.0, 0.0], 2)]).await.unwrap();
        let records = store.records("chat").await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].metadata.content.joined(), "second");
    }

    #[tokio::test]
    async fn query_ranks_and_limits() {
        let store = InMemoryVectorStore::new().with_index("chat");
        store
            .upsert(
                "chat",
                vec![
                    record("a", "near", "1", vec![1.0, 0.1], 1),
                    record("b", "far", "2", vec![0.0, 1.0], 2),
                ],
            )
            .await
            .unwrap();

        let results = store
            .query("chat", VectorQuery { vector: vec![1.0, 0.0], top_k: 1, min_score: None })
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "a");
    }

    #[tokio::test]
    async fn delete_by_id_is_recorded() {
        let store = InMemoryVectorStore::new().with_index("chat");
        store.upsert("chat", vec![record("a", "x", "1", vec![1.0, 0.0], 1)]).await.unwrap();
        store.delete_by_id("chat", "a").await.unwrap();
        assert_eq!(store.count("chat").await, 0);
        assert_eq!(store.deleted_ids(), vec!["a"]);
    }

    #[tokio::test]
    async fn delete_by_filter_matches_message_ts() {
        let store = InMemoryVectorStore::new().with_index("chat");
        store
            .upsert(
                "chat",
                vec![
                    record("a", "x", "100.1", vec![1.0, 0.0], 1),
                    record("b", "y", "100.2", vec![0.0, 1.0], 2),
                ],
            )
            .await
            .unwrap();
        store
            .delete_by_filter("chat", &MetadataFilter::message_ts("100.1"))
            .await
            .unwrap();
        let remaining = store.records("chat").await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, "b");
    }

    #[tokio::test]
    async fn disabled_capabilities_are_unsupported() {
        let store = InMemoryVectorStore::new()
            .with_index("chat")
            .with_capabilities(StoreCapabilities::default());
        let err = store
            .delete_by_filter("chat", &MetadataFilter::message_ts("1"))
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::Unsupported { .. }));
        assert!(store.latest("chat", 3).await.is_err());
    }

    #[tokio::test]
    async fn latest_orders_by_sequence() {
        let store = InMemoryVectorStore::new().with_index("chat");
        store
            .upsert(
                "chat",
                vec![
                    record("old", "x", "1", vec![1.0, 0.0], 1),
                    record("new", "y", "2", vec![0.0, 1.0], 5),
                    record("mid", "z", "3", vec![1.0, 1.0], 3),
                ],
            )
            .await
            .unwrap();
        let latest = store.latest("chat", 2).await.unwrap();
        let ids: Vec<_> = latest.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid"]);
    }
}

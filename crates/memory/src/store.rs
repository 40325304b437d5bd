//! The memory store: conversational memory over a vector index.
//!
//! Turns text into vectors through the embedding provider and keeps one
//! record per user message, assistant answer, and tool result. All
//! retrieval the assistant does (keyword thread search, recent memory)
//! goes through here.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use threadkeeper_core::chat::ChatTransport;
use threadkeeper_core::error::{Error, MemoryError};
use threadkeeper_core::event::{DomainEvent, EventBus};
use threadkeeper_core::memory::{
    IndexSpec, MemoryContent, MetadataFilter, NewMemory, ScoredRecord, VectorQuery, VectorStore,
};
use threadkeeper_core::message::Role;
use threadkeeper_core::provider::{EmbeddingRequest, Provider};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Construction-time settings for [`MemoryStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct MemorySettings {
    pub index_name: String,
    pub embedding_model: String,
    /// Every stored embedding has exactly this many dimensions
    pub dimension: usize,
    pub cloud: String,
    pub region: String,
    /// Similarity matches must score strictly above this
    pub min_score: f32,
    pub keyword_top_k: usize,
    pub backfill_page_size: usize,
    /// Prefer exact `message_ts` deletes when the backend supports them
    pub filtered_delete: bool,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self::from_config(&threadkeeper_config::AppConfig::default())
    }
}

impl MemorySettings {
    pub fn from_config(config: &threadkeeper_config::AppConfig) -> Self {
        Self {
            index_name: config.memory.index_name.clone(),
            embedding_model: config.embedding.model.clone(),
            dimension: config.embedding.dimension,
            cloud: config.memory.cloud.clone(),
            region: config.memory.region.clone(),
            min_score: config.memory.min_score,
            keyword_top_k: config.memory.keyword_top_k,
            backfill_page_size: config.memory.backfill_page_size,
            filtered_delete: config.memory.filtered_delete,
        }
    }

    fn index_spec(&self) -> IndexSpec {
        IndexSpec {
            name: self.index_name.clone(),
            dimension: self.dimension,
            cloud: self.cloud.clone(),
            region: self.region.clone(),
        }
    }
}

/// Outcome of importing channel history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackfillReport {
    /// Channels the bot is a member of
    pub channels: usize,
    /// Records written across all channels
    pub records: usize,
    /// Channels whose import failed
    pub failures: usize,
}

/// Conversational memory backed by a [`VectorStore`].
pub struct MemoryStore {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Provider>,
    settings: MemorySettings,
    sequence: AtomicU64,
    events: Option<Arc<EventBus>>,
}

impl MemoryStore {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn Provider>, settings: MemorySettings) -> Self {
        // Seeded from the clock so sequences keep growing across restarts.
        let seed = u64::try_from(Utc::now().timestamp_micros()).unwrap_or_default();
        Self {
            store,
            embedder,
            settings,
            sequence: AtomicU64::new(seed),
            events: None,
        }
    }

    /// Publish memory events on the given bus.
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    fn publish(&self, event: DomainEvent) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }

    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }

    /// Embed a batch of texts in one provider call, in input order.
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, MemoryError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .embedder
            .embed(EmbeddingRequest {
                model: self.settings.embedding_model.clone(),
                inputs: texts.to_vec(),
            })
            .await
            .map_err(|e| MemoryError::EmbeddingFailed(e.to_string()))?;

        if response.embeddings.len() != texts.len() {
            return Err(MemoryError::EmbeddingFailed(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                response.embeddings.len()
            )));
        }

        for embedding in &response.embeddings {
            if embedding.len() != self.settings.dimension {
                return Err(MemoryError::DimensionMismatch {
                    expected: self.settings.dimension,
                    actual: embedding.len(),
                });
            }
        }

        Ok(response.embeddings)
    }

    /// Embed a single text.
    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
        let mut embeddings = self.embed(&[text.to_string()]).await?;
        embeddings
            .pop()
            .ok_or_else(|| MemoryError::EmbeddingFailed("no embedding returned".into()))
    }

    /// Embed and store one memory under a fresh id. Every call creates a
    /// new record.
    pub async fn upsert(&self, memory: NewMemory) -> Result<String, MemoryError> {
        let mut ids = self.upsert_many(vec![memory]).await?;
        ids.pop()
            .ok_or_else(|| MemoryError::EmbeddingFailed("no record written".into()))
    }

    /// Embed a batch in one call and write it in one backend upsert.
    pub async fn upsert_many(&self, memories: Vec<NewMemory>) -> Result<Vec<String>, MemoryError> {
        if memories.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = memories.iter().map(|m| m.content.joined()).collect();
        let embeddings = self.embed(&texts).await?;
        let role = memories[0].role;

        let records: Vec<_> = memories
            .into_iter()
            .zip(embeddings)
            .map(|(memory, embedding)| {
                memory.into_record(Uuid::new_v4().to_string(), embedding, self.next_sequence())
            })
            .collect();
        let ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();

        self.store.upsert(&self.settings.index_name, records).await?;

        debug!(count = ids.len(), role = %role, "Stored memories");
        self.publish(DomainEvent::MemoryWritten {
            role: role.to_string(),
            count: ids.len(),
            timestamp: Utc::now(),
        });
        Ok(ids)
    }

    /// Nearest stored memories to `text`, best first, keeping only scores
    /// strictly above `min_score`. Zero matches is an empty list.
    pub async fn query_by_similarity(
        &self,
        text: &str,
        top_k: usize,
        min_score: f32,
    ) -> Result<Vec<ScoredRecord>, MemoryError> {
        let vector = self.embed_one(text).await?;
        let matches = self
            .store
            .query(
                &self.settings.index_name,
                VectorQuery {
                    vector,
                    top_k,
                    min_score: Some(min_score),
                },
            )
            .await?;

        Ok(matches.into_iter().filter(|m| m.score > min_score).collect())
    }

    /// Content of the `count` most recent memories.
    ///
    /// Uses the backend's recency index when it has one. Otherwise queries
    /// with a zero vector, which only yields recency order if the backend
    /// breaks score ties by write time; callers must accept any `count`
    /// records in that case.
    pub async fn query_recent(&self, count: usize) -> Result<Vec<MemoryContent>, MemoryError> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let index = &self.settings.index_name;
        if self.store.capabilities().recency_index {
            match self.store.latest(index, count).await {
                Ok(records) => return Ok(records.into_iter().map(|r| r.metadata.content).collect()),
                Err(MemoryError::Unsupported { .. }) => {
                    debug!(backend = self.store.name(), "Recency index unavailable, using zero-vector query");
                }
                Err(e) => return Err(e),
            }
        }

        let matches = self
            .store
            .query(
                index,
                VectorQuery {
                    vector: vec![0.0; self.settings.dimension],
                    top_k: count,
                    min_score: None,
                },
            )
            .await?;
        Ok(matches.into_iter().map(|m| m.metadata.content).collect())
    }

    /// Delete the single stored memory most similar to `text`.
    ///
    /// Only a match scoring above `min_score` is deleted. Returns the
    /// deleted match, or `None` when nothing similar was stored; the message
    /// may never have been indexed, so that is not an error. Two
    /// near-identical memories can make this delete the wrong one.
    pub async fn delete_by_content(&self, text: &str) -> Result<Option<ScoredRecord>, MemoryError> {
        let best = self
            .query_by_similarity(text, 1, self.settings.min_score)
            .await?
            .into_iter()
            .next();

        let Some(best) = best else {
            let err = MemoryError::NotFoundOnDelete(text.chars().take(80).collect());
            warn!(error = %err, "Nothing to delete");
            return Ok(None);
        };

        self.store.delete_by_id(&self.settings.index_name, &best.id).await?;
        debug!(id = %best.id, score = best.score, "Deleted memory by content");
        Ok(Some(best))
    }

    /// Remove the memory of a deleted platform message.
    ///
    /// Deletes by exact `message_ts` when both the backend and the settings
    /// allow it, otherwise falls back to [`Self::delete_by_content`].
    pub async fn delete_message(
        &self,
        message_ts: &str,
        thread_ts: Option<&str>,
        text: &str,
    ) -> Result<(), MemoryError> {
        let index = &self.settings.index_name;

        if self.settings.filtered_delete && self.store.capabilities().filtered_delete && !message_ts.is_empty() {
            self.store
                .delete_by_filter(index, &MetadataFilter::message_ts(message_ts))
                .await?;
            info!(message_ts, "Deleted memory by message timestamp");
            self.publish(DomainEvent::MemoryDeleted {
                message_ts: message_ts.to_string(),
                timestamp: Utc::now(),
            });
            return Ok(());
        }

        if text.trim().is_empty() {
            warn!(message_ts, "Deleted message had no text, nothing to match against");
            return Ok(());
        }

        if let Some(deleted) = self.delete_by_content(text).await? {
            if !deleted.relates_to(message_ts, thread_ts) {
                warn!(
                    message_ts,
                    deleted_id = %deleted.id,
                    deleted_message_ts = %deleted.metadata.message_ts,
                    "Deleted memory does not belong to the deleted message"
                );
            }
            self.publish(DomainEvent::MemoryDeleted {
                message_ts: message_ts.to_string(),
                timestamp: Utc::now(),
            });
        }
        Ok(())
    }

    /// Texts of the memories matching a keyword query, best match first.
    pub async fn thread_messages_by_keyword(&self, keywords: &str) -> Result<Vec<String>, MemoryError> {
        let matches = self
            .query_by_similarity(keywords, self.settings.keyword_top_k, self.settings.min_score)
            .await?;

        Ok(matches
            .iter()
            .flat_map(|m| m.metadata.content.texts())
            .filter(|t| !t.trim().is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Create the index if it does not exist. Returns whether it was created.
    pub async fn ensure_index(&self) -> Result<bool, MemoryError> {
        let name = &self.settings.index_name;
        let existing = self.store.list_indexes().await?;
        if existing.iter().any(|i| i == name) {
            debug!(index = %name, "Index already exists");
            return Ok(false);
        }

        self.store.create_index(&self.settings.index_spec()).await?;
        info!(index = %name, dimension = self.settings.dimension, "Created index");
        Ok(true)
    }

    /// Import the history of every channel the bot belongs to.
    ///
    /// Channels are fetched concurrently. A failing channel is logged and
    /// counted; it does not stop the others.
    pub async fn backfill(&self, transport: &dyn ChatTransport) -> Result<BackfillReport, Error> {
        let channels: Vec<String> = transport
            .list_channels()
            .await?
            .into_iter()
            .filter(|c| c.is_member)
            .map(|c| c.id)
            .collect();

        info!(channels = channels.len(), "Starting backfill");

        let results = join_all(
            channels
                .iter()
                .map(|channel| self.backfill_channel(transport, channel)),
        )
        .await;

        let mut report = BackfillReport {
            channels: channels.len(),
            ..BackfillReport::default()
        };
        for (channel, result) in channels.iter().zip(results) {
            match result {
                Ok(count) => report.records += count,
                Err(e) => {
                    report.failures += 1;
                    error!(%channel, error = %e, "Backfill failed for channel");
                }
            }
        }

        info!(
            channels = report.channels,
            records = report.records,
            failures = report.failures,
            "Backfill complete"
        );
        self.publish(DomainEvent::BackfillCompleted {
            channels: report.channels,
            records: report.records,
            failures: report.failures,
            timestamp: Utc::now(),
        });
        Ok(report)
    }

    async fn backfill_channel(&self, transport: &dyn ChatTransport, channel: &str) -> Result<usize, Error> {
        let history = transport
            .fetch_channel_history(channel, self.settings.backfill_page_size)
            .await?;

        let memories: Vec<NewMemory> = history
            .into_iter()
            .filter(|m| !m.text.trim().is_empty())
            .map(|m| {
                NewMemory::new(Role::User, m.text)
                    .with_user(m.user)
                    .with_channel(channel)
                    .with_message_ts(m.ts)
                    .with_parent_message_ts(m.thread_ts.unwrap_or_default())
            })
            .collect();

        let ids = self.upsert_many(memories).await?;
        debug!(%channel, records = ids.len(), "Backfilled channel");
        Ok(ids.len())
    }

    /// Startup lifecycle: make sure the index exists and, when it was just
    /// created, backfill it on a background task.
    ///
    /// Failing to reach the vector store is returned to the caller. Backfill
    /// errors are only logged.
    pub async fn initialize(
        self: &Arc<Self>,
        transport: Arc<dyn ChatTransport>,
    ) -> Result<Option<JoinHandle<()>>, MemoryError> {
        if !self.ensure_index().await? {
            return Ok(None);
        }

        let memory = Arc::clone(self);
        Ok(Some(tokio::spawn(async move {
            if let Err(e) = memory.backfill(transport.as_ref()).await {
                error!(error = %e, "Backfill aborted");
                memory.publish(DomainEvent::ErrorOccurred {
                    context: "backfill".into(),
                    error_message: e.to_string(),
                    timestamp: Utc::now(),
                });
            }
        })))
    }
}

//! Memory types and the VectorStore trait.
//!
//! Conversational memory is a set of vector-indexed records: every inbound
//! user message, every assistant answer, and every tool result becomes one
//! record. The vector store itself is an external capability; this module
//! defines the records it holds and the operations threadkeeper needs from it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::MemoryError;
use crate::message::Role;

/// The text of a memory: a single message, or a bundle of thread messages
/// stored together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MemoryContent {
    Single(String),
    Many(Vec<String>),
}

impl MemoryContent {
    /// The individual strings, in stored order.
    pub fn texts(&self) -> Vec<&str> {
        match self {
            MemoryContent::Single(text) => vec![text.as_str()],
            MemoryContent::Many(texts) => texts.iter().map(String::as_str).collect(),
        }
    }

    /// All strings joined by newlines. This is what gets embedded.
    pub fn joined(&self) -> String {
        match self {
            MemoryContent::Single(text) => text.clone(),
            MemoryContent::Many(texts) => texts.join("\n"),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.texts().iter().all(|t| t.trim().is_empty())
    }
}

impl From<String> for MemoryContent {
    fn from(text: String) -> Self {
        MemoryContent::Single(text)
    }
}

impl From<&str> for MemoryContent {
    fn from(text: &str) -> Self {
        MemoryContent::Single(text.to_string())
    }
}

impl From<Vec<String>> for MemoryContent {
    fn from(texts: Vec<String>) -> Self {
        MemoryContent::Many(texts)
    }
}

/// Everything stored alongside a record's vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub content: MemoryContent,

    /// Who produced the content
    pub role: Role,

    /// Author of the content (a platform user ID, or the bot)
    #[serde(default)]
    pub user: String,

    /// Channel the memory belongs to
    #[serde(default)]
    pub channel: String,

    /// Platform timestamp of the originating message, empty for synthetic entries
    #[serde(default)]
    pub message_ts: String,

    /// Timestamp of the thread root, empty when not in a thread
    #[serde(default)]
    pub parent_message_ts: String,

    /// Monotonic write counter, larger is newer
    #[serde(default)]
    pub sequence: u64,
}

/// A persisted memory record. `id` is assigned once at write time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: String,
    pub embedding: Vec<f32>,
    pub metadata: RecordMetadata,
}

/// A memory about to be written; the store assigns id, embedding and sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMemory {
    pub content: MemoryContent,
    pub role: Role,
    pub user: String,
    pub channel: String,
    pub message_ts: String,
    pub parent_message_ts: String,
}

impl NewMemory {
    pub fn new(role: Role, content: impl Into<MemoryContent>) -> Self {
        Self {
            content: content.into(),
            role,
            user: String::new(),
            channel: String::new(),
            message_ts: String::new(),
            parent_message_ts: String::new(),
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    pub fn with_message_ts(mut self, ts: impl Into<String>) -> Self {
        self.message_ts = ts.into();
        self
    }

    pub fn with_parent_message_ts(mut self, ts: impl Into<String>) -> Self {
        self.parent_message_ts = ts.into();
        self
    }

    /// Attach an id, embedding and sequence number.
    pub fn into_record(self, id: String, embedding: Vec<f32>, sequence: u64) -> MemoryRecord {
        MemoryRecord {
            id,
            embedding,
            metadata: RecordMetadata {
                content: self.content,
                role: self.role,
                user: self.user,
                channel: self.channel,
                message_ts: self.message_ts,
                parent_message_ts: self.parent_message_ts,
                sequence,
            },
        }
    }
}

/// A query match with its similarity score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRecord {
    pub id: String,
    pub score: f32,
    pub metadata: RecordMetadata,
}

impl ScoredRecord {
    /// Whether this match plausibly stores the given platform message: same
    /// message timestamp, or same thread parent.
    pub fn relates_to(&self, message_ts: &str, thread_ts: Option<&str>) -> bool {
        if !message_ts.is_empty() && self.metadata.message_ts == message_ts {
            return true;
        }
        matches!(thread_ts, Some(parent) if !parent.is_empty() && self.metadata.parent_message_ts == parent)
    }
}

/// A nearest-neighbour query against a vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorQuery {
    pub vector: Vec<f32>,
    pub top_k: usize,

    /// Backends may drop matches at or below this score themselves
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_score: Option<f32>,
}

/// Exact-match metadata filter used for filtered deletes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataFilter {
    pub field: String,
    pub equals: String,
}

impl MetadataFilter {
    pub fn message_ts(ts: impl Into<String>) -> Self {
        Self {
            field: "message_ts".into(),
            equals: ts.into(),
        }
    }

    /// Whether the given metadata satisfies this filter.
    pub fn matches(&self, metadata: &RecordMetadata) -> bool {
        let value = match self.field.as_str() {
            "message_ts" => &metadata.message_ts,
            "parent_message_ts" => &metadata.parent_message_ts,
            "channel" => &metadata.channel,
            "user" => &metadata.user,
            _ => return false,
        };
        value == &self.equals
    }
}

/// Placement and shape of a vector index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub name: String,
    pub dimension: usize,
    pub cloud: String,
    pub region: String,
}

/// Optional features a backend may offer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCapabilities {
    /// Supports `delete_by_filter`
    pub filtered_delete: bool,
    /// Supports `latest` (records ordered by sequence)
    pub recency_index: bool,
}

/// The core VectorStore trait.
///
/// Implementations: Pinecone (REST), in-memory (for testing and local runs).
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// The backend name (e.g., "pinecone", "in_memory").
    fn name(&self) -> &str;

    fn capabilities(&self) -> StoreCapabilities;

    /// Names of the indexes that exist.
    async fn list_indexes(&self) -> std::result::Result<Vec<String>, MemoryError>;

    async fn create_index(&self, spec: &IndexSpec) -> std::result::Result<(), MemoryError>;

    async fn upsert(&self, index: &str, records: Vec<MemoryRecord>) -> std::result::Result<(), MemoryError>;

    /// Nearest neighbours, best first. Zero results is an empty list.
    async fn query(&self, index: &str, query: VectorQuery) -> std::result::Result<Vec<ScoredRecord>, MemoryError>;

    async fn delete_by_id(&self, index: &str, id: &str) -> std::result::Result<(), MemoryError>;

    async fn delete_by_filter(
        &self,
        _index: &str,
        _filter: &MetadataFilter,
    ) -> std::result::Result<(), MemoryError> {
        Err(MemoryError::Unsupported {
            backend: self.name().to_string(),
            operation: "delete_by_filter".into(),
        })
    }

    /// The `count` most recently written records, newest first.
    async fn latest(&self, _index: &str, _count: usize) -> std::result::Result<Vec<ScoredRecord>, MemoryError> {
        Err(MemoryError::Unsupported {
            backend: self.name().to_string(),
            operation: "latest".into(),
        })
    }
}

//! # threadkeeper core
//!
//! Domain types, traits, and error definitions for threadkeeper, an assistant
//! that answers questions about a chat workspace's message history.
//! This crate has **no framework dependencies**: it defines the domain model
//! that every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Every external capability is a trait here:
//! - [`Provider`] for chat completions and embeddings
//! - [`VectorStore`] for the vector index backing conversational memory
//! - [`ChatTransport`] for the chat platform (thread replies, history, posting)
//!
//! Implementations live in their respective crates, which keeps the
//! orchestration logic testable against in-process doubles.

pub mod error;
pub mod message;
pub mod provider;
pub mod memory;
pub mod chat;
pub mod tool;
pub mod event;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use message::{Message, MessageToolCall, Role};
pub use provider::{FinishReason, Provider, ProviderRequest, ProviderResponse, ToolChoice, ToolDefinition};
pub use memory::{MemoryContent, MemoryRecord, RecordMetadata, ScoredRecord, StoreCapabilities, VectorStore};
pub use chat::{ChannelInfo, ChatTransport, PlatformMessage, ThreadReply};
pub use tool::ToolInvocation;
pub use event::{DomainEvent, EventBus};

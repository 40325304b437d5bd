//! Conversational memory for threadkeeper.
//!
//! [`MemoryStore`] is what the rest of the system talks to. Vector store
//! backends implement `threadkeeper_core::VectorStore`.

pub mod in_memory;
pub mod pinecone;
pub mod store;
pub mod vector;

pub use in_memory::InMemoryVectorStore;
pub use pinecone::PineconeStore;
pub use store::{BackfillReport, MemorySettings, MemoryStore};
pub use vector::{cosine_similarity, rank_records};

//! Chunking, embedding, vector indexing and snapshot persistence.

pub mod chunking;
mod client;
mod index;
pub mod snapshot;

pub use chunking::{Chunker, ContentFormat, ConversationChunker, JsonChunker, TextChunker};
#[cfg(test)]
pub use client::FakeEmbeddingClient;
pub use client::{Embedding, EmbeddingProvider, OllamaEmbeddingClient};
pub use index::{MergeReport, VectorIndex, cosine_similarity, relevance};
pub use snapshot::{SnapshotInspection, inspect_snapshot};

//! Retrieval-augmented context for villager conversations.
//!
//! Reference documents and conversation memories are chunked, embedded
//! through Ollama, kept in an in-memory vector index and persisted as a
//! binary snapshot. [`RetrievalService`] ties the pieces together.
#![cfg_attr(
    test,
    allow(
        dead_code,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::float_cmp,
        clippy::missing_panics_doc,
        clippy::missing_errors_doc,
        reason = "Test allows"
    )
)]

pub mod embedding;
/// High-level store and query operations
pub mod retrieval;

#[cfg(test)]
pub use embedding::FakeEmbeddingClient;
pub use embedding::{
    Chunker, ContentFormat, Embedding, EmbeddingProvider, MergeReport, OllamaEmbeddingClient,
    SnapshotInspection, VectorIndex, inspect_snapshot,
};
pub use retrieval::{DocumentSource, RetrievalService};

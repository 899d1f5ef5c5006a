//! Core types for the lore retrieval subsystem.
//!
//! This crate provides the error taxonomy, the immutable configuration value
//! and the document/metadata model shared by chunking, embedding, indexing
//! and persistence.
#![cfg_attr(
    test,
    allow(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::float_cmp,
        reason = "Test allows"
    )
)]

/// Configuration loaded once and passed into every component.
pub mod config;
/// Error types and result definitions.
pub mod error;
/// Documents, metadata and filters.
pub mod types;

pub use config::{ChunkingConfig, EmbeddingConfig, QueryConfig, RetrievalConfig, StorageConfig};
pub use error::{Error, Result};
pub use types::{DocumentKind, MetadataFilter, ScoredDocument, VectorDocument, VectorMetadata};

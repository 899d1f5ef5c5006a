use chrono::Utc;
use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Category of a stored chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// Reference material ingested from files or text
    Document,
    /// Conversation memory owned by a villager
    Memory,
}

impl DocumentKind {
    /// Name used in persisted snapshots.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Memory => "memory",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for DocumentKind {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "document" => Ok(Self::Document),
            "memory" => Ok(Self::Memory),
            other => Err(Error::CorruptedStore(format!(
                "unknown document kind '{other}'"
            ))),
        }
    }
}

/// Metadata attached to every stored chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorMetadata {
    /// Document or memory
    pub kind: DocumentKind,
    /// Owning villager (always set for memories)
    pub owner_id: Option<String>,
    /// Player on the other side of the conversation
    pub counterpart_id: Option<String>,
    /// Creation instant in milliseconds since the Unix epoch
    pub timestamp: i64,
    /// Position of this chunk within its batch
    pub chunk_index: u32,
    /// Number of chunks the batch produced
    pub chunk_total: u32,
}

impl VectorMetadata {
    /// Metadata template for reference documents, stamped with the current time.
    pub fn document() -> Self {
        Self {
            kind: DocumentKind::Document,
            owner_id: None,
            counterpart_id: None,
            timestamp: Utc::now().timestamp_millis(),
            chunk_index: 0,
            chunk_total: 1,
        }
    }

    /// Metadata template for a memory owned by `owner_id`.
    pub fn memory<T: Into<String>>(owner_id: T, counterpart_id: Option<String>) -> Self {
        Self {
            kind: DocumentKind::Memory,
            owner_id: Some(owner_id.into()),
            counterpart_id,
            timestamp: Utc::now().timestamp_millis(),
            chunk_index: 0,
            chunk_total: 1,
        }
    }

    /// Copy of this template positioned at `index` of `total` chunks.
    #[must_use]
    pub fn with_chunk(&self, index: u32, total: u32) -> Self {
        debug_assert!(index < total, "chunk index {index} out of range {total}");
        Self {
            chunk_index: index,
            chunk_total: total,
            ..self.clone()
        }
    }
}

/// One stored chunk: text, embedding and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorDocument {
    /// Globally unique identifier
    pub id: String,
    /// Chunk text
    pub content: String,
    /// Embedding vector
    pub embedding: Vec<f32>,
    /// Chunk metadata
    pub metadata: VectorMetadata,
}

impl VectorDocument {
    /// Create a new document
    pub fn new<I: Into<String>, C: Into<String>>(
        id: I,
        content: C,
        embedding: Vec<f32>,
        metadata: VectorMetadata,
    ) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            embedding,
            metadata,
        }
    }
}

/// A query hit together with its relevance score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredDocument {
    /// Matched document
    pub document: VectorDocument,
    /// Relevance score (0.0 to 1.0)
    pub score: f32,
}

/// Predicate over [`VectorMetadata`]; unset fields do not constrain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataFilter {
    /// Required kind
    pub kind: Option<DocumentKind>,
    /// Required owner
    pub owner_id: Option<String>,
    /// Required counterpart
    pub counterpart_id: Option<String>,
    /// Only documents strictly newer than this instant
    pub timestamp_after: Option<i64>,
    /// Only documents strictly older than this instant
    pub timestamp_before: Option<i64>,
}

impl MetadataFilter {
    /// Filter that matches everything.
    pub fn all() -> Self {
        Self::default()
    }

    /// Reference documents only.
    pub fn documents() -> Self {
        Self {
            kind: Some(DocumentKind::Document),
            ..Self::default()
        }
    }

    /// Memories of any owner.
    pub fn memories() -> Self {
        Self {
            kind: Some(DocumentKind::Memory),
            ..Self::default()
        }
    }

    /// Memories owned by one villager.
    pub fn memories_for<T: Into<String>>(owner_id: T) -> Self {
        Self {
            owner_id: Some(owner_id.into()),
            ..Self::memories()
        }
    }

    /// Memories shared between one villager and one player.
    pub fn memories_between<O: Into<String>, C: Into<String>>(owner_id: O, counterpart_id: C) -> Self {
        Self {
            counterpart_id: Some(counterpart_id.into()),
            ..Self::memories_for(owner_id)
        }
    }

    /// Restrict to documents created after `timestamp`.
    #[must_use]
    pub fn after(mut self, timestamp: i64) -> Self {
        self.timestamp_after = Some(timestamp);
        self
    }

    /// Restrict to documents created before `timestamp`.
    #[must_use]
    pub fn before(mut self, timestamp: i64) -> Self {
        self.timestamp_before = Some(timestamp);
        self
    }

    /// Whether `metadata` satisfies every constrained field.
    pub fn matches(&self, metadata: &VectorMetadata) -> bool {
        if self.kind.is_some_and(|kind| kind != metadata.kind) {
            return false;
        }
        if self
            .owner_id
            .as_ref()
            .is_some_and(|owner| metadata.owner_id.as_ref() != Some(owner))
        {
            return false;
        }
        if self
            .counterpart_id
            .as_ref()
            .is_some_and(|counterpart| metadata.counterpart_id.as_ref() != Some(counterpart))
        {
            return false;
        }
        if self
            .timestamp_after
            .is_some_and(|after| metadata.timestamp <= after)
        {
            return false;
        }
        !self
            .timestamp_before
            .is_some_and(|before| metadata.timestamp >= before)
    }
}

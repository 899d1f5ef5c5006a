//! In-memory vector index with snapshot persistence.

use core::cmp::Ordering;
use lore_core::{Error, MetadataFilter, Result, ScoredDocument, VectorDocument};
use std::collections::{BTreeMap, HashMap};
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info, warn};

use super::snapshot::{read_snapshot, read_snapshot_file, write_snapshot, write_snapshot_file};

/// Outcome of an additive load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Documents inserted
    pub added: usize,
    /// Documents ignored because their id was already present
    pub skipped: usize,
}

/// In-memory vector database of chunk documents
///
/// Documents are kept in insertion order; overwriting an id keeps its
/// original position. The index does no locking of its own.
#[derive(Debug)]
pub struct VectorIndex {
    dimension: usize,
    documents: BTreeMap<u64, VectorDocument>,
    slots: HashMap<String, u64>,
    next_slot: u64,
}

impl VectorIndex {
    /// Empty index accepting embeddings of `dimension` components
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            documents: BTreeMap::default(),
            slots: HashMap::default(),
            next_slot: 0,
        }
    }

    /// Embedding length every document must have
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Insert or overwrite a document by id
    ///
    /// # Errors
    /// Returns [`Error::DimensionMismatch`] for embeddings of the wrong length
    pub fn store(&mut self, document: VectorDocument) -> Result<()> {
        self.check_dimension(document.embedding.len())?;
        self.insert(document);
        Ok(())
    }

    /// Insert a batch; nothing is inserted unless every document is valid
    ///
    /// # Errors
    /// Returns [`Error::DimensionMismatch`] for embeddings of the wrong length
    pub fn store_all(&mut self, documents: Vec<VectorDocument>) -> Result<()> {
        self.check_all(&documents)?;
        for document in documents {
            self.insert(document);
        }
        Ok(())
    }

    /// Most relevant documents passing `filter` with a score of at least
    /// `min_score`, best first; equal scores keep insertion order
    ///
    /// # Errors
    /// Returns [`Error::DimensionMismatch`] if `query` has the wrong length
    pub fn query(
        &self,
        query: &[f32],
        filter: Option<&MetadataFilter>,
        top_k: usize,
        min_score: f32,
    ) -> Result<Vec<ScoredDocument>> {
        self.check_dimension(query.len())?;
        if top_k == 0 {
            return Ok(Vec::default());
        }

        let mut scores: Vec<(f32, &VectorDocument)> = self
            .documents
            .values()
            .filter(|document| filter.is_none_or(|active| active.matches(&document.metadata)))
            .map(|document| (relevance(query, &document.embedding), document))
            .filter(|(score, _)| *score >= min_score)
            .collect();

        scores.sort_by(|first, second| second.0.partial_cmp(&first.0).unwrap_or(Ordering::Equal));
        scores.truncate(top_k);

        Ok(scores
            .into_iter()
            .map(|(score, document)| ScoredDocument {
                document: document.clone(),
                score,
            })
            .collect())
    }

    /// Look up a document by id
    pub fn get(&self, id: &str) -> Option<&VectorDocument> {
        self.slots.get(id).and_then(|slot| self.documents.get(slot))
    }

    /// Remove a document by id, returning whether it existed
    pub fn delete(&mut self, id: &str) -> bool {
        self.slots
            .remove(id)
            .and_then(|slot| self.documents.remove(&slot))
            .is_some()
    }

    /// Remove every document matching `filter` (`None` removes everything)
    pub fn delete_by_filter(&mut self, filter: Option<&MetadataFilter>) -> usize {
        let Some(active) = filter else {
            let removed = self.len();
            self.clear();
            return removed;
        };

        let before = self.documents.len();
        let slots = &mut self.slots;
        self.documents.retain(|_, document| {
            let keep = !active.matches(&document.metadata);
            if !keep {
                slots.remove(&document.id);
            }
            keep
        });
        before - self.documents.len()
    }

    /// Number of documents matching `filter` (`None` counts everything)
    pub fn count(&self, filter: Option<&MetadataFilter>) -> usize {
        filter.map_or_else(
            || self.len(),
            |active| {
                self.documents
                    .values()
                    .filter(|document| active.matches(&document.metadata))
                    .count()
            },
        )
    }

    /// Number of stored documents
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether the index holds no documents
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Iterate over documents in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &VectorDocument> + '_ {
        self.documents.values()
    }

    /// Remove every document
    pub fn clear(&mut self) {
        self.documents.clear();
        self.slots.clear();
        self.next_slot = 0;
    }

    /// Encode the whole index in snapshot format
    ///
    /// # Errors
    /// Returns [`Error::Encoding`] if a document cannot be represented
    pub fn to_snapshot_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::default();
        write_snapshot(&mut bytes, self.documents.values())?;
        Ok(bytes)
    }

    /// Write the index to `path`, replacing any previous snapshot
    ///
    /// # Errors
    /// Returns an encoding or I/O error; an existing file is left intact on failure
    pub fn persist(&self, path: &Path) -> Result<()> {
        write_snapshot_file(path, &self.to_snapshot_bytes()?)?;
        info!("Persisted {} documents to {}", self.len(), path.display());
        Ok(())
    }

    /// Replace the contents with the snapshot at `path`
    ///
    /// A missing file leaves the index untouched and loads nothing. The file
    /// is fully decoded before anything is replaced.
    ///
    /// # Errors
    /// Returns [`Error::CorruptedStore`] or [`Error::DimensionMismatch`] for
    /// unusable snapshots, or an I/O error
    pub fn load(&mut self, path: &Path) -> Result<usize> {
        let Some(documents) = read_snapshot_file(path)? else {
            debug!("No snapshot at {}", path.display());
            return Ok(0);
        };
        let loaded = self.replace_all(documents)?;
        info!("Loaded {loaded} documents from {}", path.display());
        Ok(loaded)
    }

    /// Add the documents of a snapshot stream to the current contents
    ///
    /// # Errors
    /// Returns [`Error::CorruptedStore`] or [`Error::DimensionMismatch`] for
    /// unusable snapshots; nothing is added in that case
    pub fn load_from_reader<R: Read>(&mut self, reader: R) -> Result<MergeReport> {
        let documents = read_snapshot(&mut BufReader::new(reader))?;
        self.merge(documents)
    }

    /// Replace the contents with `documents` after validating all of them
    ///
    /// # Errors
    /// Returns [`Error::DimensionMismatch`] and leaves the index unchanged
    pub fn replace_all(&mut self, documents: Vec<VectorDocument>) -> Result<usize> {
        self.check_all(&documents)?;
        self.clear();
        for document in documents {
            self.insert(document);
        }
        Ok(self.len())
    }

    /// Add `documents`, keeping existing documents on id collisions
    ///
    /// # Errors
    /// Returns [`Error::DimensionMismatch`] and leaves the index unchanged
    pub fn merge(&mut self, documents: Vec<VectorDocument>) -> Result<MergeReport> {
        self.check_all(&documents)?;

        let mut report = MergeReport::default();
        for document in documents {
            if self.slots.contains_key(&document.id) {
                warn!("Skipping document {}: id already present", document.id);
                report.skipped += 1;
            } else {
                self.insert(document);
                report.added += 1;
            }
        }
        Ok(report)
    }

    fn insert(&mut self, document: VectorDocument) {
        if let Some(&slot) = self.slots.get(&document.id) {
            self.documents.insert(slot, document);
            return;
        }

        let slot = self.next_slot;
        self.next_slot += 1;
        self.slots.insert(document.id.clone(), slot);
        self.documents.insert(slot, document);
    }

    fn check_all(&self, documents: &[VectorDocument]) -> Result<()> {
        documents
            .iter()
            .try_for_each(|document| self.check_dimension(document.embedding.len()))
    }

    fn check_dimension(&self, actual: usize) -> Result<()> {
        if actual == self.dimension {
            Ok(())
        } else {
            Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual,
            })
        }
    }
}

/// Cosine similarity; 0 for vectors of different length or zero magnitude
pub fn cosine_similarity(vector_a: &[f32], vector_b: &[f32]) -> f32 {
    if vector_a.len() != vector_b.len() {
        return 0.0;
    }

    let dot_product: f32 = vector_a
        .iter()
        .zip(vector_b.iter())
        .map(|(left, right)| left * right)
        .sum();
    let magnitude_a = vector_a.iter().map(|value| value * value).sum::<f32>().sqrt();
    let magnitude_b = vector_b.iter().map(|value| value * value).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}

/// Cosine similarity mapped from `[-1, 1]` onto `[0, 1]`
pub fn relevance(vector_a: &[f32], vector_b: &[f32]) -> f32 {
    ((cosine_similarity(vector_a, vector_b) + 1.0) / 2.0).clamp(0.0, 1.0)
}

//! Retrieval service: chunk, embed, index, query and persist.

use lore_core::{
    Error, MetadataFilter, Result, RetrievalConfig, ScoredDocument, VectorDocument, VectorMetadata,
};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;
use tokio::task::spawn_blocking;
use tracing::{debug, info};
use uuid::Uuid;

use crate::embedding::snapshot::{read_snapshot, read_snapshot_file, write_snapshot_file};
use crate::embedding::{
    Chunker, ContentFormat, EmbeddingProvider, MergeReport, OllamaEmbeddingClient, VectorIndex,
};

/// Content handed to [`RetrievalService::store_document`]
#[derive(Debug, Clone)]
pub enum DocumentSource {
    /// File on disk; `.json` files are chunked as JSON, everything else as text
    Path(PathBuf),
    /// Plain text
    Text(String),
    /// JSON text
    Json(String),
}

/// Facade over chunkers, embedding provider and vector index
///
/// Queries share a read lock on the index; stores, deletes and loads take the
/// write lock only after embedding has finished.
pub struct RetrievalService<E: EmbeddingProvider = OllamaEmbeddingClient> {
    config: Arc<RetrievalConfig>,
    provider: E,
    index: RwLock<VectorIndex>,
    text_chunker: Chunker,
    json_chunker: Chunker,
    conversation_chunker: Chunker,
}

impl RetrievalService<OllamaEmbeddingClient> {
    /// Create a service backed by the Ollama server named in `config`
    ///
    /// # Errors
    /// Returns [`Error::Config`] for invalid settings
    pub fn new(config: impl Into<Arc<RetrievalConfig>>) -> Result<Self> {
        let config = config.into();
        let provider = OllamaEmbeddingClient::new(&config.embedding)?;
        Self::with_provider(config, provider)
    }
}

impl<E: EmbeddingProvider> RetrievalService<E> {
    /// Create a service with a custom embedding provider
    ///
    /// # Errors
    /// Returns [`Error::Config`] for invalid settings or when the provider's
    /// dimension disagrees with the configured one
    pub fn with_provider(config: impl Into<Arc<RetrievalConfig>>, provider: E) -> Result<Self> {
        let config = config.into();
        config.validate()?;
        if provider.dimension() != config.embedding.dimension {
            return Err(Error::Config(format!(
                "Provider produces {}-dimensional embeddings but {} are configured",
                provider.dimension(),
                config.embedding.dimension
            )));
        }

        let chunking = &config.chunking;
        Ok(Self {
            text_chunker: Chunker::for_format(ContentFormat::Text, chunking),
            json_chunker: Chunker::for_format(ContentFormat::Json, chunking),
            conversation_chunker: Chunker::for_format(ContentFormat::Conversation, chunking),
            index: RwLock::new(VectorIndex::new(config.embedding.dimension)),
            provider,
            config,
        })
    }

    /// Configuration the service was built with
    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Chunk, embed and index reference material
    ///
    /// Returns the number of chunks stored.
    ///
    /// # Errors
    /// Returns an I/O error for unreadable files, [`Error::InvalidContent`]
    /// for malformed JSON and [`Error::Provider`] when embedding fails; nothing
    /// is stored on error
    pub async fn store_document(&self, source: DocumentSource) -> Result<usize> {
        let (content, chunker, origin) = match source {
            DocumentSource::Path(path) => {
                let content = fs::read_to_string(&path).await?;
                let chunker = match ContentFormat::for_path(&path) {
                    ContentFormat::Json => &self.json_chunker,
                    _ => &self.text_chunker,
                };
                (content, chunker, path.display().to_string())
            }
            DocumentSource::Text(text) => (text, &self.text_chunker, "text".to_owned()),
            DocumentSource::Json(json) => (json, &self.json_chunker, "json".to_owned()),
        };

        let chunks = chunker.chunk(&content)?;
        let stored = self.embed_and_store(chunks, &VectorMetadata::document()).await?;
        info!("Stored {stored} document chunks from {origin}");
        Ok(stored)
    }

    /// Chunk, embed and index a conversation transcript as memories of `owner_id`
    ///
    /// # Errors
    /// Returns [`Error::Provider`] when embedding fails; nothing is stored on error
    pub async fn store_memory(
        &self,
        content: &str,
        owner_id: &str,
        counterpart_id: Option<&str>,
    ) -> Result<usize> {
        let chunks = self.conversation_chunker.chunk(content)?;
        let template = VectorMetadata::memory(owner_id, counterpart_id.map(str::to_owned));
        let stored = self.embed_and_store(chunks, &template).await?;
        debug!("Stored {stored} memory chunks for {owner_id}");
        Ok(stored)
    }

    async fn embed_and_store(&self, chunks: Vec<String>, template: &VectorMetadata) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let total = u32::try_from(chunks.len())
            .map_err(|_overflow| Error::Other(format!("Too many chunks: {}", chunks.len())))?;
        let embeddings = self.provider.embed_batch(chunks.clone()).await?;
        if embeddings.len() != chunks.len() {
            return Err(Error::Provider(format!(
                "Provider returned {} embeddings for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }

        let documents: Vec<VectorDocument> = chunks
            .into_iter()
            .zip(embeddings)
            .zip(0..total)
            .map(|((content, embedding), index)| {
                VectorDocument::new(
                    Uuid::new_v4().to_string(),
                    content,
                    embedding,
                    template.with_chunk(index, total),
                )
            })
            .collect();

        let stored = documents.len();
        self.index.write().await.store_all(documents)?;
        Ok(stored)
    }

    /// Query with an arbitrary filter and the configured minimum score
    ///
    /// # Errors
    /// Returns [`Error::Provider`] when the query cannot be embedded
    pub async fn query(
        &self,
        text: &str,
        filter: Option<&MetadataFilter>,
        top_k: usize,
    ) -> Result<Vec<ScoredDocument>> {
        let embedding = self.provider.embed(text).await?;
        let hits = self.index.read().await.query(
            &embedding,
            filter,
            top_k,
            self.config.query.default_min_score,
        )?;
        debug!("Query returned {} hits", hits.len());
        Ok(hits)
    }

    /// Most relevant reference document chunks
    ///
    /// # Errors
    /// Returns [`Error::Provider`] when the query cannot be embedded
    pub async fn query_documents(&self, text: &str, top_k: usize) -> Result<Vec<ScoredDocument>> {
        self.query(text, Some(&MetadataFilter::documents()), top_k).await
    }

    /// Most relevant memories owned by `owner_id`
    ///
    /// # Errors
    /// Returns [`Error::Provider`] when the query cannot be embedded
    pub async fn query_memories(
        &self,
        text: &str,
        owner_id: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredDocument>> {
        self.query(text, Some(&MetadataFilter::memories_for(owner_id)), top_k)
            .await
    }

    /// Number of indexed chunks matching `filter`
    pub async fn count(&self, filter: Option<&MetadataFilter>) -> usize {
        self.index.read().await.count(filter)
    }

    /// Look up a chunk by id
    pub async fn get(&self, id: &str) -> Option<VectorDocument> {
        self.index.read().await.get(id).cloned()
    }

    /// Remove a chunk by id
    pub async fn delete(&self, id: &str) -> bool {
        self.index.write().await.delete(id)
    }

    /// Remove every chunk matching `filter` (`None` removes everything)
    pub async fn forget(&self, filter: Option<&MetadataFilter>) -> usize {
        let removed = self.index.write().await.delete_by_filter(filter);
        info!("Forgot {removed} chunks");
        removed
    }

    /// Write the index to the configured store path
    ///
    /// # Errors
    /// Returns an encoding or I/O error; the previous snapshot survives a failure
    pub async fn persist_all(&self) -> Result<()> {
        let path = self.config.storage.store_path();
        let (bytes, count) = {
            let index = self.index.read().await;
            (index.to_snapshot_bytes()?, index.len())
        };

        let target = path.clone();
        spawn_blocking(move || write_snapshot_file(&target, &bytes))
            .await
            .map_err(|error| Error::Other(format!("Task join error: {error}")))??;

        info!("Persisted {count} chunks to {}", path.display());
        Ok(())
    }

    /// Replace the index with the snapshot at the configured store path
    ///
    /// A missing snapshot leaves the index as it is.
    ///
    /// # Errors
    /// Returns [`Error::CorruptedStore`] or [`Error::DimensionMismatch`] for
    /// unusable snapshots; the index is unchanged in that case
    pub async fn load_all(&self) -> Result<usize> {
        let path = self.config.storage.store_path();
        let Some(documents) = Self::read_file(path.clone()).await? else {
            info!("No vector store at {}, starting empty", path.display());
            return Ok(0);
        };

        let loaded = self.index.write().await.replace_all(documents)?;
        info!("Loaded {loaded} chunks from {}", path.display());
        Ok(loaded)
    }

    /// Merge the configured seed snapshot into the index
    ///
    /// Seed documents never replace documents already present.
    ///
    /// # Errors
    /// Returns [`Error::CorruptedStore`] or [`Error::DimensionMismatch`] for
    /// an unusable seed; nothing is added in that case
    pub async fn load_seed_data(&self) -> Result<MergeReport> {
        let Some(seed_path) = self.config.storage.seed_path.clone() else {
            return Ok(MergeReport::default());
        };
        let Some(documents) = Self::read_file(seed_path.clone()).await? else {
            info!("No seed data at {}", seed_path.display());
            return Ok(MergeReport::default());
        };

        let report = self.index.write().await.merge(documents)?;
        log_merge(&seed_path, report);
        Ok(report)
    }

    /// Merge a snapshot stream (for example bundled seed bytes) into the index
    ///
    /// The stream is decoded on the blocking pool, so file-backed readers are fine.
    ///
    /// # Errors
    /// Returns [`Error::CorruptedStore`] or [`Error::DimensionMismatch`] for
    /// an unusable snapshot; nothing is added in that case
    pub async fn load_seed_from_reader<R: Read + Send + 'static>(
        &self,
        mut reader: R,
    ) -> Result<MergeReport> {
        let documents = spawn_blocking(move || read_snapshot(&mut reader))
            .await
            .map_err(|error| Error::Other(format!("Task join error: {error}")))??;
        let report = self.index.write().await.merge(documents)?;
        log_merge(Path::new("<reader>"), report);
        Ok(report)
    }

    /// Whether the embedding provider is reachable
    pub async fn is_healthy(&self) -> bool {
        self.provider.is_healthy().await
    }

    async fn read_file(path: PathBuf) -> Result<Option<Vec<VectorDocument>>> {
        spawn_blocking(move || read_snapshot_file(&path))
            .await
            .map_err(|error| Error::Other(format!("Task join error: {error}")))?
    }
}

fn log_merge(source: &Path, report: MergeReport) {
    info!(
        "Merged seed data from {}: {} added, {} skipped",
        source.display(),
        report.added,
        report.skipped
    );
}

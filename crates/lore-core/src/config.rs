//! Immutable configuration shared by every retrieval component.

use core::result::Result as CoreResult;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{Error, Result};

/// Complete retrieval configuration.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Embedding provider settings
    pub embedding: EmbeddingConfig,
    /// Chunking settings
    pub chunking: ChunkingConfig,
    /// Query defaults
    pub query: QueryConfig,
    /// On-disk locations
    pub storage: StorageConfig,
}

/// Embedding provider configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Base URL of the Ollama server
    pub base_url: String,
    /// Embedding model name
    pub model: String,
    /// Length of every embedding vector
    pub dimension: usize,
    /// Timeout for single embedding requests in seconds
    pub embed_timeout_secs: u64,
    /// Timeout for batch embedding requests in seconds
    pub batch_timeout_secs: u64,
    /// Timeout for the health probe in seconds
    pub health_timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_owned(),
            model: "nomic-embed-text".to_owned(),
            dimension: 768,
            embed_timeout_secs: 30,
            batch_timeout_secs: 60,
            health_timeout_secs: 2,
        }
    }
}

impl EmbeddingConfig {
    /// Timeout applied to single embedding requests.
    pub const fn embed_timeout(&self) -> Duration {
        Duration::from_secs(self.embed_timeout_secs)
    }

    /// Timeout applied to batch embedding requests.
    pub const fn batch_timeout(&self) -> Duration {
        Duration::from_secs(self.batch_timeout_secs)
    }

    /// Timeout applied to the health probe.
    pub const fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_secs)
    }
}

/// Chunking configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters
    pub chunk_size: usize,
    /// Characters shared between consecutive text chunks
    pub chunk_overlap: usize,
    /// Line prefix of the party that opens an exchange
    pub first_speaker: String,
    /// Line prefix of the party that answers
    pub second_speaker: String,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            chunk_overlap: 64,
            first_speaker: "Player".to_owned(),
            second_speaker: "Villager".to_owned(),
        }
    }
}

/// Query defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Result count used when the caller has no preference
    pub default_top_k: usize,
    /// Minimum relevance score for a hit (0.0-1.0)
    pub default_min_score: f32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_top_k: 5,
            default_min_score: 0.5,
        }
    }
}

/// On-disk locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the live snapshot
    pub data_directory: PathBuf,
    /// File name of the live snapshot
    pub store_file: String,
    /// Bundled read-only seed snapshot; an empty path in TOML disables seeding
    #[serde(with = "optional_path")]
    pub seed_path: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_directory: PathBuf::from("lore/vectorstore"),
            store_file: "vectors.store".to_owned(),
            seed_path: Some(PathBuf::from("lore/seed/documents.store")),
        }
    }
}

/// `None` is written as an empty string so it is not replaced by the default
/// path when the file is read back.
mod optional_path {
    use super::{CoreResult, Deserialize as _, Deserializer, PathBuf, Serialize as _, Serializer};

    #[allow(clippy::ref_option, reason = "Signature required by serde's `with`")]
    pub fn serialize<S: Serializer>(
        path: &Option<PathBuf>,
        serializer: S,
    ) -> CoreResult<S::Ok, S::Error> {
        match path {
            Some(seed) => seed.serialize(serializer),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> CoreResult<Option<PathBuf>, D::Error> {
        let path = PathBuf::deserialize(deserializer)?;
        Ok((!path.as_os_str().is_empty()).then_some(path))
    }
}

impl StorageConfig {
    /// Full path of the live snapshot.
    pub fn store_path(&self) -> PathBuf {
        self.data_directory.join(&self.store_file)
    }
}

impl RetrievalConfig {
    /// Default configuration with environment overrides applied.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply `OLLAMA_HOST`, `EMBEDDING_MODEL` and `LORE_DATA_DIR` when set.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(host) = env::var("OLLAMA_HOST") {
            self.embedding.base_url = host;
        }
        if let Ok(model) = env::var("EMBEDDING_MODEL") {
            self.embedding.model = model;
        }
        if let Ok(directory) = env::var("LORE_DATA_DIR") {
            self.storage.data_directory = PathBuf::from(directory);
        }
        self
    }

    /// Load config from a specific file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed or fails validation
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;

        tracing::debug!(
            "Loaded retrieval config from {}: model={}, chunk_size={}",
            path.display(),
            config.embedding.model,
            config.chunking.chunk_size
        );

        Ok(config)
    }

    /// Save config to a specific file
    ///
    /// # Errors
    /// Returns an error if the file cannot be serialized or written
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)
            .map_err(|error| Error::Config(format!("Failed to serialize config: {error}")))?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Reject settings the chunkers and the index cannot work with.
    ///
    /// # Errors
    /// Returns [`Error::Config`] describing the first invalid setting
    pub fn validate(&self) -> Result<()> {
        if self.embedding.dimension == 0 {
            return Err(Error::Config("embedding.dimension must be positive".to_owned()));
        }
        if self.chunking.chunk_size == 0 {
            return Err(Error::Config("chunking.chunk_size must be positive".to_owned()));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(Error::Config(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.chunking.first_speaker.is_empty()
            || self.chunking.first_speaker == self.chunking.second_speaker
        {
            return Err(Error::Config(
                "speaker labels must be non-empty and distinct".to_owned(),
            ));
        }
        if !(0.0..=1.0).contains(&self.query.default_min_score) {
            return Err(Error::Config(format!(
                "query.default_min_score ({}) must be within 0.0-1.0",
                self.query.default_min_score
            )));
        }
        Ok(())
    }
}

//! Shared fixtures for the integration tests.

use lore_context::EmbeddingProvider;
use lore_core::{Result, RetrievalConfig, StorageConfig};
use std::path::Path;

/// Keyword axes plus one catch-all axis
pub const DIMENSION: usize = 6;

const KEYWORDS: [&str; 5] = ["golem", "emerald", "bread", "hello", "dragon"];

/// Provider that places each keyword on its own axis, so relevance is
/// predictable: texts sharing a keyword score 1.0, unrelated texts 0.5.
pub struct KeywordProvider;

impl KeywordProvider {
    pub fn vector(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let mut vector: Vec<f32> = KEYWORDS
            .iter()
            .map(|keyword| lower.matches(keyword).count() as f32)
            .collect();
        let unmatched = vector.iter().all(|value| *value == 0.0);
        vector.push(if unmatched { 1.0 } else { 0.0 });
        vector
    }
}

impl EmbeddingProvider for KeywordProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(Self::vector(text))
    }

    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| Self::vector(text)).collect())
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }

    async fn is_healthy(&self) -> bool {
        true
    }
}

/// Configuration rooted in `root` that drops orthogonal matches
pub fn test_config(root: &Path) -> RetrievalConfig {
    let mut config = RetrievalConfig::default();
    config.embedding.dimension = DIMENSION;
    config.query.default_min_score = 0.6;
    config.storage = StorageConfig {
        data_directory: root.join("vectorstore"),
        store_file: "vectors.store".to_owned(),
        seed_path: Some(root.join("seed/documents.store")),
    };
    config
}

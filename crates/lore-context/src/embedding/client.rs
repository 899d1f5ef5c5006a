//! Embedding generation through Ollama.

use lore_core::{EmbeddingConfig, Error, Result};
use ollama_rs::Ollama;
use ollama_rs::generation::embeddings::request::GenerateEmbeddingsRequest;
use reqwest::Url;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

/// A single embedding vector
pub type Embedding = Vec<f32>;

/// Trait for generating embeddings from text
///
/// Implementations never retry; a failed call surfaces as
/// [`Error::Provider`] and the caller decides what to do with it.
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embedding for text
    ///
    /// # Errors
    /// Returns an error if the provider is unreachable or rejects the request
    fn embed(&self, text: &str) -> impl Future<Output = Result<Embedding>> + Send;

    /// Embed multiple texts in one request, preserving input order
    ///
    /// # Errors
    /// Returns an error if the provider is unreachable or rejects the request
    fn embed_batch(
        &self,
        texts: Vec<String>,
    ) -> impl Future<Output = Result<Vec<Embedding>>> + Send;

    /// Length of every vector this provider returns
    fn dimension(&self) -> usize;

    /// Best-effort reachability probe; `false` on any failure
    fn is_healthy(&self) -> impl Future<Output = bool> + Send;
}

/// Ollama embedding client (`/api/embed`, health via `/api/tags`)
#[derive(Clone)]
pub struct OllamaEmbeddingClient {
    ollama: Ollama,
    model: String,
    dimension: usize,
    embed_timeout: Duration,
    batch_timeout: Duration,
    health_timeout: Duration,
}

impl OllamaEmbeddingClient {
    /// Create a client for the server and model named in `config`
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the base URL cannot be parsed
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        // `OLLAMA_HOST` is commonly given as a bare `host:port`
        let has_scheme = config.base_url.contains("://");
        let base_url = if has_scheme {
            config.base_url.clone()
        } else {
            format!("http://{}", config.base_url)
        };
        let url = Url::parse(&base_url).map_err(|error| {
            Error::Config(format!("Invalid Ollama URL '{}': {error}", config.base_url))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "Ollama URL '{}' must use http or https",
                config.base_url
            )));
        }
        let host = url
            .host()
            .ok_or_else(|| Error::Config(format!("Ollama URL '{}' has no host", config.base_url)))?;
        let port = match url.port() {
            Some(port) => port,
            None if has_scheme => url.port_or_known_default().unwrap_or(11434),
            None => 11434,
        };
        let ollama = Ollama::builder()
            .host(format!("{}://{host}", url.scheme()))
            .port(port)
            .build();

        Ok(Self {
            ollama,
            model: config.model.clone(),
            dimension: config.dimension,
            embed_timeout: config.embed_timeout(),
            batch_timeout: config.batch_timeout(),
            health_timeout: config.health_timeout(),
        })
    }

    /// Name of the embedding model
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send one `/api/embed` request and return every vector in the response
    async fn request_embeddings(
        &self,
        request: GenerateEmbeddingsRequest,
        limit: Duration,
    ) -> Result<Vec<Embedding>> {
        let response = timeout(limit, self.ollama.generate_embeddings(request))
            .await
            .map_err(|_elapsed| {
                Error::Provider(format!(
                    "Embedding request to model '{}' timed out after {}s",
                    self.model,
                    limit.as_secs()
                ))
            })?
            .map_err(|error| {
                let error_str = format!("{error:?}");
                if error_str.contains("model") && error_str.contains("not found") {
                    Error::Provider(format!(
                        "Embedding model '{}' not found. Run: ollama pull {}",
                        self.model, self.model
                    ))
                } else {
                    Error::Provider(format!("Embedding generation failed: {error}"))
                }
            })?;

        Ok(response.embeddings)
    }
}

impl EmbeddingProvider for OllamaEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        let request = GenerateEmbeddingsRequest::new(self.model.clone(), text.to_owned().into());

        self.request_embeddings(request, self.embed_timeout)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Provider("No embeddings returned".into()))
    }

    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::default());
        }

        let expected = texts.len();
        let request = GenerateEmbeddingsRequest::new(self.model.clone(), texts.into());
        let embeddings = self.request_embeddings(request, self.batch_timeout).await?;

        if embeddings.len() != expected {
            return Err(Error::Provider(format!(
                "Batch embedding returned {} vectors for {expected} inputs",
                embeddings.len()
            )));
        }
        tracing::debug!("Embedded batch of {expected} texts with '{}'", self.model);

        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn is_healthy(&self) -> bool {
        matches!(
            timeout(self.health_timeout, self.ollama.list_local_models()).await,
            Ok(Ok(_))
        )
    }
}

/// Test-only fake embedding provider (deterministic, bag-of-words hashing)
///
/// Texts sharing words get similar vectors, so ranking behaves sensibly
/// without an Ollama server.
#[cfg(test)]
pub struct FakeEmbeddingClient {
    dimension: usize,
}

#[cfg(test)]
impl FakeEmbeddingClient {
    /// Fake provider producing vectors of `dimension` components
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    /// Generate fake deterministic embedding for testing
    pub fn fake_embedding(&self, text: &str) -> Embedding {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash as _, Hasher as _};

        let mut vec = vec![0.0; self.dimension];
        for word in text
            .split(|character: char| !character.is_alphanumeric())
            .filter(|word| !word.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            let bucket = (hasher.finish() % self.dimension as u64) as usize;
            vec[bucket] += 1.0;
        }
        vec
    }
}

#[cfg(test)]
impl EmbeddingProvider for FakeEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        Ok(self.fake_embedding(text))
    }

    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Embedding>> {
        Ok(texts.iter().map(|text| self.fake_embedding(text)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn is_healthy(&self) -> bool {
        true
    }
}

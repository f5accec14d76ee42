//! EmbeddingGateway — cache-fronted access to the embedder.

use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;

use tmws_core::constants::EMBEDDING_CACHE_ENTRIES;
use tmws_core::errors::{TmwsError, TmwsResult};
use tmws_core::traits::IEmbeddingProvider;

/// Provider batches are capped at this many inputs.
const BATCH_LIMIT: usize = 32;

/// The only component that holds the embedder. Callers get cached vectors
/// keyed by blake3 content hash; misses go to the provider, batched.
pub struct EmbeddingGateway {
    provider: Box<dyn IEmbeddingProvider>,
    cache: Cache<String, Arc<Vec<f32>>>,
    dimensions: usize,
}

impl EmbeddingGateway {
    pub fn new(provider: Box<dyn IEmbeddingProvider>) -> Self {
        let dimensions = provider.dimensions();
        let cache = Cache::builder()
            .max_capacity(EMBEDDING_CACHE_ENTRIES)
            .time_to_idle(Duration::from_secs(3600))
            .build();

        tracing::info!(
            provider = provider.name(),
            dims = dimensions,
            "embedding gateway initialized"
        );
        Self { provider, cache, dimensions }
    }

    /// Embed one text. Cache hit returns immediately; a miss consults the
    /// provider. An unavailable embedder is `ErrEmbedder` — the caller
    /// decides whether to reject or degrade.
    pub fn embed(&self, text: &str) -> TmwsResult<Vec<f32>> {
        let key = blake3::hash(text.as_bytes()).to_hex().to_string();
        if let Some(cached) = self.cache.get(&key) {
            tracing::debug!(hash = %key, "embedding cache hit");
            return Ok(cached.as_ref().clone());
        }

        if !self.provider.is_available() {
            return Err(TmwsError::Embedder {
                reason: format!("provider {} is unavailable", self.provider.name()),
            });
        }

        let vector = self.provider.embed(text)?;
        self.check_dimensions(&vector)?;
        self.cache.insert(key, Arc::new(vector.clone()));
        Ok(vector)
    }

    /// Embed many texts, reusing cached vectors and batching the misses
    /// through the provider at most `BATCH_LIMIT` at a time.
    pub fn embed_batch(&self, texts: &[String]) -> TmwsResult<Vec<Vec<f32>>> {
        let keys: Vec<String> = texts
            .iter()
            .map(|t| blake3::hash(t.as_bytes()).to_hex().to_string())
            .collect();

        let mut results: Vec<Option<Vec<f32>>> = keys
            .iter()
            .map(|k| self.cache.get(k).map(|v| v.as_ref().clone()))
            .collect();

        let misses: Vec<usize> = (0..texts.len()).filter(|&i| results[i].is_none()).collect();
        if !misses.is_empty() {
            if !self.provider.is_available() {
                return Err(TmwsError::Embedder {
                    reason: format!("provider {} is unavailable", self.provider.name()),
                });
            }
            for chunk in misses.chunks(BATCH_LIMIT) {
                let inputs: Vec<String> = chunk.iter().map(|&i| texts[i].clone()).collect();
                let vectors = self.provider.embed_batch(&inputs)?;
                if vectors.len() != inputs.len() {
                    return Err(TmwsError::Embedder {
                        reason: "provider returned a short batch".to_string(),
                    });
                }
                for (&i, vector) in chunk.iter().zip(vectors) {
                    self.check_dimensions(&vector)?;
                    self.cache.insert(keys[i].clone(), Arc::new(vector.clone()));
                    results[i] = Some(vector);
                }
            }
        }

        Ok(results.into_iter().map(|v| v.unwrap_or_default()).collect())
    }

    /// The deterministic degradation vector: all zeros. Searching with it
    /// matches nothing, which is the safe floor when the embedder is down.
    pub fn zero_vector(&self) -> Vec<f32> {
        vec![0.0; self.dimensions]
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    fn check_dimensions(&self, vector: &[f32]) -> TmwsResult<()> {
        if vector.len() != self.dimensions {
            return Err(TmwsError::Embedder {
                reason: format!(
                    "provider returned {} dims, expected {}",
                    vector.len(),
                    self.dimensions
                ),
            });
        }
        Ok(())
    }
}

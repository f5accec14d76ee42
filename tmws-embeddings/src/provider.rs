//! Deterministic hashed-term embedding provider.
//!
//! Buckets terms into a fixed-dimension vector by keyed blake3 hash and
//! weights by sublinear term frequency. No model download, no network —
//! always available, which makes it the default provider and the test
//! workhorse. Real deployments swap in a neural provider behind the same
//! trait.

use std::collections::HashMap;

use tmws_core::errors::TmwsResult;
use tmws_core::traits::IEmbeddingProvider;

/// Hashed-term embedding provider.
///
/// Produces deterministic dense vectors: terms hash into buckets, bucket
/// weights are `(1 + ln(tf)) * (1 + sqrt(len))`, and the result is L2
/// normalised. Texts sharing terms land near each other under cosine.
pub struct HashedTermProvider {
    dimensions: usize,
}

impl HashedTermProvider {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    /// Bucket index for a term, via keyed blake3 so bucket assignment is
    /// stable across processes.
    fn bucket(term: &str, dims: usize) -> usize {
        let digest = blake3::hash(term.as_bytes());
        let bytes = digest.as_bytes();
        let h = u64::from_le_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ]);
        (h % dims as u64) as usize
    }

    /// Lowercase alphanumeric terms, minimum two characters.
    fn terms(text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|s| s.len() >= 2)
            .map(|s| s.to_lowercase())
            .collect()
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let terms = Self::terms(text);
        if terms.is_empty() {
            return vec![0.0; self.dimensions];
        }

        let mut counts: HashMap<&str, f32> = HashMap::new();
        for term in &terms {
            *counts.entry(term.as_str()).or_default() += 1.0;
        }

        let mut vec = vec![0.0f32; self.dimensions];
        for (term, count) in &counts {
            let tf = 1.0 + count.ln();
            let weight = tf * (1.0 + (term.len() as f32).sqrt());
            vec[Self::bucket(term, self.dimensions)] += weight;
        }

        let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in &mut vec {
                *v /= norm;
            }
        }
        vec
    }
}

impl IEmbeddingProvider for HashedTermProvider {
    fn embed(&self, text: &str) -> TmwsResult<Vec<f32>> {
        Ok(self.vectorize(text))
    }

    fn embed_batch(&self, texts: &[String]) -> TmwsResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "hashed-term-v1"
    }

    fn is_available(&self) -> bool {
        true
    }
}

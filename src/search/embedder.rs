//! Embedding provider seam.
//!
//! The embedding model is an external collaborator: anything that maps text
//! to a fixed-length real vector and is deterministic for identical text can
//! implement [`Embedder`]. The crate ships [`HashEmbedder`], an FNV-1a
//! feature-hashing implementation that needs no model files, as the
//! always-available default.

use thiserror::Error;

/// Errors from an embedding backend or its cache.
#[derive(Debug, Error)]
pub enum EmbedderError {
    #[error("embedding backend failed: {0}")]
    Backend(String),
    #[error("embedding cache error: {0}")]
    Cache(#[from] rusqlite::Error),
}

/// Maps text to a fixed-size dense vector.
///
/// Implementations must be deterministic: identical text yields a
/// bit-identical vector. No normalization is applied here; similarity
/// callers L2-normalize (see [`crate::search::semantic`]).
pub trait Embedder: Send + Sync {
    /// Stable identifier, recorded in persisted indexes and cache rows.
    fn id(&self) -> &str;

    /// Output dimension, fixed for the lifetime of the embedder.
    fn dimension(&self) -> usize;

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError>;
}

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x100_0000_01b3;

/// FNV-1a over a byte slice.
pub fn fnv1a64(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Deterministic feature-hashing embedder.
///
/// Lowercased alphanumeric tokens (and adjacent-token pairs, so word order
/// contributes) are hashed into signed buckets. Quality is far below an ML
/// model, but the contract is identical and it works offline.
pub struct HashEmbedder {
    id: String,
    dimension: usize,
}

impl HashEmbedder {
    pub const DEFAULT_DIMENSION: usize = 384;

    pub fn new(dimension: usize) -> Self {
        Self {
            id: format!("fnv1a-{dimension}"),
            dimension,
        }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIMENSION)
    }
}

impl Embedder for HashEmbedder {
    fn id(&self) -> &str {
        &self.id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        let mut vector = vec![0.0f32; self.dimension];
        let lowered = text.to_lowercase();
        let tokens: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();

        for token in &tokens {
            bump(&mut vector, token.as_bytes());
        }
        for pair in tokens.windows(2) {
            let feature = format!("{} {}", pair[0], pair[1]);
            bump(&mut vector, feature.as_bytes());
        }
        Ok(vector)
    }
}

fn bump(vector: &mut [f32], feature: &[u8]) {
    let hash = fnv1a64(feature);
    let bucket = (hash % vector.len() as u64) as usize;
    // High bit decides the sign so collisions cancel rather than pile up.
    let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
    vector[bucket] += sign;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text_yields_identical_vectors() {
        let embedder = HashEmbedder::default();
        let a = embedder.embed("which funds have the best sharpe ratio").unwrap();
        let b = embedder.embed("which funds have the best sharpe ratio").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), HashEmbedder::DEFAULT_DIMENSION);
    }

    #[test]
    fn different_text_differs() {
        let embedder = HashEmbedder::new(64);
        let a = embedder.embed("sharpe ratio").unwrap();
        let b = embedder.embed("index fund basics").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn word_order_contributes() {
        let embedder = HashEmbedder::new(64);
        let a = embedder.embed("low risk fund").unwrap();
        let b = embedder.embed("fund risk low").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn empty_text_is_a_zero_vector() {
        let embedder = HashEmbedder::new(16);
        let v = embedder.embed("").unwrap();
        assert!(v.iter().all(|&x| x == 0.0));
    }
}

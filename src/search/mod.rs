//! Retrieval layer facade.
//!
//! - **[`embedder`]**: `Embedder` trait plus the FNV-1a feature-hash
//!   embedder (deterministic, no model files).
//! - **[`embed_cache`]**: persistent SQLite-backed embedding cache.
//! - **[`lexical`]**: BM25 keyword index over the whole corpus.
//! - **[`vector_index`]**: flat inner-product index with FVIX file
//!   persistence.
//! - **[`semantic`]**: dense retrieval built on the vector index.
//! - **[`numeric`]**: rule-based numeric intent analysis over fund metrics.
//! - **[`hybrid`]**: mode dispatch and score fusion; the caller-facing
//!   entry point.

pub mod embed_cache;
pub mod embedder;
pub mod hybrid;
pub mod lexical;
pub mod numeric;
pub mod semantic;
pub mod vector_index;

/// A corpus position paired with a strategy-local score.
///
/// Strategies exchange positions rather than documents; the fusion layer
/// resolves positions back to documents through the corpus store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredPosition {
    pub position: usize,
    pub score: f32,
}

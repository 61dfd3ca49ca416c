//! Dense semantic retrieval.
//!
//! Every corpus document is embedded once at startup, L2-normalized, and
//! stored in a flat inner-product index, so scores are cosine similarities.
//! The built index can be persisted; a missing, corrupted, or stale file
//! falls back to a full rebuild rather than failing startup.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use super::ScoredPosition;
use super::embedder::{Embedder, fnv1a64};
use super::vector_index::{VectorEntry, VectorIndex};
use crate::corpus::CorpusStore;

pub struct SemanticIndex {
    corpus: Arc<CorpusStore>,
    embedder: Arc<dyn Embedder>,
    index: VectorIndex,
}

impl SemanticIndex {
    /// Load the persisted index if it matches the corpus and embedder,
    /// otherwise rebuild (and best-effort re-save when a path is given).
    ///
    /// This is the one-time blocking startup cost; queries afterwards only
    /// read the immutable index.
    pub fn open(
        corpus: Arc<CorpusStore>,
        embedder: Arc<dyn Embedder>,
        cache_path: Option<&Path>,
    ) -> Result<Self> {
        if let Some(path) = cache_path {
            match VectorIndex::load(path) {
                Ok(index) if index_matches(&index, &corpus, embedder.as_ref()) => {
                    info!(
                        path = %path.display(),
                        rows = index.len(),
                        "loaded persisted vector index"
                    );
                    return Ok(Self {
                        corpus,
                        embedder,
                        index,
                    });
                }
                Ok(_) => {
                    warn!(
                        path = %path.display(),
                        "persisted vector index does not match corpus; rebuilding"
                    );
                }
                Err(e) => {
                    // Missing file on first run lands here too.
                    debug!(path = %path.display(), error = %e, "vector index load failed; rebuilding");
                }
            }
        }

        let index = build_index(&corpus, embedder.as_ref())?;
        if let Some(path) = cache_path {
            if let Err(e) = index.save(path) {
                warn!(path = %path.display(), error = %e, "failed to persist vector index");
            }
        }
        Ok(Self {
            corpus,
            embedder,
            index,
        })
    }

    /// `k` nearest documents by cosine similarity.
    ///
    /// Scores are raw inner products in [-1, 1]. Rows that no longer map
    /// to a corpus position are filtered out silently.
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredPosition>> {
        let mut vector = self
            .embedder
            .embed(query)
            .context("embed query for semantic search")?;
        l2_normalize(&mut vector);
        let hits = self.index.search(&vector, k);
        Ok(hits
            .into_iter()
            .filter(|h| h.position < self.corpus.len())
            .collect())
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

/// Embed and normalize the whole corpus.
fn build_index(corpus: &CorpusStore, embedder: &dyn Embedder) -> Result<VectorIndex> {
    let mut entries = Vec::with_capacity(corpus.len());
    for doc in corpus.docs() {
        let mut vector = embedder
            .embed(&doc.text)
            .with_context(|| format!("embed corpus document {}", doc.id))?;
        l2_normalize(&mut vector);
        entries.push(VectorEntry {
            position: u32::try_from(doc.position).context("corpus position out of range")?,
            id_hash: fnv1a64(doc.id.as_bytes()),
            vector,
        });
    }
    let index = VectorIndex::build(embedder.id(), embedder.dimension(), entries)?;
    info!(rows = index.len(), dimension = index.dimension(), "vector index built");
    Ok(index)
}

/// A persisted index is only reusable when embedder, dimension, and the
/// full id sequence still line up with the live corpus.
fn index_matches(index: &VectorIndex, corpus: &CorpusStore, embedder: &dyn Embedder) -> bool {
    if index.embedder_id() != embedder.id()
        || index.dimension() != embedder.dimension()
        || index.len() != corpus.len()
    {
        return false;
    }
    index
        .id_hashes()
        .iter()
        .zip(corpus.docs())
        .all(|(&hash, doc)| hash == fnv1a64(doc.id.as_bytes()))
}

/// In-place L2 normalization; zero vectors are left untouched so empty
/// queries score 0 everywhere instead of producing NaNs.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::loader::{FaqRecord, FundRecord};
    use crate::model::types::FundMetrics;
    use crate::search::embedder::HashEmbedder;
    use tempfile::TempDir;

    fn corpus() -> Arc<CorpusStore> {
        let faqs = vec![
            FaqRecord {
                question: "What is a Sharpe ratio?".into(),
                answer: "It measures risk-adjusted return.".into(),
            },
            FaqRecord {
                question: "What is an index fund?".into(),
                answer: "A fund tracking a market index.".into(),
            },
        ];
        let funds = vec![FundRecord {
            fund_id: "F007".into(),
            fund_name: "Parag Parikh Flexi Cap".into(),
            category: "Equity".into(),
            metrics: FundMetrics {
                sharpe_ratio: Some(1.25),
                cagr_3y: Some(14.2),
                volatility: Some(10.5),
            },
        }];
        Arc::new(CorpusStore::build(faqs, funds).unwrap())
    }

    fn embedder() -> Arc<dyn Embedder> {
        Arc::new(HashEmbedder::new(64))
    }

    #[test]
    fn own_text_is_top_one_with_unit_similarity() {
        let corpus = corpus();
        let index = SemanticIndex::open(corpus.clone(), embedder(), None).unwrap();
        let text = corpus.get(0).unwrap().text.clone();
        let hits = index.search(&text, 3).unwrap();
        assert_eq!(hits[0].position, 0);
        assert!((hits[0].score - 1.0).abs() < 1e-5);
    }

    #[test]
    fn persisted_index_is_reused() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vector_index.fvix");
        {
            let index = SemanticIndex::open(corpus(), embedder(), Some(&path)).unwrap();
            assert_eq!(index.len(), 3);
        }
        assert!(path.exists());
        let index = SemanticIndex::open(corpus(), embedder(), Some(&path)).unwrap();
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn corrupt_cache_falls_back_to_rebuild() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vector_index.fvix");
        std::fs::write(&path, b"not an index at all").unwrap();

        let index = SemanticIndex::open(corpus(), embedder(), Some(&path)).unwrap();
        assert_eq!(index.len(), 3);
        // The rebuild also repaired the file on disk.
        assert!(VectorIndex::load(&path).is_ok());
    }

    #[test]
    fn stale_embedder_triggers_rebuild() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vector_index.fvix");
        SemanticIndex::open(corpus(), Arc::new(HashEmbedder::new(32)), Some(&path)).unwrap();

        // Same file, different embedder dimension: must rebuild, not reuse.
        let index =
            SemanticIndex::open(corpus(), Arc::new(HashEmbedder::new(64)), Some(&path)).unwrap();
        let hits = index
            .search("What is a Sharpe ratio?\nIt measures risk-adjusted return.", 1)
            .unwrap();
        assert_eq!(hits[0].position, 0);
    }

    #[test]
    fn empty_query_returns_zero_scores_not_nan() {
        let index = SemanticIndex::open(corpus(), embedder(), None).unwrap();
        let hits = index.search("", 2).unwrap();
        assert!(hits.iter().all(|h| h.score == 0.0));
    }
}

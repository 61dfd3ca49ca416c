//! Fusion controller: the caller-facing retrieval entry point.
//!
//! Dispatches a query to one, two, or three strategies depending on the
//! requested mode, then merges heterogeneous scores into one ranked list.
//! Holds no mutable state between requests; every intermediate structure is
//! request-local.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, warn};

use super::ScoredPosition;
use super::lexical::LexicalIndex;
use super::numeric::{self, NumericRetriever};
use super::semantic::SemanticIndex;
use crate::config::SearchConfig;
use crate::corpus::CorpusStore;
use crate::model::types::{DocKind, RetrievalResult, StrategyBreakdown};

/// Retrieval strategy requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    Lexical,
    Semantic,
    #[default]
    Hybrid,
}

impl FromStr for SearchMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lexical" => Ok(SearchMode::Lexical),
            "semantic" => Ok(SearchMode::Semantic),
            "hybrid" => Ok(SearchMode::Hybrid),
            other => Err(anyhow::anyhow!(
                "unknown mode \"{other}\" (expected lexical, semantic, or hybrid)"
            )),
        }
    }
}

impl std::fmt::Display for SearchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SearchMode::Lexical => "lexical",
            SearchMode::Semantic => "semantic",
            SearchMode::Hybrid => "hybrid",
        };
        f.write_str(s)
    }
}

pub struct HybridRetriever {
    corpus: Arc<CorpusStore>,
    lexical: LexicalIndex,
    semantic: SemanticIndex,
    numeric: NumericRetriever,
    config: SearchConfig,
}

impl HybridRetriever {
    pub fn new(
        corpus: Arc<CorpusStore>,
        lexical: LexicalIndex,
        semantic: SemanticIndex,
        numeric: NumericRetriever,
        config: SearchConfig,
    ) -> Self {
        Self {
            corpus,
            lexical,
            semantic,
            numeric,
            config,
        }
    }

    pub fn corpus(&self) -> &CorpusStore {
        &self.corpus
    }

    /// Retrieve up to `top_k` evidence documents for `query`.
    ///
    /// Never fails: a strategy error degrades to an empty contribution
    /// from that strategy (logged), and an unanswerable query yields an
    /// empty list.
    pub fn retrieve(&self, query: &str, mode: SearchMode, top_k: usize) -> Vec<RetrievalResult> {
        match mode {
            SearchMode::Lexical => {
                let hits = self.lexical.search(query, top_k);
                self.to_results(hits, |score| StrategyBreakdown {
                    lexical: score,
                    ..Default::default()
                })
            }
            SearchMode::Semantic => {
                let hits = self.semantic_hits(query, top_k);
                self.to_results(hits, |score| StrategyBreakdown {
                    semantic: score,
                    ..Default::default()
                })
            }
            SearchMode::Hybrid => self.retrieve_hybrid(query, top_k),
        }
    }

    fn retrieve_hybrid(&self, query: &str, top_k: usize) -> Vec<RetrievalResult> {
        if let Some(intent) = numeric::analyze(query, top_k) {
            let hits = self.numeric.evaluate(&intent);
            if !hits.is_empty() {
                debug!(
                    query,
                    metric = %intent.metric,
                    hits = hits.len(),
                    "numeric intent short-circuits fusion"
                );
                return self.numeric_with_faq_context(query, hits);
            }
            // A numeric query whose filter matched nothing falls through
            // to score fusion.
        }
        self.fused(query, top_k)
    }

    /// Numeric answers are fund-specific; append up to `faq_context_k`
    /// FAQ-kind semantic hits for explanatory grounding. Fund-kind
    /// semantic hits are excluded so funds are never mentioned twice.
    fn numeric_with_faq_context(
        &self,
        query: &str,
        hits: Vec<ScoredPosition>,
    ) -> Vec<RetrievalResult> {
        let mut results = self.to_results(hits, |score| StrategyBreakdown {
            numeric: score,
            ..Default::default()
        });

        let context = self.semantic_hits(query, self.config.faq_context_k);
        for hit in context {
            let Some(doc) = self.corpus.get(hit.position) else {
                continue;
            };
            if doc.kind() != DocKind::Faq {
                continue;
            }
            if results.iter().any(|r| r.id == doc.id) {
                continue;
            }
            let rank = results.len() + 1;
            results.push(
                RetrievalResult::from_document(doc, hit.score, rank).with_breakdown(
                    StrategyBreakdown {
                        semantic: hit.score,
                        ..Default::default()
                    },
                ),
            );
        }
        results
    }

    /// Weighted score fusion over the lexical and semantic candidates.
    fn fused(&self, query: &str, top_k: usize) -> Vec<RetrievalResult> {
        let lexical = self.lexical.search(query, self.config.top_k_lexical);
        let semantic = self.semantic_hits(query, self.config.top_k_semantic);

        #[derive(Default, Clone, Copy)]
        struct Candidate {
            lexical: f32,
            semantic: f32,
        }

        let mut candidates: HashMap<usize, Candidate> = HashMap::new();
        for hit in &lexical {
            candidates.entry(hit.position).or_default().lexical = hit.score;
        }
        for hit in &semantic {
            candidates.entry(hit.position).or_default().semantic = hit.score;
        }

        let lex_norm = normalization_factor(lexical.iter().map(|h| h.score));
        let sem_norm = normalization_factor(semantic.iter().map(|h| h.score));
        let alpha = self.config.alpha;

        let mut fused: Vec<(usize, f32, Candidate)> = candidates
            .into_iter()
            .map(|(position, c)| {
                let score =
                    (1.0 - alpha) * (c.lexical / lex_norm) + alpha * (c.semantic / sem_norm);
                (position, score, c)
            })
            .collect();
        // Descending fused score; ascending document id keeps ties
        // deterministic.
        fused.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    let id_a = self.corpus.get(a.0).map(|d| d.id.as_str()).unwrap_or("");
                    let id_b = self.corpus.get(b.0).map(|d| d.id.as_str()).unwrap_or("");
                    id_a.cmp(id_b)
                })
        });

        fused
            .into_iter()
            .take(top_k)
            .enumerate()
            .filter_map(|(i, (position, score, c))| {
                let doc = self.corpus.get(position)?;
                Some(
                    RetrievalResult::from_document(doc, score, i + 1).with_breakdown(
                        StrategyBreakdown {
                            lexical: c.lexical,
                            semantic: c.semantic,
                            ..Default::default()
                        },
                    ),
                )
            })
            .collect()
    }

    /// Semantic search with per-strategy failure isolation: an embedding
    /// or index error contributes an empty candidate set instead of
    /// aborting the request.
    fn semantic_hits(&self, query: &str, k: usize) -> Vec<ScoredPosition> {
        match self.semantic.search(query, k) {
            Ok(hits) => hits,
            Err(e) => {
                warn!(error = %e, "semantic strategy failed; continuing without it");
                Vec::new()
            }
        }
    }

    fn to_results<F>(&self, hits: Vec<ScoredPosition>, breakdown: F) -> Vec<RetrievalResult>
    where
        F: Fn(f32) -> StrategyBreakdown,
    {
        hits.into_iter()
            .filter_map(|hit| self.corpus.get(hit.position).map(|doc| (doc, hit.score)))
            .enumerate()
            .map(|(i, (doc, score))| {
                RetrievalResult::from_document(doc, score, i + 1).with_breakdown(breakdown(score))
            })
            .collect()
    }
}

/// Max-score normalization factor with the divide-by-zero guard: an empty
/// batch or an all-zero maximum normalizes with 1.0, yielding 0.0 scores.
fn normalization_factor(scores: impl Iterator<Item = f32>) -> f32 {
    let max = scores.fold(0.0f32, f32::max);
    if max > 0.0 { max } else { 1.0 }
}

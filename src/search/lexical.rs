//! BM25 keyword index.
//!
//! Built once over the full ordered corpus and immutable afterwards.
//! Tokenization is a plain whitespace split with no stemming, stopword
//! removal, or case folding, which keeps retrieval deterministic and
//! reproducible. Every document is scored per query; ties break by
//! ascending corpus position.

use std::collections::HashMap;

use tracing::debug;

use super::ScoredPosition;
use crate::corpus::CorpusStore;

/// Okapi BM25 parameters.
const K1: f32 = 1.5;
const B: f32 = 0.75;
/// Negative IDF values are floored to `EPSILON * average_idf` so very
/// common terms still contribute a small positive weight.
const EPSILON: f32 = 0.25;

#[derive(Debug)]
pub struct LexicalIndex {
    /// Per-document term frequencies, in corpus order.
    term_freqs: Vec<HashMap<String, u32>>,
    /// Per-document token counts.
    doc_lens: Vec<f32>,
    avg_doc_len: f32,
    /// Smoothed inverse document frequency per term.
    idf: HashMap<String, f32>,
}

impl LexicalIndex {
    pub fn build(corpus: &CorpusStore) -> Self {
        let mut term_freqs = Vec::with_capacity(corpus.len());
        let mut doc_lens = Vec::with_capacity(corpus.len());
        let mut doc_freq: HashMap<String, u32> = HashMap::new();

        for doc in corpus.docs() {
            let mut freqs: HashMap<String, u32> = HashMap::new();
            let mut len = 0u32;
            for token in doc.text.split_whitespace() {
                *freqs.entry(token.to_string()).or_insert(0) += 1;
                len += 1;
            }
            for term in freqs.keys() {
                *doc_freq.entry(term.clone()).or_insert(0) += 1;
            }
            doc_lens.push(len as f32);
            term_freqs.push(freqs);
        }

        let doc_count = doc_lens.len();
        let avg_doc_len = if doc_count == 0 {
            0.0
        } else {
            doc_lens.iter().sum::<f32>() / doc_count as f32
        };
        let idf = compute_idf(&doc_freq, doc_count);

        debug!(
            documents = doc_count,
            vocabulary = idf.len(),
            avg_doc_len,
            "lexical index built"
        );
        Self {
            term_freqs,
            doc_lens,
            avg_doc_len,
            idf,
        }
    }

    /// BM25 score of every corpus document for the given query tokens.
    pub fn score_all(&self, tokens: &[&str]) -> Vec<f32> {
        let mut scores = vec![0.0f32; self.term_freqs.len()];
        for token in tokens {
            let Some(&idf) = self.idf.get(*token) else {
                continue;
            };
            for (i, freqs) in self.term_freqs.iter().enumerate() {
                let Some(&tf) = freqs.get(*token) else {
                    continue;
                };
                let tf = tf as f32;
                let norm = 1.0 - B + B * self.doc_lens[i] / self.avg_doc_len;
                scores[i] += idf * (tf * (K1 + 1.0)) / (tf + K1 * norm);
            }
        }
        scores
    }

    /// Top `k` documents by descending score, ties by ascending position.
    ///
    /// A query with no tokens returns an empty list, never an error.
    pub fn search(&self, query: &str, k: usize) -> Vec<ScoredPosition> {
        let tokens: Vec<&str> = query.split_whitespace().collect();
        if tokens.is_empty() || self.term_freqs.is_empty() || k == 0 {
            return Vec::new();
        }

        let scores = self.score_all(&tokens);
        let mut order: Vec<usize> = (0..scores.len()).collect();
        order.sort_by(|&a, &b| {
            scores[b]
                .partial_cmp(&scores[a])
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.cmp(&b))
        });
        order
            .into_iter()
            .take(k)
            .map(|position| ScoredPosition {
                position,
                score: scores[position],
            })
            .collect()
    }
}

fn compute_idf(doc_freq: &HashMap<String, u32>, doc_count: usize) -> HashMap<String, f32> {
    let n = doc_count as f32;
    let mut idf: HashMap<String, f32> = HashMap::with_capacity(doc_freq.len());
    let mut idf_sum = 0.0f32;

    for (term, &df) in doc_freq {
        let df = df as f32;
        let value = ((n - df + 0.5) / (df + 0.5)).ln();
        idf_sum += value;
        idf.insert(term.clone(), value);
    }
    let average_idf = if idf.is_empty() {
        0.0
    } else {
        idf_sum / idf.len() as f32
    };
    let floor = EPSILON * average_idf;
    for value in idf.values_mut() {
        if *value < 0.0 {
            *value = floor;
        }
    }
    idf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::loader::{FaqRecord, FundRecord};
    use crate::model::types::FundMetrics;

    fn corpus() -> CorpusStore {
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
        CorpusStore::build(faqs, funds).unwrap()
    }

    #[test]
    fn empty_query_returns_empty_list() {
        let index = LexicalIndex::build(&corpus());
        assert!(index.search("", 5).is_empty());
        assert!(index.search("   \t  ", 5).is_empty());
    }

    #[test]
    fn matching_term_ranks_its_document_first() {
        let index = LexicalIndex::build(&corpus());
        let hits = index.search("Sharpe", 3);
        assert!(!hits.is_empty());
        assert_eq!(hits[0].position, 0);
        assert!(hits[0].score > 0.0);
    }

    #[test]
    fn ties_break_by_ascending_position() {
        let index = LexicalIndex::build(&corpus());
        // A token absent from the corpus scores everything 0.0; order must
        // then be corpus order.
        let hits = index.search("zzz-unseen-token", 3);
        assert_eq!(hits.len(), 3);
        let positions: Vec<usize> = hits.iter().map(|h| h.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
        assert!(hits.iter().all(|h| h.score == 0.0));
    }

    #[test]
    fn at_most_k_results() {
        let index = LexicalIndex::build(&corpus());
        assert_eq!(index.search("fund", 2).len(), 2);
    }
}

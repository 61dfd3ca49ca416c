//! Corpus store: the two document collections, built once at startup and
//! shared read-only by every retrieval strategy.

pub mod loader;

use std::collections::HashSet;

use crate::model::types::{DocKind, DocPayload, Document};
use loader::{FaqRecord, FundRecord};
use thiserror::Error;
use tracing::info;

/// Fatal corpus construction errors. These refuse startup; an empty corpus
/// is not one of them.
#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("duplicate document id across collections: {0}")]
    DuplicateId(String),
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed csv in {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },
    #[error("{path} is missing required column \"{column}\"")]
    MissingColumn { path: String, column: String },
}

/// Ordered, write-once document store. Position is the index into the
/// underlying sequence and is stamped on each document explicitly.
#[derive(Debug)]
pub struct CorpusStore {
    docs: Vec<Document>,
}

impl CorpusStore {
    /// Build the store from the loaded collections, FAQ entries first.
    ///
    /// Rejects duplicate ids within or across collections.
    pub fn build(faqs: Vec<FaqRecord>, funds: Vec<FundRecord>) -> Result<Self, CorpusError> {
        let mut docs = Vec::with_capacity(faqs.len() + funds.len());
        let mut seen: HashSet<String> = HashSet::new();

        for (i, faq) in faqs.into_iter().enumerate() {
            let id = format!("faq_{i}");
            if !seen.insert(id.clone()) {
                return Err(CorpusError::DuplicateId(id));
            }
            let text = format!("{}\n{}", faq.question, faq.answer);
            docs.push(Document {
                id,
                position: docs.len(),
                text,
                payload: DocPayload::Faq {
                    question: faq.question,
                    answer: faq.answer,
                },
            });
        }

        for fund in funds {
            if !seen.insert(fund.fund_id.clone()) {
                return Err(CorpusError::DuplicateId(fund.fund_id));
            }
            let text = fund_text(&fund);
            docs.push(Document {
                id: fund.fund_id,
                position: docs.len(),
                text,
                payload: DocPayload::Fund {
                    fund_name: fund.fund_name,
                    category: fund.category,
                    metrics: fund.metrics,
                },
            });
        }

        let faq_count = docs.iter().filter(|d| d.kind() == DocKind::Faq).count();
        info!(
            documents = docs.len(),
            faqs = faq_count,
            funds = docs.len() - faq_count,
            "corpus built"
        );
        Ok(Self { docs })
    }

    pub fn docs(&self) -> &[Document] {
        &self.docs
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Document at a corpus position.
    pub fn get(&self, position: usize) -> Option<&Document> {
        self.docs.get(position)
    }

    /// Fund documents in corpus order.
    pub fn funds(&self) -> impl Iterator<Item = &Document> {
        self.docs.iter().filter(|d| d.kind() == DocKind::Fund)
    }
}

/// Canonical sentence rendering of a fund row, used for tokenization and
/// embedding.
fn fund_text(fund: &FundRecord) -> String {
    format!(
        "Fund {} {} in category {} has 3-year CAGR of {}%, volatility of {}%, and Sharpe ratio of {}.",
        fund.fund_id,
        fund.fund_name,
        fund.category,
        fmt_metric(fund.metrics.cagr_3y),
        fmt_metric(fund.metrics.volatility),
        fmt_metric(fund.metrics.sharpe_ratio),
    )
}

fn fmt_metric(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v}"),
        None => "n/a".to_string(),
    }
}

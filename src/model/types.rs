//! Domain types shared by every retrieval strategy.

use serde::Serialize;

/// Which collection a document belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocKind {
    Faq,
    Fund,
}

/// A fund metric the numeric analyzer can rank or filter on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    SharpeRatio,
    Cagr3y,
    Volatility,
}

impl Metric {
    pub fn as_str(self) -> &'static str {
        match self {
            Metric::SharpeRatio => "sharpe_ratio",
            Metric::Cagr3y => "cagr_3y",
            Metric::Volatility => "volatility",
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Numeric fields of a fund record.
///
/// A missing or unparseable value stays `None`; it is excluded from
/// threshold and sort operations, never coerced to zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FundMetrics {
    pub sharpe_ratio: Option<f64>,
    pub cagr_3y: Option<f64>,
    pub volatility: Option<f64>,
}

impl FundMetrics {
    /// Value for `metric`, filtered to finite numbers.
    pub fn get(&self, metric: Metric) -> Option<f64> {
        let value = match metric {
            Metric::SharpeRatio => self.sharpe_ratio,
            Metric::Cagr3y => self.cagr_3y,
            Metric::Volatility => self.volatility,
        };
        value.filter(|v| v.is_finite())
    }
}

/// Kind-specific payload carried by a [`Document`].
#[derive(Debug, Clone, PartialEq)]
pub enum DocPayload {
    Faq {
        question: String,
        answer: String,
    },
    Fund {
        fund_name: String,
        category: String,
        metrics: FundMetrics,
    },
}

/// A retrievable unit from either collection.
#[derive(Debug, Clone)]
pub struct Document {
    /// Unique across both collections; result merging keys on this.
    pub id: String,
    /// Stable position in the corpus; the tie-break for equal scores.
    pub position: usize,
    /// Canonical natural-language rendering used for tokenization and
    /// embedding.
    pub text: String,
    pub payload: DocPayload,
}

impl Document {
    pub fn kind(&self) -> DocKind {
        match self.payload {
            DocPayload::Faq { .. } => DocKind::Faq,
            DocPayload::Fund { .. } => DocKind::Fund,
        }
    }

    /// Fund metrics, if this is a fund document.
    pub fn metrics(&self) -> Option<&FundMetrics> {
        match &self.payload {
            DocPayload::Fund { metrics, .. } => Some(metrics),
            DocPayload::Faq { .. } => None,
        }
    }

    /// Kind-specific metadata surfaced to callers.
    pub fn metadata(&self) -> serde_json::Value {
        match &self.payload {
            DocPayload::Faq { question, .. } => serde_json::json!({ "question": question }),
            DocPayload::Fund {
                fund_name,
                category,
                ..
            } => serde_json::json!({ "fund_name": fund_name, "category": category }),
        }
    }
}

/// Per-strategy raw scores retained for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StrategyBreakdown {
    pub lexical: f32,
    pub semantic: f32,
    pub numeric: f32,
}

/// One ranked hit. Created per request, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalResult {
    pub id: String,
    pub kind: DocKind,
    pub text: String,
    pub metadata: serde_json::Value,
    pub score: f32,
    /// 1-based, assigned after the final sort.
    pub rank: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<StrategyBreakdown>,
}

impl RetrievalResult {
    pub fn from_document(doc: &Document, score: f32, rank: usize) -> Self {
        Self {
            id: doc.id.clone(),
            kind: doc.kind(),
            text: doc.text.clone(),
            metadata: doc.metadata(),
            score,
            rank,
            breakdown: None,
        }
    }

    pub fn with_breakdown(mut self, breakdown: StrategyBreakdown) -> Self {
        self.breakdown = Some(breakdown);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_metric_is_excluded() {
        let metrics = FundMetrics {
            sharpe_ratio: Some(1.2),
            cagr_3y: None,
            volatility: Some(f64::NAN),
        };
        assert_eq!(metrics.get(Metric::SharpeRatio), Some(1.2));
        assert_eq!(metrics.get(Metric::Cagr3y), None);
        // NaN must behave like a missing value, not zero.
        assert_eq!(metrics.get(Metric::Volatility), None);
    }

    #[test]
    fn metadata_matches_kind() {
        let doc = Document {
            id: "faq_0".into(),
            position: 0,
            text: "What is a Sharpe ratio?\nA risk-adjusted return measure.".into(),
            payload: DocPayload::Faq {
                question: "What is a Sharpe ratio?".into(),
                answer: "A risk-adjusted return measure.".into(),
            },
        };
        assert_eq!(doc.kind(), DocKind::Faq);
        assert_eq!(doc.metadata()["question"], "What is a Sharpe ratio?");
        assert!(doc.metrics().is_none());
    }
}

//! Numeric intent analysis.
//!
//! Detects when a query is really a structured ranking or filtering request
//! over a fund metric ("top 3 funds by sharpe", "volatility below 10%") and
//! answers it by direct computation over the fund collection instead of
//! text relevance. The pipeline is four pure extraction steps (metric,
//! direction, threshold, count) feeding a structured [`NumericIntent`].

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::ScoredPosition;
use crate::corpus::CorpusStore;
use crate::model::types::Metric;

/// Synonym table in priority order; the first substring match wins.
const METRIC_SYNONYMS: &[(&str, Metric)] = &[
    ("sharpe", Metric::SharpeRatio),
    ("sharpe ratio", Metric::SharpeRatio),
    ("risk-adjusted", Metric::SharpeRatio),
    ("risk adjusted", Metric::SharpeRatio),
    ("cagr", Metric::Cagr3y),
    ("return", Metric::Cagr3y),
    ("returns", Metric::Cagr3y),
    ("growth", Metric::Cagr3y),
    ("volatility", Metric::Volatility),
    ("risk", Metric::Volatility),
    ("variance", Metric::Volatility),
    ("std", Metric::Volatility),
    ("standard deviation", Metric::Volatility),
];

const ASCENDING_KEYWORDS: &[&str] = &[
    "lowest",
    "minimum",
    "min",
    "worst",
    "bottom",
    "least",
    "avoid",
    "not consider",
    "stay away",
    "don't invest",
];

const DESCENDING_KEYWORDS: &[&str] = &[
    "highest",
    "maximum",
    "max",
    "best",
    "top",
    "most",
    "recommend",
    "consider",
    "invest",
    "outperform",
];

/// Extra words that mark ranking intent without implying a direction.
const RANKING_EXTRA_KEYWORDS: &[&str] = &["compare", "rank", "sort", "order"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdOp {
    Gt,
    Lt,
    Gte,
    Lte,
}

impl ThresholdOp {
    fn holds(self, value: f64, bound: f64) -> bool {
        match self {
            ThresholdOp::Gt => value > bound,
            ThresholdOp::Lt => value < bound,
            ThresholdOp::Gte => value >= bound,
            ThresholdOp::Lte => value <= bound,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Threshold {
    pub op: ThresholdOp,
    pub value: f64,
}

/// Structured reading of a numeric query.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericIntent {
    pub metric: Metric,
    pub direction: SortDirection,
    pub threshold: Option<Threshold>,
    pub count: usize,
}

/// First metric synonym found in the lowercased query, in table order.
pub fn extract_metric(query: &str) -> Option<Metric> {
    let q = query.to_lowercase();
    METRIC_SYNONYMS
        .iter()
        .find(|(synonym, _)| q.contains(synonym))
        .map(|&(_, metric)| metric)
}

/// Ascending only when ascending keywords appear without any descending
/// keyword; every other case (both, or neither) defaults to descending.
/// The asymmetry is deliberate: when in doubt, surface the best option.
pub fn extract_direction(query: &str) -> SortDirection {
    let q = query.to_lowercase();
    let has_ascending = ASCENDING_KEYWORDS.iter().any(|kw| q.contains(kw));
    let has_descending = DESCENDING_KEYWORDS.iter().any(|kw| q.contains(kw));
    if has_ascending && !has_descending {
        SortDirection::Ascending
    } else {
        SortDirection::Descending
    }
}

static THRESHOLD_PATTERNS: Lazy<[(Regex, ThresholdOp); 4]> = Lazy::new(|| {
    // Priority order: gt, lt, gte, lte. Only the first match is honored.
    [
        (
            Regex::new(r"(?:above|over|greater than|more than|>)\s*(\d+\.?\d*)\s*%?").unwrap(),
            ThresholdOp::Gt,
        ),
        (
            Regex::new(r"(?:below|under|less than|<)\s*(\d+\.?\d*)\s*%?").unwrap(),
            ThresholdOp::Lt,
        ),
        (
            Regex::new(r"(?:at least|minimum)\s*(\d+\.?\d*)\s*%?").unwrap(),
            ThresholdOp::Gte,
        ),
        (
            Regex::new(r"(?:at most|maximum)\s*(\d+\.?\d*)\s*%?").unwrap(),
            ThresholdOp::Lte,
        ),
    ]
});

/// Comparison phrase followed by a number, with percent normalization:
/// when the query contains a `%` anywhere and the parsed number is greater
/// than 1, it is treated as a whole percentage and divided by 100. A
/// literal fraction like "0.5" passes through unchanged.
pub fn extract_threshold(query: &str) -> Option<Threshold> {
    let q = query.to_lowercase();
    for (pattern, op) in THRESHOLD_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(&q) {
            let mut value: f64 = caps[1].parse().ok()?;
            if q.contains('%') && value > 1.0 {
                value /= 100.0;
            }
            return Some(Threshold { op: *op, value });
        }
    }
    None
}

static COUNT_PATTERNS: Lazy<[Regex; 3]> = Lazy::new(|| {
    [
        Regex::new(r"top\s+(\d+)").unwrap(),
        Regex::new(r"(\d+)\s+(?:best|worst|top|bottom)").unwrap(),
        Regex::new(r"top\s+(\w+)").unwrap(),
    ]
});

const NUMBER_WORDS: &[(&str, usize)] = &[
    ("one", 1),
    ("two", 2),
    ("three", 3),
    ("four", 4),
    ("five", 5),
    ("six", 6),
    ("seven", 7),
    ("eight", 8),
    ("nine", 9),
    ("ten", 10),
];

/// "top N" / "N best|worst|top|bottom", with N a digit string or a word
/// one..ten; falls back to `default_count`.
pub fn extract_count(query: &str, default_count: usize) -> usize {
    let q = query.to_lowercase();
    for pattern in COUNT_PATTERNS.iter() {
        let Some(caps) = pattern.captures(&q) else {
            continue;
        };
        let token = &caps[1];
        if let Some(&(_, n)) = NUMBER_WORDS.iter().find(|(word, _)| *word == token) {
            return n;
        }
        if let Ok(n) = token.parse::<usize>() {
            return n;
        }
    }
    default_count
}

/// True iff a metric was found and the query also carries ranking language
/// or a parseable threshold. A bare metric mention ("what is volatility")
/// is not numeric and routes to the text strategies instead.
pub fn is_numeric_query(query: &str) -> bool {
    analyze(query, 1).is_some()
}

/// Full extraction pipeline; `None` when the query is not numeric.
pub fn analyze(query: &str, default_count: usize) -> Option<NumericIntent> {
    let metric = extract_metric(query)?;
    let threshold = extract_threshold(query);

    let q = query.to_lowercase();
    let has_ranking = ASCENDING_KEYWORDS
        .iter()
        .chain(DESCENDING_KEYWORDS)
        .chain(RANKING_EXTRA_KEYWORDS)
        .any(|kw| q.contains(kw));
    if !has_ranking && threshold.is_none() {
        return None;
    }

    Some(NumericIntent {
        metric,
        direction: extract_direction(query),
        threshold,
        count: extract_count(query, default_count),
    })
}

/// Evaluates numeric intents directly against the fund collection.
pub struct NumericRetriever {
    corpus: Arc<CorpusStore>,
}

impl NumericRetriever {
    pub fn new(corpus: Arc<CorpusStore>) -> Self {
        Self { corpus }
    }

    /// Analyze and evaluate in one step; empty when the query is not
    /// numeric.
    pub fn retrieve(&self, query: &str, default_count: usize) -> Vec<ScoredPosition> {
        match analyze(query, default_count) {
            Some(intent) => self.evaluate(&intent),
            None => Vec::new(),
        }
    }

    /// Filter, sort, and rank fund documents for a resolved intent.
    ///
    /// Funds missing the metric are excluded; an empty post-filter result
    /// is a valid final answer. Scores decay linearly from 1.0 by rank and
    /// may go negative past rank 10 (cosmetic, strategy-local).
    pub fn evaluate(&self, intent: &NumericIntent) -> Vec<ScoredPosition> {
        let mut matches: Vec<(usize, f64)> = self
            .corpus
            .funds()
            .filter_map(|doc| {
                let value = doc.metrics()?.get(intent.metric)?;
                Some((doc.position, value))
            })
            .filter(|&(_, value)| match intent.threshold {
                Some(t) => t.op.holds(value, t.value),
                None => true,
            })
            .collect();

        matches.sort_by(|a, b| {
            let ordering = a.1.total_cmp(&b.1);
            let ordering = match intent.direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            };
            ordering.then_with(|| a.0.cmp(&b.0))
        });

        debug!(
            metric = %intent.metric,
            candidates = matches.len(),
            count = intent.count,
            "numeric intent evaluated"
        );
        matches
            .into_iter()
            .take(intent.count)
            .enumerate()
            .map(|(i, (position, _))| ScoredPosition {
                position,
                score: 1.0 - 0.1 * i as f32,
            })
            .collect()
    }
}

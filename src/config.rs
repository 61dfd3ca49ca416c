//! Retrieval tuning knobs.
//!
//! Defaults match the shipped behavior; each knob can be overridden
//! through a `FES_*` environment variable (loaded through dotenvy, so a
//! local `.env` file works too). Unparseable values are ignored rather
//! than treated as errors.

use tracing::debug;

/// Weights and candidate depths for the fusion controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchConfig {
    /// Semantic weight in [0, 1]; lexical gets `1 - alpha`.
    pub alpha: f32,
    /// Candidate pool drawn from the lexical strategy before fusion.
    pub top_k_lexical: usize,
    /// Candidate pool drawn from the semantic strategy before fusion.
    pub top_k_semantic: usize,
    /// FAQ documents appended to a numeric answer for context.
    pub faq_context_k: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            alpha: 0.5,
            top_k_lexical: 10,
            top_k_semantic: 10,
            faq_context_k: 3,
        }
    }
}

impl SearchConfig {
    /// Read overrides from the environment on top of the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var("FES_HYBRID_ALPHA") {
            if let Ok(alpha) = raw.trim().parse::<f32>() {
                if alpha.is_finite() {
                    config.alpha = alpha.clamp(0.0, 1.0);
                }
            }
        }
        if let Ok(raw) = std::env::var("FES_TOP_K_LEXICAL") {
            if let Ok(k) = raw.trim().parse::<usize>() {
                config.top_k_lexical = k;
            }
        }
        if let Ok(raw) = std::env::var("FES_TOP_K_SEMANTIC") {
            if let Ok(k) = raw.trim().parse::<usize>() {
                config.top_k_semantic = k;
            }
        }
        if let Ok(raw) = std::env::var("FES_FAQ_CONTEXT_K") {
            if let Ok(k) = raw.trim().parse::<usize>() {
                config.faq_context_k = k;
            }
        }
        debug!(?config, "search config resolved");
        config
    }
}

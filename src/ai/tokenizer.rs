//! Token Counting and Truncation
//!
//! OpenAI models are counted with their exact BPE encoding; every other
//! provider uses a calibrated characters-per-token ratio. Both counters are
//! monotonic in the input length, which is what truncation relies on.

use std::sync::Arc;
use tiktoken_rs::CoreBPE;
use tracing::{debug, warn};

use super::provider::ProviderKind;
use crate::constants::tokens as token_constants;

/// Visible marker appended to truncated text
pub const TRUNCATION_MARKER: &str = "\n...(content truncated)...";

#[derive(Clone)]
pub enum TokenCounter {
    /// Exact byte-pair encoding
    Bpe(Arc<CoreBPE>),
    /// `ceil(chars / ratio)`
    CharRatio(f64),
}

impl std::fmt::Debug for TokenCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bpe(_) => write!(f, "TokenCounter::Bpe"),
            Self::CharRatio(r) => write!(f, "TokenCounter::CharRatio({})", r),
        }
    }
}

impl Default for TokenCounter {
    fn default() -> Self {
        Self::CharRatio(token_constants::DEFAULT_CHARS_PER_TOKEN)
    }
}

impl TokenCounter {
    /// Pick the counter for a provider+model pair.
    ///
    /// Unknown OpenAI model names fall back to `cl100k_base`; if no encoding
    /// can be loaded the character ratio is used.
    pub fn for_model(provider: ProviderKind, model: &str) -> Self {
        match provider {
            ProviderKind::OpenAi => {
                let bpe = tiktoken_rs::get_bpe_from_model(model).or_else(|e| {
                    debug!("No encoding registered for {}: {}, using cl100k_base", model, e);
                    tiktoken_rs::cl100k_base()
                });
                match bpe {
                    Ok(bpe) => Self::Bpe(Arc::new(bpe)),
                    Err(e) => {
                        warn!("Failed to load BPE encoding, falling back to char ratio: {}", e);
                        Self::default()
                    }
                }
            }
            _ => Self::default(),
        }
    }

    pub fn char_ratio(ratio: f64) -> Self {
        Self::CharRatio(ratio.max(0.1))
    }

    pub fn count(&self, text: &str) -> usize {
        match self {
            Self::Bpe(bpe) => bpe.encode_with_special_tokens(text).len(),
            Self::CharRatio(ratio) => (text.chars().count() as f64 / ratio).ceil() as usize,
        }
    }

    /// Cut `text` so that the result, marker included, counts at most
    /// `max_tokens`. Text already within budget is returned unchanged, so
    /// truncating twice gives the same output as truncating once. When even
    /// the marker does not fit, the result is empty.
    pub fn truncate(&self, text: &str, max_tokens: usize) -> String {
        if self.count(text) <= max_tokens {
            return text.to_string();
        }

        let marker_tokens = self.count(TRUNCATION_MARKER);
        if marker_tokens > max_tokens {
            return String::new();
        }

        let mut budget = max_tokens - marker_tokens;
        loop {
            let prefix = self.prefix(text, budget);
            let candidate = format!("{}{}", prefix, TRUNCATION_MARKER);
            if self.count(&candidate) <= max_tokens {
                return candidate;
            }
            // Merges across the join can add a token; shrink and retry
            if budget == 0 {
                return String::new();
            }
            budget -= 1;
        }
    }

    /// Longest prefix of `text` worth roughly `budget` tokens
    fn prefix(&self, text: &str, budget: usize) -> String {
        match self {
            Self::Bpe(bpe) => {
                let tokens = bpe.encode_with_special_tokens(text);
                let mut take = budget.min(tokens.len());
                // A cut inside a multi-byte character fails to decode
                while take > 0 {
                    if let Ok(s) = bpe.decode(tokens[..take].to_vec()) {
                        return s;
                    }
                    take -= 1;
                }
                String::new()
            }
            Self::CharRatio(ratio) => {
                let keep = (budget as f64 * ratio).floor() as usize;
                text.chars().take(keep).collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_char_ratio_count() {
        let counter = TokenCounter::char_ratio(4.0);
        assert_eq!(counter.count(""), 0);
        assert_eq!(counter.count("abcd"), 1);
        assert_eq!(counter.count("abcde"), 2);
    }

    #[test]
    fn test_truncate_within_budget_is_unchanged() {
        let counter = TokenCounter::default();
        assert_eq!(counter.truncate("short", 100), "short");
    }

    #[test]
    fn test_truncate_appends_marker() {
        let counter = TokenCounter::default();
        let text = "x".repeat(1000);
        let out = counter.truncate(&text, 50);
        assert!(out.ends_with(TRUNCATION_MARKER));
        assert!(counter.count(&out) <= 50);
    }

    #[test]
    fn test_truncate_when_marker_does_not_fit() {
        let counter = TokenCounter::default();
        assert_eq!(counter.truncate(&"y".repeat(100), 2), "");
    }

    #[test]
    fn test_bpe_truncate_bound_and_idempotence() {
        let counter = TokenCounter::for_model(ProviderKind::OpenAi, "gpt-4o-mini");
        assert!(matches!(counter, TokenCounter::Bpe(_)));

        let text = "fn main() { println!(\"héllo wörld\"); }\n".repeat(200);
        let once = counter.truncate(&text, 120);
        assert!(counter.count(&once) <= 120);
        assert_eq!(counter.truncate(&once, 120), once);
    }

    #[test]
    fn test_non_openai_uses_char_ratio() {
        assert!(matches!(
            TokenCounter::for_model(ProviderKind::Ollama, "llama3"),
            TokenCounter::CharRatio(_)
        ));
    }

    proptest! {
        #[test]
        fn prop_char_ratio_truncate_bounded_and_idempotent(
            text in "\\PC{0,600}",
            max in 0usize..120,
        ) {
            let counter = TokenCounter::default();
            let once = counter.truncate(&text, max);
            prop_assert!(counter.count(&once) <= max);
            prop_assert_eq!(counter.truncate(&once, max), once);
        }

        #[test]
        fn prop_char_ratio_count_monotonic(text in "\\PC{0,300}", extra in "\\PC{0,50}") {
            let counter = TokenCounter::default();
            let longer = format!("{}{}", text, extra);
            prop_assert!(counter.count(&text) <= counter.count(&longer));
        }
    }
}

//! Cost Estimation and Admission Control
//!
//! Converts token counts to a dollar estimate using per-million rates and
//! rejects a batch up front when the estimate is above the configured ceiling.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};

use super::provider::ProviderKind;
use crate::constants::pricing as price_constants;
use crate::types::{DocError, Result};

/// USD per million tokens
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelRate {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl ModelRate {
    pub const FREE: Self = Self {
        input_per_million: 0.0,
        output_per_million: 0.0,
    };

    pub const fn new(input_per_million: f64, output_per_million: f64) -> Self {
        Self {
            input_per_million,
            output_per_million,
        }
    }
}

/// `tokens * rate_per_million / 1_000_000`
pub fn estimate_cost(tokens: u64, rate_per_million: f64) -> f64 {
    tokens as f64 * rate_per_million / 1_000_000.0
}

// =============================================================================
// Pricing Table
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct PricingTable {
    overrides: HashMap<String, ModelRate>,
}

impl PricingTable {
    pub fn with_overrides(overrides: HashMap<String, ModelRate>) -> Self {
        Self { overrides }
    }

    /// Rate for a model: override, exact built-in, longest built-in prefix
    /// (dated snapshots such as `gpt-4o-mini-2024-07-18`), provider default.
    pub fn rate_for(&self, provider: ProviderKind, model: &str) -> ModelRate {
        if let Some(rate) = self.overrides.get(model) {
            return *rate;
        }
        if provider == ProviderKind::Ollama {
            return ModelRate::FREE;
        }

        let builtin = price_constants::MODEL_RATES
            .iter()
            .filter(|(name, _, _)| model.starts_with(name))
            .max_by_key(|(name, _, _)| name.len());

        match builtin {
            Some((_, input, output)) => ModelRate::new(*input, *output),
            None => {
                warn!(
                    "No pricing known for model '{}', assuming ${}/M input",
                    model,
                    price_constants::UNKNOWN_MODEL_RATE.input_per_million
                );
                price_constants::UNKNOWN_MODEL_RATE
            }
        }
    }
}

// =============================================================================
// Cost Estimate
// =============================================================================

/// Derived estimate for one batch; never persisted as a phase artifact
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CostEstimate {
    pub input_tokens: u64,
    pub output_tokens_estimate: u64,
    pub rates: ModelRate,
    pub usd_estimate: f64,
}

impl CostEstimate {
    pub fn new(input_tokens: u64, output_tokens_estimate: u64, rates: ModelRate) -> Self {
        let usd_estimate = estimate_cost(input_tokens, rates.input_per_million)
            + estimate_cost(output_tokens_estimate, rates.output_per_million);
        Self {
            input_tokens,
            output_tokens_estimate,
            rates,
            usd_estimate,
        }
    }

    /// Estimate for `file_count` units totalling `input_tokens`, assuming a
    /// fixed output size per unit
    pub fn for_batch(
        input_tokens: u64,
        file_count: usize,
        assumed_output_per_file: u64,
        rates: ModelRate,
    ) -> Self {
        Self::new(
            input_tokens,
            file_count as u64 * assumed_output_per_file,
            rates,
        )
    }

    /// Admit the batch or fail with `CostCeilingExceeded`
    pub fn admit(&self, ceiling_usd: f64, file_count: usize) -> Result<()> {
        if self.usd_estimate > ceiling_usd {
            return Err(DocError::CostCeilingExceeded {
                estimated_usd: self.usd_estimate,
                ceiling_usd,
                input_tokens: self.input_tokens,
                file_count,
            });
        }
        info!(
            "Cost estimate ${:.4} within ceiling ${:.2} ({} input tokens)",
            self.usd_estimate, ceiling_usd, self.input_tokens
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_cost() {
        assert!((estimate_cost(10_000_000, 0.15) - 1.50).abs() < 1e-9);
        assert_eq!(estimate_cost(0, 2.5), 0.0);
    }

    #[test]
    fn test_admission_rejects_over_ceiling() {
        let rate = ModelRate::new(0.15, 0.0);
        let estimate = CostEstimate::new(10_000_000, 0, rate);
        let err = estimate.admit(1.00, 1).unwrap_err();
        match err {
            DocError::CostCeilingExceeded {
                estimated_usd,
                ceiling_usd,
                input_tokens,
                ..
            } => {
                assert!((estimated_usd - 1.50).abs() < 1e-9);
                assert_eq!(ceiling_usd, 1.00);
                assert_eq!(input_tokens, 10_000_000);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_batch_includes_assumed_output() {
        let rate = ModelRate::new(0.15, 0.60);
        let estimate = CostEstimate::for_batch(1_000_000, 100, 500, rate);
        assert_eq!(estimate.output_tokens_estimate, 50_000);
        assert!((estimate.usd_estimate - (0.15 + 0.03)).abs() < 1e-9);
        assert!(estimate.admit(1.0, 100).is_ok());
    }

    #[test]
    fn test_rate_lookup() {
        let table = PricingTable::default();
        assert_eq!(
            table.rate_for(ProviderKind::OpenAi, "gpt-4o-mini"),
            ModelRate::new(0.15, 0.60)
        );
        // Dated snapshot resolves to the longest matching prefix
        assert_eq!(
            table.rate_for(ProviderKind::OpenAi, "gpt-4o-mini-2024-07-18"),
            ModelRate::new(0.15, 0.60)
        );
        assert_eq!(
            table.rate_for(ProviderKind::OpenAi, "gpt-4o-2024-08-06"),
            ModelRate::new(2.50, 10.00)
        );
        assert_eq!(table.rate_for(ProviderKind::Ollama, "llama3"), ModelRate::FREE);
    }

    #[test]
    fn test_override_wins() {
        let mut overrides = HashMap::new();
        overrides.insert("gpt-4o".to_string(), ModelRate::new(1.0, 2.0));
        let table = PricingTable::with_overrides(overrides);
        assert_eq!(
            table.rate_for(ProviderKind::OpenAi, "gpt-4o"),
            ModelRate::new(1.0, 2.0)
        );
    }
}

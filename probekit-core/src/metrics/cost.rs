//! Judge token cost calculation

use std::collections::HashMap;

use crate::config::ModelPricing;
use crate::judge::TokenUsage;

/// Rate applied when neither the model nor its provider wildcard is known
pub const DEFAULT_PRICING: ModelPricing = ModelPricing {
    input_per_million: 1.0,
    output_per_million: 2.0,
};

/// USD per million tokens, keyed `provider:model` with `provider:*` fallbacks
///
/// Prices are approximate and may vary by region/time. Built once per run
/// and shared read-only through [`crate::context::RunContext`].
#[derive(Debug, Clone, PartialEq)]
pub struct PricingTable {
    rates: HashMap<String, ModelPricing>,
    fallback: ModelPricing,
}

impl PricingTable {
    /// Table seeded with built-in pricing
    pub fn new() -> Self {
        let mut table = Self::empty();

        table.set_pricing("openai:gpt-4o", 2.5, 10.0);
        table.set_pricing("openai:gpt-4o-mini", 0.15, 0.6);
        table.set_pricing("openai:gpt-4-turbo", 10.0, 30.0);

        table.set_pricing("anthropic:claude-3-opus", 15.0, 75.0);
        table.set_pricing("anthropic:claude-3-5-sonnet", 3.0, 15.0);
        table.set_pricing("anthropic:claude-3-5-haiku", 0.8, 4.0);
        table.set_pricing("anthropic:*", 3.0, 15.0);

        table.set_pricing("groq:llama-3-70b", 0.59, 0.79);

        table
    }

    /// Table with no known models; everything prices at the fallback rate
    pub fn empty() -> Self {
        Self {
            rates: HashMap::new(),
            fallback: DEFAULT_PRICING,
        }
    }

    /// Built-in pricing with configured overrides layered on top
    pub fn with_overrides<'a>(
        overrides: impl IntoIterator<Item = (&'a String, &'a ModelPricing)>,
    ) -> Self {
        let mut table = Self::new();
        for (key, pricing) in overrides {
            table.rates.insert(key.clone(), *pricing);
        }
        table
    }

    /// Add or update pricing for `provider:model` (or `provider:*`)
    pub fn set_pricing(&mut self, key: &str, input_per_million: f64, output_per_million: f64) {
        self.rates.insert(
            key.to_string(),
            ModelPricing {
                input_per_million,
                output_per_million,
            },
        );
    }

    pub fn set_fallback(&mut self, pricing: ModelPricing) {
        self.fallback = pricing;
    }

    /// Rate for a model key: exact match, then provider wildcard, then fallback
    pub fn pricing_for(&self, model: &str) -> ModelPricing {
        if let Some(pricing) = self.rates.get(model) {
            return *pricing;
        }
        model
            .split_once(':')
            .and_then(|(provider, _)| self.rates.get(&format!("{provider}:*")))
            .copied()
            .unwrap_or(self.fallback)
    }

    /// Calculate cost for token usage
    pub fn calculate_cost(&self, usage: &TokenUsage) -> f64 {
        let pricing = self.pricing_for(&usage.model);
        let input_cost = (usage.input_tokens as f64 / 1_000_000.0) * pricing.input_per_million;
        let output_cost = (usage.output_tokens as f64 / 1_000_000.0) * pricing.output_per_million;
        input_cost + output_cost
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(model: &str, input: u64, output: u64) -> TokenUsage {
        TokenUsage {
            model: model.to_string(),
            input_tokens: input,
            output_tokens: output,
        }
    }

    #[test]
    fn test_exact_then_wildcard_then_fallback() {
        let table = PricingTable::new();

        let exact = table.calculate_cost(&usage("openai:gpt-4o", 1_000_000, 1_000_000));
        assert!((exact - 12.5).abs() < 1e-9);

        let wildcard = table.pricing_for("anthropic:some-new-model");
        assert_eq!(wildcard.input_per_million, 3.0);

        let unknown = table.pricing_for("local:llama");
        assert_eq!(unknown, DEFAULT_PRICING);
        assert_eq!(table.pricing_for("no-provider"), DEFAULT_PRICING);
    }

    #[test]
    fn test_overrides_replace_builtins() {
        let mut overrides = HashMap::new();
        overrides.insert(
            "openai:gpt-4o".to_string(),
            ModelPricing {
                input_per_million: 0.0,
                output_per_million: 4.0,
            },
        );
        let table = PricingTable::with_overrides(&overrides);

        let cost = table.calculate_cost(&usage("openai:gpt-4o", 500_000, 250_000));
        assert!((cost - 1.0).abs() < 1e-9);
    }
}

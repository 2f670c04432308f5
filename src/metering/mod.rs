//! Token accounting and USD cost metering for model calls.
//!
//! Central module for all metering logic: consumers import the data types
//! and [`meter_response`]; they never compute costs themselves.
//!
//! Providers that omit usage counts (common for local models) fall back to
//! a deterministic chars/4 estimate, and the `is_estimated` flag propagates
//! through every aggregation so totals are never mistaken for exact.

use std::collections::BTreeMap;
use std::ops::Add;

use serde::{Deserialize, Serialize};

use crate::constants::{PRICING_TOKENS_PER_UNIT, TOKEN_ESTIMATE_CHARS_PER_TOKEN};
use crate::llm::{ChatMessage, ChatResponse};

// =============================================================================
// Usage
// =============================================================================

/// Raw token counts for a single model call or an aggregation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens in the prompt
    pub prompt_tokens: u64,
    /// Tokens in the completion
    pub completion_tokens: u64,
    /// Total tokens
    pub total_tokens: u64,
    /// True if any contributing count was estimated rather than reported
    pub is_estimated: bool,
}

impl Add for TokenUsage {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            prompt_tokens: self.prompt_tokens + other.prompt_tokens,
            completion_tokens: self.completion_tokens + other.completion_tokens,
            total_tokens: self.total_tokens + other.total_tokens,
            is_estimated: self.is_estimated || other.is_estimated,
        }
    }
}

// =============================================================================
// Cost
// =============================================================================

/// USD cost breakdown for a single call or aggregation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    /// Cost attributed to prompt tokens
    pub input_cost: f64,
    /// Cost attributed to completion tokens
    pub output_cost: f64,
    /// Sum of both
    pub total_cost: f64,
}

impl Add for CostBreakdown {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            input_cost: self.input_cost + other.input_cost,
            output_cost: self.output_cost + other.output_cost,
            total_cost: self.total_cost + other.total_cost,
        }
    }
}

// =============================================================================
// Pricing
// =============================================================================

/// Per-million-token rates for one model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelPrice {
    /// USD per million prompt tokens
    pub input_per_1m: f64,
    /// USD per million completion tokens
    pub output_per_1m: f64,
}

/// Pricing registry with exact, prefix, and default lookup.
///
/// Lookup order:
/// 1. exact model name
/// 2. longest registered prefix the model name starts with
/// 3. the registry default
/// 4. zero (unknown models meter tokens but cost nothing)
#[derive(Debug, Clone, Default)]
pub struct PriceTable {
    rates: BTreeMap<String, ModelPrice>,
    fallback: Option<ModelPrice>,
}

impl PriceTable {
    /// Create an empty table; every model prices at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rate for a model name or prefix.
    #[must_use]
    pub fn with_model(
        mut self,
        model: impl Into<String>,
        input_per_1m: f64,
        output_per_1m: f64,
    ) -> Self {
        self.rates.insert(
            model.into(),
            ModelPrice {
                input_per_1m,
                output_per_1m,
            },
        );
        self
    }

    /// Register the provider-wide fallback rate.
    #[must_use]
    pub fn with_default(mut self, input_per_1m: f64, output_per_1m: f64) -> Self {
        self.fallback = Some(ModelPrice {
            input_per_1m,
            output_per_1m,
        });
        self
    }

    /// Resolve the rate for a model.
    #[must_use]
    pub fn price_for(&self, model: &str) -> ModelPrice {
        if let Some(price) = self.rates.get(model) {
            return *price;
        }
        // Longest matching prefix, e.g. "orion-large-2026-01" matches "orion-large".
        let mut best: Option<(&str, &ModelPrice)> = None;
        for (key, price) in &self.rates {
            if model.starts_with(key.as_str())
                && best.map_or(true, |(prev, _)| key.len() > prev.len())
            {
                best = Some((key, price));
            }
        }
        if let Some((_, price)) = best {
            return *price;
        }
        self.fallback.unwrap_or_default()
    }

    /// Compute USD cost for a usage at this table's rate for `model`.
    #[must_use]
    pub fn compute_cost(&self, usage: TokenUsage, model: &str) -> CostBreakdown {
        let price = self.price_for(model);
        #[allow(clippy::cast_precision_loss)]
        let input_cost =
            usage.prompt_tokens as f64 * price.input_per_1m / PRICING_TOKENS_PER_UNIT as f64;
        #[allow(clippy::cast_precision_loss)]
        let output_cost =
            usage.completion_tokens as f64 * price.output_per_1m / PRICING_TOKENS_PER_UNIT as f64;
        CostBreakdown {
            input_cost,
            output_cost,
            total_cost: input_cost + output_cost,
        }
    }
}

// =============================================================================
// Metering
// =============================================================================

/// Combined usage + cost for a single model call or an aggregation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metering {
    /// Token counts
    pub usage: TokenUsage,
    /// USD cost at the metered rates
    pub cost: CostBreakdown,
    /// Model of the first contributing call
    pub model: String,
}

impl Add for Metering {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            usage: self.usage + other.usage,
            cost: self.cost + other.cost,
            model: if self.model.is_empty() {
                other.model
            } else {
                self.model
            },
        }
    }
}

/// Estimate a token count from text using the chars/4 heuristic.
#[must_use]
pub fn estimate_tokens_from_text(text: &str) -> u64 {
    if text.is_empty() {
        return 0;
    }
    (text.chars().count() / TOKEN_ESTIMATE_CHARS_PER_TOKEN).max(1) as u64
}

/// Estimate a prompt token count from a transcript using chars/4.
#[must_use]
pub fn estimate_tokens_from_messages(messages: &[ChatMessage]) -> u64 {
    let total_chars: usize = messages.iter().map(|m| m.content.chars().count()).sum();
    ((total_chars / TOKEN_ESTIMATE_CHARS_PER_TOKEN).max(1)) as u64
}

/// Meter a single model response.
///
/// Uses exact counts when the provider reported them; otherwise estimates
/// from the transcript and completion text and marks the result estimated.
#[must_use]
pub fn meter_response(
    response: &ChatResponse,
    messages: &[ChatMessage],
    prices: &PriceTable,
) -> Metering {
    let usage = match response.usage {
        Some(exact) => TokenUsage {
            prompt_tokens: exact.prompt_tokens,
            completion_tokens: exact.completion_tokens,
            total_tokens: exact.total_tokens,
            is_estimated: false,
        },
        None => {
            let prompt_tokens = estimate_tokens_from_messages(messages);
            let completion_tokens =
                estimate_tokens_from_text(response.content.as_deref().unwrap_or_default());
            TokenUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
                is_estimated: true,
            }
        }
    };

    Metering {
        usage,
        cost: prices.compute_cost(usage, &response.model),
        model: response.model.clone(),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_accumulation_propagates_estimation() {
        let exact = TokenUsage {
            prompt_tokens: 100,
            completion_tokens: 20,
            total_tokens: 120,
            is_estimated: false,
        };
        let estimated = TokenUsage {
            prompt_tokens: 50,
            completion_tokens: 10,
            total_tokens: 60,
            is_estimated: true,
        };
        let sum = exact + estimated;
        assert_eq!(sum.total_tokens, 180);
        assert!(sum.is_estimated);
    }

    #[test]
    fn test_price_lookup_order() {
        let table = PriceTable::new()
            .with_model("orion-large", 3.0, 15.0)
            .with_model("orion-large-2026-01", 4.0, 20.0)
            .with_default(1.0, 2.0);

        // Exact beats prefix.
        assert!((table.price_for("orion-large-2026-01").input_per_1m - 4.0).abs() < f64::EPSILON);
        // Longest prefix wins.
        assert!((table.price_for("orion-large-2026-02").input_per_1m - 4.0).abs() < f64::EPSILON);
        assert!((table.price_for("orion-large-x").input_per_1m - 3.0).abs() < f64::EPSILON);
        // Fallback for unknown models.
        assert!((table.price_for("mystery-model").input_per_1m - 1.0).abs() < f64::EPSILON);
        // Zero without a fallback.
        assert!(PriceTable::new().price_for("mystery").input_per_1m.abs() < f64::EPSILON);
    }

    #[test]
    fn test_compute_cost() {
        let table = PriceTable::new().with_model("m", 3.0, 15.0);
        let usage = TokenUsage {
            prompt_tokens: 1_000_000,
            completion_tokens: 200_000,
            total_tokens: 1_200_000,
            is_estimated: false,
        };
        let cost = table.compute_cost(usage, "m");
        assert!((cost.input_cost - 3.0).abs() < 1e-9);
        assert!((cost.output_cost - 3.0).abs() < 1e-9);
        assert!((cost.total_cost - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_meter_exact_usage() {
        let response = crate::llm::ChatResponse::text("done", "m").with_usage(100, 25);
        let metered = meter_response(&response, &[], &PriceTable::new());
        assert_eq!(metered.usage.total_tokens, 125);
        assert!(!metered.usage.is_estimated);
    }

    #[test]
    fn test_meter_estimates_when_usage_absent() {
        let messages = [ChatMessage::user("x".repeat(40))];
        let response = crate::llm::ChatResponse::text("y".repeat(8), "m");
        let metered = meter_response(&response, &messages, &PriceTable::new());
        assert!(metered.usage.is_estimated);
        assert_eq!(metered.usage.prompt_tokens, 10);
        assert_eq!(metered.usage.completion_tokens, 2);
    }

    #[test]
    fn test_estimate_minimums() {
        assert_eq!(estimate_tokens_from_text(""), 0);
        assert_eq!(estimate_tokens_from_text("ab"), 1);
        assert_eq!(estimate_tokens_from_messages(&[ChatMessage::user("a")]), 1);
    }

    #[test]
    fn test_metering_add_keeps_first_model() {
        let a = Metering {
            model: "alpha".into(),
            ..Metering::default()
        };
        let b = Metering {
            model: "beta".into(),
            ..Metering::default()
        };
        assert_eq!((a + b).model, "alpha");
    }
}

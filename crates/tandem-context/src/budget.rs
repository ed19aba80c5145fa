//! Token accounting for one gather operation.

use serde::{Deserialize, Serialize};

/// Token budget for a single gather pass.
///
/// `available` is computed once at construction and never mutated:
/// `max(0, floor(max_tokens * reserved_fraction) - used_by_history)`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBudget {
    /// Model context window size in tokens.
    pub max_tokens: usize,
    /// Fraction of the window reserved for gathered context.
    pub reserved_fraction: f64,
    /// Tokens already consumed by conversation history.
    pub used_by_history: usize,
    /// Tokens available for new context sources.
    pub available: usize,
}

impl TokenBudget {
    /// Compute a budget from window size, reserved fraction, and history usage.
    ///
    /// A non-finite or negative `reserved_fraction` is treated as zero;
    /// values above 1.0 are clamped to 1.0.
    #[must_use]
    pub fn new(max_tokens: usize, reserved_fraction: f64, used_by_history: usize) -> Self {
        let fraction = if reserved_fraction.is_finite() {
            reserved_fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let reserved = (max_tokens as f64 * fraction).floor() as usize;
        Self {
            max_tokens,
            reserved_fraction: fraction,
            used_by_history,
            available: reserved.saturating_sub(used_by_history),
        }
    }

    /// Whether there is no room left for new sources.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.available == 0
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn basic_computation() {
        let b = TokenBudget::new(100_000, 0.3, 5_000);
        assert_eq!(b.available, 25_000);
    }

    #[test]
    fn floors_before_subtracting() {
        // floor(10 * 0.35) = 3
        let b = TokenBudget::new(10, 0.35, 1);
        assert_eq!(b.available, 2);
    }

    #[test]
    fn clamps_at_zero_when_history_dominates() {
        let b = TokenBudget::new(1_000, 0.5, 10_000);
        assert_eq!(b.available, 0);
        assert!(b.is_exhausted());
    }

    #[test]
    fn zero_fraction_is_zero_budget() {
        let b = TokenBudget::new(100_000, 0.0, 0);
        assert_eq!(b.available, 0);
    }

    #[test]
    fn fraction_above_one_clamps() {
        let b = TokenBudget::new(1_000, 2.0, 0);
        assert_eq!(b.available, 1_000);
    }

    #[test]
    fn nan_fraction_treated_as_zero() {
        let b = TokenBudget::new(1_000, f64::NAN, 0);
        assert_eq!(b.available, 0);
    }

    #[test]
    fn serde_camel_case() {
        let b = TokenBudget::new(100, 0.5, 10);
        let json = serde_json::to_string(&b).unwrap();
        assert!(json.contains("\"maxTokens\":100"));
        assert!(json.contains("\"usedByHistory\":10"));
    }

    proptest! {
        #[test]
        fn available_invariant(
            max_tokens in 0usize..2_000_000,
            fraction in 0.0f64..=1.0,
            used in 0usize..2_000_000,
        ) {
            let b = TokenBudget::new(max_tokens, fraction, used);
            #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let reserved = (max_tokens as f64 * fraction).floor() as usize;
            prop_assert_eq!(b.available, reserved.saturating_sub(used));
            prop_assert!(b.available <= max_tokens);
        }
    }
}

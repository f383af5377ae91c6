//! Uncertainty loading functions
//!
//! Every variant maps the band spread (p90 - p50) to a non-negative loading
//! that never decreases as the spread widens.

use serde::{Deserialize, Serialize};

use crate::error::LoadError;

/// One bracket of a tiered loading: `rate` applies to the part of the spread above `from`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoadingTier {
    pub from: f64,
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UncertaintyLoading {
    /// `rate * spread`
    Linear { rate: f64 },
    /// Marginal rates per spread bracket, summed like tax brackets
    Tiered { tiers: Vec<LoadingTier> },
}

impl Default for UncertaintyLoading {
    fn default() -> Self {
        UncertaintyLoading::Linear { rate: 0.5 }
    }
}

impl UncertaintyLoading {
    /// Loading for a given spread
    pub fn loading(&self, spread: f64) -> f64 {
        let spread = if spread.is_nan() { 0.0 } else { spread.max(0.0) };
        match self {
            UncertaintyLoading::Linear { rate } => rate.max(0.0) * spread,
            UncertaintyLoading::Tiered { tiers } => tiers
                .iter()
                .enumerate()
                .map(|(i, tier)| {
                    let upper = tiers.get(i + 1).map_or(f64::INFINITY, |next| next.from);
                    let width = (upper - tier.from).max(0.0);
                    let covered = (spread - tier.from).clamp(0.0, width);
                    tier.rate.max(0.0) * covered
                })
                .sum(),
        }
    }

    pub fn validate(&self) -> Result<(), LoadError> {
        let check_rate = |rate: f64| {
            if !rate.is_finite() || rate < 0.0 {
                return Err(LoadError::invalid("uncertainty_loading", format!("rate must be finite and >= 0, got {}", rate)));
            }
            Ok(())
        };
        match self {
            UncertaintyLoading::Linear { rate } => check_rate(*rate),
            UncertaintyLoading::Tiered { tiers } => {
                if tiers.is_empty() {
                    return Err(LoadError::invalid("uncertainty_loading", "tiered loading needs at least one tier"));
                }
                let mut previous = f64::NEG_INFINITY;
                for tier in tiers {
                    check_rate(tier.rate)?;
                    if !tier.from.is_finite() || tier.from < 0.0 || tier.from <= previous {
                        return Err(LoadError::invalid(
                            "uncertainty_loading",
                            format!("tier bounds must be finite, >= 0 and strictly increasing, got {}", tier.from),
                        ));
                    }
                    previous = tier.from;
                }
                Ok(())
            }
        }
    }
}

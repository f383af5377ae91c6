//! Premium engine
//!
//! ```text
//! expected_loss = p_claim * expected_cost
//! loading       = max(uncertainty_loading(p90 - p50) + fixed loadings, minimum loading)
//! premium       = (expected_loss + loading) * premium_multiplier
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::coverage::{CoveragePolicy, CoverageRule};
use super::loading::UncertaintyLoading;
use crate::catalog::ProductTemplate;
use crate::scoring::{RiskScore, UncertaintyBand};

/// Components of a premium before the multiplier is applied
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PremiumBreakdown {
    pub expected_loss: f64,
    pub uncertainty_loading: f64,
    /// Additive template loadings by name
    pub fixed_loadings: BTreeMap<String, f64>,
    /// Amount added so the loading reaches the template minimum (0 when not binding)
    pub minimum_loading_topup: f64,
    pub premium_multiplier: f64,
}

impl PremiumBreakdown {
    /// Total loading on top of the expected loss
    pub fn total_loading(&self) -> f64 {
        self.uncertainty_loading + self.fixed_loadings.values().sum::<f64>() + self.minimum_loading_topup
    }
}

/// Result of `price`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricedTerms {
    pub premium: f64,
    pub capital: f64,
    pub deductible: f64,
    pub breakdown: PremiumBreakdown,
}

/// Prices a risk under a template with a loading function and a coverage policy
pub struct PricingEngine {
    loading: UncertaintyLoading,
    coverage: Box<dyn CoveragePolicy>,
}

impl PricingEngine {
    pub fn new(loading: UncertaintyLoading, coverage: Box<dyn CoveragePolicy>) -> Self {
        Self { loading, coverage }
    }

    /// Engine with a config-selected coverage rule
    pub fn with_rule(loading: UncertaintyLoading, coverage: CoverageRule) -> Self {
        Self::new(loading, Box::new(coverage))
    }

    pub fn loading(&self) -> &UncertaintyLoading {
        &self.loading
    }

    /// Replace the coverage policy
    pub fn set_coverage_policy(&mut self, coverage: Box<dyn CoveragePolicy>) {
        self.coverage = coverage;
    }

    /// Premium, capital and deductible for validated inputs.
    ///
    /// Total over any `p_claim` in [0, 1], `expected_cost >= 0` and
    /// `p90 >= p50 >= 0`: the premium is never negative and
    /// `0 <= deductible <= capital` always holds.
    pub fn price(&self, risk: &RiskScore, uncertainty: &UncertaintyBand, template: &ProductTemplate) -> PricedTerms {
        let expected_loss = risk.expected_loss().max(0.0);
        let uncertainty_loading = self.loading.loading(uncertainty.spread());

        let fixed_loadings: BTreeMap<String, f64> = template
            .fixed_loadings()
            .map(|(name, value)| (name.to_string(), value.max(0.0)))
            .collect();
        let fixed_total: f64 = fixed_loadings.values().sum();

        let variable_loading = uncertainty_loading + fixed_total;
        let loading = variable_loading.max(template.minimum_loading());
        let minimum_loading_topup = loading - variable_loading;

        let premium_multiplier = template.premium_multiplier.max(0.0);
        let premium = ((expected_loss + loading) * premium_multiplier).max(0.0);

        let terms = self.coverage.terms(template, risk).clamped();

        PricedTerms {
            premium,
            capital: terms.capital,
            deductible: terms.deductible,
            breakdown: PremiumBreakdown {
                expected_loss,
                uncertainty_loading,
                fixed_loadings,
                minimum_loading_topup,
                premium_multiplier,
            },
        }
    }
}

impl Default for PricingEngine {
    fn default() -> Self {
        Self::with_rule(UncertaintyLoading::default(), CoverageRule::default())
    }
}

impl std::fmt::Debug for PricingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PricingEngine")
            .field("loading", &self.loading)
            .finish_non_exhaustive()
    }
}

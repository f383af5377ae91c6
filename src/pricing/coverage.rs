//! Capital and deductible policies

use serde::{Deserialize, Serialize};

use crate::catalog::ProductTemplate;
use crate::error::LoadError;
use crate::scoring::RiskScore;

/// Capital and deductible proposed by a policy, before the engine clamps them
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoverageTerms {
    pub capital: f64,
    pub deductible: f64,
}

impl CoverageTerms {
    /// Force `capital >= 0` and `0 <= deductible <= capital`; non-finite values become 0
    pub fn clamped(self) -> Self {
        let finite = |v: f64| if v.is_finite() { v } else { 0.0 };
        let capital = finite(self.capital).max(0.0);
        let deductible = finite(self.deductible).clamp(0.0, capital);
        Self { capital, deductible }
    }
}

/// Derives capital and deductible from the chosen template and the risk score
pub trait CoveragePolicy: Send + Sync {
    fn terms(&self, template: &ProductTemplate, risk: &RiskScore) -> CoverageTerms;
}

impl<F> CoveragePolicy for F
where
    F: Fn(&ProductTemplate, &RiskScore) -> CoverageTerms + Send + Sync,
{
    fn terms(&self, template: &ProductTemplate, risk: &RiskScore) -> CoverageTerms {
        self(template, risk)
    }
}

/// Config-selectable coverage policies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoverageRule {
    /// Capital and deductible exactly as the template defines them
    Template,
    /// Raise the deductible to a share of severity and the capital to a multiple of it
    SeverityScaled { deductible_ratio: f64, capital_multiple: f64 },
}

impl Default for CoverageRule {
    fn default() -> Self {
        CoverageRule::SeverityScaled {
            deductible_ratio: 0.25,
            capital_multiple: 4.0,
        }
    }
}

impl CoverageRule {
    pub fn validate(&self) -> Result<(), LoadError> {
        if let CoverageRule::SeverityScaled { deductible_ratio, capital_multiple } = self {
            for (name, v) in [("deductible_ratio", *deductible_ratio), ("capital_multiple", *capital_multiple)] {
                if !v.is_finite() || v < 0.0 {
                    return Err(LoadError::invalid("coverage", format!("{} must be finite and >= 0, got {}", name, v)));
                }
            }
        }
        Ok(())
    }
}

impl CoveragePolicy for CoverageRule {
    fn terms(&self, template: &ProductTemplate, risk: &RiskScore) -> CoverageTerms {
        match self {
            CoverageRule::Template => CoverageTerms {
                capital: template.capital,
                deductible: template.deductible,
            },
            CoverageRule::SeverityScaled { deductible_ratio, capital_multiple } => CoverageTerms {
                capital: template.capital.max(capital_multiple * risk.expected_cost),
                deductible: template.deductible.max(deductible_ratio * risk.expected_cost),
            },
        }
    }
}

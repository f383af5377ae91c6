//! Manual underwriting referral rules

use serde::{Deserialize, Serialize};

use crate::error::LoadError;
use crate::scoring::{RiskScore, UncertaintyBand};

fn default_max_spread() -> f64 {
    2_000.0
}

fn default_high_risk_p_claim() -> f64 {
    0.25
}

/// Referral thresholds, both taken from configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnderwritingThresholds {
    /// Refer when p90 - p50 is above this amount
    #[serde(default = "default_max_spread")]
    pub max_uncertainty_spread: f64,

    /// Refer when p_claim is above this probability
    #[serde(default = "default_high_risk_p_claim")]
    pub high_risk_p_claim: f64,
}

impl Default for UnderwritingThresholds {
    fn default() -> Self {
        Self {
            max_uncertainty_spread: default_max_spread(),
            high_risk_p_claim: default_high_risk_p_claim(),
        }
    }
}

impl UnderwritingThresholds {
    pub fn validate(&self) -> Result<(), LoadError> {
        if !self.max_uncertainty_spread.is_finite() || self.max_uncertainty_spread < 0.0 {
            return Err(LoadError::invalid(
                "underwriting",
                format!("max_uncertainty_spread must be finite and >= 0, got {}", self.max_uncertainty_spread),
            ));
        }
        if !(0.0..=1.0).contains(&self.high_risk_p_claim) {
            return Err(LoadError::invalid(
                "underwriting",
                format!("high_risk_p_claim must be in [0, 1], got {}", self.high_risk_p_claim),
            ));
        }
        Ok(())
    }
}

/// Why a quote was routed to manual review
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ReferralReason {
    WideUncertainty { spread: f64, threshold: f64 },
    HighClaimProbability { p_claim: f64, threshold: f64 },
}

/// Every rule that fires, spread rule first
pub fn referral_reasons(
    risk: &RiskScore,
    uncertainty: &UncertaintyBand,
    thresholds: &UnderwritingThresholds,
) -> Vec<ReferralReason> {
    let mut reasons = Vec::new();
    let spread = uncertainty.spread();
    if spread > thresholds.max_uncertainty_spread {
        reasons.push(ReferralReason::WideUncertainty {
            spread,
            threshold: thresholds.max_uncertainty_spread,
        });
    }
    if risk.p_claim > thresholds.high_risk_p_claim {
        reasons.push(ReferralReason::HighClaimProbability {
            p_claim: risk.p_claim,
            threshold: thresholds.high_risk_p_claim,
        });
    }
    reasons
}

/// True when the quote needs human review before binding
pub fn decide_underwriting(
    risk: &RiskScore,
    uncertainty: &UncertaintyBand,
    thresholds: &UnderwritingThresholds,
) -> bool {
    !referral_reasons(risk, uncertainty, thresholds).is_empty()
}

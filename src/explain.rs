//! Quote explanations: ranked premium factors and what-if recalculations
//!
//! What-if premiums always come from `PricingEngine::price`, so the table can
//! never drift from the headline premium.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::catalog::{ProductTemplate, RESERVED_FACTOR_NAMES};
use crate::error::{LoadError, QuoteError};
use crate::pricing::{PremiumBreakdown, PricingEngine};
use crate::profile::{PolicyholderProfile, RevenueBand};
use crate::scoring::{RiskScore, UncertaintyBand};

/// One premium component and its share of the premium
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorContribution {
    pub factor: String,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExplanationReport {
    /// Weight descending, ties by factor name ascending
    pub top_factors: Vec<FactorContribution>,
    /// Scenario label -> premium under that scenario
    pub what_if: BTreeMap<String, f64>,
}

/// A hypothetical change to the inputs of a quote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WhatIf {
    /// Profile change: more claims history
    AddPriorClaims { count: u32 },
    /// Profile change: monthly revenue scaled. An explicit band only moves
    /// in the direction of the change.
    ScaleRevenue { factor: f64 },
    /// Profile change: alarm fitted
    InstallAlarm,
    /// Stress: p_claim scaled (capped at 1)
    ScaleClaimProbability { factor: f64 },
    /// Stress: p90 moved so the spread is scaled, p50 unchanged
    ScaleUncertaintySpread { factor: f64 },
}

impl WhatIf {
    /// Scenarios shown when the configuration does not list any
    pub fn defaults() -> Vec<WhatIf> {
        vec![
            WhatIf::AddPriorClaims { count: 1 },
            WhatIf::ScaleRevenue { factor: 0.9 },
            WhatIf::InstallAlarm,
            WhatIf::ScaleClaimProbability { factor: 1.2 },
            WhatIf::ScaleUncertaintySpread { factor: 2.0 },
        ]
    }

    pub fn label(&self) -> String {
        match self {
            WhatIf::AddPriorClaims { count: 1 } => "+1 prior claim".to_string(),
            WhatIf::AddPriorClaims { count } => format!("+{} prior claims", count),
            WhatIf::ScaleRevenue { factor } => {
                let pct = ((factor - 1.0) * 100.0).round() as i64;
                format!("revenue {:+}%", pct)
            }
            WhatIf::InstallAlarm => "alarm installed".to_string(),
            WhatIf::ScaleClaimProbability { factor } => format!("p_claim x{}", factor),
            WhatIf::ScaleUncertaintySpread { factor } => format!("spread x{}", factor),
        }
    }

    pub fn validate(&self) -> Result<(), LoadError> {
        let factor = match self {
            WhatIf::ScaleRevenue { factor }
            | WhatIf::ScaleClaimProbability { factor }
            | WhatIf::ScaleUncertaintySpread { factor } => *factor,
            WhatIf::AddPriorClaims { .. } | WhatIf::InstallAlarm => return Ok(()),
        };
        if !factor.is_finite() || factor <= 0.0 {
            return Err(LoadError::invalid(
                "what_if",
                format!("{}: factor must be finite and > 0, got {}", self.label(), factor),
            ));
        }
        Ok(())
    }

    /// Changed profile for scenarios that need re-scoring, `None` for stresses
    pub fn perturb_profile(&self, profile: &PolicyholderProfile) -> Option<PolicyholderProfile> {
        let mut changed = profile.clone();
        match self {
            WhatIf::AddPriorClaims { count } => {
                changed.prior_claims = changed.prior_claims.saturating_add(*count);
            }
            WhatIf::ScaleRevenue { factor } => {
                changed.revenue_monthly *= factor;
                if let Some(explicit) = profile.revenue_band {
                    let derived = RevenueBand::from_monthly_revenue(changed.revenue_monthly);
                    changed.revenue_band = Some(if *factor <= 1.0 {
                        explicit.min(derived)
                    } else {
                        explicit.max(derived)
                    });
                }
            }
            WhatIf::InstallAlarm => {
                changed.security.alarm = true;
            }
            WhatIf::ScaleClaimProbability { .. } | WhatIf::ScaleUncertaintySpread { .. } => return None,
        }
        Some(changed)
    }

    /// Stressed scores; scores pass through unchanged for profile scenarios
    pub fn stress(&self, risk: &RiskScore, uncertainty: &UncertaintyBand) -> (RiskScore, UncertaintyBand) {
        match self {
            WhatIf::ScaleClaimProbability { factor } => (
                RiskScore::new((risk.p_claim * factor).clamp(0.0, 1.0), risk.expected_cost),
                *uncertainty,
            ),
            WhatIf::ScaleUncertaintySpread { factor } => (
                *risk,
                UncertaintyBand::new(uncertainty.p50, uncertainty.p50 + uncertainty.spread() * factor.max(0.0)),
            ),
            _ => (*risk, *uncertainty),
        }
    }
}

/// Validate every scenario and reject two that share a label
pub fn validate_scenarios(scenarios: &[WhatIf]) -> Result<(), LoadError> {
    let mut seen = BTreeSet::new();
    for scenario in scenarios {
        scenario.validate()?;
        let label = scenario.label();
        if !seen.insert(label.clone()) {
            return Err(LoadError::invalid("what_if", format!("duplicate scenario label `{}`", label)));
        }
    }
    Ok(())
}

/// Rank premium components by their share of the premium
pub fn rank_factors(breakdown: &PremiumBreakdown, premium: f64) -> Vec<FactorContribution> {
    if !(premium > 0.0) {
        return Vec::new();
    }

    let [expected_loss, uncertainty_loading, minimum_loading] = RESERVED_FACTOR_NAMES;
    let mut components: Vec<(String, f64)> = vec![
        (expected_loss.to_string(), breakdown.expected_loss),
        (uncertainty_loading.to_string(), breakdown.uncertainty_loading),
        (minimum_loading.to_string(), breakdown.minimum_loading_topup),
    ];
    components.extend(breakdown.fixed_loadings.iter().map(|(k, v)| (k.clone(), *v)));

    let mut factors: Vec<FactorContribution> = components
        .into_iter()
        .map(|(factor, amount)| FactorContribution {
            factor,
            weight: amount * breakdown.premium_multiplier / premium,
        })
        .filter(|f| f.weight > 0.0)
        .collect();

    factors.sort_by(|a, b| b.weight.total_cmp(&a.weight).then_with(|| a.factor.cmp(&b.factor)));
    factors
}

/// Build the explanation for a priced quote.
///
/// `rescore` produces scores for perturbed profiles; its failures propagate.
/// Every scenario keeps `template`.
#[allow(clippy::too_many_arguments)]
pub fn explain<F>(
    profile: &PolicyholderProfile,
    risk: &RiskScore,
    uncertainty: &UncertaintyBand,
    template: &ProductTemplate,
    premium: f64,
    engine: &PricingEngine,
    scenarios: &[WhatIf],
    rescore: F,
) -> Result<ExplanationReport, QuoteError>
where
    F: Fn(&PolicyholderProfile) -> Result<(RiskScore, UncertaintyBand), QuoteError>,
{
    let breakdown = engine.price(risk, uncertainty, template).breakdown;
    let top_factors = rank_factors(&breakdown, premium);

    let mut what_if = BTreeMap::new();
    for scenario in scenarios {
        let (base_risk, base_band) = match scenario.perturb_profile(profile) {
            Some(changed) => rescore(&changed)?,
            None => (*risk, *uncertainty),
        };
        let (stressed_risk, stressed_band) = scenario.stress(&base_risk, &base_band);
        let priced = engine.price(&stressed_risk, &stressed_band, template);
        what_if.insert(scenario.label(), priced.premium);
    }

    Ok(ExplanationReport { top_factors, what_if })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TemplateCatalog;
    use crate::error::ScorerKind;
    use crate::pricing::{CoverageRule, UncertaintyLoading};

    fn breakdown(expected_loss: f64, uncertainty: f64, fixed: &[(&str, f64)], topup: f64) -> PremiumBreakdown {
        PremiumBreakdown {
            expected_loss,
            uncertainty_loading: uncertainty,
            fixed_loadings: fixed.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            minimum_loading_topup: topup,
            premium_multiplier: 2.0,
        }
    }

    #[test]
    fn test_labels() {
        assert_eq!(WhatIf::AddPriorClaims { count: 1 }.label(), "+1 prior claim");
        assert_eq!(WhatIf::AddPriorClaims { count: 3 }.label(), "+3 prior claims");
        assert_eq!(WhatIf::ScaleRevenue { factor: 0.9 }.label(), "revenue -10%");
        assert_eq!(WhatIf::ScaleRevenue { factor: 1.25 }.label(), "revenue +25%");
        assert_eq!(WhatIf::InstallAlarm.label(), "alarm installed");
        assert_eq!(WhatIf::ScaleClaimProbability { factor: 1.2 }.label(), "p_claim x1.2");
        assert_eq!(WhatIf::ScaleUncertaintySpread { factor: 2.0 }.label(), "spread x2");
    }

    #[test]
    fn test_rank_factors_ordering() {
        // premium = (100 + 50 + 50 + 25) * 2 = 450
        let b = breakdown(100.0, 50.0, &[("admin", 50.0), ("cash_handling", 25.0)], 0.0);
        let factors = rank_factors(&b, 450.0);
        let names: Vec<&str> = factors.iter().map(|f| f.factor.as_str()).collect();
        // admin and uncertainty_loading tie, broken by name
        assert_eq!(names, vec!["expected_loss", "admin", "uncertainty_loading", "cash_handling"]);
        let total: f64 = factors.iter().map(|f| f.weight).sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_rank_factors_zero_premium() {
        let b = breakdown(0.0, 0.0, &[], 0.0);
        assert!(rank_factors(&b, 0.0).is_empty());
    }

    #[test]
    fn test_stress_scenarios() {
        let risk = RiskScore::new(0.9, 1_000.0);
        let band = UncertaintyBand::new(500.0, 800.0);

        let (r, b) = WhatIf::ScaleClaimProbability { factor: 1.5 }.stress(&risk, &band);
        assert_eq!(r.p_claim, 1.0);
        assert_eq!(b, band);

        let (r, b) = WhatIf::ScaleUncertaintySpread { factor: 2.0 }.stress(&risk, &band);
        assert_eq!(r, risk);
        assert_eq!(b, UncertaintyBand::new(500.0, 1_100.0));
    }

    #[test]
    fn test_perturb_profile() {
        let mut profile = PolicyholderProfile::new("grocery", "Sfax", 8_500.0, 40_000.0, 3);
        profile.revenue_band = Some(RevenueBand::High);

        let changed = WhatIf::ScaleRevenue { factor: 0.9 }.perturb_profile(&profile).unwrap();
        assert!((changed.revenue_monthly - 7_650.0).abs() < 1e-9);
        assert_eq!(changed.effective_revenue_band(), RevenueBand::Medium);

        let changed = WhatIf::AddPriorClaims { count: 2 }.perturb_profile(&profile).unwrap();
        assert_eq!(changed.prior_claims, 2);

        assert!(WhatIf::ScaleClaimProbability { factor: 1.1 }.perturb_profile(&profile).is_none());
    }

    #[test]
    fn test_revenue_cut_never_raises_explicit_band() {
        // Explicit low band on revenue that would derive as high
        let mut profile = PolicyholderProfile::new("grocery", "Sfax", 9_000.0, 40_000.0, 3);
        profile.revenue_band = Some(RevenueBand::Low);

        let cut = WhatIf::ScaleRevenue { factor: 0.9 }.perturb_profile(&profile).unwrap();
        assert_eq!(cut.revenue_band, Some(RevenueBand::Low));

        let raised = WhatIf::ScaleRevenue { factor: 1.5 }.perturb_profile(&profile).unwrap();
        assert_eq!(raised.revenue_band, Some(RevenueBand::High));

        // Derived bands follow the new revenue
        profile.revenue_band = None;
        let cut = WhatIf::ScaleRevenue { factor: 0.5 }.perturb_profile(&profile).unwrap();
        assert_eq!(cut.revenue_band, None);
        assert_eq!(cut.effective_revenue_band(), RevenueBand::Medium);
    }

    #[test]
    fn test_validate_factor() {
        assert!(WhatIf::ScaleRevenue { factor: 0.0 }.validate().is_err());
        assert!(WhatIf::ScaleUncertaintySpread { factor: f64::INFINITY }.validate().is_err());
        assert!(WhatIf::InstallAlarm.validate().is_ok());
    }

    #[test]
    fn test_validate_scenarios_rejects_duplicate_labels() {
        assert!(validate_scenarios(&WhatIf::defaults()).is_ok());

        let err = validate_scenarios(&[WhatIf::ScaleRevenue { factor: 0.9 }, WhatIf::ScaleRevenue { factor: 0.904 }])
            .unwrap_err();
        assert!(err.to_string().contains("revenue -10%"), "{}", err);

        assert!(validate_scenarios(&[WhatIf::InstallAlarm, WhatIf::InstallAlarm]).is_err());
        assert!(validate_scenarios(&[WhatIf::ScaleRevenue { factor: -1.0 }]).is_err());
    }

    #[test]
    fn test_what_if_matches_direct_price() {
        let catalog = TemplateCatalog::default_catalog();
        let template = catalog.get("T3_NIGHT").unwrap();
        let engine = PricingEngine::with_rule(UncertaintyLoading::default(), CoverageRule::Template);
        let profile = PolicyholderProfile::new("grocery", "Sfax", 5_000.0, 40_000.0, 3);

        let risk = RiskScore::new(0.15, 2_500.0);
        let band = UncertaintyBand::new(2_000.0, 3_000.0);
        let premium = engine.price(&risk, &band, template).premium;

        // Each extra prior claim adds 0.05 to p_claim
        let rescore = |p: &PolicyholderProfile| -> Result<(RiskScore, UncertaintyBand), QuoteError> {
            Ok((RiskScore::new(0.15 + 0.05 * p.prior_claims as f64, 2_500.0), band))
        };

        let report = explain(
            &profile, &risk, &band, template, premium, &engine, &WhatIf::defaults(), rescore,
        )
        .unwrap();

        assert_eq!(report.what_if.len(), 5);
        assert_eq!(
            report.what_if["+1 prior claim"],
            engine.price(&RiskScore::new(0.20, 2_500.0), &band, template).premium
        );
        assert_eq!(
            report.what_if["p_claim x1.2"],
            engine.price(&RiskScore::new(0.15 * 1.2, 2_500.0), &band, template).premium
        );
        assert_eq!(
            report.what_if["spread x2"],
            engine.price(&risk, &UncertaintyBand::new(2_000.0, 4_000.0), template).premium
        );
        assert!(report.what_if["+1 prior claim"] > premium);
        assert_eq!(report.top_factors[0].factor, "uncertainty_loading");
    }

    #[test]
    fn test_rescore_failure_propagates() {
        let catalog = TemplateCatalog::default_catalog();
        let template = catalog.default_template();
        let engine = PricingEngine::default();
        let profile = PolicyholderProfile::new("cafe", "Tunis", 4_000.0, 10_000.0, 2);
        let risk = RiskScore::new(0.1, 1_000.0);
        let band = UncertaintyBand::new(900.0, 1_000.0);

        let failing = |_: &PolicyholderProfile| -> Result<(RiskScore, UncertaintyBand), QuoteError> {
            Err(QuoteError::ScoringUnavailable { scorer: ScorerKind::Frequency, reason: "down".to_string() })
        };

        let err = explain(
            &profile, &risk, &band, template, 100.0, &engine, &[WhatIf::InstallAlarm], failing,
        )
        .unwrap_err();
        assert!(matches!(err, QuoteError::ScoringUnavailable { scorer: ScorerKind::Frequency, .. }));

        // Stress-only scenarios never call the scorers
        let report = explain(
            &profile, &risk, &band, template, 100.0, &engine,
            &[WhatIf::ScaleClaimProbability { factor: 2.0 }], failing,
        )
        .unwrap();
        assert_eq!(report.what_if.len(), 1);
    }
}

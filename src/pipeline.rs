//! Quote pipeline
//!
//! validate -> score -> select template -> price -> underwriting -> explain.
//! The pipeline holds no mutable state, so one instance can quote many
//! profiles concurrently.

use log::{debug, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::catalog::{ProductTemplate, RouteKey, TemplateCatalog, TemplateSelection};
use crate::config::PricingConfig;
use crate::error::{QuoteError, ScorerKind};
use crate::explain::{self, ExplanationReport, WhatIf};
use crate::pricing::{
    referral_reasons, CoveragePolicy, PremiumBreakdown, PricedTerms, PricingEngine, ReferralReason,
    UnderwritingThresholds,
};
use crate::profile::PolicyholderProfile;
use crate::scoring::{RiskScore, ScoringModels, UncertaintyBand, UncertaintyLevel};

/// A priced, explained and flagged quote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub template_id: String,
    pub template_name: String,
    pub coverages: Vec<String>,
    /// Default template used because no route matched
    pub template_fallback: bool,
    /// Catalog route that selected the template; `None` on fallback
    pub matched_route: Option<RouteKey>,
    /// Derived routing inputs and the route (or fallback) behind the template choice
    pub selection_reasons: Vec<String>,

    pub premium: f64,
    pub capital: f64,
    pub deductible: f64,

    /// Requires manual underwriting review before binding
    pub underwriting_flag: bool,
    pub referral_reasons: Vec<ReferralReason>,
    /// Premium is above the applicant's budget. The premium itself is not capped.
    pub exceeds_budget: bool,

    pub risk: RiskScore,
    pub uncertainty: UncertaintyBand,
    pub uncertainty_level: UncertaintyLevel,
    pub breakdown: PremiumBreakdown,
    pub explanation: ExplanationReport,
}

pub struct QuotePipeline {
    models: ScoringModels,
    catalog: TemplateCatalog,
    engine: PricingEngine,
    underwriting: UnderwritingThresholds,
    scenarios: Vec<WhatIf>,
}

impl QuotePipeline {
    pub fn new(models: ScoringModels, catalog: TemplateCatalog, config: PricingConfig) -> Self {
        Self {
            models,
            catalog,
            engine: PricingEngine::with_rule(config.uncertainty_loading, config.coverage),
            underwriting: config.underwriting,
            scenarios: config.what_if,
        }
    }

    /// Reference models, built-in catalog and default configuration
    pub fn reference() -> Self {
        Self::new(ScoringModels::reference(), TemplateCatalog::default_catalog(), PricingConfig::default_pricing())
    }

    /// Replace the config-selected coverage rule with a custom policy
    pub fn with_coverage_policy(mut self, policy: Box<dyn CoveragePolicy>) -> Self {
        self.engine.set_coverage_policy(policy);
        self
    }

    pub fn catalog(&self) -> &TemplateCatalog {
        &self.catalog
    }

    pub fn scenarios(&self) -> &[WhatIf] {
        &self.scenarios
    }

    /// Call the three scorers and reject unusable outputs
    pub fn score(&self, profile: &PolicyholderProfile) -> Result<(RiskScore, UncertaintyBand), QuoteError> {
        let p_claim = self
            .models
            .frequency
            .p_claim(profile)
            .map_err(|e| QuoteError::scoring(ScorerKind::Frequency, e.to_string()))?;
        if !p_claim.is_finite() || !(0.0..=1.0).contains(&p_claim) {
            return Err(QuoteError::scoring(
                ScorerKind::Frequency,
                format!("p_claim must be in [0, 1], got {}", p_claim),
            ));
        }

        let expected_cost = self
            .models
            .severity
            .expected_cost(profile)
            .map_err(|e| QuoteError::scoring(ScorerKind::Severity, e.to_string()))?;
        if !expected_cost.is_finite() || expected_cost < 0.0 {
            return Err(QuoteError::scoring(
                ScorerKind::Severity,
                format!("expected_cost must be finite and >= 0, got {}", expected_cost),
            ));
        }

        let band = self
            .models
            .uncertainty
            .band(profile)
            .map_err(|e| QuoteError::scoring(ScorerKind::Uncertainty, e.to_string()))?;
        if !band.p50.is_finite() || !band.p90.is_finite() || band.p50 < 0.0 || band.p90 < band.p50 {
            return Err(QuoteError::scoring(
                ScorerKind::Uncertainty,
                format!("band must satisfy p90 >= p50 >= 0, got p50={} p90={}", band.p50, band.p90),
            ));
        }

        Ok((RiskScore::new(p_claim, expected_cost), band))
    }

    /// Routed template, or the default one (logged) when no route matches
    pub fn select_template(&self, profile: &PolicyholderProfile) -> TemplateSelection<'_> {
        let selection = self.catalog.select(profile);
        if selection.fallback {
            warn!(
                "no template route for business type `{}`, using default template {}",
                profile.category(),
                selection.template.id
            );
        }
        selection
    }

    pub fn price(&self, risk: &RiskScore, uncertainty: &UncertaintyBand, template: &ProductTemplate) -> PricedTerms {
        self.engine.price(risk, uncertainty, template)
    }

    pub fn decide_underwriting(&self, risk: &RiskScore, uncertainty: &UncertaintyBand) -> bool {
        crate::pricing::decide_underwriting(risk, uncertainty, &self.underwriting)
    }

    /// Explanation using the configured what-if scenarios
    pub fn explain(
        &self,
        profile: &PolicyholderProfile,
        risk: &RiskScore,
        uncertainty: &UncertaintyBand,
        template: &ProductTemplate,
        premium: f64,
    ) -> Result<ExplanationReport, QuoteError> {
        self.explain_with(profile, risk, uncertainty, template, premium, &self.scenarios)
    }

    fn explain_with(
        &self,
        profile: &PolicyholderProfile,
        risk: &RiskScore,
        uncertainty: &UncertaintyBand,
        template: &ProductTemplate,
        premium: f64,
        scenarios: &[WhatIf],
    ) -> Result<ExplanationReport, QuoteError> {
        explain::explain(profile, risk, uncertainty, template, premium, &self.engine, scenarios, |p| {
            self.score(p)
        })
    }

    pub fn quote(&self, profile: &PolicyholderProfile) -> Result<Quote, QuoteError> {
        self.quote_with_scenarios(profile, &self.scenarios)
    }

    /// Quote with a per-request what-if list instead of the configured one
    pub fn quote_with_scenarios(
        &self,
        profile: &PolicyholderProfile,
        scenarios: &[WhatIf],
    ) -> Result<Quote, QuoteError> {
        profile.validate()?;
        explain::validate_scenarios(scenarios).map_err(|e| QuoteError::invalid("what_if", e.to_string()))?;

        let (risk, uncertainty) = self.score(profile)?;
        debug!(
            "scored {}: p_claim={:.4} expected_cost={:.2} p50={:.2} p90={:.2}",
            profile.category(),
            risk.p_claim,
            risk.expected_cost,
            uncertainty.p50,
            uncertainty.p90
        );

        let selection = self.select_template(profile);
        let template = selection.template;
        debug!("selected template {} ({})", template.id, selection.reasons.join(", "));

        let priced = self.price(&risk, &uncertainty, template);
        if priced.premium <= 0.0 {
            warn!(
                "zero premium for business type `{}` under template {}",
                profile.category(),
                template.id
            );
        }
        debug!(
            "priced {}: premium={:.2} capital={:.2} deductible={:.2}",
            template.id, priced.premium, priced.capital, priced.deductible
        );

        let reasons = referral_reasons(&risk, &uncertainty, &self.underwriting);
        let underwriting_flag = !reasons.is_empty();
        if underwriting_flag {
            debug!("referred to underwriting: {:?}", reasons);
        }

        let explanation = self.explain_with(profile, &risk, &uncertainty, template, priced.premium, scenarios)?;

        let exceeds_budget = profile
            .budget_constraint
            .map_or(false, |budget| priced.premium > budget);

        Ok(Quote {
            template_id: template.id.clone(),
            template_name: template.name.clone(),
            coverages: template.coverages.clone(),
            template_fallback: selection.fallback,
            matched_route: selection.route.cloned(),
            selection_reasons: selection.reasons,
            premium: priced.premium,
            capital: priced.capital,
            deductible: priced.deductible,
            underwriting_flag,
            referral_reasons: reasons,
            exceeds_budget,
            risk,
            uncertainty,
            uncertainty_level: uncertainty.level(),
            breakdown: priced.breakdown,
            explanation,
        })
    }

    /// Quote many profiles in parallel; results keep the input order
    pub fn quote_batch(&self, profiles: &[PolicyholderProfile]) -> Vec<Result<Quote, QuoteError>> {
        profiles.par_iter().map(|profile| self.quote(profile)).collect()
    }
}

impl std::fmt::Debug for QuotePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuotePipeline")
            .field("catalog", &self.catalog)
            .field("engine", &self.engine)
            .field("underwriting", &self.underwriting)
            .field("scenarios", &self.scenarios)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScoringError;
    use crate::pricing::{CoverageRule, CoverageTerms, UncertaintyLoading};
    use crate::profile::{load_profiles, AssetTier, RevenueBand};
    use approx::assert_relative_eq;
    use std::path::Path;

    fn fixed_models(p_claim: f64, expected_cost: f64, p50: f64, p90: f64) -> ScoringModels {
        ScoringModels::new(
            move |_: &PolicyholderProfile| -> Result<f64, ScoringError> { Ok(p_claim) },
            move |_: &PolicyholderProfile| -> Result<f64, ScoringError> { Ok(expected_cost) },
            move |_: &PolicyholderProfile| -> Result<UncertaintyBand, ScoringError> {
                Ok(UncertaintyBand::new(p50, p90))
            },
        )
    }

    fn template_config() -> PricingConfig {
        PricingConfig {
            coverage: CoverageRule::Template,
            uncertainty_loading: UncertaintyLoading::Linear { rate: 0.5 },
            ..PricingConfig::default_pricing()
        }
    }

    fn grocery() -> PolicyholderProfile {
        let mut p = PolicyholderProfile::new("grocery", "Sfax", 5_000.0, 40_000.0, 3);
        p.years_active = 6;
        p.shop_area_m2 = 45.0;
        p.security.extinguisher = true;
        p
    }

    #[test]
    fn test_quote_with_fixed_scores() {
        let pipeline = QuotePipeline::new(
            fixed_models(0.1, 1_000.0, 900.0, 1_200.0),
            TemplateCatalog::default_catalog(),
            template_config(),
        );
        let quote = pipeline.quote(&grocery()).unwrap();

        // T1_ESS: (100 + 150 + 20 admin) * 1.38
        assert_eq!(quote.template_id, "T1_ESS");
        assert!(!quote.template_fallback);
        assert_relative_eq!(quote.premium, 372.6, epsilon = 1e-9);
        assert_eq!(quote.capital, 20_000.0);
        assert_eq!(quote.deductible, 800.0);
        assert!(!quote.underwriting_flag);
        assert!(quote.referral_reasons.is_empty());
        assert_eq!(quote.uncertainty_level, UncertaintyLevel::Low);
        assert_eq!(quote.explanation.top_factors[0].factor, "uncertainty_loading");
    }

    #[test]
    fn test_quote_is_deterministic() {
        let pipeline = QuotePipeline::reference();
        let profile = grocery();
        assert_eq!(pipeline.quote(&profile).unwrap(), pipeline.quote(&profile).unwrap());
    }

    #[test]
    fn test_unknown_business_type_falls_back() {
        let pipeline = QuotePipeline::reference();
        let mut profile = grocery();
        profile.business_type = "bookshop".to_string();

        let quote = pipeline.quote(&profile).unwrap();
        assert!(quote.template_fallback);
        assert!(quote.matched_route.is_none());
        assert!(quote.selection_reasons.contains(&"no_route:bookshop".to_string()));
        assert_eq!(quote.template_id, pipeline.catalog().default_template().id);
        assert!(quote.premium > 0.0);
    }

    #[test]
    fn test_route_qualifiers() {
        let pipeline = QuotePipeline::reference();
        let mut profile = grocery();
        profile.open_at_night = true;
        assert_eq!(pipeline.quote(&profile).unwrap().template_id, "T3_NIGHT");

        profile.open_at_night = false;
        profile.revenue_monthly = 12_000.0;
        assert_eq!(pipeline.quote(&profile).unwrap().template_id, "T2_PLUS");
    }

    #[test]
    fn test_what_if_matches_direct_price() {
        let pipeline = QuotePipeline::reference();
        let profile = grocery();
        let quote = pipeline.quote(&profile).unwrap();
        let template = pipeline.catalog().get(&quote.template_id).unwrap();

        let mut claimed = profile.clone();
        claimed.prior_claims += 1;
        let (risk, band) = pipeline.score(&claimed).unwrap();
        assert_eq!(
            quote.explanation.what_if["+1 prior claim"],
            pipeline.price(&risk, &band, template).premium
        );

        let mut alarmed = profile.clone();
        alarmed.security.alarm = true;
        let (risk, band) = pipeline.score(&alarmed).unwrap();
        assert_eq!(
            quote.explanation.what_if["alarm installed"],
            pipeline.price(&risk, &band, template).premium
        );
        assert!(quote.explanation.what_if["alarm installed"] <= quote.premium);

        let stressed = RiskScore::new((quote.risk.p_claim * 1.2).min(1.0), quote.risk.expected_cost);
        assert_eq!(
            quote.explanation.what_if["p_claim x1.2"],
            pipeline.price(&stressed, &quote.uncertainty, template).premium
        );
    }

    #[test]
    fn test_per_request_scenarios() {
        let pipeline = QuotePipeline::reference();
        let quote = pipeline
            .quote_with_scenarios(&grocery(), &[WhatIf::AddPriorClaims { count: 2 }])
            .unwrap();
        let labels: Vec<&str> = quote.explanation.what_if.keys().map(|k| k.as_str()).collect();
        assert_eq!(labels, vec!["+2 prior claims"]);

        let err = pipeline
            .quote_with_scenarios(&grocery(), &[WhatIf::ScaleRevenue { factor: 0.0 }])
            .unwrap_err();
        assert!(matches!(err, QuoteError::InvalidProfile { field: "what_if", .. }));

        // 0.9 and 0.904 both label as "revenue -10%"
        let err = pipeline
            .quote_with_scenarios(
                &grocery(),
                &[WhatIf::ScaleRevenue { factor: 0.9 }, WhatIf::ScaleRevenue { factor: 0.904 }],
            )
            .unwrap_err();
        assert!(matches!(err, QuoteError::InvalidProfile { field: "what_if", .. }));
        assert!(err.to_string().contains("duplicate"), "{}", err);
    }

    #[test]
    fn test_revenue_cut_keeps_explicit_band() {
        let pipeline = QuotePipeline::reference();
        let mut profile = grocery();
        profile.revenue_monthly = 9_000.0;
        profile.revenue_band = Some(RevenueBand::Low);

        let quote = pipeline
            .quote_with_scenarios(&profile, &[WhatIf::ScaleRevenue { factor: 0.9 }])
            .unwrap();
        assert!(quote.explanation.what_if["revenue -10%"] <= quote.premium);
    }

    #[test]
    fn test_high_assets_route_to_plus_template() {
        let pipeline = QuotePipeline::reference();
        let mut profile = grocery();
        profile.revenue_monthly = 9_000.0;
        profile.revenue_band = Some(RevenueBand::Low);
        profile.assets_value = 250_000.0;

        let quote = pipeline.quote(&profile).unwrap();
        assert_eq!(quote.template_id, "T2_PLUS");
        assert_eq!(
            quote.matched_route,
            Some(RouteKey::new("grocery", None, None).with_asset_tier(Some(AssetTier::High)))
        );
        assert_eq!(
            quote.selection_reasons,
            vec!["asset_tier:high".to_string(), "route:grocery band=* night=* assets=high".to_string()]
        );
    }

    #[test]
    fn test_invalid_profile_is_rejected() {
        let pipeline = QuotePipeline::reference();
        let mut profile = grocery();
        profile.location_risk_tier = 7;
        assert!(matches!(
            pipeline.quote(&profile),
            Err(QuoteError::InvalidProfile { field: "location_risk_tier", .. })
        ));
    }

    #[test]
    fn test_scorer_failure_propagates() {
        let models = ScoringModels::new(
            |_: &PolicyholderProfile| -> Result<f64, ScoringError> {
                Err(ScoringError::Unavailable("connection refused".to_string()))
            },
            |_: &PolicyholderProfile| -> Result<f64, ScoringError> { Ok(1_000.0) },
            |_: &PolicyholderProfile| -> Result<UncertaintyBand, ScoringError> {
                Ok(UncertaintyBand::new(900.0, 1_200.0))
            },
        );
        let pipeline = QuotePipeline::new(models, TemplateCatalog::default_catalog(), PricingConfig::default());
        let err = pipeline.quote(&grocery()).unwrap_err();
        assert_eq!(
            err,
            QuoteError::ScoringUnavailable {
                scorer: ScorerKind::Frequency,
                reason: "model unavailable: connection refused".to_string(),
            }
        );
    }

    #[test]
    fn test_invalid_scorer_output() {
        let catalog = TemplateCatalog::default_catalog();

        let pipeline = QuotePipeline::new(fixed_models(1.5, 1_000.0, 900.0, 1_200.0), catalog.clone(), template_config());
        assert!(matches!(
            pipeline.quote(&grocery()),
            Err(QuoteError::ScoringUnavailable { scorer: ScorerKind::Frequency, .. })
        ));

        let pipeline = QuotePipeline::new(fixed_models(0.1, -5.0, 900.0, 1_200.0), catalog.clone(), template_config());
        assert!(matches!(
            pipeline.quote(&grocery()),
            Err(QuoteError::ScoringUnavailable { scorer: ScorerKind::Severity, .. })
        ));

        let pipeline = QuotePipeline::new(fixed_models(0.1, 1_000.0, 1_200.0, 900.0), catalog, template_config());
        assert!(matches!(
            pipeline.quote(&grocery()),
            Err(QuoteError::ScoringUnavailable { scorer: ScorerKind::Uncertainty, .. })
        ));
    }

    #[test]
    fn test_underwriting_and_budget() {
        let pipeline = QuotePipeline::new(
            fixed_models(0.3, 1_000.0, 900.0, 3_500.0),
            TemplateCatalog::default_catalog(),
            template_config(),
        );
        let mut profile = grocery();
        profile.budget_constraint = Some(100.0);

        let quote = pipeline.quote(&profile).unwrap();
        assert!(quote.underwriting_flag);
        assert_eq!(quote.referral_reasons.len(), 2);
        assert!(quote.exceeds_budget);
        assert!(quote.premium > 100.0);
        assert!(pipeline.decide_underwriting(&quote.risk, &quote.uncertainty));
    }

    #[test]
    fn test_custom_coverage_policy() {
        let pipeline = QuotePipeline::new(
            fixed_models(0.1, 1_000.0, 900.0, 1_200.0),
            TemplateCatalog::default_catalog(),
            template_config(),
        )
        .with_coverage_policy(Box::new(|t: &ProductTemplate, _: &RiskScore| CoverageTerms {
            capital: t.capital / 2.0,
            deductible: t.deductible * 100.0,
        }));
        let quote = pipeline.quote(&grocery()).unwrap();
        assert_eq!(quote.capital, 10_000.0);
        assert_eq!(quote.deductible, 10_000.0);
    }

    #[test]
    fn test_batch_preserves_order() {
        let pipeline = QuotePipeline::reference();
        let mut profiles = load_profiles(Path::new("data/profiles/sample_profiles.csv")).unwrap();
        let mut broken = grocery();
        broken.governorate = String::new();
        profiles.insert(2, broken);

        let results = pipeline.quote_batch(&profiles);
        assert_eq!(results.len(), profiles.len());
        assert!(results[2].is_err());
        for (profile, result) in profiles.iter().zip(&results) {
            match result {
                Ok(quote) => assert_eq!(quote, &pipeline.quote(profile).unwrap()),
                Err(err) => assert_eq!(err, &pipeline.quote(profile).unwrap_err()),
            }
        }
    }

    #[test]
    fn test_quote_serializes() {
        let quote = QuotePipeline::reference().quote(&grocery()).unwrap();
        let json = serde_json::to_value(&quote).unwrap();
        assert_eq!(json["template_id"], "T1_ESS");
        assert_eq!(json["matched_route"]["business_type"], "grocery");
        assert!(json["selection_reasons"].is_array());
        assert!(json["explanation"]["what_if"].is_object());
        assert_eq!(json["uncertainty_level"], serde_json::to_value(quote.uncertainty_level).unwrap());
    }
}

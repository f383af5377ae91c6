//! Claim frequency model
//!
//! Logistic link: p_claim = 1 / (1 + exp(-eta))

use std::sync::Arc;

use super::features::{design_terms, LinearPredictor};
use super::geo::GeoProxies;
use super::FrequencyScorer;
use crate::error::ScoringError;
use crate::profile::PolicyholderProfile;

/// Logistic regression over the profile design terms
#[derive(Debug, Clone)]
pub struct LogisticFrequencyModel {
    predictor: LinearPredictor,
    geo: Arc<GeoProxies>,
}

impl LogisticFrequencyModel {
    pub fn new(predictor: LinearPredictor) -> Self {
        Self {
            predictor,
            geo: Arc::new(GeoProxies::default()),
        }
    }

    /// Use a loaded governorate table instead of the built-in one
    pub fn with_geo(mut self, geo: Arc<GeoProxies>) -> Self {
        self.geo = geo;
        self
    }

    /// Calibrated coefficients shipped with the crate (mirrors data/models/frequency_coefficients.csv)
    pub fn default_predictor() -> LinearPredictor {
        LinearPredictor::new(
            -3.1,
            &[
                ("prior_claims", 0.35),
                ("location_tier", 0.20),
                ("years_active", -0.03),
                ("log_assets", 0.04),
                ("open_at_night", 0.45),
                ("alarm", -0.30),
                ("camera", -0.15),
                ("extinguisher", -0.10),
                ("activity:jewelry", 0.35),
                ("activity:electronics", 0.25),
                ("activity:pharmacy", 0.10),
                ("revenue_band:high", 0.10),
                ("density_index", 0.10),
                ("poi_index", 0.05),
            ],
        )
    }

    pub fn predictor(&self) -> &LinearPredictor {
        &self.predictor
    }
}

impl Default for LogisticFrequencyModel {
    fn default() -> Self {
        Self::new(Self::default_predictor())
    }
}

impl FrequencyScorer for LogisticFrequencyModel {
    fn p_claim(&self, profile: &PolicyholderProfile) -> Result<f64, ScoringError> {
        let eta = self.predictor.eta(&design_terms(profile, &self.geo));
        let p = 1.0 / (1.0 + (-eta).exp());
        if !p.is_finite() {
            return Err(ScoringError::NonFinite("p_claim"));
        }
        Ok(p.clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn night_grocery() -> PolicyholderProfile {
        let mut p = PolicyholderProfile::new("grocery", "Sfax", 5_000.0, 40_000.0, 3);
        p.open_at_night = true;
        p.years_active = 4;
        p.prior_claims = 1;
        p.security.camera = true;
        p.security.extinguisher = true;
        p
    }

    #[test]
    fn test_probability_in_range() {
        let model = LogisticFrequencyModel::default();
        let p = model.p_claim(&night_grocery()).unwrap();
        assert!(p > 0.10 && p < 0.25, "p_claim = {}", p);
    }

    #[test]
    fn test_prior_claims_raise_frequency() {
        let model = LogisticFrequencyModel::default();
        let base = night_grocery();
        let mut worse = base.clone();
        worse.prior_claims += 2;
        assert!(model.p_claim(&worse).unwrap() > model.p_claim(&base).unwrap());
    }

    #[test]
    fn test_alarm_lowers_frequency() {
        let model = LogisticFrequencyModel::default();
        let base = night_grocery();
        let mut protected = base.clone();
        protected.security.alarm = true;
        assert!(model.p_claim(&protected).unwrap() < model.p_claim(&base).unwrap());
    }

    #[test]
    fn test_governorate_changes_frequency() {
        let model = LogisticFrequencyModel::default();
        let mut tunis = night_grocery();
        tunis.governorate = "Tunis".to_string();
        let mut kasserine = night_grocery();
        kasserine.governorate = "Kasserine".to_string();

        let dense = model.p_claim(&tunis).unwrap();
        let sparse = model.p_claim(&kasserine).unwrap();
        assert!(dense > sparse, "tunis {} vs kasserine {}", dense, sparse);

        // A custom table can neutralise location
        let flat = GeoProxies::new(vec![], GeoProxies::default().fallback()).unwrap();
        let model = model.with_geo(Arc::new(flat));
        assert_eq!(model.p_claim(&tunis).unwrap(), model.p_claim(&kasserine).unwrap());
    }

    #[test]
    fn test_zero_predictor_is_half() {
        let model = LogisticFrequencyModel::new(LinearPredictor::default());
        let p = model.p_claim(&night_grocery()).unwrap();
        assert!((p - 0.5).abs() < 1e-12);
    }
}

//! Claim severity model: gamma GLM with log link, expected_cost = exp(eta)

use std::sync::Arc;

use super::features::{design_terms, LinearPredictor};
use super::geo::GeoProxies;
use super::SeverityScorer;
use crate::error::ScoringError;
use crate::profile::PolicyholderProfile;

#[derive(Debug, Clone)]
pub struct GammaSeverityModel {
    predictor: LinearPredictor,
    geo: Arc<GeoProxies>,
}

impl GammaSeverityModel {
    pub fn new(predictor: LinearPredictor) -> Self {
        Self {
            predictor,
            geo: Arc::new(GeoProxies::default()),
        }
    }

    pub fn with_geo(mut self, geo: Arc<GeoProxies>) -> Self {
        self.geo = geo;
        self
    }

    /// Mirrors data/models/severity_coefficients.csv
    pub fn default_predictor() -> LinearPredictor {
        LinearPredictor::new(
            5.0,
            &[
                ("log_assets", 0.25),
                ("location_tier", 0.05),
                ("shop_area_m2", 0.002),
                ("extinguisher", -0.15),
                ("open_at_night", 0.10),
                ("activity:jewelry", 0.45),
                ("activity:electronics", 0.30),
                ("activity:pharmacy", 0.20),
                ("revenue_band:high", 0.10),
            ],
        )
    }
}

impl Default for GammaSeverityModel {
    fn default() -> Self {
        Self::new(Self::default_predictor())
    }
}

impl SeverityScorer for GammaSeverityModel {
    fn expected_cost(&self, profile: &PolicyholderProfile) -> Result<f64, ScoringError> {
        let cost = self.predictor.eta(&design_terms(profile, &self.geo)).exp();
        if !cost.is_finite() {
            return Err(ScoringError::NonFinite("expected_cost"));
        }
        Ok(cost)
    }
}

//! Cost uncertainty model
//!
//! Treats the claim cost as log-normal: the median comes from one log-link
//! predictor, the log-scale dispersion from another, and the 90th percentile
//! is `p50 * exp(Z_90 * sigma)`.

use std::sync::Arc;

use super::features::{design_terms, LinearPredictor};
use super::geo::GeoProxies;
use super::{UncertaintyBand, UncertaintyScorer};
use crate::error::ScoringError;
use crate::profile::PolicyholderProfile;

/// Standard normal 90th percentile
pub const Z_90: f64 = 1.2815515655446004;

#[derive(Debug, Clone)]
pub struct LogNormalUncertaintyModel {
    median: LinearPredictor,
    sigma: LinearPredictor,
    geo: Arc<GeoProxies>,
}

impl LogNormalUncertaintyModel {
    pub fn new(median: LinearPredictor, sigma: LinearPredictor) -> Self {
        Self {
            median,
            sigma,
            geo: Arc::new(GeoProxies::default()),
        }
    }

    pub fn with_geo(mut self, geo: Arc<GeoProxies>) -> Self {
        self.geo = geo;
        self
    }

    /// Mirrors data/models/uncertainty_median_coefficients.csv
    pub fn default_median() -> LinearPredictor {
        LinearPredictor::new(
            4.95,
            &[
                ("log_assets", 0.25),
                ("location_tier", 0.05),
                ("activity:jewelry", 0.40),
                ("activity:electronics", 0.25),
            ],
        )
    }

    /// Mirrors data/models/uncertainty_sigma_coefficients.csv
    pub fn default_sigma() -> LinearPredictor {
        LinearPredictor::new(
            -1.1,
            &[
                ("years_active", -0.05),
                ("prior_claims", 0.10),
                ("open_at_night", 0.20),
                ("location_tier", 0.05),
            ],
        )
    }
}

impl Default for LogNormalUncertaintyModel {
    fn default() -> Self {
        Self::new(Self::default_median(), Self::default_sigma())
    }
}

impl UncertaintyScorer for LogNormalUncertaintyModel {
    fn band(&self, profile: &PolicyholderProfile) -> Result<UncertaintyBand, ScoringError> {
        let terms = design_terms(profile, &self.geo);
        let p50 = self.median.eta(&terms).exp();
        let sigma = self.sigma.eta(&terms).exp();
        let p90 = p50 * (Z_90 * sigma).exp();

        if !p50.is_finite() {
            return Err(ScoringError::NonFinite("p50"));
        }
        if !p90.is_finite() {
            return Err(ScoringError::NonFinite("p90"));
        }
        Ok(UncertaintyBand::new(p50, p90))
    }
}

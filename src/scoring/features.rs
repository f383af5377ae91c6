//! Design terms and linear predictor shared by the reference GLMs

use std::collections::HashMap;

use super::geo::GeoProxies;
use crate::profile::PolicyholderProfile;

/// Name of the intercept row in coefficient files
pub const INTERCEPT: &str = "intercept";

/// Expand a profile into named regressors.
///
/// Numeric terms use the raw value (monetary amounts on a `ln(1+x)` scale),
/// flags are 0/1, and the categorical fields become `activity:<type>`,
/// `revenue_band:<band>` and `governorate:<name>` indicators. The governorate
/// also feeds `density_index` and `poi_index` through `geo`.
pub fn design_terms(profile: &PolicyholderProfile, geo: &GeoProxies) -> Vec<(String, f64)> {
    let flag = |b: bool| if b { 1.0 } else { 0.0 };
    let (density_index, poi_index) = geo.indices(&profile.governorate);
    vec![
        ("prior_claims".to_string(), profile.prior_claims as f64),
        ("location_tier".to_string(), profile.location_risk_tier as f64),
        ("years_active".to_string(), profile.years_active as f64),
        ("log_assets".to_string(), profile.assets_value.max(0.0).ln_1p()),
        ("log_revenue".to_string(), profile.revenue_monthly.max(0.0).ln_1p()),
        ("shop_area_m2".to_string(), profile.shop_area_m2),
        ("open_at_night".to_string(), flag(profile.open_at_night)),
        ("alarm".to_string(), flag(profile.security.alarm)),
        ("camera".to_string(), flag(profile.security.camera)),
        ("extinguisher".to_string(), flag(profile.security.extinguisher)),
        (format!("activity:{}", profile.category()), 1.0),
        (format!("revenue_band:{}", profile.effective_revenue_band()), 1.0),
        ("density_index".to_string(), density_index),
        ("poi_index".to_string(), poi_index),
        (format!("governorate:{}", profile.governorate.trim().to_lowercase()), 1.0),
    ]
}

/// Intercept plus named coefficients. Terms without a coefficient contribute 0.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LinearPredictor {
    pub intercept: f64,
    pub coefficients: HashMap<String, f64>,
}

impl LinearPredictor {
    pub fn new(intercept: f64, coefficients: &[(&str, f64)]) -> Self {
        Self {
            intercept,
            coefficients: coefficients.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        }
    }

    /// Build from `term -> coefficient` rows, pulling out the intercept row
    pub fn from_loaded(loaded: &HashMap<String, f64>) -> Self {
        let mut coefficients = loaded.clone();
        let intercept = coefficients.remove(INTERCEPT).unwrap_or(0.0);
        Self { intercept, coefficients }
    }

    pub fn coefficient(&self, term: &str) -> f64 {
        self.coefficients.get(term).copied().unwrap_or(0.0)
    }

    /// eta = intercept + sum(coef * value)
    pub fn eta(&self, terms: &[(String, f64)]) -> f64 {
        terms
            .iter()
            .map(|(term, value)| self.coefficient(term) * value)
            .fold(self.intercept, |acc, x| acc + x)
    }
}

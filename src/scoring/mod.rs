//! Scoring collaborators: claim frequency, claim severity and cost uncertainty
//!
//! The pipeline only sees the three capability traits below. Any model can sit
//! behind them: a remote inference service, a closure in a test, or the
//! reference GLMs shipped in this module.

mod features;
mod frequency;
pub mod geo;
mod severity;
mod uncertainty;
pub mod loader;

pub use features::{design_terms, LinearPredictor};
pub use geo::{GeoProxies, GeoProxy};
pub use frequency::LogisticFrequencyModel;
pub use severity::GammaSeverityModel;
pub use uncertainty::{LogNormalUncertaintyModel, Z_90};
pub use loader::ModelCoefficients;

use serde::{Deserialize, Serialize};

use crate::error::ScoringError;
use crate::profile::PolicyholderProfile;

/// Relative spread at or above which uncertainty is MEDIUM
pub const MEDIUM_UNCERTAINTY: f64 = 0.40;

/// Relative spread at or above which uncertainty is HIGH
pub const HIGH_UNCERTAINTY: f64 = 0.70;

/// Output of the frequency and severity models
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskScore {
    /// Probability of at least one claim in the policy period, in [0, 1]
    pub p_claim: f64,
    /// Expected cost given a claim, >= 0
    pub expected_cost: f64,
}

impl RiskScore {
    pub fn new(p_claim: f64, expected_cost: f64) -> Self {
        Self { p_claim, expected_cost }
    }

    pub fn expected_loss(&self) -> f64 {
        self.p_claim * self.expected_cost
    }
}

/// Qualitative uncertainty bucket for reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UncertaintyLevel {
    Low,
    Medium,
    High,
}

/// Stress-tested cost scenarios (median and 90th percentile)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UncertaintyBand {
    pub p50: f64,
    pub p90: f64,
}

impl UncertaintyBand {
    pub fn new(p50: f64, p90: f64) -> Self {
        Self { p50, p90 }
    }

    /// Absolute width of the band, never negative
    pub fn spread(&self) -> f64 {
        (self.p90 - self.p50).max(0.0)
    }

    /// Spread as a share of the 90th percentile, in [0, 1]
    pub fn relative_spread(&self) -> f64 {
        if self.p90 > 0.0 {
            (self.spread() / self.p90).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    pub fn level(&self) -> UncertaintyLevel {
        let score = self.relative_spread();
        if score >= HIGH_UNCERTAINTY {
            UncertaintyLevel::High
        } else if score >= MEDIUM_UNCERTAINTY {
            UncertaintyLevel::Medium
        } else {
            UncertaintyLevel::Low
        }
    }
}

/// Estimates the probability of at least one claim
pub trait FrequencyScorer: Send + Sync {
    fn p_claim(&self, profile: &PolicyholderProfile) -> Result<f64, ScoringError>;
}

/// Estimates the expected cost given a claim occurs
pub trait SeverityScorer: Send + Sync {
    fn expected_cost(&self, profile: &PolicyholderProfile) -> Result<f64, ScoringError>;
}

/// Produces stress-tested cost percentiles
pub trait UncertaintyScorer: Send + Sync {
    fn band(&self, profile: &PolicyholderProfile) -> Result<UncertaintyBand, ScoringError>;
}

impl<F> FrequencyScorer for F
where
    F: Fn(&PolicyholderProfile) -> Result<f64, ScoringError> + Send + Sync,
{
    fn p_claim(&self, profile: &PolicyholderProfile) -> Result<f64, ScoringError> {
        self(profile)
    }
}

impl<F> SeverityScorer for F
where
    F: Fn(&PolicyholderProfile) -> Result<f64, ScoringError> + Send + Sync,
{
    fn expected_cost(&self, profile: &PolicyholderProfile) -> Result<f64, ScoringError> {
        self(profile)
    }
}

impl<F> UncertaintyScorer for F
where
    F: Fn(&PolicyholderProfile) -> Result<UncertaintyBand, ScoringError> + Send + Sync,
{
    fn band(&self, profile: &PolicyholderProfile) -> Result<UncertaintyBand, ScoringError> {
        self(profile)
    }
}

/// The three collaborators the pipeline consumes
pub struct ScoringModels {
    pub frequency: Box<dyn FrequencyScorer>,
    pub severity: Box<dyn SeverityScorer>,
    pub uncertainty: Box<dyn UncertaintyScorer>,
}

impl ScoringModels {
    pub fn new(
        frequency: impl FrequencyScorer + 'static,
        severity: impl SeverityScorer + 'static,
        uncertainty: impl UncertaintyScorer + 'static,
    ) -> Self {
        Self {
            frequency: Box::new(frequency),
            severity: Box::new(severity),
            uncertainty: Box::new(uncertainty),
        }
    }

    /// Reference GLMs with built-in coefficients
    pub fn reference() -> Self {
        Self::from_coefficients(ModelCoefficients::default())
    }

    /// Reference GLMs with coefficients loaded from CSV files in `path`
    pub fn from_csv_path(path: &std::path::Path) -> Result<Self, crate::error::LoadError> {
        Ok(Self::from_coefficients(ModelCoefficients::load_from(path)?))
    }

    pub fn from_coefficients(coefficients: ModelCoefficients) -> Self {
        let geo = std::sync::Arc::new(coefficients.geo);
        Self::new(
            LogisticFrequencyModel::new(coefficients.frequency).with_geo(geo.clone()),
            GammaSeverityModel::new(coefficients.severity).with_geo(geo.clone()),
            LogNormalUncertaintyModel::new(coefficients.uncertainty_median, coefficients.uncertainty_sigma)
                .with_geo(geo),
        )
    }
}

impl std::fmt::Debug for ScoringModels {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoringModels").finish_non_exhaustive()
    }
}

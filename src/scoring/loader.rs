//! CSV-based coefficient loader for the reference scoring models
//!
//! Each file has a header row and `term,coefficient` rows. The `intercept`
//! row is the model intercept. `geo_proxies.csv` holds the governorate table
//! the design terms are built from.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use super::features::LinearPredictor;
use super::geo::GeoProxies;
use super::{GammaSeverityModel, LogNormalUncertaintyModel, LogisticFrequencyModel};
use crate::error::LoadError;

/// Default path to the coefficient directory
pub const DEFAULT_MODELS_PATH: &str = "data/models";

/// Load one `term,coefficient` file
pub fn load_coefficients(path: &Path) -> Result<HashMap<String, f64>, LoadError> {
    let file = File::open(path)?;
    let mut reader = csv::Reader::from_reader(file);

    let mut coefficients = HashMap::new();

    for result in reader.records() {
        let record = result?;
        let term = record.get(0).unwrap_or("").trim().to_string();
        let raw = record.get(1).unwrap_or("").trim();
        let coef: f64 = raw
            .parse()
            .map_err(|_| LoadError::invalid("coefficient", format!("`{}` for term `{}`", raw, term)))?;
        if term.is_empty() {
            return Err(LoadError::invalid("coefficient", "empty term name"));
        }
        if !coef.is_finite() {
            return Err(LoadError::invalid("coefficient", format!("non-finite value for `{}`", term)));
        }
        coefficients.insert(term, coef);
    }

    Ok(coefficients)
}

/// Coefficients for all reference models
#[derive(Debug, Clone)]
pub struct ModelCoefficients {
    pub frequency: LinearPredictor,
    pub severity: LinearPredictor,
    pub uncertainty_median: LinearPredictor,
    pub uncertainty_sigma: LinearPredictor,
    pub geo: GeoProxies,
}

impl Default for ModelCoefficients {
    fn default() -> Self {
        Self {
            frequency: LogisticFrequencyModel::default_predictor(),
            severity: GammaSeverityModel::default_predictor(),
            uncertainty_median: LogNormalUncertaintyModel::default_median(),
            uncertainty_sigma: LogNormalUncertaintyModel::default_sigma(),
            geo: GeoProxies::default(),
        }
    }
}

impl ModelCoefficients {
    /// Load all coefficient files from the default path
    pub fn load_default() -> Result<Self, LoadError> {
        Self::load_from(Path::new(DEFAULT_MODELS_PATH))
    }

    /// Load all coefficient files from a specific directory
    pub fn load_from(path: &Path) -> Result<Self, LoadError> {
        let load = |name: &str| -> Result<LinearPredictor, LoadError> {
            Ok(LinearPredictor::from_loaded(&load_coefficients(&path.join(name))?))
        };
        Ok(Self {
            frequency: load("frequency_coefficients.csv")?,
            severity: load("severity_coefficients.csv")?,
            uncertainty_median: load("uncertainty_median_coefficients.csv")?,
            uncertainty_sigma: load("uncertainty_sigma_coefficients.csv")?,
            geo: GeoProxies::load(&path.join("geo_proxies.csv"))?,
        })
    }
}

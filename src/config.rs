//! Pricing configuration
//!
//! Loaded from JSON. Every field is optional and falls back to the built-in
//! defaults, so `{}` is a valid configuration.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::LoadError;
use crate::explain::{validate_scenarios, WhatIf};
use crate::pricing::{CoverageRule, UncertaintyLoading, UnderwritingThresholds};

/// Default path to the pricing configuration
pub const DEFAULT_CONFIG_PATH: &str = "data/config/pricing.json";

fn default_what_if() -> Vec<WhatIf> {
    WhatIf::defaults()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingConfig {
    #[serde(default)]
    pub uncertainty_loading: UncertaintyLoading,

    #[serde(default)]
    pub underwriting: UnderwritingThresholds,

    #[serde(default)]
    pub coverage: CoverageRule,

    /// Scenarios priced for every quote's explanation
    #[serde(default = "default_what_if")]
    pub what_if: Vec<WhatIf>,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self::default_pricing()
    }
}

impl PricingConfig {
    /// Built-in configuration
    pub fn default_pricing() -> Self {
        Self {
            uncertainty_loading: UncertaintyLoading::default(),
            underwriting: UnderwritingThresholds::default(),
            coverage: CoverageRule::default(),
            what_if: default_what_if(),
        }
    }

    /// Parse and validate a configuration file
    pub fn from_json_path(path: &Path) -> Result<Self, LoadError> {
        let file = File::open(path)?;
        let config: PricingConfig = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(json: &str) -> Result<Self, LoadError> {
        let config: PricingConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), LoadError> {
        self.uncertainty_loading.validate()?;
        self.underwriting.validate()?;
        self.coverage.validate()?;
        validate_scenarios(&self.what_if)
    }
}

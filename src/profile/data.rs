//! Policyholder profile submitted for a quote

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::QuoteError;

/// Monthly revenue below this is the low band
pub const LOW_REVENUE_CEILING: f64 = 3_000.0;

/// Monthly revenue below this (and above the low ceiling) is the medium band
pub const MEDIUM_REVENUE_CEILING: f64 = 8_000.0;

/// Highest location risk tier
pub const MAX_LOCATION_TIER: u8 = 5;

/// Asset value from which a shop is in the standard tier
pub const STANDARD_ASSETS_FLOOR: f64 = 40_000.0;

/// Asset value from which a shop is a high-exposure risk
pub const HIGH_ASSETS_FLOOR: f64 = 80_000.0;

/// Revenue band used for template routing and model segmentation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RevenueBand {
    Low,
    Medium,
    High,
}

impl RevenueBand {
    /// Determine band from monthly revenue
    pub fn from_monthly_revenue(revenue: f64) -> Self {
        if revenue < LOW_REVENUE_CEILING {
            RevenueBand::Low
        } else if revenue < MEDIUM_REVENUE_CEILING {
            RevenueBand::Medium
        } else {
            RevenueBand::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RevenueBand::Low => "low",
            RevenueBand::Medium => "medium",
            RevenueBand::High => "high",
        }
    }

    /// Parse the lowercase form used in CSV files
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Some(RevenueBand::Low),
            "medium" => Some(RevenueBand::Medium),
            "high" => Some(RevenueBand::High),
            _ => None,
        }
    }
}

impl fmt::Display for RevenueBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Insured asset exposure, used as a template routing qualifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetTier {
    Small,
    Standard,
    High,
}

impl AssetTier {
    pub fn from_assets_value(assets: f64) -> Self {
        if assets >= HIGH_ASSETS_FLOOR {
            AssetTier::High
        } else if assets >= STANDARD_ASSETS_FLOOR {
            AssetTier::Standard
        } else {
            AssetTier::Small
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetTier::Small => "small",
            AssetTier::Standard => "standard",
            AssetTier::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "small" => Some(AssetTier::Small),
            "standard" => Some(AssetTier::Standard),
            "high" => Some(AssetTier::High),
            _ => None,
        }
    }
}

impl fmt::Display for AssetTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// On-premises protection equipment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityFeatures {
    #[serde(default)]
    pub alarm: bool,
    #[serde(default)]
    pub camera: bool,
    #[serde(default)]
    pub extinguisher: bool,
}

/// A small business applying for cover
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyholderProfile {
    /// Activity, e.g. "grocery", "pharmacy". Matched case-insensitively.
    pub business_type: String,

    /// Administrative region of the premises
    pub governorate: String,

    /// Average monthly revenue
    pub revenue_monthly: f64,

    /// Explicit revenue band; derived from `revenue_monthly` when absent
    #[serde(default)]
    pub revenue_band: Option<RevenueBand>,

    /// Insured value of stock and equipment
    pub assets_value: f64,

    #[serde(default)]
    pub shop_area_m2: f64,

    #[serde(default)]
    pub years_active: u32,

    /// Claims filed in previous policy periods
    #[serde(default)]
    pub prior_claims: u32,

    /// 1 (safest) to 5 (riskiest)
    pub location_risk_tier: u8,

    #[serde(default)]
    pub open_at_night: bool,

    #[serde(default)]
    pub security: SecurityFeatures,

    /// Maximum annual premium the applicant is willing to pay
    #[serde(default)]
    pub budget_constraint: Option<f64>,
}

impl PolicyholderProfile {
    /// Create a profile with the required fields; the rest take their defaults
    pub fn new(
        business_type: impl Into<String>,
        governorate: impl Into<String>,
        revenue_monthly: f64,
        assets_value: f64,
        location_risk_tier: u8,
    ) -> Self {
        Self {
            business_type: business_type.into(),
            governorate: governorate.into(),
            revenue_monthly,
            revenue_band: None,
            assets_value,
            shop_area_m2: 0.0,
            years_active: 0,
            prior_claims: 0,
            location_risk_tier,
            open_at_night: false,
            security: SecurityFeatures::default(),
            budget_constraint: None,
        }
    }

    /// Lowercased, trimmed business type used for catalog routing and model terms
    pub fn category(&self) -> String {
        self.business_type.trim().to_ascii_lowercase()
    }

    /// Explicit band if given, otherwise derived from monthly revenue
    pub fn effective_revenue_band(&self) -> RevenueBand {
        self.revenue_band
            .unwrap_or_else(|| RevenueBand::from_monthly_revenue(self.revenue_monthly))
    }

    pub fn asset_tier(&self) -> AssetTier {
        AssetTier::from_assets_value(self.assets_value)
    }

    /// Check required fields and ranges
    pub fn validate(&self) -> Result<(), QuoteError> {
        if self.business_type.trim().is_empty() {
            return Err(QuoteError::invalid("business_type", "must not be empty"));
        }
        if self.governorate.trim().is_empty() {
            return Err(QuoteError::invalid("governorate", "must not be empty"));
        }
        non_negative("revenue_monthly", self.revenue_monthly)?;
        non_negative("assets_value", self.assets_value)?;
        non_negative("shop_area_m2", self.shop_area_m2)?;
        if !(1..=MAX_LOCATION_TIER).contains(&self.location_risk_tier) {
            return Err(QuoteError::invalid(
                "location_risk_tier",
                format!("must be between 1 and {}, got {}", MAX_LOCATION_TIER, self.location_risk_tier),
            ));
        }
        if let Some(budget) = self.budget_constraint {
            non_negative("budget_constraint", budget)?;
        }
        Ok(())
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), QuoteError> {
    if !value.is_finite() {
        return Err(QuoteError::invalid(field, "must be a finite number"));
    }
    if value < 0.0 {
        return Err(QuoteError::invalid(field, format!("must be >= 0, got {}", value)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grocery() -> PolicyholderProfile {
        PolicyholderProfile::new("Grocery", "Sfax", 5_000.0, 40_000.0, 3)
    }

    #[test]
    fn test_revenue_band() {
        assert_eq!(RevenueBand::from_monthly_revenue(0.0), RevenueBand::Low);
        assert_eq!(RevenueBand::from_monthly_revenue(2_999.99), RevenueBand::Low);
        assert_eq!(RevenueBand::from_monthly_revenue(3_000.0), RevenueBand::Medium);
        assert_eq!(RevenueBand::from_monthly_revenue(7_999.0), RevenueBand::Medium);
        assert_eq!(RevenueBand::from_monthly_revenue(8_000.0), RevenueBand::High);
        assert_eq!(RevenueBand::parse(" HIGH "), Some(RevenueBand::High));
        assert_eq!(RevenueBand::parse("huge"), None);
    }

    #[test]
    fn test_asset_tier() {
        assert_eq!(AssetTier::from_assets_value(39_999.0), AssetTier::Small);
        assert_eq!(AssetTier::from_assets_value(40_000.0), AssetTier::Standard);
        assert_eq!(AssetTier::from_assets_value(80_000.0), AssetTier::High);
        assert_eq!(grocery().asset_tier(), AssetTier::Standard);
        assert_eq!(AssetTier::parse("HIGH"), Some(AssetTier::High));
        assert_eq!(AssetTier::parse("medium"), None);
    }

    #[test]
    fn test_effective_band_prefers_explicit() {
        let mut p = grocery();
        assert_eq!(p.effective_revenue_band(), RevenueBand::Medium);
        p.revenue_band = Some(RevenueBand::High);
        assert_eq!(p.effective_revenue_band(), RevenueBand::High);
    }

    #[test]
    fn test_category_normalized() {
        let mut p = grocery();
        p.business_type = "  Pharmacy ".to_string();
        assert_eq!(p.category(), "pharmacy");
    }

    #[test]
    fn test_validate() {
        assert!(grocery().validate().is_ok());

        let mut p = grocery();
        p.business_type = "   ".to_string();
        assert!(matches!(
            p.validate(),
            Err(QuoteError::InvalidProfile { field: "business_type", .. })
        ));

        let mut p = grocery();
        p.location_risk_tier = 0;
        assert!(matches!(
            p.validate(),
            Err(QuoteError::InvalidProfile { field: "location_risk_tier", .. })
        ));

        let mut p = grocery();
        p.assets_value = -1.0;
        assert!(matches!(
            p.validate(),
            Err(QuoteError::InvalidProfile { field: "assets_value", .. })
        ));

        let mut p = grocery();
        p.revenue_monthly = f64::NAN;
        assert!(matches!(
            p.validate(),
            Err(QuoteError::InvalidProfile { field: "revenue_monthly", .. })
        ));

        let mut p = grocery();
        p.budget_constraint = Some(-5.0);
        assert!(matches!(
            p.validate(),
            Err(QuoteError::InvalidProfile { field: "budget_constraint", .. })
        ));
    }

    #[test]
    fn test_deserialize_defaults() {
        let json = r#"{
            "business_type": "cafe",
            "governorate": "Tunis",
            "revenue_monthly": 9000,
            "assets_value": 15000,
            "location_risk_tier": 2,
            "security": {"alarm": true}
        }"#;
        let p: PolicyholderProfile = serde_json::from_str(json).unwrap();
        assert_eq!(p.prior_claims, 0);
        assert!(!p.open_at_night);
        assert!(p.security.alarm);
        assert!(!p.security.camera);
        assert_eq!(p.revenue_band, None);
        assert_eq!(p.effective_revenue_band(), RevenueBand::High);
    }
}

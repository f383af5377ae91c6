//! Product template catalog
//!
//! Templates are selected, never created, by the pipeline. Selection is a
//! lookup table keyed by business type with optional revenue band, night
//! opening and asset tier qualifiers, backed by a designated default template.

pub mod loader;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{LoadError, QuoteError};
use crate::profile::{AssetTier, PolicyholderProfile, RevenueBand};

/// `base_loadings` key holding the template's minimum loading
pub const MINIMUM_LOADING: &str = "minimum";

/// Factor names taken by the premium components that do not come from `base_loadings`
pub const RESERVED_FACTOR_NAMES: [&str; 3] = ["expected_loss", "uncertainty_loading", "minimum_loading"];

/// A named set of tunable pricing parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductTemplate {
    pub id: String,
    pub name: String,
    /// Covered perils, for display
    pub coverages: Vec<String>,
    /// Sum insured ceiling
    pub capital: f64,
    pub deductible: f64,
    pub premium_multiplier: f64,
    /// Factor name -> loading. `minimum` is a floor, every other entry is additive.
    pub base_loadings: BTreeMap<String, f64>,
}

impl ProductTemplate {
    /// Floor on the total loading; 0 when the template defines none
    pub fn minimum_loading(&self) -> f64 {
        self.base_loadings.get(MINIMUM_LOADING).copied().unwrap_or(0.0)
    }

    /// Additive loadings in name order (excludes the minimum)
    pub fn fixed_loadings(&self) -> impl Iterator<Item = (&str, f64)> {
        self.base_loadings
            .iter()
            .filter(|(name, _)| name.as_str() != MINIMUM_LOADING)
            .map(|(name, value)| (name.as_str(), *value))
    }

    pub fn validate(&self) -> Result<(), LoadError> {
        if self.id.trim().is_empty() {
            return Err(LoadError::invalid("template", "empty template id"));
        }
        let finite_non_negative = |what: &str, v: f64| -> Result<(), LoadError> {
            if !v.is_finite() || v < 0.0 {
                return Err(LoadError::invalid(
                    "template",
                    format!("{}: {} must be finite and >= 0, got {}", self.id, what, v),
                ));
            }
            Ok(())
        };
        finite_non_negative("capital", self.capital)?;
        finite_non_negative("deductible", self.deductible)?;
        if self.deductible > self.capital {
            return Err(LoadError::invalid(
                "template",
                format!("{}: deductible {} exceeds capital {}", self.id, self.deductible, self.capital),
            ));
        }
        if !self.premium_multiplier.is_finite() || self.premium_multiplier <= 0.0 {
            return Err(LoadError::invalid(
                "template",
                format!("{}: premium_multiplier must be positive, got {}", self.id, self.premium_multiplier),
            ));
        }
        for (name, value) in &self.base_loadings {
            if RESERVED_FACTOR_NAMES.contains(&name.as_str()) {
                return Err(LoadError::invalid(
                    "template",
                    format!("{}: loading name `{}` is reserved", self.id, name),
                ));
            }
            finite_non_negative(name.as_str(), *value)?;
        }
        Ok(())
    }
}

/// Catalog route key. `None` qualifiers match any value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RouteKey {
    pub business_type: String,
    pub revenue_band: Option<RevenueBand>,
    pub open_at_night: Option<bool>,
    #[serde(default)]
    pub asset_tier: Option<AssetTier>,
}

impl RouteKey {
    pub fn new(business_type: &str, revenue_band: Option<RevenueBand>, open_at_night: Option<bool>) -> Self {
        Self {
            business_type: business_type.trim().to_ascii_lowercase(),
            revenue_band,
            open_at_night,
            asset_tier: None,
        }
    }

    pub fn with_asset_tier(mut self, asset_tier: Option<AssetTier>) -> Self {
        self.asset_tier = asset_tier;
        self
    }

    /// Keys to try for a profile, most specific first.
    ///
    /// Revenue band outranks night opening, which outranks asset tier.
    fn candidates(profile: &PolicyholderProfile) -> Vec<RouteKey> {
        let category = profile.category();
        let band = profile.effective_revenue_band();
        let tier = profile.asset_tier();

        let mut keys = Vec::with_capacity(8);
        for band in [Some(band), None] {
            for night in [Some(profile.open_at_night), None] {
                for tier in [Some(tier), None] {
                    keys.push(RouteKey::new(&category, band, night).with_asset_tier(tier));
                }
            }
        }
        keys
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let any = |v: Option<String>| v.unwrap_or_else(|| "*".to_string());
        write!(
            f,
            "{} band={} night={} assets={}",
            self.business_type,
            any(self.revenue_band.map(|b| b.to_string())),
            any(self.open_at_night.map(|n| n.to_string())),
            any(self.asset_tier.map(|t| t.to_string())),
        )
    }
}

/// Result of template selection
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateSelection<'a> {
    pub template: &'a ProductTemplate,
    /// Route that matched; `None` on fallback
    pub route: Option<&'a RouteKey>,
    /// True when no route matched and the default template was used
    pub fallback: bool,
    /// Derived inputs and the route (or fallback) behind the choice
    pub reasons: Vec<String>,
}

/// Fixed set of templates plus the routing table
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateCatalog {
    templates: BTreeMap<String, ProductTemplate>,
    routes: BTreeMap<RouteKey, String>,
    default_id: String,
}

impl TemplateCatalog {
    /// Build and validate a catalog
    pub fn new(
        templates: Vec<ProductTemplate>,
        routes: Vec<(RouteKey, String)>,
        default_id: &str,
    ) -> Result<Self, LoadError> {
        let mut by_id = BTreeMap::new();
        for template in templates {
            template.validate()?;
            if by_id.contains_key(&template.id) {
                return Err(LoadError::invalid("catalog", format!("duplicate template id {}", template.id)));
            }
            by_id.insert(template.id.clone(), template);
        }

        if !by_id.contains_key(default_id) {
            return Err(LoadError::invalid(
                "catalog",
                format!("default template {} is not defined", default_id),
            ));
        }

        let mut table = BTreeMap::new();
        for (key, template_id) in routes {
            if !by_id.contains_key(&template_id) {
                return Err(LoadError::invalid(
                    "catalog",
                    format!("route {:?} points to unknown template {}", key, template_id),
                ));
            }
            if table.insert(key.clone(), template_id).is_some() {
                return Err(LoadError::invalid("catalog", format!("duplicate route {:?}", key)));
            }
        }

        Ok(Self {
            templates: by_id,
            routes: table,
            default_id: default_id.to_string(),
        })
    }

    /// Built-in catalog (mirrors data/catalog/)
    pub fn default_catalog() -> Self {
        let loadings = |pairs: &[(&str, f64)]| -> BTreeMap<String, f64> {
            pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
        };
        let coverages = |items: &[&str]| -> Vec<String> { items.iter().map(|s| s.to_string()).collect() };

        let templates = vec![
            ProductTemplate {
                id: "T1_ESS".to_string(),
                name: "Commerce Essentiel".to_string(),
                coverages: coverages(&["fire_basic", "water_damage", "liability_basic", "theft_basic"]),
                capital: 20_000.0,
                deductible: 800.0,
                premium_multiplier: 1.38,
                base_loadings: loadings(&[("admin", 20.0), (MINIMUM_LOADING, 50.0)]),
            },
            ProductTemplate {
                id: "T2_PLUS".to_string(),
                name: "Commerce Plus".to_string(),
                coverages: coverages(&[
                    "fire_extended",
                    "water_damage",
                    "liability_extended",
                    "theft_extended",
                    "business_interruption",
                ]),
                capital: 45_000.0,
                deductible: 1_200.0,
                premium_multiplier: 1.42,
                base_loadings: loadings(&[
                    ("admin", 30.0),
                    ("business_interruption", 60.0),
                    (MINIMUM_LOADING, 80.0),
                ]),
            },
            ProductTemplate {
                id: "T3_NIGHT".to_string(),
                name: "Night & Cash Risk".to_string(),
                coverages: coverages(&["theft_extended", "cash_on_premises", "vandalism"]),
                capital: 25_000.0,
                deductible: 1_500.0,
                premium_multiplier: 1.45,
                base_loadings: loadings(&[
                    ("admin", 25.0),
                    ("cash_handling", 70.0),
                    (MINIMUM_LOADING, 90.0),
                ]),
            },
        ];

        let route = |t: &str, band: Option<RevenueBand>, night: Option<bool>, id: &str| {
            (RouteKey::new(t, band, night), id.to_string())
        };
        // T2_PLUS needs standard assets or more; high assets route to it
        let tiered = |t: &str, band: Option<RevenueBand>, tier: AssetTier, id: &str| {
            (RouteKey::new(t, band, None).with_asset_tier(Some(tier)), id.to_string())
        };
        let routes = vec![
            route("grocery", None, None, "T1_ESS"),
            route("grocery", None, Some(true), "T3_NIGHT"),
            route("grocery", Some(RevenueBand::High), None, "T2_PLUS"),
            route("grocery", Some(RevenueBand::High), Some(true), "T3_NIGHT"),
            tiered("grocery", None, AssetTier::High, "T2_PLUS"),
            tiered("grocery", Some(RevenueBand::High), AssetTier::Small, "T1_ESS"),
            route("bakery", None, None, "T1_ESS"),
            route("bakery", None, Some(true), "T3_NIGHT"),
            tiered("bakery", None, AssetTier::High, "T2_PLUS"),
            route("cafe", None, None, "T1_ESS"),
            route("cafe", None, Some(true), "T3_NIGHT"),
            tiered("cafe", None, AssetTier::High, "T2_PLUS"),
            route("restaurant", None, None, "T1_ESS"),
            route("restaurant", None, Some(true), "T3_NIGHT"),
            tiered("restaurant", None, AssetTier::High, "T2_PLUS"),
            route("clothing", None, None, "T1_ESS"),
            route("clothing", Some(RevenueBand::High), None, "T2_PLUS"),
            tiered("clothing", None, AssetTier::High, "T2_PLUS"),
            tiered("clothing", Some(RevenueBand::High), AssetTier::Small, "T1_ESS"),
            route("pharmacy", None, None, "T2_PLUS"),
            route("pharmacy", None, Some(true), "T3_NIGHT"),
            tiered("pharmacy", None, AssetTier::Small, "T1_ESS"),
            route("electronics", None, None, "T2_PLUS"),
            tiered("electronics", None, AssetTier::Small, "T1_ESS"),
            route("jewelry", None, None, "T2_PLUS"),
            tiered("jewelry", None, AssetTier::Small, "T1_ESS"),
        ];

        Self {
            templates: templates.into_iter().map(|t| (t.id.clone(), t)).collect(),
            routes: routes.into_iter().collect(),
            default_id: "T1_ESS".to_string(),
        }
    }

    fn route_for(&self, profile: &PolicyholderProfile) -> Option<(&RouteKey, &ProductTemplate)> {
        RouteKey::candidates(profile).iter().find_map(|key| {
            let (key, id) = self.routes.get_key_value(key)?;
            self.templates.get(id).map(|template| (key, template))
        })
    }

    /// Look up the routed template for a profile
    pub fn lookup(&self, profile: &PolicyholderProfile) -> Result<&ProductTemplate, QuoteError> {
        self.route_for(profile)
            .map(|(_, template)| template)
            .ok_or_else(|| QuoteError::NoMatchingTemplate {
                business_type: profile.category(),
            })
    }

    /// Routed template, or the default one when nothing matches
    pub fn select(&self, profile: &PolicyholderProfile) -> TemplateSelection<'_> {
        let mut reasons = Vec::new();
        if profile.revenue_band.is_none() {
            reasons.push(format!("derived_revenue_band:{}", profile.effective_revenue_band()));
        }
        reasons.push(format!("asset_tier:{}", profile.asset_tier()));

        match self.route_for(profile) {
            Some((key, template)) => {
                reasons.push(format!("route:{}", key));
                TemplateSelection { template, route: Some(key), fallback: false, reasons }
            }
            None => {
                let template = self.default_template();
                reasons.push(format!("no_route:{}", profile.category()));
                reasons.push(format!("default_template:{}", template.id));
                TemplateSelection { template, route: None, fallback: true, reasons }
            }
        }
    }

    pub fn default_template(&self) -> &ProductTemplate {
        // Presence is checked in `new`
        &self.templates[&self.default_id]
    }

    pub fn get(&self, id: &str) -> Option<&ProductTemplate> {
        self.templates.get(id)
    }

    pub fn templates(&self) -> impl Iterator<Item = &ProductTemplate> {
        self.templates.values()
    }

    pub fn routes(&self) -> impl Iterator<Item = (&RouteKey, &str)> {
        self.routes.iter().map(|(k, v)| (k, v.as_str()))
    }
}

impl Default for TemplateCatalog {
    fn default() -> Self {
        Self::default_catalog()
    }
}

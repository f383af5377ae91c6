//! CSV-based catalog loader
//!
//! Reads three files from a catalog directory:
//! - `templates.csv`: one row per template, coverages separated by `;`
//! - `template_loadings.csv`: `template_id,factor,loading`
//! - `template_routes.csv`: `business_type,revenue_band,open_at_night,asset_tier,template_id`,
//!   where `*` (or an empty cell) means "any"; the `asset_tier` column may be omitted

use std::collections::BTreeMap;
use std::path::Path;

use csv::Reader;

use super::{ProductTemplate, RouteKey, TemplateCatalog};
use crate::error::LoadError;
use crate::profile::{AssetTier, RevenueBand};

/// Default path to the catalog directory
pub const DEFAULT_CATALOG_PATH: &str = "data/catalog";

#[derive(Debug, serde::Deserialize)]
struct TemplateRow {
    template_id: String,
    name: String,
    capital: f64,
    deductible: f64,
    premium_multiplier: f64,
    #[serde(default)]
    coverages: String,
    #[serde(default)]
    is_default: bool,
}

#[derive(Debug, serde::Deserialize)]
struct LoadingRow {
    template_id: String,
    factor: String,
    loading: f64,
}

#[derive(Debug, serde::Deserialize)]
struct RouteRow {
    business_type: String,
    #[serde(default)]
    revenue_band: String,
    #[serde(default)]
    open_at_night: String,
    #[serde(default)]
    asset_tier: String,
    template_id: String,
}

fn is_wildcard(raw: &str) -> bool {
    let raw = raw.trim();
    raw.is_empty() || raw == "*"
}

impl RouteRow {
    fn to_route(self) -> Result<(RouteKey, String), LoadError> {
        let revenue_band = if is_wildcard(&self.revenue_band) {
            None
        } else {
            Some(RevenueBand::parse(&self.revenue_band).ok_or_else(|| {
                LoadError::invalid("route", format!("unknown revenue band `{}`", self.revenue_band))
            })?)
        };

        let open_at_night = if is_wildcard(&self.open_at_night) {
            None
        } else {
            match self.open_at_night.trim().to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                other => {
                    return Err(LoadError::invalid("route", format!("open_at_night must be true/false/*, got `{}`", other)))
                }
            }
        };

        let asset_tier = if is_wildcard(&self.asset_tier) {
            None
        } else {
            Some(AssetTier::parse(&self.asset_tier).ok_or_else(|| {
                LoadError::invalid("route", format!("unknown asset tier `{}`", self.asset_tier))
            })?)
        };

        Ok((
            RouteKey::new(&self.business_type, revenue_band, open_at_night).with_asset_tier(asset_tier),
            self.template_id.trim().to_string(),
        ))
    }
}

/// Load a catalog from the default path
pub fn load_default_catalog() -> Result<TemplateCatalog, LoadError> {
    load_catalog(Path::new(DEFAULT_CATALOG_PATH))
}

/// Load and validate a catalog from a directory
pub fn load_catalog(path: &Path) -> Result<TemplateCatalog, LoadError> {
    let mut loadings: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
    let mut reader = Reader::from_path(path.join("template_loadings.csv"))?;
    for result in reader.deserialize() {
        let row: LoadingRow = result?;
        let per_template = loadings.entry(row.template_id.trim().to_string()).or_default();
        if per_template.insert(row.factor.trim().to_string(), row.loading).is_some() {
            return Err(LoadError::invalid(
                "loading",
                format!("duplicate factor `{}` for template {}", row.factor, row.template_id),
            ));
        }
    }

    let mut templates = Vec::new();
    let mut default_id: Option<String> = None;
    let mut reader = Reader::from_path(path.join("templates.csv"))?;
    for result in reader.deserialize() {
        let row: TemplateRow = result?;
        let id = row.template_id.trim().to_string();
        if row.is_default {
            if let Some(previous) = &default_id {
                return Err(LoadError::invalid(
                    "catalog",
                    format!("both {} and {} are marked as default", previous, id),
                ));
            }
            default_id = Some(id.clone());
        }
        templates.push(ProductTemplate {
            base_loadings: loadings.remove(&id).unwrap_or_default(),
            id,
            name: row.name,
            coverages: row
                .coverages
                .split(';')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(String::from)
                .collect(),
            capital: row.capital,
            deductible: row.deductible,
            premium_multiplier: row.premium_multiplier,
        });
    }

    if let Some(orphan) = loadings.keys().next() {
        return Err(LoadError::invalid("loading", format!("loadings for unknown template {}", orphan)));
    }
    let default_id = default_id.ok_or_else(|| LoadError::invalid("catalog", "no template is marked as default"))?;

    let mut routes = Vec::new();
    let mut reader = Reader::from_path(path.join("template_routes.csv"))?;
    for result in reader.deserialize() {
        let row: RouteRow = result?;
        routes.push(row.to_route()?);
    }

    TemplateCatalog::new(templates, routes, &default_id)
}

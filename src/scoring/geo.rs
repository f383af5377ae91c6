//! Governorate-level location proxies
//!
//! Population density and point-of-interest density per km², keyed by
//! governorate. Unknown governorates take the fallback row. The scoring
//! models see both as log ratios against the fallback, so an unknown
//! governorate contributes nothing.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::LoadError;

/// `governorate` value of the fallback row in `geo_proxies.csv`
pub const FALLBACK_ROW: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct GeoProxy {
    pub density_per_km2: f64,
    pub poi_per_km2: f64,
}

impl GeoProxy {
    pub const fn new(density_per_km2: f64, poi_per_km2: f64) -> Self {
        Self { density_per_km2, poi_per_km2 }
    }

    fn validate(&self, governorate: &str) -> Result<(), LoadError> {
        for (name, value) in [("density_per_km2", self.density_per_km2), ("poi_per_km2", self.poi_per_km2)] {
            if !value.is_finite() || value < 0.0 {
                return Err(LoadError::invalid(
                    "geo proxy",
                    format!("{}: {} must be finite and >= 0, got {}", governorate, name, value),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeoProxies {
    by_governorate: BTreeMap<String, GeoProxy>,
    fallback: GeoProxy,
}

fn normalize(governorate: &str) -> String {
    governorate.trim().to_lowercase()
}

impl GeoProxies {
    pub fn new(by_governorate: impl IntoIterator<Item = (String, GeoProxy)>, fallback: GeoProxy) -> Result<Self, LoadError> {
        fallback.validate(FALLBACK_ROW)?;
        let mut table = BTreeMap::new();
        for (governorate, proxy) in by_governorate {
            proxy.validate(&governorate)?;
            if table.insert(normalize(&governorate), proxy).is_some() {
                return Err(LoadError::invalid("geo proxy", format!("duplicate governorate `{}`", governorate)));
            }
        }
        Ok(Self { by_governorate: table, fallback })
    }

    /// Proxies for a governorate, matched case-insensitively
    pub fn get(&self, governorate: &str) -> GeoProxy {
        self.by_governorate
            .get(&normalize(governorate))
            .copied()
            .unwrap_or(self.fallback)
    }

    pub fn is_known(&self, governorate: &str) -> bool {
        self.by_governorate.contains_key(&normalize(governorate))
    }

    pub fn fallback(&self) -> GeoProxy {
        self.fallback
    }

    /// `(density_index, poi_index)`: `ln(1+x) - ln(1+fallback)` for each proxy
    pub fn indices(&self, governorate: &str) -> (f64, f64) {
        let proxy = self.get(governorate);
        (
            proxy.density_per_km2.ln_1p() - self.fallback.density_per_km2.ln_1p(),
            proxy.poi_per_km2.ln_1p() - self.fallback.poi_per_km2.ln_1p(),
        )
    }

    /// Load `governorate,density_per_km2,poi_per_km2` rows; the `*` row is the fallback
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        #[derive(Deserialize)]
        struct Row {
            governorate: String,
            density_per_km2: f64,
            poi_per_km2: f64,
        }

        let mut reader = csv::Reader::from_path(path)?;
        let mut rows = Vec::new();
        let mut fallback = None;
        for result in reader.deserialize() {
            let row: Row = result?;
            let proxy = GeoProxy::new(row.density_per_km2, row.poi_per_km2);
            if row.governorate.trim() == FALLBACK_ROW {
                fallback = Some(proxy);
            } else {
                rows.push((row.governorate, proxy));
            }
        }
        let fallback = fallback.ok_or_else(|| LoadError::invalid("geo proxy", "missing `*` fallback row"))?;
        Self::new(rows, fallback)
    }
}

impl Default for GeoProxies {
    /// Mirrors data/models/geo_proxies.csv
    fn default() -> Self {
        let table = [
            ("tunis", 3_200.0, 140.0),
            ("ariana", 1_300.0, 75.0),
            ("ben arous", 1_000.0, 60.0),
            ("manouba", 420.0, 30.0),
            ("bizerte", 155.0, 15.0),
            ("nabeul", 280.0, 25.0),
            ("sousse", 260.0, 35.0),
            ("monastir", 560.0, 45.0),
            ("sfax", 130.0, 20.0),
            ("kairouan", 85.0, 8.0),
            ("kasserine", 55.0, 5.0),
            ("gafsa", 45.0, 6.0),
            ("gabes", 50.0, 9.0),
            ("medenine", 55.0, 10.0),
        ];
        Self {
            by_governorate: table
                .iter()
                .map(|(g, d, p)| (g.to_string(), GeoProxy::new(*d, *p)))
                .collect(),
            fallback: GeoProxy::new(260.0, 25.0),
        }
    }
}

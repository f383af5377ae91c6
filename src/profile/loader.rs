//! Load batches of profiles from CSV

use super::{PolicyholderProfile, RevenueBand, SecurityFeatures};
use crate::error::LoadError;
use csv::Reader;
use std::path::Path;

/// Raw CSV row; security equipment is flattened into three columns
#[derive(Debug, serde::Deserialize)]
struct CsvRow {
    business_type: String,
    governorate: String,
    revenue_monthly: f64,
    #[serde(default)]
    revenue_band: Option<String>,
    assets_value: f64,
    #[serde(default)]
    shop_area_m2: f64,
    #[serde(default)]
    years_active: u32,
    #[serde(default)]
    prior_claims: u32,
    location_risk_tier: u8,
    #[serde(default)]
    open_at_night: bool,
    #[serde(default)]
    alarm: bool,
    #[serde(default)]
    camera: bool,
    #[serde(default)]
    extinguisher: bool,
    #[serde(default)]
    budget_constraint: Option<f64>,
}

impl CsvRow {
    fn to_profile(self) -> Result<PolicyholderProfile, LoadError> {
        let revenue_band = match self.revenue_band.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(
                RevenueBand::parse(raw)
                    .ok_or_else(|| LoadError::invalid("revenue_band", format!("unknown band `{}`", raw)))?,
            ),
        };

        Ok(PolicyholderProfile {
            business_type: self.business_type,
            governorate: self.governorate,
            revenue_monthly: self.revenue_monthly,
            revenue_band,
            assets_value: self.assets_value,
            shop_area_m2: self.shop_area_m2,
            years_active: self.years_active,
            prior_claims: self.prior_claims,
            location_risk_tier: self.location_risk_tier,
            open_at_night: self.open_at_night,
            security: SecurityFeatures {
                alarm: self.alarm,
                camera: self.camera,
                extinguisher: self.extinguisher,
            },
            budget_constraint: self.budget_constraint,
        })
    }
}

/// Load all profiles from a CSV file
pub fn load_profiles<P: AsRef<Path>>(path: P) -> Result<Vec<PolicyholderProfile>, LoadError> {
    let reader = Reader::from_path(path)?;
    read_profiles(reader)
}

/// Load profiles from any reader (string buffer, stdin)
pub fn load_profiles_from_reader<R: std::io::Read>(reader: R) -> Result<Vec<PolicyholderProfile>, LoadError> {
    read_profiles(Reader::from_reader(reader))
}

fn read_profiles<R: std::io::Read>(mut reader: Reader<R>) -> Result<Vec<PolicyholderProfile>, LoadError> {
    let mut profiles = Vec::new();
    for result in reader.deserialize() {
        let row: CsvRow = result?;
        profiles.push(row.to_profile()?);
    }
    Ok(profiles)
}

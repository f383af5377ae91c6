//! Policyholder profiles and batch loading

mod data;
pub mod loader;

pub use data::{
    AssetTier, PolicyholderProfile, RevenueBand, SecurityFeatures, HIGH_ASSETS_FLOOR, MAX_LOCATION_TIER,
    STANDARD_ASSETS_FLOOR,
};
pub use loader::{load_profiles, load_profiles_from_reader};

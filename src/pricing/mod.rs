//! Premium pricing, coverage terms and underwriting referral

mod coverage;
mod engine;
mod loading;
mod underwriting;

pub use coverage::{CoveragePolicy, CoverageRule, CoverageTerms};
pub use engine::{PremiumBreakdown, PricedTerms, PricingEngine};
pub use loading::{LoadingTier, UncertaintyLoading};
pub use underwriting::{decide_underwriting, referral_reasons, ReferralReason, UnderwritingThresholds};

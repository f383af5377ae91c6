//! Commerce Pricing - quote pipeline for micro-merchant property and liability cover
//!
//! This library provides:
//! - Policyholder profiles with validation and CSV batch loading
//! - Pluggable claim frequency, severity and uncertainty scorers (reference GLMs included)
//! - A product template catalog with routed lookup and default fallback
//! - Premium, capital and deductible pricing with configurable loadings
//! - Underwriting referral and quote explanations with what-if premiums

pub mod catalog;
pub mod config;
pub mod error;
pub mod explain;
pub mod pipeline;
pub mod pricing;
pub mod profile;
pub mod scoring;

// Re-export commonly used types
pub use catalog::{ProductTemplate, TemplateCatalog};
pub use config::PricingConfig;
pub use error::{LoadError, QuoteError, ScorerKind, ScoringError};
pub use explain::{ExplanationReport, FactorContribution, WhatIf};
pub use pipeline::{Quote, QuotePipeline};
pub use pricing::{PricingEngine, UncertaintyLoading, UnderwritingThresholds};
pub use profile::{PolicyholderProfile, RevenueBand};
pub use scoring::{
    FrequencyScorer, RiskScore, ScoringModels, SeverityScorer, UncertaintyBand, UncertaintyScorer,
};

//! AWS Lambda handler for quoting a single profile
//!
//! Accepts `{"profile": {...}, "what_if": [...]}` and returns the quote, or an
//! error message, with the execution time. Catalog, models and configuration
//! are loaded once per cold start from the bundled `data/` directory. A file
//! that is not packaged falls back to the built-in defaults; a file that is
//! packaged but unreadable or invalid fails the cold start.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use commerce_pricing::{
    catalog::loader::load_catalog,
    scoring::ModelCoefficients,
    LoadError, PolicyholderProfile, PricingConfig, Quote, QuotePipeline, ScoringModels, TemplateCatalog, WhatIf,
};
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use log::{info, warn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct QuoteRequest {
    pub profile: PolicyholderProfile,

    /// Overrides the configured what-if scenarios for this request
    #[serde(default)]
    pub what_if: Option<Vec<WhatIf>>,
}

#[derive(Debug, Serialize)]
pub struct QuoteResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote: Option<Quote>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub execution_time_ms: u64,
}

/// Bundled data directory, relative to the function's working directory
const DATA_DIR: &str = "data";

/// Built-in value when the file is missing; any other load error is returned
fn or_builtin<T>(loaded: Result<T, LoadError>, what: &str, builtin: impl FnOnce() -> T) -> Result<T, LoadError> {
    match loaded {
        Ok(value) => Ok(value),
        Err(e) if e.is_not_found() => {
            warn!("{} not packaged ({}), using built-in defaults", what, e);
            Ok(builtin())
        }
        Err(e) => Err(e),
    }
}

fn build_pipeline(data_dir: &Path) -> Result<QuotePipeline, LoadError> {
    let catalog = or_builtin(
        load_catalog(&data_dir.join("catalog")),
        "catalog",
        TemplateCatalog::default_catalog,
    )?;
    let coefficients = or_builtin(
        ModelCoefficients::load_from(&data_dir.join("models")),
        "model coefficients",
        ModelCoefficients::default,
    )?;
    let config = or_builtin(
        PricingConfig::from_json_path(&data_dir.join("config").join("pricing.json")),
        "pricing config",
        PricingConfig::default_pricing,
    )?;
    Ok(QuotePipeline::new(ScoringModels::from_coefficients(coefficients), catalog, config))
}

fn handle(pipeline: &QuotePipeline, request: &QuoteRequest) -> QuoteResponse {
    let start = Instant::now();

    let result = match &request.what_if {
        Some(scenarios) => pipeline.quote_with_scenarios(&request.profile, scenarios),
        None => pipeline.quote(&request.profile),
    };

    let (quote, error) = match result {
        Ok(quote) => (Some(quote), None),
        Err(e) => (None, Some(e.to_string())),
    };

    QuoteResponse {
        quote,
        error,
        execution_time_ms: start.elapsed().as_millis() as u64,
    }
}

async fn handler(pipeline: Arc<QuotePipeline>, event: LambdaEvent<QuoteRequest>) -> Result<QuoteResponse, Error> {
    let response = handle(&pipeline, &event.payload);
    if let Some(err) = &response.error {
        warn!("quote failed: {}", err);
    } else {
        info!("quoted {} in {} ms", event.payload.profile.business_type, response.execution_time_ms);
    }
    Ok(response)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::init();

    let pipeline = Arc::new(build_pipeline(Path::new(DATA_DIR))?);
    run(service_fn(move |event: LambdaEvent<QuoteRequest>| {
        let pipeline = Arc::clone(&pipeline);
        async move { handler(pipeline, event).await }
    }))
    .await
}

//! Commerce Pricing CLI
//!
//! Quote a single profile, quote a CSV batch in parallel, or inspect the catalog.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use commerce_pricing::{
    catalog::loader::load_catalog,
    profile::load_profiles,
    PolicyholderProfile, PricingConfig, QuotePipeline, ScoringModels, TemplateCatalog,
};

#[derive(Parser)]
#[command(name = "commerce_pricing", author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Where pricing inputs come from; built-in defaults when omitted
#[derive(Args)]
struct Sources {
    /// Pricing configuration JSON
    #[arg(long)]
    config: Option<PathBuf>,
    /// Catalog directory (templates.csv, template_loadings.csv, template_routes.csv)
    #[arg(long)]
    catalog: Option<PathBuf>,
    /// Directory with model coefficient CSVs
    #[arg(long)]
    models: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Quote one profile and print the quote as JSON
    Quote {
        /// Profile JSON file
        #[arg(long)]
        profile: PathBuf,
        #[command(flatten)]
        sources: Sources,
    },
    /// Quote every profile in a CSV file and write a summary CSV
    Batch {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        #[command(flatten)]
        sources: Sources,
    },
    /// List templates and routes
    Catalog {
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
}

/// One line of batch output
#[derive(Debug, Serialize)]
struct BatchRow {
    row: usize,
    business_type: String,
    governorate: String,
    template_id: Option<String>,
    template_fallback: Option<bool>,
    premium: Option<f64>,
    capital: Option<f64>,
    deductible: Option<f64>,
    p_claim: Option<f64>,
    expected_cost: Option<f64>,
    uncertainty_level: Option<String>,
    underwriting_flag: Option<bool>,
    exceeds_budget: Option<bool>,
    top_factor: Option<String>,
    error: Option<String>,
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Quote { profile, sources } => run_quote(&profile, &sources),
        Commands::Batch { input, output, sources } => run_batch(&input, &output, &sources),
        Commands::Catalog { catalog } => run_catalog(catalog.as_deref()),
    }
}

fn build_pipeline(sources: &Sources) -> Result<QuotePipeline> {
    let config = match &sources.config {
        Some(path) => PricingConfig::from_json_path(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PricingConfig::default_pricing(),
    };
    let catalog = open_catalog(sources.catalog.as_deref())?;
    let models = match &sources.models {
        Some(path) => ScoringModels::from_csv_path(path)
            .with_context(|| format!("loading model coefficients from {}", path.display()))?,
        None => ScoringModels::reference(),
    };
    Ok(QuotePipeline::new(models, catalog, config))
}

fn open_catalog(path: Option<&Path>) -> Result<TemplateCatalog> {
    match path {
        Some(path) => load_catalog(path).with_context(|| format!("loading catalog from {}", path.display())),
        None => Ok(TemplateCatalog::default_catalog()),
    }
}

fn run_quote(profile_path: &Path, sources: &Sources) -> Result<()> {
    let pipeline = build_pipeline(sources)?;

    let file = File::open(profile_path).with_context(|| format!("opening {}", profile_path.display()))?;
    let profile: PolicyholderProfile = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing profile {}", profile_path.display()))?;

    let quote = pipeline.quote(&profile)?;
    println!("{}", serde_json::to_string_pretty(&quote)?);
    Ok(())
}

fn run_batch(input: &Path, output: &Path, sources: &Sources) -> Result<()> {
    let pipeline = build_pipeline(sources)?;

    let start = Instant::now();
    let profiles = load_profiles(input).with_context(|| format!("loading profiles from {}", input.display()))?;
    println!("Loaded {} profiles in {:?}", profiles.len(), start.elapsed());

    let quote_start = Instant::now();
    let results = pipeline.quote_batch(&profiles);
    println!("Quoted {} profiles in {:?}", results.len(), quote_start.elapsed());

    let mut writer = csv::Writer::from_path(output).with_context(|| format!("creating {}", output.display()))?;
    let mut referred = 0;
    let mut failed = 0;

    for (i, (profile, result)) in profiles.iter().zip(&results).enumerate() {
        let mut row = BatchRow {
            row: i + 1,
            business_type: profile.business_type.clone(),
            governorate: profile.governorate.clone(),
            template_id: None,
            template_fallback: None,
            premium: None,
            capital: None,
            deductible: None,
            p_claim: None,
            expected_cost: None,
            uncertainty_level: None,
            underwriting_flag: None,
            exceeds_budget: None,
            top_factor: None,
            error: None,
        };
        match result {
            Ok(quote) => {
                if quote.underwriting_flag {
                    referred += 1;
                }
                row.template_id = Some(quote.template_id.clone());
                row.template_fallback = Some(quote.template_fallback);
                row.premium = Some(quote.premium);
                row.capital = Some(quote.capital);
                row.deductible = Some(quote.deductible);
                row.p_claim = Some(quote.risk.p_claim);
                row.expected_cost = Some(quote.risk.expected_cost);
                row.uncertainty_level = Some(format!("{:?}", quote.uncertainty_level).to_uppercase());
                row.underwriting_flag = Some(quote.underwriting_flag);
                row.exceeds_budget = Some(quote.exceeds_budget);
                row.top_factor = quote.explanation.top_factors.first().map(|f| f.factor.clone());
            }
            Err(err) => {
                failed += 1;
                row.error = Some(err.to_string());
            }
        }
        writer.serialize(&row)?;
    }
    writer.flush()?;

    println!(
        "Wrote {} rows to {} ({} referred, {} failed)",
        results.len(),
        output.display(),
        referred,
        failed
    );
    Ok(())
}

fn run_catalog(path: Option<&Path>) -> Result<()> {
    let catalog = open_catalog(path)?;
    let default_id = catalog.default_template().id.clone();

    println!("Templates:");
    println!("{:<10} {:<22} {:>10} {:>10} {:>6}  Loadings", "ID", "Name", "Capital", "Deductible", "Mult");
    println!("{}", "-".repeat(90));
    for t in catalog.templates() {
        let loadings: Vec<String> = t.base_loadings.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        println!(
            "{:<10} {:<22} {:>10.2} {:>10.2} {:>6.2}  {}{}",
            t.id,
            t.name,
            t.capital,
            t.deductible,
            t.premium_multiplier,
            loadings.join(", "),
            if t.id == default_id { "  (default)" } else { "" }
        );
    }

    println!();
    println!("Routes:");
    println!("{:<14} {:<8} {:<6} {:<9} Template", "Business", "Band", "Night", "Assets");
    println!("{}", "-".repeat(50));
    for (key, template_id) in catalog.routes() {
        let band = key.revenue_band.map_or("*".to_string(), |b| b.to_string());
        let night = key.open_at_night.map_or("*".to_string(), |n| n.to_string());
        let assets = key.asset_tier.map_or("*".to_string(), |t| t.to_string());
        println!("{:<14} {:<8} {:<6} {:<9} {}", key.business_type, band, night, assets, template_id);
    }
    Ok(())
}

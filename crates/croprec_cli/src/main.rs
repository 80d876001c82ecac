//! Croprec CLI
//!
//! Trains the recommendation model at startup and answers one request.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use croprec_core::{
    BuiltinDataset, CropConfig, CropPipeline, EvaluationReport, EvaluationStrategy, FeatureVector,
    Recommendation,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "croprec")]
#[command(author = "IPPAN Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Deterministic crop recommendations from soil and climate data", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Training CSV (overrides the built-in table)
    #[arg(short, long, global = true)]
    dataset: Option<PathBuf>,

    /// Built-in training table used when no CSV is given
    #[arg(long, global = true, value_enum)]
    builtin: Option<BuiltinArg>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BuiltinArg {
    Sample,
    Kerala,
}

impl From<BuiltinArg> for BuiltinDataset {
    fn from(arg: BuiltinArg) -> Self {
        match arg {
            BuiltinArg::Sample => BuiltinDataset::Sample,
            BuiltinArg::Kerala => BuiltinDataset::Kerala,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Rank the crops best suited to one set of measurements
    Recommend(RecommendArgs),

    /// Report model accuracy
    Evaluate(EvaluateArgs),

    /// List known soil types and crops with their codes
    Categories,
}

#[derive(Args, Debug)]
struct RecommendArgs {
    /// Nitrogen (kg/ha)
    #[arg(long)]
    nitrogen: f64,

    /// Phosphorus (kg/ha)
    #[arg(long)]
    phosphorus: f64,

    /// Potassium (kg/ha)
    #[arg(long)]
    potassium: f64,

    /// Soil pH
    #[arg(long)]
    ph: f64,

    /// Rainfall (mm)
    #[arg(long)]
    rainfall: f64,

    /// Temperature (°C)
    #[arg(long)]
    temperature: f64,

    /// Soil type label, e.g. Loamy
    #[arg(long)]
    soil: String,

    /// Number of crops to show
    #[arg(long)]
    top_n: Option<usize>,

    /// Print JSON instead of a table
    #[arg(long)]
    json: bool,

    /// Leave advisory notes out
    #[arg(long)]
    no_advisory: bool,
}

#[derive(Args, Debug)]
struct EvaluateArgs {
    /// k-fold cross-validation with this many folds (at least 2)
    #[arg(
        long,
        value_parser = clap::value_parser!(u64).range(2..),
        conflicts_with_all = ["holdout", "resubstitution"]
    )]
    k: Option<u64>,

    /// Single split holding out this fraction of rows
    #[arg(long, conflicts_with = "resubstitution")]
    holdout: Option<f64>,

    /// Score the model on its own training rows
    #[arg(long)]
    resubstitution: bool,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,
}

impl EvaluateArgs {
    fn strategy(&self) -> Option<EvaluationStrategy> {
        if self.resubstitution {
            Some(EvaluationStrategy::Resubstitution)
        } else if let Some(test_ratio) = self.holdout {
            Some(EvaluationStrategy::Holdout { test_ratio })
        } else {
            self.k.map(|k| EvaluationStrategy::KFold { k: k as usize })
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    info!("Croprec v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match &cli.config {
        Some(path) => CropConfig::load_from_file(path).context("Failed to load configuration")?,
        None => CropConfig::default(),
    };
    config
        .apply_env_overrides()
        .context("Invalid environment override")?;
    if let Some(builtin) = cli.builtin {
        config.dataset.builtin = builtin.into();
        config.dataset.csv_path = None;
    }
    if let Some(path) = &cli.dataset {
        config.dataset.csv_path = Some(path.clone());
    }
    if let Commands::Recommend(args) = &cli.command {
        if let Some(top_n) = args.top_n {
            config.ranking.top_n = top_n;
        }
        if args.no_advisory {
            config.ranking.include_advisory = false;
        }
    }
    config.validate().context("Invalid configuration")?;

    let dataset = config.dataset.load().context("Failed to load dataset")?;
    info!("Loaded {} training rows", dataset.len());
    for (crop, count) in dataset.crop_counts() {
        info!("  {}: {}", crop, count);
    }

    let mut pipeline = CropPipeline::new(config);
    pipeline.fit(&dataset).context("Failed to train model")?;

    match &cli.command {
        Commands::Recommend(args) => recommend(&pipeline, args),
        Commands::Evaluate(args) => evaluate(&pipeline, args),
        Commands::Categories => categories(&pipeline),
    }
}

fn init_logging(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init()
        .context("Failed to set tracing subscriber")?;

    Ok(())
}

fn recommend(pipeline: &CropPipeline, args: &RecommendArgs) -> Result<()> {
    let query = FeatureVector {
        nitrogen: args.nitrogen,
        phosphorus: args.phosphorus,
        potassium: args.potassium,
        ph: args.ph,
        rainfall: args.rainfall,
        temperature: args.temperature,
        soil_type: args.soil.clone(),
    };

    let recommendation = pipeline
        .recommend(&query)
        .context("Failed to compute recommendation")?;

    if args.json {
        let json = serde_json::to_string_pretty(&recommendation)
            .context("Failed to serialize recommendation")?;
        println!("{}", json);
    } else {
        print_recommendation(&recommendation);
    }
    Ok(())
}

fn print_recommendation(recommendation: &Recommendation) {
    for field in &recommendation.out_of_range {
        println!("⚠️  {} is outside its usual range", field);
    }

    println!("Top crop matches:");
    for crop in &recommendation.crops {
        println!(
            "  {}. {:<10} {:>6.1}%",
            crop.rank,
            crop.crop,
            crop.probability * 100.0
        );
        if let Some(note) = &crop.advisory {
            println!("     {}", note.summary);
            if let Some(economics) = &note.economics {
                println!(
                    "     Yield: {} | Price: {} | Profit: {}",
                    economics.expected_yield, economics.market_price, economics.profit_potential
                );
            }
        }
    }
}

fn evaluate(pipeline: &CropPipeline, args: &EvaluateArgs) -> Result<()> {
    let report = match args.strategy() {
        Some(strategy) => pipeline.evaluate_with(strategy),
        None => pipeline.evaluate(),
    }
    .context("Failed to evaluate model")?;

    if args.json {
        let json =
            serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        println!("{}", json);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &EvaluationReport) {
    println!("Strategy: {:?}", report.strategy);
    println!(
        "Accuracy: {:.2}% ({}/{})",
        report.accuracy * 100.0,
        report.correct,
        report.total
    );
    for (fold, accuracy) in report.fold_accuracies.iter().enumerate() {
        println!("  Fold {}: {:.2}%", fold + 1, accuracy * 100.0);
    }
}

fn categories(pipeline: &CropPipeline) -> Result<()> {
    let model = pipeline.model()?;

    println!("Soil types:");
    for (code, label) in model.soil_types().classes().iter().enumerate() {
        println!("  {} = {}", code, label);
    }
    println!("Crops:");
    for (code, label) in model.crops().classes().iter().enumerate() {
        println!("  {} = {}", code, label);
    }
    Ok(())
}

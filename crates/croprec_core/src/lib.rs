//! Croprec - deterministic crop recommendation
//!
//! Trains a seeded random forest on a table of soil and climate measurements
//! and ranks the crops best suited to a query.

pub mod advisory;
pub mod cart;
pub mod config;
pub mod dataset;
pub mod deterministic;
pub mod encoder;
pub mod errors;
pub mod evaluation;
pub mod forest;
pub mod pipeline;
pub mod ranker;
pub mod schema;
pub mod serving;

use std::path::Path;

pub use advisory::{AdvisoryCatalog, AdvisoryNote, CropEconomics, ADVISORY_PLACEHOLDER};
pub use config::{CropConfig, DatasetConfig, EvaluationConfig, RankingConfig, StrategyKind};
pub use dataset::{BuiltinDataset, Dataset, EncodedDataset};
pub use deterministic::LcgRng;
pub use encoder::CategoryEncoder;
pub use errors::{CropError, Result};
pub use evaluation::{EvaluationReport, EvaluationStrategy};
pub use forest::{ForestConfig, MaxFeatures, RandomForest};
pub use pipeline::{CropPipeline, Recommendation, TrainedModel};
pub use ranker::{rank, CropProbability, PredictionResult, RankedCrop};
pub use schema::{FeatureSchema, FeatureVector, Field, TrainingExample};
pub use serving::ModelHandle;

/// Load a CSV table and return a pipeline trained on it
pub fn train_from_csv(path: &Path, config: CropConfig) -> Result<CropPipeline> {
    let dataset = Dataset::from_csv(path)?;
    let mut pipeline = CropPipeline::new(config);
    pipeline.fit(&dataset)?;
    Ok(pipeline)
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

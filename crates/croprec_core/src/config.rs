//! Pipeline configuration
//!
//! Loaded from TOML; every field has a default so partial files are fine.
//! A handful of `CROPREC_*` environment variables override the file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::dataset::{BuiltinDataset, Dataset};
use crate::errors::{CropError, Result};
use crate::evaluation::EvaluationStrategy;
use crate::forest::ForestConfig;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CropConfig {
    pub forest: ForestConfig,
    pub ranking: RankingConfig,
    pub evaluation: EvaluationConfig,
    pub dataset: DatasetConfig,
}

/// Ranking defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    pub top_n: usize,
    pub include_advisory: bool,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            top_n: 5,
            include_advisory: true,
        }
    }
}

/// Which accuracy methodology to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    KFold,
    Holdout,
    Resubstitution,
}

/// Accuracy reporting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    pub strategy: StrategyKind,
    pub k: usize,
    pub test_ratio: f64,
    pub seed: u64,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::KFold,
            k: 5,
            test_ratio: 0.2,
            seed: 42,
        }
    }
}

impl EvaluationConfig {
    pub fn strategy(&self) -> EvaluationStrategy {
        match self.strategy {
            StrategyKind::KFold => EvaluationStrategy::KFold { k: self.k },
            StrategyKind::Holdout => EvaluationStrategy::Holdout {
                test_ratio: self.test_ratio,
            },
            StrategyKind::Resubstitution => EvaluationStrategy::Resubstitution,
        }
    }
}

/// Training data source; `csv_path` wins over `builtin` when set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub builtin: BuiltinDataset,
    pub csv_path: Option<PathBuf>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            builtin: BuiltinDataset::Kerala,
            csv_path: None,
        }
    }
}

impl DatasetConfig {
    pub fn load(&self) -> Result<Dataset> {
        match &self.csv_path {
            Some(path) => {
                info!("Loading dataset from: {}", path.display());
                Dataset::from_csv(path)
            }
            None => {
                info!("Using built-in {:?} dataset", self.builtin);
                Ok(self.builtin.load())
            }
        }
    }
}

impl CropConfig {
    /// Parse, validate and return the configuration in `path`
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        let content = std::fs::read_to_string(path).map_err(|e| {
            CropError::InvalidConfig(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&content)?;

        info!("Configuration loaded successfully");
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: CropConfig = toml::from_str(content)
            .map_err(|e| CropError::InvalidConfig(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `CROPREC_*` overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`; unparseable values are ignored
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(seed) = parse_override::<u64>(&lookup, "CROPREC_SEED") {
            self.forest.seed = seed;
            self.evaluation.seed = seed;
        }
        if let Some(trees) = parse_override::<usize>(&lookup, "CROPREC_TREES") {
            self.forest.n_trees = trees;
        }
        if let Some(depth) = parse_override::<usize>(&lookup, "CROPREC_MAX_DEPTH") {
            self.forest.max_depth = Some(depth);
        }
        if let Some(top_n) = parse_override::<usize>(&lookup, "CROPREC_TOP_N") {
            self.ranking.top_n = top_n;
        }
        if let Some(path) = lookup("CROPREC_DATASET") {
            if !path.trim().is_empty() {
                self.dataset.csv_path = Some(PathBuf::from(path.trim()));
            }
        }

        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        self.forest.validate()?;

        if self.ranking.top_n == 0 {
            return Err(CropError::InvalidConfig("ranking.top_n must be at least 1".into()));
        }
        if self.evaluation.k < 2 {
            return Err(CropError::InvalidConfig("evaluation.k must be at least 2".into()));
        }
        if !(self.evaluation.test_ratio > 0.0 && self.evaluation.test_ratio < 1.0) {
            return Err(CropError::InvalidConfig(
                "evaluation.test_ratio must lie strictly between 0 and 1".into(),
            ));
        }
        Ok(())
    }
}

fn parse_override<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring {}={:?}: not a valid value", key, raw);
            None
        }
    }
}

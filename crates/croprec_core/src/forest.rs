//! Random forest classifier
//!
//! Bagged CART trees with per-node feature subsampling. Every random draw
//! comes from a per-tree [`LcgRng`] stream derived from the configured seed,
//! so identical data and seed always grow identical forests.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::cart::{CartBuilder, Tree, TreeConfig};
use crate::deterministic::LcgRng;
use crate::errors::{CropError, Result};

/// How many features each node examines
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    /// floor(sqrt(n_features)), at least 1
    Sqrt,
    All,
    Count(usize),
}

impl MaxFeatures {
    pub fn resolve(self, n_features: usize) -> usize {
        let n = match self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().floor() as usize,
            MaxFeatures::All => n_features,
            MaxFeatures::Count(count) => count.min(n_features),
        };
        n.max(1)
    }
}

/// Random forest training configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub bootstrap: bool,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            seed: 42,
        }
    }
}

impl ForestConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_trees == 0 {
            return Err(CropError::InvalidConfig("n_trees must be at least 1".into()));
        }
        if self.min_samples_leaf == 0 {
            return Err(CropError::InvalidConfig(
                "min_samples_leaf must be at least 1".into(),
            ));
        }
        if self.min_samples_split < 2 {
            return Err(CropError::InvalidConfig(
                "min_samples_split must be at least 2".into(),
            ));
        }
        if self.max_features == MaxFeatures::Count(0) {
            return Err(CropError::InvalidConfig(
                "max_features count must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Fitted forest
#[derive(Clone, Debug, Serialize)]
pub struct RandomForest {
    trees: Vec<Tree>,
    n_features: usize,
    n_classes: usize,
    #[serde(skip)]
    importances: Vec<f64>,
}

impl RandomForest {
    /// Train on `features`/`labels`; labels are codes in `0..n_classes`
    pub fn fit(
        config: &ForestConfig,
        features: &[Vec<f64>],
        labels: &[usize],
        n_classes: usize,
    ) -> Result<Self> {
        config.validate()?;

        if features.is_empty() {
            return Err(CropError::EmptyTrainingSet);
        }
        if features.len() != labels.len() {
            return Err(CropError::SchemaMismatch {
                row: features.len().min(labels.len()) + 1,
                reason: format!(
                    "{} feature rows but {} labels",
                    features.len(),
                    labels.len()
                ),
            });
        }
        let n_features = features[0].len();
        if let Some(pos) = features.iter().position(|row| row.len() != n_features) {
            return Err(CropError::SchemaMismatch {
                row: pos + 1,
                reason: format!(
                    "expected {} features, got {}",
                    n_features,
                    features[pos].len()
                ),
            });
        }
        if let Some(&code) = labels.iter().find(|&&code| code >= n_classes) {
            return Err(CropError::InvalidCode {
                column: "label".into(),
                code,
                len: n_classes,
            });
        }
        let distinct: BTreeSet<usize> = labels.iter().copied().collect();
        if distinct.len() < 2 {
            return Err(CropError::LabelCardinalityMismatch {
                found: distinct.len(),
            });
        }

        let tree_config = TreeConfig {
            max_depth: config.max_depth,
            min_samples_split: config.min_samples_split,
            min_samples_leaf: config.min_samples_leaf,
            max_features: config.max_features.resolve(n_features),
        };
        let builder = CartBuilder::new(features, labels, n_classes, tree_config);
        let all_rows: Vec<usize> = (0..features.len()).collect();

        let mut trees = Vec::with_capacity(config.n_trees);
        for tree_idx in 0..config.n_trees {
            let mut rng = LcgRng::for_stream(config.seed, tree_idx as u64);
            let sample = if config.bootstrap {
                rng.bootstrap_indices(features.len())
            } else {
                all_rows.clone()
            };

            let tree = builder.build(&sample, &mut rng);
            debug!(
                tree = tree_idx,
                nodes = tree.nodes.len(),
                depth = tree.depth(),
                "grew tree"
            );
            trees.push(tree);
        }

        let importances = aggregate_importances(&trees, n_features);
        info!(
            trees = trees.len(),
            rows = features.len(),
            features = n_features,
            classes = n_classes,
            "random forest trained"
        );

        Ok(Self {
            trees,
            n_features,
            n_classes,
            importances,
        })
    }

    /// Mean of the trees' leaf distributions, one entry per class code
    pub fn predict_proba(&self, features: &[f64]) -> Result<Vec<f64>> {
        if features.len() != self.n_features {
            return Err(CropError::SchemaMismatch {
                row: 1,
                reason: format!(
                    "expected {} features, got {}",
                    self.n_features,
                    features.len()
                ),
            });
        }

        let mut proba = vec![0.0; self.n_classes];
        for tree in &self.trees {
            if let Some(distribution) = tree.leaf_distribution(features) {
                for (p, d) in proba.iter_mut().zip(distribution) {
                    *p += d;
                }
            }
        }

        let total: f64 = proba.iter().sum();
        if total > 0.0 {
            for p in &mut proba {
                *p /= total;
            }
        }
        Ok(proba)
    }

    /// Arg-max class code; ties go to the lowest code
    pub fn predict(&self, features: &[f64]) -> Result<usize> {
        let proba = self.predict_proba(features)?;
        let mut best = 0;
        for (code, &p) in proba.iter().enumerate() {
            if p > proba[best] {
                best = code;
            }
        }
        Ok(best)
    }

    /// Mean impurity decrease per feature, normalized to sum to 1
    /// (all zeros when no tree split at all)
    pub fn feature_importances(&self) -> &[f64] {
        &self.importances
    }

    /// BLAKE3 digest (hex) of the canonical JSON form of the trees
    pub fn fingerprint(&self) -> Result<String> {
        let json = serde_json::to_vec(self)
            .map_err(|e| CropError::Serialization(e.to_string()))?;
        Ok(hex::encode(blake3::hash(&json).as_bytes()))
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }
}

fn aggregate_importances(trees: &[Tree], n_features: usize) -> Vec<f64> {
    let mut totals = vec![0.0; n_features];
    for tree in trees {
        for (total, value) in totals.iter_mut().zip(&tree.importances) {
            *total += value;
        }
    }
    let sum: f64 = totals.iter().sum();
    if sum > 0.0 {
        for total in &mut totals {
            *total /= sum;
        }
    }
    totals
}

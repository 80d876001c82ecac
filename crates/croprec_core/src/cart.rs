//! CART (Classification and Regression Tree) builder
//!
//! Grows one classification tree with Gini impurity and exact-greedy
//! midpoint thresholds. Leaves store class-frequency distributions so that a
//! forest can average them into probabilities.

use serde::{Deserialize, Serialize};

use crate::deterministic::LcgRng;

/// Gains closer than this are treated as equal
const GAIN_EPSILON: f64 = 1e-12;

/// Growth limits for a single tree
#[derive(Clone, Debug, PartialEq)]
pub struct TreeConfig {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features examined per node before falling back to the rest
    pub max_features: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: usize::MAX,
        }
    }
}

/// A tree node; `distribution` is `Some` exactly for leaves
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub feature_index: usize,
    pub threshold: f64,
    pub left: usize,
    pub right: usize,
    pub distribution: Option<Vec<f64>>,
}

impl Node {
    fn leaf(distribution: Vec<f64>) -> Self {
        Self {
            feature_index: 0,
            threshold: 0.0,
            left: 0,
            right: 0,
            distribution: Some(distribution),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.distribution.is_some()
    }
}

/// A fitted classification tree (node 0 is the root)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
    /// Total weighted impurity decrease per feature
    #[serde(skip)]
    pub importances: Vec<f64>,
}

impl Tree {
    /// Class distribution of the leaf reached by `features`
    pub fn leaf_distribution(&self, features: &[f64]) -> Option<&[f64]> {
        let mut idx = 0usize;

        loop {
            let node = self.nodes.get(idx)?;
            if let Some(distribution) = &node.distribution {
                return Some(distribution);
            }

            let value = *features.get(node.feature_index)?;
            idx = if value <= node.threshold {
                node.left
            } else {
                node.right
            };
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match nodes.get(idx) {
                Some(node) if !node.is_leaf() => {
                    1 + walk(nodes, node.left).max(walk(nodes, node.right))
                }
                _ => 0,
            }
        }
        walk(&self.nodes, 0)
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }
}

/// Best split found at a node
#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
}

impl SplitCandidate {
    /// Higher gain wins; equal gains go to the lower (feature, threshold)
    fn beats(&self, other: &SplitCandidate) -> bool {
        if self.gain > other.gain + GAIN_EPSILON {
            return true;
        }
        if (self.gain - other.gain).abs() <= GAIN_EPSILON {
            return (self.feature_idx, self.threshold.to_bits())
                < (other.feature_idx, other.threshold.to_bits());
        }
        false
    }
}

/// Builds a classification tree over a (possibly bootstrapped) sample
pub struct CartBuilder<'a> {
    config: TreeConfig,
    features: &'a [Vec<f64>],
    labels: &'a [usize],
    n_classes: usize,
    feature_count: usize,
}

impl<'a> CartBuilder<'a> {
    pub fn new(
        features: &'a [Vec<f64>],
        labels: &'a [usize],
        n_classes: usize,
        config: TreeConfig,
    ) -> Self {
        let feature_count = features.first().map_or(0, Vec::len);
        Self {
            config,
            features,
            labels,
            n_classes,
            feature_count,
        }
    }

    /// Grow a tree over the rows at `sample` (duplicates allowed)
    pub fn build(&self, sample: &[usize], rng: &mut LcgRng) -> Tree {
        let mut nodes = Vec::new();
        let mut importances = vec![0.0; self.feature_count];
        self.build_node(sample, 0, &mut nodes, &mut importances, rng);

        Tree { nodes, importances }
    }

    fn build_node(
        &self,
        indices: &[usize],
        depth: usize,
        nodes: &mut Vec<Node>,
        importances: &mut [f64],
        rng: &mut LcgRng,
    ) -> usize {
        let current_idx = nodes.len();
        let counts = self.class_counts(indices);

        let depth_reached = self.config.max_depth.is_some_and(|max| depth >= max);
        let pure = counts.iter().filter(|&&c| c > 0).count() <= 1;
        if depth_reached || pure || indices.len() < self.config.min_samples_split {
            nodes.push(Node::leaf(normalize(&counts)));
            return current_idx;
        }

        let split = match self.find_best_split(indices, &counts, rng) {
            Some(s) => s,
            None => {
                nodes.push(Node::leaf(normalize(&counts)));
                return current_idx;
            }
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| self.features[i][split.feature_idx] <= split.threshold);

        importances[split.feature_idx] += split.gain * indices.len() as f64;

        // Reserve the slot, children are patched in once built
        nodes.push(Node {
            feature_index: split.feature_idx,
            threshold: split.threshold,
            left: 0,
            right: 0,
            distribution: None,
        });

        let left_idx = self.build_node(&left_indices, depth + 1, nodes, importances, rng);
        let right_idx = self.build_node(&right_indices, depth + 1, nodes, importances, rng);

        nodes[current_idx].left = left_idx;
        nodes[current_idx].right = right_idx;

        current_idx
    }

    /// Examine `max_features` randomly ordered features; if none of them
    /// yields a valid split, keep going through the remaining ones
    fn find_best_split(
        &self,
        indices: &[usize],
        parent_counts: &[usize],
        rng: &mut LcgRng,
    ) -> Option<SplitCandidate> {
        let mut order: Vec<usize> = (0..self.feature_count).collect();
        rng.shuffle(&mut order);

        let parent_gini = gini(parent_counts, indices.len());
        let mut best: Option<SplitCandidate> = None;

        for (visited, &feature_idx) in order.iter().enumerate() {
            if visited >= self.config.max_features && best.is_some() {
                break;
            }
            if let Some(candidate) = self.best_split_for_feature(indices, feature_idx, parent_gini) {
                best = match best {
                    Some(current) if !candidate.beats(&current) => Some(current),
                    _ => Some(candidate),
                };
            }
        }

        best
    }

    /// Sweep the sorted values of one feature, scoring every midpoint
    fn best_split_for_feature(
        &self,
        indices: &[usize],
        feature_idx: usize,
        parent_gini: f64,
    ) -> Option<SplitCandidate> {
        let mut sorted: Vec<usize> = indices.to_vec();
        sorted.sort_by(|&a, &b| {
            self.features[a][feature_idx].total_cmp(&self.features[b][feature_idx])
        });

        let total = sorted.len();
        let mut left_counts = vec![0usize; self.n_classes];
        let mut right_counts = self.class_counts(indices);
        let mut best: Option<SplitCandidate> = None;

        for pos in 0..total.saturating_sub(1) {
            let row = sorted[pos];
            left_counts[self.labels[row]] += 1;
            right_counts[self.labels[row]] -= 1;

            let value = self.features[row][feature_idx];
            let next = self.features[sorted[pos + 1]][feature_idx];
            if next <= value {
                continue;
            }

            let n_left = pos + 1;
            let n_right = total - n_left;
            if n_left < self.config.min_samples_leaf || n_right < self.config.min_samples_leaf {
                continue;
            }

            let weighted = (n_left as f64 * gini(&left_counts, n_left)
                + n_right as f64 * gini(&right_counts, n_right))
                / total as f64;
            let gain = parent_gini - weighted;
            if gain <= GAIN_EPSILON {
                continue;
            }

            let candidate = SplitCandidate {
                feature_idx,
                threshold: value + (next - value) / 2.0,
                gain,
            };
            if best.map_or(true, |current| candidate.beats(&current)) {
                best = Some(candidate);
            }
        }

        best
    }

    fn class_counts(&self, indices: &[usize]) -> Vec<usize> {
        let mut counts = vec![0usize; self.n_classes];
        for &i in indices {
            counts[self.labels[i]] += 1;
        }
        counts
    }
}

fn gini(counts: &[usize], total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    1.0 - counts
        .iter()
        .map(|&c| {
            let p = c as f64 / total;
            p * p
        })
        .sum::<f64>()
}

fn normalize(counts: &[usize]) -> Vec<f64> {
    let total: usize = counts.iter().sum();
    if total == 0 {
        return vec![0.0; counts.len()];
    }
    counts.iter().map(|&c| c as f64 / total as f64).collect()
}

//! Accuracy diagnostics
//!
//! k-fold cross-validation is the default. Resubstitution (scoring the model
//! on its own training rows) is available but overstates quality.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info};

use crate::dataset::EncodedDataset;
use crate::deterministic::{mix_seed, LcgRng};
use crate::errors::{CropError, Result};
use crate::forest::{ForestConfig, RandomForest};

/// How the accuracy figure is computed
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum EvaluationStrategy {
    /// `k` is clamped to `[2, distinct rows]`
    KFold { k: usize },
    /// `ceil(distinct rows * test_ratio)` distinct rows held out with their
    /// duplicates, clamped to `[1, distinct rows - 1]`
    Holdout { test_ratio: f64 },
    Resubstitution,
}

/// Outcome of one evaluation run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub strategy: EvaluationStrategy,
    /// Ratio in [0, 1]
    pub accuracy: f64,
    pub correct: usize,
    pub total: usize,
    /// Per-fold accuracies (k-fold only)
    pub fold_accuracies: Vec<f64>,
}

/// Fraction of positions where `predicted` equals `actual`
pub fn accuracy(predicted: &[usize], actual: &[usize]) -> f64 {
    let total = predicted.len().min(actual.len());
    if total == 0 {
        return 0.0;
    }
    let correct = predicted
        .iter()
        .zip(actual)
        .filter(|(p, a)| p == a)
        .count();
    correct as f64 / total as f64
}

/// Run `strategy` over `data`; `trained` is only used for resubstitution
pub fn evaluate(
    strategy: EvaluationStrategy,
    data: &EncodedDataset,
    trained: &RandomForest,
    forest_config: &ForestConfig,
    seed: u64,
) -> Result<EvaluationReport> {
    let report = match strategy {
        EvaluationStrategy::KFold { k } => cross_validate(data, forest_config, k, seed)?,
        EvaluationStrategy::Holdout { test_ratio } => {
            holdout(data, forest_config, test_ratio, seed)?
        }
        EvaluationStrategy::Resubstitution => resubstitution(data, trained)?,
    };

    info!(
        strategy = ?report.strategy,
        accuracy = report.accuracy,
        correct = report.correct,
        total = report.total,
        "evaluation finished"
    );
    Ok(report)
}

/// Deterministic k-fold cross-validation
///
/// Identical rows always land in the same fold and each crop is dealt across
/// the folds in turn, so `k` is clamped to `[2, distinct rows]`.
pub fn cross_validate(
    data: &EncodedDataset,
    forest_config: &ForestConfig,
    k: usize,
    seed: u64,
) -> Result<EvaluationReport> {
    let n = data.len();
    ensure_splittable(n)?;
    let groups = duplicate_groups(data);
    ensure_distinct_rows(groups.len())?;
    let k = k.clamp(2, groups.len());
    let folds = fold_assignments(data, &groups, k, seed);

    let mut correct = 0;
    let mut fold_accuracies = Vec::with_capacity(k);
    for fold in 0..k {
        let (test, train): (Vec<usize>, Vec<usize>) =
            (0..n).partition(|&row| folds[row] == fold);

        let config = ForestConfig {
            seed: mix_seed(forest_config.seed, fold as u64),
            ..forest_config.clone()
        };
        let fold_correct = score_split(data, &config, &train, &test)?;
        debug!(fold, correct = fold_correct, rows = test.len(), "fold scored");

        correct += fold_correct;
        fold_accuracies.push(fold_correct as f64 / test.len() as f64);
    }

    Ok(EvaluationReport {
        strategy: EvaluationStrategy::KFold { k },
        accuracy: correct as f64 / n as f64,
        correct,
        total: n,
        fold_accuracies,
    })
}

/// Single shuffled train/test split; identical rows stay on the same side
pub fn holdout(
    data: &EncodedDataset,
    forest_config: &ForestConfig,
    test_ratio: f64,
    seed: u64,
) -> Result<EvaluationReport> {
    let n = data.len();
    ensure_splittable(n)?;
    if !(test_ratio > 0.0 && test_ratio < 1.0) {
        return Err(CropError::InvalidConfig(format!(
            "test_ratio {} must lie strictly between 0 and 1",
            test_ratio
        )));
    }

    let mut groups = duplicate_groups(data);
    ensure_distinct_rows(groups.len())?;
    LcgRng::new(seed).shuffle(&mut groups);

    let test_groups =
        ((groups.len() as f64 * test_ratio).ceil() as usize).clamp(1, groups.len() - 1);
    let test: Vec<usize> = groups[..test_groups].concat();
    let train: Vec<usize> = groups[test_groups..].concat();

    let correct = score_split(data, forest_config, &train, &test)?;
    Ok(EvaluationReport {
        strategy: EvaluationStrategy::Holdout { test_ratio },
        accuracy: correct as f64 / test.len() as f64,
        correct,
        total: test.len(),
        fold_accuracies: Vec::new(),
    })
}

/// Score the trained model on its own training rows
pub fn resubstitution(data: &EncodedDataset, trained: &RandomForest) -> Result<EvaluationReport> {
    if data.is_empty() {
        return Err(CropError::EmptyTrainingSet);
    }
    let predicted = data
        .features
        .iter()
        .map(|row| trained.predict(row))
        .collect::<Result<Vec<_>>>()?;
    let correct = predicted
        .iter()
        .zip(&data.labels)
        .filter(|(p, a)| p == a)
        .count();

    Ok(EvaluationReport {
        strategy: EvaluationStrategy::Resubstitution,
        accuracy: accuracy(&predicted, &data.labels),
        correct,
        total: data.len(),
        fold_accuracies: Vec::new(),
    })
}

fn ensure_splittable(n: usize) -> Result<()> {
    match n {
        0 => Err(CropError::EmptyTrainingSet),
        1 => Err(CropError::InvalidConfig(
            "at least 2 rows are needed to hold data out".into(),
        )),
        _ => Ok(()),
    }
}

fn ensure_distinct_rows(groups: usize) -> Result<()> {
    if groups < 2 {
        return Err(CropError::InvalidConfig(
            "at least 2 distinct rows are needed to hold data out".into(),
        ));
    }
    Ok(())
}

/// Row indices bucketed by identical (features, label), in first-seen order
fn duplicate_groups(data: &EncodedDataset) -> Vec<Vec<usize>> {
    let mut index: HashMap<(Vec<u64>, usize), usize> = HashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for (row, (features, &label)) in data.features.iter().zip(&data.labels).enumerate() {
        let key = (features.iter().map(|v| v.to_bits()).collect(), label);
        let slot = *index.entry(key).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(row);
    }
    groups
}

/// Fold number of every row. Groups of each label are shuffled and dealt
/// round-robin, continuing the count across labels so fold sizes stay even.
fn fold_assignments(
    data: &EncodedDataset,
    groups: &[Vec<usize>],
    k: usize,
    seed: u64,
) -> Vec<usize> {
    let mut by_label: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (group, rows) in groups.iter().enumerate() {
        by_label.entry(data.labels[rows[0]]).or_default().push(group);
    }

    let mut rng = LcgRng::new(seed);
    let mut folds = vec![0; data.len()];
    let mut dealt = 0;
    for members in by_label.values_mut() {
        rng.shuffle(members);
        for &group in members.iter() {
            for &row in &groups[group] {
                folds[row] = dealt % k;
            }
            dealt += 1;
        }
    }
    folds
}

/// Train on `train`, return how many `test` rows are predicted correctly.
/// A single-crop training split predicts that crop for every test row.
fn score_split(
    data: &EncodedDataset,
    config: &ForestConfig,
    train: &[usize],
    test: &[usize],
) -> Result<usize> {
    let (features, labels) = data.subset(train);

    let distinct: BTreeSet<usize> = labels.iter().copied().collect();
    if distinct.len() == 1 {
        let only = labels[0];
        debug!(label = only, rows = train.len(), "single-crop split, predicting it");
        return Ok(test.iter().filter(|&&row| data.labels[row] == only).count());
    }

    let forest = RandomForest::fit(config, &features, &labels, data.n_classes())?;
    let mut correct = 0;
    for &row in test {
        if forest.predict(&data.features[row])? == data.labels[row] {
            correct += 1;
        }
    }
    Ok(correct)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;
    use crate::schema::TrainingExample;

    fn quick_config() -> ForestConfig {
        ForestConfig {
            n_trees: 15,
            ..ForestConfig::default()
        }
    }

    #[test]
    fn test_accuracy_ratio() {
        assert_eq!(accuracy(&[0, 1, 2, 2], &[0, 1, 1, 2]), 0.75);
        assert_eq!(accuracy(&[], &[]), 0.0);
    }

    #[test]
    fn test_cross_validation_covers_every_row() {
        let data = Dataset::kerala().encode().unwrap();
        let report = cross_validate(&data, &quick_config(), 4, 42).unwrap();

        assert_eq!(report.total, 48);
        assert_eq!(report.fold_accuracies.len(), 4);
        assert!((0.0..=1.0).contains(&report.accuracy));
        assert_eq!(report.accuracy, report.correct as f64 / 48.0);
    }

    #[test]
    fn test_k_is_clamped() {
        let data = Dataset::sample().encode().unwrap();
        let report = cross_validate(&data, &quick_config(), 50, 1).unwrap();
        assert_eq!(report.strategy, EvaluationStrategy::KFold { k: 6 });
        assert_eq!(report.fold_accuracies.len(), 6);
    }

    #[test]
    fn test_holdout_split_size() {
        let data = Dataset::kerala().encode().unwrap();
        let report = holdout(&data, &quick_config(), 0.2, 42).unwrap();
        // ceil(48 * 0.2)
        assert_eq!(report.total, 10);
        assert!((0.0..=1.0).contains(&report.accuracy));
    }

    #[test]
    fn test_holdout_rejects_bad_ratio() {
        let data = Dataset::sample().encode().unwrap();
        assert!(matches!(
            holdout(&data, &quick_config(), 1.5, 42),
            Err(CropError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_resubstitution_on_separable_table() {
        let data = Dataset::sample().encode().unwrap();
        let forest =
            RandomForest::fit(&quick_config(), &data.features, &data.labels, data.n_classes())
                .unwrap();
        let report = resubstitution(&data, &forest).unwrap();
        assert_eq!(report.total, 6);
        assert!(report.accuracy > 0.5);
    }

    #[test]
    fn test_duplicates_share_a_fold() {
        let data = Dataset::kerala().encode().unwrap();
        let groups = duplicate_groups(&data);
        assert_eq!(groups.len(), 24);

        let folds = fold_assignments(&data, &groups, 5, 42);
        for rows in &groups {
            assert_eq!(rows.len(), 2);
            assert_eq!(folds[rows[0]], folds[rows[1]]);
        }
    }

    #[test]
    fn test_folds_are_stratified() {
        let data = Dataset::kerala().encode().unwrap();
        let groups = duplicate_groups(&data);
        let folds = fold_assignments(&data, &groups, 4, 7);

        // Four distinct rows per crop over four folds: one of each crop per fold
        for fold in 0..4 {
            let mut crops: Vec<usize> = (0..data.len())
                .filter(|&row| folds[row] == fold)
                .map(|row| data.labels[row])
                .collect();
            crops.sort_unstable();
            crops.dedup();
            assert_eq!(crops.len(), 6, "fold {fold} misses a crop");
        }
    }

    #[test]
    fn test_kfold_does_not_score_training_twins() {
        let data = Dataset::kerala().encode().unwrap();
        let config = quick_config();
        let forest =
            RandomForest::fit(&config, &data.features, &data.labels, data.n_classes()).unwrap();

        let resub = resubstitution(&data, &forest).unwrap();
        let kfold = cross_validate(&data, &config, 5, 42).unwrap();
        assert!(kfold.accuracy < resub.accuracy);
    }

    #[test]
    fn test_single_crop_training_split() {
        let data = Dataset::new(vec![
            TrainingExample::new(90.0, 40.0, 40.0, 6.5, 200.0, 28.0, "Clay", "Rice"),
            TrainingExample::new(100.0, 45.0, 42.0, 6.2, 220.0, 29.0, "Clay", "Rice"),
            TrainingExample::new(30.0, 60.0, 40.0, 5.5, 100.0, 25.0, "Loamy", "Banana"),
        ])
        .unwrap()
        .encode()
        .unwrap();

        let report = cross_validate(&data, &quick_config(), 5, 42).unwrap();
        assert_eq!(report.strategy, EvaluationStrategy::KFold { k: 3 });
        assert_eq!(report.total, 3);

        // The Banana fold trains on Rice alone and predicts Rice
        assert!(report.fold_accuracies.contains(&0.0));
    }

    #[test]
    fn test_identical_rows_cannot_be_split() {
        let row = TrainingExample::new(90.0, 40.0, 40.0, 6.5, 200.0, 28.0, "Clay", "Rice");
        let data = Dataset::new(vec![row.clone(), row]).unwrap().encode().unwrap();
        assert!(matches!(
            cross_validate(&data, &quick_config(), 5, 42),
            Err(CropError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let data = Dataset::kerala().encode().unwrap();
        let a = cross_validate(&data, &quick_config(), 5, 9).unwrap();
        let b = cross_validate(&data, &quick_config(), 5, 9).unwrap();
        assert_eq!(a, b);
    }
}

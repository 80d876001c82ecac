//! Shared read-only model handle with atomic swap on reload

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::info;

use crate::advisory::AdvisoryCatalog;
use crate::config::CropConfig;
use crate::dataset::Dataset;
use crate::errors::{CropError, Result};
use crate::pipeline::{Recommendation, TrainedModel};
use crate::ranker::PredictionResult;
use crate::schema::FeatureVector;

/// Readers clone the current `Arc` and run inference without holding the lock.
/// `reload` trains a fresh model first and only then swaps the pointer.
#[derive(Debug)]
pub struct ModelHandle {
    config: CropConfig,
    advisory: AdvisoryCatalog,
    current: RwLock<Option<Arc<TrainedModel>>>,
}

impl ModelHandle {
    pub fn new(config: CropConfig) -> Self {
        Self {
            config,
            advisory: AdvisoryCatalog::kerala(),
            current: RwLock::new(None),
        }
    }

    pub fn with_advisory(mut self, advisory: AdvisoryCatalog) -> Self {
        self.advisory = advisory;
        self
    }

    /// Current model; `ModelNotReady` before the first successful reload
    pub fn snapshot(&self) -> Result<Arc<TrainedModel>> {
        self.current.read().clone().ok_or(CropError::ModelNotReady)
    }

    pub fn is_ready(&self) -> bool {
        self.current.read().is_some()
    }

    /// Train on `dataset` and publish the result; the old model stays live on error
    pub fn reload(&self, dataset: &Dataset) -> Result<Arc<TrainedModel>> {
        let model = Arc::new(TrainedModel::train(&self.config, &self.advisory, dataset)?);
        let previous = self.current.write().replace(Arc::clone(&model));

        info!(
            rows = model.training_rows(),
            replaced = previous.is_some(),
            "model published"
        );
        Ok(model)
    }

    pub fn predict_proba(&self, query: &FeatureVector) -> Result<PredictionResult> {
        self.snapshot()?.predict_proba(query)
    }

    pub fn recommend(&self, query: &FeatureVector) -> Result<Recommendation> {
        self.snapshot()?.recommend(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forest::ForestConfig;
    use crate::schema::TrainingExample;

    fn quick_config() -> CropConfig {
        CropConfig {
            forest: ForestConfig {
                n_trees: 20,
                ..ForestConfig::default()
            },
            ..CropConfig::default()
        }
    }

    fn query() -> FeatureVector {
        FeatureVector {
            nitrogen: 25.0,
            phosphorus: 65.0,
            potassium: 45.0,
            ph: 5.4,
            rainfall: 120.0,
            temperature: 25.0,
            soil_type: "Loamy".to_string(),
        }
    }

    #[test]
    fn test_not_ready_before_reload() {
        let handle = ModelHandle::new(quick_config());
        assert!(!handle.is_ready());
        assert_eq!(handle.recommend(&query()).unwrap_err(), CropError::ModelNotReady);
    }

    #[test]
    fn test_snapshot_survives_reload() {
        let handle = ModelHandle::new(quick_config());
        handle.reload(&Dataset::sample()).unwrap();
        let old = handle.snapshot().unwrap();

        handle.reload(&Dataset::kerala()).unwrap();
        let new = handle.snapshot().unwrap();

        assert_eq!(old.crops().len(), 3);
        assert_eq!(new.crops().len(), 6);
        assert!(!Arc::ptr_eq(&old, &new));
        assert_eq!(old.predict_proba(&query()).unwrap().len(), 3);
    }

    #[test]
    fn test_failed_reload_keeps_live_model() {
        let handle = ModelHandle::new(quick_config());
        let live = handle.reload(&Dataset::sample()).unwrap();

        let single = Dataset::new(vec![TrainingExample::new(
            80.0, 40.0, 40.0, 5.5, 200.0, 28.0, "Clay", "Rice",
        )])
        .unwrap();
        assert!(handle.reload(&single).is_err());
        assert!(Arc::ptr_eq(&live, &handle.snapshot().unwrap()));
    }

    #[test]
    fn test_concurrent_readers_during_reload() {
        let handle = ModelHandle::new(quick_config());
        handle.reload(&Dataset::sample()).unwrap();

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..10 {
                        let result = handle.predict_proba(&query()).unwrap();
                        let total: f64 = result.entries().iter().map(|e| e.probability).sum();
                        assert!((total - 1.0).abs() < 1e-6);
                    }
                });
            }
            scope.spawn(|| {
                handle
                    .reload(&Dataset::sample().extend(Dataset::sample().rows().to_vec()).unwrap())
                    .unwrap();
            });
        });

        assert_eq!(handle.snapshot().unwrap().training_rows(), 12);
    }
}

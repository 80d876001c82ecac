//! Two-state recommendation pipeline
//!
//! A [`CropPipeline`] starts `Untrained` and only accepts `fit`. A successful
//! fit installs an immutable [`TrainedModel`]; a failed fit leaves whatever
//! was there before.

use serde::Serialize;
use tracing::{info, warn};

use crate::advisory::AdvisoryCatalog;
use crate::config::{CropConfig, RankingConfig};
use crate::dataset::{encode_features, Dataset, EncodedDataset};
use crate::encoder::CategoryEncoder;
use crate::errors::{CropError, Result};
use crate::evaluation::{self, EvaluationReport, EvaluationStrategy};
use crate::forest::RandomForest;
use crate::ranker::{rank_result, PredictionResult, RankedCrop};
use crate::schema::{FeatureSchema, FeatureVector, Field};

/// Ranked answer to one query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub query: FeatureVector,
    /// Numeric fields outside their plausible range (still scored)
    pub out_of_range: Vec<Field>,
    pub crops: Vec<RankedCrop>,
}

impl Recommendation {
    pub fn best(&self) -> Option<&RankedCrop> {
        self.crops.first()
    }
}

/// Encoders plus fitted forest; never mutated once built
#[derive(Debug, Clone)]
pub struct TrainedModel {
    config: CropConfig,
    schema: FeatureSchema,
    advisory: AdvisoryCatalog,
    data: EncodedDataset,
    forest: RandomForest,
}

impl TrainedModel {
    /// Encode `dataset` and fit a forest on it
    pub fn train(config: &CropConfig, advisory: &AdvisoryCatalog, dataset: &Dataset) -> Result<Self> {
        config.validate()?;
        let data = dataset.encode()?;
        let forest = RandomForest::fit(
            &config.forest,
            &data.features,
            &data.labels,
            data.n_classes(),
        )?;

        info!(
            rows = data.len(),
            soils = data.soil_encoder.len(),
            crops = data.crop_encoder.len(),
            "crop model trained"
        );

        Ok(Self {
            config: config.clone(),
            schema: FeatureSchema::default(),
            advisory: advisory.clone(),
            data,
            forest,
        })
    }

    /// Probability of every known crop for `query`, in label-code order
    pub fn predict_proba(&self, query: &FeatureVector) -> Result<PredictionResult> {
        self.score(query).map(|(result, _)| result)
    }

    /// Probabilities plus the out-of-range fields, which are logged once here
    fn score(&self, query: &FeatureVector) -> Result<(PredictionResult, Vec<Field>)> {
        let out_of_range = self.schema.out_of_range(query);
        for &field in &out_of_range {
            warn!(
                field = %field,
                value = query.numeric(field).unwrap_or(f64::NAN),
                "query value outside plausible range"
            );
        }

        let row = encode_features(query, &self.data.soil_encoder)?;
        let probabilities = self.forest.predict_proba(&row)?;
        let result = PredictionResult::from_probabilities(&probabilities, &self.data.crop_encoder)?;
        Ok((result, out_of_range))
    }

    /// Top crops for `query` using the configured ranking
    pub fn recommend(&self, query: &FeatureVector) -> Result<Recommendation> {
        self.recommend_with(query, &self.config.ranking)
    }

    pub fn recommend_with(
        &self,
        query: &FeatureVector,
        ranking: &RankingConfig,
    ) -> Result<Recommendation> {
        let (result, out_of_range) = self.score(query)?;
        let advisory = ranking.include_advisory.then_some(&self.advisory);

        Ok(Recommendation {
            query: query.clone(),
            out_of_range,
            crops: rank_result(&result, ranking.top_n, advisory),
        })
    }

    /// Accuracy with the configured strategy
    pub fn evaluate(&self) -> Result<EvaluationReport> {
        self.evaluate_with(self.config.evaluation.strategy())
    }

    pub fn evaluate_with(&self, strategy: EvaluationStrategy) -> Result<EvaluationReport> {
        evaluation::evaluate(
            strategy,
            &self.data,
            &self.forest,
            &self.config.forest,
            self.config.evaluation.seed,
        )
    }

    pub fn soil_types(&self) -> &CategoryEncoder {
        &self.data.soil_encoder
    }

    pub fn crops(&self) -> &CategoryEncoder {
        &self.data.crop_encoder
    }

    pub fn forest(&self) -> &RandomForest {
        &self.forest
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn config(&self) -> &CropConfig {
        &self.config
    }

    pub fn training_rows(&self) -> usize {
        self.data.len()
    }

    pub fn fingerprint(&self) -> Result<String> {
        self.forest.fingerprint()
    }
}

#[derive(Debug, Clone, Default)]
enum PipelineState {
    #[default]
    Untrained,
    Trained(TrainedModel),
}

/// Caller-owned pipeline
#[derive(Debug, Clone)]
pub struct CropPipeline {
    config: CropConfig,
    advisory: AdvisoryCatalog,
    state: PipelineState,
}

impl CropPipeline {
    /// Untrained pipeline with the Kerala advisory catalog
    pub fn new(config: CropConfig) -> Self {
        Self {
            config,
            advisory: AdvisoryCatalog::kerala(),
            state: PipelineState::Untrained,
        }
    }

    /// Replace the advisory catalog used by later fits
    pub fn with_advisory(mut self, advisory: AdvisoryCatalog) -> Self {
        self.advisory = advisory;
        self
    }

    /// Train on `dataset`; on error the current state is kept
    pub fn fit(&mut self, dataset: &Dataset) -> Result<&TrainedModel> {
        let model = TrainedModel::train(&self.config, &self.advisory, dataset)?;
        self.state = PipelineState::Trained(model);
        self.model()
    }

    pub fn is_trained(&self) -> bool {
        matches!(self.state, PipelineState::Trained(_))
    }

    pub fn model(&self) -> Result<&TrainedModel> {
        match &self.state {
            PipelineState::Trained(model) => Ok(model),
            PipelineState::Untrained => Err(CropError::ModelNotReady),
        }
    }

    pub fn predict_proba(&self, query: &FeatureVector) -> Result<PredictionResult> {
        self.model()?.predict_proba(query)
    }

    pub fn recommend(&self, query: &FeatureVector) -> Result<Recommendation> {
        self.model()?.recommend(query)
    }

    /// Recommend with a caller-supplied top-N
    pub fn recommend_top(&self, query: &FeatureVector, top_n: usize) -> Result<Recommendation> {
        let ranking = RankingConfig {
            top_n,
            ..self.config.ranking.clone()
        };
        self.model()?.recommend_with(query, &ranking)
    }

    pub fn evaluate(&self) -> Result<EvaluationReport> {
        self.model()?.evaluate()
    }

    pub fn evaluate_with(&self, strategy: EvaluationStrategy) -> Result<EvaluationReport> {
        self.model()?.evaluate_with(strategy)
    }

    pub fn config(&self) -> &CropConfig {
        &self.config
    }
}

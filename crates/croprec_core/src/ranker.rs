//! Top-N ranking of crop probabilities

use serde::Serialize;

use crate::advisory::{AdvisoryCatalog, AdvisoryNote};
use crate::encoder::CategoryEncoder;
use crate::errors::{CropError, Result};

/// One (crop, probability) pair of a prediction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CropProbability {
    pub crop: String,
    pub code: usize,
    pub probability: f64,
}

/// Full distribution over the known crops, in label-code order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    entries: Vec<CropProbability>,
}

impl PredictionResult {
    /// Pair every probability with its decoded crop label
    pub fn from_probabilities(probabilities: &[f64], crops: &CategoryEncoder) -> Result<Self> {
        if probabilities.len() < crops.len() {
            return Err(CropError::SchemaMismatch {
                row: 1,
                reason: format!(
                    "{} probabilities for {} known crops",
                    probabilities.len(),
                    crops.len()
                ),
            });
        }

        let entries = probabilities
            .iter()
            .enumerate()
            .map(|(code, &probability)| {
                Ok(CropProbability {
                    crop: crops.decode(code)?.to_string(),
                    code,
                    probability,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { entries })
    }

    /// Entries in label-code order
    pub fn entries(&self) -> &[CropProbability] {
        &self.entries
    }

    pub fn probability_of(&self, crop: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|e| e.crop == crop)
            .map(|e| e.probability)
    }

    /// The `n` most probable entries, descending, ties by ascending code.
    /// `n` is clamped to the number of crops.
    pub fn top(&self, n: usize) -> Vec<CropProbability> {
        let mut ranked = self.entries.clone();
        ranked.sort_by(|a, b| {
            b.probability
                .total_cmp(&a.probability)
                .then(a.code.cmp(&b.code))
        });
        ranked.truncate(n.min(self.entries.len()));
        ranked
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A ranked crop with optional reference text
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedCrop {
    pub rank: usize,
    pub crop: String,
    pub probability: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advisory: Option<AdvisoryNote>,
}

/// Rank `probabilities` and keep the top `top_n`; when `advisory` is given
/// every entry carries its note (or the placeholder)
pub fn rank(
    probabilities: &[f64],
    crops: &CategoryEncoder,
    top_n: usize,
    advisory: Option<&AdvisoryCatalog>,
) -> Result<Vec<RankedCrop>> {
    let result = PredictionResult::from_probabilities(probabilities, crops)?;
    Ok(rank_result(&result, top_n, advisory))
}

pub(crate) fn rank_result(
    result: &PredictionResult,
    top_n: usize,
    advisory: Option<&AdvisoryCatalog>,
) -> Vec<RankedCrop> {
    result
        .top(top_n)
        .into_iter()
        .enumerate()
        .map(|(i, entry)| RankedCrop {
            rank: i + 1,
            advisory: advisory.map(|catalog| catalog.note_for(&entry.crop)),
            crop: entry.crop,
            probability: entry.probability,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisory::ADVISORY_PLACEHOLDER;

    fn crops() -> CategoryEncoder {
        // Banana = 0, Pepper = 1, Rice = 2
        CategoryEncoder::fit("Crop", ["Rice", "Banana", "Pepper"])
    }

    #[test]
    fn test_sorted_descending() {
        let ranked = rank(&[0.2, 0.5, 0.3], &crops(), 3, None).unwrap();
        let labels: Vec<&str> = ranked.iter().map(|r| r.crop.as_str()).collect();
        assert_eq!(labels, vec!["Pepper", "Rice", "Banana"]);
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[2].rank, 3);
    }

    #[test]
    fn test_ties_broken_by_code() {
        let ranked = rank(&[0.25, 0.5, 0.25], &crops(), 3, None).unwrap();
        let labels: Vec<&str> = ranked.iter().map(|r| r.crop.as_str()).collect();
        assert_eq!(labels, vec!["Pepper", "Banana", "Rice"]);
    }

    #[test]
    fn test_top_n_clamped() {
        let ranked = rank(&[0.2, 0.5, 0.3], &crops(), 10, None).unwrap();
        assert_eq!(ranked.len(), 3);

        let ranked = rank(&[0.2, 0.5, 0.3], &crops(), 1, None).unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].crop, "Pepper");

        assert!(rank(&[0.2, 0.5, 0.3], &crops(), 0, None).unwrap().is_empty());
    }

    #[test]
    fn test_advisory_merge_with_placeholder() {
        let mut catalog = AdvisoryCatalog::new();
        catalog.insert("Pepper", AdvisoryNote::new("Needs partial shade."));

        let ranked = rank(&[0.2, 0.5, 0.3], &crops(), 3, Some(&catalog)).unwrap();
        assert_eq!(
            ranked[0].advisory.as_ref().map(|n| n.summary.as_str()),
            Some("Needs partial shade.")
        );
        assert_eq!(
            ranked[1].advisory.as_ref().map(|n| n.summary.as_str()),
            Some(ADVISORY_PLACEHOLDER)
        );
    }

    #[test]
    fn test_no_advisory_requested() {
        let ranked = rank(&[0.2, 0.5, 0.3], &crops(), 3, None).unwrap();
        assert!(ranked.iter().all(|r| r.advisory.is_none()));
    }

    #[test]
    fn test_probability_vector_longer_than_map() {
        assert!(matches!(
            rank(&[0.1, 0.2, 0.3, 0.4], &crops(), 3, None),
            Err(CropError::InvalidCode { code: 3, .. })
        ));
    }

    #[test]
    fn test_probability_vector_shorter_than_map() {
        assert!(matches!(
            rank(&[0.5, 0.5], &crops(), 3, None),
            Err(CropError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_prediction_result_lookup() {
        let result = PredictionResult::from_probabilities(&[0.2, 0.5, 0.3], &crops()).unwrap();
        assert_eq!(result.len(), 3);
        assert_eq!(result.probability_of("Rice"), Some(0.3));
        assert_eq!(result.probability_of("Peat"), None);
        assert_eq!(result.entries()[0].crop, "Banana");
    }
}

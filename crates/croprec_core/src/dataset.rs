//! Training tables and their encoded form
//!
//! Rows come from the built-in literal tables or from a CSV file with a
//! header row. Every row is validated on ingestion; encoding appends the soil
//! code after the six numeric columns, in [`Field::ALL`] order.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use crate::deterministic::LcgRng;
use crate::encoder::CategoryEncoder;
use crate::errors::{CropError, Result};
use crate::schema::{
    FeatureVector, Field, TrainingExample, CROP_COLUMN, FEATURE_COUNT, UNSPECIFIED_SOIL,
};

/// Literal tables shipped with the crate
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinDataset {
    /// Six rows, three crops
    Sample,
    /// 48 rows, six crops
    Kerala,
}

impl BuiltinDataset {
    pub fn load(self) -> Dataset {
        match self {
            BuiltinDataset::Sample => Dataset::sample(),
            BuiltinDataset::Kerala => Dataset::kerala(),
        }
    }
}

/// Validated table of labeled rows
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Dataset {
    rows: Vec<TrainingExample>,
}

/// Numeric matrix and label codes, plus the encoders that produced them
#[derive(Clone, Debug)]
pub struct EncodedDataset {
    pub features: Vec<Vec<f64>>,
    pub labels: Vec<usize>,
    pub soil_encoder: CategoryEncoder,
    pub crop_encoder: CategoryEncoder,
}

impl EncodedDataset {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn n_classes(&self) -> usize {
        self.crop_encoder.len()
    }

    /// Rows at `indices` (features, labels)
    pub fn subset(&self, indices: &[usize]) -> (Vec<Vec<f64>>, Vec<usize>) {
        indices
            .iter()
            .map(|&i| (self.features[i].clone(), self.labels[i]))
            .unzip()
    }
}

impl Dataset {
    /// Validate and wrap `rows`
    pub fn new(rows: Vec<TrainingExample>) -> Result<Self> {
        for (i, row) in rows.iter().enumerate() {
            validate_row(i + 1, row)?;
        }
        Ok(Self { rows })
    }

    /// The documented six-row sample
    pub fn sample() -> Self {
        let rows = vec![
            TrainingExample::new(90.0, 40.0, 40.0, 6.5, 200.0, 28.0, "Clay", "Rice"),
            TrainingExample::new(30.0, 60.0, 40.0, 5.5, 100.0, 25.0, "Loamy", "Banana"),
            TrainingExample::new(40.0, 50.0, 60.0, 6.0, 180.0, 27.0, "Sandy", "Pepper"),
            TrainingExample::new(100.0, 40.0, 50.0, 6.8, 220.0, 29.0, "Clay", "Rice"),
            TrainingExample::new(20.0, 70.0, 40.0, 5.2, 90.0, 24.0, "Loamy", "Banana"),
            TrainingExample::new(35.0, 45.0, 55.0, 6.1, 170.0, 26.0, "Sandy", "Pepper"),
        ];
        Self { rows }
    }

    /// Kerala table: six crops, four rows each, listed twice
    pub fn kerala() -> Self {
        #[rustfmt::skip]
        let base: [(f64, f64, f64, f64, f64, f64, &str, &str); 24] = [
            (90.0, 40.0, 40.0, 6.5, 200.0, 28.0, "Clay", "Rice"),
            (100.0, 45.0, 42.0, 6.2, 220.0, 29.0, "Alluvial", "Rice"),
            (85.0, 50.0, 38.0, 6.8, 210.0, 27.0, "Clay", "Rice"),
            (95.0, 42.0, 45.0, 6.4, 230.0, 30.0, "Alluvial", "Rice"),
            (30.0, 60.0, 40.0, 5.5, 100.0, 25.0, "Loamy", "Banana"),
            (35.0, 65.0, 45.0, 5.8, 120.0, 26.0, "Loamy", "Banana"),
            (40.0, 55.0, 50.0, 5.6, 90.0, 24.0, "Loamy", "Banana"),
            (25.0, 70.0, 42.0, 5.7, 110.0, 27.0, "Loamy", "Banana"),
            (45.0, 50.0, 60.0, 6.0, 180.0, 27.0, "Sandy", "Pepper"),
            (50.0, 55.0, 55.0, 6.1, 170.0, 28.0, "Loamy", "Pepper"),
            (55.0, 45.0, 65.0, 6.2, 190.0, 26.0, "Laterite", "Pepper"),
            (60.0, 60.0, 70.0, 5.9, 160.0, 29.0, "Sandy", "Pepper"),
            (70.0, 65.0, 70.0, 6.8, 300.0, 30.0, "Laterite", "Coconut"),
            (75.0, 70.0, 75.0, 6.5, 280.0, 31.0, "Coastal", "Coconut"),
            (80.0, 60.0, 65.0, 6.6, 320.0, 29.0, "Laterite", "Coconut"),
            (85.0, 75.0, 80.0, 6.7, 310.0, 32.0, "Sandy", "Coconut"),
            (60.0, 55.0, 55.0, 6.0, 250.0, 26.0, "Alluvial", "Mango"),
            (65.0, 60.0, 50.0, 6.2, 240.0, 27.0, "Laterite", "Mango"),
            (55.0, 65.0, 60.0, 6.1, 260.0, 28.0, "Alluvial", "Mango"),
            (70.0, 50.0, 65.0, 5.9, 270.0, 25.0, "Clay", "Mango"),
            (40.0, 45.0, 50.0, 5.8, 150.0, 27.0, "Sandy", "Tapioca"),
            (45.0, 50.0, 45.0, 6.0, 140.0, 26.0, "Loamy", "Tapioca"),
            (50.0, 55.0, 55.0, 6.1, 160.0, 25.0, "Laterite", "Tapioca"),
            (35.0, 40.0, 40.0, 5.7, 130.0, 28.0, "Clay", "Tapioca"),
        ];

        let rows = base
            .iter()
            .chain(base.iter())
            .map(|&(n, p, k, ph, rain, temp, soil, crop)| {
                TrainingExample::new(n, p, k, ph, rain, temp, soil, crop)
            })
            .collect();
        Self { rows }
    }

    /// Load a dataset from a CSV file with a header row
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| {
            CropError::DatasetLoadError(format!("failed to open {}: {}", path.display(), e))
        })?;
        Self::from_reader(file)
    }

    /// Load a dataset from CSV text
    ///
    /// Columns are located by header name, so their order is free and
    /// unknown columns are ignored. `SoilType` is optional.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = reader
            .headers()
            .map_err(|e| CropError::DatasetLoadError(format!("failed to read header row: {}", e)))?
            .clone();
        let position = |name: &str| headers.iter().position(|h| h == name);

        let mut numeric_columns = [0usize; 6];
        let mut missing = Vec::new();
        for field in Field::NUMERIC {
            match position(field.column_name()) {
                Some(idx) => numeric_columns[field.index()] = idx,
                None => missing.push(field.column_name()),
            }
        }
        let crop_column = position(CROP_COLUMN);
        if crop_column.is_none() {
            missing.push(CROP_COLUMN);
        }
        let crop_column = match crop_column {
            Some(idx) if missing.is_empty() => idx,
            _ => {
                return Err(CropError::DatasetLoadError(format!(
                    "missing required column(s): {}",
                    missing.join(", ")
                )))
            }
        };
        let soil_column = position(Field::SoilType.column_name());

        let mut rows = Vec::new();
        for (i, record) in reader.records().enumerate() {
            let row = i + 1;
            let record = record.map_err(|e| {
                CropError::DatasetLoadError(format!("failed to read data row {}: {}", row, e))
            })?;

            let mut values = [0.0f64; 6];
            for field in Field::NUMERIC {
                let column = numeric_columns[field.index()];
                values[field.index()] = parse_number(&record, column, field, row)?;
            }
            let soil = match soil_column {
                Some(idx) => text_field(&record, idx, Field::SoilType.column_name(), row)?,
                None => UNSPECIFIED_SOIL,
            };
            let crop = text_field(&record, crop_column, CROP_COLUMN, row)?;

            let example = TrainingExample::new(
                values[0], values[1], values[2], values[3], values[4], values[5], soil, crop,
            );
            validate_row(row, &example)?;
            rows.push(example);
        }

        Ok(Self { rows })
    }

    /// New table holding these rows followed by `extra`
    pub fn extend(&self, extra: Vec<TrainingExample>) -> Result<Self> {
        let offset = self.rows.len();
        for (i, row) in extra.iter().enumerate() {
            validate_row(offset + i + 1, row)?;
        }
        let mut rows = self.rows.clone();
        rows.extend(extra);
        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[TrainingExample] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Deterministically permute the rows using `seed`
    pub fn shuffle(&mut self, seed: u64) {
        LcgRng::new(seed).shuffle(&mut self.rows);
    }

    /// (min, max) of every numeric column, in column order
    pub fn feature_stats(&self) -> Vec<(f64, f64)> {
        let mut stats = vec![(f64::INFINITY, f64::NEG_INFINITY); Field::NUMERIC.len()];

        for row in &self.rows {
            for (i, value) in row.features.numeric_values().into_iter().enumerate() {
                stats[i].0 = stats[i].0.min(value);
                stats[i].1 = stats[i].1.max(value);
            }
        }

        stats
    }

    /// Row count per crop label
    pub fn crop_counts(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for row in &self.rows {
            *counts.entry(row.crop.as_str()).or_insert(0) += 1;
        }
        counts
    }

    /// Fit both encoders on this table and encode every row
    pub fn encode(&self) -> Result<EncodedDataset> {
        if self.rows.is_empty() {
            return Err(CropError::EmptyTrainingSet);
        }

        let soil_encoder = CategoryEncoder::fit(
            Field::SoilType.column_name(),
            self.rows.iter().map(|r| r.features.soil_type.as_str()),
        );
        let crop_encoder =
            CategoryEncoder::fit(CROP_COLUMN, self.rows.iter().map(|r| r.crop.as_str()));

        let mut features = Vec::with_capacity(self.rows.len());
        let mut labels = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            features.push(encode_features(&row.features, &soil_encoder)?);
            labels.push(crop_encoder.encode(&row.crop)?);
        }

        Ok(EncodedDataset {
            features,
            labels,
            soil_encoder,
            crop_encoder,
        })
    }
}

/// Encode one query into a feature row using a fitted soil encoder
pub fn encode_features(query: &FeatureVector, soil_encoder: &CategoryEncoder) -> Result<Vec<f64>> {
    let mut row = Vec::with_capacity(FEATURE_COUNT);
    row.extend_from_slice(&query.numeric_values());
    row.push(soil_encoder.encode(&query.soil_type)? as f64);
    Ok(row)
}

fn validate_row(row: usize, example: &TrainingExample) -> Result<()> {
    for field in Field::NUMERIC {
        let value = example.features.numeric_values()[field.index()];
        if !value.is_finite() {
            return Err(CropError::SchemaMismatch {
                row,
                reason: format!("{} is not a finite number", field),
            });
        }
    }
    if example.features.soil_type.trim().is_empty() {
        return Err(CropError::SchemaMismatch {
            row,
            reason: format!("{} is empty", Field::SoilType),
        });
    }
    if example.crop.trim().is_empty() {
        return Err(CropError::SchemaMismatch {
            row,
            reason: format!("{} is empty", CROP_COLUMN),
        });
    }
    Ok(())
}

fn text_field<'r>(
    record: &'r csv::StringRecord,
    idx: usize,
    column: &str,
    row: usize,
) -> Result<&'r str> {
    match record.get(idx) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(CropError::SchemaMismatch {
            row,
            reason: format!("missing {}", column),
        }),
    }
}

fn parse_number(record: &csv::StringRecord, idx: usize, field: Field, row: usize) -> Result<f64> {
    let raw = text_field(record, idx, field.column_name(), row)?;
    raw.parse::<f64>().map_err(|_| CropError::SchemaMismatch {
        row,
        reason: format!("{} value {:?} is not a number", field, raw),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_csv() -> Result<NamedTempFile> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "Nitrogen,Phosphorus,Potassium,pH,Rainfall,Temperature,SoilType,Crop")?;
        writeln!(file, "90,40,40,6.5,200,28,Clay,Rice")?;
        writeln!(file, "30,60,40,5.5,100,25,Loamy,Banana")?;
        writeln!(file, "40,50,60,6.0,180,27,Sandy,Pepper")?;
        file.flush()?;
        Ok(file)
    }

    #[test]
    fn test_load_csv() -> Result<()> {
        let file = create_test_csv()?;
        let dataset = Dataset::from_csv(file.path())?;

        assert_eq!(dataset.len(), 3);
        assert_eq!(
            dataset.rows()[0],
            TrainingExample::new(90.0, 40.0, 40.0, 6.5, 200.0, 28.0, "Clay", "Rice")
        );
        Ok(())
    }

    #[test]
    fn test_column_order_is_free() -> Result<()> {
        let csv = "Crop,pH,SoilType,Temperature,Rainfall,Potassium,Phosphorus,Nitrogen,Notes\n\
                   Rice,6.5,Clay,28,200,40,40,90,flooded\n";
        let dataset = Dataset::from_reader(csv.as_bytes())?;
        assert_eq!(
            dataset.rows()[0],
            TrainingExample::new(90.0, 40.0, 40.0, 6.5, 200.0, 28.0, "Clay", "Rice")
        );
        Ok(())
    }

    #[test]
    fn test_missing_soil_column_uses_placeholder() -> Result<()> {
        let csv = "Nitrogen,Phosphorus,Potassium,pH,Rainfall,Temperature,Crop\n\
                   90,40,40,6.5,200,28,Rice\n";
        let dataset = Dataset::from_reader(csv.as_bytes())?;
        assert_eq!(dataset.rows()[0].features.soil_type, UNSPECIFIED_SOIL);
        Ok(())
    }

    #[test]
    fn test_missing_required_column() {
        let csv = "Nitrogen,Phosphorus,pH,Rainfall,Temperature,SoilType\n90,40,6.5,200,28,Clay\n";
        match Dataset::from_reader(csv.as_bytes()) {
            Err(CropError::DatasetLoadError(msg)) => {
                assert!(msg.contains("Potassium"));
                assert!(msg.contains("Crop"));
            }
            other => panic!("expected DatasetLoadError, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_value() {
        let csv = "Nitrogen,Phosphorus,Potassium,pH,Rainfall,Temperature,SoilType,Crop\n\
                   90,40,40,6.5,200,28,Clay,Rice\n\
                   30,sixty,40,5.5,100,25,Loamy,Banana\n";
        match Dataset::from_reader(csv.as_bytes()) {
            Err(CropError::SchemaMismatch { row, .. }) => assert_eq!(row, 2),
            other => panic!("expected SchemaMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_value() {
        let csv = "Nitrogen,Phosphorus,Potassium,pH,Rainfall,Temperature,SoilType,Crop\n\
                   90,40,40,6.5,200,28,,Rice\n";
        assert!(matches!(
            Dataset::from_reader(csv.as_bytes()),
            Err(CropError::SchemaMismatch { row: 1, .. })
        ));
    }

    #[test]
    fn test_non_finite_row_rejected() {
        let mut row = TrainingExample::new(90.0, 40.0, 40.0, 6.5, 200.0, 28.0, "Clay", "Rice");
        row.features.ph = f64::NAN;
        assert!(matches!(
            Dataset::new(vec![row]),
            Err(CropError::SchemaMismatch { row: 1, .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Dataset::from_csv("/nonexistent/crops.csv"),
            Err(CropError::DatasetLoadError(_))
        ));
    }

    #[test]
    fn test_encode_layout() -> Result<()> {
        let encoded = Dataset::sample().encode()?;

        assert_eq!(encoded.len(), 6);
        assert_eq!(encoded.n_classes(), 3);
        assert_eq!(encoded.soil_encoder.classes(), ["Clay", "Loamy", "Sandy"]);
        // Rice, Clay
        assert_eq!(encoded.features[0], vec![90.0, 40.0, 40.0, 6.5, 200.0, 28.0, 0.0]);
        assert_eq!(encoded.labels[0], encoded.crop_encoder.encode("Rice")?);
        assert!(encoded.features.iter().all(|r| r.len() == FEATURE_COUNT));
        Ok(())
    }

    #[test]
    fn test_encode_empty() {
        let empty = Dataset::new(Vec::new()).expect("an empty table is valid");
        assert_eq!(empty.encode().err(), Some(CropError::EmptyTrainingSet));
    }

    #[test]
    fn test_encode_features_rejects_unknown_soil() -> Result<()> {
        let encoded = Dataset::sample().encode()?;
        let query = FeatureVector {
            nitrogen: 25.0,
            phosphorus: 65.0,
            potassium: 45.0,
            ph: 5.4,
            rainfall: 120.0,
            temperature: 25.0,
            soil_type: "Peat".into(),
        };
        assert!(matches!(
            encode_features(&query, &encoded.soil_encoder),
            Err(CropError::UnknownCategory { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_kerala_table() {
        let kerala = Dataset::kerala();
        assert_eq!(kerala.len(), 48);
        let counts = kerala.crop_counts();
        assert_eq!(counts.len(), 6);
        assert!(counts.values().all(|&c| c == 8));
    }

    #[test]
    fn test_shuffle_determinism() {
        let mut ds1 = Dataset::kerala();
        let mut ds2 = ds1.clone();

        ds1.shuffle(42);
        ds2.shuffle(42);

        assert_eq!(ds1, ds2);
        assert_ne!(ds1, Dataset::kerala());
    }

    #[test]
    fn test_feature_stats() {
        let stats = Dataset::sample().feature_stats();
        assert_eq!(stats.len(), 6);
        assert_eq!(stats[0], (20.0, 100.0)); // Nitrogen
        assert_eq!(stats[3], (5.2, 6.8)); // pH
    }

    #[test]
    fn test_extend_is_superset() -> Result<()> {
        let base = Dataset::sample();
        let extra = TrainingExample::new(75.0, 70.0, 75.0, 6.5, 280.0, 31.0, "Coastal", "Coconut");
        let bigger = base.extend(vec![extra.clone()])?;

        assert_eq!(bigger.len(), base.len() + 1);
        assert_eq!(&bigger.rows()[..base.len()], base.rows());
        assert_eq!(bigger.rows()[base.len()], extra);
        Ok(())
    }
}

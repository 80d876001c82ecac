//! Feature schema for soil/climate queries
//!
//! Fixes the column order shared by the dataset builder, the classifier and
//! every caller, together with the plausible range of each numeric field.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of columns in an encoded feature row
pub const FEATURE_COUNT: usize = 7;

/// CSV header of the label column
pub const CROP_COLUMN: &str = "Crop";

/// Soil label given to rows loaded from a table without a `SoilType` column
pub const UNSPECIFIED_SOIL: &str = "Unspecified";

/// Input fields, in encoded column order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Field {
    Nitrogen,
    Phosphorus,
    Potassium,
    Ph,
    Rainfall,
    Temperature,
    SoilType,
}

impl Field {
    /// All fields in column order
    pub const ALL: [Field; FEATURE_COUNT] = [
        Field::Nitrogen,
        Field::Phosphorus,
        Field::Potassium,
        Field::Ph,
        Field::Rainfall,
        Field::Temperature,
        Field::SoilType,
    ];

    /// Numeric fields in column order
    pub const NUMERIC: [Field; 6] = [
        Field::Nitrogen,
        Field::Phosphorus,
        Field::Potassium,
        Field::Ph,
        Field::Rainfall,
        Field::Temperature,
    ];

    /// Header name used in tabular sources
    pub fn column_name(self) -> &'static str {
        match self {
            Field::Nitrogen => "Nitrogen",
            Field::Phosphorus => "Phosphorus",
            Field::Potassium => "Potassium",
            Field::Ph => "pH",
            Field::Rainfall => "Rainfall",
            Field::Temperature => "Temperature",
            Field::SoilType => "SoilType",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Field::Nitrogen | Field::Phosphorus | Field::Potassium => "kg/ha",
            Field::Ph => "pH",
            Field::Rainfall => "mm",
            Field::Temperature => "°C",
            Field::SoilType => "category",
        }
    }

    /// Position in an encoded feature row
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

/// Inclusive plausible range of a numeric field
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldRange {
    pub min: f64,
    pub max: f64,
    pub default: f64,
}

impl FieldRange {
    pub const fn new(min: f64, max: f64, default: f64) -> Self {
        Self { min, max, default }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

/// One query: the seven input fields without a label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub nitrogen: f64,
    pub phosphorus: f64,
    pub potassium: f64,
    pub ph: f64,
    pub rainfall: f64,
    pub temperature: f64,
    pub soil_type: String,
}

impl FeatureVector {
    /// Numeric fields in column order
    pub fn numeric_values(&self) -> [f64; 6] {
        [
            self.nitrogen,
            self.phosphorus,
            self.potassium,
            self.ph,
            self.rainfall,
            self.temperature,
        ]
    }

    /// Value of a numeric field; `None` for the soil type
    pub fn numeric(&self, field: Field) -> Option<f64> {
        match field {
            Field::SoilType => None,
            other => Some(self.numeric_values()[other.index()]),
        }
    }

    fn numeric_mut(&mut self, field: Field) -> Option<&mut f64> {
        match field {
            Field::Nitrogen => Some(&mut self.nitrogen),
            Field::Phosphorus => Some(&mut self.phosphorus),
            Field::Potassium => Some(&mut self.potassium),
            Field::Ph => Some(&mut self.ph),
            Field::Rainfall => Some(&mut self.rainfall),
            Field::Temperature => Some(&mut self.temperature),
            Field::SoilType => None,
        }
    }
}

/// One labeled training row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub features: FeatureVector,
    pub crop: String,
}

impl TrainingExample {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        nitrogen: f64,
        phosphorus: f64,
        potassium: f64,
        ph: f64,
        rainfall: f64,
        temperature: f64,
        soil_type: &str,
        crop: &str,
    ) -> Self {
        Self {
            features: FeatureVector {
                nitrogen,
                phosphorus,
                potassium,
                ph,
                rainfall,
                temperature,
                soil_type: soil_type.to_string(),
            },
            crop: crop.to_string(),
        }
    }
}

/// Ordered fields and their plausible ranges
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    ranges: [FieldRange; 6],
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self {
            ranges: [
                FieldRange::new(0.0, 200.0, 50.0),  // Nitrogen
                FieldRange::new(0.0, 200.0, 50.0),  // Phosphorus
                FieldRange::new(0.0, 200.0, 50.0),  // Potassium
                FieldRange::new(0.0, 14.0, 6.0),    // pH
                FieldRange::new(0.0, 500.0, 120.0), // Rainfall (mm)
                FieldRange::new(0.0, 50.0, 25.0),   // Temperature (°C)
            ],
        }
    }
}

impl FeatureSchema {
    pub fn fields(&self) -> &'static [Field] {
        &Field::ALL
    }

    /// Range of a numeric field; `None` for the soil type
    pub fn range(&self, field: Field) -> Option<&FieldRange> {
        match field {
            Field::SoilType => None,
            other => self.ranges.get(other.index()),
        }
    }

    /// Numeric fields of `query` lying outside their plausible range
    pub fn out_of_range(&self, query: &FeatureVector) -> Vec<Field> {
        Field::NUMERIC
            .iter()
            .copied()
            .filter(|&field| {
                let value = query.numeric_values()[field.index()];
                !self.ranges[field.index()].contains(value)
            })
            .collect()
    }

    /// Copy of `query` with every numeric field clamped into range
    pub fn clamp(&self, mut query: FeatureVector) -> FeatureVector {
        for field in Field::NUMERIC {
            if let Some(value) = query.numeric_mut(field) {
                *value = self.ranges[field.index()].clamp(*value);
            }
        }
        query
    }

    /// Query populated with every field's default value
    pub fn default_query(&self, soil_type: &str) -> FeatureVector {
        FeatureVector {
            nitrogen: self.ranges[0].default,
            phosphorus: self.ranges[1].default,
            potassium: self.ranges[2].default,
            ph: self.ranges[3].default,
            rainfall: self.ranges[4].default,
            temperature: self.ranges[5].default,
            soil_type: soil_type.to_string(),
        }
    }
}

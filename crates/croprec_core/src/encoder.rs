//! Categorical label encoding
//!
//! Codes are assigned in sorted (byte-wise lexicographic) order of the
//! distinct labels, so the same set of labels always maps to the same codes
//! regardless of row order.

use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

use crate::errors::{CropError, Result};

/// Frozen bijection between the labels of one column and `0..k`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryEncoder {
    column: String,
    classes: Vec<String>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl CategoryEncoder {
    /// Build the map from every label observed in `labels`
    pub fn fit<I, S>(column: &str, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let distinct: BTreeSet<String> = labels
            .into_iter()
            .map(|label| label.as_ref().to_string())
            .collect();
        let classes: Vec<String> = distinct.into_iter().collect();
        let index = classes
            .iter()
            .enumerate()
            .map(|(code, label)| (label.clone(), code))
            .collect();

        Self {
            column: column.to_string(),
            classes,
            index,
        }
    }

    pub fn encode(&self, label: &str) -> Result<usize> {
        self.index
            .get(label)
            .copied()
            .ok_or_else(|| CropError::UnknownCategory {
                column: self.column.clone(),
                label: label.to_string(),
            })
    }

    pub fn decode(&self, code: usize) -> Result<&str> {
        self.classes
            .get(code)
            .map(String::as_str)
            .ok_or_else(|| CropError::InvalidCode {
                column: self.column.clone(),
                code,
                len: self.classes.len(),
            })
    }

    pub fn contains(&self, label: &str) -> bool {
        self.index.contains_key(label)
    }

    /// Labels in code order
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

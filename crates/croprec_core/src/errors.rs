//! Error types for the crop recommendation pipeline

use thiserror::Error;

/// Errors returned by every stage of the pipeline.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CropError {
    /// A training row is missing a field or carries a malformed value
    #[error("schema mismatch at row {row}: {reason}")]
    SchemaMismatch { row: usize, reason: String },

    /// Encoding a label that was not observed during fit
    #[error("unknown {column} category: {label:?}")]
    UnknownCategory { column: String, label: String },

    /// Decoding a code outside the fitted range
    #[error("invalid {column} code {code} (fitted codes are 0..{len})")]
    InvalidCode {
        column: String,
        code: usize,
        len: usize,
    },

    #[error("training set is empty")]
    EmptyTrainingSet,

    /// Fewer than two distinct labels in the training targets
    #[error("need at least 2 distinct labels to train a classifier, found {found}")]
    LabelCardinalityMismatch { found: usize },

    /// Prediction requested before the pipeline was fitted
    #[error("model is not trained")]
    ModelNotReady,

    #[error("dataset load error: {0}")]
    DatasetLoadError(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, CropError>;

use thiserror::Error;

use crate::{classical::func::FeatureError, table::TableError};

/// Failures while splitting, fitting, evaluating or serializing a model.
#[derive(Debug, Error)]
pub enum TrainingError {
    /// Algorithm tag is not part of the supported family.
    #[error("unsupported algorithm '{0}'")]
    UnknownAlgorithm(String),
    /// Target column holds fewer than two distinct labels.
    #[error("target needs at least two classes, found {0}")]
    TooFewClasses(usize),
    /// A class cannot populate every cross-validation fold.
    #[error("class '{class}' has {members} training members, fewer than {folds} folds")]
    ClassTooSmall {
        /// Class label.
        class: String,
        /// Members in the training partition.
        members: usize,
        /// Requested fold count.
        folds: usize,
    },
    /// A split produced an empty partition.
    #[error("{0} partition is empty")]
    EmptyPartition(&'static str),
    /// Target value is empty.
    #[error("target is empty at row {0}")]
    MissingLabel(usize),
    /// Predictor value is not numeric.
    #[error(transparent)]
    Feature(#[from] FeatureError),
    /// Trainer settings are out of range.
    #[error("invalid trainer settings: {0}")]
    InvalidSettings(String),
    /// Fitted model could not be encoded.
    #[error("serializing model: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failures while decoding an artifact or predicting a table.
#[derive(Debug, Error)]
pub enum ScoringError {
    /// Artifact bytes are not a model document.
    #[error("model artifact is not readable: {0}")]
    Decode(#[from] serde_json::Error),
    /// Artifact declares another format.
    #[error("unsupported artifact format '{0}'")]
    UnsupportedFormat(String),
    /// Artifact was written by a newer version.
    #[error("unsupported artifact version {found} (supported up to {supported})")]
    UnsupportedVersion {
        /// Version in the artifact header.
        found: u32,
        /// Newest readable version.
        supported: u32,
    },
    /// Input lacks features the model was trained on.
    #[error("input table lacks model features: {}", .0.join(", "))]
    MissingFeatures(Vec<String>),
    /// Predictor value is not numeric.
    #[error(transparent)]
    Feature(#[from] FeatureError),
    /// Scored output could not be attached.
    #[error(transparent)]
    Table(#[from] TableError),
}

#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Modelhost learning stack: tabular data, schema checks, support-vector
//! classifiers, evaluation, model artifacts and scoring.

/// In-memory tables parsed from delimited payloads.
#[path = "../table.rs"]
pub mod table;

/// Predictor/target column validation.
#[path = "../schema.rs"]
pub mod schema;

/// Classifier family, splitting and metrics.
#[path = "../classical/main.rs"]
pub mod classical;

/// Training and scoring error kinds.
#[path = "../error.rs"]
pub mod error;

/// Split, cross-validate, fit and evaluate.
#[path = "../trainer.rs"]
pub mod trainer;

/// Versioned model artifact encoding.
#[path = "../artifact.rs"]
pub mod artifact;

/// Applies stored models to new tables.
#[path = "../scorer.rs"]
pub mod scorer;

pub use classical::{reporter::EvaluationReport, Algorithm, Classifier};
pub use error::{ScoringError, TrainingError};
pub use schema::{validate, SchemaError, ValidatedTable};
pub use scorer::{score, score_with, OUTPUT_COLUMN};
pub use table::{Scalar, Table, TableError};
pub use trainer::{ModelTrainer, TrainedModel, TrainerSettings, TrainingPlan};

//! Support-vector classifier family and its evaluation helpers.

/// Feature matrix and label helpers.
pub mod func;
/// Kernel functions.
pub mod kernel;
/// Accuracy, confusion matrix and per-class metrics.
pub mod metrics;
/// Evaluation report.
pub mod reporter;
/// Stratified hold-out and k-fold splitting.
pub mod split;
/// SMO solver and one-vs-one classifier.
pub mod svc;

use std::{fmt, str::FromStr};

use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::error::TrainingError;
use kernel::Kernel;
use svc::{SupportVectorClassifier, SvcParams};

/// Supported algorithm tags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
    /// RBF support-vector classifier with `gamma = 1 / n_features`.
    #[default]
    Svc,
    /// Linear-kernel support-vector classifier.
    SvcLinear,
}

impl Algorithm {
    /// Canonical tag.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Svc => "svc",
            Self::SvcLinear => "svc-linear",
        }
    }

    /// Solver parameters for a problem with `n_features` predictors.
    #[must_use]
    pub fn params(self, n_features: usize) -> SvcParams {
        match self {
            Self::Svc => SvcParams::new(Kernel::rbf_auto(n_features)),
            Self::SvcLinear => SvcParams::new(Kernel::Linear),
        }
    }
}

impl FromStr for Algorithm {
    type Err = TrainingError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "svc" | "svm" | "svc-rbf" => Ok(Self::Svc),
            "svc-linear" | "linear-svc" | "svc_linear" => Ok(Self::SvcLinear),
            _ => Err(TrainingError::UnknownAlgorithm(raw.to_string())),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Fitted classifier, tagged by family so stored artifacts can grow new variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "kebab-case")]
pub enum Classifier {
    /// One-vs-one support-vector classifier.
    Svc(SupportVectorClassifier),
}

impl Classifier {
    /// Fits the classifier selected by `algorithm`.
    pub fn fit(
        algorithm: Algorithm,
        features: &Array2<f64>,
        labels: &[String],
    ) -> Result<Self, TrainingError> {
        let params = algorithm.params(features.ncols());
        SupportVectorClassifier::fit(&params, features, labels).map(Self::Svc)
    }

    /// Class labels known to the model.
    #[must_use]
    pub fn classes(&self) -> &[String] {
        match self {
            Self::Svc(model) => model.classes(),
        }
    }

    /// Predicts one sample.
    #[must_use]
    pub fn predict_one(&self, sample: ArrayView1<'_, f64>) -> &str {
        match self {
            Self::Svc(model) => &model.classes()[model.predict_index(sample)],
        }
    }

    /// Predicts every row.
    #[must_use]
    pub fn predict(&self, features: &Array2<f64>) -> Vec<String> {
        match self {
            Self::Svc(model) => model.predict(features),
        }
    }
}

use serde::{Deserialize, Serialize};

use super::metrics::{ClassMetrics, ConfusionMatrix};

/// Evaluation produced by one training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Algorithm tag.
    pub algorithm: String,
    /// Accuracy of every cross-validation fold, in fold order.
    pub fold_accuracies: Vec<f64>,
    /// Mean cross-validation accuracy.
    pub cv_mean: f64,
    /// Population standard deviation of the fold accuracies.
    pub cv_std: f64,
    /// Accuracy on the held-out partition.
    pub holdout_accuracy: f64,
    /// Held-out confusion matrix.
    pub confusion: ConfusionMatrix,
    /// Held-out precision/recall/F1 per class.
    pub classes: Vec<ClassMetrics>,
    /// Rows in the training partition.
    pub train_rows: usize,
    /// Rows in the held-out partition.
    pub holdout_rows: usize,
}

impl EvaluationReport {
    /// Renders a concise summary string.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "[SVC] algorithm={} cv={:.4} ({:.4}) holdout={:.4} train={} holdout_rows={}",
            self.algorithm,
            self.cv_mean,
            self.cv_std,
            self.holdout_accuracy,
            self.train_rows,
            self.holdout_rows
        )
    }
}

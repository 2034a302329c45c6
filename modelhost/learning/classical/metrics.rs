use serde::{Deserialize, Serialize};

/// Confusion matrix; rows are true classes, columns predicted classes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    /// Class labels indexing rows and columns.
    pub classes: Vec<String>,
    /// `counts[truth][predicted]`.
    pub counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    /// Tallies predictions against ground truth. Labels outside `classes` are skipped.
    #[must_use]
    pub fn from_predictions(classes: &[String], truth: &[String], predicted: &[String]) -> Self {
        let mut counts = vec![vec![0; classes.len()]; classes.len()];
        let index = |label: &String| classes.iter().position(|class| class == label);
        for (actual, guess) in truth.iter().zip(predicted) {
            if let (Some(row), Some(col)) = (index(actual), index(guess)) {
                counts[row][col] += 1;
            }
        }
        Self {
            classes: classes.to_vec(),
            counts,
        }
    }

    /// Number of tallied samples.
    #[must_use]
    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    /// Share of samples on the diagonal.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        let correct: usize = (0..self.classes.len()).map(|idx| self.counts[idx][idx]).sum();
        ratio(correct, self.total())
    }

    /// Precision, recall, F1 and support for every class.
    #[must_use]
    pub fn class_metrics(&self) -> Vec<ClassMetrics> {
        (0..self.classes.len())
            .map(|idx| {
                let true_positive = self.counts[idx][idx];
                let support: usize = self.counts[idx].iter().sum();
                let predicted: usize = self.counts.iter().map(|row| row[idx]).sum();
                let precision = ratio(true_positive, predicted);
                let recall = ratio(true_positive, support);
                let f1 = if precision + recall == 0.0 {
                    0.0
                } else {
                    2.0 * precision * recall / (precision + recall)
                };
                ClassMetrics {
                    class: self.classes[idx].clone(),
                    precision,
                    recall,
                    f1,
                    support,
                }
            })
            .collect()
    }
}

/// Per-class classification report line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    /// Class label.
    pub class: String,
    /// TP / (TP + FP).
    pub precision: f64,
    /// TP / (TP + FN).
    pub recall: f64,
    /// Harmonic mean of precision and recall.
    pub f1: f64,
    /// True members of the class in the evaluated rows.
    pub support: usize,
}

/// Share of matching labels; zero for empty input.
#[must_use]
pub fn accuracy(truth: &[String], predicted: &[String]) -> f64 {
    let correct = truth
        .iter()
        .zip(predicted)
        .filter(|(actual, guess)| actual == guess)
        .count();
    ratio(correct, truth.len())
}

/// Mean and population standard deviation.
#[must_use]
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    #[allow(clippy::cast_precision_loss)]
    let count = values.len() as f64;
    let mean = values.iter().sum::<f64>() / count;
    let variance = values.iter().map(|value| (value - mean).powi(2)).sum::<f64>() / count;
    (mean, variance.sqrt())
}

#[allow(clippy::cast_precision_loss)]
fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

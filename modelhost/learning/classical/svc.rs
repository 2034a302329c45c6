use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use super::kernel::Kernel;
use crate::error::TrainingError;

const TAU: f64 = 1e-12;

/// Hyperparameters of a support-vector classifier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SvcParams {
    /// Box constraint.
    pub c: f64,
    /// Kernel function.
    pub kernel: Kernel,
    /// Stopping tolerance on the maximal KKT violation.
    pub tolerance: f64,
    /// Hard cap on solver iterations per binary problem.
    pub max_iterations: usize,
}

impl SvcParams {
    /// Parameters with `C = 1` and tolerance `1e-3`.
    #[must_use]
    pub const fn new(kernel: Kernel) -> Self {
        Self {
            c: 1.0,
            kernel,
            tolerance: 1e-3,
            max_iterations: 10_000_000,
        }
    }
}

/// Binary machine: `f(x) = sum_i coef_i * K(sv_i, x) - rho`, positive means the first class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryMachine {
    coefficients: Vec<f64>,
    support_vectors: Array2<f64>,
    rho: f64,
}

impl BinaryMachine {
    /// Solves the dual problem with SMO using maximal-violating-pair selection.
    ///
    /// `targets` holds `+1.0` / `-1.0` per row of `features`.
    fn fit(features: ArrayView2<'_, f64>, targets: &[f64], params: &SvcParams) -> Self {
        let n = targets.len();
        let c = params.c;
        let kernel = params.kernel;
        let q = |i: usize, j: usize| {
            targets[i] * targets[j] * kernel.eval(features.row(i), features.row(j))
        };
        let diagonal: Vec<f64> = (0..n).map(|i| q(i, i)).collect();
        let mut alpha = vec![0.0_f64; n];
        let mut gradient = vec![-1.0_f64; n];
        let limit = params.max_iterations.max(100 * n);

        for _ in 0..limit {
            let mut g_max = f64::NEG_INFINITY;
            let mut g_min = f64::INFINITY;
            let mut up = None;
            let mut low = None;
            for t in 0..n {
                let violation = -targets[t] * gradient[t];
                let positive = targets[t] > 0.0;
                let in_up = (positive && alpha[t] < c) || (!positive && alpha[t] > 0.0);
                let in_low = (positive && alpha[t] > 0.0) || (!positive && alpha[t] < c);
                if in_up && violation > g_max {
                    g_max = violation;
                    up = Some(t);
                }
                if in_low && violation < g_min {
                    g_min = violation;
                    low = Some(t);
                }
            }
            let (Some(i), Some(j)) = (up, low) else {
                break;
            };
            if g_max - g_min < params.tolerance {
                break;
            }

            let q_ij = q(i, j);
            let (old_i, old_j) = (alpha[i], alpha[j]);
            if (targets[i] - targets[j]).abs() > f64::EPSILON {
                let mut quad = diagonal[i] + diagonal[j] + 2.0 * q_ij;
                if quad <= 0.0 {
                    quad = TAU;
                }
                let delta = (-gradient[i] - gradient[j]) / quad;
                let diff = alpha[i] - alpha[j];
                alpha[i] += delta;
                alpha[j] += delta;
                if diff > 0.0 {
                    if alpha[j] < 0.0 {
                        alpha[j] = 0.0;
                        alpha[i] = diff;
                    }
                    if alpha[i] > c {
                        alpha[i] = c;
                        alpha[j] = c - diff;
                    }
                } else {
                    if alpha[i] < 0.0 {
                        alpha[i] = 0.0;
                        alpha[j] = -diff;
                    }
                    if alpha[j] > c {
                        alpha[j] = c;
                        alpha[i] = c + diff;
                    }
                }
            } else {
                let mut quad = diagonal[i] + diagonal[j] - 2.0 * q_ij;
                if quad <= 0.0 {
                    quad = TAU;
                }
                let delta = (gradient[i] - gradient[j]) / quad;
                let sum = alpha[i] + alpha[j];
                alpha[i] -= delta;
                alpha[j] += delta;
                if sum > c {
                    if alpha[i] > c {
                        alpha[i] = c;
                        alpha[j] = sum - c;
                    }
                    if alpha[j] > c {
                        alpha[j] = c;
                        alpha[i] = sum - c;
                    }
                } else {
                    if alpha[j] < 0.0 {
                        alpha[j] = 0.0;
                        alpha[i] = sum;
                    }
                    if alpha[i] < 0.0 {
                        alpha[i] = 0.0;
                        alpha[j] = sum;
                    }
                }
            }

            let (delta_i, delta_j) = (alpha[i] - old_i, alpha[j] - old_j);
            for (t, grad) in gradient.iter_mut().enumerate() {
                *grad += q(i, t) * delta_i + q(j, t) * delta_j;
            }
        }

        let rho = offset(&alpha, &gradient, targets, c);
        let support: Vec<usize> = (0..n).filter(|&t| alpha[t] > 0.0).collect();
        Self {
            coefficients: support.iter().map(|&t| alpha[t] * targets[t]).collect(),
            support_vectors: features.select(Axis(0), &support),
            rho,
        }
    }

    /// Signed decision value for one sample.
    #[must_use]
    pub fn decision(&self, kernel: Kernel, sample: ArrayView1<'_, f64>) -> f64 {
        self.coefficients
            .iter()
            .zip(self.support_vectors.rows())
            .map(|(coef, sv)| coef * kernel.eval(sv, sample))
            .sum::<f64>()
            - self.rho
    }

    /// Number of support vectors.
    #[must_use]
    pub fn support_count(&self) -> usize {
        self.coefficients.len()
    }
}

/// Bias term: mean of `y * grad` over free multipliers, midpoint of the bounds otherwise.
fn offset(alpha: &[f64], gradient: &[f64], targets: &[f64], c: f64) -> f64 {
    let mut upper = f64::INFINITY;
    let mut lower = f64::NEG_INFINITY;
    let mut free_sum = 0.0;
    let mut free = 0_usize;
    for t in 0..alpha.len() {
        let y_grad = targets[t] * gradient[t];
        let positive = targets[t] > 0.0;
        if alpha[t] >= c {
            if positive {
                lower = lower.max(y_grad);
            } else {
                upper = upper.min(y_grad);
            }
        } else if alpha[t] <= 0.0 {
            if positive {
                upper = upper.min(y_grad);
            } else {
                lower = lower.max(y_grad);
            }
        } else {
            free += 1;
            free_sum += y_grad;
        }
    }
    if free > 0 {
        #[allow(clippy::cast_precision_loss)]
        let count = free as f64;
        free_sum / count
    } else {
        (upper + lower) / 2.0
    }
}

/// One-vs-one machine between `classes[positive]` and `classes[negative]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct PairwiseMachine {
    positive: usize,
    negative: usize,
    machine: BinaryMachine,
}

/// Multi-class support-vector classifier (one-vs-one, majority vote).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportVectorClassifier {
    kernel: Kernel,
    c: f64,
    classes: Vec<String>,
    machines: Vec<PairwiseMachine>,
}

impl SupportVectorClassifier {
    /// Fits one binary machine per class pair. Classes are ordered by label text.
    pub fn fit(
        params: &SvcParams,
        features: &Array2<f64>,
        labels: &[String],
    ) -> Result<Self, TrainingError> {
        if features.nrows() == 0 || features.nrows() != labels.len() {
            return Err(TrainingError::EmptyPartition("training"));
        }
        let mut classes: Vec<String> = labels.to_vec();
        classes.sort();
        classes.dedup();
        if classes.len() < 2 {
            return Err(TrainingError::TooFewClasses(classes.len()));
        }
        let encoded: Vec<usize> = labels
            .iter()
            .map(|label| classes.binary_search(label).unwrap_or_default())
            .collect();

        let mut machines = Vec::with_capacity(classes.len() * (classes.len() - 1) / 2);
        for positive in 0..classes.len() {
            for negative in positive + 1..classes.len() {
                let rows: Vec<usize> = (0..encoded.len())
                    .filter(|&idx| encoded[idx] == positive || encoded[idx] == negative)
                    .collect();
                let subset = features.select(Axis(0), &rows);
                let targets: Vec<f64> = rows
                    .iter()
                    .map(|&idx| if encoded[idx] == positive { 1.0 } else { -1.0 })
                    .collect();
                machines.push(PairwiseMachine {
                    positive,
                    negative,
                    machine: BinaryMachine::fit(subset.view(), &targets, params),
                });
            }
        }
        Ok(Self {
            kernel: params.kernel,
            c: params.c,
            classes,
            machines,
        })
    }

    /// Known class labels, sorted.
    #[must_use]
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Total support vectors across the pairwise machines.
    #[must_use]
    pub fn support_count(&self) -> usize {
        self.machines
            .iter()
            .map(|pair| pair.machine.support_count())
            .sum()
    }

    /// Predicts the class index of one sample; ties go to the class sorting first.
    #[must_use]
    pub fn predict_index(&self, sample: ArrayView1<'_, f64>) -> usize {
        let mut votes = vec![0_usize; self.classes.len()];
        for pair in &self.machines {
            if pair.machine.decision(self.kernel, sample) > 0.0 {
                votes[pair.positive] += 1;
            } else {
                votes[pair.negative] += 1;
            }
        }
        let mut best = 0;
        for (idx, &count) in votes.iter().enumerate() {
            if count > votes[best] {
                best = idx;
            }
        }
        best
    }

    /// Predicts labels for every row.
    #[must_use]
    pub fn predict(&self, features: &Array2<f64>) -> Vec<String> {
        features
            .rows()
            .into_iter()
            .map(|row| self.classes[self.predict_index(row)].clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn labels(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| (*value).to_string()).collect()
    }

    #[test]
    fn separates_linear_clusters() {
        let features = array![
            [0.0, 0.0],
            [0.2, 0.1],
            [0.1, 0.3],
            [3.0, 3.0],
            [3.2, 2.9],
            [2.8, 3.1]
        ];
        let y = labels(&["low", "low", "low", "high", "high", "high"]);
        let model = SupportVectorClassifier::fit(&SvcParams::new(Kernel::Linear), &features, &y)
            .unwrap();
        assert_eq!(model.classes(), ["high", "low"]);
        assert_eq!(model.predict(&array![[0.1, 0.1], [3.1, 3.0]]), labels(&["low", "high"]));
    }

    #[test]
    fn rbf_handles_three_classes() {
        let features = array![
            [0.0, 0.0],
            [0.1, 0.2],
            [5.0, 0.0],
            [5.1, 0.2],
            [0.0, 5.0],
            [0.2, 5.1]
        ];
        let y = labels(&["a", "a", "b", "b", "c", "c"]);
        let model =
            SupportVectorClassifier::fit(&SvcParams::new(Kernel::rbf_auto(2)), &features, &y)
                .unwrap();
        assert_eq!(model.predict(&features), y);
        assert!(model.support_count() > 0);
    }

    #[test]
    fn single_class_is_rejected() {
        let features = array![[0.0], [1.0]];
        let err = SupportVectorClassifier::fit(
            &SvcParams::new(Kernel::Linear),
            &features,
            &labels(&["a", "a"]),
        )
        .unwrap_err();
        assert!(matches!(err, TrainingError::TooFewClasses(1)));
    }
}

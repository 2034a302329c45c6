use std::collections::BTreeMap;

use rand::{seq::SliceRandom, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::TrainingError;

/// Row indices assigned to the fitting and evaluation sides of a split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    /// Rows used for fitting, ascending.
    pub train: Vec<usize>,
    /// Rows used for evaluation, ascending.
    pub test: Vec<usize>,
}

/// Groups row indices by label; classes come out in label order.
fn class_members(labels: &[String]) -> BTreeMap<&str, Vec<usize>> {
    let mut members: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (idx, label) in labels.iter().enumerate() {
        members.entry(label.as_str()).or_default().push(idx);
    }
    members
}

/// Seeded hold-out split preserving the label distribution.
#[derive(Debug, Clone, Copy)]
pub struct StratifiedSplit {
    test_fraction: f64,
    seed: u64,
}

impl StratifiedSplit {
    /// Creates a split holding out `test_fraction` of every class.
    #[must_use]
    pub const fn new(test_fraction: f64, seed: u64) -> Self {
        Self {
            test_fraction,
            seed,
        }
    }

    /// Assigns every row to exactly one side.
    pub fn split(&self, labels: &[String]) -> Result<Partition, TrainingError> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(TrainingError::InvalidSettings(format!(
                "test fraction {} outside (0, 1)",
                self.test_fraction
            )));
        }
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut train = Vec::with_capacity(labels.len());
        let mut test = Vec::new();
        for (_, mut rows) in class_members(labels) {
            rows.shuffle(&mut rng);
            #[allow(
                clippy::cast_precision_loss,
                clippy::cast_possible_truncation,
                clippy::cast_sign_loss
            )]
            let held_out = ((rows.len() as f64) * self.test_fraction).round() as usize;
            let held_out = held_out.min(rows.len());
            test.extend_from_slice(&rows[..held_out]);
            train.extend_from_slice(&rows[held_out..]);
        }
        if train.is_empty() {
            return Err(TrainingError::EmptyPartition("training"));
        }
        if test.is_empty() {
            return Err(TrainingError::EmptyPartition("held-out"));
        }
        train.sort_unstable();
        test.sort_unstable();
        Ok(Partition { train, test })
    }
}

/// Seeded, shuffled k-fold split where every fold keeps the label distribution.
#[derive(Debug, Clone, Copy)]
pub struct StratifiedKFold {
    folds: usize,
    seed: u64,
}

impl StratifiedKFold {
    /// Creates a splitter with `folds` folds.
    #[must_use]
    pub const fn new(folds: usize, seed: u64) -> Self {
        Self { folds, seed }
    }

    /// Returns one partition per fold; `test` is the fold, `train` the rest.
    pub fn split(&self, labels: &[String]) -> Result<Vec<Partition>, TrainingError> {
        if self.folds < 2 {
            return Err(TrainingError::InvalidSettings(format!(
                "cross-validation needs at least 2 folds, got {}",
                self.folds
            )));
        }
        let members = class_members(labels);
        if members.len() < 2 {
            return Err(TrainingError::TooFewClasses(members.len()));
        }
        if let Some((class, rows)) = members.iter().find(|(_, rows)| rows.len() < self.folds) {
            return Err(TrainingError::ClassTooSmall {
                class: (*class).to_string(),
                members: rows.len(),
                folds: self.folds,
            });
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut assignment = vec![0_usize; labels.len()];
        for (_, mut rows) in members {
            rows.shuffle(&mut rng);
            for (position, row) in rows.into_iter().enumerate() {
                assignment[row] = position % self.folds;
            }
        }

        Ok((0..self.folds)
            .map(|fold| {
                let (test, train): (Vec<usize>, Vec<usize>) =
                    (0..labels.len()).partition(|&row| assignment[row] == fold);
                Partition { train, test }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn balanced(per_class: usize) -> Vec<String> {
        ["a", "b", "c"]
            .iter()
            .flat_map(|class| std::iter::repeat((*class).to_string()).take(per_class))
            .collect()
    }

    #[test]
    fn split_is_stratified_and_deterministic() {
        let labels = balanced(20);
        let first = StratifiedSplit::new(0.25, 1).split(&labels).unwrap();
        let second = StratifiedSplit::new(0.25, 1).split(&labels).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.test.len(), 15);
        assert_eq!(first.train.len() + first.test.len(), labels.len());
        for class in ["a", "b", "c"] {
            let held = first.test.iter().filter(|&&row| labels[row] == class).count();
            assert_eq!(held, 5);
        }
    }

    #[test]
    fn different_seed_moves_rows() {
        let labels = balanced(40);
        let first = StratifiedSplit::new(0.25, 1).split(&labels).unwrap();
        let other = StratifiedSplit::new(0.25, 7).split(&labels).unwrap();
        assert_ne!(first.test, other.test);
    }

    #[test]
    fn folds_cover_every_row_once() {
        let labels = balanced(12);
        let folds = StratifiedKFold::new(4, 1).split(&labels).unwrap();
        assert_eq!(folds.len(), 4);
        let mut seen: Vec<usize> = folds.iter().flat_map(|fold| fold.test.clone()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..labels.len()).collect::<Vec<_>>());
        for fold in &folds {
            assert_eq!(fold.test.len(), 9);
            assert_eq!(fold.train.len(), 27);
        }
        assert_eq!(folds, StratifiedKFold::new(4, 1).split(&labels).unwrap());
    }

    #[test]
    fn small_class_fails_fold_assignment() {
        let mut labels = balanced(12);
        labels.push("rare".into());
        let err = StratifiedKFold::new(10, 1).split(&labels).unwrap_err();
        assert!(matches!(err, TrainingError::ClassTooSmall { members: 1, folds: 10, .. }));
    }
}

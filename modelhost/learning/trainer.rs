use serde::{Deserialize, Serialize};

use crate::{
    classical::{
        func::{design_matrix, label_strings, select_labels, select_rows},
        metrics::{accuracy, mean_std, ConfusionMatrix},
        reporter::EvaluationReport,
        split::{Partition, StratifiedKFold, StratifiedSplit},
        Algorithm, Classifier,
    },
    error::TrainingError,
    schema::ValidatedTable,
};

/// Evaluation procedure settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainerSettings {
    /// Seed shared by the hold-out split and the fold shuffle.
    pub seed: u64,
    /// Share of every class held out for the final evaluation.
    pub test_fraction: f64,
    /// Cross-validation folds.
    pub folds: usize,
}

impl Default for TrainerSettings {
    fn default() -> Self {
        Self {
            seed: 1,
            test_fraction: 0.25,
            folds: 10,
        }
    }
}

/// Fitted classifier plus the feature manifest needed to score new tables.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainedModel {
    /// Algorithm tag the model was trained with.
    pub algorithm: Algorithm,
    /// Predictor names in feature-vector order.
    pub features: Vec<String>,
    /// Target column the labels came from.
    pub target: String,
    /// Fitted parameters.
    pub classifier: Classifier,
}

/// Row assignment used by one training run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingPlan {
    /// Hold-out split over the whole table.
    pub holdout: Partition,
    /// Folds over the training partition, as row indices of the whole table.
    pub folds: Vec<Partition>,
}

/// Runs the split / cross-validate / fit / evaluate procedure.
#[derive(Debug, Clone, Default)]
pub struct ModelTrainer {
    settings: TrainerSettings,
}

impl ModelTrainer {
    /// Creates a trainer.
    #[must_use]
    pub const fn new(settings: TrainerSettings) -> Self {
        Self { settings }
    }

    /// Computes the hold-out split and the cross-validation folds for `labels`.
    pub fn plan(&self, labels: &[String]) -> Result<TrainingPlan, TrainingError> {
        let holdout =
            StratifiedSplit::new(self.settings.test_fraction, self.settings.seed).split(labels)?;
        let train_labels = select_labels(labels, &holdout.train);
        let folds = StratifiedKFold::new(self.settings.folds, self.settings.seed)
            .split(&train_labels)?
            .into_iter()
            .map(|fold| Partition {
                train: fold.train.iter().map(|&idx| holdout.train[idx]).collect(),
                test: fold.test.iter().map(|&idx| holdout.train[idx]).collect(),
            })
            .collect();
        Ok(TrainingPlan { holdout, folds })
    }

    /// Trains `algorithm` on the validated table and evaluates it.
    pub fn train(
        &self,
        table: &ValidatedTable,
        algorithm: Algorithm,
    ) -> Result<(TrainedModel, EvaluationReport), TrainingError> {
        let features = design_matrix(table.view(), table.predictors())?;
        let labels = label_strings(table.labels())?;
        let plan = self.plan(&labels)?;

        let mut fold_accuracies = Vec::with_capacity(plan.folds.len());
        for fold in &plan.folds {
            let model = Classifier::fit(
                algorithm,
                &select_rows(&features, &fold.train),
                &select_labels(&labels, &fold.train),
            )?;
            let predicted = model.predict(&select_rows(&features, &fold.test));
            fold_accuracies.push(accuracy(&select_labels(&labels, &fold.test), &predicted));
        }
        let (cv_mean, cv_std) = mean_std(&fold_accuracies);

        let train_x = select_rows(&features, &plan.holdout.train);
        let train_y = select_labels(&labels, &plan.holdout.train);
        let classifier = Classifier::fit(algorithm, &train_x, &train_y)?;

        let test_y = select_labels(&labels, &plan.holdout.test);
        let predicted = classifier.predict(&select_rows(&features, &plan.holdout.test));
        let confusion = ConfusionMatrix::from_predictions(classifier.classes(), &test_y, &predicted);
        let report = EvaluationReport {
            algorithm: algorithm.tag().to_string(),
            fold_accuracies,
            cv_mean,
            cv_std,
            holdout_accuracy: accuracy(&test_y, &predicted),
            classes: confusion.class_metrics(),
            confusion,
            train_rows: plan.holdout.train.len(),
            holdout_rows: plan.holdout.test.len(),
        };

        let model = TrainedModel {
            algorithm,
            features: table.predictors().to_vec(),
            target: table.target().to_string(),
            classifier,
        };
        Ok((model, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{classical::func::label_strings, schema::validate, table::Table};
    use std::path::Path;

    fn iris() -> Table {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("dataset/iris.csv");
        Table::from_csv(&std::fs::read(path).unwrap()).unwrap()
    }

    fn predictors() -> Vec<String> {
        ["sepal_length", "sepal_width", "petal_length", "petal_width"]
            .iter()
            .map(|name| (*name).to_string())
            .collect()
    }

    #[test]
    fn iris_cross_validation_is_accurate() {
        let table = validate(&iris(), &predictors(), "species").unwrap();
        let (model, report) = ModelTrainer::default()
            .train(&table, Algorithm::Svc)
            .unwrap();
        assert_eq!(report.fold_accuracies.len(), 10);
        assert!(report.cv_mean > 0.8, "{}", report.summary());
        assert!(report.holdout_accuracy > 0.8, "{}", report.summary());
        assert_eq!(report.train_rows + report.holdout_rows, 150);
        assert_eq!(report.confusion.total(), report.holdout_rows);
        assert_eq!(model.classifier.classes(), ["setosa", "versicolor", "virginica"]);
        assert_eq!(model.features, predictors());
    }

    #[test]
    fn plan_is_deterministic_for_a_seed() {
        let table = validate(&iris(), &predictors(), "species").unwrap();
        let labels = label_strings(table.labels()).unwrap();
        let trainer = ModelTrainer::default();
        let first = trainer.plan(&labels).unwrap();
        assert_eq!(first, trainer.plan(&labels).unwrap());
        for fold in &first.folds {
            assert!(fold.test.iter().all(|row| first.holdout.train.contains(row)));
            assert!(fold.test.iter().all(|row| !fold.train.contains(row)));
        }
    }

    #[test]
    fn class_smaller_than_fold_count_fails() {
        let csv = "x,label\n1,a\n2,a\n3,a\n4,b\n5,b\n6,b\n";
        let table = Table::from_csv(csv.as_bytes()).unwrap();
        let validated = validate(&table, &["x".to_string()], "label").unwrap();
        let err = ModelTrainer::default()
            .train(&validated, Algorithm::Svc)
            .unwrap_err();
        assert!(matches!(err, TrainingError::ClassTooSmall { folds: 10, .. }));
    }

    #[test]
    fn text_predictor_fails_before_fitting() {
        let csv = "x,label\nred,a\nblue,b\n";
        let table = Table::from_csv(csv.as_bytes()).unwrap();
        let validated = validate(&table, &["x".to_string()], "label").unwrap();
        let err = ModelTrainer::default()
            .train(&validated, Algorithm::Svc)
            .unwrap_err();
        assert!(matches!(err, TrainingError::Feature(_)));
    }
}

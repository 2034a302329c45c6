use crate::{
    classical::func::design_matrix,
    error::ScoringError,
    table::{Scalar, Table},
    trainer::TrainedModel,
};

/// Name of the column holding predictions.
pub const OUTPUT_COLUMN: &str = "output";

/// Decodes an artifact and scores `table` with it.
pub fn score(artifact: &[u8], table: Table) -> Result<Table, ScoringError> {
    let model = TrainedModel::from_artifact(artifact)?;
    score_with(&model, table)
}

/// Appends an [`OUTPUT_COLUMN`] with one prediction per row, keeping every
/// original column and the row order.
pub fn score_with(model: &TrainedModel, mut table: Table) -> Result<Table, ScoringError> {
    let missing: Vec<String> = model
        .features
        .iter()
        .filter(|name| !table.contains(name))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(ScoringError::MissingFeatures(missing));
    }
    let features = design_matrix(&table, &model.features)?;
    let predictions = features
        .rows()
        .into_iter()
        .map(|row| Scalar::parse(model.classifier.predict_one(row)))
        .collect();
    table.push_column(OUTPUT_COLUMN, predictions)?;
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{classical::Algorithm, schema::validate, table::TableError, trainer::ModelTrainer};

    fn training_csv() -> String {
        let mut csv = String::from("f1,f2,grade\n");
        for idx in 0..60 {
            let class = idx % 3;
            let base = f64::from(class) * 3.0;
            csv.push_str(&format!(
                "{},{},{}\n",
                base + f64::from(idx % 4) * 0.1,
                base - f64::from(idx % 5) * 0.1,
                class + 1
            ));
        }
        csv
    }

    fn model() -> TrainedModel {
        let table = Table::from_csv(training_csv().as_bytes()).unwrap();
        let validated = validate(&table, &["f1".into(), "f2".into()], "grade").unwrap();
        ModelTrainer::default()
            .train(&validated, Algorithm::Svc)
            .unwrap()
            .0
    }

    #[test]
    fn appends_output_and_preserves_rows() {
        let model = model();
        let input = Table::from_csv(b"id,f2,f1,note\n1,0.0,0.1,a\n2,3.0,3.1,b\n3,6.1,5.9,c\n")
            .unwrap();
        let scored = score(&model.to_artifact().unwrap(), input.clone()).unwrap();
        assert_eq!(scored.column_count(), input.column_count() + 1);
        assert_eq!(scored.row_count(), input.row_count());
        for row in 0..input.row_count() {
            let original = input.row(row).unwrap();
            assert_eq!(&scored.row(row).unwrap()[..original.len()], original.as_slice());
        }
        assert_eq!(
            scored.column(OUTPUT_COLUMN).unwrap(),
            [Scalar::Number(1.0), Scalar::Number(2.0), Scalar::Number(3.0)]
        );
    }

    #[test]
    fn missing_feature_is_named() {
        let model = model();
        let input = Table::from_csv(b"f1\n0.1\n").unwrap();
        let err = score_with(&model, input).unwrap_err();
        assert!(matches!(err, ScoringError::MissingFeatures(names) if names == ["f2"]));
    }

    #[test]
    fn existing_output_column_is_rejected() {
        let model = model();
        let input = Table::from_csv(b"f1,f2,output\n0.1,0.0,x\n").unwrap();
        let err = score_with(&model, input).unwrap_err();
        assert!(matches!(err, ScoringError::Table(TableError::DuplicateColumn(_))));
    }
}

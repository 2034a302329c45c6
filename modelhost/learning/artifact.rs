use serde::{Deserialize, Serialize};

use crate::{
    classical::{Algorithm, Classifier},
    error::{ScoringError, TrainingError},
    trainer::TrainedModel,
};

/// Format identifier written into every artifact header.
pub const ARTIFACT_FORMAT: &str = "modelhost.classifier";
/// Newest artifact version this build reads and the one it writes.
pub const ARTIFACT_VERSION: u32 = 1;
/// File extension used when the artifact is uploaded.
pub const ARTIFACT_EXTENSION: &str = "model";
/// Media type of the encoded artifact.
pub const ARTIFACT_MEDIA_TYPE: &str = "application/json";

#[derive(Deserialize)]
struct ArtifactHeader {
    format: String,
    version: u32,
}

#[derive(Serialize, Deserialize)]
struct ArtifactDocument {
    format: String,
    version: u32,
    algorithm: Algorithm,
    features: Vec<String>,
    target: String,
    classifier: Classifier,
}

impl TrainedModel {
    /// Encodes the model as a versioned JSON artifact.
    pub fn to_artifact(&self) -> Result<Vec<u8>, TrainingError> {
        let document = ArtifactDocument {
            format: ARTIFACT_FORMAT.to_string(),
            version: ARTIFACT_VERSION,
            algorithm: self.algorithm,
            features: self.features.clone(),
            target: self.target.clone(),
            classifier: self.classifier.clone(),
        };
        Ok(serde_json::to_vec(&document)?)
    }

    /// Decodes an artifact, checking its header first.
    pub fn from_artifact(bytes: &[u8]) -> Result<Self, ScoringError> {
        let header: ArtifactHeader = serde_json::from_slice(bytes)?;
        if header.format != ARTIFACT_FORMAT {
            return Err(ScoringError::UnsupportedFormat(header.format));
        }
        if header.version > ARTIFACT_VERSION {
            return Err(ScoringError::UnsupportedVersion {
                found: header.version,
                supported: ARTIFACT_VERSION,
            });
        }
        let document: ArtifactDocument = serde_json::from_slice(bytes)?;
        Ok(Self {
            algorithm: document.algorithm,
            features: document.features,
            target: document.target,
            classifier: document.classifier,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        classical::func::design_matrix, schema::validate, table::Table, trainer::ModelTrainer,
    };
    use serde_json::json;

    fn trained() -> (TrainedModel, Table) {
        let mut csv = String::from("a,b,label\n");
        for idx in 0..40 {
            let shift = if idx % 2 == 0 { 0.0 } else { 4.0 };
            csv.push_str(&format!(
                "{},{},{}\n",
                shift + f64::from(idx % 5) * 0.13,
                shift - f64::from(idx % 3) * 0.21,
                if idx % 2 == 0 { "left" } else { "right" }
            ));
        }
        let table = Table::from_csv(csv.as_bytes()).unwrap();
        let validated = validate(&table, &["a".into(), "b".into()], "label").unwrap();
        let (model, _) = ModelTrainer::default()
            .train(&validated, Algorithm::Svc)
            .unwrap();
        (model, table)
    }

    #[test]
    fn round_trip_reproduces_predictions() {
        let (model, table) = trained();
        let restored = TrainedModel::from_artifact(&model.to_artifact().unwrap()).unwrap();
        assert_eq!(restored, model);
        let features = design_matrix(&table, &model.features).unwrap();
        assert_eq!(restored.classifier.predict(&features), model.classifier.predict(&features));
    }

    #[test]
    fn header_is_checked() {
        let (model, _) = trained();
        let mut document: serde_json::Value =
            serde_json::from_slice(&model.to_artifact().unwrap()).unwrap();
        assert_eq!(document["format"], json!(ARTIFACT_FORMAT));
        assert_eq!(document["classifier"]["family"], json!("svc"));

        document["version"] = json!(ARTIFACT_VERSION + 1);
        let err = TrainedModel::from_artifact(&serde_json::to_vec(&document).unwrap()).unwrap_err();
        assert!(matches!(err, ScoringError::UnsupportedVersion { .. }));

        document["format"] = json!("pickle");
        let err = TrainedModel::from_artifact(&serde_json::to_vec(&document).unwrap()).unwrap_err();
        assert!(matches!(err, ScoringError::UnsupportedFormat(format) if format == "pickle"));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(
            TrainedModel::from_artifact(b"\x80\x04pickle"),
            Err(ScoringError::Decode(_))
        ));
    }
}

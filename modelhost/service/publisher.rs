use modelhost_learning::{
    artifact::{ARTIFACT_EXTENSION, ARTIFACT_MEDIA_TYPE},
    Table, TrainedModel,
};
use serde::Serialize;
use serde_json::Value;

use crate::{
    context::BearerToken,
    error::ServiceError,
    gateway::{DataGateway, FilePart, RawResponse, Upload},
    host::{endpoint, DATA_SOURCES_PATH, MODELS_PATH},
};

/// Form field carrying the uploaded file.
pub const FILE_FIELD: &str = "files";
/// Media type of published result tables.
pub const CSV_MEDIA_TYPE: &str = "text/csv";

/// Descriptive fields sent along with a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelMetadata {
    /// Model name; also the artifact file stem.
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// Free-text function label.
    pub function: String,
    /// Algorithm tag used for training.
    pub algorithm: String,
    /// Destination folder, if any.
    pub folder_id: Option<String>,
}

impl ModelMetadata {
    fn form_fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![
            ("name".to_string(), self.name.clone()),
            ("description".to_string(), self.description.clone()),
            ("function".to_string(), self.function.clone()),
            ("algorithm".to_string(), self.algorithm.clone()),
        ];
        if let Some(folder) = &self.folder_id {
            fields.push(("folderId".to_string(), folder.clone()));
        }
        fields
    }
}

/// How registry statuses are reported back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusPolicy {
    /// Always answer 201 once the registry returned JSON.
    ForceCreated,
    /// Echo the registry status; non-success statuses fail.
    PassThrough,
}

impl StatusPolicy {
    /// Policy for the `force_created_status` flag.
    #[must_use]
    pub const fn from_flag(force_created: bool) -> Self {
        if force_created {
            Self::ForceCreated
        } else {
            Self::PassThrough
        }
    }

    fn apply(self, url: &str, raw: RawResponse) -> Result<RegistryResponse, ServiceError> {
        let rejected = |raw: &RawResponse| ServiceError::Publish {
            url: url.to_string(),
            status: raw.status,
            body: String::from_utf8_lossy(&raw.body).into_owned(),
        };
        let Ok(body) = serde_json::from_slice::<Value>(&raw.body) else {
            return Err(rejected(&raw));
        };
        let status = match self {
            Self::ForceCreated => 201,
            Self::PassThrough if (200..300).contains(&raw.status) => raw.status,
            Self::PassThrough => return Err(rejected(&raw)),
        };
        Ok(RegistryResponse { status, body })
    }
}

/// Registry answer relayed to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryResponse {
    /// Status to answer with.
    pub status: u16,
    /// Parsed JSON body.
    pub body: Value,
}

impl RegistryResponse {
    /// Pretty-printed body.
    #[must_use]
    pub fn pretty(&self) -> String {
        serde_json::to_string_pretty(&self.body).unwrap_or_else(|_| self.body.to_string())
    }
}

/// Uploads a serialized model to `<registry>/models`.
pub async fn publish_model(
    gateway: &dyn DataGateway,
    registry: &str,
    model: &TrainedModel,
    metadata: &ModelMetadata,
    policy: StatusPolicy,
    token: Option<&BearerToken>,
) -> Result<RegistryResponse, ServiceError> {
    let url = endpoint(registry, MODELS_PATH);
    let upload = Upload {
        fields: metadata.form_fields(),
        file: FilePart {
            field: FILE_FIELD.to_string(),
            file_name: format!("{}.{ARTIFACT_EXTENSION}", metadata.name),
            media_type: ARTIFACT_MEDIA_TYPE.to_string(),
            bytes: model.to_artifact()?,
        },
    };
    let raw = gateway.upload(&url, upload, token).await?;
    policy.apply(&url, raw)
}

/// Uploads a scored table as CSV to `<registry>/dataSources`.
pub async fn publish_result(
    gateway: &dyn DataGateway,
    registry: &str,
    table: &Table,
    output_name: &str,
    drawer_id: &str,
    policy: StatusPolicy,
    token: Option<&BearerToken>,
) -> Result<RegistryResponse, ServiceError> {
    let url = endpoint(registry, DATA_SOURCES_PATH);
    let bytes = table
        .to_csv()
        .map_err(|err| ServiceError::Internal(format!("encoding result table: {err}")))?;
    let upload = Upload {
        fields: vec![("drawerId".to_string(), drawer_id.to_string())],
        file: FilePart {
            field: FILE_FIELD.to_string(),
            file_name: format!("{output_name}.csv"),
            media_type: CSV_MEDIA_TYPE.to_string(),
            bytes,
        },
    };
    let raw = gateway.upload(&url, upload, token).await?;
    policy.apply(&url, raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryGateway;
    use bytes::Bytes;
    use modelhost_learning::{Scalar, Table};

    fn raw(status: u16, body: &str) -> RawResponse {
        RawResponse {
            status,
            body: Bytes::from(body.to_string()),
        }
    }

    #[test]
    fn forced_policy_always_answers_created() {
        let response = StatusPolicy::ForceCreated
            .apply("http://r/models", raw(200, r#"{"id":1}"#))
            .unwrap();
        assert_eq!(response.status, 201);
        assert!(response.pretty().contains("\"id\": 1"));
    }

    #[test]
    fn pass_through_rejects_failures() {
        let ok = StatusPolicy::PassThrough
            .apply("http://r/models", raw(200, "{}"))
            .unwrap();
        assert_eq!(ok.status, 200);
        let err = StatusPolicy::PassThrough
            .apply("http://r/models", raw(409, r#"{"error":"exists"}"#))
            .unwrap_err();
        assert!(matches!(err, ServiceError::Publish { status: 409, .. }));
    }

    #[test]
    fn non_json_body_is_a_publish_error() {
        let err = StatusPolicy::ForceCreated
            .apply("http://r/models", raw(502, "<html>bad gateway</html>"))
            .unwrap_err();
        assert!(err.to_string().contains("bad gateway"));
    }

    #[tokio::test]
    async fn result_upload_is_csv_with_drawer() {
        let gateway = MemoryGateway::new();
        let table = Table::from_columns(vec![
            ("x".to_string(), vec![Scalar::Number(1.0)]),
            ("output".to_string(), vec![Scalar::Text("a".into())]),
        ])
        .unwrap();
        let token = BearerToken::new("Bearer t");
        let response = publish_result(
            &gateway,
            "http://r:80",
            &table,
            "scored",
            "drawer-7",
            StatusPolicy::ForceCreated,
            Some(&token),
        )
        .await
        .unwrap();
        assert_eq!(response.status, 201);

        let uploads = gateway.uploads();
        assert_eq!(uploads.len(), 1);
        let sent = &uploads[0];
        assert_eq!(sent.url, "http://r:80/dataSources");
        assert_eq!(sent.token.as_deref(), Some("Bearer t"));
        assert_eq!(sent.upload.file.file_name, "scored.csv");
        assert_eq!(sent.upload.file.media_type, "text/csv");
        assert_eq!(
            sent.upload.fields,
            vec![("drawerId".to_string(), "drawer-7".to_string())]
        );
        assert_eq!(sent.upload.file.bytes, b"x,output\n1,a\n");
    }

    #[test]
    fn folder_is_sent_only_when_present() {
        let mut metadata = ModelMetadata {
            name: "iris".into(),
            description: "d".into(),
            function: "classification".into(),
            algorithm: "svc".into(),
            folder_id: None,
        };
        assert_eq!(metadata.form_fields().len(), 4);
        metadata.folder_id = Some("f1".into());
        assert_eq!(
            metadata.form_fields().last(),
            Some(&("folderId".to_string(), "f1".to_string()))
        );
    }
}

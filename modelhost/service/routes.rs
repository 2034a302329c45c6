use std::sync::Arc;

use actix_multipart::Multipart;
use actix_web::{
    http::{header::AUTHORIZATION, StatusCode},
    web, HttpRequest, HttpResponse,
};
use anyhow::Result;
use futures::TryStreamExt;
use modelhost_learning::ModelTrainer;
use serde_json::json;
use shared_logging::LogLevel;

use crate::{
    config::ServiceConfig,
    context::{BearerToken, RequestContext},
    error::ServiceError,
    gateway::HttpGateway,
    host::RegistryTarget,
    pipeline::{Pipelines, ScoringRequest, TrainingRequest},
    publisher::{RegistryResponse, StatusPolicy},
    telemetry::ServiceTelemetry,
};

/// Multipart field holding the serialized model.
pub const FILE_FIELD: &str = "file";
/// Multipart field holding the input data-source URL.
pub const INPUT_FIELD: &str = "scoreInputTable";
/// Multipart field holding the result table name.
pub const OUTPUT_FIELD: &str = "scoreOutputTable";
/// Multipart field holding the destination drawer.
pub const DRAWER_FIELD: &str = "drawerId";
/// Largest accepted model artifact.
pub const MAX_ARTIFACT_BYTES: usize = 64 * 1024 * 1024;
/// Largest accepted text field.
pub const MAX_TEXT_BYTES: usize = 16 * 1024;

/// Shared, immutable state of the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pipelines: Pipelines,
    telemetry: ServiceTelemetry,
}

impl AppState {
    /// Wraps already-built pipelines.
    #[must_use]
    pub const fn new(pipelines: Pipelines, telemetry: ServiceTelemetry) -> Self {
        Self {
            pipelines,
            telemetry,
        }
    }

    /// Builds the HTTP gateway and pipelines described by `config`.
    pub fn from_config(config: &ServiceConfig, telemetry: ServiceTelemetry) -> Result<Self> {
        let gateway = HttpGateway::new(
            config.registry.fetch_timeout(),
            config.registry.publish_timeout(),
        )?;
        let pipelines = Pipelines::new(
            Arc::new(gateway),
            RegistryTarget::new(config.registry.base_url.clone()),
            ModelTrainer::new(config.trainer_settings()),
            config.default_algorithm()?,
            StatusPolicy::from_flag(config.registry.force_created_status),
        );
        Ok(Self::new(pipelines, telemetry))
    }

    fn context(&self, request: &HttpRequest) -> RequestContext {
        let token = request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(BearerToken::new);
        RequestContext::new(token, self.telemetry.clone())
    }
}

/// Registers the service routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _| {
        ServiceError::InvalidRequest(format!("unreadable training request: {err}")).into()
    }))
    .route("/models", web::post().to(train_model))
    .route("/score", web::post().to(score_model))
    .route("/status", web::get().to(status));
}

async fn train_model(
    state: web::Data<AppState>,
    request: HttpRequest,
    body: web::Json<TrainingRequest>,
) -> Result<HttpResponse, ServiceError> {
    let ctx = state.context(&request);
    let body = body.into_inner();
    ctx.log(
        LogLevel::Info,
        "train.received",
        json!({ "train_table": body.train_table, "name": body.name }),
    );
    let outcome = state.pipelines.train(&ctx, body).await?;
    relay(&outcome.response)
}

async fn score_model(
    state: web::Data<AppState>,
    request: HttpRequest,
    payload: Multipart,
) -> Result<HttpResponse, ServiceError> {
    let ctx = state.context(&request);
    let scoring = read_scoring_form(payload).await?;
    ctx.log(
        LogLevel::Info,
        "score.received",
        json!({
            "input": scoring.input_table,
            "output": scoring.output_name,
            "artifact_bytes": scoring.artifact.len(),
        }),
    );
    let response = state.pipelines.score(&ctx, scoring).await?;
    relay(&response)
}

async fn status() -> HttpResponse {
    HttpResponse::Ok().finish()
}

fn relay(response: &RegistryResponse) -> Result<HttpResponse, ServiceError> {
    let status = StatusCode::from_u16(response.status)
        .map_err(|_| ServiceError::Internal(format!("invalid status {}", response.status)))?;
    Ok(HttpResponse::build(status)
        .content_type("application/json")
        .body(response.pretty()))
}

async fn read_scoring_form(mut payload: Multipart) -> Result<ScoringRequest, ServiceError> {
    let mut artifact = None;
    let mut input_table = None;
    let mut output_name = None;
    let mut drawer_id = None;

    while let Some(mut field) = payload.try_next().await.map_err(malformed)? {
        let name = field
            .content_disposition()
            .get_name()
            .unwrap_or_default()
            .to_string();
        let limit = if name == FILE_FIELD {
            MAX_ARTIFACT_BYTES
        } else {
            MAX_TEXT_BYTES
        };
        let mut content = Vec::new();
        while let Some(chunk) = field.try_next().await.map_err(malformed)? {
            if content.len() + chunk.len() > limit {
                return Err(ServiceError::InvalidRequest(format!(
                    "multipart field '{name}' exceeds {limit} bytes"
                )));
            }
            content.extend_from_slice(&chunk);
        }
        match name.as_str() {
            FILE_FIELD => artifact = Some(content),
            INPUT_FIELD => input_table = Some(text(INPUT_FIELD, content)?),
            OUTPUT_FIELD => output_name = Some(text(OUTPUT_FIELD, content)?),
            DRAWER_FIELD => drawer_id = Some(text(DRAWER_FIELD, content)?),
            _ => {}
        }
    }

    Ok(ScoringRequest {
        artifact: artifact.ok_or_else(|| missing(FILE_FIELD))?,
        input_table: input_table.ok_or_else(|| missing(INPUT_FIELD))?,
        output_name: output_name.ok_or_else(|| missing(OUTPUT_FIELD))?,
        drawer_id: drawer_id.ok_or_else(|| missing(DRAWER_FIELD))?,
    })
}

fn text(field: &str, content: Vec<u8>) -> Result<String, ServiceError> {
    String::from_utf8(content)
        .map(|value| value.trim().to_string())
        .map_err(|_| ServiceError::InvalidRequest(format!("field '{field}' is not utf-8 text")))
}

fn missing(field: &str) -> ServiceError {
    ServiceError::InvalidRequest(format!("missing multipart field '{field}'"))
}

fn malformed(err: actix_multipart::MultipartError) -> ServiceError {
    ServiceError::InvalidRequest(format!("malformed multipart body: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{iris_csv, MemoryGateway};
    use actix_web::{body::to_bytes, http::header::CONTENT_TYPE, test, App};
    use modelhost_learning::{validate, Algorithm, Table, TrainerSettings};

    const TRAIN_URL: &str = "http://data.example:9090/dataSource/iris/content";
    const BOUNDARY: &str = "modelhost-test-boundary";

    fn state(gateway: Arc<MemoryGateway>) -> web::Data<AppState> {
        let pipelines = Pipelines::new(
            gateway,
            RegistryTarget::default(),
            ModelTrainer::new(TrainerSettings::default()),
            Algorithm::Svc,
            StatusPolicy::ForceCreated,
        );
        web::Data::new(AppState::new(pipelines, ServiceTelemetry::disabled()))
    }

    fn multipart_body(parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, file_name, content) in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match file_name {
                Some(file) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                ),
            }
            body.extend_from_slice(content);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn iris_artifact() -> Vec<u8> {
        let table = Table::from_csv(iris_csv().as_bytes()).unwrap();
        let predictors = ["sepal_length", "sepal_width", "petal_length", "petal_width"]
            .map(String::from)
            .to_vec();
        let validated = validate(&table, &predictors, "species").unwrap();
        let (model, _) = ModelTrainer::default()
            .train(&validated, Algorithm::Svc)
            .unwrap();
        model.to_artifact().unwrap()
    }

    /// First ten iris rows plus five passthrough columns.
    fn ten_column_csv() -> String {
        let mut lines = iris_csv().lines();
        let header = lines.next().unwrap();
        let mut out = format!("{header},batch,site,operator,note,weight\n");
        for (idx, line) in lines.take(10).enumerate() {
            out.push_str(&format!("{line},b{idx},north,op-{idx},ok,{}.5\n", idx + 1));
        }
        out
    }

    #[actix_web::test]
    async fn status_is_ok_and_empty() {
        let app = test::init_service(
            App::new()
                .app_data(state(Arc::new(MemoryGateway::new())))
                .configure(configure),
        )
        .await;
        let resp = test::call_service(&app, test::TestRequest::get().uri("/status").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(to_bytes(resp.into_body()).await.unwrap().is_empty());
    }

    #[actix_web::test]
    async fn training_iris_publishes_model_with_created_status() {
        let gateway = Arc::new(MemoryGateway::new().with_source(TRAIN_URL, iris_csv()));
        let app =
            test::init_service(App::new().app_data(state(gateway.clone())).configure(configure))
                .await;
        let req = test::TestRequest::post()
            .uri("/models")
            .insert_header((AUTHORIZATION, "Bearer abc"))
            .set_json(json!({
                "trainTable": TRAIN_URL,
                "predictors": ["sepal_length", "sepal_width", "petal_length", "petal_width"],
                "target": "species",
                "name": "iris",
                "description": "iris classifier",
                "function": "classification",
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body = to_bytes(resp.into_body()).await.unwrap();
        let echoed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(echoed["fileName"], "iris.model");

        assert_eq!(gateway.fetched_tokens(), vec![Some("Bearer abc".to_string())]);
        let uploads = gateway.uploads();
        assert_eq!(uploads[0].url, "http://data.example:9090/models");
        assert_eq!(uploads[0].token.as_deref(), Some("Bearer abc"));
    }

    #[actix_web::test]
    async fn missing_column_answers_not_found() {
        let gateway = Arc::new(MemoryGateway::new().with_source(TRAIN_URL, iris_csv()));
        let app =
            test::init_service(App::new().app_data(state(gateway.clone())).configure(configure))
                .await;
        let req = test::TestRequest::post()
            .uri("/models")
            .set_json(json!({
                "trainTable": TRAIN_URL,
                "predictors": ["sepal_length", "color"],
                "target": "species",
                "name": "iris",
                "description": "",
                "function": "",
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body = to_bytes(resp.into_body()).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains(TRAIN_URL));
        assert!(text.contains("doesn't have required columns"));
        assert!(gateway.uploads().is_empty());
    }

    #[actix_web::test]
    async fn unreadable_training_body_is_bad_request() {
        let app = test::init_service(
            App::new()
                .app_data(state(Arc::new(MemoryGateway::new())))
                .configure(configure),
        )
        .await;
        let req = test::TestRequest::post()
            .uri("/models")
            .insert_header((CONTENT_TYPE, "application/json"))
            .set_payload("{\"trainTable\": 3")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn scoring_appends_output_and_uploads_result() {
        let gateway = Arc::new(
            MemoryGateway::new().with_source("http://data.example/ds/7/content", ten_column_csv()),
        );
        let app =
            test::init_service(App::new().app_data(state(gateway.clone())).configure(configure))
                .await;
        let artifact = iris_artifact();
        let body = multipart_body(&[
            ("file", Some("iris.model"), artifact.as_slice()),
            ("scoreInputTable", None, b"http://data.example/ds/7".as_slice()),
            ("scoreOutputTable", None, b"iris-scored".as_slice()),
            ("drawerId", None, b"drawer-3".as_slice()),
        ]);
        let req = test::TestRequest::post()
            .uri("/score")
            .insert_header((
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            ))
            .set_payload(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let uploads = gateway.uploads();
        assert_eq!(uploads.len(), 1);
        let sent = &uploads[0];
        assert_eq!(sent.url, "http://data.example:80/dataSources");
        assert_eq!(sent.upload.file.file_name, "iris-scored.csv");
        let scored = Table::from_csv(&sent.upload.file.bytes).unwrap();
        assert_eq!(scored.column_count(), 11);
        assert_eq!(scored.row_count(), 10);
        assert_eq!(scored.column_names().last(), Some("output"));
        assert_eq!(scored.column("weight").unwrap()[0].to_string(), "1.5");
    }

    #[actix_web::test]
    async fn oversized_text_field_is_bad_request() {
        let gateway = Arc::new(MemoryGateway::new());
        let app =
            test::init_service(App::new().app_data(state(gateway.clone())).configure(configure))
                .await;
        let long_name = vec![b'x'; MAX_TEXT_BYTES + 1];
        let body = multipart_body(&[
            ("file", Some("iris.model"), b"{}".as_slice()),
            ("scoreInputTable", None, b"http://data.example/ds/7".as_slice()),
            ("scoreOutputTable", None, long_name.as_slice()),
            ("drawerId", None, b"drawer-3".as_slice()),
        ]);
        let req = test::TestRequest::post()
            .uri("/score")
            .insert_header((
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            ))
            .set_payload(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let text = to_bytes(resp.into_body()).await.unwrap();
        assert!(String::from_utf8_lossy(&text).contains("scoreOutputTable"));
        assert!(gateway.uploads().is_empty());
    }

    #[actix_web::test]
    async fn scoring_without_drawer_is_bad_request() {
        let gateway = Arc::new(MemoryGateway::new());
        let app =
            test::init_service(App::new().app_data(state(gateway.clone())).configure(configure))
                .await;
        let body = multipart_body(&[
            ("file", Some("iris.model"), b"{}".as_slice()),
            ("scoreInputTable", None, b"http://data.example/ds/7".as_slice()),
            ("scoreOutputTable", None, b"iris-scored".as_slice()),
        ]);
        let req = test::TestRequest::post()
            .uri("/score")
            .insert_header((
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            ))
            .set_payload(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(gateway.uploads().is_empty());
    }
}

use std::sync::Arc;

use actix_web::web;
use modelhost_learning::{score, validate, Algorithm, EvaluationReport, ModelTrainer, Table};
use serde::Deserialize;
use serde_json::{json, Value};
use shared_logging::LogLevel;

use crate::{
    context::RequestContext,
    error::ServiceError,
    fetcher::{content_url, fetch_table},
    gateway::DataGateway,
    host::RegistryTarget,
    publisher::{publish_model, publish_result, ModelMetadata, RegistryResponse, StatusPolicy},
};

/// Body of `POST /models`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingRequest {
    /// URL of the training table.
    pub train_table: String,
    /// Predictor column names, in feature order.
    pub predictors: Vec<String>,
    /// Label column name.
    pub target: String,
    /// Model name.
    pub name: String,
    /// Model description.
    #[serde(default)]
    pub description: String,
    /// Model function label.
    #[serde(default)]
    pub function: String,
    /// Algorithm tag; the configured default when absent or empty.
    #[serde(default)]
    pub algorithm: Option<String>,
    /// Registry folder.
    #[serde(default)]
    pub folder_id: Option<String>,
}

/// Fields of `POST /score`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoringRequest {
    /// Serialized model.
    pub artifact: Vec<u8>,
    /// Data-source URL; its `/content` is scored.
    pub input_table: String,
    /// Name of the published result table.
    pub output_name: String,
    /// Destination drawer.
    pub drawer_id: String,
}

/// Result of a training run.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    /// Registry answer for the published model.
    pub response: RegistryResponse,
    /// Cross-validation and hold-out evaluation.
    pub report: EvaluationReport,
}

/// Train and score pipelines sharing one gateway and configuration.
#[derive(Clone)]
pub struct Pipelines {
    gateway: Arc<dyn DataGateway>,
    registry: RegistryTarget,
    trainer: ModelTrainer,
    default_algorithm: Algorithm,
    policy: StatusPolicy,
}

impl Pipelines {
    /// Creates the pipelines.
    #[must_use]
    pub fn new(
        gateway: Arc<dyn DataGateway>,
        registry: RegistryTarget,
        trainer: ModelTrainer,
        default_algorithm: Algorithm,
        policy: StatusPolicy,
    ) -> Self {
        Self {
            gateway,
            registry,
            trainer,
            default_algorithm,
            policy,
        }
    }

    /// Fetch, validate, train, evaluate and publish.
    pub async fn train(
        &self,
        ctx: &RequestContext,
        request: TrainingRequest,
    ) -> Result<TrainingOutcome, ServiceError> {
        let result = self.run_train(ctx, request).await;
        if let Err(err) = &result {
            log_failure(ctx, "train.failed", err);
        }
        result
    }

    /// Fetch, score and publish the result table.
    pub async fn score(
        &self,
        ctx: &RequestContext,
        request: ScoringRequest,
    ) -> Result<RegistryResponse, ServiceError> {
        let result = self.run_score(ctx, request).await;
        if let Err(err) = &result {
            log_failure(ctx, "score.failed", err);
        }
        result
    }

    fn algorithm(&self, tag: Option<&str>) -> Result<Algorithm, ServiceError> {
        match tag.map(str::trim) {
            None | Some("") => Ok(self.default_algorithm),
            Some(tag) => Ok(tag.parse()?),
        }
    }

    async fn run_train(
        &self,
        ctx: &RequestContext,
        request: TrainingRequest,
    ) -> Result<TrainingOutcome, ServiceError> {
        let url = request.train_table.clone();
        let registry = self.registry.resolve(&url)?;
        let algorithm = self.algorithm(request.algorithm.as_deref())?;

        let table = fetch_table(self.gateway.as_ref(), &url, ctx.token()).await?;
        ctx.log(
            LogLevel::Info,
            "train.fetched",
            json!({ "url": url, "rows": table.row_count(), "columns": table.column_count() }),
        );

        let validated = validate(&table, &request.predictors, &request.target).map_err(
            |source| ServiceError::Schema {
                url: url.clone(),
                source,
            },
        )?;
        drop(table);
        ctx.log(
            LogLevel::Debug,
            "train.validated",
            json!({ "predictors": request.predictors, "target": request.target }),
        );

        let trainer = self.trainer.clone();
        let (model, report) =
            run_blocking(move || trainer.train(&validated, algorithm).map_err(Into::into)).await?;
        ctx.log(
            LogLevel::Info,
            "train.evaluated",
            json!({
                "summary": report.summary(),
                "report": serde_json::to_value(&report).unwrap_or(Value::Null),
            }),
        );

        let metadata = ModelMetadata {
            name: request.name,
            description: request.description,
            function: request.function,
            algorithm: algorithm.tag().to_string(),
            folder_id: request.folder_id,
        };
        let response = publish_model(
            self.gateway.as_ref(),
            &registry,
            &model,
            &metadata,
            self.policy,
            ctx.token(),
        )
        .await?;
        ctx.log(
            LogLevel::Info,
            "train.published",
            json!({ "registry": registry, "name": metadata.name, "status": response.status }),
        );
        Ok(TrainingOutcome { response, report })
    }

    async fn run_score(
        &self,
        ctx: &RequestContext,
        request: ScoringRequest,
    ) -> Result<RegistryResponse, ServiceError> {
        let registry = self.registry.resolve(&request.input_table)?;
        let url = content_url(&request.input_table);
        let table = fetch_table(self.gateway.as_ref(), &url, ctx.token()).await?;
        ctx.log(
            LogLevel::Info,
            "score.fetched",
            json!({ "url": url, "rows": table.row_count(), "columns": table.column_count() }),
        );

        let artifact = request.artifact;
        let scored: Table =
            run_blocking(move || score(&artifact, table).map_err(Into::into)).await?;
        ctx.log(
            LogLevel::Info,
            "score.predicted",
            json!({ "rows": scored.row_count(), "columns": scored.column_count() }),
        );

        let response = publish_result(
            self.gateway.as_ref(),
            &registry,
            &scored,
            &request.output_name,
            &request.drawer_id,
            self.policy,
            ctx.token(),
        )
        .await?;
        ctx.log(
            LogLevel::Info,
            "score.published",
            json!({ "registry": registry, "output": request.output_name, "status": response.status }),
        );
        Ok(response)
    }
}

async fn run_blocking<T, F>(job: F) -> Result<T, ServiceError>
where
    F: FnOnce() -> Result<T, ServiceError> + Send + 'static,
    T: Send + 'static,
{
    web::block(job)
        .await
        .map_err(|err| ServiceError::Internal(format!("blocking pool: {err}")))?
}

fn log_failure(ctx: &RequestContext, stage: &str, err: &ServiceError) {
    ctx.log(
        LogLevel::Error,
        stage,
        json!({ "kind": err.kind(), "error": err.to_string() }),
    );
}

#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Modelhost HTTP service: trains classifiers from remote tables, publishes
//! them to a model registry and scores new tables with stored models.

/// Service configuration file.
#[path = "../config.rs"]
pub mod config;

/// Per-request state and forwarded credentials.
#[path = "../context.rs"]
pub mod context;

/// Service error kinds and their HTTP mapping.
#[path = "../error.rs"]
pub mod error;

/// Table download.
#[path = "../fetcher.rs"]
pub mod fetcher;

/// Byte transport to remote services.
#[path = "../gateway.rs"]
pub mod gateway;

/// Registry host inference.
#[path = "../host.rs"]
pub mod host;

/// Train and score pipelines.
#[path = "../pipeline.rs"]
pub mod pipeline;

/// Model and result uploads.
#[path = "../publisher.rs"]
pub mod publisher;

/// HTTP routes.
#[path = "../routes.rs"]
pub mod routes;

/// Structured request logging.
#[path = "../telemetry.rs"]
pub mod telemetry;

#[cfg(test)]
#[path = "../testing.rs"]
mod testing;

pub use config::ServiceConfig;
pub use context::{BearerToken, RequestContext};
pub use error::ServiceError;
pub use gateway::{DataGateway, HttpGateway};
pub use host::{resolve_registry_host, RegistryTarget};
pub use pipeline::{Pipelines, ScoringRequest, TrainingOutcome, TrainingRequest};
pub use publisher::{ModelMetadata, RegistryResponse, StatusPolicy};
pub use routes::{configure, AppState};
pub use telemetry::ServiceTelemetry;

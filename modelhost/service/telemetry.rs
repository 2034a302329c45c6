use std::{fmt, path::PathBuf, sync::Arc};

use anyhow::Result;
use serde_json::Value;
use shared_logging::{JsonLogger, LogLevel, LogRecord};

/// Builder for service telemetry sinks.
pub struct ServiceTelemetryBuilder {
    module: String,
    log_path: Option<PathBuf>,
    stderr: bool,
    min_level: LogLevel,
}

impl ServiceTelemetryBuilder {
    /// Creates the builder.
    #[must_use]
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            log_path: None,
            stderr: false,
            min_level: LogLevel::Info,
        }
    }

    /// Writes JSON lines to a file.
    #[must_use]
    pub fn log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// Writes JSON lines to stderr when no file is configured.
    #[must_use]
    pub const fn stderr(mut self, enabled: bool) -> Self {
        self.stderr = enabled;
        self
    }

    /// Drops records below `level`.
    #[must_use]
    pub const fn min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Builds the telemetry handle.
    pub fn build(self) -> Result<ServiceTelemetry> {
        let logger = match (self.log_path, self.stderr) {
            (Some(path), _) => Some(JsonLogger::new(path)?.with_min_level(self.min_level)),
            (None, true) => Some(JsonLogger::stderr().with_min_level(self.min_level)),
            (None, false) => None,
        };
        Ok(ServiceTelemetry {
            inner: Arc::new(TelemetryInner {
                module: self.module,
                logger,
            }),
        })
    }
}

/// Telemetry handle shared by the request handlers.
#[derive(Clone)]
pub struct ServiceTelemetry {
    inner: Arc<TelemetryInner>,
}

struct TelemetryInner {
    module: String,
    logger: Option<JsonLogger>,
}

impl fmt::Debug for ServiceTelemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceTelemetry")
            .field("module", &self.inner.module)
            .finish()
    }
}

impl ServiceTelemetry {
    /// Returns a builder.
    #[must_use]
    pub fn builder(module: impl Into<String>) -> ServiceTelemetryBuilder {
        ServiceTelemetryBuilder::new(module)
    }

    /// Telemetry that drops every record.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            inner: Arc::new(TelemetryInner {
                module: "modelhost".into(),
                logger: None,
            }),
        }
    }

    /// Logs structured metadata, optionally tagged with a request id.
    pub fn log(
        &self,
        request_id: Option<&str>,
        level: LogLevel,
        message: &str,
        metadata: Value,
    ) -> Result<()> {
        if let Some(logger) = &self.inner.logger {
            let mut record =
                LogRecord::new(&self.inner.module, level, message).with_metadata(metadata);
            if let Some(id) = request_id {
                record = record.with_request_id(id);
            }
            logger.log(&record)?;
        }
        Ok(())
    }
}

use std::fmt;

use serde_json::Value;
use shared_logging::LogLevel;
use uuid::Uuid;

use crate::telemetry::ServiceTelemetry;

/// Caller credential forwarded verbatim to the data and registry services.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    /// Wraps the raw `Authorization` header value.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Value to send in the outgoing `Authorization` header.
    #[must_use]
    pub fn header_value(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

/// State owned by one inbound request for the duration of its pipeline.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: String,
    token: Option<BearerToken>,
    telemetry: ServiceTelemetry,
}

impl RequestContext {
    /// Creates a context with a fresh request id.
    #[must_use]
    pub fn new(token: Option<BearerToken>, telemetry: ServiceTelemetry) -> Self {
        Self {
            request_id: format!("req-{}", Uuid::new_v4()),
            token,
            telemetry,
        }
    }

    /// Request identifier stamped on every log record.
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Forwarded credential, if the caller sent one.
    #[must_use]
    pub const fn token(&self) -> Option<&BearerToken> {
        self.token.as_ref()
    }

    /// Writes a log record tagged with this request.
    pub fn log(&self, level: LogLevel, message: &str, metadata: Value) {
        let _ = self
            .telemetry
            .log(Some(&self.request_id), level, message, metadata);
    }
}

use reqwest::Url;

use crate::error::ServiceError;

/// Path of the model registry collection.
pub const MODELS_PATH: &str = "/models";
/// Path of the data-source collection.
pub const DATA_SOURCES_PATH: &str = "/dataSources";

/// Returns `scheme://host:port` of `source_url`, without path.
///
/// A URL without explicit port gets the scheme's default port (80 for `http`).
/// The registry and data-source services are expected on the same origin as
/// the data the request points at.
pub fn resolve_registry_host(source_url: &str) -> Result<String, ServiceError> {
    let url = Url::parse(source_url)
        .map_err(|err| ServiceError::InvalidRequest(format!("invalid url {source_url}: {err}")))?;
    let host = url
        .host_str()
        .ok_or_else(|| ServiceError::InvalidRequest(format!("url {source_url} has no host")))?;
    let port = url.port_or_known_default().unwrap_or(80);
    Ok(format!("{}://{host}:{port}", url.scheme()))
}

/// Where uploads go: a configured base URL, or the origin of the input data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryTarget {
    base_url: Option<String>,
}

impl RegistryTarget {
    /// Creates a target; `None` infers the registry from each request's data URL.
    #[must_use]
    pub fn new(base_url: Option<String>) -> Self {
        Self {
            base_url: base_url.map(|url| url.trim_end_matches('/').to_string()),
        }
    }

    /// Registry base for a request whose input lives at `source_url`.
    pub fn resolve(&self, source_url: &str) -> Result<String, ServiceError> {
        match &self.base_url {
            Some(base) => Ok(base.clone()),
            None => resolve_registry_host(source_url),
        }
    }
}

/// Joins a registry base and a collection path.
#[must_use]
pub fn endpoint(base: &str, path: &str) -> String {
    format!("{}{path}", base.trim_end_matches('/'))
}

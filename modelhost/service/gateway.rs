use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header::AUTHORIZATION, multipart, Client, RequestBuilder};

use crate::{context::BearerToken, error::ServiceError};

/// File part of a multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    /// Form field name.
    pub field: String,
    /// File name announced to the server.
    pub file_name: String,
    /// Media type of the content.
    pub media_type: String,
    /// Content.
    pub bytes: Vec<u8>,
}

/// Multipart form: text fields plus one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    /// Text fields in send order.
    pub fields: Vec<(String, String)>,
    /// Attached file.
    pub file: FilePart,
}

/// Status and body returned by a remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: Bytes,
}

/// Byte transport to the data-source and registry services.
#[async_trait]
pub trait DataGateway: Send + Sync {
    /// Reads `url`; non-success statuses are errors.
    async fn fetch(&self, url: &str, token: Option<&BearerToken>) -> Result<Bytes, ServiceError>;

    /// Posts a multipart form to `url` and returns whatever the server answered.
    async fn upload(
        &self,
        url: &str,
        upload: Upload,
        token: Option<&BearerToken>,
    ) -> Result<RawResponse, ServiceError>;
}

/// `reqwest`-backed gateway with per-call timeouts.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    fetch_timeout: Duration,
    publish_timeout: Duration,
}

impl HttpGateway {
    /// Creates a gateway.
    pub fn new(fetch_timeout: Duration, publish_timeout: Duration) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .user_agent(concat!("modelhost/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| ServiceError::Internal(format!("building http client: {err}")))?;
        Ok(Self {
            client,
            fetch_timeout,
            publish_timeout,
        })
    }
}

fn authorize(request: RequestBuilder, token: Option<&BearerToken>) -> RequestBuilder {
    match token {
        Some(token) => request.header(AUTHORIZATION, token.header_value()),
        None => request,
    }
}

fn unavailable(url: &str, err: reqwest::Error) -> ServiceError {
    let reason = if err.is_timeout() {
        "timed out".to_string()
    } else {
        err.without_url().to_string()
    };
    ServiceError::UpstreamUnavailable {
        url: url.to_string(),
        reason,
    }
}

#[async_trait]
impl DataGateway for HttpGateway {
    async fn fetch(&self, url: &str, token: Option<&BearerToken>) -> Result<Bytes, ServiceError> {
        let request = authorize(self.client.get(url), token).timeout(self.fetch_timeout);
        let response = request.send().await.map_err(|err| unavailable(url, err))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::UpstreamUnavailable {
                url: url.to_string(),
                reason: format!("status {status}"),
            });
        }
        response.bytes().await.map_err(|err| unavailable(url, err))
    }

    async fn upload(
        &self,
        url: &str,
        upload: Upload,
        token: Option<&BearerToken>,
    ) -> Result<RawResponse, ServiceError> {
        let Upload { fields, file } = upload;
        let part = multipart::Part::bytes(file.bytes)
            .file_name(file.file_name)
            .mime_str(&file.media_type)
            .map_err(|err| ServiceError::Internal(format!("media type: {err}")))?;
        let form = fields
            .into_iter()
            .fold(multipart::Form::new(), |form, (name, value)| form.text(name, value))
            .part(file.field, part);
        let request = authorize(self.client.post(url), token)
            .multipart(form)
            .timeout(self.publish_timeout);
        let response = request.send().await.map_err(|err| unavailable(url, err))?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|err| unavailable(url, err))?;
        Ok(RawResponse { status, body })
    }
}

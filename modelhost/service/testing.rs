use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use crate::{
    context::BearerToken,
    error::ServiceError,
    gateway::{DataGateway, RawResponse, Upload},
};

/// Upload captured by [`MemoryGateway`].
#[derive(Debug, Clone)]
pub struct RecordedUpload {
    pub url: String,
    pub upload: Upload,
    pub token: Option<String>,
}

/// In-memory stand-in for the data-source and registry services.
#[derive(Debug, Default)]
pub struct MemoryGateway {
    sources: HashMap<String, Bytes>,
    reply_status: u16,
    reply_body: Option<Bytes>,
    uploads: Mutex<Vec<RecordedUpload>>,
    fetched_tokens: Mutex<Vec<Option<String>>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self {
            reply_status: 200,
            ..Self::default()
        }
    }

    pub fn with_source(mut self, url: &str, body: impl Into<Bytes>) -> Self {
        self.sources.insert(url.to_string(), body.into());
        self
    }

    pub fn with_reply(mut self, status: u16, body: impl Into<Bytes>) -> Self {
        self.reply_status = status;
        self.reply_body = Some(body.into());
        self
    }

    pub fn uploads(&self) -> Vec<RecordedUpload> {
        self.uploads.lock().clone()
    }

    pub fn fetched_tokens(&self) -> Vec<Option<String>> {
        self.fetched_tokens.lock().clone()
    }
}

#[async_trait]
impl DataGateway for MemoryGateway {
    async fn fetch(&self, url: &str, token: Option<&BearerToken>) -> Result<Bytes, ServiceError> {
        self.fetched_tokens
            .lock()
            .push(token.map(|t| t.header_value().to_string()));
        self.sources
            .get(url)
            .cloned()
            .ok_or_else(|| ServiceError::UpstreamUnavailable {
                url: url.to_string(),
                reason: "status 404 Not Found".into(),
            })
    }

    async fn upload(
        &self,
        url: &str,
        upload: Upload,
        token: Option<&BearerToken>,
    ) -> Result<RawResponse, ServiceError> {
        let file_name = upload.file.file_name.clone();
        self.uploads.lock().push(RecordedUpload {
            url: url.to_string(),
            upload,
            token: token.map(|t| t.header_value().to_string()),
        });
        let body = self.reply_body.clone().unwrap_or_else(|| {
            Bytes::from(format!(r#"{{"id":"stored-1","fileName":"{file_name}"}}"#))
        });
        Ok(RawResponse {
            status: self.reply_status,
            body,
        })
    }
}

/// Iris fixture shipped with the learning crate.
pub fn iris_csv() -> &'static str {
    include_str!("../learning/dataset/iris.csv")
}

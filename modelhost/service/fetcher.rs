use modelhost_learning::Table;

use crate::{context::BearerToken, error::ServiceError, gateway::DataGateway};

/// Suffix addressing the raw payload of a data source.
pub const CONTENT_SUFFIX: &str = "/content";

/// Content URL of the data source at `url`.
#[must_use]
pub fn content_url(url: &str) -> String {
    format!("{}{CONTENT_SUFFIX}", url.trim_end_matches('/'))
}

/// Downloads `url` and parses it as a header-first CSV table.
pub async fn fetch_table(
    gateway: &dyn DataGateway,
    url: &str,
    token: Option<&BearerToken>,
) -> Result<Table, ServiceError> {
    let payload = gateway.fetch(url, token).await?;
    Table::from_csv(&payload).map_err(|source| ServiceError::MalformedTable {
        url: url.to_string(),
        source,
    })
}

//! Point lookups against the wide-column image tables.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode, header};
use tracing::debug;

use crate::error::{SourceError, SourceResult};
use crate::http::join_segments;

/// Abstraction over a wide-column store addressed by table, row key and
/// `family:qualifier` column.
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Fetch a single cell.
    ///
    /// Returns `Ok(None)` when the row or column does not exist.
    async fn get(&self, table: &str, row_key: &str, column: &str) -> SourceResult<Option<Bytes>>;

    /// Fetch a cell and decode it as UTF-8 text.
    async fn get_string(
        &self,
        table: &str,
        row_key: &str,
        column: &str,
    ) -> SourceResult<Option<String>> {
        match self.get(table, row_key, column).await? {
            Some(raw) => String::from_utf8(raw.to_vec())
                .map(Some)
                .map_err(|e| SourceError::Decode(format!("{table}/{row_key}/{column}: {e}"))),
            None => Ok(None),
        }
    }
}

/// Client for the HBase REST gateway.
///
/// Cells are read with `GET {base}/{table}/{row}/{column}` and an
/// `application/octet-stream` accept header so the gateway returns the raw
/// value rather than a base64 envelope.
pub struct HbaseRestClient {
    http: Client,
    base_url: String,
}

impl HbaseRestClient {
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl RowStore for HbaseRestClient {
    async fn get(&self, table: &str, row_key: &str, column: &str) -> SourceResult<Option<Bytes>> {
        let url = join_segments(&self.base_url, &[table, row_key, column])?;
        debug!(table, row_key, column, "HBase cell lookup");

        let resp = self
            .http
            .get(url.clone())
            .header(header::ACCEPT, "application/octet-stream")
            .send()
            .await?;

        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body = resp.bytes().await?;
                if body.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(body))
                }
            }
            status => Err(SourceError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            }),
        }
    }
}

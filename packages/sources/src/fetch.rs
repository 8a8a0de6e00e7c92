use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use tracing::debug;

use crate::error::{SourceError, SourceResult};

/// Retrieves raw image binaries by URL.
#[async_trait]
pub trait BinaryFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> SourceResult<Bytes>;
}

pub struct HttpFetcher {
    http: Client,
}

impl HttpFetcher {
    pub fn new(http: Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl BinaryFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> SourceResult<Bytes> {
        debug!(url, "Fetching image binary");
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(resp.bytes().await?)
    }
}

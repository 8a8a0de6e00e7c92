use std::time::Duration;

use common::config::HttpConfig;
use reqwest::{Client, Url};

use crate::error::{SourceError, SourceResult};

/// Build the client shared by every HTTP-backed source.
pub fn build_client(config: &HttpConfig) -> SourceResult<Client> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?)
}

/// Append path segments to a base URL, percent-encoding each one.
pub(crate) fn join_segments(base: &str, segments: &[&str]) -> SourceResult<Url> {
    let mut url =
        Url::parse(base).map_err(|e| SourceError::InvalidRequest(format!("bad URL {base}: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| SourceError::InvalidRequest(format!("URL cannot be a base: {base}")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

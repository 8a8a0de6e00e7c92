use std::sync::Arc;

use common::{ErrorPolicy, MemexConfig, QueryConfig};
use sources::{
    BinaryFetcher, ElasticsearchClient, HbaseRestClient, HttpFetcher, RowStore, SearchIndex,
    SnapshotStore, SqliteSnapshotStore, build_client,
};
use tracing::info;

use crate::error::{QueryError, QueryResult};

/// Handles to every backing store plus the query settings.
///
/// Cloning is cheap; the HTTP-backed sources share one connection pool.
#[derive(Clone)]
pub struct MemexContext {
    pub row_store: Arc<dyn RowStore>,
    pub search: Arc<dyn SearchIndex>,
    pub fetcher: Arc<dyn BinaryFetcher>,
    pub snapshot: Arc<dyn SnapshotStore>,
    pub config: QueryConfig,
}

impl MemexContext {
    pub fn new(
        row_store: Arc<dyn RowStore>,
        search: Arc<dyn SearchIndex>,
        fetcher: Arc<dyn BinaryFetcher>,
        snapshot: Arc<dyn SnapshotStore>,
        config: QueryConfig,
    ) -> Self {
        Self {
            row_store,
            search,
            fetcher,
            snapshot,
            config,
        }
    }

    /// Build production clients from configuration.
    pub async fn connect(config: &MemexConfig) -> QueryResult<Self> {
        let http =
            build_client(&config.http).map_err(|e| QueryError::from_source("http_client", e))?;
        let snapshot = SqliteSnapshotStore::connect(&config.snapshot.url)
            .await
            .map_err(|e| QueryError::from_source("snapshot_store", e))?;

        info!(
            hbase = %config.hbase.url,
            search = %config.search.url,
            index = %config.search.index,
            "MEMEX sources configured"
        );

        Ok(Self::new(
            Arc::new(HbaseRestClient::new(http.clone(), config.hbase.url.clone())),
            Arc::new(ElasticsearchClient::new(
                http.clone(),
                config.search.url.clone(),
            )),
            Arc::new(HttpFetcher::new(http)),
            Arc::new(snapshot),
            config.query_config(),
        ))
    }

    pub fn policy(&self) -> ErrorPolicy {
        self.config.resolver.on_source_error
    }
}

//! Adapters for the three CDR backing stores plus the image binary fetch.
//!
//! Every adapter is a trait with one production implementation. Lookups
//! report absence as `Ok(None)` or an empty result and reserve
//! [`SourceError`] for backends that could not answer.

pub mod error;
pub mod fetch;
pub mod http;
pub mod row_store;
pub mod search;
pub mod snapshot;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(test)]
mod test_server;

pub use error::{SourceError, SourceResult};
pub use fetch::{BinaryFetcher, HttpFetcher};
pub use http::build_client;
pub use row_store::{HbaseRestClient, RowStore};
pub use search::{BoolFilterQuery, ElasticsearchClient, SearchHit, SearchIndex, SearchRequest};
pub use snapshot::{SnapshotStore, SnapshotTable, SnapshotTableName, SqliteSnapshotStore};

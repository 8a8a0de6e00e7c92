use sources::SourceError;
use thiserror::Error;

use crate::outcome::SourceFailure;

#[derive(Debug, Error)]
pub enum QueryError {
    /// A source failed and the failure could not be fallen through.
    #[error("{source_name} failed: {error}")]
    Source {
        source_name: &'static str,
        #[source]
        error: SourceError,
    },

    /// Nothing was found but some sources failed, so absence is unconfirmed.
    #[error("{what} for {key} unresolved: {} source(s) failed", .failures.len())]
    Degraded {
        what: &'static str,
        key: String,
        failures: Vec<SourceFailure>,
    },

    #[error("Invalid date: {0}")]
    InvalidDate(String),
}

impl QueryError {
    pub fn from_source(source_name: &'static str, error: SourceError) -> Self {
        QueryError::Source { source_name, error }
    }
}

pub type QueryResult<T> = std::result::Result<T, QueryError>;

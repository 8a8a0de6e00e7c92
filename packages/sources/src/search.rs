//! Filtered boolean queries against the CDR search index.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::error::{SourceError, SourceResult};
use crate::http::join_segments;

/// One exact-match clause inside a boolean filter.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `field` equals `value`.
    Term { field: String, value: Value },
    /// `field` equals any of `values`.
    Terms { field: String, values: Vec<Value> },
}

impl Filter {
    fn to_json(&self) -> Value {
        match self {
            Filter::Term { field, value } => json!({ "term": { field.as_str(): value } }),
            Filter::Terms { field, values } => json!({ "terms": { field.as_str(): values } }),
        }
    }
}

/// A `bool` query made only of `filter` clauses, all of which must match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoolFilterQuery {
    filters: Vec<Filter>,
}

impl BoolFilterQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field` to equal `value` exactly.
    pub fn must_match(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Term {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    /// Require `field` to equal one of `values`.
    pub fn must_match_any<I, V>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.filters.push(Filter::Terms {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn to_json(&self) -> Value {
        let filters: Vec<Value> = self.filters.iter().map(Filter::to_json).collect();
        json!({ "bool": { "filter": filters } })
    }
}

/// A complete search request.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub index: String,
    pub query: BoolFilterQuery,
    /// Fields returned per hit under `fields`.
    pub fields: Vec<String>,
    /// Whether each hit carries its `_source` document.
    pub source: bool,
    /// Page size. Must be at least 1.
    pub size: usize,
}

impl SearchRequest {
    pub fn new(index: impl Into<String>, query: BoolFilterQuery) -> Self {
        Self {
            index: index.into(),
            query,
            fields: Vec::new(),
            source: true,
            size: 10,
        }
    }

    /// Request only the named fields and drop `_source`.
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self.source = false;
        self
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    /// Serialise to an Elasticsearch `_search` body.
    pub fn to_body(&self) -> SourceResult<Value> {
        if self.size == 0 {
            return Err(SourceError::InvalidRequest(
                "search page size must be at least 1".into(),
            ));
        }

        let mut body = json!({
            "query": self.query.to_json(),
            "size": self.size,
            "_source": self.source,
        });
        if !self.fields.is_empty() {
            body["fields"] = json!(self.fields);
        }
        Ok(body)
    }
}

/// One matching document.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SearchHit {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_source", default)]
    pub source: Option<Map<String, Value>>,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl SearchHit {
    /// A top-level value from `_source`.
    pub fn source_field(&self, name: &str) -> Option<&Value> {
        self.source.as_ref().and_then(|s| s.get(name))
    }

    /// Values returned for a requested field. The index always reports
    /// fields as arrays; a bare scalar is treated as a one-element array.
    pub fn field_values(&self, name: &str) -> Vec<&Value> {
        match self.fields.get(name) {
            Some(Value::Array(values)) => values.iter().collect(),
            Some(Value::Null) | None => Vec::new(),
            Some(other) => vec![other],
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: HitsEnvelope,
}

#[derive(Debug, Deserialize)]
struct HitsEnvelope {
    #[serde(default)]
    hits: Vec<SearchHit>,
}

/// Extract the ordered hit list from a raw `_search` response.
pub fn parse_response(body: &[u8]) -> SourceResult<Vec<SearchHit>> {
    let parsed: SearchResponse = serde_json::from_slice(body)?;
    Ok(parsed.hits.hits)
}

/// Abstraction over the search index.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Execute a query and return matching documents in index order.
    async fn search(&self, request: &SearchRequest) -> SourceResult<Vec<SearchHit>>;
}

/// Elasticsearch over its JSON REST API.
pub struct ElasticsearchClient {
    http: Client,
    base_url: String,
}

impl ElasticsearchClient {
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl SearchIndex for ElasticsearchClient {
    async fn search(&self, request: &SearchRequest) -> SourceResult<Vec<SearchHit>> {
        let body = request.to_body()?;
        let url = join_segments(&self.base_url, &[request.index.as_str(), "_search"])?;
        debug!(index = %request.index, size = request.size, "Elasticsearch query");

        let resp = self.http.post(url.clone()).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let bytes = resp.bytes().await?;
        parse_response(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_term_query_body() {
        let request = SearchRequest::new("cdr", BoolFilterQuery::new().must_match("_id", "IMG1"));
        let body = request.to_body().unwrap();

        assert_eq!(
            body,
            json!({
                "query": { "bool": { "filter": [ { "term": { "_id": "IMG1" } } ] } },
                "size": 10,
                "_source": true,
            })
        );
    }

    #[test]
    fn terms_query_with_fields_drops_source() {
        let request = SearchRequest::new(
            "cdr",
            BoolFilterQuery::new().must_match_any("_id", ["AD1", "AD2"]),
        )
        .with_fields(["timestamp"])
        .with_size(2);
        let body = request.to_body().unwrap();

        assert_eq!(body["query"]["bool"]["filter"][0]["terms"]["_id"], json!(["AD1", "AD2"]));
        assert_eq!(body["fields"], json!(["timestamp"]));
        assert_eq!(body["_source"], json!(false));
        assert_eq!(body["size"], json!(2));
    }

    #[test]
    fn zero_size_is_rejected() {
        let request = SearchRequest::new("cdr", BoolFilterQuery::new()).with_size(0);
        assert!(matches!(
            request.to_body(),
            Err(SourceError::InvalidRequest(_))
        ));
    }

    #[test]
    fn parses_hits_with_source_and_fields() {
        let raw = br#"{
            "took": 3,
            "hits": {
                "total": 2,
                "hits": [
                    { "_id": "IMG1", "_source": { "obj_stored_url": "https://s3/a.jpg" } },
                    { "_id": "AD1", "fields": { "timestamp": [1454976000] } }
                ]
            }
        }"#;
        let hits = parse_response(raw).unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(
            hits[0].source_field("obj_stored_url"),
            Some(&json!("https://s3/a.jpg"))
        );
        assert!(hits[0].field_values("timestamp").is_empty());
        assert_eq!(hits[1].field_values("timestamp"), vec![&json!(1454976000)]);
        assert!(hits[1].source_field("obj_stored_url").is_none());
    }

    #[test]
    fn parses_empty_hit_list() {
        let hits = parse_response(br#"{ "hits": { "hits": [] } }"#).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn malformed_response_is_decode_error() {
        assert!(matches!(
            parse_response(br#"{ "error": "index_not_found" }"#),
            Err(SourceError::Decode(_))
        ));
    }

    #[test]
    fn scalar_field_is_single_value() {
        let hit = SearchHit {
            id: "AD1".into(),
            source: None,
            fields: serde_json::from_value(json!({ "obj_parent": "AD9" })).unwrap(),
        };
        assert_eq!(hit.field_values("obj_parent"), vec![&json!("AD9")]);
    }

    #[tokio::test]
    async fn client_posts_body_and_parses_hits() {
        use crate::test_server::{StubServer, client};

        let server = StubServer::builder()
            .route(
                "/cdr/_search",
                200,
                r#"{ "hits": { "hits": [ { "_id": "AD1", "fields": { "timestamp": [7] } } ] } }"#,
            )
            .start()
            .await;
        let index = ElasticsearchClient::new(client(), server.base_url.clone());
        let request = SearchRequest::new(
            "cdr",
            BoolFilterQuery::new().must_match_any("_id", ["AD1"]),
        )
        .with_fields(["timestamp"])
        .with_size(1);

        let hits = index.search(&request).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].field_values("timestamp"), vec![&json!(7)]);

        let sent = &server.requests()[0];
        assert_eq!(sent.request_line(), "POST /cdr/_search HTTP/1.1");
        let body: Value = serde_json::from_slice(&sent.body).unwrap();
        assert_eq!(body, request.to_body().unwrap());
    }

    #[tokio::test]
    async fn client_maps_error_status_and_bad_json() {
        use crate::test_server::{StubServer, client};

        let server = StubServer::builder()
            .route("/down/_search", 503, "unavailable")
            .route("/garbled/_search", 200, "not json")
            .start()
            .await;
        let index = ElasticsearchClient::new(client(), server.base_url.clone());

        let err = index
            .search(&SearchRequest::new("down", BoolFilterQuery::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Status { status: 503, .. }));

        let err = index
            .search(&SearchRequest::new("garbled", BoolFilterQuery::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Decode(_)));
    }

    #[tokio::test]
    async fn client_rejects_zero_size_without_sending() {
        use crate::test_server::{StubServer, client};

        let server = StubServer::builder().start().await;
        let index = ElasticsearchClient::new(client(), server.base_url.clone());
        let request = SearchRequest::new("cdr", BoolFilterQuery::new()).with_size(0);

        assert!(matches!(
            index.search(&request).await,
            Err(SourceError::InvalidRequest(_))
        ));
        assert!(server.requests().is_empty());
    }
}

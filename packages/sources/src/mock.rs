//! In-memory sources for tests.
//!
//! Each mock records the calls it receives and can be switched into an
//! "unavailable" state to simulate a backend outage.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::NaiveDateTime;
use common::{CdrId, LocalId, PhonePosting};
use serde_json::{Map, Value};

use crate::error::{SourceError, SourceResult};
use crate::fetch::BinaryFetcher;
use crate::row_store::RowStore;
use crate::search::{Filter, SearchHit, SearchIndex, SearchRequest};
use crate::snapshot::{SnapshotStore, SnapshotTable, SnapshotTableName, validate_tables};

/// Row store holding cells in a map.
#[derive(Default)]
pub struct MockRowStore {
    cells: RwLock<HashMap<(String, String, String), Bytes>>,
    failing_tables: RwLock<HashSet<String>>,
    calls: Mutex<Vec<(String, String, String)>>,
}

impl MockRowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, table: &str, row_key: &str, column: &str, value: impl Into<Bytes>) {
        self.cells.write().unwrap().insert(
            (table.to_string(), row_key.to_string(), column.to_string()),
            value.into(),
        );
    }

    /// Make every lookup against `table` fail.
    pub fn fail_table(&self, table: &str) {
        self.failing_tables.write().unwrap().insert(table.to_string());
    }

    /// `(table, row_key, column)` of every lookup, in order.
    pub fn calls(&self) -> Vec<(String, String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, table: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.0 == table).count()
    }
}

#[async_trait]
impl RowStore for MockRowStore {
    async fn get(&self, table: &str, row_key: &str, column: &str) -> SourceResult<Option<Bytes>> {
        self.calls.lock().unwrap().push((
            table.to_string(),
            row_key.to_string(),
            column.to_string(),
        ));

        if self.failing_tables.read().unwrap().contains(table) {
            return Err(SourceError::Unavailable(format!("row store table {table}")));
        }

        let key = (table.to_string(), row_key.to_string(), column.to_string());
        Ok(self.cells.read().unwrap().get(&key).cloned())
    }
}

/// Search index over a list of `(id, source)` documents.
///
/// `_id` filters compare against the document id, other fields against the
/// top-level `_source` value. Requested fields are answered from `_source`.
#[derive(Default)]
pub struct MockSearchIndex {
    documents: RwLock<Vec<(String, Map<String, Value>)>>,
    unavailable: RwLock<bool>,
    requests: Mutex<Vec<SearchRequest>>,
}

impl MockSearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document. `source` must be a JSON object.
    pub fn insert(&self, id: &str, source: Value) {
        let source = match source {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        self.documents.write().unwrap().push((id.to_string(), source));
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.write().unwrap() = unavailable;
    }

    pub fn requests(&self) -> Vec<SearchRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn matches(id: &str, source: &Map<String, Value>, filter: &Filter) -> bool {
        let actual = |field: &str| -> Option<Value> {
            if field == "_id" {
                Some(Value::String(id.to_string()))
            } else {
                source.get(field).cloned()
            }
        };
        match filter {
            Filter::Term { field, value } => actual(field).as_ref() == Some(value),
            Filter::Terms { field, values } => {
                actual(field).is_some_and(|a| values.iter().any(|v| *v == a))
            }
        }
    }
}

#[async_trait]
impl SearchIndex for MockSearchIndex {
    async fn search(&self, request: &SearchRequest) -> SourceResult<Vec<SearchHit>> {
        self.requests.lock().unwrap().push(request.clone());

        if *self.unavailable.read().unwrap() {
            return Err(SourceError::Unavailable("search index".into()));
        }
        // Mirror the production client, which refuses a zero-size page.
        request.to_body()?;

        let documents = self.documents.read().unwrap();
        let hits = documents
            .iter()
            .filter(|(id, source)| {
                request
                    .query
                    .filters()
                    .iter()
                    .all(|f| Self::matches(id, source, f))
            })
            .take(request.size)
            .map(|(id, source)| {
                let fields = request
                    .fields
                    .iter()
                    .filter_map(|f| {
                        source.get(f).map(|v| match v {
                            Value::Array(_) => (f.clone(), v.clone()),
                            other => (f.clone(), Value::Array(vec![other.clone()])),
                        })
                    })
                    .collect();
                SearchHit {
                    id: id.clone(),
                    source: request.source.then(|| source.clone()),
                    fields,
                }
            })
            .collect();
        Ok(hits)
    }
}

/// Binary fetcher serving fixed payloads by URL. Unknown URLs answer 404.
#[derive(Default)]
pub struct MockFetcher {
    payloads: RwLock<HashMap<String, Bytes>>,
    calls: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, url: &str, payload: impl Into<Bytes>) {
        self.payloads
            .write()
            .unwrap()
            .insert(url.to_string(), payload.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl BinaryFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> SourceResult<Bytes> {
        self.calls.lock().unwrap().push(url.to_string());
        self.payloads
            .read()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| SourceError::Status {
                status: 404,
                url: url.to_string(),
            })
    }
}

/// Snapshot store over in-memory tables.
#[derive(Default)]
pub struct MockSnapshotStore {
    translations: RwLock<HashMap<CdrId, LocalId>>,
    phones: RwLock<BTreeMap<LocalId, Vec<String>>>,
    post_dates: RwLock<BTreeMap<LocalId, NaiveDateTime>>,
    unavailable: RwLock<bool>,
    loads: Mutex<Vec<(Vec<LocalId>, Vec<SnapshotTableName>)>>,
}

impl MockSnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an ad: its CDR id, local id, phone and post date.
    pub fn insert_ad(&self, cdr_id: &str, local_id: i64, phone: &str, post_date: NaiveDateTime) {
        let id = LocalId(local_id);
        self.translations
            .write()
            .unwrap()
            .insert(CdrId::new(cdr_id), id);
        self.phones
            .write()
            .unwrap()
            .entry(id)
            .or_default()
            .push(phone.to_string());
        self.post_dates.write().unwrap().insert(id, post_date);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.write().unwrap() = unavailable;
    }

    pub fn loads(&self) -> Vec<(Vec<LocalId>, Vec<SnapshotTableName>)> {
        self.loads.lock().unwrap().clone()
    }

    fn check_available(&self) -> SourceResult<()> {
        if *self.unavailable.read().unwrap() {
            Err(SourceError::Unavailable("snapshot store".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SnapshotStore for MockSnapshotStore {
    async fn translate(&self, cdr_ids: &[CdrId]) -> SourceResult<Vec<LocalId>> {
        self.check_available()?;
        let translations = self.translations.read().unwrap();
        let mut ids: Vec<LocalId> = cdr_ids
            .iter()
            .filter_map(|id| translations.get(id).copied())
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    async fn load(
        &self,
        ids: &[LocalId],
        tables: &[SnapshotTableName],
    ) -> SourceResult<SnapshotTable> {
        self.loads
            .lock()
            .unwrap()
            .push((ids.to_vec(), tables.to_vec()));
        self.check_available()?;
        let with_date = validate_tables(tables)?;

        let phones = self.phones.read().unwrap();
        let post_dates = self.post_dates.read().unwrap();
        let mut rows = Vec::new();
        for id in ids {
            let post_date = post_dates.get(id).copied();
            if with_date && post_date.is_none() {
                continue;
            }
            for phone in phones.get(id).into_iter().flatten() {
                rows.push(PhonePosting {
                    local_id: *id,
                    phone: phone.clone(),
                    post_date: if with_date { post_date } else { None },
                });
            }
        }
        Ok(SnapshotTable::from_rows(rows))
    }
}

//! Local relational snapshot tables keyed by `dd_id`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use common::model::parse_datetime;
use common::{CdrId, LocalId, PhonePosting};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbBackend, QueryResult, Statement};
use tracing::{debug, warn};

use crate::error::{SourceError, SourceResult};

/// SQLite caps bound parameters per statement; stay well below it.
const MAX_BIND_PARAMS: usize = 500;

/// Translation table from CDR ad ids to local ids.
pub const TRANSLATION_TABLE: &str = "dd_id_to_cdr_id";

/// Snapshot tables that can be joined into a [`SnapshotTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SnapshotTableName {
    /// `dd_id_to_phone(dd_id, phone)`
    Phone,
    /// `dd_id_to_post_date(dd_id, post_date)`
    PostDate,
}

impl SnapshotTableName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Phone => "dd_id_to_phone",
            Self::PostDate => "dd_id_to_post_date",
        }
    }
}

impl fmt::Display for SnapshotTableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SnapshotTableName {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dd_id_to_phone" => Ok(Self::Phone),
            "dd_id_to_post_date" => Ok(Self::PostDate),
            other => Err(SourceError::InvalidRequest(format!(
                "unknown snapshot table: {other}"
            ))),
        }
    }
}

/// In-memory join of the phone and post-date tables, indexed by local id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotTable {
    rows: BTreeMap<LocalId, Vec<PhonePosting>>,
    len: usize,
}

impl SnapshotTable {
    pub fn from_rows(rows: impl IntoIterator<Item = PhonePosting>) -> Self {
        let mut table = Self::default();
        for row in rows {
            table.rows.entry(row.local_id).or_default().push(row);
            table.len += 1;
        }
        table
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// All rows, ordered by local id.
    pub fn rows(&self) -> impl Iterator<Item = &PhonePosting> {
        self.rows.values().flatten()
    }

    /// Rows for one local id.
    pub fn get(&self, id: LocalId) -> &[PhonePosting] {
        self.rows.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Earliest post date across all rows that have one.
    pub fn min_post_date(&self) -> Option<NaiveDateTime> {
        self.rows().filter_map(|r| r.post_date).min()
    }

    /// Distinct phone numbers across all rows.
    pub fn phones(&self) -> BTreeSet<String> {
        self.phones_where(|_| true)
    }

    /// Distinct phone numbers of rows matching `pred`.
    pub fn phones_where<F>(&self, pred: F) -> BTreeSet<String>
    where
        F: Fn(&PhonePosting) -> bool,
    {
        self.rows()
            .filter(|r| pred(r))
            .map(|r| r.phone.clone())
            .collect()
    }
}

/// Abstraction over the local snapshot database.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Translate CDR ad ids to local ids. Ids without a mapping are omitted.
    async fn translate(&self, cdr_ids: &[CdrId]) -> SourceResult<Vec<LocalId>>;

    /// Load the rows for `ids` from `tables`, joined on local id.
    ///
    /// `tables` must include [`SnapshotTableName::Phone`].
    async fn load(
        &self,
        ids: &[LocalId],
        tables: &[SnapshotTableName],
    ) -> SourceResult<SnapshotTable>;
}

/// Checks a table selection before any SQL is built.
pub fn validate_tables(tables: &[SnapshotTableName]) -> SourceResult<bool> {
    if !tables.contains(&SnapshotTableName::Phone) {
        return Err(SourceError::InvalidRequest(format!(
            "snapshot load requires {}",
            SnapshotTableName::Phone
        )));
    }
    Ok(tables.contains(&SnapshotTableName::PostDate))
}

/// Snapshot store backed by a SQLite file.
pub struct SqliteSnapshotStore {
    db: DatabaseConnection,
}

impl SqliteSnapshotStore {
    pub async fn connect(url: &str) -> SourceResult<Self> {
        let db = Database::connect(url).await?;
        Ok(Self { db })
    }

    pub fn from_connection(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn query(&self, sql: String, values: Vec<sea_orm::Value>) -> SourceResult<Vec<QueryResult>> {
        let stmt = Statement::from_sql_and_values(DbBackend::Sqlite, sql, values);
        Ok(self.db.query_all_raw(stmt).await?)
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn posting_from_row(row: &QueryResult, with_date: bool) -> SourceResult<Option<PhonePosting>> {
    let dd_id: i64 = row.try_get("", "dd_id")?;
    let phone: Option<String> = row.try_get("", "phone")?;
    let Some(phone) = phone else {
        return Ok(None);
    };

    let post_date = if with_date {
        let raw: Option<String> = row.try_get("", "post_date")?;
        match raw.as_deref().map(|s| (s, parse_datetime(s))) {
            Some((_, Some(date))) => Some(date),
            Some((s, None)) => {
                warn!(dd_id, post_date = s, "Skipping row with unparseable post date");
                return Ok(None);
            }
            None => return Ok(None),
        }
    } else {
        None
    };

    Ok(Some(PhonePosting {
        local_id: LocalId(dd_id),
        phone,
        post_date,
    }))
}

#[async_trait]
impl SnapshotStore for SqliteSnapshotStore {
    async fn translate(&self, cdr_ids: &[CdrId]) -> SourceResult<Vec<LocalId>> {
        let mut found = BTreeSet::new();
        for chunk in cdr_ids.chunks(MAX_BIND_PARAMS) {
            let sql = format!(
                "SELECT dd_id FROM {TRANSLATION_TABLE} WHERE cdr_id IN ({})",
                placeholders(chunk.len())
            );
            let values = chunk.iter().map(|id| id.as_str().into()).collect();
            for row in self.query(sql, values).await? {
                let dd_id: i64 = row.try_get("", "dd_id")?;
                found.insert(LocalId(dd_id));
            }
        }
        debug!(requested = cdr_ids.len(), translated = found.len(), "Translated CDR ids");
        Ok(found.into_iter().collect())
    }

    async fn load(
        &self,
        ids: &[LocalId],
        tables: &[SnapshotTableName],
    ) -> SourceResult<SnapshotTable> {
        let with_date = validate_tables(tables)?;
        let mut rows = Vec::new();

        for chunk in ids.chunks(MAX_BIND_PARAMS) {
            let marks = placeholders(chunk.len());
            let sql = if with_date {
                format!(
                    "SELECT p.dd_id AS dd_id, p.phone AS phone, CAST(d.post_date AS TEXT) AS post_date \
                     FROM {} p JOIN {} d ON p.dd_id = d.dd_id WHERE p.dd_id IN ({marks})",
                    SnapshotTableName::Phone,
                    SnapshotTableName::PostDate,
                )
            } else {
                format!(
                    "SELECT dd_id, phone FROM {} WHERE dd_id IN ({marks})",
                    SnapshotTableName::Phone,
                )
            };
            let values = chunk.iter().map(|id| id.0.into()).collect();

            for row in self.query(sql, values).await? {
                if let Some(posting) = posting_from_row(&row, with_date)? {
                    rows.push(posting);
                }
            }
        }

        debug!(ids = ids.len(), rows = rows.len(), with_date, "Loaded snapshot rows");
        Ok(SnapshotTable::from_rows(rows))
    }
}

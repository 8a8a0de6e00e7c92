use std::sync::Arc;

use common::QueryConfig;
use queries::MemexContext;
use sea_orm::{ConnectionTrait, Database, DbBackend, Statement};
use sources::SqliteSnapshotStore;
use sources::mock::{MockFetcher, MockRowStore, MockSearchIndex};
use tempfile::TempDir;

pub struct Harness {
    pub rows: Arc<MockRowStore>,
    pub search: Arc<MockSearchIndex>,
    pub fetcher: Arc<MockFetcher>,
    pub ctx: MemexContext,
    _dir: TempDir,
}

/// A context whose snapshot store is a real SQLite file seeded with `inserts`.
pub async fn harness(inserts: &[&str]) -> Harness {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("memex.db").display());
    let db = Database::connect(&url)
        .await
        .expect("Failed to open SQLite snapshot");

    let schema = [
        "CREATE TABLE dd_id_to_phone (dd_id INTEGER NOT NULL, phone TEXT)",
        "CREATE TABLE dd_id_to_post_date (dd_id INTEGER NOT NULL, post_date TEXT)",
        "CREATE TABLE dd_id_to_cdr_id (dd_id INTEGER NOT NULL, cdr_id TEXT NOT NULL)",
    ];
    for sql in schema.iter().chain(inserts) {
        db.execute_raw(Statement::from_string(DbBackend::Sqlite, *sql))
            .await
            .expect("Failed to seed snapshot");
    }

    let rows = Arc::new(MockRowStore::new());
    let search = Arc::new(MockSearchIndex::new());
    let fetcher = Arc::new(MockFetcher::new());
    let ctx = MemexContext::new(
        rows.clone(),
        search.clone(),
        fetcher.clone(),
        Arc::new(SqliteSnapshotStore::from_connection(db)),
        QueryConfig::default(),
    );

    Harness {
        rows,
        search,
        fetcher,
        ctx,
        _dir: dir,
    }
}

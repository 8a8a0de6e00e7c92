use std::sync::Arc;

use common::{ErrorPolicy, QueryConfig};
use sources::mock::{MockFetcher, MockRowStore, MockSearchIndex, MockSnapshotStore};

use crate::context::MemexContext;

/// Mock sources wired into a context with default table names.
pub(crate) struct Fixture {
    pub rows: Arc<MockRowStore>,
    pub search: Arc<MockSearchIndex>,
    pub fetcher: Arc<MockFetcher>,
    pub snapshot: Arc<MockSnapshotStore>,
    pub config: QueryConfig,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_policy(ErrorPolicy::FallThrough)
    }

    pub fn with_policy(policy: ErrorPolicy) -> Self {
        let mut config = QueryConfig::default();
        config.resolver.on_source_error = policy;
        Self {
            rows: Arc::new(MockRowStore::new()),
            search: Arc::new(MockSearchIndex::new()),
            fetcher: Arc::new(MockFetcher::new()),
            snapshot: Arc::new(MockSnapshotStore::new()),
            config,
        }
    }

    pub fn ctx(&self) -> MemexContext {
        MemexContext::new(
            self.rows.clone(),
            self.search.clone(),
            self.fetcher.clone(),
            self.snapshot.clone(),
            self.config.clone(),
        )
    }

    /// Record `image_id` as appearing in `ad_ids` via the search index.
    pub fn link_image(&self, image_id: &str, ad_ids: &[&str]) {
        self.search
            .insert(image_id, serde_json::json!({ "obj_parent": ad_ids }));
    }

    /// Make every row-store table and the search index fail.
    pub fn take_down_lookups(&self) {
        let tables = &self.config.tables;
        for table in [&tables.images, &tables.sha1, &tables.image_ht_id, &tables.image_infos] {
            self.rows.fail_table(table);
        }
        self.search.set_unavailable(true);
    }
}

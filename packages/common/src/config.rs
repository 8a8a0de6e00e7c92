use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// HBase REST gateway settings.
#[derive(Debug, Deserialize, Clone)]
pub struct HbaseConfig {
    /// Base URL of the REST gateway. Default: "http://localhost:8080".
    #[serde(default = "default_hbase_url")]
    pub url: String,
}

fn default_hbase_url() -> String {
    "http://localhost:8080".into()
}

impl Default for HbaseConfig {
    fn default() -> Self {
        Self {
            url: default_hbase_url(),
        }
    }
}

/// Elasticsearch settings.
#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    /// Default: "http://localhost:9200".
    #[serde(default = "default_search_url")]
    pub url: String,
    /// Index holding CDR documents. Default: "memex-domains".
    #[serde(default = "default_search_index")]
    pub index: String,
}

fn default_search_url() -> String {
    "http://localhost:9200".into()
}
fn default_search_index() -> String {
    "memex-domains".into()
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            url: default_search_url(),
            index: default_search_index(),
        }
    }
}

/// Local snapshot database settings.
#[derive(Debug, Deserialize, Clone)]
pub struct SnapshotConfig {
    /// sea-orm connection URL. Default: "sqlite://memex.db?mode=ro".
    #[serde(default = "default_snapshot_url")]
    pub url: String,
}

fn default_snapshot_url() -> String {
    "sqlite://memex.db?mode=ro".into()
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            url: default_snapshot_url(),
        }
    }
}

/// Shared HTTP client settings.
#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    /// Per-request timeout in seconds. Default: 30.
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_http_timeout_secs() -> u64 {
    30
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_http_timeout_secs(),
        }
    }
}

/// What a resolver does when a source fails (as opposed to reporting a miss).
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Record and log the failure, then try the next source.
    #[default]
    FallThrough,
    /// Stop resolving and return the failure to the caller.
    Propagate,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ResolverConfig {
    #[serde(default)]
    pub on_source_error: ErrorPolicy,
}

/// Row-store tables and columns consulted by the image lookups.
#[derive(Debug, Deserialize, Clone)]
pub struct TablesConfig {
    /// Image documents keyed by CDR image id. Default: "dig_isi_cdr2_ht_images".
    #[serde(default = "default_images_table")]
    pub images: String,
    /// Default: "images:images".
    #[serde(default = "default_images_column")]
    pub images_column: String,
    /// Precomputed SHA-1 keyed by CDR image id. Default: "ht_images_cdrid_to_sha1_2016".
    #[serde(default = "default_sha1_table")]
    pub sha1: String,
    /// Default: "hash:sha1".
    #[serde(default = "default_sha1_column")]
    pub sha1_column: String,
    /// Secondary timestamp table keyed by CDR image id. Default: "ht_images_cdrid_to_image_ht_id".
    #[serde(default = "default_image_ht_id_table")]
    pub image_ht_id: String,
    /// Default: "info:timestamp".
    #[serde(default = "default_timestamp_column")]
    pub timestamp_column: String,
    /// Parent ads keyed by image hash. Default: "ht_images_infos_2016".
    #[serde(default = "default_image_infos_table")]
    pub image_infos: String,
    /// Default: "info:all_parent_ids".
    #[serde(default = "default_parent_ids_column")]
    pub parent_ids_column: String,
}

fn default_images_table() -> String {
    "dig_isi_cdr2_ht_images".into()
}
fn default_images_column() -> String {
    "images:images".into()
}
fn default_sha1_table() -> String {
    "ht_images_cdrid_to_sha1_2016".into()
}
fn default_sha1_column() -> String {
    "hash:sha1".into()
}
fn default_image_ht_id_table() -> String {
    "ht_images_cdrid_to_image_ht_id".into()
}
fn default_timestamp_column() -> String {
    "info:timestamp".into()
}
fn default_image_infos_table() -> String {
    "ht_images_infos_2016".into()
}
fn default_parent_ids_column() -> String {
    "info:all_parent_ids".into()
}

impl Default for TablesConfig {
    fn default() -> Self {
        Self {
            images: default_images_table(),
            images_column: default_images_column(),
            sha1: default_sha1_table(),
            sha1_column: default_sha1_column(),
            image_ht_id: default_image_ht_id_table(),
            timestamp_column: default_timestamp_column(),
            image_infos: default_image_infos_table(),
            parent_ids_column: default_parent_ids_column(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// One of trace, debug, info, warn, error. Default: "info".
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Everything a query context needs besides the live clients.
#[derive(Debug, Clone)]
pub struct QueryConfig {
    /// Search index holding CDR documents.
    pub search_index: String,
    pub resolver: ResolverConfig,
    pub tables: TablesConfig,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            search_index: default_search_index(),
            resolver: ResolverConfig::default(),
            tables: TablesConfig::default(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct MemexConfig {
    #[serde(default)]
    pub hbase: HbaseConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub tables: TablesConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl MemexConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("MEMEX_CONFIG").unwrap_or_else(|_| "config/memex".to_string());

        let s = Config::builder()
            .set_default("hbase.url", default_hbase_url())?
            .set_default("search.url", default_search_url())?
            .set_default("search.index", default_search_index())?
            .set_default("snapshot.url", default_snapshot_url())?
            .set_default("http.timeout_secs", 30_i64)?
            .set_default("resolver.on_source_error", "fall_through")?
            .set_default("logging.level", "info")?
            // Load from config/memex.toml (or $MEMEX_CONFIG)
            .add_source(File::with_name(&config_path).required(false))
            // Override from environment (e.g., MEMEX__SEARCH__URL)
            .add_source(Environment::with_prefix("MEMEX").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    /// The subset of settings the query layer reads.
    pub fn query_config(&self) -> QueryConfig {
        QueryConfig {
            search_index: self.search.index.clone(),
            resolver: self.resolver.clone(),
            tables: self.tables.clone(),
        }
    }
}

//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use time::Duration;

/// Top-level configuration loaded by `stowagectl`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Object store holding bundle archives and manifest trees.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Relational catalog describing what should exist in the store.
    #[serde(default)]
    pub catalog: CatalogConfig,
    /// Audit and remediation tuning.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl AppConfig {
    /// Validate every configuration block.
    pub fn validate(&self) -> Result<(), String> {
        self.storage.validate()?;
        self.catalog.validate()?;
        self.audit.validate()?;
        Ok(())
    }

    /// Configuration backed by local paths, for tests.
    ///
    /// **For testing only.**
    pub fn for_testing(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            storage: StorageConfig::Filesystem {
                path: root.join("store"),
            },
            catalog: CatalogConfig::Sqlite {
                path: root.join("catalog.db"),
                query_timeout_secs: default_sqlite_query_timeout_secs(),
            },
            audit: AuditConfig {
                artifacts_dir: root.join("audit"),
                ..AuditConfig::default()
            },
        }
    }
}

/// Storage backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem storage (development and tests).
    Filesystem {
        /// Root directory for storage.
        path: PathBuf,
    },
    /// S3-compatible storage.
    S3 {
        /// Bucket name.
        bucket: String,
        /// Optional endpoint URL (for MinIO, R2, etc.).
        endpoint: Option<String>,
        /// Region.
        region: Option<String>,
        /// Optional key prefix applied to every key.
        prefix: Option<String>,
        /// Access key ID. Falls back to the ambient AWS credential chain if not set.
        /// WARNING: Prefer env vars or IAM roles over storing secrets in config files.
        access_key_id: Option<String>,
        /// Secret access key. Falls back to the ambient AWS credential chain if not set.
        secret_access_key: Option<String>,
        /// Force path-style URLs (`endpoint/bucket/key`).
        /// Required for MinIO and some S3-compatible services.
        #[serde(default)]
        force_path_style: bool,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./data/storage"),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StorageConfig::S3 {
                bucket,
                access_key_id,
                secret_access_key,
                ..
            } => {
                if bucket.trim().is_empty() {
                    return Err("storage.bucket cannot be empty".to_string());
                }
                match (access_key_id.as_ref(), secret_access_key.as_ref()) {
                    (Some(_), Some(_)) | (None, None) => Ok(()),
                    _ => Err(
                        "s3 config requires both access_key_id and secret_access_key when either is set"
                            .to_string(),
                    ),
                }
            }
            StorageConfig::Filesystem { .. } => Ok(()),
        }
    }
}

/// PostgreSQL SSL mode configuration.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PgSslMode {
    /// Disable SSL/TLS entirely.
    Disable,
    /// Prefer SSL/TLS but allow unencrypted connections (default).
    #[default]
    Prefer,
    /// Require SSL/TLS for all connections.
    Require,
}

/// Catalog database configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CatalogConfig {
    /// SQLite database (tests and local replicas only).
    Sqlite {
        /// Database file path.
        path: PathBuf,
        /// Query timeout in seconds (advisory only, SQLite cannot cancel statements).
        #[serde(default = "default_sqlite_query_timeout_secs")]
        query_timeout_secs: Option<u64>,
    },
    /// PostgreSQL database.
    Postgres {
        /// Connection URL. Takes precedence over individual fields.
        url: Option<String>,
        /// Database host.
        host: Option<String>,
        /// Database port (default: 5432).
        #[serde(default = "default_pg_port")]
        port: Option<u16>,
        /// Database username.
        username: Option<String>,
        /// Database password.
        /// WARNING: Prefer STOWAGE_CATALOG__PASSWORD over storing it in config.
        password: Option<String>,
        /// Database name.
        database: Option<String>,
        /// SSL mode for connections.
        ssl_mode: Option<PgSslMode>,
        /// Maximum connections in the pool.
        #[serde(default = "default_max_connections")]
        max_connections: u32,
        /// Statement timeout in milliseconds.
        #[serde(default = "default_statement_timeout_ms")]
        statement_timeout_ms: Option<u64>,
    },
}

fn default_max_connections() -> u32 {
    5
}

fn default_pg_port() -> Option<u16> {
    Some(5432)
}

fn default_statement_timeout_ms() -> Option<u64> {
    Some(300_000) // 5 minutes
}

fn default_sqlite_query_timeout_secs() -> Option<u64> {
    Some(600)
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/catalog.db"),
            query_timeout_secs: default_sqlite_query_timeout_secs(),
        }
    }
}

impl CatalogConfig {
    /// Validate catalog configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            CatalogConfig::Sqlite { .. } => Ok(()),
            CatalogConfig::Postgres {
                url,
                host,
                database,
                max_connections,
                ..
            } => {
                if *max_connections == 0 {
                    return Err("catalog.max_connections must be at least 1".to_string());
                }
                match (url.as_ref(), host.as_ref(), database.as_ref()) {
                    (Some(_), _, _) | (None, Some(_), Some(_)) => Ok(()),
                    (None, None, _) => Err(
                        "postgres config requires either 'url' or 'host' + 'database'".to_string(),
                    ),
                    (None, Some(_), None) => Err(
                        "postgres config requires 'database' when using individual fields"
                            .to_string(),
                    ),
                }
            }
        }
    }
}

/// How the existence verifier answers "does this key exist".
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IndexStrategy {
    /// Pick per run from the scope and the catalog size.
    #[default]
    Auto,
    /// One existence check per catalog entry.
    Point,
    /// Enumerate the scoped store once and answer from memory.
    Index,
}

/// Which organizations an audit covers.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BillingScope {
    /// Only paying and trial organizations.
    #[default]
    Active,
    /// Every organization in the catalog.
    All,
}

/// Audit engine configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Directory receiving checkpoints and JSON artifacts, one subdirectory per run mode.
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: PathBuf,
    /// Catalog rows read per page. The checkpoint is written once per page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Maximum existence checks in flight.
    #[serde(default = "default_verify_concurrency")]
    pub verify_concurrency: usize,
    /// Maximum per-prefix listings in flight.
    #[serde(default = "default_listing_concurrency")]
    pub listing_concurrency: usize,
    /// Items per remediation batch.
    #[serde(default = "default_remediation_batch_size")]
    pub remediation_batch_size: usize,
    /// Existence verification strategy.
    #[serde(default)]
    pub index_strategy: IndexStrategy,
    /// Minimum catalog items before `auto` prefers a pre-built index.
    #[serde(default = "default_index_threshold")]
    pub index_threshold: u64,
    /// Organization scope for audits.
    #[serde(default)]
    pub billing_scope: BillingScope,
    /// App identifiers never touched by remediation (demo and sandbox apps).
    #[serde(default = "default_protected_apps")]
    pub protected_apps: Vec<String>,
    /// Number of sample records included in dry-run reports.
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,
    /// Lifetime of the run lease in seconds; renewed on every page.
    #[serde(default = "default_lease_ttl_secs")]
    pub lease_ttl_secs: u64,
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("./audit")
}

fn default_page_size() -> u32 {
    1000
}

fn default_verify_concurrency() -> usize {
    50
}

fn default_listing_concurrency() -> usize {
    16
}

fn default_remediation_batch_size() -> usize {
    100
}

fn default_index_threshold() -> u64 {
    5000
}

fn default_protected_apps() -> Vec<String> {
    vec!["com.demo.app".to_string()]
}

fn default_sample_size() -> usize {
    20
}

fn default_lease_ttl_secs() -> u64 {
    3600 // 1 hour
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            artifacts_dir: default_artifacts_dir(),
            page_size: default_page_size(),
            verify_concurrency: default_verify_concurrency(),
            listing_concurrency: default_listing_concurrency(),
            remediation_batch_size: default_remediation_batch_size(),
            index_strategy: IndexStrategy::default(),
            index_threshold: default_index_threshold(),
            billing_scope: BillingScope::default(),
            protected_apps: default_protected_apps(),
            sample_size: default_sample_size(),
            lease_ttl_secs: default_lease_ttl_secs(),
        }
    }
}

impl AuditConfig {
    /// Get the lease lifetime as a Duration.
    pub fn lease_ttl(&self) -> Duration {
        // Saturate at i64::MAX to prevent overflow wrapping to negative
        let secs = i64::try_from(self.lease_ttl_secs).unwrap_or(i64::MAX);
        Duration::seconds(secs)
    }

    /// Whether an app identifier is exempt from remediation.
    pub fn is_protected(&self, app_id: &str) -> bool {
        self.protected_apps.iter().any(|p| p == app_id)
    }

    /// Validate audit configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.page_size == 0 {
            return Err("audit.page_size must be at least 1".to_string());
        }
        if self.verify_concurrency == 0 {
            return Err("audit.verify_concurrency must be at least 1".to_string());
        }
        if self.listing_concurrency == 0 {
            return Err("audit.listing_concurrency must be at least 1".to_string());
        }
        if self.remediation_batch_size == 0 {
            return Err("audit.remediation_batch_size must be at least 1".to_string());
        }
        if self.lease_ttl_secs == 0 {
            return Err("audit.lease_ttl_secs must be at least 1".to_string());
        }
        Ok(())
    }
}

//! Catalog store trait and the SQLite implementation.

use crate::error::{CatalogError, CatalogResult};
use crate::repos::{
    AppRepo, ChannelRepo, DeployHistoryRepo, LeaseRepo, ManifestRepo, OrgRepo, RemediationRepo,
    VersionRepo,
};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use stowage_core::BillingScope;

/// Combined catalog store trait.
#[async_trait]
pub trait CatalogStore:
    OrgRepo
    + AppRepo
    + VersionRepo
    + ManifestRepo
    + ChannelRepo
    + DeployHistoryRepo
    + RemediationRepo
    + LeaseRepo
    + Send
    + Sync
{
    /// Run database migrations.
    async fn migrate(&self) -> CatalogResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> CatalogResult<()>;
}

/// SQLite parameter limit is ~999; stay under it.
pub(crate) const SQLITE_BATCH_SIZE: usize = 900;

/// Extra `WHERE` clause restricting `column` to organizations in scope.
pub(crate) fn scope_clause(scope: BillingScope, column: &str) -> String {
    match scope {
        BillingScope::All => String::new(),
        BillingScope::Active => format!(
            " AND {column} IN (SELECT id FROM orgs WHERE billing_state IN ('paying', 'trial'))"
        ),
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// SQLite-based catalog store.
///
/// Suited to tests and local replicas; production catalogs use PostgreSQL.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Create a new SQLite store.
    pub async fn new(
        path: impl AsRef<Path>,
        query_timeout_secs: Option<u64>,
    ) -> CatalogResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // One connection keeps remediation writes strictly sequential
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        if let Some(secs) = query_timeout_secs {
            tracing::debug!(
                query_timeout_secs = secs,
                "SQLite query timeout is advisory only; SQLite cannot cancel statements"
            );
        }

        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl CatalogStore for SqliteStore {
    async fn migrate(&self) -> CatalogResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> CatalogResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

mod sqlite_impl {
    use super::*;
    use crate::models::*;
    use crate::repos::VersionFilter;
    use std::collections::{HashMap, HashSet};
    use time::OffsetDateTime;

    const VERSION_COLUMNS: &str =
        "v.id, v.app_id, v.owner_org, v.name, v.deleted, v.storage_path, v.manifest_count";

    const CHANNEL_SELECT: &str = "SELECT c.id, c.app_id, c.owner_org, c.name, c.version_id, \
         COALESCE(a.default_channel = c.name, 0) AS is_default \
         FROM channels c LEFT JOIN apps a ON a.app_id = c.app_id";

    #[async_trait]
    impl OrgRepo for SqliteStore {
        async fn create_org(&self, org: &OrgRow) -> CatalogResult<()> {
            let result =
                sqlx::query("INSERT OR IGNORE INTO orgs (id, name, billing_state) VALUES (?, ?, ?)")
                    .bind(&org.id)
                    .bind(&org.name)
                    .bind(&org.billing_state)
                    .execute(&self.pool)
                    .await?;
            if result.rows_affected() == 0 {
                return Err(CatalogError::AlreadyExists(format!("org {}", org.id)));
            }
            Ok(())
        }

        async fn list_org_ids(&self, scope: BillingScope) -> CatalogResult<Vec<String>> {
            let query = match scope {
                BillingScope::All => "SELECT id FROM orgs ORDER BY id",
                BillingScope::Active => {
                    "SELECT id FROM orgs WHERE billing_state IN ('paying', 'trial') ORDER BY id"
                }
            };
            let rows: Vec<(String,)> = sqlx::query_as(query).fetch_all(&self.pool).await?;
            Ok(rows.into_iter().map(|r| r.0).collect())
        }
    }

    #[async_trait]
    impl AppRepo for SqliteStore {
        async fn create_app(&self, app: &AppRow) -> CatalogResult<()> {
            sqlx::query(
                "INSERT INTO apps (app_id, owner_org, default_channel, manifest_bundle_count) VALUES (?, ?, ?, ?)",
            )
            .bind(&app.app_id)
            .bind(&app.owner_org)
            .bind(&app.default_channel)
            .bind(app.manifest_bundle_count)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn get_app(&self, app_id: &str) -> CatalogResult<Option<AppRow>> {
            let row = sqlx::query_as::<_, AppRow>(
                "SELECT app_id, owner_org, default_channel, manifest_bundle_count FROM apps WHERE app_id = ?",
            )
            .bind(app_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }
    }

    #[async_trait]
    impl VersionRepo for SqliteStore {
        async fn create_version(&self, version: &VersionRow) -> CatalogResult<()> {
            sqlx::query(
                r#"
                INSERT INTO app_versions (id, app_id, owner_org, name, deleted, storage_path, manifest_count)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(version.id)
            .bind(&version.app_id)
            .bind(&version.owner_org)
            .bind(&version.name)
            .bind(version.deleted)
            .bind(&version.storage_path)
            .bind(version.manifest_count)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn get_version(&self, id: i64) -> CatalogResult<Option<VersionRow>> {
            let row = sqlx::query_as::<_, VersionRow>(&format!(
                "SELECT {VERSION_COLUMNS} FROM app_versions v WHERE v.id = ?"
            ))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn get_versions_by_ids(&self, ids: &[i64]) -> CatalogResult<Vec<VersionRow>> {
            let mut result = Vec::with_capacity(ids.len());
            for batch in ids.chunks(SQLITE_BATCH_SIZE) {
                let query = format!(
                    "SELECT {VERSION_COLUMNS} FROM app_versions v WHERE v.id IN ({}) ORDER BY v.id",
                    placeholders(batch.len())
                );
                let mut query_builder = sqlx::query_as::<_, VersionRow>(&query);
                for id in batch {
                    query_builder = query_builder.bind(id);
                }
                result.extend(query_builder.fetch_all(&self.pool).await?);
            }
            Ok(result)
        }

        async fn list_versions_page(
            &self,
            after_id: i64,
            limit: u32,
            filter: &VersionFilter,
        ) -> CatalogResult<Vec<VersionRow>> {
            let query = format!(
                "SELECT {VERSION_COLUMNS} FROM app_versions v WHERE v.id > ? AND v.deleted = 0{} ORDER BY v.id LIMIT ?",
                scope_clause(filter.scope, "v.owner_org")
            );
            let rows = sqlx::query_as::<_, VersionRow>(&query)
                .bind(after_id)
                .bind(i64::from(limit))
                .fetch_all(&self.pool)
                .await?;
            Ok(rows)
        }

        async fn count_versions(&self, filter: &VersionFilter) -> CatalogResult<u64> {
            let query = format!(
                "SELECT COUNT(*) FROM app_versions v WHERE v.deleted = 0{}",
                scope_clause(filter.scope, "v.owner_org")
            );
            let count: i64 = sqlx::query_scalar(&query).fetch_one(&self.pool).await?;
            Ok(count.max(0) as u64)
        }

        async fn list_active_versions_for_org(
            &self,
            org_id: &str,
        ) -> CatalogResult<Vec<VersionRow>> {
            let rows = sqlx::query_as::<_, VersionRow>(&format!(
                r#"
                SELECT {VERSION_COLUMNS} FROM app_versions v
                WHERE v.owner_org = ? AND v.deleted = 0
                  AND (v.storage_path IS NOT NULL OR v.manifest_count > 0
                       OR EXISTS (SELECT 1 FROM manifest_entries m WHERE m.app_version_id = v.id))
                ORDER BY v.id
                "#
            ))
            .bind(org_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn referenced_version_ids(&self, ids: &[i64]) -> CatalogResult<HashSet<i64>> {
            let mut result = HashSet::new();
            for batch in ids.chunks(SQLITE_BATCH_SIZE / 2) {
                let marks = placeholders(batch.len());
                let query = format!(
                    "SELECT version_id FROM channels WHERE version_id IN ({marks}) \
                     UNION SELECT version_id FROM deploy_history WHERE version_id IN ({marks})"
                );
                let mut query_builder = sqlx::query_as::<_, (i64,)>(&query);
                for id in batch.iter().chain(batch.iter()) {
                    query_builder = query_builder.bind(id);
                }
                result.extend(
                    query_builder
                        .fetch_all(&self.pool)
                        .await?
                        .into_iter()
                        .map(|r| r.0),
                );
            }
            Ok(result)
        }
    }

    #[async_trait]
    impl ManifestRepo for SqliteStore {
        async fn create_manifest_entry(&self, entry: &ManifestEntryRow) -> CatalogResult<()> {
            sqlx::query("INSERT INTO manifest_entries (id, app_version_id, s3_path) VALUES (?, ?, ?)")
                .bind(entry.id)
                .bind(entry.app_version_id)
                .bind(&entry.s3_path)
                .execute(&self.pool)
                .await?;
            Ok(())
        }

        async fn list_manifest_entries_page(
            &self,
            after_id: i64,
            limit: u32,
            filter: &VersionFilter,
        ) -> CatalogResult<Vec<ManifestEntryRow>> {
            let query = format!(
                r#"
                SELECT m.id, m.app_version_id, m.s3_path FROM manifest_entries m
                JOIN app_versions v ON v.id = m.app_version_id
                WHERE m.id > ? AND v.deleted = 0{}
                ORDER BY m.id LIMIT ?
                "#,
                scope_clause(filter.scope, "v.owner_org")
            );
            let rows = sqlx::query_as::<_, ManifestEntryRow>(&query)
                .bind(after_id)
                .bind(i64::from(limit))
                .fetch_all(&self.pool)
                .await?;
            Ok(rows)
        }

        async fn count_manifest_entries(&self, filter: &VersionFilter) -> CatalogResult<u64> {
            let query = format!(
                "SELECT COUNT(*) FROM manifest_entries m JOIN app_versions v ON v.id = m.app_version_id WHERE v.deleted = 0{}",
                scope_clause(filter.scope, "v.owner_org")
            );
            let count: i64 = sqlx::query_scalar(&query).fetch_one(&self.pool).await?;
            Ok(count.max(0) as u64)
        }

        async fn manifest_entry_counts(
            &self,
            version_ids: &[i64],
        ) -> CatalogResult<HashMap<i64, u64>> {
            let mut result = HashMap::new();
            for batch in version_ids.chunks(SQLITE_BATCH_SIZE) {
                let query = format!(
                    "SELECT app_version_id, COUNT(*) FROM manifest_entries WHERE app_version_id IN ({}) GROUP BY app_version_id",
                    placeholders(batch.len())
                );
                let mut query_builder = sqlx::query_as::<_, (i64, i64)>(&query);
                for id in batch {
                    query_builder = query_builder.bind(id);
                }
                for (id, count) in query_builder.fetch_all(&self.pool).await? {
                    result.insert(id, count.max(0) as u64);
                }
            }
            Ok(result)
        }

        async fn manifest_paths(
            &self,
            version_ids: &[i64],
        ) -> CatalogResult<HashMap<i64, Vec<String>>> {
            let mut result: HashMap<i64, Vec<String>> = HashMap::new();
            for batch in version_ids.chunks(SQLITE_BATCH_SIZE) {
                let query = format!(
                    "SELECT DISTINCT app_version_id, s3_path FROM manifest_entries WHERE app_version_id IN ({}) ORDER BY app_version_id, s3_path",
                    placeholders(batch.len())
                );
                let mut query_builder = sqlx::query_as::<_, (i64, String)>(&query);
                for id in batch {
                    query_builder = query_builder.bind(id);
                }
                for (id, path) in query_builder.fetch_all(&self.pool).await? {
                    result.entry(id).or_default().push(path);
                }
            }
            Ok(result)
        }

        async fn sample_manifest_paths(
            &self,
            version_ids: &[i64],
        ) -> CatalogResult<HashMap<i64, String>> {
            let mut result = HashMap::new();
            for batch in version_ids.chunks(SQLITE_BATCH_SIZE) {
                let query = format!(
                    "SELECT app_version_id, MIN(s3_path) FROM manifest_entries WHERE app_version_id IN ({}) GROUP BY app_version_id",
                    placeholders(batch.len())
                );
                let mut query_builder = sqlx::query_as::<_, (i64, String)>(&query);
                for id in batch {
                    query_builder = query_builder.bind(id);
                }
                result.extend(query_builder.fetch_all(&self.pool).await?);
            }
            Ok(result)
        }
    }

    #[async_trait]
    impl ChannelRepo for SqliteStore {
        async fn create_channel(&self, channel: &ChannelRow) -> CatalogResult<()> {
            sqlx::query(
                "INSERT INTO channels (id, app_id, owner_org, name, version_id) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(channel.id)
            .bind(&channel.app_id)
            .bind(&channel.owner_org)
            .bind(&channel.name)
            .bind(channel.version_id)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn get_channel(&self, id: i64) -> CatalogResult<Option<ChannelRow>> {
            let row = sqlx::query_as::<_, ChannelRow>(&format!("{CHANNEL_SELECT} WHERE c.id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn channels_for_versions(
            &self,
            version_ids: &[i64],
        ) -> CatalogResult<Vec<ChannelRow>> {
            let mut result = Vec::new();
            for batch in version_ids.chunks(SQLITE_BATCH_SIZE) {
                let query = format!(
                    "{CHANNEL_SELECT} WHERE c.version_id IN ({}) ORDER BY c.id",
                    placeholders(batch.len())
                );
                let mut query_builder = sqlx::query_as::<_, ChannelRow>(&query);
                for id in batch {
                    query_builder = query_builder.bind(id);
                }
                result.extend(query_builder.fetch_all(&self.pool).await?);
            }
            result.sort_by_key(|c| c.id);
            Ok(result)
        }
    }

    #[async_trait]
    impl DeployHistoryRepo for SqliteStore {
        async fn record_deploy(&self, entry: &DeployHistoryRow) -> CatalogResult<()> {
            sqlx::query(
                r#"
                INSERT INTO deploy_history (id, channel_id, version_id, app_id, owner_org, deployed_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(entry.id)
            .bind(entry.channel_id)
            .bind(entry.version_id)
            .bind(&entry.app_id)
            .bind(&entry.owner_org)
            .bind(entry.deployed_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn deploy_history_for_channel(
            &self,
            channel_id: i64,
        ) -> CatalogResult<Vec<DeployHistoryRow>> {
            let rows = sqlx::query_as::<_, DeployHistoryRow>(
                r#"
                SELECT id, channel_id, version_id, app_id, owner_org, deployed_at
                FROM deploy_history WHERE channel_id = ?
                ORDER BY deployed_at DESC, id DESC
                "#,
            )
            .bind(channel_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }
    }

    #[async_trait]
    impl RemediationRepo for SqliteStore {
        async fn repoint_channel(
            &self,
            channel_id: i64,
            expected_version_id: i64,
            new_version_id: i64,
        ) -> CatalogResult<WriteOutcome> {
            let mut tx = self.pool.begin().await?;

            let channel: Option<(i64, String, String)> =
                sqlx::query_as("SELECT version_id, app_id, owner_org FROM channels WHERE id = ?")
                    .bind(channel_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            let Some((current, app_id, owner_org)) = channel else {
                return Ok(WriteOutcome::Conflict(format!(
                    "channel {channel_id} no longer exists"
                )));
            };
            if current == new_version_id {
                return Ok(WriteOutcome::AlreadyApplied);
            }
            if current != expected_version_id {
                return Ok(WriteOutcome::Conflict(format!(
                    "channel {channel_id} now points at version {current}"
                )));
            }

            let target: Option<(String, String, bool)> =
                sqlx::query_as("SELECT app_id, owner_org, deleted FROM app_versions WHERE id = ?")
                    .bind(new_version_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            match target {
                None => {
                    return Ok(WriteOutcome::Conflict(format!(
                        "replacement version {new_version_id} no longer exists"
                    )));
                }
                Some((_, _, true)) => {
                    return Ok(WriteOutcome::Conflict(format!(
                        "replacement version {new_version_id} is deleted"
                    )));
                }
                Some((target_app, target_org, false))
                    if target_app != app_id || target_org != owner_org =>
                {
                    return Ok(WriteOutcome::Conflict(format!(
                        "replacement version {new_version_id} belongs to {target_org}/{target_app}"
                    )));
                }
                Some(_) => {}
            }

            sqlx::query("UPDATE channels SET version_id = ? WHERE id = ? AND version_id = ?")
                .bind(new_version_id)
                .bind(channel_id)
                .bind(expected_version_id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;

            Ok(WriteOutcome::Applied)
        }

        async fn cleanup_version_manifest(&self, version_id: i64) -> CatalogResult<WriteOutcome> {
            let mut tx = self.pool.begin().await?;

            let version: Option<(i64, String)> =
                sqlx::query_as("SELECT manifest_count, app_id FROM app_versions WHERE id = ?")
                    .bind(version_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            let Some((manifest_count, app_id)) = version else {
                return Ok(WriteOutcome::Conflict(format!(
                    "version {version_id} no longer exists"
                )));
            };

            let entries: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM manifest_entries WHERE app_version_id = ?")
                    .bind(version_id)
                    .fetch_one(&mut *tx)
                    .await?;
            if manifest_count == 0 && entries == 0 {
                return Ok(WriteOutcome::AlreadyApplied);
            }

            sqlx::query("DELETE FROM manifest_entries WHERE app_version_id = ?")
                .bind(version_id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("UPDATE app_versions SET manifest_count = 0 WHERE id = ?")
                .bind(version_id)
                .execute(&mut *tx)
                .await?;
            if manifest_count > 0 {
                sqlx::query(
                    "UPDATE apps SET manifest_bundle_count = MAX(manifest_bundle_count - 1, 0) WHERE app_id = ?",
                )
                .bind(&app_id)
                .execute(&mut *tx)
                .await?;
            }
            tx.commit().await?;

            Ok(WriteOutcome::Applied)
        }

        async fn soft_delete_unreferenced_version(
            &self,
            version_id: i64,
        ) -> CatalogResult<WriteOutcome> {
            let mut tx = self.pool.begin().await?;

            let deleted: Option<bool> =
                sqlx::query_scalar("SELECT deleted FROM app_versions WHERE id = ?")
                    .bind(version_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            match deleted {
                None => {
                    return Ok(WriteOutcome::Conflict(format!(
                        "version {version_id} no longer exists"
                    )));
                }
                Some(true) => return Ok(WriteOutcome::AlreadyApplied),
                Some(false) => {}
            }

            let referenced: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM channels WHERE version_id = ?) \
                 OR EXISTS(SELECT 1 FROM deploy_history WHERE version_id = ?)",
            )
            .bind(version_id)
            .bind(version_id)
            .fetch_one(&mut *tx)
            .await?;
            if referenced {
                return Ok(WriteOutcome::Conflict(format!(
                    "version {version_id} is referenced by a channel or deploy history"
                )));
            }

            sqlx::query("UPDATE app_versions SET deleted = 1 WHERE id = ? AND deleted = 0")
                .bind(version_id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;

            Ok(WriteOutcome::Applied)
        }
    }

    #[async_trait]
    impl LeaseRepo for SqliteStore {
        async fn try_acquire_lease(
            &self,
            name: &str,
            owner: &str,
            now: OffsetDateTime,
            expires_at: OffsetDateTime,
        ) -> CatalogResult<LeaseAcquire> {
            let mut tx = self.pool.begin().await?;

            let existing = sqlx::query_as::<_, LeaseRow>(
                "SELECT name, owner, acquired_at, expires_at FROM audit_leases WHERE name = ?",
            )
            .bind(name)
            .fetch_optional(&mut *tx)
            .await?;

            if let Some(lease) = existing
                && lease.owner != owner
                && lease.expires_at > now
            {
                return Ok(LeaseAcquire::Held(lease));
            }

            sqlx::query(
                r#"
                INSERT INTO audit_leases (name, owner, acquired_at, expires_at)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(name) DO UPDATE SET
                    owner = excluded.owner,
                    acquired_at = excluded.acquired_at,
                    expires_at = excluded.expires_at
                "#,
            )
            .bind(name)
            .bind(owner)
            .bind(now)
            .bind(expires_at)
            .execute(&mut *tx)
            .await?;
            tx.commit().await?;

            Ok(LeaseAcquire::Acquired(LeaseRow {
                name: name.to_string(),
                owner: owner.to_string(),
                acquired_at: now,
                expires_at,
            }))
        }

        async fn renew_lease(
            &self,
            name: &str,
            owner: &str,
            expires_at: OffsetDateTime,
        ) -> CatalogResult<bool> {
            let result =
                sqlx::query("UPDATE audit_leases SET expires_at = ? WHERE name = ? AND owner = ?")
                    .bind(expires_at)
                    .bind(name)
                    .bind(owner)
                    .execute(&self.pool)
                    .await?;
            Ok(result.rows_affected() == 1)
        }

        async fn release_lease(&self, name: &str, owner: &str) -> CatalogResult<bool> {
            let result = sqlx::query("DELETE FROM audit_leases WHERE name = ? AND owner = ?")
                .bind(name)
                .bind(owner)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected() == 1)
        }
    }
}

/// SQL schema for SQLite.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS orgs (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    billing_state TEXT NOT NULL DEFAULT 'free'
);

CREATE TABLE IF NOT EXISTS apps (
    app_id TEXT PRIMARY KEY,
    owner_org TEXT NOT NULL REFERENCES orgs(id),
    default_channel TEXT,
    manifest_bundle_count INTEGER NOT NULL DEFAULT 0 CHECK (manifest_bundle_count >= 0)
);

CREATE TABLE IF NOT EXISTS app_versions (
    id INTEGER PRIMARY KEY,
    app_id TEXT NOT NULL REFERENCES apps(app_id),
    owner_org TEXT NOT NULL REFERENCES orgs(id),
    name TEXT NOT NULL,
    deleted INTEGER NOT NULL DEFAULT 0,
    storage_path TEXT,
    manifest_count INTEGER NOT NULL DEFAULT 0,
    UNIQUE (app_id, name)
);
CREATE INDEX IF NOT EXISTS idx_app_versions_org ON app_versions(owner_org, deleted);

CREATE TABLE IF NOT EXISTS manifest_entries (
    id INTEGER PRIMARY KEY,
    app_version_id INTEGER NOT NULL REFERENCES app_versions(id),
    s3_path TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_manifest_entries_version ON manifest_entries(app_version_id);

CREATE TABLE IF NOT EXISTS channels (
    id INTEGER PRIMARY KEY,
    app_id TEXT NOT NULL REFERENCES apps(app_id),
    owner_org TEXT NOT NULL REFERENCES orgs(id),
    name TEXT NOT NULL,
    version_id INTEGER NOT NULL REFERENCES app_versions(id),
    UNIQUE (app_id, name)
);
CREATE INDEX IF NOT EXISTS idx_channels_version ON channels(version_id);

CREATE TABLE IF NOT EXISTS deploy_history (
    id INTEGER PRIMARY KEY,
    channel_id INTEGER NOT NULL REFERENCES channels(id),
    version_id INTEGER NOT NULL REFERENCES app_versions(id),
    app_id TEXT NOT NULL,
    owner_org TEXT NOT NULL,
    deployed_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_deploy_history_channel ON deploy_history(channel_id, deployed_at);
CREATE INDEX IF NOT EXISTS idx_deploy_history_version ON deploy_history(version_id);

CREATE TABLE IF NOT EXISTS audit_leases (
    name TEXT PRIMARY KEY,
    owner TEXT NOT NULL,
    acquired_at TEXT NOT NULL,
    expires_at TEXT NOT NULL
);
"#;

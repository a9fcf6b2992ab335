//! PostgreSQL-based catalog store implementation.

use crate::error::CatalogResult;
use crate::models::*;
use crate::repos::{
    AppRepo, ChannelRepo, DeployHistoryRepo, LeaseRepo, ManifestRepo, OrgRepo, RemediationRepo,
    VersionFilter, VersionRepo,
};
use crate::store::{CatalogStore, scope_clause};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode as SqlxPgSslMode};
use sqlx::{Pool, Postgres};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use stowage_core::BillingScope;
use stowage_core::config::PgSslMode;
use time::OffsetDateTime;

/// PostgreSQL schema (embedded).
const POSTGRES_SCHEMA: &str = include_str!("postgres_schema.sql");

const VERSION_COLUMNS: &str =
    "v.id, v.app_id, v.owner_org, v.name, v.deleted, v.storage_path, v.manifest_count";

const CHANNEL_SELECT: &str = "SELECT c.id, c.app_id, c.owner_org, c.name, c.version_id, \
     COALESCE(a.default_channel = c.name, FALSE) AS is_default \
     FROM channels c LEFT JOIN apps a ON a.app_id = c.app_id";

fn postgres_schema_statements(schema: &str) -> Vec<&str> {
    schema
        .split(';')
        .filter_map(|statement| {
            let trimmed = statement.trim();
            if trimmed.is_empty() {
                return None;
            }
            let has_sql = trimmed.lines().any(|line| {
                let line = line.trim();
                !line.is_empty() && !line.starts_with("--")
            });
            has_sql.then_some(trimmed)
        })
        .collect()
}

/// PostgreSQL-based catalog store.
pub struct PostgresStore {
    pool: Pool<Postgres>,
}

impl PostgresStore {
    /// Create a new PostgreSQL store from a connection URL.
    pub async fn from_url(
        url: &str,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> CatalogResult<Self> {
        let opts = PgConnectOptions::from_str(url)?;
        Self::connect(opts, max_connections, statement_timeout_ms).await
    }

    /// Create a new PostgreSQL store from individual connection parameters.
    #[allow(clippy::too_many_arguments)]
    pub async fn from_params(
        host: &str,
        port: u16,
        username: Option<&str>,
        password: Option<&str>,
        database: &str,
        ssl_mode: Option<PgSslMode>,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> CatalogResult<Self> {
        let mut opts = PgConnectOptions::new()
            .host(host)
            .port(port)
            .database(database);

        if let Some(user) = username {
            opts = opts.username(user);
        }
        if let Some(pass) = password {
            opts = opts.password(pass);
        }
        if let Some(mode) = ssl_mode {
            let sqlx_mode = match mode {
                PgSslMode::Disable => SqlxPgSslMode::Disable,
                PgSslMode::Prefer => SqlxPgSslMode::Prefer,
                PgSslMode::Require => SqlxPgSslMode::Require,
            };
            opts = opts.ssl_mode(sqlx_mode);
        }

        tracing::info!(
            host = host,
            port = port,
            database = database,
            username = username.unwrap_or("<none>"),
            ssl_mode = ?ssl_mode,
            "Connecting to PostgreSQL with individual parameters"
        );

        Self::connect(opts, max_connections, statement_timeout_ms).await
    }

    async fn connect(
        mut opts: PgConnectOptions,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> CatalogResult<Self> {
        if let Some(timeout_ms) = statement_timeout_ms {
            opts = opts.options([("statement_timeout", format!("{timeout_ms}ms"))]);
            tracing::info!("PostgreSQL statement_timeout set to {}ms", timeout_ms);
        }

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

#[async_trait]
impl CatalogStore for PostgresStore {
    async fn migrate(&self) -> CatalogResult<()> {
        // Prepared statements hold one statement each
        for statement in postgres_schema_statements(POSTGRES_SCHEMA) {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn health_check(&self) -> CatalogResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl OrgRepo for PostgresStore {
    async fn create_org(&self, org: &OrgRow) -> CatalogResult<()> {
        let result = sqlx::query(
            "INSERT INTO orgs (id, name, billing_state) VALUES ($1, $2, $3) ON CONFLICT (id) DO NOTHING",
        )
        .bind(&org.id)
        .bind(&org.name)
        .bind(&org.billing_state)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(crate::CatalogError::AlreadyExists(format!("org {}", org.id)));
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
impl AppRepo for PostgresStore {
    async fn create_app(&self, app: &AppRow) -> CatalogResult<()> {
        sqlx::query(
            "INSERT INTO apps (app_id, owner_org, default_channel, manifest_bundle_count) VALUES ($1, $2, $3, $4)",
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
            "SELECT app_id, owner_org, default_channel, manifest_bundle_count FROM apps WHERE app_id = $1",
        )
        .bind(app_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

#[async_trait]
impl VersionRepo for PostgresStore {
    async fn create_version(&self, version: &VersionRow) -> CatalogResult<()> {
        sqlx::query(
            r#"
            INSERT INTO app_versions (id, app_id, owner_org, name, deleted, storage_path, manifest_count)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
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
            "SELECT {VERSION_COLUMNS} FROM app_versions v WHERE v.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn get_versions_by_ids(&self, ids: &[i64]) -> CatalogResult<Vec<VersionRow>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, VersionRow>(&format!(
            "SELECT {VERSION_COLUMNS} FROM app_versions v WHERE v.id = ANY($1) ORDER BY v.id"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_versions_page(
        &self,
        after_id: i64,
        limit: u32,
        filter: &VersionFilter,
    ) -> CatalogResult<Vec<VersionRow>> {
        let query = format!(
            "SELECT {VERSION_COLUMNS} FROM app_versions v WHERE v.id > $1 AND NOT v.deleted{} ORDER BY v.id LIMIT $2",
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
            "SELECT COUNT(*) FROM app_versions v WHERE NOT v.deleted{}",
            scope_clause(filter.scope, "v.owner_org")
        );
        let count: i64 = sqlx::query_scalar(&query).fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }

    async fn list_active_versions_for_org(&self, org_id: &str) -> CatalogResult<Vec<VersionRow>> {
        let rows = sqlx::query_as::<_, VersionRow>(&format!(
            r#"
            SELECT {VERSION_COLUMNS} FROM app_versions v
            WHERE v.owner_org = $1 AND NOT v.deleted
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
        if ids.is_empty() {
            return Ok(HashSet::new());
        }
        let rows: Vec<(i64,)> = sqlx::query_as(
            "SELECT version_id FROM channels WHERE version_id = ANY($1) \
             UNION SELECT version_id FROM deploy_history WHERE version_id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }
}

#[async_trait]
impl ManifestRepo for PostgresStore {
    async fn create_manifest_entry(&self, entry: &ManifestEntryRow) -> CatalogResult<()> {
        sqlx::query("INSERT INTO manifest_entries (id, app_version_id, s3_path) VALUES ($1, $2, $3)")
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
            WHERE m.id > $1 AND NOT v.deleted{}
            ORDER BY m.id LIMIT $2
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
            "SELECT COUNT(*) FROM manifest_entries m JOIN app_versions v ON v.id = m.app_version_id WHERE NOT v.deleted{}",
            scope_clause(filter.scope, "v.owner_org")
        );
        let count: i64 = sqlx::query_scalar(&query).fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }

    async fn manifest_entry_counts(
        &self,
        version_ids: &[i64],
    ) -> CatalogResult<HashMap<i64, u64>> {
        if version_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows: Vec<(i64, i64)> = sqlx::query_as(
            "SELECT app_version_id, COUNT(*) FROM manifest_entries WHERE app_version_id = ANY($1) GROUP BY app_version_id",
        )
        .bind(version_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, count)| (id, count.max(0) as u64))
            .collect())
    }

    async fn manifest_paths(
        &self,
        version_ids: &[i64],
    ) -> CatalogResult<HashMap<i64, Vec<String>>> {
        if version_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows: Vec<(i64, String)> = sqlx::query_as(
            "SELECT DISTINCT app_version_id, s3_path FROM manifest_entries WHERE app_version_id = ANY($1) ORDER BY app_version_id, s3_path",
        )
        .bind(version_ids)
        .fetch_all(&self.pool)
        .await?;
        let mut result: HashMap<i64, Vec<String>> = HashMap::new();
        for (id, path) in rows {
            result.entry(id).or_default().push(path);
        }
        Ok(result)
    }

    async fn sample_manifest_paths(
        &self,
        version_ids: &[i64],
    ) -> CatalogResult<HashMap<i64, String>> {
        if version_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows: Vec<(i64, String)> = sqlx::query_as(
            "SELECT app_version_id, MIN(s3_path) FROM manifest_entries WHERE app_version_id = ANY($1) GROUP BY app_version_id",
        )
        .bind(version_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }
}

#[async_trait]
impl ChannelRepo for PostgresStore {
    async fn create_channel(&self, channel: &ChannelRow) -> CatalogResult<()> {
        sqlx::query(
            "INSERT INTO channels (id, app_id, owner_org, name, version_id) VALUES ($1, $2, $3, $4, $5)",
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
        let row = sqlx::query_as::<_, ChannelRow>(&format!("{CHANNEL_SELECT} WHERE c.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn channels_for_versions(&self, version_ids: &[i64]) -> CatalogResult<Vec<ChannelRow>> {
        if version_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, ChannelRow>(&format!(
            "{CHANNEL_SELECT} WHERE c.version_id = ANY($1) ORDER BY c.id"
        ))
        .bind(version_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[async_trait]
impl DeployHistoryRepo for PostgresStore {
    async fn record_deploy(&self, entry: &DeployHistoryRow) -> CatalogResult<()> {
        sqlx::query(
            r#"
            INSERT INTO deploy_history (id, channel_id, version_id, app_id, owner_org, deployed_at)
            VALUES ($1, $2, $3, $4, $5, $6)
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
            FROM deploy_history WHERE channel_id = $1
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
impl RemediationRepo for PostgresStore {
    async fn repoint_channel(
        &self,
        channel_id: i64,
        expected_version_id: i64,
        new_version_id: i64,
    ) -> CatalogResult<WriteOutcome> {
        let mut tx = self.pool.begin().await?;

        let channel: Option<(i64, String, String)> = sqlx::query_as(
            "SELECT version_id, app_id, owner_org FROM channels WHERE id = $1 FOR UPDATE",
        )
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
            sqlx::query_as("SELECT app_id, owner_org, deleted FROM app_versions WHERE id = $1")
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

        sqlx::query("UPDATE channels SET version_id = $1 WHERE id = $2 AND version_id = $3")
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

        let version: Option<(i64, String)> = sqlx::query_as(
            "SELECT manifest_count, app_id FROM app_versions WHERE id = $1 FOR UPDATE",
        )
        .bind(version_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some((manifest_count, app_id)) = version else {
            return Ok(WriteOutcome::Conflict(format!(
                "version {version_id} no longer exists"
            )));
        };

        let entries: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM manifest_entries WHERE app_version_id = $1")
                .bind(version_id)
                .fetch_one(&mut *tx)
                .await?;
        if manifest_count == 0 && entries == 0 {
            return Ok(WriteOutcome::AlreadyApplied);
        }

        sqlx::query("DELETE FROM manifest_entries WHERE app_version_id = $1")
            .bind(version_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE app_versions SET manifest_count = 0 WHERE id = $1")
            .bind(version_id)
            .execute(&mut *tx)
            .await?;
        if manifest_count > 0 {
            sqlx::query(
                "UPDATE apps SET manifest_bundle_count = GREATEST(manifest_bundle_count - 1, 0) WHERE app_id = $1",
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
            sqlx::query_scalar("SELECT deleted FROM app_versions WHERE id = $1 FOR UPDATE")
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
            "SELECT EXISTS(SELECT 1 FROM channels WHERE version_id = $1) \
             OR EXISTS(SELECT 1 FROM deploy_history WHERE version_id = $1)",
        )
        .bind(version_id)
        .fetch_one(&mut *tx)
        .await?;
        if referenced {
            return Ok(WriteOutcome::Conflict(format!(
                "version {version_id} is referenced by a channel or deploy history"
            )));
        }

        sqlx::query("UPDATE app_versions SET deleted = TRUE WHERE id = $1 AND NOT deleted")
            .bind(version_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(WriteOutcome::Applied)
    }
}

#[async_trait]
impl LeaseRepo for PostgresStore {
    async fn try_acquire_lease(
        &self,
        name: &str,
        owner: &str,
        now: OffsetDateTime,
        expires_at: OffsetDateTime,
    ) -> CatalogResult<LeaseAcquire> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO audit_leases (name, owner, acquired_at, expires_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(name)
        .bind(owner)
        .bind(now)
        .bind(expires_at)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            let lease = sqlx::query_as::<_, LeaseRow>(
                "SELECT name, owner, acquired_at, expires_at FROM audit_leases WHERE name = $1 FOR UPDATE",
            )
            .bind(name)
            .fetch_one(&mut *tx)
            .await?;

            if lease.owner != owner && lease.expires_at > now {
                return Ok(LeaseAcquire::Held(lease));
            }

            sqlx::query(
                "UPDATE audit_leases SET owner = $2, acquired_at = $3, expires_at = $4 WHERE name = $1",
            )
            .bind(name)
            .bind(owner)
            .bind(now)
            .bind(expires_at)
            .execute(&mut *tx)
            .await?;
        }
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
            sqlx::query("UPDATE audit_leases SET expires_at = $1 WHERE name = $2 AND owner = $3")
                .bind(expires_at)
                .bind(name)
                .bind(owner)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn release_lease(&self, name: &str, owner: &str) -> CatalogResult<bool> {
        let result = sqlx::query("DELETE FROM audit_leases WHERE name = $1 AND owner = $2")
            .bind(name)
            .bind(owner)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::postgres_schema_statements;

    #[test]
    fn postgres_schema_statements_skips_empty_and_comment_only() {
        let schema = r#"
            -- comment only

            CREATE TABLE foo (id int);
            ;
            -- another comment
            CREATE TABLE bar (id int);
        "#;

        let statements = postgres_schema_statements(schema);
        assert_eq!(statements.len(), 2);
        assert!(statements[0].contains("CREATE TABLE foo"));
        assert!(statements[1].contains("CREATE TABLE bar"));
    }

    #[test]
    fn embedded_schema_creates_every_table() {
        let statements = postgres_schema_statements(super::POSTGRES_SCHEMA);
        for table in [
            "orgs",
            "apps",
            "app_versions",
            "manifest_entries",
            "channels",
            "deploy_history",
            "audit_leases",
        ] {
            assert!(
                statements
                    .iter()
                    .any(|s| s.contains(&format!("CREATE TABLE IF NOT EXISTS {table} "))),
                "missing table {table}"
            );
        }
    }
}

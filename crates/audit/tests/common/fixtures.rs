use super::mocks::{CountingCatalog, MemoryStore};
use std::sync::Arc;
use stowage_audit::{AuditContext, Auditor};
use stowage_catalog::SqliteStore;
use stowage_catalog::models::*;
use stowage_catalog::repos::*;
use stowage_core::{AuditConfig, IndexStrategy, archive_key, manifest_prefix};
use tempfile::TempDir;
use time::macros::datetime;
use time::{Duration, OffsetDateTime};

pub const ORG: &str = "o1";
pub const APP: &str = "com.acme.app";

/// Where a version's archive is.
#[allow(dead_code)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Archive {
    /// Catalog path set, object present.
    Stored,
    /// Catalog path set, object gone.
    Lost,
    /// No archive at all.
    Absent,
}

/// A catalog, an object store and a config rooted in one temp directory.
#[allow(dead_code)]
pub struct Harness {
    pub dir: TempDir,
    pub catalog: Arc<CountingCatalog>,
    pub store: Arc<MemoryStore>,
    pub config: AuditConfig,
}

#[allow(dead_code)]
impl Harness {
    pub async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let sqlite = SqliteStore::new(dir.path().join("catalog.db"), None)
            .await
            .unwrap();
        let config = AuditConfig {
            artifacts_dir: dir.path().join("audit"),
            page_size: 2,
            verify_concurrency: 4,
            listing_concurrency: 2,
            remediation_batch_size: 2,
            index_strategy: IndexStrategy::Point,
            protected_apps: Vec::new(),
            ..AuditConfig::default()
        };
        let harness = Self {
            dir,
            catalog: CountingCatalog::new(Arc::new(sqlite)),
            store: MemoryStore::new(),
            config,
        };
        harness.org(ORG, "paying").await;
        harness.app(ORG, APP, Some("production")).await;
        harness
    }

    /// Versions 40 and 41 intact, 42 lost. The production channel points at
    /// 42, with deploy history 40, 41, 42 (oldest first).
    pub async fn acme() -> Self {
        let h = Self::new().await;
        h.version(40, "1.0.40", Archive::Stored).await;
        h.version(41, "1.0.41", Archive::Stored).await;
        h.version(42, "1.0.42", Archive::Lost).await;
        h.channel(1, "production", 42).await;
        h.deploy(1, 1, 40, 1).await;
        h.deploy(2, 1, 41, 2).await;
        h.deploy(3, 1, 42, 3).await;
        h
    }

    pub fn context(&self) -> AuditContext {
        AuditContext::new(self.catalog.clone(), self.store.clone(), self.config.clone()).unwrap()
    }

    pub fn auditor(&self) -> Auditor {
        Auditor::new(self.context())
    }

    pub async fn org(&self, id: &str, billing_state: &str) {
        self.catalog
            .create_org(&OrgRow {
                id: id.to_string(),
                name: id.to_uppercase(),
                billing_state: billing_state.to_string(),
            })
            .await
            .unwrap();
    }

    pub async fn app(&self, org: &str, app_id: &str, default_channel: Option<&str>) {
        self.catalog
            .create_app(&AppRow {
                app_id: app_id.to_string(),
                owner_org: org.to_string(),
                default_channel: default_channel.map(str::to_string),
                manifest_bundle_count: 0,
            })
            .await
            .unwrap();
    }

    /// A version of the default app.
    pub async fn version(&self, id: i64, name: &str, archive: Archive) -> VersionRow {
        self.version_in(ORG, APP, id, name, archive, &[]).await
    }

    /// A version with manifest files `(entry id, file name, present in store)`.
    pub async fn version_in(
        &self,
        org: &str,
        app: &str,
        id: i64,
        name: &str,
        archive: Archive,
        files: &[(i64, &str, bool)],
    ) -> VersionRow {
        let key = archive_key(org, app, name);
        let row = VersionRow {
            id,
            app_id: app.to_string(),
            owner_org: org.to_string(),
            name: name.to_string(),
            deleted: false,
            storage_path: (archive != Archive::Absent).then(|| key.clone()),
            manifest_count: files.len() as i64,
        };
        self.catalog.create_version(&row).await.unwrap();
        if archive == Archive::Stored {
            self.store.insert(&key);
        }

        for (entry_id, file, present) in files {
            let path = format!("{}{file}", manifest_prefix(org, app, name));
            self.catalog
                .create_manifest_entry(&ManifestEntryRow {
                    id: *entry_id,
                    app_version_id: id,
                    s3_path: path.clone(),
                })
                .await
                .unwrap();
            if *present {
                self.store.insert(&path);
            }
        }
        row
    }

    /// A manifest entry at an arbitrary store path.
    pub async fn manifest_entry(&self, id: i64, version_id: i64, path: &str, present: bool) {
        self.catalog
            .create_manifest_entry(&ManifestEntryRow {
                id,
                app_version_id: version_id,
                s3_path: path.to_string(),
            })
            .await
            .unwrap();
        if present {
            self.store.insert(path);
        }
    }

    pub async fn channel(&self, id: i64, name: &str, version_id: i64) {
        self.catalog
            .create_channel(&ChannelRow {
                id,
                app_id: APP.to_string(),
                owner_org: ORG.to_string(),
                name: name.to_string(),
                version_id,
                is_default: false,
            })
            .await
            .unwrap();
    }

    /// Record a deployment `day` days into 2024.
    pub async fn deploy(&self, id: i64, channel_id: i64, version_id: i64, day: i64) {
        self.catalog
            .record_deploy(&DeployHistoryRow {
                id,
                channel_id,
                version_id,
                app_id: APP.to_string(),
                owner_org: ORG.to_string(),
                deployed_at: datetime!(2024-01-01 00:00 UTC) + Duration::days(day),
            })
            .await
            .unwrap();
    }

    /// Hold a lease as some other process would.
    pub async fn hold_lease(&self, name: &str) {
        let now = OffsetDateTime::now_utc();
        let acquired = self
            .catalog
            .try_acquire_lease(name, "other-host", now, now + Duration::hours(1))
            .await
            .unwrap();
        assert!(matches!(acquired, LeaseAcquire::Acquired(_)));
    }
}

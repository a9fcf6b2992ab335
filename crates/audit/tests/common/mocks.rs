use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use stowage_catalog::error::CatalogResult;
use stowage_catalog::models::*;
use stowage_catalog::repos::*;
use stowage_catalog::{CatalogStore, SqliteStore};
use stowage_core::BillingScope;
use stowage_storage::error::{StorageError, StorageResult};
use stowage_storage::traits::{LevelListing, ListingOptions, ListingPage, ObjectStore, PageStream};
use time::OffsetDateTime;

/// In-memory object store with call accounting and fault injection.
#[allow(dead_code)]
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, Bytes>>,
    /// Keys whose existence check fails with a transport error.
    failing: Mutex<HashSet<String>>,
    /// Keys that exist but are left out of listings.
    unlisted: Mutex<HashSet<String>>,
    checked: Mutex<Vec<String>>,
    pub deletes: AtomicUsize,
}

#[allow(dead_code)]
impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, key: &str) {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), Bytes::from_static(b"x"));
    }

    pub fn remove(&self, key: &str) {
        self.objects.lock().unwrap().remove(key);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn fail_on(&self, key: &str) {
        self.failing.lock().unwrap().insert(key.to_string());
    }

    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    pub fn hide_from_listing(&self, key: &str) {
        self.unlisted.lock().unwrap().insert(key.to_string());
    }

    /// Every key passed to `exists`, in call order.
    pub fn checked_keys(&self) -> Vec<String> {
        self.checked.lock().unwrap().clone()
    }

    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    fn listed_keys(&self, prefix: &str) -> Vec<String> {
        let unlisted = self.unlisted.lock().unwrap().clone();
        self.objects
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(prefix) && !unlisted.contains(*k))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.checked.lock().unwrap().push(key.to_string());
        if self.failing.lock().unwrap().contains(key) {
            return Err(StorageError::S3("connection reset".into()));
        }
        Ok(self.objects.lock().unwrap().contains_key(key))
    }

    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        self.objects.lock().unwrap().insert(key.to_string(), data);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        match self.objects.lock().unwrap().remove(key) {
            Some(_) => Ok(()),
            None => Err(StorageError::NotFound(key.to_string())),
        }
    }

    async fn list_level(&self, prefix: &str) -> StorageResult<LevelListing> {
        let mut folders = BTreeSet::new();
        let mut objects = BTreeSet::new();
        for key in self.listed_keys(prefix) {
            let rest = &key[prefix.len()..];
            match rest.split_once('/') {
                Some((folder, _)) => folders.insert(folder.to_string()),
                None => objects.insert(rest.to_string()),
            };
        }
        Ok(LevelListing {
            folders: folders.into_iter().collect(),
            objects: objects.into_iter().collect(),
        })
    }

    fn list_pages<'a>(&'a self, prefix: &str, options: ListingOptions) -> PageStream<'a> {
        let page_size = options.normalized_page_size();
        let keys = self.listed_keys(prefix);

        Box::pin(async_stream::try_stream! {
            for chunk in keys.chunks(page_size) {
                yield ListingPage { keys: chunk.to_vec() };
            }
        })
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// SQLite catalog that counts every call able to change catalog state.
#[allow(dead_code)]
pub struct CountingCatalog {
    inner: Arc<SqliteStore>,
    pub remediation_writes: AtomicUsize,
    pub lease_writes: AtomicUsize,
}

#[allow(dead_code)]
impl CountingCatalog {
    pub fn new(inner: Arc<SqliteStore>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            remediation_writes: AtomicUsize::new(0),
            lease_writes: AtomicUsize::new(0),
        })
    }

    /// Remediation writes plus lease writes.
    pub fn mutating_calls(&self) -> usize {
        self.remediation_writes.load(Ordering::SeqCst) + self.lease_writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrgRepo for CountingCatalog {
    async fn create_org(&self, org: &OrgRow) -> CatalogResult<()> {
        self.inner.create_org(org).await
    }

    async fn list_org_ids(&self, scope: BillingScope) -> CatalogResult<Vec<String>> {
        self.inner.list_org_ids(scope).await
    }
}

#[async_trait]
impl AppRepo for CountingCatalog {
    async fn create_app(&self, app: &AppRow) -> CatalogResult<()> {
        self.inner.create_app(app).await
    }

    async fn get_app(&self, app_id: &str) -> CatalogResult<Option<AppRow>> {
        self.inner.get_app(app_id).await
    }
}

#[async_trait]
impl VersionRepo for CountingCatalog {
    async fn create_version(&self, version: &VersionRow) -> CatalogResult<()> {
        self.inner.create_version(version).await
    }

    async fn get_version(&self, id: i64) -> CatalogResult<Option<VersionRow>> {
        self.inner.get_version(id).await
    }

    async fn get_versions_by_ids(&self, ids: &[i64]) -> CatalogResult<Vec<VersionRow>> {
        self.inner.get_versions_by_ids(ids).await
    }

    async fn list_versions_page(
        &self,
        after_id: i64,
        limit: u32,
        filter: &VersionFilter,
    ) -> CatalogResult<Vec<VersionRow>> {
        self.inner.list_versions_page(after_id, limit, filter).await
    }

    async fn count_versions(&self, filter: &VersionFilter) -> CatalogResult<u64> {
        self.inner.count_versions(filter).await
    }

    async fn list_active_versions_for_org(&self, org_id: &str) -> CatalogResult<Vec<VersionRow>> {
        self.inner.list_active_versions_for_org(org_id).await
    }

    async fn referenced_version_ids(&self, ids: &[i64]) -> CatalogResult<HashSet<i64>> {
        self.inner.referenced_version_ids(ids).await
    }
}

#[async_trait]
impl ManifestRepo for CountingCatalog {
    async fn create_manifest_entry(&self, entry: &ManifestEntryRow) -> CatalogResult<()> {
        self.inner.create_manifest_entry(entry).await
    }

    async fn list_manifest_entries_page(
        &self,
        after_id: i64,
        limit: u32,
        filter: &VersionFilter,
    ) -> CatalogResult<Vec<ManifestEntryRow>> {
        self.inner
            .list_manifest_entries_page(after_id, limit, filter)
            .await
    }

    async fn count_manifest_entries(&self, filter: &VersionFilter) -> CatalogResult<u64> {
        self.inner.count_manifest_entries(filter).await
    }

    async fn manifest_entry_counts(
        &self,
        version_ids: &[i64],
    ) -> CatalogResult<HashMap<i64, u64>> {
        self.inner.manifest_entry_counts(version_ids).await
    }

    async fn manifest_paths(
        &self,
        version_ids: &[i64],
    ) -> CatalogResult<HashMap<i64, Vec<String>>> {
        self.inner.manifest_paths(version_ids).await
    }

    async fn sample_manifest_paths(
        &self,
        version_ids: &[i64],
    ) -> CatalogResult<HashMap<i64, String>> {
        self.inner.sample_manifest_paths(version_ids).await
    }
}

#[async_trait]
impl ChannelRepo for CountingCatalog {
    async fn create_channel(&self, channel: &ChannelRow) -> CatalogResult<()> {
        self.inner.create_channel(channel).await
    }

    async fn get_channel(&self, id: i64) -> CatalogResult<Option<ChannelRow>> {
        self.inner.get_channel(id).await
    }

    async fn channels_for_versions(&self, version_ids: &[i64]) -> CatalogResult<Vec<ChannelRow>> {
        self.inner.channels_for_versions(version_ids).await
    }
}

#[async_trait]
impl DeployHistoryRepo for CountingCatalog {
    async fn record_deploy(&self, entry: &DeployHistoryRow) -> CatalogResult<()> {
        self.inner.record_deploy(entry).await
    }

    async fn deploy_history_for_channel(
        &self,
        channel_id: i64,
    ) -> CatalogResult<Vec<DeployHistoryRow>> {
        self.inner.deploy_history_for_channel(channel_id).await
    }
}

#[async_trait]
impl RemediationRepo for CountingCatalog {
    async fn repoint_channel(
        &self,
        channel_id: i64,
        expected_version_id: i64,
        new_version_id: i64,
    ) -> CatalogResult<WriteOutcome> {
        self.remediation_writes.fetch_add(1, Ordering::SeqCst);
        self.inner
            .repoint_channel(channel_id, expected_version_id, new_version_id)
            .await
    }

    async fn cleanup_version_manifest(&self, version_id: i64) -> CatalogResult<WriteOutcome> {
        self.remediation_writes.fetch_add(1, Ordering::SeqCst);
        self.inner.cleanup_version_manifest(version_id).await
    }

    async fn soft_delete_unreferenced_version(
        &self,
        version_id: i64,
    ) -> CatalogResult<WriteOutcome> {
        self.remediation_writes.fetch_add(1, Ordering::SeqCst);
        self.inner.soft_delete_unreferenced_version(version_id).await
    }
}

#[async_trait]
impl LeaseRepo for CountingCatalog {
    async fn try_acquire_lease(
        &self,
        name: &str,
        owner: &str,
        now: OffsetDateTime,
        expires_at: OffsetDateTime,
    ) -> CatalogResult<LeaseAcquire> {
        self.lease_writes.fetch_add(1, Ordering::SeqCst);
        self.inner
            .try_acquire_lease(name, owner, now, expires_at)
            .await
    }

    async fn renew_lease(
        &self,
        name: &str,
        owner: &str,
        expires_at: OffsetDateTime,
    ) -> CatalogResult<bool> {
        self.lease_writes.fetch_add(1, Ordering::SeqCst);
        self.inner.renew_lease(name, owner, expires_at).await
    }

    async fn release_lease(&self, name: &str, owner: &str) -> CatalogResult<bool> {
        self.lease_writes.fetch_add(1, Ordering::SeqCst);
        self.inner.release_lease(name, owner).await
    }
}

#[async_trait]
impl CatalogStore for CountingCatalog {
    async fn migrate(&self) -> CatalogResult<()> {
        self.inner.migrate().await
    }

    async fn health_check(&self) -> CatalogResult<()> {
        self.inner.health_check().await
    }
}

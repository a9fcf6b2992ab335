//! Manifest entry repository.

use crate::error::CatalogResult;
use crate::models::ManifestEntryRow;
use crate::repos::versions::VersionFilter;
use async_trait::async_trait;
use std::collections::HashMap;

/// Repository for manifest entries.
#[async_trait]
pub trait ManifestRepo: Send + Sync {
    async fn create_manifest_entry(&self, entry: &ManifestEntryRow) -> CatalogResult<()>;

    /// Entries with `id > after_id` whose version is not deleted, ordered by id.
    async fn list_manifest_entries_page(
        &self,
        after_id: i64,
        limit: u32,
        filter: &VersionFilter,
    ) -> CatalogResult<Vec<ManifestEntryRow>>;

    /// Exact count of the rows `list_manifest_entries_page` walks.
    async fn count_manifest_entries(&self, filter: &VersionFilter) -> CatalogResult<u64>;

    /// Number of manifest entries per version. Versions without entries are absent.
    async fn manifest_entry_counts(&self, version_ids: &[i64])
    -> CatalogResult<HashMap<i64, u64>>;

    /// Every distinct manifest path per version. Versions without entries are absent.
    async fn manifest_paths(
        &self,
        version_ids: &[i64],
    ) -> CatalogResult<HashMap<i64, Vec<String>>>;

    /// One representative manifest path per version, used to locate its tree.
    async fn sample_manifest_paths(
        &self,
        version_ids: &[i64],
    ) -> CatalogResult<HashMap<i64, String>>;
}

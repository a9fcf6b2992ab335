//! Version repository.

use crate::error::CatalogResult;
use crate::models::VersionRow;
use async_trait::async_trait;
use std::collections::HashSet;
use stowage_core::BillingScope;

/// Filter applied to paginated version and manifest reads.
#[derive(Debug, Clone, Copy, Default)]
pub struct VersionFilter {
    /// Restrict to organizations in this billing scope.
    pub scope: BillingScope,
}

impl VersionFilter {
    pub fn new(scope: BillingScope) -> Self {
        Self { scope }
    }
}

/// Repository for bundle versions.
#[async_trait]
pub trait VersionRepo: Send + Sync {
    async fn create_version(&self, version: &VersionRow) -> CatalogResult<()>;

    async fn get_version(&self, id: i64) -> CatalogResult<Option<VersionRow>>;

    /// Fetch many versions by id. Unknown ids are skipped.
    async fn get_versions_by_ids(&self, ids: &[i64]) -> CatalogResult<Vec<VersionRow>>;

    /// Non-deleted versions with `id > after_id`, ordered by id.
    async fn list_versions_page(
        &self,
        after_id: i64,
        limit: u32,
        filter: &VersionFilter,
    ) -> CatalogResult<Vec<VersionRow>>;

    /// Exact count of the rows `list_versions_page` walks.
    async fn count_versions(&self, filter: &VersionFilter) -> CatalogResult<u64>;

    /// Non-deleted versions of one organization that store something.
    async fn list_active_versions_for_org(&self, org_id: &str) -> CatalogResult<Vec<VersionRow>>;

    /// Subset of `ids` referenced by a channel pointer or a deploy-history entry.
    async fn referenced_version_ids(&self, ids: &[i64]) -> CatalogResult<HashSet<i64>>;
}

//! Organization repository.

use crate::error::CatalogResult;
use crate::models::OrgRow;
use async_trait::async_trait;
use stowage_core::BillingScope;

/// Repository for organizations.
#[async_trait]
pub trait OrgRepo: Send + Sync {
    async fn create_org(&self, org: &OrgRow) -> CatalogResult<()>;

    /// Organization ids within a billing scope, sorted.
    async fn list_org_ids(&self, scope: BillingScope) -> CatalogResult<Vec<String>>;
}

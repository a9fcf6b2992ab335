//! Audit run leases.

use crate::error::CatalogResult;
use crate::models::LeaseAcquire;
use async_trait::async_trait;
use time::OffsetDateTime;

/// Repository for run leases.
#[async_trait]
pub trait LeaseRepo: Send + Sync {
    /// Take the lease unless another owner holds it past `now`.
    ///
    /// Re-acquiring a lease already held by `owner` refreshes it.
    async fn try_acquire_lease(
        &self,
        name: &str,
        owner: &str,
        now: OffsetDateTime,
        expires_at: OffsetDateTime,
    ) -> CatalogResult<LeaseAcquire>;

    /// Extend a held lease. Returns false if `owner` no longer holds it.
    async fn renew_lease(
        &self,
        name: &str,
        owner: &str,
        expires_at: OffsetDateTime,
    ) -> CatalogResult<bool>;

    /// Drop a held lease. Returns false if `owner` did not hold it.
    async fn release_lease(&self, name: &str, owner: &str) -> CatalogResult<bool>;
}

//! Conditional writes used by remediation.
//!
//! Every method re-checks the row inside a transaction and reports what it
//! found, so calling it twice is harmless.

use crate::error::CatalogResult;
use crate::models::WriteOutcome;
use async_trait::async_trait;

/// Repository for remediation writes.
#[async_trait]
pub trait RemediationRepo: Send + Sync {
    /// Point a channel at `new_version_id` if it still points at `expected_version_id`.
    ///
    /// The replacement must be a live version of the same app and organization.
    async fn repoint_channel(
        &self,
        channel_id: i64,
        expected_version_id: i64,
        new_version_id: i64,
    ) -> CatalogResult<WriteOutcome>;

    /// Delete a version's manifest entries, zero its manifest count, and
    /// decrement the app's manifest bundle counter (floored at zero).
    async fn cleanup_version_manifest(&self, version_id: i64) -> CatalogResult<WriteOutcome>;

    /// Mark a version deleted if no channel or deploy-history entry references it.
    async fn soft_delete_unreferenced_version(&self, version_id: i64)
    -> CatalogResult<WriteOutcome>;
}

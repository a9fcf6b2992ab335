//! Deploy history repository.

use crate::error::CatalogResult;
use crate::models::DeployHistoryRow;
use async_trait::async_trait;

/// Repository for the append-only deploy history.
#[async_trait]
pub trait DeployHistoryRepo: Send + Sync {
    async fn record_deploy(&self, entry: &DeployHistoryRow) -> CatalogResult<()>;

    /// Every deployment of a channel, newest first (ties broken by id, newest first).
    async fn deploy_history_for_channel(
        &self,
        channel_id: i64,
    ) -> CatalogResult<Vec<DeployHistoryRow>>;
}

//! Channel repository.

use crate::error::CatalogResult;
use crate::models::ChannelRow;
use async_trait::async_trait;

/// Repository for channels.
#[async_trait]
pub trait ChannelRepo: Send + Sync {
    /// Insert a channel. `is_default` is derived and ignored here.
    async fn create_channel(&self, channel: &ChannelRow) -> CatalogResult<()>;

    async fn get_channel(&self, id: i64) -> CatalogResult<Option<ChannelRow>>;

    /// Channels whose version pointer is one of `version_ids`, ordered by id.
    async fn channels_for_versions(&self, version_ids: &[i64]) -> CatalogResult<Vec<ChannelRow>>;
}

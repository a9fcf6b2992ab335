//! App repository.

use crate::error::CatalogResult;
use crate::models::AppRow;
use async_trait::async_trait;

/// Repository for apps.
#[async_trait]
pub trait AppRepo: Send + Sync {
    async fn create_app(&self, app: &AppRow) -> CatalogResult<()>;

    async fn get_app(&self, app_id: &str) -> CatalogResult<Option<AppRow>>;
}

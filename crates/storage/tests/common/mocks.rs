use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use stowage_storage::error::{StorageError, StorageResult};
use stowage_storage::traits::{LevelListing, ListingOptions, ListingPage, ObjectStore, PageStream};
use tokio::time::Duration;

/// Synthetic read-only backend that counts the pages it produces.
///
/// Keys are generated on the fly, so large listings cost no memory.
#[allow(dead_code)]
pub struct InstrumentedBackend {
    pub total_keys: usize,
    pub pages_fetched: Arc<AtomicUsize>,
    /// Page index (0-based) at which listing fails with a transport error.
    pub fail_at_page: Option<usize>,
}

#[allow(dead_code)]
impl InstrumentedBackend {
    pub fn new(total_keys: usize) -> (Arc<Self>, Arc<AtomicUsize>) {
        let counter = Arc::new(AtomicUsize::new(0));
        let backend = Arc::new(Self {
            total_keys,
            pages_fetched: counter.clone(),
            fail_at_page: None,
        });
        (backend, counter)
    }

    pub fn failing_at(total_keys: usize, page: usize) -> Arc<Self> {
        Arc::new(Self {
            total_keys,
            pages_fetched: Arc::new(AtomicUsize::new(0)),
            fail_at_page: Some(page),
        })
    }

    fn key(i: usize) -> String {
        format!("orgs/o{}/apps/app/{i}.zip", i % 7)
    }
}

#[async_trait]
impl ObjectStore for InstrumentedBackend {
    async fn exists(&self, _key: &str) -> StorageResult<bool> {
        Ok(false)
    }

    async fn put(&self, _key: &str, _data: Bytes) -> StorageResult<()> {
        Err(StorageError::InvalidKey(
            "instrumented backend is read-only".to_string(),
        ))
    }

    async fn delete(&self, _key: &str) -> StorageResult<()> {
        Err(StorageError::InvalidKey(
            "instrumented backend is read-only".to_string(),
        ))
    }

    async fn list_level(&self, _prefix: &str) -> StorageResult<LevelListing> {
        Ok(LevelListing::default())
    }

    fn list_pages<'a>(&'a self, prefix: &str, options: ListingOptions) -> PageStream<'a> {
        let page_size = options.normalized_page_size();
        let prefix = prefix.to_string();
        let pages_counter = self.pages_fetched.clone();
        let total_keys = self.total_keys;
        let fail_at_page = self.fail_at_page;

        Box::pin(async_stream::try_stream! {
            let mut index = 0;
            let mut page = 0;
            while index < total_keys {
                // Count before yielding so cancellation tests see fetched pages
                pages_counter.fetch_add(1, Ordering::SeqCst);

                if fail_at_page == Some(page) {
                    Err(StorageError::S3("connection reset".into()))?;
                }

                let end = (index + page_size).min(total_keys);
                let keys: Vec<String> = (index..end)
                    .map(Self::key)
                    .filter(|key| key.starts_with(&prefix))
                    .collect();

                yield ListingPage { keys };

                index = end;
                page += 1;
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
    }

    fn backend_name(&self) -> &'static str {
        "instrumented"
    }
}

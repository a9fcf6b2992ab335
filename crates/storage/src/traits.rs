//! Storage trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::pin::Pin;

/// A boxed stream of object keys for streaming list operations.
pub type KeyStream<'a> = Pin<Box<dyn Stream<Item = StorageResult<String>> + Send + 'a>>;

/// A boxed stream of listing pages.
pub type PageStream<'a> = Pin<Box<dyn Stream<Item = StorageResult<ListingPage>> + Send + 'a>>;

/// Page size constraints for listing operations.
pub const DEFAULT_PAGE_SIZE: usize = 1000;
pub const MIN_PAGE_SIZE: usize = 100;
pub const MAX_PAGE_SIZE: usize = 10000;

/// Separator used for one-level (folder) listings.
pub const DELIMITER: &str = "/";

/// A single page of listing results.
///
/// Continuation between pages is handled inside the backend stream.
#[derive(Clone, Debug, Default)]
pub struct ListingPage {
    /// Object keys in this page, relative to the store root.
    pub keys: Vec<String>,
}

/// Immediate children of a prefix, split on [`DELIMITER`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LevelListing {
    /// Child folder names, without the parent prefix or trailing delimiter.
    pub folders: Vec<String>,
    /// Object names directly under the prefix, without the parent prefix.
    pub objects: Vec<String>,
}

/// Options for listing operations.
#[derive(Clone, Debug)]
pub struct ListingOptions {
    /// Number of keys to fetch per page.
    ///
    /// This value will be clamped to [MIN_PAGE_SIZE, MAX_PAGE_SIZE].
    pub page_size: usize,
}

impl ListingOptions {
    /// Create new listing options with the given page size.
    pub fn new(page_size: usize) -> Self {
        Self { page_size }
    }

    /// Get the normalized page size.
    pub fn normalized_page_size(&self) -> usize {
        self.page_size.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE)
    }
}

impl Default for ListingOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Object store holding bundle archives and manifest trees.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Check if an object exists.
    ///
    /// `Ok(false)` is returned only when the store explicitly reports the key
    /// as absent. Every other failure is an error.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Put an object atomically.
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()>;

    /// Delete an object. Returns `NotFound` when the backend reports it.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// List the immediate child folders and objects under a prefix.
    ///
    /// The prefix should end with [`DELIMITER`] (or be empty for the root).
    async fn list_level(&self, prefix: &str) -> StorageResult<LevelListing>;

    /// List every key under a prefix, returning a stream of pages.
    ///
    /// A failure on any page ends the stream with that error.
    fn list_pages<'a>(&'a self, prefix: &str, options: ListingOptions) -> PageStream<'a>;

    /// Get the name of this storage backend.
    ///
    /// Used for metrics and logging.
    fn backend_name(&self) -> &'static str;

    /// Verify storage backend connectivity.
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// Extension trait providing a flat key stream over `list_pages()`.
///
/// Automatically implemented for every `ObjectStore`.
pub trait ObjectStoreListStreamExt: ObjectStore {
    /// List objects with a prefix, returning a flat stream of keys.
    fn list_keys<'a>(&'a self, prefix: &str, options: Option<ListingOptions>) -> KeyStream<'a> {
        let options = options.unwrap_or_default();
        let page_stream = self.list_pages(prefix, options);

        let key_stream = page_stream.flat_map(|page_result| match page_result {
            Ok(page) => futures::stream::iter(page.keys.into_iter().map(Ok)).boxed(),
            Err(e) => futures::stream::once(async move { Err(e) }).boxed(),
        });

        Box::pin(key_stream)
    }
}

impl<T: ObjectStore + ?Sized> ObjectStoreListStreamExt for T {}

// Pagination behavior of the listing API

mod common;

use common::{InstrumentedBackend, seed_versions};
use futures::{StreamExt, TryStreamExt};
use std::collections::HashSet;
use std::sync::atomic::Ordering;
use stowage_storage::traits::{ListingOptions, ObjectStore, ObjectStoreListStreamExt};
use stowage_storage::FilesystemBackend;
use tempfile::TempDir;
use tokio::time::Duration;

#[tokio::test]
async fn test_large_listing_pagination() {
    let temp_dir = TempDir::new().unwrap();
    let backend = FilesystemBackend::new(temp_dir.path()).await.unwrap();
    let written = seed_versions(&backend, "o1", "com.acme.app", 600).await;

    for page_size in [100, 500, 1000] {
        let mut stream = backend.list_pages("orgs/o1/", ListingOptions::new(page_size));
        let mut seen = HashSet::new();

        while let Some(page) = stream.next().await {
            let page = page.unwrap();
            assert!(
                page.keys.len() <= page_size,
                "page has {} keys, exceeds page_size {page_size}",
                page.keys.len()
            );
            for key in page.keys {
                assert!(seen.insert(key), "duplicate key across pages");
            }
        }

        assert_eq!(seen.len(), written, "page_size={page_size}");
    }
}

#[tokio::test]
async fn test_backpressure_works() {
    let (backend, pages_fetched) = InstrumentedBackend::new(10_000);

    let mut stream = backend.list_pages("", ListingOptions::new(100));
    for _ in 0..5 {
        if let Some(page) = stream.next().await {
            page.unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    let fetched = pages_fetched.load(Ordering::SeqCst);
    assert!(
        fetched <= 10,
        "fetched {fetched} pages when only 5 were consumed"
    );
}

#[tokio::test]
async fn test_listing_failure_is_not_swallowed() {
    let backend = InstrumentedBackend::failing_at(1_000, 2);

    let result: Result<Vec<String>, _> = backend
        .list_keys("", Some(ListingOptions::new(100)))
        .try_collect()
        .await;

    assert!(result.is_err(), "a failed page must fail the whole listing");
}

#[tokio::test]
async fn test_empty_prefix_listing() {
    let temp_dir = TempDir::new().unwrap();
    let backend = FilesystemBackend::new(temp_dir.path()).await.unwrap();

    let mut stream = backend.list_pages("orgs/nonexistent/", ListingOptions::default());
    match stream.next().await {
        None => {}
        Some(Ok(page)) => assert!(page.keys.is_empty()),
        Some(Err(e)) => panic!("empty listing should not error: {e}"),
    }
}

use bytes::Bytes;
use stowage_storage::ObjectStore;

/// Write `count` archives plus one manifest file per version under one app.
///
/// Returns the number of keys written.
pub async fn seed_versions(store: &dyn ObjectStore, org: &str, app: &str, count: usize) -> usize {
    for i in 0..count {
        let version = format!("1.0.{i}");
        store
            .put(
                &stowage_core::archive_key(org, app, &version),
                Bytes::from(vec![i as u8]),
            )
            .await
            .unwrap();
        store
            .put(
                &format!("{}index.js", stowage_core::manifest_prefix(org, app, &version)),
                Bytes::from_static(b"js"),
            )
            .await
            .unwrap();
    }
    count * 2
}

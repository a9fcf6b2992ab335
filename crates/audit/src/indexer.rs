//! Object store enumeration.
//!
//! Two shapes of listing are offered: a full recursive key index over a set
//! of scoped prefixes, and one-level folder listings. Each prefix is listed
//! in its own concurrency slot; a failure on any prefix fails the whole call
//! once every in-flight listing has finished.

use crate::error::{AuditError, AuditResult};
use futures::StreamExt;
use futures::TryStreamExt;
use futures::stream::FuturesUnordered;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use stowage_storage::{LevelListing, ObjectStore, ObjectStoreListStreamExt};

/// In-memory set of every key under the indexed prefixes.
#[derive(Debug, Default)]
pub struct KeyIndex {
    keys: HashSet<String>,
}

impl KeyIndex {
    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub(crate) fn len(&self) -> usize {
        self.keys.len()
    }
}

/// Lists store prefixes under a concurrency bound.
pub struct Indexer {
    store: Arc<dyn ObjectStore>,
    concurrency: usize,
}

impl Indexer {
    pub fn new(store: Arc<dyn ObjectStore>, concurrency: usize) -> Self {
        Self {
            store,
            concurrency: concurrency.max(1),
        }
    }

    /// Enumerate every key under each prefix and merge them into one index.
    pub async fn build_index(&self, prefixes: &[String]) -> AuditResult<KeyIndex> {
        let listings = self
            .fan_out(prefixes, |prefix| async move {
                let keys: Vec<String> = self
                    .store
                    .list_keys(&prefix, None)
                    .try_collect()
                    .await?;
                Ok::<_, AuditError>(keys)
            })
            .await?;

        let mut index = KeyIndex::default();
        for (_, keys) in listings {
            index.keys.extend(keys);
        }
        tracing::info!(
            prefixes = prefixes.len(),
            keys = index.len(),
            backend = self.store.backend_name(),
            "Built object store key index"
        );
        Ok(index)
    }

    /// One-level listing of a single prefix.
    pub async fn list_folders(&self, prefix: &str) -> AuditResult<LevelListing> {
        Ok(self.store.list_level(prefix).await?)
    }

    /// One-level listings of several prefixes, keyed by prefix. Used by the
    /// orphan walk to list an organization's apps side by side.
    pub async fn list_folders_scoped(
        &self,
        prefixes: &[String],
    ) -> AuditResult<BTreeMap<String, LevelListing>> {
        self.fan_out(prefixes, |prefix| async move {
            Ok::<_, AuditError>(self.store.list_level(&prefix).await?)
        })
        .await
    }

    /// Run `op` for each prefix with at most `concurrency` in flight.
    ///
    /// Every started listing runs to completion before the first error is
    /// returned.
    async fn fan_out<'a, T, F, Fut>(
        &'a self,
        prefixes: &[String],
        op: F,
    ) -> AuditResult<BTreeMap<String, T>>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = AuditResult<T>> + 'a,
    {
        let mut results = BTreeMap::new();
        let mut first_error: Option<AuditError> = None;
        let mut in_flight = FuturesUnordered::new();

        let mut collect = |prefix: String, result: AuditResult<T>| match result {
            Ok(value) => {
                results.insert(prefix, value);
            }
            Err(e) => {
                tracing::warn!(prefix = %prefix, error = %e, "Listing failed for prefix");
                first_error.get_or_insert(e);
            }
        };

        for prefix in prefixes {
            let prefix = prefix.clone();
            let fut = op(prefix.clone());
            in_flight.push(async move { (prefix, fut.await) });

            if in_flight.len() >= self.concurrency
                && let Some((prefix, result)) = in_flight.next().await
            {
                collect(prefix, result);
            }
        }
        while let Some((prefix, result)) = in_flight.next().await {
            collect(prefix, result);
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(results),
        }
    }
}

//! Bounded-concurrency existence verification.

use crate::error::{AuditError, AuditResult};
use crate::indexer::KeyIndex;
use crate::metrics::AuditMetrics;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use stowage_core::IndexStrategy;
use stowage_storage::ObjectStore;

/// One catalog row and the key it expects in the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckItem {
    pub catalog_id: i64,
    pub key: String,
}

impl CheckItem {
    pub fn new(catalog_id: i64, key: impl Into<String>) -> Self {
        Self {
            catalog_id,
            key: key.into(),
        }
    }
}

/// How existence is answered.
#[derive(Clone, Debug)]
pub enum Lookup {
    /// One existence call per item.
    Point,
    /// Membership in a pre-built index. Misses are re-confirmed with a point
    /// check before being reported.
    Index(Arc<KeyIndex>),
}

impl Lookup {
    pub fn kind(&self) -> LookupKind {
        match self {
            Lookup::Point => LookupKind::Point,
            Lookup::Index(_) => LookupKind::Index,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupKind {
    Point,
    Index,
}

/// Pick point checks or a pre-built index for a run.
///
/// `auto` builds an index only when the store universe is bounded by an
/// organization allow-list and the catalog is large enough for one listing
/// pass to beat per-item calls.
pub fn choose_lookup(
    strategy: IndexStrategy,
    scoped: bool,
    catalog_items: u64,
    threshold: u64,
) -> LookupKind {
    match strategy {
        IndexStrategy::Point => LookupKind::Point,
        IndexStrategy::Index => LookupKind::Index,
        IndexStrategy::Auto if scoped && catalog_items >= threshold => LookupKind::Index,
        IndexStrategy::Auto => LookupKind::Point,
    }
}

/// Result of verifying one batch.
#[derive(Debug, Default)]
pub struct VerifyOutcome {
    pub checked: usize,
    /// Items the store explicitly reported absent, ordered by catalog id.
    pub missing: Vec<CheckItem>,
}

/// Verifies catalog items against the object store.
pub struct Verifier {
    store: Arc<dyn ObjectStore>,
    concurrency: usize,
    metrics: Option<Arc<AuditMetrics>>,
}

impl Verifier {
    pub fn new(store: Arc<dyn ObjectStore>, concurrency: usize) -> Self {
        Self {
            store,
            concurrency: concurrency.max(1),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<AuditMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Verify a batch.
    ///
    /// Returns only after every submitted item has completed. If any check
    /// failed with something other than an explicit not-found, the whole
    /// batch fails and nothing in it is reported missing.
    pub async fn verify(&self, items: Vec<CheckItem>, lookup: &Lookup) -> AuditResult<VerifyOutcome> {
        let checked = items.len();
        let to_check: Vec<CheckItem> = match lookup {
            Lookup::Point => items,
            Lookup::Index(index) => items
                .into_iter()
                .filter(|item| !index.contains(&item.key))
                .collect(),
        };

        let mut missing = self.check_existence(to_check).await?;
        missing.sort_by_key(|item| item.catalog_id);

        if let Some(metrics) = &self.metrics {
            metrics.objects_verified.inc_by(checked as u64);
        }
        Ok(VerifyOutcome { checked, missing })
    }

    /// Point-check items, returning the ones confirmed absent.
    async fn check_existence(&self, items: Vec<CheckItem>) -> AuditResult<Vec<CheckItem>> {
        let mut missing = Vec::new();
        let mut first_error: Option<AuditError> = None;
        let mut in_flight = FuturesUnordered::new();

        let mut collect = |item: CheckItem, result: Result<bool, stowage_storage::StorageError>| {
            match result {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!(
                        catalog_id = item.catalog_id,
                        key = %item.key,
                        "Confirmed missing"
                    );
                    missing.push(item);
                }
                Err(e) => {
                    tracing::warn!(key = %item.key, error = %e, "Existence check failed");
                    if let Some(metrics) = &self.metrics {
                        metrics.transient_errors.inc();
                    }
                    first_error.get_or_insert(AuditError::TransientStore(e));
                }
            }
        };

        for item in items {
            let store = self.store.clone();
            in_flight.push(async move {
                let result = store.exists(&item.key).await;
                (item, result)
            });

            if in_flight.len() >= self.concurrency
                && let Some((item, result)) = in_flight.next().await
            {
                collect(item, result);
            }
        }
        while let Some((item, result)) = in_flight.next().await {
            collect(item, result);
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(missing),
        }
    }
}

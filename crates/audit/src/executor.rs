//! Remediation executor.
//!
//! Every action is dry-run unless `apply` is set; a dry run performs no
//! catalog or store calls at all. Items are processed strictly sequentially
//! in fixed-size batches. A conflict skips one item, a protected app is a
//! counted no-op, and any other failure ends the run with earlier batches
//! left applied. Cancellation is honored between batches. Either way the
//! report covers everything processed so far. Each write is idempotent, so
//! a failed or interrupted run is re-invoked from the top.

use crate::artifacts::ArtifactRecord;
use crate::error::{AuditError, AuditResult};
use crate::findings::BrokenManifest;
use crate::metrics::AuditMetrics;
use crate::orphans::{OrgActivity, OrphanCandidate, UnusedVersion};
use crate::planner::DowngradeCandidate;
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use stowage_catalog::CatalogStore;
use stowage_catalog::models::WriteOutcome;
use stowage_catalog::repos::{RemediationRepo, VersionRepo};
use stowage_core::AuditConfig;
use stowage_storage::{ObjectStore, ObjectStoreListStreamExt};
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RemediationAction {
    Downgrade,
    Manifests,
    SoftDelete,
    PurgeOrphans,
}

impl RemediationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemediationAction::Downgrade => "downgrade",
            RemediationAction::Manifests => "manifests",
            RemediationAction::SoftDelete => "soft-delete",
            RemediationAction::PurgeOrphans => "purge-orphans",
        }
    }

    pub fn report_file(&self) -> String {
        format!("{}-report.json", self.as_str())
    }
}

impl fmt::Display for RemediationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to one item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ItemOutcome {
    /// Dry run: would have been attempted.
    Planned,
    Applied,
    AlreadyApplied,
    Conflict { reason: String },
    /// App is in a protected namespace.
    Protected,
}

impl ItemOutcome {
    fn label(&self) -> &'static str {
        match self {
            ItemOutcome::Planned => "planned",
            ItemOutcome::Applied => "applied",
            ItemOutcome::AlreadyApplied => "already_applied",
            ItemOutcome::Conflict { .. } => "conflict",
            ItemOutcome::Protected => "protected",
        }
    }
}

impl From<WriteOutcome> for ItemOutcome {
    fn from(outcome: WriteOutcome) -> Self {
        match outcome {
            WriteOutcome::Applied => ItemOutcome::Applied,
            WriteOutcome::AlreadyApplied => ItemOutcome::AlreadyApplied,
            WriteOutcome::Conflict(reason) => ItemOutcome::Conflict { reason },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSample {
    pub target: String,
    pub app_id: Option<String>,
    #[serde(flatten)]
    pub outcome: ItemOutcome,
}

/// Totals and samples of one remediation run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemediationReport {
    pub action: RemediationAction,
    pub apply: bool,
    pub total: u64,
    pub planned: u64,
    pub applied: u64,
    pub already_applied: u64,
    pub conflicts: u64,
    pub skipped_protected: u64,
    pub batches: u64,
    pub samples: Vec<ReportSample>,
    /// Cancelled before every batch ran.
    #[serde(default)]
    pub interrupted: bool,
    /// The failure that ended the run early.
    #[serde(default)]
    pub error: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub finished_at: OffsetDateTime,
}

impl ArtifactRecord for RemediationReport {
    const KIND: &'static str = "remediation_report";
}

impl RemediationReport {
    fn new(action: RemediationAction, apply: bool, total: usize) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            action,
            apply,
            total: total as u64,
            planned: 0,
            applied: 0,
            already_applied: 0,
            conflicts: 0,
            skipped_protected: 0,
            batches: 0,
            samples: Vec::new(),
            interrupted: false,
            error: None,
            started_at: now,
            finished_at: now,
        }
    }

    fn record(&mut self, sample: ReportSample, sample_size: usize) {
        match &sample.outcome {
            ItemOutcome::Planned => self.planned += 1,
            ItemOutcome::Applied => self.applied += 1,
            ItemOutcome::AlreadyApplied => self.already_applied += 1,
            ItemOutcome::Conflict { .. } => self.conflicts += 1,
            ItemOutcome::Protected => self.skipped_protected += 1,
        }
        if self.samples.len() < sample_size {
            self.samples.push(sample);
        }
    }

    fn processed(&self) -> u64 {
        self.planned + self.applied + self.already_applied + self.conflicts + self.skipped_protected
    }
}

/// A finished, interrupted or failed remediation run.
///
/// `report` is always complete up to the last processed item; `failure` is
/// the error that stopped the run, if any.
#[derive(Debug)]
pub struct Execution {
    pub report: RemediationReport,
    pub failure: Option<AuditError>,
}

#[derive(Clone, Debug)]
pub struct ExecutorOptions {
    pub apply: bool,
    pub batch_size: usize,
    pub sample_size: usize,
    pub protected_apps: Vec<String>,
}

impl ExecutorOptions {
    pub fn from_config(config: &AuditConfig, apply: bool) -> Self {
        Self {
            apply,
            batch_size: config.remediation_batch_size.max(1),
            sample_size: config.sample_size,
            protected_apps: config.protected_apps.clone(),
        }
    }

    fn is_protected(&self, app_id: Option<&str>) -> bool {
        app_id.is_some_and(|app| self.protected_apps.iter().any(|p| p == app))
    }
}

enum Target<'a> {
    Downgrade(&'a DowngradeCandidate),
    Manifest(&'a BrokenManifest),
    SoftDelete(&'a UnusedVersion),
    Purge(&'a OrphanCandidate),
}

impl Target<'_> {
    fn label(&self) -> String {
        match self {
            Target::Downgrade(c) => format!(
                "channel {} ({}): {} -> {}",
                c.channel_id, c.channel_name, c.broken_version_id, c.replacement_version_id
            ),
            Target::Manifest(m) => format!("version {} ({})", m.version_id, m.name),
            Target::SoftDelete(v) => format!("version {} ({})", v.version_id, v.name),
            Target::Purge(o) => o.path.clone(),
        }
    }

    fn app_id(&self) -> Option<&str> {
        match self {
            Target::Downgrade(c) => Some(&c.app_id),
            Target::Manifest(m) => Some(&m.app_id),
            Target::SoftDelete(v) => Some(&v.app_id),
            Target::Purge(o) => o.app_id.as_deref(),
        }
    }
}

/// Applies remediation plans.
pub struct Executor {
    catalog: Arc<dyn CatalogStore>,
    store: Arc<dyn ObjectStore>,
    options: ExecutorOptions,
    metrics: Option<Arc<AuditMetrics>>,
    cancel: CancellationToken,
}

impl Executor {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        store: Arc<dyn ObjectStore>,
        options: ExecutorOptions,
    ) -> Self {
        Self {
            catalog,
            store,
            options,
            metrics: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop before the next batch once `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<AuditMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Repoint each channel from its broken version to the planned replacement.
    pub async fn downgrade(
        &self,
        candidates: &[DowngradeCandidate],
    ) -> Execution {
        let targets = candidates.iter().map(Target::Downgrade).collect();
        self.execute(RemediationAction::Downgrade, targets).await
    }

    /// Drop manifest rows of versions whose archive is intact.
    pub async fn cleanup_manifests(
        &self,
        versions: &[BrokenManifest],
    ) -> Execution {
        let targets = versions.iter().map(Target::Manifest).collect();
        self.execute(RemediationAction::Manifests, targets).await
    }

    /// Soft-delete broken versions nothing references.
    pub async fn soft_delete(&self, versions: &[UnusedVersion]) -> Execution {
        let targets = versions.iter().map(Target::SoftDelete).collect();
        self.execute(RemediationAction::SoftDelete, targets).await
    }

    /// Delete store objects under reviewed orphan paths.
    pub async fn purge_orphans(
        &self,
        orphans: &[OrphanCandidate],
    ) -> Execution {
        let targets = orphans.iter().map(Target::Purge).collect();
        self.execute(RemediationAction::PurgeOrphans, targets).await
    }

    async fn execute(&self, action: RemediationAction, targets: Vec<Target<'_>>) -> Execution {
        let mut report = RemediationReport::new(action, self.options.apply, targets.len());
        let mut activity_cache: HashMap<String, OrgActivity> = HashMap::new();

        if !self.options.apply {
            tracing::info!(action = %action, items = targets.len(), "Dry run, no changes will be made");
        }

        for (batch_index, batch) in targets.chunks(self.options.batch_size).enumerate() {
            if self.cancel.is_cancelled() {
                tracing::warn!(
                    action = %action,
                    batch = batch_index,
                    processed = report.processed(),
                    total = report.total,
                    "Remediation cancelled before batch"
                );
                report.interrupted = true;
                break;
            }
            for target in batch {
                let outcome = if self.options.is_protected(target.app_id()) {
                    ItemOutcome::Protected
                } else if !self.options.apply {
                    ItemOutcome::Planned
                } else {
                    match self.apply(target, &mut activity_cache).await {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            tracing::error!(
                                action = %action,
                                batch = batch_index,
                                target = %target.label(),
                                error = %e,
                                "Remediation batch failed; earlier batches stay applied"
                            );
                            report.error = Some(e.to_string());
                            report.finished_at = OffsetDateTime::now_utc();
                            return Execution {
                                report,
                                failure: Some(e),
                            };
                        }
                    }
                };

                if let ItemOutcome::Conflict { reason } = &outcome {
                    tracing::warn!(
                        action = %action,
                        target = %target.label(),
                        reason = %reason,
                        "Remediation conflict, item skipped"
                    );
                }
                if let Some(metrics) = &self.metrics {
                    metrics.record_outcome(action.as_str(), outcome.label());
                }
                report.record(
                    ReportSample {
                        target: target.label(),
                        app_id: target.app_id().map(str::to_string),
                        outcome,
                    },
                    self.options.sample_size,
                );
            }

            report.batches += 1;
            tracing::info!(
                action = %action,
                batch = batch_index,
                processed = report.processed(),
                total = report.total,
                applied = report.applied,
                already_applied = report.already_applied,
                conflicts = report.conflicts,
                skipped_protected = report.skipped_protected,
                "Remediation batch finished"
            );
        }

        report.finished_at = OffsetDateTime::now_utc();
        Execution {
            report,
            failure: None,
        }
    }

    async fn apply(
        &self,
        target: &Target<'_>,
        activity_cache: &mut HashMap<String, OrgActivity>,
    ) -> AuditResult<ItemOutcome> {
        let outcome = match target {
            Target::Downgrade(c) => {
                self.catalog
                    .repoint_channel(c.channel_id, c.broken_version_id, c.replacement_version_id)
                    .await?
            }
            Target::Manifest(m) => {
                if let Some(reason) = self.archive_gone(m.version_id).await? {
                    return Ok(ItemOutcome::Conflict { reason });
                }
                self.catalog.cleanup_version_manifest(m.version_id).await?
            }
            Target::SoftDelete(v) => {
                self.catalog
                    .soft_delete_unreferenced_version(v.version_id)
                    .await?
            }
            Target::Purge(o) => return self.purge(o, activity_cache).await,
        };
        Ok(outcome.into())
    }

    /// Why a version's manifest rows must stay: the version is gone or its
    /// archive no longer answers in the store. `None` when the archive is
    /// intact.
    async fn archive_gone(&self, version_id: i64) -> AuditResult<Option<String>> {
        let Some(version) = self.catalog.get_version(version_id).await? else {
            return Ok(Some(format!("version {version_id} no longer exists")));
        };
        if version.deleted {
            return Ok(Some(format!("version {version_id} is deleted")));
        }
        let Some(archive) = &version.storage_path else {
            return Ok(Some(format!("version {version_id} has no archive")));
        };
        if !self.store.exists(archive).await? {
            return Ok(Some(format!("archive {archive} is missing from the store")));
        }
        Ok(None)
    }

    /// Delete one orphan path after re-checking it against the live catalog.
    async fn purge(
        &self,
        orphan: &OrphanCandidate,
        activity_cache: &mut HashMap<String, OrgActivity>,
    ) -> AuditResult<ItemOutcome> {
        if let Some(org_id) = &orphan.org_id {
            if !activity_cache.contains_key(org_id) {
                let activity = OrgActivity::load(self.catalog.as_ref(), org_id).await?;
                activity_cache.insert(org_id.clone(), activity);
            }
            if activity_cache
                .get(org_id)
                .is_some_and(|activity| activity.covers(orphan))
            {
                return Ok(ItemOutcome::Conflict {
                    reason: format!("{} is referenced by the catalog again", orphan.path),
                });
            }
        }

        let keys: Vec<String> = if orphan.is_subtree() {
            self.store.list_keys(&orphan.path, None).try_collect().await?
        } else {
            vec![orphan.path.clone()]
        };

        let mut deleted = 0u64;
        for key in &keys {
            match self.store.delete(key).await {
                Ok(()) => deleted += 1,
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(AuditError::TransientStore(e)),
            }
        }
        tracing::debug!(path = %orphan.path, deleted, "Purged orphan path");

        Ok(if deleted > 0 {
            ItemOutcome::Applied
        } else {
            ItemOutcome::AlreadyApplied
        })
    }
}

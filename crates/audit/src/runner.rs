//! Run modes: the resumable full audit, the derived modes that read its
//! findings, and remediation.
//!
//! Every audit mode holds a catalog lease named after the mode for its whole
//! run and finalizes through one path, so an interrupted or failed run
//! leaves the same artifact set as a finished one.

use crate::artifacts::{ArtifactDir, files, read_records};
use crate::checkpoint::{Checkpoint, CheckpointStore, Phase};
use crate::error::{AuditError, AuditResult};
use crate::executor::{Execution, Executor, ExecutorOptions, RemediationAction, RemediationReport};
use crate::findings::{
    AuditSummary, BrokenManifest, Findings, MissingManifest, MissingVersion, apps_with_issues,
    broken_manifests, broken_version_ids, classify_affected,
};
use crate::indexer::Indexer;
use crate::lease::RunLease;
use crate::metrics::AuditMetrics;
use crate::orphans::{OrphanCandidate, OrphanDetector, UnusedVersion, find_unused_versions};
use crate::planner::{DowngradePlan, PlanEntry, Planner};
use crate::verifier::{CheckItem, Lookup, LookupKind, Verifier, choose_lookup};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stowage_catalog::CatalogStore;
use stowage_catalog::repos::{ManifestRepo, OrgRepo, VersionFilter, VersionRepo};
use stowage_core::layout::org_prefix;
use stowage_core::{AuditConfig, BillingScope, IndexStrategy};
use stowage_storage::ObjectStore;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;

/// Audit run modes. The name doubles as artifact directory and lease name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunMode {
    Full,
    Unused,
    Manifests,
    DefaultChannels,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Full => "full",
            RunMode::Unused => "unused",
            RunMode::Manifests => "manifests",
            RunMode::DefaultChannels => "default-channels",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remediation reports live here, under the artifacts directory.
pub const REMEDIATION_DIR: &str = "remediation";

/// Notified after every page of the full audit is flushed.
pub trait ProgressObserver: Send + Sync {
    fn on_page(&self, phase: Phase, first_id: i64, last_id: i64, items: usize);
}

/// Everything a run needs.
#[derive(Clone)]
pub struct AuditContext {
    pub catalog: Arc<dyn CatalogStore>,
    pub store: Arc<dyn ObjectStore>,
    pub config: AuditConfig,
    pub metrics: Arc<AuditMetrics>,
    pub cancel: CancellationToken,
    observer: Option<Arc<dyn ProgressObserver>>,
}

impl AuditContext {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        store: Arc<dyn ObjectStore>,
        config: AuditConfig,
    ) -> AuditResult<Self> {
        Ok(Self {
            catalog,
            store,
            config,
            metrics: Arc::new(AuditMetrics::new()?),
            cancel: CancellationToken::new(),
            observer: None,
        })
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Artifact directory of a run mode.
    pub fn mode_dir(&self, mode: RunMode) -> ArtifactDir {
        ArtifactDir::new(self.config.artifacts_dir.join(mode.as_str()))
    }

    fn scoped(&self) -> bool {
        self.config.billing_scope == BillingScope::Active
    }
}

/// Output of the `unused` mode.
#[derive(Clone, Debug, Default)]
pub struct UnusedReport {
    pub unused_versions: Vec<UnusedVersion>,
    pub orphans: Vec<OrphanCandidate>,
    /// The orphan walk was cancelled; `orphans` covers the organizations
    /// walked before that.
    pub interrupted: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stop {
    Completed,
    Interrupted,
}

/// A verified page, as reported to observers and logs.
#[derive(Clone, Copy, Debug)]
struct PageMark {
    phase: Phase,
    first_id: i64,
    last_id: i64,
    items: usize,
}

/// In-memory state of a full audit, mirrored to disk at every page.
struct FullState {
    dir: ArtifactDir,
    checkpoints: CheckpointStore,
    checkpoint: Checkpoint,
    lookup: LookupKind,
    missing_versions: BTreeMap<i64, MissingVersion>,
    missing_manifests: BTreeMap<i64, MissingManifest>,
}

impl FullState {
    fn fresh(dir: ArtifactDir) -> Self {
        Self {
            checkpoints: CheckpointStore::new(dir.clone()),
            dir,
            checkpoint: Checkpoint::new(),
            lookup: LookupKind::Point,
            missing_versions: BTreeMap::new(),
            missing_manifests: BTreeMap::new(),
        }
    }

    /// Findings first, then the summary, then the checkpoint: a checkpoint
    /// on disk never points past findings that are not.
    async fn flush(&mut self, completed: bool, interrupted: bool) -> AuditResult<AuditSummary> {
        self.dir
            .write(files::MISSING_VERSIONS, self.missing_versions.values())
            .await?;
        self.dir
            .write(files::MISSING_MANIFESTS, self.missing_manifests.values())
            .await?;
        let apps = apps_with_issues(&self.missing_versions, &self.missing_manifests);
        self.dir.write(files::APPS_WITH_ISSUES, &apps).await?;

        self.checkpoint.touch();
        let summary = AuditSummary {
            lookup: self.lookup,
            phase: self.checkpoint.phase,
            cursor: self.checkpoint.cursor,
            pages: self.checkpoint.counters.pages,
            versions_checked: self.checkpoint.counters.versions_checked,
            manifest_entries_checked: self.checkpoint.counters.manifest_entries_checked,
            missing_versions: self.missing_versions.len() as u64,
            missing_manifest_entries: self.missing_manifests.len() as u64,
            apps_with_issues: apps.len() as u64,
            completed,
            interrupted,
            started_at: self.checkpoint.started_at,
            updated_at: self.checkpoint.updated_at,
        };
        self.dir
            .write(files::SUMMARY, std::slice::from_ref(&summary))
            .await?;
        self.checkpoints.save(&self.checkpoint).await?;
        Ok(summary)
    }
}

/// Runs audit modes and remediation against one context.
pub struct Auditor {
    ctx: AuditContext,
}

impl Auditor {
    pub fn new(ctx: AuditContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &AuditContext {
        &self.ctx
    }

    /// Run, or resume, the full audit.
    ///
    /// With `restart` any unfinished checkpoint is discarded. A checkpoint
    /// that already reached `done` always starts a fresh run.
    pub async fn run_full(&self, restart: bool) -> AuditResult<AuditSummary> {
        let lease = self.acquire(RunMode::Full.as_str()).await?;
        let dir = self.ctx.mode_dir(RunMode::Full);

        let mut state = match self.open_state(dir.clone(), restart).await {
            Ok(state) => state,
            Err(e) => return self.finish(&dir, Some(lease), Err(e)).await,
        };

        let run = self.drive_full(&mut state, &lease).await;
        let stop = match &run {
            Ok(stop) => Some(*stop),
            Err(e) => {
                tracing::error!(
                    phase = %state.checkpoint.phase,
                    cursor = state.checkpoint.cursor,
                    error = %e,
                    "Full audit failed, checkpoint kept for resume"
                );
                None
            }
        };

        let completed = stop == Some(Stop::Completed);
        let interrupted = stop == Some(Stop::Interrupted);
        let flushed = state.flush(completed, interrupted).await;
        if completed {
            self.ctx
                .metrics
                .last_success_timestamp
                .set(OffsetDateTime::now_utc().unix_timestamp());
        }

        if let Ok(summary) = &flushed {
            if completed {
                tracing::info!(
                    versions_checked = summary.versions_checked,
                    manifest_entries_checked = summary.manifest_entries_checked,
                    missing_versions = summary.missing_versions,
                    missing_manifest_entries = summary.missing_manifest_entries,
                    apps_with_issues = summary.apps_with_issues,
                    "Full audit completed"
                );
            } else if interrupted {
                tracing::warn!(
                    phase = %summary.phase,
                    cursor = summary.cursor,
                    "Full audit interrupted, resume to continue"
                );
            }
        }

        let result = run.and(flushed);
        self.finish(&dir, Some(lease), result).await
    }

    /// Versions to soft-delete and store paths to purge.
    ///
    /// Returns `None` when the full audit had to run first and was
    /// interrupted.
    pub async fn run_unused(&self, input: Option<&Path>) -> AuditResult<Option<UnusedReport>> {
        let lease = self.acquire(RunMode::Unused.as_str()).await?;
        let dir = self.ctx.mode_dir(RunMode::Unused);

        let result = async {
            let Some(findings) = self.findings(input).await? else {
                return Ok(None);
            };
            let classified = classify_affected(self.ctx.catalog.as_ref(), &findings).await?;
            let unused_versions =
                find_unused_versions(self.ctx.catalog.as_ref(), &classified).await?;

            let walk = OrphanDetector::new(
                self.ctx.catalog.clone(),
                self.ctx.store.clone(),
                self.ctx.config.billing_scope,
                self.ctx.config.listing_concurrency,
            )
            .with_cancellation(self.ctx.cancel.clone())
            .detect()
            .await?;
            let orphans = walk.orphans;
            self.ctx.metrics.orphans_found.inc_by(orphans.len() as u64);

            dir.write(files::UNUSED_VERSIONS, &unused_versions).await?;
            dir.write(files::ORPHANS, &orphans).await?;
            tracing::info!(
                unused_versions = unused_versions.len(),
                orphans = orphans.len(),
                interrupted = walk.interrupted,
                "Unused audit finished"
            );
            Ok::<_, AuditError>(Some(UnusedReport {
                unused_versions,
                orphans,
                interrupted: walk.interrupted,
            }))
        }
        .await;

        self.finish(&dir, Some(lease), result).await
    }

    /// Versions whose manifest rows should be dropped in favor of the archive.
    pub async fn run_manifests(
        &self,
        input: Option<&Path>,
    ) -> AuditResult<Option<Vec<BrokenManifest>>> {
        let lease = self.acquire(RunMode::Manifests.as_str()).await?;
        let dir = self.ctx.mode_dir(RunMode::Manifests);

        let result = async {
            let Some(findings) = self.findings(input).await? else {
                return Ok(None);
            };
            let classified = classify_affected(self.ctx.catalog.as_ref(), &findings).await?;
            let broken = broken_manifests(&findings, &classified);
            dir.write(files::BROKEN_MANIFESTS, &broken).await?;
            tracing::info!(versions = broken.len(), "Manifest audit finished");
            Ok::<_, AuditError>(Some(broken))
        }
        .await;

        self.finish(&dir, Some(lease), result).await
    }

    /// Downgrade plan for channels pointing at broken versions.
    pub async fn run_default_channels(
        &self,
        input: Option<&Path>,
        all_channels: bool,
    ) -> AuditResult<Option<DowngradePlan>> {
        let lease = self.acquire(RunMode::DefaultChannels.as_str()).await?;
        let dir = self.ctx.mode_dir(RunMode::DefaultChannels);

        let result = async {
            let Some(findings) = self.findings(input).await? else {
                return Ok(None);
            };
            let classified = classify_affected(self.ctx.catalog.as_ref(), &findings).await?;
            let broken = broken_version_ids(&classified);
            let plan = Planner::new(self.ctx.catalog.clone(), self.ctx.store.clone(), &findings)
                .all_channels(all_channels)
                .plan(&broken)
                .await?;
            dir.write(files::DOWNGRADE_PLAN, &plan.entries()).await?;
            tracing::info!(
                broken_versions = broken.len(),
                candidates = plan.candidates.len(),
                no_candidates = plan.no_candidates.len(),
                "Default channel audit finished"
            );
            Ok::<_, AuditError>(Some(plan))
        }
        .await;

        self.finish(&dir, Some(lease), result).await
    }

    /// Execute a remediation action from a findings file.
    ///
    /// `input` defaults to the artifact the matching audit mode writes. Only
    /// an applying run takes a lease.
    pub async fn remediate(
        &self,
        action: RemediationAction,
        apply: bool,
        input: Option<&Path>,
    ) -> AuditResult<RemediationReport> {
        let source = match input {
            Some(path) => path.to_path_buf(),
            None => self.default_remediation_input(action),
        };
        if !tokio::fs::try_exists(&source)
            .await
            .map_err(|e| AuditError::artifact(&source, e))?
        {
            return Err(AuditError::MissingFindings(source));
        }

        let lease = if apply {
            Some(self.acquire(&format!("remediate-{action}")).await?)
        } else {
            None
        };
        let dir = ArtifactDir::new(self.ctx.config.artifacts_dir.join(REMEDIATION_DIR));

        let result = async {
            let executor = Executor::new(
                self.ctx.catalog.clone(),
                self.ctx.store.clone(),
                ExecutorOptions::from_config(&self.ctx.config, apply),
            )
            .with_metrics(self.ctx.metrics.clone())
            .with_cancellation(self.ctx.cancel.clone());

            tracing::info!(
                action = %action,
                apply,
                input = %source.display(),
                "Starting remediation"
            );
            let Execution { report, failure } = match action {
                RemediationAction::Downgrade => {
                    let plan = DowngradePlan::from_entries(read_records::<PlanEntry>(&source).await?);
                    if !plan.no_candidates.is_empty() {
                        tracing::warn!(
                            channels = plan.no_candidates.len(),
                            "Channels without a downgrade candidate need operator review"
                        );
                    }
                    executor.downgrade(&plan.candidates).await
                }
                RemediationAction::Manifests => {
                    let versions = read_records::<BrokenManifest>(&source).await?;
                    executor.cleanup_manifests(&versions).await
                }
                RemediationAction::SoftDelete => {
                    let versions = read_records::<UnusedVersion>(&source).await?;
                    executor.soft_delete(&versions).await
                }
                RemediationAction::PurgeOrphans => {
                    let orphans = read_records::<OrphanCandidate>(&source).await?;
                    executor.purge_orphans(&orphans).await
                }
            };
            let written = dir
                .write(&action.report_file(), std::slice::from_ref(&report))
                .await;
            if let Some(e) = failure {
                if let Err(write_error) = written {
                    tracing::warn!(
                        error = %write_error,
                        "Failed to write partial remediation report"
                    );
                }
                return Err(e);
            }
            written?;
            if report.interrupted {
                tracing::warn!(action = %action, "Remediation interrupted, re-run to continue");
            }
            Ok::<_, AuditError>(report)
        }
        .await;

        self.finish(&dir, lease, result).await
    }

    fn default_remediation_input(&self, action: RemediationAction) -> PathBuf {
        match action {
            RemediationAction::Downgrade => self
                .ctx
                .mode_dir(RunMode::DefaultChannels)
                .file(files::DOWNGRADE_PLAN),
            RemediationAction::Manifests => self
                .ctx
                .mode_dir(RunMode::Manifests)
                .file(files::BROKEN_MANIFESTS),
            RemediationAction::SoftDelete => self
                .ctx
                .mode_dir(RunMode::Unused)
                .file(files::UNUSED_VERSIONS),
            RemediationAction::PurgeOrphans => {
                self.ctx.mode_dir(RunMode::Unused).file(files::ORPHANS)
            }
        }
    }

    async fn acquire(&self, name: &str) -> AuditResult<RunLease> {
        RunLease::acquire(self.ctx.catalog.clone(), name, self.ctx.config.lease_ttl()).await
    }

    /// Shared tail of every run: metrics file, then lease release.
    async fn finish<T>(
        &self,
        dir: &ArtifactDir,
        lease: Option<RunLease>,
        result: AuditResult<T>,
    ) -> AuditResult<T> {
        let metrics = match self.ctx.metrics.render() {
            Ok(text) => dir.write_text(files::METRICS, text).await,
            Err(e) => Err(e),
        };
        if let Err(e) = &metrics {
            tracing::warn!(error = %e, "Failed to write metrics file");
        }
        let released = match lease {
            Some(lease) => lease.release().await,
            None => Ok(()),
        };

        let value = result?;
        metrics?;
        released?;
        Ok(value)
    }

    /// Findings from `input`, or from the full audit's directory, running the
    /// full audit first when it has not completed.
    async fn findings(&self, input: Option<&Path>) -> AuditResult<Option<Findings>> {
        if let Some(dir) = input {
            return Findings::load(dir).await.map(Some);
        }

        let dir = self.ctx.mode_dir(RunMode::Full);
        match Findings::load(dir.path()).await {
            Ok(findings) => Ok(Some(findings)),
            Err(AuditError::MissingFindings(_)) => {
                tracing::info!("No completed full audit, running it first");
                if !self.run_full(false).await?.completed {
                    return Ok(None);
                }
                Findings::load(dir.path()).await.map(Some)
            }
            Err(e) => Err(e),
        }
    }

    async fn open_state(&self, dir: ArtifactDir, restart: bool) -> AuditResult<FullState> {
        let mut state = FullState::fresh(dir);
        if restart {
            tracing::info!("Restart requested, discarding checkpoint");
            return Ok(state);
        }

        match state.checkpoints.load().await? {
            Some(checkpoint) if !checkpoint.is_done() => {
                let versions = state
                    .dir
                    .read::<MissingVersion>(files::MISSING_VERSIONS)
                    .await?
                    .unwrap_or_default();
                let manifests = state
                    .dir
                    .read::<MissingManifest>(files::MISSING_MANIFESTS)
                    .await?
                    .unwrap_or_default();
                tracing::info!(
                    phase = %checkpoint.phase,
                    cursor = checkpoint.cursor,
                    pages = checkpoint.counters.pages,
                    "Resuming full audit"
                );
                state.checkpoint = checkpoint;
                state.missing_versions = versions.into_iter().map(|v| (v.version_id, v)).collect();
                state.missing_manifests = manifests.into_iter().map(|m| (m.entry_id, m)).collect();
            }
            Some(_) => tracing::info!("Previous full audit finished, starting a new one"),
            None => {}
        }
        Ok(state)
    }

    async fn prepare_lookup(&self, filter: &VersionFilter) -> AuditResult<Lookup> {
        let config = &self.ctx.config;
        let catalog_items = match config.index_strategy {
            IndexStrategy::Auto => {
                self.ctx.catalog.count_versions(filter).await?
                    + self.ctx.catalog.count_manifest_entries(filter).await?
            }
            _ => 0,
        };

        match choose_lookup(
            config.index_strategy,
            self.ctx.scoped(),
            catalog_items,
            config.index_threshold,
        ) {
            LookupKind::Point => {
                tracing::info!(catalog_items, "Using point lookups");
                Ok(Lookup::Point)
            }
            LookupKind::Index => {
                let prefixes: Vec<String> = self
                    .ctx
                    .catalog
                    .list_org_ids(config.billing_scope)
                    .await?
                    .iter()
                    .map(|org| org_prefix(org))
                    .collect();
                let index = Indexer::new(self.ctx.store.clone(), config.listing_concurrency)
                    .build_index(&prefixes)
                    .await?;
                tracing::info!(
                    catalog_items,
                    organizations = prefixes.len(),
                    keys = index.len(),
                    "Using key index"
                );
                Ok(Lookup::Index(Arc::new(index)))
            }
        }
    }

    async fn drive_full(&self, state: &mut FullState, lease: &RunLease) -> AuditResult<Stop> {
        if state.checkpoint.is_done() {
            return Ok(Stop::Completed);
        }

        let filter = VersionFilter::new(self.ctx.config.billing_scope);
        let lookup = self.prepare_lookup(&filter).await?;
        state.lookup = lookup.kind();

        let verifier = Verifier::new(self.ctx.store.clone(), self.ctx.config.verify_concurrency)
            .with_metrics(self.ctx.metrics.clone());
        let page_size = self.ctx.config.page_size.max(1);

        while state.checkpoint.phase == Phase::Versions {
            if self.ctx.cancel.is_cancelled() {
                return Ok(Stop::Interrupted);
            }
            let page = self
                .ctx
                .catalog
                .list_versions_page(state.checkpoint.cursor, page_size, &filter)
                .await?;
            let (Some(first), Some(last)) = (page.first(), page.last()) else {
                state.checkpoint.enter(Phase::Manifests)?;
                state.flush(false, false).await?;
                break;
            };
            let mark = PageMark {
                phase: Phase::Versions,
                first_id: first.id,
                last_id: last.id,
                items: page.len(),
            };

            let items: Vec<CheckItem> = page
                .iter()
                .filter_map(|v| v.storage_path.as_ref().map(|p| CheckItem::new(v.id, p.clone())))
                .collect();
            let outcome = verifier.verify(items, &lookup).await?;

            let rows: HashMap<i64, _> = page.iter().map(|v| (v.id, v)).collect();
            for item in &outcome.missing {
                let Some(version) = rows.get(&item.catalog_id) else {
                    continue;
                };
                self.ctx
                    .metrics
                    .confirmed_missing
                    .with_label_values(&["version"])
                    .inc();
                state.missing_versions.insert(
                    version.id,
                    MissingVersion {
                        version_id: version.id,
                        app_id: version.app_id.clone(),
                        owner_org: version.owner_org.clone(),
                        name: version.name.clone(),
                        storage_path: item.key.clone(),
                    },
                );
            }

            state.checkpoint.counters.versions_checked += outcome.checked as u64;
            self.end_page(state, lease, mark).await?;
        }

        while state.checkpoint.phase == Phase::Manifests {
            if self.ctx.cancel.is_cancelled() {
                return Ok(Stop::Interrupted);
            }
            let page = self
                .ctx
                .catalog
                .list_manifest_entries_page(state.checkpoint.cursor, page_size, &filter)
                .await?;
            let (Some(first), Some(last)) = (page.first(), page.last()) else {
                state.checkpoint.enter(Phase::Done)?;
                return Ok(Stop::Completed);
            };
            let mark = PageMark {
                phase: Phase::Manifests,
                first_id: first.id,
                last_id: last.id,
                items: page.len(),
            };

            let items: Vec<CheckItem> = page
                .iter()
                .map(|e| CheckItem::new(e.id, e.s3_path.clone()))
                .collect();
            let outcome = verifier.verify(items, &lookup).await?;

            if !outcome.missing.is_empty() {
                let entries: HashMap<i64, _> = page.iter().map(|e| (e.id, e)).collect();
                let mut version_ids: Vec<i64> = outcome
                    .missing
                    .iter()
                    .filter_map(|item| entries.get(&item.catalog_id).map(|e| e.app_version_id))
                    .collect();
                version_ids.sort_unstable();
                version_ids.dedup();
                let versions: HashMap<i64, _> = self
                    .ctx
                    .catalog
                    .get_versions_by_ids(&version_ids)
                    .await?
                    .into_iter()
                    .map(|v| (v.id, v))
                    .collect();

                for item in &outcome.missing {
                    let Some(entry) = entries.get(&item.catalog_id) else {
                        continue;
                    };
                    let Some(version) = versions.get(&entry.app_version_id) else {
                        continue;
                    };
                    self.ctx
                        .metrics
                        .confirmed_missing
                        .with_label_values(&["manifest_entry"])
                        .inc();
                    state.missing_manifests.insert(
                        entry.id,
                        MissingManifest {
                            entry_id: entry.id,
                            version_id: version.id,
                            app_id: version.app_id.clone(),
                            owner_org: version.owner_org.clone(),
                            s3_path: entry.s3_path.clone(),
                        },
                    );
                }
            }

            state.checkpoint.counters.manifest_entries_checked += outcome.checked as u64;
            self.end_page(state, lease, mark).await?;
        }

        Ok(Stop::Completed)
    }

    /// Commit a verified page: move the cursor, flush, renew the lease.
    async fn end_page(
        &self,
        state: &mut FullState,
        lease: &RunLease,
        mark: PageMark,
    ) -> AuditResult<()> {
        state.checkpoint.advance(mark.last_id)?;
        state.checkpoint.counters.pages += 1;
        state.flush(false, false).await?;
        lease.renew().await?;

        self.ctx
            .metrics
            .pages_processed
            .with_label_values(&[&mark.phase.to_string()])
            .inc();
        if let Some(observer) = &self.ctx.observer {
            observer.on_page(mark.phase, mark.first_id, mark.last_id, mark.items);
        }

        let counters = &state.checkpoint.counters;
        tracing::info!(
            phase = %mark.phase,
            cursor = mark.last_id,
            pages = counters.pages,
            versions_checked = counters.versions_checked,
            manifest_entries_checked = counters.manifest_entries_checked,
            missing_versions = state.missing_versions.len(),
            missing_manifest_entries = state.missing_manifests.len(),
            "Page processed"
        );
        Ok(())
    }
}

//! Store-side orphans and catalog-side unused versions.
//!
//! The orphan walk goes top-down, organization -> app -> version, comparing
//! one-level store listings with what the catalog keeps alive. An orphaned
//! subtree is reported once and never descended into. Version folders are
//! never listed, so delta sub-paths are only ever judged together with their
//! parent version. Listings go through the [`Indexer`], which fans out
//! over an organization's apps.

use crate::artifacts::ArtifactRecord;
use crate::error::AuditResult;
use crate::findings::{ClassifiedVersion, broken_version_ids};
use crate::indexer::Indexer;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use stowage_catalog::CatalogStore;
use stowage_catalog::repos::{ManifestRepo, OrgRepo, VersionRepo};
use stowage_core::BillingScope;
use stowage_core::layout::{
    DELTA_COMPONENT, LEGACY_ROOT, ORGS_ROOT, app_prefix, org_prefix, version_folder_of,
};
use stowage_storage::ObjectStore;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrphanLevel {
    Organization,
    App,
    Version,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrphanReason {
    /// Anything under the legacy `apps/` root.
    LegacyLayout,
    /// No catalog organization with this id.
    UnknownOrganization,
    /// The organization has no version storing anything.
    InactiveOrganization,
    InactiveApp,
    UnreferencedArchive,
    UnreferencedManifestTree,
}

/// A store path with no active catalog reference.
///
/// `path` ends with `/` when the candidate is a whole subtree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrphanCandidate {
    pub path: String,
    pub level: OrphanLevel,
    pub reason: OrphanReason,
    pub org_id: Option<String>,
    pub app_id: Option<String>,
}

impl ArtifactRecord for OrphanCandidate {
    const KIND: &'static str = "orphan_candidate";
}

impl OrphanCandidate {
    pub fn is_subtree(&self) -> bool {
        self.path.ends_with('/')
    }
}

/// A broken catalog version nothing points at.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnusedVersion {
    pub version_id: i64,
    pub app_id: String,
    pub owner_org: String,
    pub name: String,
    pub storage_path: Option<String>,
}

impl ArtifactRecord for UnusedVersion {
    const KIND: &'static str = "unused_version";
}

/// What one organization's catalog rows keep alive in the store.
#[derive(Debug, Default)]
pub struct OrgActivity {
    apps: HashSet<String>,
    archives: HashSet<String>,
    /// `orgs/{org}/apps/{app}/{version}` folders, without trailing slash.
    version_folders: HashSet<String>,
    /// Active paths outside the canonical layout, matched by prefix.
    other_paths: Vec<String>,
}

impl OrgActivity {
    /// Build from the organization's non-deleted versions. A version counts
    /// when it has a storage path or at least one manifest entry. Every
    /// manifest path is considered, since one version may reference files
    /// under several version folders.
    pub async fn load(catalog: &dyn CatalogStore, org_id: &str) -> AuditResult<Self> {
        let versions = catalog.list_active_versions_for_org(org_id).await?;
        let ids: Vec<i64> = versions.iter().map(|v| v.id).collect();
        let manifests = catalog.manifest_paths(&ids).await?;

        let mut activity = Self::default();
        for version in &versions {
            let paths = version
                .storage_path
                .iter()
                .chain(manifests.get(&version.id).into_iter().flatten())
                .collect::<Vec<_>>();
            if paths.is_empty() {
                continue;
            }
            activity.apps.insert(version.app_id.clone());
            if let Some(archive) = &version.storage_path {
                activity.archives.insert(archive.clone());
            }
            for path in paths {
                match version_folder_of(path) {
                    Some(folder) => {
                        activity.version_folders.insert(folder);
                    }
                    None => activity.other_paths.push(path.clone()),
                }
            }
        }
        Ok(activity)
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }

    pub fn has_app(&self, app_id: &str) -> bool {
        self.apps.contains(app_id)
    }

    /// An archive is covered by an exact active storage path or by an active
    /// version folder of the same name.
    pub fn covers_archive(&self, key: &str) -> bool {
        self.archives.contains(key)
            || version_folder_of(key).is_some_and(|folder| self.version_folders.contains(&folder))
            || self.other_paths.iter().any(|p| p == key)
    }

    /// A version folder is covered by an active manifest path under it, by
    /// its corresponding archive, or by any active path it prefixes.
    pub fn covers_folder(&self, folder_prefix: &str) -> bool {
        let folder = folder_prefix.trim_end_matches('/');
        self.version_folders.contains(folder)
            || self.archives.contains(&format!("{folder}.zip"))
            || self
                .archives
                .iter()
                .chain(self.other_paths.iter())
                .any(|p| p.starts_with(folder_prefix))
    }

    /// Whether a previously reported candidate is now referenced.
    pub fn covers(&self, candidate: &OrphanCandidate) -> bool {
        match candidate.level {
            OrphanLevel::Organization => !self.is_empty(),
            OrphanLevel::App => candidate.app_id.as_deref().is_some_and(|a| self.has_app(a)),
            OrphanLevel::Version if candidate.is_subtree() => self.covers_folder(&candidate.path),
            OrphanLevel::Version => self.covers_archive(&candidate.path),
        }
    }
}

/// Result of one orphan walk.
#[derive(Clone, Debug, Default)]
pub struct OrphanWalk {
    /// Candidates ordered by path.
    pub orphans: Vec<OrphanCandidate>,
    /// Cancelled before every in-scope organization was walked.
    pub interrupted: bool,
}

/// Finds store paths the catalog no longer references.
pub struct OrphanDetector {
    catalog: Arc<dyn CatalogStore>,
    indexer: Indexer,
    scope: BillingScope,
    cancel: CancellationToken,
}

impl OrphanDetector {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        store: Arc<dyn ObjectStore>,
        scope: BillingScope,
        concurrency: usize,
    ) -> Self {
        Self {
            catalog,
            indexer: Indexer::new(store, concurrency),
            scope,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop between organizations once `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Walk the store and return every orphan candidate.
    ///
    /// Organizations are walked one at a time, their apps concurrently.
    /// Organizations outside the billing scope are not walked. On
    /// cancellation the candidates found so far are returned.
    pub async fn detect(&self) -> AuditResult<OrphanWalk> {
        let mut walk = OrphanWalk {
            orphans: self.legacy_orphans().await?,
            interrupted: false,
        };

        let known: HashSet<String> = self
            .catalog
            .list_org_ids(BillingScope::All)
            .await?
            .into_iter()
            .collect();
        let scoped: HashSet<String> = self
            .catalog
            .list_org_ids(self.scope)
            .await?
            .into_iter()
            .collect();

        let root = self.indexer.list_folders(ORGS_ROOT).await?;
        let mut to_walk = Vec::new();
        for org_id in root.folders {
            if !known.contains(&org_id) {
                walk.orphans.push(OrphanCandidate {
                    path: org_prefix(&org_id),
                    level: OrphanLevel::Organization,
                    reason: OrphanReason::UnknownOrganization,
                    org_id: Some(org_id),
                    app_id: None,
                });
            } else if scoped.contains(&org_id) {
                to_walk.push(org_id);
            } else {
                tracing::debug!(org_id = %org_id, "Organization outside audit scope, not walked");
            }
        }

        for org_id in &to_walk {
            if self.cancel.is_cancelled() {
                tracing::warn!(org_id = %org_id, "Orphan walk cancelled");
                walk.interrupted = true;
                break;
            }
            walk.orphans.extend(self.walk_org(org_id).await?);
        }

        walk.orphans.sort_by(|a, b| a.path.cmp(&b.path));
        tracing::info!(
            orphans = walk.orphans.len(),
            interrupted = walk.interrupted,
            "Orphan walk finished"
        );
        Ok(walk)
    }

    /// Every immediate child of the legacy root.
    async fn legacy_orphans(&self) -> AuditResult<Vec<OrphanCandidate>> {
        let root = self.indexer.list_folders("").await?;
        let legacy_folder = LEGACY_ROOT.trim_end_matches('/');
        if !root.folders.iter().any(|f| f == legacy_folder) {
            return Ok(Vec::new());
        }

        let listing = self.indexer.list_folders(LEGACY_ROOT).await?;
        let folders = listing
            .folders
            .into_iter()
            .map(|f| format!("{LEGACY_ROOT}{f}/"));
        let objects = listing
            .objects
            .into_iter()
            .map(|o| format!("{LEGACY_ROOT}{o}"));

        Ok(folders
            .chain(objects)
            .map(|path| OrphanCandidate {
                path,
                level: OrphanLevel::Organization,
                reason: OrphanReason::LegacyLayout,
                org_id: None,
                app_id: None,
            })
            .collect())
    }

    async fn walk_org(&self, org_id: &str) -> AuditResult<Vec<OrphanCandidate>> {
        let activity = OrgActivity::load(self.catalog.as_ref(), org_id).await?;
        if activity.is_empty() {
            return Ok(vec![OrphanCandidate {
                path: org_prefix(org_id),
                level: OrphanLevel::Organization,
                reason: OrphanReason::InactiveOrganization,
                org_id: Some(org_id.to_string()),
                app_id: None,
            }]);
        }

        let candidate = |path: String, app_id: &str, level, reason| OrphanCandidate {
            path,
            level,
            reason,
            org_id: Some(org_id.to_string()),
            app_id: Some(app_id.to_string()),
        };

        let mut orphans = Vec::new();
        let apps = self
            .indexer
            .list_folders(&format!("{}apps/", org_prefix(org_id)))
            .await?;

        let mut active_apps: HashMap<String, String> = HashMap::new();
        for app_id in apps.folders {
            let prefix = app_prefix(org_id, &app_id);
            if activity.has_app(&app_id) {
                active_apps.insert(prefix, app_id);
            } else {
                orphans.push(candidate(
                    prefix,
                    &app_id,
                    OrphanLevel::App,
                    OrphanReason::InactiveApp,
                ));
            }
        }

        let prefixes: Vec<String> = active_apps.keys().cloned().collect();
        let listings = self.indexer.list_folders_scoped(&prefixes).await?;
        for (prefix, versions) in listings {
            let Some(app_id) = active_apps.get(&prefix) else {
                continue;
            };
            for object in versions.objects {
                let key = format!("{prefix}{object}");
                if !activity.covers_archive(&key) {
                    orphans.push(candidate(
                        key,
                        app_id,
                        OrphanLevel::Version,
                        OrphanReason::UnreferencedArchive,
                    ));
                }
            }
            for folder in versions.folders {
                if folder == DELTA_COMPONENT {
                    continue;
                }
                let folder_prefix = format!("{prefix}{folder}/");
                if !activity.covers_folder(&folder_prefix) {
                    orphans.push(candidate(
                        folder_prefix,
                        app_id,
                        OrphanLevel::Version,
                        OrphanReason::UnreferencedManifestTree,
                    ));
                }
            }
        }

        tracing::debug!(org_id = %org_id, orphans = orphans.len(), "Walked organization");
        Ok(orphans)
    }
}

/// Broken versions with no channel pointer and no deploy history.
pub async fn find_unused_versions(
    catalog: &dyn CatalogStore,
    classified: &[ClassifiedVersion],
) -> AuditResult<Vec<UnusedVersion>> {
    let broken = broken_version_ids(classified);
    if broken.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<i64> = broken.iter().copied().collect();
    let referenced = catalog.referenced_version_ids(&ids).await?;

    Ok(classified
        .iter()
        .filter(|c| broken.contains(&c.version.id) && !referenced.contains(&c.version.id))
        .map(|c| UnusedVersion {
            version_id: c.version.id,
            app_id: c.version.app_id.clone(),
            owner_org: c.version.owner_org.clone(),
            name: c.version.name.clone(),
            storage_path: c.version.storage_path.clone(),
        })
        .collect())
}

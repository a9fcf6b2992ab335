//! Findings of the full audit and version classification.

use crate::artifacts::{ArtifactDir, ArtifactRecord, files};
use crate::checkpoint::{CheckpointStore, Phase};
use crate::error::{AuditError, AuditResult};
use crate::verifier::LookupKind;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use stowage_catalog::CatalogStore;
use stowage_catalog::models::VersionRow;
use stowage_catalog::repos::{ManifestRepo, VersionRepo};
use time::OffsetDateTime;

/// A version whose bundle archive the store reported absent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingVersion {
    pub version_id: i64,
    pub app_id: String,
    pub owner_org: String,
    pub name: String,
    pub storage_path: String,
}

impl ArtifactRecord for MissingVersion {
    const KIND: &'static str = "missing_version";
}

/// A manifest entry whose file the store reported absent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingManifest {
    pub entry_id: i64,
    pub version_id: i64,
    pub app_id: String,
    pub owner_org: String,
    pub s3_path: String,
}

impl ArtifactRecord for MissingManifest {
    const KIND: &'static str = "missing_manifest";
}

/// Per-app rollup of findings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppWithIssues {
    pub app_id: String,
    pub owner_org: String,
    pub missing_versions: u64,
    pub versions_with_missing_manifests: u64,
    pub missing_manifest_entries: u64,
}

impl ArtifactRecord for AppWithIssues {
    const KIND: &'static str = "app_with_issues";
}

/// Running summary of a full audit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditSummary {
    pub lookup: LookupKind,
    pub phase: Phase,
    pub cursor: i64,
    pub pages: u64,
    pub versions_checked: u64,
    pub manifest_entries_checked: u64,
    pub missing_versions: u64,
    pub missing_manifest_entries: u64,
    pub apps_with_issues: u64,
    pub completed: bool,
    pub interrupted: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl ArtifactRecord for AuditSummary {
    const KIND: &'static str = "summary";
}

/// Health of one catalog version.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionHealth {
    Deleted,
    /// Nothing is expected in the store.
    Empty,
    Intact,
    /// Archive missing while some manifest files survive.
    ArchiveMissing,
    /// Some manifest files missing, no archive to fall back on.
    ManifestBroken,
    /// Manifest files missing but the archive is intact.
    ManifestCleanup,
    /// Nothing the version needs can be found.
    Broken,
}

/// Findings of a full audit, keyed by catalog id.
#[derive(Clone, Debug, Default)]
pub struct Findings {
    pub missing_versions: BTreeMap<i64, MissingVersion>,
    pub missing_manifests: BTreeMap<i64, MissingManifest>,
    missing_per_version: HashMap<i64, u64>,
}

impl Findings {
    /// Load the findings of a completed full audit from `dir`.
    ///
    /// Fails with `MissingFindings` when the directory holds no finished run.
    pub async fn load(dir: &Path) -> AuditResult<Self> {
        let artifacts = ArtifactDir::new(dir);
        let checkpoint = CheckpointStore::new(artifacts.clone()).load().await?;
        if !checkpoint.is_some_and(|c| c.is_done()) {
            return Err(AuditError::MissingFindings(dir.to_path_buf()));
        }

        let versions = artifacts
            .read::<MissingVersion>(files::MISSING_VERSIONS)
            .await?
            .ok_or_else(|| AuditError::MissingFindings(dir.to_path_buf()))?;
        let manifests = artifacts
            .read::<MissingManifest>(files::MISSING_MANIFESTS)
            .await?
            .ok_or_else(|| AuditError::MissingFindings(dir.to_path_buf()))?;

        Ok(Self::from_records(versions, manifests))
    }

    pub fn from_records(versions: Vec<MissingVersion>, manifests: Vec<MissingManifest>) -> Self {
        let mut missing_per_version = HashMap::new();
        for entry in &manifests {
            *missing_per_version.entry(entry.version_id).or_insert(0) += 1;
        }
        Self {
            missing_versions: versions.into_iter().map(|v| (v.version_id, v)).collect(),
            missing_manifests: manifests.into_iter().map(|m| (m.entry_id, m)).collect(),
            missing_per_version,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.missing_versions.is_empty() && self.missing_manifests.is_empty()
    }

    /// Ids of every version with at least one finding.
    pub fn affected_version_ids(&self) -> BTreeSet<i64> {
        self.missing_versions
            .keys()
            .copied()
            .chain(self.missing_manifests.values().map(|m| m.version_id))
            .collect()
    }

    /// Missing manifest entries per version.
    pub fn missing_entries(&self, version_id: i64) -> u64 {
        self.missing_per_version
            .get(&version_id)
            .copied()
            .unwrap_or(0)
    }

    /// Classify a version given how many manifest entry rows it has.
    pub fn health(&self, version: &VersionRow, manifest_entries: u64) -> VersionHealth {
        classify(
            version,
            self.missing_versions.contains_key(&version.id),
            manifest_entries,
            self.missing_entries(version.id),
        )
    }
}

/// Classification rules.
///
/// A version is broken when its archive is missing or absent and, if it has
/// manifest entries, every one of them is missing too.
pub fn classify(
    version: &VersionRow,
    archive_missing: bool,
    manifest_entries: u64,
    missing_entries: u64,
) -> VersionHealth {
    if version.deleted {
        return VersionHealth::Deleted;
    }
    let has_archive = version.storage_path.is_some();
    let archive_ok = has_archive && !archive_missing;
    if !has_archive && manifest_entries == 0 {
        return VersionHealth::Empty;
    }

    let all_entries_missing = manifest_entries == 0 || missing_entries >= manifest_entries;
    match (archive_ok, missing_entries > 0) {
        (false, _) if all_entries_missing => VersionHealth::Broken,
        (false, _) if archive_missing => VersionHealth::ArchiveMissing,
        (false, true) => VersionHealth::ManifestBroken,
        (false, false) => VersionHealth::Intact,
        (true, true) => VersionHealth::ManifestCleanup,
        (true, false) => VersionHealth::Intact,
    }
}

/// A version whose manifest tree is broken while its archive is intact.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokenManifest {
    pub version_id: i64,
    pub app_id: String,
    pub owner_org: String,
    pub name: String,
    pub storage_path: Option<String>,
    pub manifest_entries: u64,
    pub missing_entries: u64,
}

impl ArtifactRecord for BrokenManifest {
    const KIND: &'static str = "broken_manifest";
}

/// A catalog version with its classification.
#[derive(Clone, Debug)]
pub struct ClassifiedVersion {
    pub version: VersionRow,
    pub manifest_entries: u64,
    pub health: VersionHealth,
}

/// Classify every version the findings mention, reading current catalog rows.
pub async fn classify_affected(
    catalog: &dyn CatalogStore,
    findings: &Findings,
) -> AuditResult<Vec<ClassifiedVersion>> {
    let ids: Vec<i64> = findings.affected_version_ids().into_iter().collect();
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let versions = catalog.get_versions_by_ids(&ids).await?;
    let entry_counts = catalog.manifest_entry_counts(&ids).await?;
    Ok(versions
        .into_iter()
        .map(|version| {
            let manifest_entries = entry_counts.get(&version.id).copied().unwrap_or(0);
            let health = findings.health(&version, manifest_entries);
            ClassifiedVersion {
                version,
                manifest_entries,
                health,
            }
        })
        .collect())
}

/// Versions whose manifest cleanup would leave them intact.
pub fn broken_manifests(findings: &Findings, classified: &[ClassifiedVersion]) -> Vec<BrokenManifest> {
    classified
        .iter()
        .filter(|c| c.health == VersionHealth::ManifestCleanup)
        .map(|c| BrokenManifest {
            version_id: c.version.id,
            app_id: c.version.app_id.clone(),
            owner_org: c.version.owner_org.clone(),
            name: c.version.name.clone(),
            storage_path: c.version.storage_path.clone(),
            manifest_entries: c.manifest_entries,
            missing_entries: findings.missing_entries(c.version.id),
        })
        .collect()
}

/// Ids of versions classified broken.
pub fn broken_version_ids(classified: &[ClassifiedVersion]) -> BTreeSet<i64> {
    classified
        .iter()
        .filter(|c| c.health == VersionHealth::Broken)
        .map(|c| c.version.id)
        .collect()
}

/// Roll findings up per app.
pub fn apps_with_issues(
    missing_versions: &BTreeMap<i64, MissingVersion>,
    missing_manifests: &BTreeMap<i64, MissingManifest>,
) -> Vec<AppWithIssues> {
    let mut apps: BTreeMap<(String, String), AppWithIssues> = BTreeMap::new();

    for version in missing_versions.values() {
        apps.entry((version.owner_org.clone(), version.app_id.clone()))
            .or_insert_with(|| empty_rollup(&version.owner_org, &version.app_id))
            .missing_versions += 1;
    }

    let mut seen_versions = BTreeSet::new();
    for manifest in missing_manifests.values() {
        let rollup = apps
            .entry((manifest.owner_org.clone(), manifest.app_id.clone()))
            .or_insert_with(|| empty_rollup(&manifest.owner_org, &manifest.app_id));
        rollup.missing_manifest_entries += 1;
        if seen_versions.insert(manifest.version_id) {
            rollup.versions_with_missing_manifests += 1;
        }
    }

    apps.into_values().collect()
}

fn empty_rollup(org: &str, app: &str) -> AppWithIssues {
    AppWithIssues {
        app_id: app.to_string(),
        owner_org: org.to_string(),
        missing_versions: 0,
        versions_with_missing_manifests: 0,
        missing_manifest_entries: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version(storage_path: Option<&str>) -> VersionRow {
        VersionRow {
            id: 7,
            app_id: "com.acme.app".to_string(),
            owner_org: "o1".to_string(),
            name: "1.0.0".to_string(),
            deleted: false,
            storage_path: storage_path.map(str::to_string),
            manifest_count: 0,
        }
    }

    const ARCHIVE: Option<&str> = Some("orgs/o1/apps/com.acme.app/1.0.0.zip");

    #[test]
    fn archive_only_versions() {
        assert_eq!(classify(&version(ARCHIVE), false, 0, 0), VersionHealth::Intact);
        assert_eq!(classify(&version(ARCHIVE), true, 0, 0), VersionHealth::Broken);
    }

    #[test]
    fn manifest_rules() {
        // Archive intact, manifest partly gone: only the manifest needs cleanup
        assert_eq!(
            classify(&version(ARCHIVE), false, 4, 1),
            VersionHealth::ManifestCleanup
        );
        // Archive gone but some manifest files survive
        assert_eq!(
            classify(&version(ARCHIVE), true, 4, 1),
            VersionHealth::ArchiveMissing
        );
        assert_eq!(classify(&version(ARCHIVE), true, 4, 4), VersionHealth::Broken);
        assert_eq!(classify(&version(None), false, 4, 4), VersionHealth::Broken);
        assert_eq!(
            classify(&version(None), false, 4, 2),
            VersionHealth::ManifestBroken
        );
        assert_eq!(classify(&version(None), false, 4, 0), VersionHealth::Intact);
    }

    #[test]
    fn deleted_and_empty() {
        let mut deleted = version(ARCHIVE);
        deleted.deleted = true;
        assert_eq!(classify(&deleted, true, 0, 0), VersionHealth::Deleted);
        assert_eq!(classify(&version(None), false, 0, 0), VersionHealth::Empty);
    }

    #[test]
    fn rollup_counts_versions_once() {
        let findings = Findings::from_records(
            vec![MissingVersion {
                version_id: 1,
                app_id: "a".to_string(),
                owner_org: "o".to_string(),
                name: "1.0.0".to_string(),
                storage_path: "orgs/o/apps/a/1.0.0.zip".to_string(),
            }],
            (10..13)
                .map(|entry_id| MissingManifest {
                    entry_id,
                    version_id: 2,
                    app_id: "a".to_string(),
                    owner_org: "o".to_string(),
                    s3_path: format!("orgs/o/apps/a/2.0.0/{entry_id}.js"),
                })
                .collect(),
        );

        let apps = apps_with_issues(&findings.missing_versions, &findings.missing_manifests);
        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].missing_versions, 1);
        assert_eq!(apps[0].versions_with_missing_manifests, 1);
        assert_eq!(apps[0].missing_manifest_entries, 3);
        assert_eq!(findings.missing_entries(2), 3);
        assert_eq!(findings.missing_entries(1), 0);
        assert_eq!(
            findings.affected_version_ids().into_iter().collect::<Vec<_>>(),
            vec![1, 2]
        );
    }
}

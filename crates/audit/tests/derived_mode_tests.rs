// Planning modes that read the full audit's findings

mod common;

use common::{APP, Archive, Harness, ORG};
use stowage_audit::artifacts::{ArtifactDir, files, read_records};
use stowage_audit::findings::BrokenManifest;
use stowage_audit::orphans::{OrphanLevel, OrphanReason};
use stowage_audit::planner::PlanEntry;
use stowage_audit::{AuditError, Auditor, CancellationToken, OrphanCandidate, RunMode};
use stowage_catalog::repos::VersionRepo;
use stowage_core::archive_key;

#[tokio::test]
async fn downgrade_picks_newest_intact_predecessor() {
    let h = Harness::acme().await;

    // No completed full audit yet, so it runs first.
    let plan = h
        .auditor()
        .run_default_channels(None, false)
        .await
        .unwrap()
        .unwrap();

    assert!(plan.no_candidates.is_empty());
    assert_eq!(plan.candidates.len(), 1);
    let candidate = &plan.candidates[0];
    assert_eq!(candidate.channel_id, 1);
    assert_eq!(candidate.channel_name, "production");
    assert!(candidate.is_default);
    assert_eq!(candidate.broken_version_id, 42);
    assert_eq!(candidate.replacement_version_id, 41);
    assert_eq!(candidate.replacement_version_name, "1.0.41");

    let dir = ArtifactDir::new(h.config.artifacts_dir.join(RunMode::DefaultChannels.as_str()));
    let entries: Vec<PlanEntry> = read_records(&dir.file(files::DOWNGRADE_PLAN))
        .await
        .unwrap();
    assert_eq!(entries, vec![PlanEntry::Candidate(candidate.clone())]);
}

#[tokio::test]
async fn replacement_must_still_be_in_store() {
    let h = Harness::acme().await;
    h.auditor().run_full(false).await.unwrap();

    // Gone after the audit: the planner's live check catches it.
    h.store.remove(&archive_key(ORG, APP, "1.0.41"));
    let plan = h
        .auditor()
        .run_default_channels(None, false)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(plan.candidates[0].replacement_version_id, 40);
}

#[tokio::test]
async fn channel_without_intact_history_has_no_candidate() {
    let h = Harness::new().await;
    h.version(42, "1.0.42", Archive::Lost).await;
    h.channel(1, "production", 42).await;
    h.deploy(1, 1, 42, 1).await;

    let plan = h
        .auditor()
        .run_default_channels(None, false)
        .await
        .unwrap()
        .unwrap();
    assert!(plan.candidates.is_empty());
    assert_eq!(plan.no_candidates.len(), 1);
    assert_eq!(plan.no_candidates[0].channel_id, 1);
    assert_eq!(plan.no_candidates[0].history_entries, 1);
}

#[tokio::test]
async fn non_default_channels_need_opt_in() {
    let h = Harness::acme().await;
    h.channel(2, "beta", 42).await;
    h.deploy(4, 2, 40, 4).await;
    h.deploy(5, 2, 42, 5).await;

    let plan = h
        .auditor()
        .run_default_channels(None, false)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(plan.candidates.len(), 1);

    let plan = h
        .auditor()
        .run_default_channels(None, true)
        .await
        .unwrap()
        .unwrap();
    let mut planned: Vec<(i64, i64)> = plan
        .candidates
        .iter()
        .map(|c| (c.channel_id, c.replacement_version_id))
        .collect();
    planned.sort_unstable();
    assert_eq!(planned, vec![(1, 41), (2, 40)]);
}

#[tokio::test]
async fn explicit_input_requires_completed_findings() {
    let h = Harness::acme().await;
    let empty = h.dir.path().join("nowhere");

    let err = h
        .auditor()
        .run_default_channels(Some(&empty), false)
        .await
        .unwrap_err();
    assert!(matches!(err, AuditError::MissingFindings(_)));
}

#[tokio::test]
async fn unused_versions_exclude_referenced_ones() {
    let h = Harness::acme().await;
    h.version(43, "1.0.43", Archive::Lost).await;

    let report = h.auditor().run_unused(None).await.unwrap().unwrap();
    let ids: Vec<i64> = report.unused_versions.iter().map(|v| v.version_id).collect();
    // 42 is broken too, but the production channel still points at it.
    assert_eq!(ids, vec![43]);
}

#[tokio::test]
async fn orphan_walk_reports_each_subtree_once() {
    let h = Harness::acme().await;
    h.org("o2", "canceled").await;
    for key in [
        "apps/legacy-app/1.0.0.zip",
        "apps/legacy-app/1.0.0/index.js",
        "orgs/ghost/apps/x/1.zip",
        "orgs/o1/apps/com.acme.app/9.9.9.zip",
        "orgs/o1/apps/com.acme.app/1.0.41/delta/abc123",
        "orgs/o1/apps/com.acme.app/delta/abc123",
        "orgs/o1/apps/com.old.app/1.0.0.zip",
        "orgs/o1/apps/com.old.app/1.0.0/main.js",
        "orgs/o2/apps/com.gone.app/0.1.0.zip",
    ] {
        h.store.insert(key);
    }

    let report = h.auditor().run_unused(None).await.unwrap().unwrap();
    let found: Vec<(&str, OrphanLevel, OrphanReason)> = report
        .orphans
        .iter()
        .map(|o| (o.path.as_str(), o.level, o.reason))
        .collect();
    assert_eq!(
        found,
        vec![
            (
                "apps/legacy-app/",
                OrphanLevel::Organization,
                OrphanReason::LegacyLayout
            ),
            (
                "orgs/ghost/",
                OrphanLevel::Organization,
                OrphanReason::UnknownOrganization
            ),
            (
                "orgs/o1/apps/com.acme.app/9.9.9.zip",
                OrphanLevel::Version,
                OrphanReason::UnreferencedArchive
            ),
            (
                "orgs/o1/apps/com.old.app/",
                OrphanLevel::App,
                OrphanReason::InactiveApp
            ),
        ]
    );

    let dir = ArtifactDir::new(h.config.artifacts_dir.join(RunMode::Unused.as_str()));
    assert!(dir.file(files::ORPHANS).exists());
    assert!(dir.file(files::UNUSED_VERSIONS).exists());
}

#[tokio::test]
async fn manifest_mode_lists_versions_with_intact_archive() {
    let h = Harness::new().await;
    h.version_in(
        ORG,
        APP,
        50,
        "1.5.0",
        Archive::Stored,
        &[(500, "index.js", true), (501, "main.css", false)],
    )
    .await;
    h.version_in(
        ORG,
        APP,
        51,
        "1.5.1",
        Archive::Absent,
        &[(510, "index.js", true), (511, "main.css", false)],
    )
    .await;

    let broken = h.auditor().run_manifests(None).await.unwrap().unwrap();
    assert_eq!(broken.len(), 1);
    assert_eq!(broken[0].version_id, 50);
    assert_eq!(broken[0].manifest_entries, 2);
    assert_eq!(broken[0].missing_entries, 1);

    let dir = ArtifactDir::new(h.config.artifacts_dir.join(RunMode::Manifests.as_str()));
    let on_disk: Vec<BrokenManifest> = read_records(&dir.file(files::BROKEN_MANIFESTS))
        .await
        .unwrap();
    assert_eq!(on_disk, broken);

    // Version 51 has nothing to fall back on and is left alone.
    assert!(!h.catalog.get_version(51).await.unwrap().unwrap().deleted);
}

#[tokio::test]
async fn cancelled_orphan_walk_keeps_what_it_found() {
    let h = Harness::acme().await;
    for key in [
        "orgs/ghost/apps/x/1.zip",
        "orgs/o1/apps/com.old.app/1.0.0.zip",
    ] {
        h.store.insert(key);
    }
    h.auditor().run_full(false).await.unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let report = Auditor::new(h.context().with_cancellation(cancel))
        .run_unused(None)
        .await
        .unwrap()
        .unwrap();
    assert!(report.interrupted);
    // Unknown organizations are found from the root listing; o1 was never walked.
    let paths: Vec<&str> = report.orphans.iter().map(|o| o.path.as_str()).collect();
    assert_eq!(paths, vec!["orgs/ghost/"]);

    let dir = ArtifactDir::new(h.config.artifacts_dir.join(RunMode::Unused.as_str()));
    let on_disk: Vec<OrphanCandidate> = read_records(&dir.file(files::ORPHANS)).await.unwrap();
    assert_eq!(on_disk, report.orphans);
}

// Remediation: dry runs, conditional writes, and re-runs

mod common;

use common::{APP, Archive, Harness, ORG};
use std::sync::atomic::Ordering;
use stowage_audit::artifacts::{ArtifactDir, read_records};
use stowage_audit::runner::REMEDIATION_DIR;
use stowage_audit::orphans::{OrphanLevel, OrphanReason};
use stowage_audit::{
    AuditError, Auditor, CancellationToken, ItemOutcome, OrphanCandidate, RemediationAction,
    RemediationReport,
};
use stowage_catalog::models::AppRow;
use stowage_catalog::repos::{AppRepo, ChannelRepo, ManifestRepo, VersionRepo};
use stowage_core::{archive_key, manifest_prefix};

#[tokio::test]
async fn dry_run_touches_nothing() {
    let h = Harness::acme().await;
    h.version(43, "1.0.43", Archive::Lost).await;
    h.version_in(
        ORG,
        APP,
        50,
        "1.5.0",
        Archive::Stored,
        &[(500, "index.js", true), (501, "main.css", false)],
    )
    .await;
    h.store.insert("orgs/o1/apps/com.old.app/1.0.0.zip");
    h.auditor().run_default_channels(None, false).await.unwrap();
    h.auditor().run_unused(None).await.unwrap();
    h.auditor().run_manifests(None).await.unwrap();

    let calls_before = h.catalog.mutating_calls();
    let checks_before = h.store.checked_keys().len();
    for action in [
        RemediationAction::Downgrade,
        RemediationAction::Manifests,
        RemediationAction::SoftDelete,
        RemediationAction::PurgeOrphans,
    ] {
        let report = h.auditor().remediate(action, false, None).await.unwrap();
        assert!(!report.apply, "{action}");
        assert_eq!(report.total, 1, "{action}");
        assert_eq!(report.planned, 1, "{action}");
        assert_eq!(report.applied, 0, "{action}");
    }

    assert_eq!(h.catalog.mutating_calls(), calls_before);
    assert_eq!(h.store.checked_keys().len(), checks_before);
    assert_eq!(h.store.delete_count(), 0);
    assert!(h.store.contains("orgs/o1/apps/com.old.app/1.0.0.zip"));
    assert_eq!(h.catalog.get_channel(1).await.unwrap().unwrap().version_id, 42);
    assert!(!h.catalog.get_version(43).await.unwrap().unwrap().deleted);
    assert_eq!(h.catalog.manifest_entry_counts(&[50]).await.unwrap()[&50], 2);

    let dir = ArtifactDir::new(h.config.artifacts_dir.join(REMEDIATION_DIR));
    let written: Vec<RemediationReport> =
        read_records(&dir.file(&RemediationAction::Downgrade.report_file()))
            .await
            .unwrap();
    assert_eq!(written[0].planned, 1);
}

#[tokio::test]
async fn downgrade_repoints_channel_and_keeps_broken_version() {
    let h = Harness::acme().await;
    h.auditor().run_default_channels(None, false).await.unwrap();

    let report = h
        .auditor()
        .remediate(RemediationAction::Downgrade, true, None)
        .await
        .unwrap();
    assert_eq!(report.applied, 1);
    assert_eq!(report.conflicts, 0);
    assert_eq!(h.catalog.get_channel(1).await.unwrap().unwrap().version_id, 41);
    assert!(!h.catalog.get_version(42).await.unwrap().unwrap().deleted);

    // Same plan again: nothing left to change.
    let report = h
        .auditor()
        .remediate(RemediationAction::Downgrade, true, None)
        .await
        .unwrap();
    assert_eq!(report.applied, 0);
    assert_eq!(report.already_applied, 1);
    assert_eq!(h.catalog.get_channel(1).await.unwrap().unwrap().version_id, 41);
}

#[tokio::test]
async fn protected_apps_are_never_changed() {
    let mut h = Harness::acme().await;
    h.config.protected_apps = vec![APP.to_string()];
    h.auditor().run_default_channels(None, false).await.unwrap();

    let report = h
        .auditor()
        .remediate(RemediationAction::Downgrade, true, None)
        .await
        .unwrap();
    assert_eq!(report.skipped_protected, 1);
    assert_eq!(report.applied, 0);
    assert_eq!(h.catalog.remediation_writes.load(Ordering::SeqCst), 0);
    assert_eq!(h.catalog.get_channel(1).await.unwrap().unwrap().version_id, 42);
}

#[tokio::test]
async fn manifest_cleanup_is_idempotent() {
    let h = Harness::new().await;
    h.catalog
        .create_app(&AppRow {
            app_id: "com.acme.web".to_string(),
            owner_org: ORG.to_string(),
            default_channel: None,
            manifest_bundle_count: 1,
        })
        .await
        .unwrap();
    h.version_in(
        ORG,
        "com.acme.web",
        50,
        "1.5.0",
        Archive::Stored,
        &[(500, "index.js", true), (501, "main.css", false)],
    )
    .await;
    h.auditor().run_manifests(None).await.unwrap();

    let first = h
        .auditor()
        .remediate(RemediationAction::Manifests, true, None)
        .await
        .unwrap();
    assert_eq!(first.applied, 1);

    let second = h
        .auditor()
        .remediate(RemediationAction::Manifests, true, None)
        .await
        .unwrap();
    assert_eq!(second.applied, 0);
    assert_eq!(second.already_applied, 1);

    assert_eq!(
        h.catalog
            .get_app("com.acme.web")
            .await
            .unwrap()
            .unwrap()
            .manifest_bundle_count,
        0
    );
    assert!(h.catalog.manifest_entry_counts(&[50]).await.unwrap().is_empty());
    assert_eq!(h.catalog.get_version(50).await.unwrap().unwrap().manifest_count, 0);
}

#[tokio::test]
async fn manifest_cleanup_requires_archive_still_stored() {
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
    assert_eq!(h.auditor().run_manifests(None).await.unwrap().unwrap().len(), 1);

    // Archive lost after the audit ran.
    h.store.remove(&archive_key(ORG, APP, "1.5.0"));

    let report = h
        .auditor()
        .remediate(RemediationAction::Manifests, true, None)
        .await
        .unwrap();
    assert_eq!(report.applied, 0);
    assert_eq!(report.conflicts, 1);
    assert_eq!(h.catalog.remediation_writes.load(Ordering::SeqCst), 0);
    assert_eq!(h.catalog.manifest_entry_counts(&[50]).await.unwrap()[&50], 2);
}

#[tokio::test]
async fn failed_batch_still_writes_partial_report() {
    let h = Harness::new().await;
    for (id, name) in [(50, "1.5.0"), (51, "1.5.1"), (52, "1.5.2")] {
        h.version_in(
            ORG,
            APP,
            id,
            name,
            Archive::Stored,
            &[(id * 10, "index.js", true), (id * 10 + 1, "main.css", false)],
        )
        .await;
    }
    h.auditor().run_manifests(None).await.unwrap();
    h.store.fail_on(&archive_key(ORG, APP, "1.5.2"));

    let err = h
        .auditor()
        .remediate(RemediationAction::Manifests, true, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AuditError::TransientStore(_)));

    let dir = ArtifactDir::new(h.config.artifacts_dir.join(REMEDIATION_DIR));
    let written: Vec<RemediationReport> =
        read_records(&dir.file(&RemediationAction::Manifests.report_file()))
            .await
            .unwrap();
    assert_eq!(written[0].applied, 2);
    assert_eq!(written[0].batches, 1);
    assert!(written[0].error.is_some());

    // The next run picks up where it stopped.
    h.store.heal();
    let report = h
        .auditor()
        .remediate(RemediationAction::Manifests, true, None)
        .await
        .unwrap();
    assert_eq!(report.already_applied, 2);
    assert_eq!(report.applied, 1);
    assert!(report.error.is_none());
}

#[tokio::test]
async fn cancelled_remediation_stops_before_next_batch() {
    let h = Harness::acme().await;
    h.auditor().run_default_channels(None, false).await.unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let report = Auditor::new(h.context().with_cancellation(cancel))
        .remediate(RemediationAction::Downgrade, true, None)
        .await
        .unwrap();
    assert!(report.interrupted);
    assert_eq!(report.batches, 0);
    assert_eq!(report.applied, 0);
    assert_eq!(h.catalog.get_channel(1).await.unwrap().unwrap().version_id, 42);

    let dir = ArtifactDir::new(h.config.artifacts_dir.join(REMEDIATION_DIR));
    let written: Vec<RemediationReport> =
        read_records(&dir.file(&RemediationAction::Downgrade.report_file()))
            .await
            .unwrap();
    assert!(written[0].interrupted);
}

#[tokio::test]
async fn soft_delete_rechecks_references() {
    let h = Harness::acme().await;
    for (id, name) in [(43, "1.0.43"), (44, "1.0.44"), (45, "1.0.45")] {
        h.version(id, name, Archive::Lost).await;
    }
    let unused = h.auditor().run_unused(None).await.unwrap().unwrap();
    assert_eq!(unused.unused_versions.len(), 3);

    // Deployed after the audit ran.
    h.deploy(10, 1, 44, 10).await;

    let report = h
        .auditor()
        .remediate(RemediationAction::SoftDelete, true, None)
        .await
        .unwrap();
    assert_eq!(report.total, 3);
    assert_eq!(report.applied, 2);
    assert_eq!(report.conflicts, 1);
    assert_eq!(report.batches, 2);
    assert!(
        report
            .samples
            .iter()
            .any(|s| matches!(s.outcome, ItemOutcome::Conflict { .. }))
    );

    assert!(h.catalog.get_version(43).await.unwrap().unwrap().deleted);
    assert!(!h.catalog.get_version(44).await.unwrap().unwrap().deleted);
    assert!(h.catalog.get_version(45).await.unwrap().unwrap().deleted);

    let again = h
        .auditor()
        .remediate(RemediationAction::SoftDelete, true, None)
        .await
        .unwrap();
    assert_eq!(again.already_applied, 2);
    assert_eq!(again.conflicts, 1);
}

#[tokio::test]
async fn purge_skips_paths_referenced_again() {
    let h = Harness::acme().await;
    for key in [
        "orgs/o1/apps/com.acme.app/9.9.9.zip",
        "orgs/o1/apps/com.acme.app/1.0.41/delta/abc123",
        "orgs/o1/apps/com.old.app/1.0.0.zip",
        "orgs/o1/apps/com.old.app/1.0.0/main.js",
    ] {
        h.store.insert(key);
    }
    let unused = h.auditor().run_unused(None).await.unwrap().unwrap();
    assert_eq!(unused.orphans.len(), 2);

    // A version claiming the stray archive lands before the purge.
    h.version(99, "9.9.9", Archive::Stored).await;

    let report = h
        .auditor()
        .remediate(RemediationAction::PurgeOrphans, true, None)
        .await
        .unwrap();
    assert_eq!(report.applied, 1);
    assert_eq!(report.conflicts, 1);

    assert!(h.store.contains(&archive_key(ORG, APP, "9.9.9")));
    assert!(!h.store.contains("orgs/o1/apps/com.old.app/1.0.0.zip"));
    assert!(!h.store.contains("orgs/o1/apps/com.old.app/1.0.0/main.js"));
    assert!(h.store.contains("orgs/o1/apps/com.acme.app/1.0.41/delta/abc123"));

    let again = h
        .auditor()
        .remediate(RemediationAction::PurgeOrphans, true, None)
        .await
        .unwrap();
    assert_eq!(again.applied, 0);
    assert_eq!(again.already_applied, 1);
}

#[tokio::test]
async fn purge_keeps_manifest_folder_shared_by_a_later_version() {
    let h = Harness::new().await;
    h.version_in(ORG, APP, 1, "1.0.0", Archive::Stored, &[(10, "vendor.js", true)])
        .await;
    // 1.0.1 ships its own index and reuses the 1.0.0 vendor bundle.
    h.version_in(ORG, APP, 2, "1.0.1", Archive::Absent, &[(20, "index.js", true)])
        .await;
    let shared = format!("{}vendor.js", manifest_prefix(ORG, APP, "1.0.0"));
    h.manifest_entry(21, 2, &shared, true).await;

    let unused = h.auditor().run_unused(None).await.unwrap().unwrap();
    assert!(unused.orphans.is_empty(), "{:?}", unused.orphans);

    // A stale findings file still lists the live folder.
    let live = format!("{}index.js", manifest_prefix(ORG, APP, "1.0.1"));
    let stale = OrphanCandidate {
        path: manifest_prefix(ORG, APP, "1.0.1"),
        level: OrphanLevel::Version,
        reason: OrphanReason::UnreferencedManifestTree,
        org_id: Some(ORG.to_string()),
        app_id: Some(APP.to_string()),
    };
    let input = h.dir.path().join("stale-orphans.json");
    ArtifactDir::new(h.dir.path())
        .write("stale-orphans.json", [&stale])
        .await
        .unwrap();

    let report = h
        .auditor()
        .remediate(RemediationAction::PurgeOrphans, true, Some(&input))
        .await
        .unwrap();
    assert_eq!(report.applied, 0);
    assert_eq!(report.conflicts, 1);
    assert!(h.store.contains(&live));
    assert!(h.store.contains(&shared));
}

#[tokio::test]
async fn remediation_without_findings_fails() {
    let h = Harness::acme().await;
    let err = h
        .auditor()
        .remediate(RemediationAction::SoftDelete, false, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AuditError::MissingFindings(_)));
}

#[tokio::test]
async fn applying_run_respects_held_lease() {
    let h = Harness::acme().await;
    h.auditor().run_default_channels(None, false).await.unwrap();
    h.hold_lease("remediate-downgrade").await;

    let err = h
        .auditor()
        .remediate(RemediationAction::Downgrade, true, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AuditError::LeaseHeld { .. }));

    // A dry run needs no lease.
    let report = h
        .auditor()
        .remediate(RemediationAction::Downgrade, false, None)
        .await
        .unwrap();
    assert_eq!(report.planned, 1);
}

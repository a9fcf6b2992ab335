//! Prometheus metrics for audit runs.
//!
//! The auditor is a batch job with no HTTP surface, so the registry is
//! rendered to `metrics.prom` (node-exporter textfile format) when a run
//! finalizes.

use crate::error::AuditResult;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Counters for one auditor process.
pub struct AuditMetrics {
    registry: Registry,
    /// Catalog pages fully processed, by phase.
    pub pages_processed: IntCounterVec,
    pub objects_verified: IntCounter,
    /// Confirmed-missing findings, by kind (`version`, `manifest_entry`).
    pub confirmed_missing: IntCounterVec,
    pub transient_errors: IntCounter,
    /// Remediation item outcomes, by action and outcome.
    pub remediation_outcomes: IntCounterVec,
    pub orphans_found: IntCounter,
    /// Unix time of the last completed run.
    pub last_success_timestamp: IntGauge,
}

impl AuditMetrics {
    pub fn new() -> AuditResult<Self> {
        let registry = Registry::new();

        let pages_processed = IntCounterVec::new(
            Opts::new(
                "stowage_audit_pages_processed_total",
                "Catalog pages fully processed",
            ),
            &["phase"],
        )?;
        let objects_verified = IntCounter::new(
            "stowage_audit_objects_verified_total",
            "Catalog items checked against the object store",
        )?;
        let confirmed_missing = IntCounterVec::new(
            Opts::new(
                "stowage_audit_confirmed_missing_total",
                "Items the object store reported absent",
            ),
            &["kind"],
        )?;
        let transient_errors = IntCounter::new(
            "stowage_audit_transient_errors_total",
            "Object store failures other than not-found",
        )?;
        let remediation_outcomes = IntCounterVec::new(
            Opts::new(
                "stowage_remediation_outcomes_total",
                "Remediation item outcomes",
            ),
            &["action", "outcome"],
        )?;
        let orphans_found = IntCounter::new(
            "stowage_audit_orphans_found_total",
            "Store paths with no active catalog reference",
        )?;
        let last_success_timestamp = IntGauge::new(
            "stowage_audit_last_success_timestamp_seconds",
            "Unix time of the last completed run",
        )?;

        registry.register(Box::new(pages_processed.clone()))?;
        registry.register(Box::new(objects_verified.clone()))?;
        registry.register(Box::new(confirmed_missing.clone()))?;
        registry.register(Box::new(transient_errors.clone()))?;
        registry.register(Box::new(remediation_outcomes.clone()))?;
        registry.register(Box::new(orphans_found.clone()))?;
        registry.register(Box::new(last_success_timestamp.clone()))?;

        Ok(Self {
            registry,
            pages_processed,
            objects_verified,
            confirmed_missing,
            transient_errors,
            remediation_outcomes,
            orphans_found,
            last_success_timestamp,
        })
    }

    /// Helper to record a remediation outcome.
    pub fn record_outcome(&self, action: &str, outcome: &str) {
        self.remediation_outcomes
            .with_label_values(&[action, outcome])
            .inc();
    }

    /// Render every metric in text exposition format.
    pub fn render(&self) -> AuditResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

//! Storage consistency audit and reconciliation for stowage.
//!
//! The catalog says what the object store should hold; this crate checks
//! that it does, and corrects the catalog (or the store) where it does not.
//!
//! - `full` walks catalog versions, then manifest entries, page by page,
//!   recording every object the store confirms absent. It checkpoints after
//!   each page and resumes where it stopped.
//! - `unused`, `manifests` and `default-channels` classify the versions the
//!   full audit flagged and write plans.
//! - Remediation executes those plans, dry-run unless told to apply.
//!
//! A finding is only ever recorded for an explicit not-found. Any other
//! store failure aborts the run and leaves the checkpoint where it was.

pub mod artifacts;
pub mod checkpoint;
pub mod error;
pub mod executor;
pub mod findings;
pub mod indexer;
pub mod lease;
pub mod metrics;
pub mod orphans;
pub mod planner;
pub mod runner;
pub mod verifier;

pub use artifacts::{ArtifactDir, ArtifactRecord};
pub use checkpoint::{Checkpoint, Phase};
pub use error::{AuditError, AuditResult};
pub use executor::{Execution, ItemOutcome, RemediationAction, RemediationReport};
pub use findings::{AuditSummary, Findings, VersionHealth};
pub use metrics::AuditMetrics;
pub use orphans::{OrphanCandidate, OrphanWalk, UnusedVersion};
pub use planner::{DowngradeCandidate, DowngradePlan};
pub use runner::{AuditContext, Auditor, ProgressObserver, RunMode, UnusedReport};
pub use tokio_util::sync::CancellationToken;
pub use verifier::LookupKind;

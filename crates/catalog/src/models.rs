//! Database models mapping to the catalog schema.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

/// Organization record. Only the billing state matters to audits.
#[derive(Debug, Clone, FromRow)]
pub struct OrgRow {
    pub id: String,
    pub name: String,
    /// One of `paying`, `trial`, `canceled`, `free`.
    pub billing_state: String,
}

/// Billing states that count as active for audit scoping.
pub const ACTIVE_BILLING_STATES: [&str; 2] = ["paying", "trial"];

/// App record.
#[derive(Debug, Clone, FromRow)]
pub struct AppRow {
    pub app_id: String,
    pub owner_org: String,
    /// Name of the channel treated as default/production.
    pub default_channel: Option<String>,
    /// Number of versions of this app that carry a manifest.
    pub manifest_bundle_count: i64,
}

/// Bundle version record.
#[derive(Debug, Clone, FromRow)]
pub struct VersionRow {
    pub id: i64,
    pub app_id: String,
    pub owner_org: String,
    pub name: String,
    pub deleted: bool,
    /// Object key of the bundle archive, when one was uploaded.
    pub storage_path: Option<String>,
    pub manifest_count: i64,
}

impl VersionRow {
    /// Whether the version is expected to have anything in the store.
    pub fn stores_something(&self) -> bool {
        self.storage_path.is_some() || self.manifest_count > 0
    }
}

/// One file of a version's manifest tree.
#[derive(Debug, Clone, FromRow)]
pub struct ManifestEntryRow {
    pub id: i64,
    pub app_version_id: i64,
    pub s3_path: String,
}

/// Channel record.
#[derive(Debug, Clone, FromRow)]
pub struct ChannelRow {
    pub id: i64,
    pub app_id: String,
    pub owner_org: String,
    pub name: String,
    pub version_id: i64,
    /// Derived: the app's configured default channel has this name.
    /// Ignored on insert.
    pub is_default: bool,
}

/// Append-only record of a version being deployed to a channel.
#[derive(Debug, Clone, FromRow)]
pub struct DeployHistoryRow {
    pub id: i64,
    pub channel_id: i64,
    pub version_id: i64,
    pub app_id: String,
    pub owner_org: String,
    pub deployed_at: OffsetDateTime,
}

/// Run lease guarding one audit mode.
#[derive(Debug, Clone, FromRow)]
pub struct LeaseRow {
    pub name: String,
    pub owner: String,
    pub acquired_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

/// Result of one conditional remediation write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum WriteOutcome {
    /// The row changed.
    Applied,
    /// The row was already in the target state.
    AlreadyApplied,
    /// The row no longer matches what was planned; nothing changed.
    Conflict(String),
}

/// Result of a lease acquisition attempt.
#[derive(Debug, Clone)]
pub enum LeaseAcquire {
    Acquired(LeaseRow),
    /// Another owner holds an unexpired lease.
    Held(LeaseRow),
}

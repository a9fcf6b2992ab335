//! Downgrade planning for channels pointing at broken versions.

use crate::artifacts::ArtifactRecord;
use crate::error::AuditResult;
use crate::findings::{Findings, VersionHealth};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use stowage_catalog::CatalogStore;
use stowage_catalog::models::{ChannelRow, VersionRow};
use stowage_catalog::repos::{ChannelRepo, DeployHistoryRepo, ManifestRepo, VersionRepo};
use stowage_storage::ObjectStore;
use time::OffsetDateTime;

/// A safe replacement for a channel's broken version.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DowngradeCandidate {
    pub channel_id: i64,
    pub channel_name: String,
    pub app_id: String,
    pub owner_org: String,
    pub is_default: bool,
    pub broken_version_id: i64,
    pub replacement_version_id: i64,
    pub replacement_version_name: String,
    /// When the replacement was deployed to this channel.
    #[serde(with = "time::serde::rfc3339")]
    pub deployed_at: OffsetDateTime,
}

/// A channel whose whole deploy history offers no intact version.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoCandidate {
    pub channel_id: i64,
    pub channel_name: String,
    pub app_id: String,
    pub owner_org: String,
    pub is_default: bool,
    pub broken_version_id: i64,
    pub history_entries: u64,
}

/// One entry of `downgrade-plan.json`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "plan", rename_all = "snake_case")]
pub enum PlanEntry {
    Candidate(DowngradeCandidate),
    NoCandidate(NoCandidate),
}

impl ArtifactRecord for PlanEntry {
    const KIND: &'static str = "downgrade_plan_entry";
}

/// Planner output.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DowngradePlan {
    pub candidates: Vec<DowngradeCandidate>,
    /// For operator review; never resolved automatically.
    pub no_candidates: Vec<NoCandidate>,
}

impl DowngradePlan {
    pub fn entries(&self) -> Vec<PlanEntry> {
        self.candidates
            .iter()
            .cloned()
            .map(PlanEntry::Candidate)
            .chain(self.no_candidates.iter().cloned().map(PlanEntry::NoCandidate))
            .collect()
    }

    pub fn from_entries(entries: Vec<PlanEntry>) -> Self {
        let mut plan = Self::default();
        for entry in entries {
            match entry {
                PlanEntry::Candidate(c) => plan.candidates.push(c),
                PlanEntry::NoCandidate(n) => plan.no_candidates.push(n),
            }
        }
        plan
    }
}

/// Searches deploy history for downgrade targets.
pub struct Planner<'a> {
    catalog: Arc<dyn CatalogStore>,
    store: Arc<dyn ObjectStore>,
    findings: &'a Findings,
    all_channels: bool,
}

impl<'a> Planner<'a> {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        store: Arc<dyn ObjectStore>,
        findings: &'a Findings,
    ) -> Self {
        Self {
            catalog,
            store,
            findings,
            all_channels: false,
        }
    }

    /// Plan for every channel, not only default/production ones.
    pub fn all_channels(mut self, all: bool) -> Self {
        self.all_channels = all;
        self
    }

    /// Plan downgrades for channels currently pointing at a broken version.
    pub async fn plan(&self, broken: &BTreeSet<i64>) -> AuditResult<DowngradePlan> {
        let ids: Vec<i64> = broken.iter().copied().collect();
        let channels: Vec<ChannelRow> = self
            .catalog
            .channels_for_versions(&ids)
            .await?
            .into_iter()
            .filter(|c| self.all_channels || c.is_default)
            .collect();

        let mut plan = DowngradePlan::default();
        let mut verdicts: HashMap<i64, Option<VersionRow>> = HashMap::new();

        for channel in channels {
            let history = self.catalog.deploy_history_for_channel(channel.id).await?;
            let mut chosen = None;

            for entry in &history {
                if entry.version_id == channel.version_id || broken.contains(&entry.version_id) {
                    continue;
                }
                let verdict = match verdicts.get(&entry.version_id) {
                    Some(verdict) => verdict.clone(),
                    None => {
                        let verdict = self.intact_version(entry.version_id).await?;
                        verdicts.insert(entry.version_id, verdict.clone());
                        verdict
                    }
                };
                if let Some(version) = verdict
                    && version.app_id == channel.app_id
                    && version.owner_org == channel.owner_org
                {
                    chosen = Some((version, entry.deployed_at));
                    break;
                }
            }

            match chosen {
                Some((version, deployed_at)) => {
                    tracing::info!(
                        channel_id = channel.id,
                        channel = %channel.name,
                        broken_version_id = channel.version_id,
                        replacement_version_id = version.id,
                        "Planned channel downgrade"
                    );
                    plan.candidates.push(DowngradeCandidate {
                        channel_id: channel.id,
                        channel_name: channel.name,
                        app_id: channel.app_id,
                        owner_org: channel.owner_org,
                        is_default: channel.is_default,
                        broken_version_id: channel.version_id,
                        replacement_version_id: version.id,
                        replacement_version_name: version.name,
                        deployed_at,
                    });
                }
                None => {
                    tracing::warn!(
                        channel_id = channel.id,
                        channel = %channel.name,
                        broken_version_id = channel.version_id,
                        history_entries = history.len(),
                        "No intact version in deploy history"
                    );
                    plan.no_candidates.push(NoCandidate {
                        channel_id: channel.id,
                        channel_name: channel.name,
                        app_id: channel.app_id,
                        owner_org: channel.owner_org,
                        is_default: channel.is_default,
                        broken_version_id: channel.version_id,
                        history_entries: history.len() as u64,
                    });
                }
            }
        }

        Ok(plan)
    }

    /// The version, if it is confirmed intact: not deleted, no findings
    /// against it, and its primary object still present right now.
    async fn intact_version(&self, version_id: i64) -> AuditResult<Option<VersionRow>> {
        let Some(version) = self.catalog.get_version(version_id).await? else {
            return Ok(None);
        };
        let entries = self
            .catalog
            .manifest_entry_counts(&[version_id])
            .await?
            .get(&version_id)
            .copied()
            .unwrap_or(0);
        if self.findings.health(&version, entries) != VersionHealth::Intact {
            return Ok(None);
        }

        let sample = match &version.storage_path {
            Some(path) => Some(path.clone()),
            None => self
                .catalog
                .sample_manifest_paths(&[version_id])
                .await?
                .remove(&version_id),
        };
        let Some(key) = sample else {
            return Ok(None);
        };
        if !self.store.exists(&key).await? {
            tracing::debug!(version_id, key = %key, "Replacement candidate no longer in store");
            return Ok(None);
        }
        Ok(Some(version))
    }
}

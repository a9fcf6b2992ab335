//! Resumable progress for the full audit.

use crate::artifacts::{ArtifactDir, ArtifactRecord, files};
use crate::error::{AuditError, AuditResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

/// Audit phases, in the only order they may run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Versions,
    Manifests,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Versions => "versions",
            Phase::Manifests => "manifests",
            Phase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Cumulative counts carried across resumes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressCounters {
    pub pages: u64,
    pub versions_checked: u64,
    pub manifest_entries_checked: u64,
}

/// Where the full audit stopped.
///
/// The cursor is the last catalog id fully processed in the current phase.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Checkpoint layout version.
    pub version: u8,
    pub phase: Phase,
    pub cursor: i64,
    pub counters: ProgressCounters,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl ArtifactRecord for Checkpoint {
    const KIND: &'static str = "checkpoint";
}

impl Checkpoint {
    const VERSION: u8 = 1;

    pub fn new() -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            version: Self::VERSION,
            phase: Phase::Versions,
            cursor: 0,
            counters: ProgressCounters::default(),
            started_at: now,
            updated_at: now,
        }
    }

    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    /// Move the cursor forward within the current phase.
    pub fn advance(&mut self, cursor: i64) -> AuditResult<()> {
        if self.phase == Phase::Done {
            return Err(AuditError::Checkpoint(
                "cannot advance a finished checkpoint".to_string(),
            ));
        }
        if cursor <= self.cursor {
            return Err(AuditError::Checkpoint(format!(
                "cursor for phase {} must increase (at {}, got {cursor})",
                self.phase, self.cursor
            )));
        }
        self.cursor = cursor;
        self.touch();
        Ok(())
    }

    /// Enter a later phase with a fresh cursor.
    pub fn enter(&mut self, phase: Phase) -> AuditResult<()> {
        if phase <= self.phase {
            return Err(AuditError::Checkpoint(format!(
                "phase cannot move from {} to {phase}",
                self.phase
            )));
        }
        self.phase = phase;
        self.cursor = 0;
        self.touch();
        Ok(())
    }

    pub fn touch(&mut self) {
        self.updated_at = OffsetDateTime::now_utc();
    }
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads and writes `checkpoint.json` in a run directory.
#[derive(Clone, Debug)]
pub struct CheckpointStore {
    dir: ArtifactDir,
}

impl CheckpointStore {
    pub fn new(dir: ArtifactDir) -> Self {
        Self { dir }
    }

    pub async fn load(&self) -> AuditResult<Option<Checkpoint>> {
        let Some(mut records) = self.dir.read::<Checkpoint>(files::CHECKPOINT).await? else {
            return Ok(None);
        };
        let checkpoint = records.pop();
        if let Some(checkpoint) = &checkpoint
            && checkpoint.version != Checkpoint::VERSION
        {
            tracing::warn!(
                version = checkpoint.version,
                expected = Checkpoint::VERSION,
                "Checkpoint version mismatch, starting fresh"
            );
            return Ok(None);
        }
        Ok(checkpoint)
    }

    pub async fn save(&self, checkpoint: &Checkpoint) -> AuditResult<()> {
        self.dir
            .write(files::CHECKPOINT, std::slice::from_ref(checkpoint))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_is_monotonic() {
        let mut checkpoint = Checkpoint::new();
        checkpoint.advance(10).unwrap();
        checkpoint.advance(25).unwrap();
        assert!(checkpoint.advance(25).is_err());
        assert!(checkpoint.advance(3).is_err());
        assert_eq!(checkpoint.cursor, 25);
    }

    #[test]
    fn phases_only_move_forward() {
        let mut checkpoint = Checkpoint::new();
        checkpoint.advance(10).unwrap();
        checkpoint.enter(Phase::Manifests).unwrap();
        assert_eq!(checkpoint.cursor, 0);

        assert!(checkpoint.enter(Phase::Versions).is_err());
        assert!(checkpoint.enter(Phase::Manifests).is_err());

        checkpoint.enter(Phase::Done).unwrap();
        assert!(checkpoint.is_done());
        assert!(checkpoint.advance(1).is_err());
    }

    #[tokio::test]
    async fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(ArtifactDir::new(dir.path()));
        assert!(store.load().await.unwrap().is_none());

        let mut checkpoint = Checkpoint::new();
        checkpoint.advance(42).unwrap();
        checkpoint.counters.pages = 3;
        store.save(&checkpoint).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.phase, Phase::Versions);
        assert_eq!(loaded.cursor, 42);
        assert_eq!(loaded.counters.pages, 3);
    }
}

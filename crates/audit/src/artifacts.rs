//! Persisted audit artifacts.
//!
//! Every artifact file has the same envelope:
//!
//! ```json
//! { "schema_version": 1, "kind": "missing_version", "generated_at": "...", "records": [...] }
//! ```
//!
//! with exactly one record kind per file. Files are replaced atomically
//! (temp file in the same directory, fsync, rename), so a concurrent reader
//! sees either the previous snapshot or the new one.

use crate::error::{AuditError, AuditResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

/// Envelope schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Artifact file names.
pub mod files {
    pub const MISSING_VERSIONS: &str = "missing-versions.json";
    pub const MISSING_MANIFESTS: &str = "missing-manifests.json";
    pub const APPS_WITH_ISSUES: &str = "apps-with-issues.json";
    pub const SUMMARY: &str = "summary.json";
    pub const CHECKPOINT: &str = "checkpoint.json";
    pub const METRICS: &str = "metrics.prom";
    pub const ORPHANS: &str = "orphans.json";
    pub const UNUSED_VERSIONS: &str = "unused-versions.json";
    pub const BROKEN_MANIFESTS: &str = "broken-manifests.json";
    pub const DOWNGRADE_PLAN: &str = "downgrade-plan.json";
}

/// A record type stored in an artifact file.
pub trait ArtifactRecord: Serialize + DeserializeOwned + Send + Sync {
    /// Value of the envelope's `kind` field.
    const KIND: &'static str;
}

/// The artifact envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ArtifactDocument<R> {
    pub schema_version: u32,
    pub kind: String,
    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,
    pub records: R,
}

/// One run mode's artifact directory.
#[derive(Clone, Debug)]
pub struct ArtifactDir {
    root: PathBuf,
}

impl ArtifactDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Atomically replace `name` with `records`.
    pub async fn write<'r, T: ArtifactRecord + 'r>(
        &self,
        name: &str,
        records: impl IntoIterator<Item = &'r T>,
    ) -> AuditResult<()> {
        let path = self.file(name);
        let records: Vec<&T> = records.into_iter().collect();
        let document = ArtifactDocument {
            schema_version: SCHEMA_VERSION,
            kind: T::KIND.to_string(),
            generated_at: OffsetDateTime::now_utc(),
            records,
        };
        let body =
            serde_json::to_vec_pretty(&document).map_err(|e| AuditError::artifact(&path, e))?;
        write_atomic(path, body).await
    }

    /// Read `name`, or `None` when the file does not exist.
    pub async fn read<T: ArtifactRecord>(&self, name: &str) -> AuditResult<Option<Vec<T>>> {
        let path = self.file(name);
        match tokio::fs::metadata(&path).await {
            Ok(_) => read_records(&path).await.map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AuditError::artifact(&path, e)),
        }
    }

    /// Atomically replace a plain-text file.
    pub async fn write_text(&self, name: &str, contents: String) -> AuditResult<()> {
        write_atomic(self.file(name), contents.into_bytes()).await
    }
}

/// Read the records of an artifact file, checking its envelope.
pub async fn read_records<T: ArtifactRecord>(path: &Path) -> AuditResult<Vec<T>> {
    let body = tokio::fs::read(path)
        .await
        .map_err(|e| AuditError::artifact(path, e))?;
    let document: ArtifactDocument<Vec<T>> =
        serde_json::from_slice(&body).map_err(|e| AuditError::artifact(path, e))?;

    if document.schema_version != SCHEMA_VERSION {
        return Err(AuditError::artifact(
            path,
            format!(
                "unsupported schema version {} (expected {SCHEMA_VERSION})",
                document.schema_version
            ),
        ));
    }
    if document.kind != T::KIND {
        return Err(AuditError::artifact(
            path,
            format!("expected '{}' records, found '{}'", T::KIND, document.kind),
        ));
    }
    Ok(document.records)
}

async fn write_atomic(path: PathBuf, body: Vec<u8>) -> AuditResult<()> {
    let error_path = path.clone();
    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&body)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(|e| AuditError::artifact(&error_path, format!("write task failed: {e}")))?
    .map_err(|e| AuditError::artifact(&error_path, e))
}

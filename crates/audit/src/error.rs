//! Error types for audit runs.

use std::path::PathBuf;
use stowage_catalog::CatalogError;
use stowage_storage::StorageError;
use thiserror::Error;

/// Audit and remediation errors.
///
/// A key the store reports as absent is never an error; it is recorded as a
/// finding. Every other store failure is [`AuditError::TransientStore`].
#[derive(Debug, Error)]
pub enum AuditError {
    /// Object store failure other than an explicit not-found. The current
    /// page is abandoned and the checkpoint stays where it was.
    #[error("object store error: {0}")]
    TransientStore(#[source] StorageError),

    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("run lease '{name}' is held by {owner} until {expires_at}")]
    LeaseHeld {
        name: String,
        owner: String,
        expires_at: String,
    },

    #[error("run lease '{0}' was lost to another runner")]
    LeaseLost(String),

    #[error("artifact error at {}: {message}", path.display())]
    Artifact { path: PathBuf, message: String },

    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    #[error("no completed audit findings at {}; run the matching audit first", .0.display())]
    MissingFindings(PathBuf),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl From<StorageError> for AuditError {
    fn from(e: StorageError) -> Self {
        AuditError::TransientStore(e)
    }
}

impl AuditError {
    pub(crate) fn artifact(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        AuditError::Artifact {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

pub type AuditResult<T> = Result<T, AuditError>;

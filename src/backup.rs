//! Whole-namespace export and import for device migration.
//!
//! The document is a JSON array of `[key, value]` string pairs using physical
//! keys. Import wipes the namespace, replays the pairs verbatim and then audits
//! the journal; it reports broken invariants but does not refuse the backup.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    core::{
        audit::{Violation, audit_journal},
        repository::{RepoError, TripRepository},
    },
    kv::KvError,
};

/// Backup failures.
#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    /// The document is not an array of string pairs.
    #[error("malformed backup document: {0}")]
    Format(#[from] serde_json::Error),
    /// The substrate failed.
    #[error(transparent)]
    Storage(#[from] KvError),
    /// The post-import audit could not read the journal.
    #[error(transparent)]
    Repository(#[from] RepoError),
}

/// Physical `(key, value)` pairs of one namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackupDocument {
    /// Pairs, sorted by key on export.
    pub entries: Vec<(String, String)>,
}

impl BackupDocument {
    /// Parses the portable JSON form.
    pub fn from_json(raw: &str) -> Result<Self, BackupError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Portable JSON form.
    pub fn to_json(&self) -> Result<String, BackupError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Outcome of an import.
#[derive(Debug, Clone, PartialEq)]
pub struct RestoreReport {
    /// Pairs written.
    pub written: usize,
    /// Pairs skipped because their key lies outside the namespace.
    pub skipped: Vec<String>,
    /// Invariants the imported journal breaks.
    pub violations: Vec<Violation>,
}

impl RestoreReport {
    /// True when the imported journal passed every check.
    pub fn is_consistent(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Captures every pair in the repository's namespace.
pub async fn export_namespace(repo: &TripRepository) -> Result<BackupDocument, BackupError> {
    let entries = repo.kv().entries().await?;
    info!(count = entries.len(), "namespace exported");
    Ok(BackupDocument { entries })
}

/// Replaces the repository's namespace with `document` and audits the result.
///
/// A live [`crate::session::TripSession`] must be reloaded afterwards; prefer
/// [`crate::session::TripSession::restore_backup`].
pub async fn import_namespace(
    repo: &TripRepository,
    document: BackupDocument,
) -> Result<RestoreReport, BackupError> {
    let namespace = repo.kv().namespace().clone();
    let (owned, foreign): (Vec<_>, Vec<_>) = document
        .entries
        .into_iter()
        .partition(|(key, _)| namespace.contains(key));
    let skipped: Vec<String> = foreign.into_iter().map(|(key, _)| key).collect();
    for key in &skipped {
        warn!(key = %key, "skipping backup entry outside the namespace");
    }

    let written = owned.len();
    repo.kv().clear().await?;
    repo.kv().restore_raw(owned).await?;
    let violations = audit_journal(repo).await?;
    info!(written, violations = violations.len(), "namespace imported");
    Ok(RestoreReport {
        written,
        skipped,
        violations,
    })
}

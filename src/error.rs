use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Cannot access '{}': {reason}", path.display())]
    FileAccess { path: PathBuf, reason: String },

    #[error("Unsupported checksum algorithm '{0}' (expected sha256, crc32, md5 or none)")]
    UnsupportedChecksumAlgorithm(String),

    /// A count that must balance did not. Never recovered from.
    #[error("Reconciliation mismatch in {context}: expected {expected}, got {actual}")]
    ReconciliationMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Persisted inventory '{}' is corrupt: {reason}", path.display())]
    PersistedStateCorrupt { path: PathBuf, reason: String },

    #[error("Refusing to delete '{0}': path contains characters outside the safe set")]
    UnsafeDeleteTarget(String),

    #[error("No unique best-scoring file among {members} copies of {size} bytes ({checksum})")]
    AmbiguousDuplicateGroup {
        size: u64,
        checksum: String,
        members: usize,
    },

    #[error("Invalid inventory record: {0}")]
    InvalidRecord(String),

    #[error("Path '{0}' appears more than once in a snapshot")]
    DuplicatePath(String),

    #[error("Patch inconsistency: {0}")]
    PatchInconsistency(String),

    #[error("Sync conflict: {0}")]
    SyncConflict(String),

    #[error("Worker pool error: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Broken internal invariants. These abort a whole run instead of failing
    /// one directory.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::ReconciliationMismatch { .. } | Error::PatchInconsistency(_)
        )
    }
}

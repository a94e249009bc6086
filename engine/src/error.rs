use std::path::PathBuf;

use thiserror::Error;

use crate::ArticleId;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The requested article id is not present in the similarity index.
    #[error("unknown article id: {0}")]
    UnknownArticle(ArticleId),

    /// The persisted snapshot failed structural validation and must not be
    /// served.
    #[error("corrupt snapshot at {path}: {reason}")]
    CorruptSnapshot { path: PathBuf, reason: String },

    /// The persisted snapshot was written by an incompatible format version.
    #[error("snapshot format version {found}, expected {expected}")]
    VersionMismatch { found: u32, expected: u32 },

    /// The configured stop-word list could not be read at startup.
    #[error("stop-word list {path}: {source}")]
    Stopwords {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The rebuild was cancelled before completion; no state was committed.
    #[error("rebuild cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("encoding: {0}")]
    Codec(#[from] bincode::Error),

    #[error("article store: {0}")]
    Store(#[from] sled::Error),
}

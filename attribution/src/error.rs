use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AttributionError>;

#[derive(Debug, Error)]
pub enum AttributionError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{path}:{line_number}: malformed queue entry `{line}`")]
    MalformedQueueLine {
        path: PathBuf,
        line_number: usize,
        line: String,
    },

    /// Another invocation with the same run stamp is still alive.
    #[error("sentinel {path} already exists; another Level 2 run holds this stamp")]
    SentinelExists { path: PathBuf },

    /// The batch was interrupted; `requeued` entries were written back to
    /// the retry queue for the next invocation.
    #[error("batch aborted ({reason}); {requeued} queries re-queued for the next run")]
    BatchAborted { requeued: usize, reason: String },
}

impl AttributionError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}

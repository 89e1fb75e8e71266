use std::path::PathBuf;

use thiserror::Error;

use crate::token::DemarcationToken;

pub type Result<T> = std::result::Result<T, SegmentError>;

#[derive(Debug, Error)]
pub enum SegmentError {
    #[error("cursor file {0} does not exist")]
    CursorMissing(PathBuf),
    #[error("malformed demarcation token `{0}`")]
    MalformedToken(String),
    #[error("demarcation {0} not found in live or archived logs")]
    MarkerNotFound(DemarcationToken),
    #[error("demarcation {end} does not follow {start} in the log timeline")]
    BoundariesOutOfOrder {
        start: DemarcationToken,
        end: DemarcationToken,
    },
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl SegmentError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}

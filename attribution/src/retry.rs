use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;

use crate::error::AttributionError;
use crate::error::Result;
use crate::queue::QueryMetadataEntry;
use crate::queue::QueryState;
use crate::queue::read_entries;

/// The persistent queue of queries a previous invocation did not get to.
///
/// Only one invocation should own the queue at a time: it is moved into the
/// invocation's batch file at start and rewritten only when a batch aborts.
#[derive(Debug, Clone)]
pub struct RetryQueue {
    path: PathBuf,
}

impl RetryQueue {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Move the queued entries into `batch_file` and return them. An empty
    /// queue leaves `batch_file` untouched.
    pub fn take_into(&self, batch_file: &Path) -> Result<Vec<QueryMetadataEntry>> {
        match std::fs::rename(&self.path, batch_file) {
            Ok(()) => {
                let entries = read_entries(batch_file)?;
                tracing::info!(
                    "{} queries left from the last run, continuing with them",
                    entries.len()
                );
                Ok(entries)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(source) => Err(AttributionError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Rewrite the queue with every batch entry whose id is not in `parsed`,
    /// renumbered from 1. Returns the number of entries queued.
    pub fn requeue(&self, batch: &[QueryMetadataEntry], parsed: &HashSet<u64>) -> Result<usize> {
        let pending = renumber_unparsed(batch, parsed);
        let mut contents = String::new();
        for entry in &pending {
            contents.push_str(&entry.to_string());
            contents.push('\n');
        }
        std::fs::write(&self.path, contents).map_err(AttributionError::io(&self.path))?;
        Ok(pending.len())
    }
}

/// Entries of `batch` not in `parsed`, in order, renumbered contiguously from
/// 1 and reset to NOT PARSED.
pub fn renumber_unparsed(
    batch: &[QueryMetadataEntry],
    parsed: &HashSet<u64>,
) -> Vec<QueryMetadataEntry> {
    batch
        .iter()
        .filter(|entry| !parsed.contains(&entry.id))
        .zip(1..)
        .map(|(entry, id)| QueryMetadataEntry {
            id,
            raw_query: entry.raw_query.clone(),
            state: QueryState::NotParsed,
        })
        .collect()
}

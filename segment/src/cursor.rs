use std::ffi::OsString;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use crate::error::Result;
use crate::error::SegmentError;
use crate::token::DemarcationToken;

/// Persists the demarcation instance the next Level 1 run starts from.
///
/// The cursor file holds a single line. A sibling `<name>_copy` keeps the
/// value from before the most recent update so a run that cannot find its
/// start marker (or never saw its end marker) can fall back to it.
#[derive(Debug, Clone)]
pub struct CursorStore {
    path: PathBuf,
    backup_path: PathBuf,
}

impl CursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut backup_name = path
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("cursor"));
        backup_name.push("_copy");
        let backup_path = path.with_file_name(backup_name);
        Self { path, backup_path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    pub fn load(&self) -> Result<DemarcationToken> {
        read_token(&self.path)?.ok_or_else(|| SegmentError::CursorMissing(self.path.clone()))
    }

    /// Truncate and rewrite the cursor with `token`.
    pub fn store(&self, token: &DemarcationToken) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)
            .map_err(SegmentError::io(&self.path))?;
        writeln!(file, "{token}").map_err(SegmentError::io(&self.path))?;
        file.sync_all().map_err(SegmentError::io(&self.path))
    }

    /// Snapshot the current cursor into the backup copy.
    pub fn backup(&self) -> Result<()> {
        std::fs::copy(&self.path, &self.backup_path)
            .map(|_| ())
            .map_err(SegmentError::io(&self.backup_path))
    }

    /// Copy the backup back over the cursor. Returns the restored token, or
    /// `None` when no backup exists.
    pub fn restore_backup(&self) -> Result<Option<DemarcationToken>> {
        let Some(previous) = read_token(&self.backup_path)? else {
            return Ok(None);
        };
        self.store(&previous)?;
        Ok(Some(previous))
    }
}

fn read_token(path: &Path) -> Result<Option<DemarcationToken>> {
    match std::fs::read_to_string(path) {
        Ok(contents) => contents.trim().parse().map(Some),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(SegmentError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

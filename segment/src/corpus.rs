//! Physical layout of the log corpus: live files, rotated files and
//! compressed archives, and the narrow interface used to search and unpack
//! them.

use std::fs::File;
use std::io;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Read;
use std::path::Path;
use std::path::PathBuf;

use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::NaiveTime;
use countertool_config::CorpusConfig;
use flate2::read::GzDecoder;

use crate::error::Result;
use crate::error::SegmentError;
use crate::token::DemarcationToken;
use crate::token::line_contains_token;

const ROTATED_SUFFIX: &str = ".old";

/// The two operations the locator needs from the storage underneath it.
pub trait CorpusAccess {
    /// Whether any line of `file` (or of any member, for an archive) contains
    /// `token` as a whole word.
    fn contains(&self, file: &Path, token: &DemarcationToken) -> io::Result<bool>;

    /// Unpack `archive` into `workspace` and return the unpacked regular
    /// files ordered by name.
    fn extract_archive(&self, archive: &Path, workspace: &Path) -> io::Result<Vec<PathBuf>>;
}

/// Reads plain files directly and `.tar.gz` archives through a streaming
/// gzip + tar decoder.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeCorpusAccess;

impl CorpusAccess for NativeCorpusAccess {
    fn contains(&self, file: &Path, token: &DemarcationToken) -> io::Result<bool> {
        let needle = token.to_string();
        if !is_archive(file) {
            return reader_contains(BufReader::new(File::open(file)?), needle.as_bytes());
        }

        let mut archive = tar::Archive::new(GzDecoder::new(File::open(file)?));
        for entry in archive.entries()? {
            let entry = entry?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            if reader_contains(BufReader::new(entry), needle.as_bytes())? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn extract_archive(&self, archive: &Path, workspace: &Path) -> io::Result<Vec<PathBuf>> {
        std::fs::create_dir_all(workspace)?;
        let mut reader = tar::Archive::new(GzDecoder::new(File::open(archive)?));
        let mut members = Vec::new();
        for entry in reader.entries()? {
            let mut entry = entry?;
            let is_file = entry.header().entry_type().is_file();
            let relative = entry.path()?.into_owned();
            if !entry.unpack_in(workspace)? {
                tracing::warn!(
                    "skipping archive member {} escaping the workspace",
                    relative.display()
                );
                continue;
            }
            if is_file {
                members.push(workspace.join(relative));
            }
        }
        members.sort();
        Ok(members)
    }
}

fn reader_contains<R: Read>(mut reader: BufReader<R>, needle: &[u8]) -> io::Result<bool> {
    let mut line = Vec::new();
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            return Ok(false);
        }
        if line_contains_token(&line, needle) {
            return Ok(true);
        }
    }
}

pub(crate) fn is_archive(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(".tar.gz") || name.ends_with(".tgz"))
}

/// Where a physical file sits in the chronological order of the corpus:
/// every archive member comes before rotated live files, which come before
/// the active file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum TimelinePosition {
    Archived {
        stamp: NaiveDateTime,
        archive: String,
        member: String,
    },
    Rotated {
        name: String,
    },
    Active {
        name: String,
    },
}

impl TimelinePosition {
    pub fn is_archived(&self) -> bool {
        matches!(self, Self::Archived { .. })
    }
}

/// A readable (uncompressed) file of the corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFile {
    pub path: PathBuf,
    pub position: TimelinePosition,
}

/// A compressed archive whose file name carries its closing timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveFile {
    pub path: PathBuf,
    pub name: String,
    pub stamp: NaiveDateTime,
}

/// Parse the `_DD-MM-YYYY_HHMMSS` suffix of an archive name such as
/// `iqtrace_main_17-10-2026_221500.tar.gz`.
pub fn parse_archive_timestamp(name: &str) -> Option<NaiveDateTime> {
    let (rest, time_part) = name.rsplit_once('_')?;
    let time = time_part.split('.').next()?;
    let (_, date) = rest.rsplit_once('_')?;
    let date = NaiveDate::parse_from_str(date, "%d-%m-%Y").ok()?;
    let time = NaiveTime::parse_from_str(time, "%H%M%S").ok()?;
    Some(date.and_time(time))
}

/// Lists the live and archived files that make up the corpus.
#[derive(Debug, Clone)]
pub struct LogCorpus {
    config: CorpusConfig,
}

impl LogCorpus {
    pub fn new(config: CorpusConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CorpusConfig {
        &self.config
    }

    /// Live files ordered oldest first.
    pub fn live_files(&self) -> Result<Vec<LogFile>> {
        let mut files: Vec<LogFile> = self
            .prefixed_files(&self.config.data_dir)?
            .into_iter()
            .map(|(name, path)| {
                let position = if name.ends_with(ROTATED_SUFFIX) {
                    TimelinePosition::Rotated { name }
                } else {
                    TimelinePosition::Active { name }
                };
                LogFile { path, position }
            })
            .collect();
        files.sort_by(|a, b| a.position.cmp(&b.position));
        Ok(files)
    }

    /// Archives ordered by the timestamp embedded in their name, earliest
    /// first. Names without a parseable timestamp are ignored.
    pub fn archives(&self) -> Result<Vec<ArchiveFile>> {
        let mut archives: Vec<ArchiveFile> = self
            .prefixed_files(&self.config.archive_dir)?
            .into_iter()
            .filter_map(|(name, path)| match parse_archive_timestamp(&name) {
                Some(stamp) => Some(ArchiveFile { path, name, stamp }),
                None => {
                    tracing::debug!("ignoring archive without a timestamp suffix: {name}");
                    None
                }
            })
            .collect();
        archives.sort_by(|a, b| (a.stamp, &a.name).cmp(&(b.stamp, &b.name)));
        Ok(archives)
    }

    fn prefixed_files(&self, dir: &Path) -> Result<Vec<(String, PathBuf)>> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::info!("No files present in {}", dir.display());
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(SegmentError::Io {
                    path: dir.to_path_buf(),
                    source,
                });
            }
        };

        let mut collected = Vec::new();
        for entry in entries {
            let entry = entry.map_err(SegmentError::io(dir))?;
            let is_file = entry.file_type().map(|ft| ft.is_file()).unwrap_or(false);
            if !is_file {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if name.starts_with(&self.config.log_prefix) {
                collected.push((name, entry.path()));
            }
        }
        Ok(collected)
    }
}

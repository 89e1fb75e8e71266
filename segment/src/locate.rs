use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::corpus::ArchiveFile;
use crate::corpus::CorpusAccess;
use crate::corpus::LogCorpus;
use crate::corpus::LogFile;
use crate::corpus::TimelinePosition;
use crate::error::Result;
use crate::error::SegmentError;
use crate::token::DemarcationToken;

const UNTAR_SUBDIR: &str = "untar";

/// Finds the physical file holding a demarcation marker.
///
/// Live files are searched first. Only when the marker is absent there are
/// the archives searched, earliest timestamp first, and the first archive
/// that contains it wins. On that first archive hit the archives from the
/// hit onwards are unpacked into the scratch workspace; later lookups in the
/// same invocation reuse the unpacked copies.
pub struct Locator<A: CorpusAccess> {
    corpus: LogCorpus,
    access: A,
    range_unpacked: bool,
    unpacked: BTreeMap<String, Vec<LogFile>>,
}

impl<A: CorpusAccess> Locator<A> {
    pub fn new(corpus: LogCorpus, access: A) -> Self {
        Self {
            corpus,
            access,
            range_unpacked: false,
            unpacked: BTreeMap::new(),
        }
    }

    pub fn corpus(&self) -> &LogCorpus {
        &self.corpus
    }

    pub fn locate(&mut self, token: &DemarcationToken) -> Result<Option<LogFile>> {
        for live in self.corpus.live_files()? {
            let found = self
                .access
                .contains(&live.path, token)
                .map_err(SegmentError::io(&live.path))?;
            if found {
                tracing::info!("{token} present in {}", live.path.display());
                return Ok(Some(live));
            }
        }

        let archives = self.corpus.archives()?;
        let Some(hit) = self.first_archive_containing(&archives, token) else {
            return Ok(None);
        };
        tracing::info!("{token} present in archived file {}", hit.path.display());

        if !self.range_unpacked {
            for archive in archives.iter().filter(|a| a.stamp >= hit.stamp) {
                self.unpack(archive);
            }
            self.range_unpacked = true;
        } else if !self.unpacked.contains_key(&hit.name) {
            self.unpack(&hit);
        }

        let members = self.unpacked.get(&hit.name).cloned().unwrap_or_default();
        for member in members {
            let found = self
                .access
                .contains(&member.path, token)
                .map_err(SegmentError::io(&member.path))?;
            if found {
                tracing::info!("post unpacking, {token} present in {}", member.path.display());
                return Ok(Some(member));
            }
        }
        Ok(None)
    }

    /// Every known readable file from `start` to `end` inclusive, in timeline
    /// order. Archives that were never unpacked are not part of it.
    pub fn files_between(&self, start: &LogFile, end: &LogFile) -> Result<Vec<LogFile>> {
        let mut files: Vec<LogFile> = self.unpacked.values().flatten().cloned().collect();
        files.extend(self.corpus.live_files()?);
        files.retain(|f| f.position >= start.position && f.position <= end.position);
        files.sort_by(|a, b| a.position.cmp(&b.position));
        files.dedup_by(|a, b| a.path == b.path);
        Ok(files)
    }

    /// The earliest readable file currently known to the locator.
    pub fn earliest_file(&self) -> Result<Option<LogFile>> {
        let unpacked = self.unpacked.values().flatten().cloned();
        let live = self.corpus.live_files()?;
        Ok(unpacked
            .chain(live)
            .min_by(|a, b| a.position.cmp(&b.position)))
    }

    /// Remove the scratch workspace holding unpacked archives.
    pub fn cleanup(&mut self) {
        let scratch = &self.corpus.config().scratch_dir;
        if scratch.exists()
            && let Err(err) = std::fs::remove_dir_all(scratch)
        {
            tracing::warn!("failed to remove scratch dir {}: {err}", scratch.display());
        }
        self.unpacked.clear();
        self.range_unpacked = false;
    }

    fn first_archive_containing(
        &self,
        archives: &[ArchiveFile],
        token: &DemarcationToken,
    ) -> Option<ArchiveFile> {
        archives
            .iter()
            .find(|archive| match self.access.contains(&archive.path, token) {
                Ok(found) => found,
                Err(err) => {
                    tracing::warn!(
                        "archive {} unavailable, skipping it: {err}",
                        archive.path.display()
                    );
                    false
                }
            })
            .cloned()
    }

    fn unpack(&mut self, archive: &ArchiveFile) {
        let workspace = self.workspace_for(archive);
        if workspace.exists()
            && let Err(err) = std::fs::remove_dir_all(&workspace)
        {
            tracing::warn!("failed to clear {}: {err}", workspace.display());
        }
        match self.access.extract_archive(&archive.path, &workspace) {
            Ok(paths) => {
                tracing::info!(
                    "Archive {} within the expected range, unpacked {} file(s)",
                    archive.name,
                    paths.len()
                );
                let members = paths
                    .into_iter()
                    .map(|path| {
                        let member = path
                            .strip_prefix(&workspace)
                            .unwrap_or(&path)
                            .to_string_lossy()
                            .into_owned();
                        LogFile {
                            position: TimelinePosition::Archived {
                                stamp: archive.stamp,
                                archive: archive.name.clone(),
                                member,
                            },
                            path,
                        }
                    })
                    .collect();
                self.unpacked.insert(archive.name.clone(), members);
            }
            Err(err) => {
                tracing::warn!(
                    "archive {} unavailable, skipping that part of the range: {err}",
                    archive.path.display()
                );
            }
        }
    }

    fn workspace_for(&self, archive: &ArchiveFile) -> PathBuf {
        self.corpus
            .config()
            .scratch_dir
            .join(UNTAR_SUBDIR)
            .join(&archive.name)
    }
}

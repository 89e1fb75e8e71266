//! Level 1: copy the log text between the cursor's demarcation marker and
//! the next one.
//!
//! Cursor commit order: the backup copy is taken and the *next* instance is
//! written to the cursor before the end marker is searched for. If the end
//! marker is missing the backup is restored, so the cursor never skips a
//! window. Callers must treat one [`SegmentExtractor::extract_next`] call as
//! an atomic step: cancellation is only honored between calls.

use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use crate::corpus::CorpusAccess;
use crate::corpus::LogFile;
use crate::cursor::CursorStore;
use crate::error::Result;
use crate::error::SegmentError;
use crate::locate::Locator;
use crate::token::DemarcationToken;
use crate::token::line_contains_token;

/// A contiguous run of bytes `[start, end)` copied from one physical file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteRange {
    pub file: PathBuf,
    pub start: u64,
    pub end: u64,
}

/// The text between two demarcation markers. `start_token` is `None` for
/// the head segment, which begins at the start of the earliest file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub start_token: Option<DemarcationToken>,
    pub end_token: DemarcationToken,
    pub source_files: Vec<PathBuf>,
    pub byte_ranges: Vec<ByteRange>,
}

impl Segment {
    pub fn len(&self) -> u64 {
        self.byte_ranges.iter().map(|r| r.end - r.start).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentOutcome {
    /// The window `start..=start.next()` was copied and the cursor advanced.
    Extracted(Segment),
    /// First instance of a run: everything up to the first marker was
    /// copied. The cursor is unchanged; the next run extracts `1..=2`.
    HeadSegment(Segment),
    /// The first marker of the run has not been written yet.
    AwaitingFirstMarker(DemarcationToken),
}

pub struct SegmentExtractor<A: CorpusAccess> {
    locator: Locator<A>,
    cursor: CursorStore,
    first_instance_marker: PathBuf,
}

impl<A: CorpusAccess> SegmentExtractor<A> {
    pub fn new(locator: Locator<A>, cursor: CursorStore, first_instance_marker: PathBuf) -> Self {
        Self {
            locator,
            cursor,
            first_instance_marker,
        }
    }

    pub fn cursor(&self) -> &CursorStore {
        &self.cursor
    }

    /// Run one Level 1 step, streaming the segment into `out`.
    pub fn extract_next<W: Write>(&mut self, out: &mut W) -> Result<SegmentOutcome> {
        let result = self.extract_inner(out);
        self.locator.cleanup();
        result
    }

    fn extract_inner<W: Write>(&mut self, out: &mut W) -> Result<SegmentOutcome> {
        let mut start = self.cursor.load()?;
        tracing::info!("Start demarcation from cursor: {start}");

        if start.is_first_instance() && !self.first_instance_marker.exists() {
            return self.extract_head(&start, out);
        }

        let start_file = match self.locator.locate(&start)? {
            Some(file) => file,
            None => match self.retry_with_backup(&start)? {
                Some((previous, file)) => {
                    start = previous;
                    file
                }
                None if start.is_first_instance() => {
                    tracing::info!("no end demarcation present yet for the first instance");
                    return Ok(SegmentOutcome::AwaitingFirstMarker(start));
                }
                None => {
                    tracing::error!("Demarcation not found: {start}");
                    return Err(SegmentError::MarkerNotFound(start));
                }
            },
        };

        self.cursor.backup()?;
        let end = start.next();
        self.cursor.store(&end)?;
        tracing::info!("Updated the cursor with next instance: {end}");

        let Some(end_file) = self.locator.locate(&end)? else {
            self.cursor.restore_backup()?;
            tracing::error!("Demarcation not found: {end}");
            return Err(SegmentError::MarkerNotFound(end));
        };
        if end_file.position < start_file.position {
            self.cursor.restore_backup()?;
            return Err(SegmentError::BoundariesOutOfOrder { start, end });
        }

        let files = if start_file.path == end_file.path {
            vec![start_file]
        } else {
            tracing::info!(
                "Start and end demarcation are in different files: {} and {}",
                start_file.path.display(),
                end_file.path.display()
            );
            self.locator.files_between(&start_file, &end_file)?
        };

        match copy_window(&files, Some(&start), &end, out)? {
            Some(byte_ranges) => {
                tracing::info!("Successfully parsed data from {start} to {end}");
                Ok(SegmentOutcome::Extracted(Segment {
                    start_token: Some(start),
                    end_token: end,
                    source_files: byte_ranges.iter().map(|r| r.file.clone()).collect(),
                    byte_ranges,
                }))
            }
            None => {
                self.cursor.restore_backup()?;
                Err(SegmentError::BoundariesOutOfOrder { start, end })
            }
        }
    }

    fn retry_with_backup(
        &mut self,
        missing: &DemarcationToken,
    ) -> Result<Option<(DemarcationToken, LogFile)>> {
        let Some(previous) = self.cursor.restore_backup()? else {
            return Ok(None);
        };
        if &previous == missing {
            return Ok(None);
        }
        tracing::info!("Copying back previous instance {previous} as {missing} was not found");
        Ok(self
            .locator
            .locate(&previous)?
            .map(|file| (previous, file)))
    }

    fn extract_head<W: Write>(
        &mut self,
        first: &DemarcationToken,
        out: &mut W,
    ) -> Result<SegmentOutcome> {
        let Some(marker_file) = self.locator.locate(first)? else {
            return Ok(SegmentOutcome::AwaitingFirstMarker(first.clone()));
        };
        let earliest = self
            .locator
            .earliest_file()?
            .unwrap_or_else(|| marker_file.clone());
        let files = self.locator.files_between(&earliest, &marker_file)?;

        let Some(byte_ranges) = copy_window(&files, None, first, out)? else {
            return Err(SegmentError::MarkerNotFound(first.clone()));
        };
        touch(&self.first_instance_marker)?;
        tracing::info!("Successfully parsed data from start of the logs to {first}");
        Ok(SegmentOutcome::HeadSegment(Segment {
            start_token: None,
            end_token: first.clone(),
            source_files: byte_ranges.iter().map(|r| r.file.clone()).collect(),
            byte_ranges,
        }))
    }
}

/// Stream `files` in order, copying from the line holding `start` (or from
/// the first byte when `start` is `None`) through the line holding `end`.
/// Returns `None` if the end marker never follows the start marker.
fn copy_window<W: Write>(
    files: &[LogFile],
    start: Option<&DemarcationToken>,
    end: &DemarcationToken,
    out: &mut W,
) -> Result<Option<Vec<ByteRange>>> {
    let start_needle = start.map(ToString::to_string);
    let end_needle = end.to_string();
    let mut copying = start_needle.is_none();
    let mut ranges = Vec::new();
    let mut line = Vec::new();

    for file in files {
        tracing::info!("Parsing file: {}", file.path.display());
        let mut reader = BufReader::new(File::open(&file.path).map_err(SegmentError::io(&file.path))?);
        let mut offset: u64 = 0;
        let mut range_start = copying.then_some(0);

        loop {
            line.clear();
            let read = reader
                .read_until(b'\n', &mut line)
                .map_err(SegmentError::io(&file.path))?;
            if read == 0 {
                break;
            }
            let line_start = offset;
            offset += read as u64;

            if !copying {
                let Some(needle) = start_needle.as_deref() else {
                    continue;
                };
                if line_contains_token(&line, needle.as_bytes()) {
                    copying = true;
                    range_start = Some(line_start);
                    write_line(out, &line, &file.path)?;
                }
                continue;
            }

            write_line(out, &line, &file.path)?;
            if line_contains_token(&line, end_needle.as_bytes()) {
                ranges.push(ByteRange {
                    file: file.path.clone(),
                    start: range_start.unwrap_or(0),
                    end: offset,
                });
                out.flush().map_err(SegmentError::io(&file.path))?;
                return Ok(Some(ranges));
            }
        }

        if let Some(range_start) = range_start {
            ranges.push(ByteRange {
                file: file.path.clone(),
                start: range_start,
                end: offset,
            });
        }
    }
    Ok(None)
}

fn write_line<W: Write>(out: &mut W, line: &[u8], source: &Path) -> Result<()> {
    out.write_all(line).map_err(SegmentError::io(source))
}

fn touch(path: &Path) -> Result<()> {
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map(|_| ())
        .map_err(SegmentError::io(path))
}

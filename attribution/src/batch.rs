//! One Level 2 invocation over one input partition.

use std::collections::HashSet;
use std::fs::File;
use std::fs::OpenOptions;
use std::io::BufReader;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::path::PathBuf;

use chrono::NaiveDate;
use chrono::NaiveDateTime;
use countertool_config::AttributionConfig;

use crate::attribute::Attribution;
use crate::attribute::CounterAttributor;
use crate::dictionary::Dictionaries;
use crate::error::AttributionError;
use crate::error::Result;
use crate::harvest::harvest;
use crate::queue::QueryMetadataEntry;
use crate::queue::QueryState;
use crate::queue::append_entries;
use crate::queue::append_lines;
use crate::queue::next_id;
use crate::queue::read_entries;
use crate::retry::RetryQueue;

/// Timestamp embedded in every per-invocation file name.
pub const RUN_STAMP_FORMAT: &str = "%d-%m-%Y_%H:%M:%S";

/// Per-invocation file name stamp: the run time followed by the process id,
/// so runs started within the same second do not share files.
pub fn run_stamp(now: NaiveDateTime) -> String {
    format!("{}_{}", now.format(RUN_STAMP_FORMAT), std::process::id())
}

const RETRY_QUEUE_FILE: &str = "query_breakdown.txt";
const PARSED_METADATA_FILE: &str = "metadata_file.txt";
const FAILED_QUERIES_FILE: &str = "failed_parsed_queries.txt";
pub const LEVEL2_OUTPUT_PREFIX: &str = "Parse_Level2.log_";

/// Marks a running invocation in the sentinel directory for as long as it
/// is alive.
#[derive(Debug)]
pub struct SentinelGuard {
    path: PathBuf,
}

impl SentinelGuard {
    /// Create the sentinel. Fails with [`AttributionError::SentinelExists`]
    /// when the file is already there, leaving it to its owner.
    pub fn create(path: PathBuf) -> Result<Self> {
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => Ok(Self { path }),
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(AttributionError::SentinelExists { path })
            }
            Err(source) => Err(AttributionError::Io { path, source }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SentinelGuard {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            tracing::warn!("failed to remove sentinel {}: {err}", self.path.display());
        }
    }
}

/// The files one invocation reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFiles {
    pub batch_file: PathBuf,
    pub parsed_metadata_file: PathBuf,
    pub output_file: PathBuf,
    pub failed_file: PathBuf,
    pub sentinel: PathBuf,
}

impl BatchFiles {
    pub fn new(config: &AttributionConfig, stamp: &str) -> Self {
        Self {
            batch_file: config.work_dir.join(format!("{RETRY_QUEUE_FILE}_{stamp}")),
            parsed_metadata_file: config.work_dir.join(format!("{PARSED_METADATA_FILE}_{stamp}")),
            output_file: config.output_dir.join(format!("{LEVEL2_OUTPUT_PREFIX}{stamp}")),
            failed_file: config.failed_dir.join(FAILED_QUERIES_FILE),
            sentinel: config.sentinel_dir.join(format!("parallel_thread_{stamp}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub parsed: usize,
    pub failed: usize,
    pub records: usize,
    pub output_file: PathBuf,
    /// Set when at least one query failed attribution.
    pub failed_file: Option<PathBuf>,
}

impl BatchSummary {
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

#[derive(Default)]
struct Progress {
    parsed: usize,
    failed: usize,
    records: usize,
}

pub struct BatchRunner<'a> {
    config: &'a AttributionConfig,
    dict: &'a Dictionaries,
    today: NaiveDate,
    files: BatchFiles,
}

impl<'a> BatchRunner<'a> {
    pub fn new(config: &'a AttributionConfig, dict: &'a Dictionaries, now: NaiveDateTime) -> Self {
        Self {
            config,
            dict,
            today: now.date(),
            files: BatchFiles::new(config, &run_stamp(now)),
        }
    }

    pub fn files(&self) -> &BatchFiles {
        &self.files
    }

    /// Harvest `input`, attribute every queued query and report the outcome.
    ///
    /// Per-query failures are collected and reported in the summary. Any
    /// other error while attributing aborts the batch: every entry not yet
    /// recorded as PARSED goes back to the retry queue and
    /// [`AttributionError::BatchAborted`] is returned.
    pub fn run(&self, input: &Path) -> Result<BatchSummary> {
        for dir in [
            &self.config.work_dir,
            &self.config.output_dir,
            &self.config.failed_dir,
            &self.config.sentinel_dir,
        ] {
            std::fs::create_dir_all(dir).map_err(AttributionError::io(dir))?;
        }
        let _sentinel = SentinelGuard::create(self.files.sentinel.clone())?;
        let retry_queue = RetryQueue::new(self.config.work_dir.join(RETRY_QUEUE_FILE));

        let mut batch = retry_queue.take_into(&self.files.batch_file)?;
        match self.harvest_input(input, next_id(&batch)) {
            Ok(harvested) => batch.extend(harvested),
            Err(err) => return Err(self.abort(&retry_queue, &batch, err.to_string())),
        }

        let mut progress = Progress::default();
        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
            self.attribute_all(&batch, &mut progress)
        }));
        let abort_reason = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(err.to_string()),
            Err(_) => Some("attribution panicked".to_string()),
        };
        if let Some(reason) = abort_reason {
            return Err(self.abort(&retry_queue, &batch, reason));
        }

        let failed_file = if progress.failed > 0 {
            self.preserve_input(input);
            tracing::error!(
                "failed to parse {} queries, see {}",
                progress.failed,
                self.files.failed_file.display()
            );
            Some(self.files.failed_file.clone())
        } else {
            tracing::info!("Level 2 completed successfully for this input");
            None
        };
        self.remove_scratch_metadata();

        Ok(BatchSummary {
            parsed: progress.parsed,
            failed: progress.failed,
            records: progress.records,
            output_file: self.files.output_file.clone(),
            failed_file,
        })
    }

    fn harvest_input(&self, input: &Path, first_id: u64) -> Result<Vec<QueryMetadataEntry>> {
        let reader = BufReader::new(File::open(input).map_err(AttributionError::io(input))?);
        let harvested = harvest(reader, first_id).map_err(AttributionError::io(input))?;
        tracing::info!(
            "creating metadata file {} to track parsing",
            self.files.batch_file.display()
        );
        append_entries(&self.files.batch_file, &harvested)?;
        Ok(harvested)
    }

    fn attribute_all(&self, batch: &[QueryMetadataEntry], progress: &mut Progress) -> Result<()> {
        let attributor = CounterAttributor::new(self.dict, self.today);
        for entry in batch {
            match attributor.attribute(&entry.raw_query) {
                Attribution::Parsed(records) => {
                    tracing::debug!("query {} attributed {} records", entry.id, records.len());
                    if !records.is_empty() {
                        append_lines(
                            &self.files.output_file,
                            records.iter().map(ToString::to_string),
                        )?;
                    }
                    append_entries(
                        &self.files.parsed_metadata_file,
                        [&entry.with_state(QueryState::Parsed)],
                    )?;
                    progress.parsed += 1;
                    progress.records += records.len();
                }
                Attribution::Failed { invalid_tokens } => {
                    tracing::warn!(
                        "query {} has unrecognized columns: {}",
                        entry.id,
                        invalid_tokens.join(", ")
                    );
                    append_lines(
                        &self.files.failed_file,
                        [entry.failed_line(&invalid_tokens)],
                    )?;
                    progress.failed += 1;
                }
            }
        }
        Ok(())
    }

    fn abort(
        &self,
        retry_queue: &RetryQueue,
        batch: &[QueryMetadataEntry],
        reason: String,
    ) -> AttributionError {
        tracing::error!(
            "issue encountered while attributing queries ({reason}); remaining queries will be parsed in the next run"
        );
        let parsed: HashSet<u64> = match read_entries(&self.files.parsed_metadata_file) {
            Ok(entries) => entries.into_iter().map(|e| e.id).collect(),
            Err(err) => {
                tracing::warn!("could not read parsed entries, re-queueing the whole batch: {err}");
                HashSet::new()
            }
        };
        let requeued = match retry_queue.requeue(batch, &parsed) {
            Ok(count) => count,
            Err(err) => {
                tracing::error!("failed to persist the retry queue: {err}");
                0
            }
        };
        self.remove_scratch_metadata();
        AttributionError::BatchAborted { requeued, reason }
    }

    /// Keep a copy of an input that produced failures next to the failed
    /// queries file.
    fn preserve_input(&self, input: &Path) {
        let Some(name) = input.file_name() else {
            return;
        };
        let target = self.config.failed_dir.join(name);
        if let Err(err) = std::fs::copy(input, &target) {
            tracing::warn!("failed to copy {} to {}: {err}", input.display(), target.display());
        }
    }

    fn remove_scratch_metadata(&self) {
        let path = &self.files.parsed_metadata_file;
        if let Err(err) = std::fs::remove_file(path)
            && err.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!("failed to remove {}: {err}", path.display());
        }
    }
}

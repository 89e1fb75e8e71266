use std::io::BufWriter;
use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use chrono::Local;
use chrono::NaiveDateTime;
use countertool_attribution::RUN_STAMP_FORMAT;
use countertool_config::Config;
use countertool_segment::DemarcationToken;
use countertool_segment::SegmentError;
use countertool_segment::SegmentOutcome;
use countertool_segment::extractor_from_config;

use crate::Outcome;
use crate::output::Printer;

/// Holds the path of the newest Level 1 output for `attribute` to pick up.
pub const LEVEL1_POINTER_FILE: &str = "parse_1_output";

/// `<stamp>_Parse_Level1.log_<instance>`
pub const LEVEL1_OUTPUT_INFIX: &str = "_Parse_Level1.log_";

/// Instance suffix of the head segment of a run.
const HEAD_SEGMENT_INSTANCE: u64 = 0;

#[derive(Debug)]
enum Level1 {
    Written { path: PathBuf, bytes: u64 },
    AwaitingFirstMarker(DemarcationToken),
    MarkerNotFound(DemarcationToken),
}

/// Run one extraction. Interrupts are not honored while it runs: the cursor
/// commit and the copy form one step, so Ctrl-C only prints a notice.
pub(crate) async fn run(config: &Config, printer: &Printer) -> anyhow::Result<Outcome> {
    printer.banner("Level 1: extracting the next demarcated log window");
    let now = Local::now().naive_local();
    let owned = config.clone();
    let mut extraction = tokio::task::spawn_blocking(move || extract(&owned, now));

    let level1 = loop {
        tokio::select! {
            joined = &mut extraction => {
                break joined.context("segment extraction did not complete")??;
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(err) = signal {
                    tracing::warn!("cannot listen for interrupts: {err}");
                    break (&mut extraction)
                        .await
                        .context("segment extraction did not complete")??;
                }
                printer.fatal("Interrupt ignored: segment extraction must finish to keep the cursor consistent");
            }
        }
    };

    match level1 {
        Level1::Written { path, bytes } => {
            printer.progress(&format!("Level 1 output ({bytes} bytes): {}", path.display()));
            Ok(Outcome::Success)
        }
        Level1::AwaitingFirstMarker(token) => {
            printer.progress(&format!("{token} has not been written yet, nothing to extract"));
            Ok(Outcome::Success)
        }
        Level1::MarkerNotFound(token) => {
            tracing::error!("demarcation {token} not found");
            printer.fatal(&format!(
                "Demarcation {token} not found in live or archived logs"
            ));
            Ok(Outcome::MarkerNotFound(token))
        }
    }
}

fn extract(config: &Config, now: NaiveDateTime) -> anyhow::Result<Level1> {
    let output_dir = &config.segment.output_dir;
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;
    let mut staging = tempfile::NamedTempFile::new_in(output_dir)
        .with_context(|| format!("failed to stage output in {}", output_dir.display()))?;

    let mut extractor = extractor_from_config(config);
    let result = {
        let mut writer = BufWriter::new(staging.as_file_mut());
        let result = extractor.extract_next(&mut writer);
        writer.flush().context("failed to flush Level 1 output")?;
        result
    };

    let (segment, instance) = match result {
        Ok(SegmentOutcome::Extracted(segment)) => {
            let instance = segment
                .start_token
                .as_ref()
                .map_or(HEAD_SEGMENT_INSTANCE, DemarcationToken::instance);
            (segment, instance)
        }
        Ok(SegmentOutcome::HeadSegment(segment)) => (segment, HEAD_SEGMENT_INSTANCE),
        Ok(SegmentOutcome::AwaitingFirstMarker(token)) => {
            return Ok(Level1::AwaitingFirstMarker(token));
        }
        Err(SegmentError::MarkerNotFound(token)) => return Ok(Level1::MarkerNotFound(token)),
        Err(err) => return Err(err).context("Level 1 extraction failed"),
    };

    let path = output_dir.join(format!(
        "{}{LEVEL1_OUTPUT_INFIX}{instance}",
        now.format(RUN_STAMP_FORMAT)
    ));
    staging
        .persist(&path)
        .with_context(|| format!("failed to write {}", path.display()))?;

    let work_dir = &config.attribution.work_dir;
    std::fs::create_dir_all(work_dir)
        .with_context(|| format!("failed to create {}", work_dir.display()))?;
    let pointer = work_dir.join(LEVEL1_POINTER_FILE);
    std::fs::write(&pointer, format!("{}\n", path.display()))
        .with_context(|| format!("failed to write {}", pointer.display()))?;

    tracing::info!(
        "segment {} from {} files written to {}",
        segment.end_token,
        segment.source_files.len(),
        path.display()
    );
    Ok(Level1::Written {
        path,
        bytes: segment.len(),
    })
}

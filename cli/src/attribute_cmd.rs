use std::path::PathBuf;

use anyhow::Context;
use chrono::Local;
use clap::Args;
use countertool_attribution::AttributionError;
use countertool_attribution::BatchRunner;
use countertool_attribution::Dictionaries;
use countertool_config::Config;

use crate::Outcome;
use crate::output::Printer;
use crate::segment_cmd::LEVEL1_POINTER_FILE;

#[derive(Debug, Args)]
pub struct AttributeCommand {
    /// Level 1 output to attribute. Defaults to the file the last `segment`
    /// run produced.
    #[arg(long, value_name = "FILE")]
    pub input: Option<PathBuf>,
}

pub(crate) fn run(cmd: AttributeCommand, config: &Config, printer: &Printer) -> anyhow::Result<Outcome> {
    let input = match cmd.input {
        Some(input) => input,
        None => last_level1_output(config)?,
    };
    printer.banner(&format!("Level 2: attributing queries from {}", input.display()));

    let dict = Dictionaries::load(&config.attribution).context("failed to load dictionaries")?;
    let runner = BatchRunner::new(&config.attribution, &dict, Local::now().naive_local());
    let summary = match runner.run(&input) {
        Ok(summary) => summary,
        Err(AttributionError::BatchAborted { requeued, reason }) => {
            tracing::error!("batch aborted: {reason}");
            printer.fatal(&format!(
                "Attribution aborted ({reason}); {requeued} queries re-queued for the next run"
            ));
            return Ok(Outcome::BatchAborted { requeued });
        }
        Err(err) => return Err(err).context("Level 2 attribution failed"),
    };

    printer.progress(&format!(
        "{} queries parsed, {} records written to {}",
        summary.parsed,
        summary.records,
        summary.output_file.display()
    ));
    if !summary.has_failures() {
        return Ok(Outcome::Success);
    }
    let failed_file = summary
        .failed_file
        .unwrap_or_else(|| runner.files().failed_file.clone());
    printer.fatal(&format!(
        "{} queries could not be attributed, see {}",
        summary.failed,
        failed_file.display()
    ));
    Ok(Outcome::AttributionFailures {
        failed: summary.failed,
        failed_file,
    })
}

fn last_level1_output(config: &Config) -> anyhow::Result<PathBuf> {
    let pointer = config.attribution.work_dir.join(LEVEL1_POINTER_FILE);
    let contents = std::fs::read_to_string(&pointer).with_context(|| {
        format!(
            "no --input given and {} cannot be read; run `countertool segment` first",
            pointer.display()
        )
    })?;
    let path = contents.trim();
    if path.is_empty() {
        anyhow::bail!("{} is empty", pointer.display());
    }
    Ok(PathBuf::from(path))
}

//! The `countertool` command line: one subcommand per pipeline stage.

mod attribute_cmd;
mod logging;
mod output;
mod report_cmd;
mod segment_cmd;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use countertool_config::CliConfigOverrides;
use countertool_config::Config;
use countertool_config::ConfigError;
use countertool_config::find_countertool_home;
use countertool_segment::DemarcationToken;

pub use attribute_cmd::AttributeCommand;
pub use report_cmd::ReportCommand;
pub use segment_cmd::LEVEL1_OUTPUT_INFIX;
pub use segment_cmd::LEVEL1_POINTER_FILE;

use crate::output::Printer;

/// Counter-usage mining for the query logs of the warehouse appliance.
#[derive(Debug, Parser)]
#[clap(author, version, bin_name = "countertool")]
pub struct Cli {
    #[clap(flatten)]
    pub config_overrides: CliConfigOverrides,

    /// Append log output to this file in addition to stderr.
    #[arg(long, value_name = "FILE", global = true)]
    pub log_file: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Level 1: copy the next demarcated window of the query log.
    Segment,

    /// Level 2: attribute the queries of a Level 1 segment to counters.
    Attribute(AttributeCommand),

    /// Aggregate attribution output into counter access reports.
    Report(ReportCommand),
}

/// How an invocation ended. Everything but `Success` exits with status 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    MarkerNotFound(DemarcationToken),
    AttributionFailures { failed: usize, failed_file: PathBuf },
    BatchAborted { requeued: usize },
    Failure,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_success() { 0 } else { 1 }
    }
}

pub async fn run_main(cli: Cli) -> Outcome {
    let printer = Printer::detect();
    let Cli {
        config_overrides,
        log_file,
        command,
    } = cli;

    let config = match load_config(&config_overrides, log_file) {
        Ok(config) => config,
        Err(err) => {
            printer.fatal(&format!("{err:#}"));
            return Outcome::Failure;
        }
    };
    let _log_guard = match logging::init(config.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(err) => {
            printer.fatal(&format!("{err:#}"));
            return Outcome::Failure;
        }
    };

    let result = match command {
        Command::Segment => segment_cmd::run(&config, &printer).await,
        Command::Attribute(cmd) => attribute_cmd::run(cmd, &config, &printer),
        Command::Report(cmd) => report_cmd::run(cmd, &config, &printer),
    };
    match result {
        Ok(outcome) => {
            tracing::info!("finished with {outcome:?}");
            outcome
        }
        Err(err) => {
            tracing::error!("{err:#}");
            printer.fatal(&format!("{err:#}"));
            Outcome::Failure
        }
    }
}

fn load_config(overrides: &CliConfigOverrides, log_file: Option<PathBuf>) -> anyhow::Result<Config> {
    let home = find_countertool_home().map_err(ConfigError::Home)?;
    let mut config = Config::load(&home, overrides)
        .with_context(|| format!("failed to load configuration from {}", home.display()))?;
    if log_file.is_some() {
        config.log_file = log_file;
    }
    Ok(config)
}

use chrono::Local;
use chrono::NaiveDate;
use clap::Args;
use countertool_attribution::RECORD_DATE_FORMAT;
use countertool_attribution::RUN_STAMP_FORMAT;
use countertool_config::Config;
use countertool_report::DateRange;
use countertool_report::feature_table;
use countertool_report::generate;
use countertool_report::report_paths;
use countertool_report::summary_table;

use crate::Outcome;
use crate::output::Printer;

#[derive(Debug, Args)]
pub struct ReportCommand {
    /// First observed date to include.
    #[arg(long, value_name = "DD-MM-YYYY", value_parser = parse_date)]
    pub from: Option<NaiveDate>,

    /// Last observed date to include.
    #[arg(long, value_name = "DD-MM-YYYY", value_parser = parse_date)]
    pub to: Option<NaiveDate>,
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, RECORD_DATE_FORMAT)
        .map_err(|err| format!("expected DD-MM-YYYY: {err}"))
}

pub(crate) fn run(cmd: ReportCommand, config: &Config, printer: &Printer) -> anyhow::Result<Outcome> {
    if let (Some(from), Some(to)) = (cmd.from, cmd.to)
        && from > to
    {
        anyhow::bail!("--from {from} is after --to {to}");
    }
    printer.banner("Aggregating counter access statistics");

    let now = Local::now().naive_local();
    let range = DateRange {
        from: cmd.from,
        to: cmd.to,
    };
    let generated = generate(config, range, now)?;

    printer.plain(&summary_table(generated.summary));
    printer.plain(&feature_table(&generated.features));
    let paths = report_paths(
        &now.format(RUN_STAMP_FORMAT).to_string(),
        &generated.files,
        config.log_file.as_deref(),
    );
    tracing::info!("{paths}");
    printer.highlight(&paths);
    Ok(Outcome::Success)
}

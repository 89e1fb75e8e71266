//! Aggregation of Level 2 attribution records into counter access reports.

mod aggregate;
mod error;
mod export;
mod features;
mod load;
mod render;

use chrono::NaiveDateTime;
use countertool_config::Config;

pub use aggregate::AggregateCounterStat;
pub use aggregate::CounterKey;
pub use aggregate::CounterReport;
pub use aggregate::DailyCounterStat;
pub use aggregate::FeatureSummaryRow;
pub use aggregate::Summary;
pub use aggregate::UnaccessedCounter;
pub use error::ReportError;
pub use error::Result;
pub use export::ReportFiles;
pub use export::STATISTICS_STAMP_FORMAT;
pub use export::csv_sibling;
pub use export::write_all;
pub use features::FeatureMap;
pub use features::NO_FEATURE;
pub use load::DateRange;
pub use load::level2_outputs;
pub use load::load_master;
pub use load::load_records;
pub use render::feature_table;
pub use render::report_paths;
pub use render::summary_table;

/// Everything one report run produced.
#[derive(Debug, Clone)]
pub struct GeneratedReport {
    pub report: CounterReport,
    pub summary: Summary,
    pub features: Vec<FeatureSummaryRow>,
    pub files: ReportFiles,
}

/// Load the records observed within `range`, aggregate them against the
/// master dictionary and write the statistics artifacts stamped with `now`.
pub fn generate(config: &Config, range: DateRange, now: NaiveDateTime) -> Result<GeneratedReport> {
    let records = load_records(&config.attribution.output_dir, range)?;
    let master = load_master(&config.attribution.master_file)?;
    let feature_map = FeatureMap::load(&config.report.features_file)?;

    let report = CounterReport::build(&records, &master, &feature_map);
    let summary = report.summary();
    let features = report.feature_summary(&feature_map);

    let stamp = now.format(STATISTICS_STAMP_FORMAT).to_string();
    let files = ReportFiles::new(&config.report.statistics_dir, &stamp);
    write_all(&report, &files)?;

    Ok(GeneratedReport {
        report,
        summary,
        features,
        files,
    })
}

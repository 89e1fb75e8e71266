use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use countertool_attribution::RECORD_DATE_FORMAT;

use crate::aggregate::CounterReport;
use crate::error::ReportError;
use crate::error::Result;

/// Timestamp prefix of every statistics artifact.
pub const STATISTICS_STAMP_FORMAT: &str = "%d-%m-%Y_%H-%M-%S";

const NOT_ACCESSED_DATE: &str = "NA";

const AGGREGATED_COLUMNS: [&str; 5] = [
    "Table_Name",
    "Counter_Name",
    "Total Access_Count",
    "Last_Access_Date",
    "Feature_Name",
];

const DAILY_COLUMNS: [&str; 5] = [
    "Table_Name",
    "Counter_Name",
    "Access_Count",
    "Access_Date",
    "Feature_Name",
];

/// Paths of one report run. Each text artifact has a `.csv` sibling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFiles {
    pub aggregated: PathBuf,
    pub per_date: PathBuf,
    pub unused: PathBuf,
}

impl ReportFiles {
    pub fn new(statistics_dir: &Path, stamp: &str) -> Self {
        Self {
            aggregated: statistics_dir.join(format!("{stamp}_aggregated_counters")),
            per_date: statistics_dir.join(format!("{stamp}_counter_data_per_date")),
            unused: statistics_dir.join(format!("{stamp}_unused_counter_list_file")),
        }
    }
}

pub fn csv_sibling(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".csv");
    PathBuf::from(name)
}

type Row = [String; 5];

pub fn aggregated_rows(report: &CounterReport) -> Vec<Row> {
    report
        .aggregated
        .iter()
        .map(|(key, stat)| {
            [
                key.table_name.clone(),
                key.counter_name.clone(),
                stat.total_access_count.to_string(),
                stat.last_access_date.format(RECORD_DATE_FORMAT).to_string(),
                stat.feature_name.clone(),
            ]
        })
        .collect()
}

pub fn per_date_rows(report: &CounterReport) -> Vec<Row> {
    report
        .per_day
        .iter()
        .map(|((key, date), stat)| {
            [
                key.table_name.clone(),
                key.counter_name.clone(),
                stat.access_count.to_string(),
                date.format(RECORD_DATE_FORMAT).to_string(),
                stat.feature_name.clone(),
            ]
        })
        .collect()
}

pub fn unused_rows(report: &CounterReport) -> Vec<Row> {
    report
        .unaccessed
        .iter()
        .map(|counter| {
            [
                counter.key.table_name.clone(),
                counter.key.counter_name.clone(),
                "0".to_string(),
                NOT_ACCESSED_DATE.to_string(),
                counter.feature_name.clone(),
            ]
        })
        .collect()
}

/// Write every artifact of `report` into `files`, creating the parent
/// directory first. The aggregated artifact lists unaccessed counters after
/// the accessed ones.
pub fn write_all(report: &CounterReport, files: &ReportFiles) -> Result<()> {
    if let Some(parent) = files.aggregated.parent() {
        std::fs::create_dir_all(parent).map_err(ReportError::io(parent))?;
    }
    let unused = unused_rows(report);
    let mut aggregated = aggregated_rows(report);
    aggregated.extend(unused.iter().cloned());
    write_artifact(&files.aggregated, AGGREGATED_COLUMNS, &aggregated)?;
    write_artifact(&files.per_date, DAILY_COLUMNS, &per_date_rows(report))?;
    write_artifact(&files.unused, DAILY_COLUMNS, &unused)?;
    tracing::info!(
        "wrote {} aggregated, {} daily and {} unused rows",
        report.aggregated.len(),
        report.per_day.len(),
        report.unaccessed.len()
    );
    Ok(())
}

fn write_artifact(path: &Path, columns: [&str; 5], rows: &[Row]) -> Result<()> {
    let mut text = String::new();
    text.push_str(&format!("# {} #\n", columns.join("::")));
    for row in rows {
        text.push_str(&row.join("::"));
        text.push('\n');
    }
    let mut file = std::fs::File::create(path).map_err(ReportError::io(path))?;
    file.write_all(text.as_bytes()).map_err(ReportError::io(path))?;

    let csv_path = csv_sibling(path);
    let mut writer = csv::Writer::from_path(&csv_path).map_err(ReportError::csv(&csv_path))?;
    writer
        .write_record(columns)
        .map_err(ReportError::csv(&csv_path))?;
    for row in rows {
        writer.write_record(row).map_err(ReportError::csv(&csv_path))?;
    }
    writer.flush().map_err(ReportError::io(&csv_path))?;
    Ok(())
}

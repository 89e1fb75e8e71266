//! Plain-text console tables. Coloring is left to the caller.

use std::fmt::Write as _;
use std::path::Path;

use crate::aggregate::FeatureSummaryRow;
use crate::aggregate::Summary;
use crate::export::ReportFiles;
use crate::export::csv_sibling;

pub fn summary_table(summary: Summary) -> String {
    let dash = "-".repeat(100);
    let mut out = String::new();
    let _ = writeln!(out, "{dash}");
    let _ = writeln!(out, "{:<80}{:>10}", "PARAMETER", "VALUE");
    let _ = writeln!(out, "{dash}");
    for (label, value) in [
        ("Total Unique Counters", summary.total_uniq_count),
        ("Total Unique Accessed Counters", summary.total_accessed),
        ("Total Unique Unaccessed Counters", summary.total_unaccessed),
    ] {
        let _ = writeln!(out, "{label:<80}{value:>10}");
    }
    out
}

pub fn feature_table(rows: &[FeatureSummaryRow]) -> String {
    let dash = "-".repeat(108);
    let mut out = String::new();
    let _ = writeln!(out, "{dash}");
    let _ = writeln!(
        out,
        "{:<50}{:>20}{:>30}",
        " Feature_Name", "Accessed_Counters", "Unaccessed_Counters"
    );
    let _ = writeln!(out, "{dash}");
    for row in rows {
        let _ = writeln!(
            out,
            "{:<50}{:>10}{:>40}",
            row.feature_name, row.accessed, row.unaccessed
        );
    }
    out
}

/// The CSV locations of `files` under a `stamp` banner, plus the run log
/// when there is one.
pub fn report_paths(stamp: &str, files: &ReportFiles, log_file: Option<&Path>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "--------- {stamp}: Report Details :---------");
    let _ = writeln!(
        out,
        "Aggregated access count across the selected Time Range:{}",
        csv_sibling(&files.aggregated).display()
    );
    let _ = writeln!(
        out,
        "Daywise statistics across the selected Time Range:{}",
        csv_sibling(&files.per_date).display()
    );
    let _ = writeln!(
        out,
        "Unaccessed counter data across the selected Time Range:{}",
        csv_sibling(&files.unused).display()
    );
    if let Some(log_file) = log_file {
        let _ = writeln!(out, "Summary Report:{}", log_file.display());
    }
    out
}

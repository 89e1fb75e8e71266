use std::path::Path;
use std::path::PathBuf;

use chrono::NaiveDate;
use countertool_attribution::AttributionRecord;
use countertool_attribution::LEVEL2_OUTPUT_PREFIX;
use countertool_attribution::MasterEntry;
use countertool_attribution::parse_master_line;

use crate::error::ReportError;
use crate::error::Result;

/// Inclusive bounds on `observed_date`; an open side is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.is_none_or(|from| date >= from) && self.to.is_none_or(|to| date <= to)
    }
}

/// Every Level 2 output file in `dir`, sorted by name.
pub fn level2_outputs(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!("no attribution output directory at {}", dir.display());
            return Ok(Vec::new());
        }
        Err(source) => {
            return Err(ReportError::Io {
                path: dir.to_path_buf(),
                source,
            });
        }
    };
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(ReportError::io(dir))?;
        let name = entry.file_name();
        if name.to_string_lossy().starts_with(LEVEL2_OUTPUT_PREFIX) {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Load the records of every Level 2 output in `dir` observed within
/// `range`.
pub fn load_records(dir: &Path, range: DateRange) -> Result<Vec<AttributionRecord>> {
    let mut records = Vec::new();
    for path in level2_outputs(dir)? {
        let contents = std::fs::read_to_string(&path).map_err(ReportError::io(&path))?;
        for (idx, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record: AttributionRecord =
                line.parse().map_err(|message| ReportError::MalformedRecord {
                    path: path.clone(),
                    line_number: idx + 1,
                    message,
                })?;
            if range.contains(record.observed_date) {
                records.push(record);
            }
        }
    }
    tracing::info!("loaded {} attribution records", records.len());
    Ok(records)
}

pub fn load_master(path: &Path) -> Result<Vec<MasterEntry>> {
    let contents = std::fs::read_to_string(path).map_err(ReportError::io(path))?;
    Ok(contents.lines().filter_map(parse_master_line).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, day).unwrap_or_default()
    }

    #[test]
    fn range_bounds_are_inclusive() {
        let range = DateRange {
            from: Some(date(10)),
            to: Some(date(12)),
        };
        assert!(!range.contains(date(9)));
        assert!(range.contains(date(10)));
        assert!(range.contains(date(12)));
        assert!(!range.contains(date(13)));
        assert!(DateRange::default().contains(date(1)));
    }

    #[test]
    fn loads_only_level2_outputs_within_range() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        std::fs::write(
            tmp.path().join("Parse_Level2.log_10-10-2026_10:00:00"),
            "T1::VIEW::c1::10-10-2026\n\nT2::BASE::c2::11-10-2026\n",
        )?;
        std::fs::write(
            tmp.path().join("Parse_Level2.log_12-10-2026_10:00:00"),
            "T1::VIEW::c1::12-10-2026\n",
        )?;
        std::fs::write(tmp.path().join("notes.txt"), "garbage\n")?;

        let records = load_records(
            tmp.path(),
            DateRange {
                from: Some(date(11)),
                to: None,
            },
        )?;
        let tables: Vec<&str> = records.iter().map(|r| r.table_name.as_str()).collect();
        assert_eq!(tables, vec!["T2", "T1"]);
        Ok(())
    }

    #[test]
    fn malformed_record_names_its_line() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        std::fs::write(
            tmp.path().join("Parse_Level2.log_x"),
            "T1::VIEW::c1::10-10-2026\nT1::VIEW\n",
        )?;
        let err = load_records(tmp.path(), DateRange::default()).err();
        assert!(
            matches!(err, Some(ReportError::MalformedRecord { line_number: 2, .. })),
            "{err:?}"
        );
        Ok(())
    }

    #[test]
    fn missing_output_directory_has_no_records() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        assert!(load_records(&tmp.path().join("absent"), DateRange::default())?.is_empty());
        Ok(())
    }
}

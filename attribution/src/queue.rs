//! The `id::query::STATE` metadata files used to track each harvested query.

use std::fmt;
use std::fs::OpenOptions;
use std::io::BufWriter;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

use crate::error::AttributionError;
use crate::error::Result;

const FIELD_SEPARATOR: &str = "::";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryState {
    NotParsed,
    Parsed,
    Failed,
}

impl QueryState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotParsed => "NOT PARSED",
            Self::Parsed => "PARSED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for QueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryState {
    type Err = ();

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim() {
            "NOT PARSED" => Ok(Self::NotParsed),
            "PARSED" => Ok(Self::Parsed),
            "FAILED" => Ok(Self::Failed),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryMetadataEntry {
    pub id: u64,
    pub raw_query: String,
    pub state: QueryState,
}

impl QueryMetadataEntry {
    pub fn new(id: u64, raw_query: impl Into<String>) -> Self {
        Self {
            id,
            raw_query: raw_query.into(),
            state: QueryState::NotParsed,
        }
    }

    pub fn with_state(&self, state: QueryState) -> Self {
        Self {
            state,
            ..self.clone()
        }
    }

    /// The line written to the failed-queries file: the entry in FAILED
    /// state followed by the offending projection tokens.
    pub fn failed_line(&self, invalid_tokens: &[String]) -> String {
        let failed = self.with_state(QueryState::Failed);
        format!("{failed}{FIELD_SEPARATOR}{}", invalid_tokens.join(" ,"))
    }

    /// Parse one queue line. The id is everything before the first `::`,
    /// the state everything after the last one; the query keeps any `::`
    /// it contains.
    pub fn parse_line(line: &str) -> Option<Self> {
        let (id, rest) = line.split_once(FIELD_SEPARATOR)?;
        let (raw_query, state) = rest.rsplit_once(FIELD_SEPARATOR)?;
        Some(Self {
            id: id.trim().parse().ok()?,
            raw_query: raw_query.to_string(),
            state: state.parse().ok()?,
        })
    }
}

impl fmt::Display for QueryMetadataEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{FIELD_SEPARATOR}{}{FIELD_SEPARATOR}{}",
            self.id, self.raw_query, self.state
        )
    }
}

/// Read every entry of a metadata file. A missing file is an empty queue.
pub fn read_entries(path: &Path) -> Result<Vec<QueryMetadataEntry>> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(AttributionError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let mut entries = Vec::new();
    for (idx, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let entry =
            QueryMetadataEntry::parse_line(line).ok_or_else(|| AttributionError::MalformedQueueLine {
                path: path.to_path_buf(),
                line_number: idx + 1,
                line: line.to_string(),
            })?;
        entries.push(entry);
    }
    Ok(entries)
}

pub fn append_entries<'a>(
    path: &Path,
    entries: impl IntoIterator<Item = &'a QueryMetadataEntry>,
) -> Result<()> {
    append_lines(path, entries.into_iter().map(ToString::to_string))
}

pub(crate) fn append_lines(path: &Path, lines: impl IntoIterator<Item = String>) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(AttributionError::io(path))?;
    let mut writer = BufWriter::new(file);
    for line in lines {
        writeln!(writer, "{line}").map_err(AttributionError::io(path))?;
    }
    writer.flush().map_err(AttributionError::io(path))
}

/// The id the next harvested query gets: one past the highest id already
/// queued, or 1 for an empty queue.
pub fn next_id(entries: &[QueryMetadataEntry]) -> u64 {
    entries.iter().map(|e| e.id).max().map_or(1, |max| max + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn entry_line_format() {
        let entry = QueryMetadataEntry::new(7, "select a from dc_e_x_raw");
        assert_eq!(entry.to_string(), "7::select a from dc_e_x_raw::NOT PARSED");
        assert_eq!(
            QueryMetadataEntry::parse_line("7::select a from dc_e_x_raw::NOT PARSED"),
            Some(entry.clone())
        );
        assert_eq!(
            entry.with_state(QueryState::Parsed).to_string(),
            "7::select a from dc_e_x_raw::PARSED"
        );
    }

    #[test]
    fn failed_line_lists_offending_tokens() {
        let entry = QueryMetadataEntry::new(3, "select foo, bar from dc_e_x_raw");
        assert_eq!(
            entry.failed_line(&["foo".to_string(), " bar".to_string()]),
            "3::select foo, bar from dc_e_x_raw::FAILED::foo , bar"
        );
    }

    #[test]
    fn rejects_lines_without_state() {
        assert_eq!(QueryMetadataEntry::parse_line("select a from t"), None);
        assert_eq!(QueryMetadataEntry::parse_line("x::select a::PARSED"), None);
        assert_eq!(QueryMetadataEntry::parse_line("1::select a::DONE"), None);
    }

    #[test]
    fn reads_appended_entries_and_continues_ids() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        let path = tmp.path().join("query_breakdown.txt");
        assert_eq!(read_entries(&path)?, Vec::new());
        assert_eq!(next_id(&[]), 1);

        let entries = vec![
            QueryMetadataEntry::new(4, "select a from t"),
            QueryMetadataEntry::new(9, "select b from t"),
        ];
        append_entries(&path, &entries)?;

        let read = read_entries(&path)?;
        assert_eq!(read, entries);
        assert_eq!(next_id(&read), 10);
        Ok(())
    }

    #[test]
    fn malformed_line_reports_position() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        let path = tmp.path().join("query_breakdown.txt");
        std::fs::write(&path, "1::select a from t::NOT PARSED\ngarbage\n")?;
        let err = read_entries(&path).err();
        assert!(
            matches!(err, Some(AttributionError::MalformedQueueLine { line_number: 2, .. })),
            "{err:?}"
        );
        Ok(())
    }
}

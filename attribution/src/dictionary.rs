//! Read-only reference data the attributor resolves queries against.

use std::collections::HashSet;
use std::path::Path;

use countertool_config::AttributionConfig;

use crate::error::AttributionError;
use crate::error::Result;

/// One line of the master mapping: counters belong to every table whose
/// upper-cased name contains `table_pattern`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterEntry {
    pub table_pattern: String,
    pub counter: String,
}

#[derive(Debug, Clone, Default)]
pub struct Dictionaries {
    /// Lower-cased table name fragments a query must reference to be
    /// attributed.
    tables: Vec<String>,
    /// Lower-cased fragments of tables whose queries are never attributed.
    excluded: Vec<String>,
    /// Lower-cased names of every known column.
    columns: HashSet<String>,
    master: Vec<MasterEntry>,
    /// Lower-cased names of every counter in the master mapping.
    counters: HashSet<String>,
}

impl Dictionaries {
    pub fn new(
        tables: impl IntoIterator<Item = String>,
        excluded: impl IntoIterator<Item = String>,
        columns: impl IntoIterator<Item = String>,
        master: Vec<MasterEntry>,
    ) -> Self {
        let normalize = |s: String| s.trim().to_lowercase();
        let counters = master.iter().map(|m| m.counter.to_lowercase()).collect();
        Self {
            tables: tables
                .into_iter()
                .map(normalize)
                .filter(|s| !s.is_empty())
                .collect(),
            excluded: excluded
                .into_iter()
                .map(normalize)
                .filter(|s| !s.is_empty())
                .collect(),
            columns: columns
                .into_iter()
                .map(normalize)
                .filter(|s| !s.is_empty())
                .collect(),
            master,
            counters,
        }
    }

    pub fn load(config: &AttributionConfig) -> Result<Self> {
        let tables = read_lines(&config.tables_file)?;
        let columns = read_lines(&config.columns_file)?;
        let master = read_lines(&config.master_file)?
            .into_iter()
            .filter_map(|line| parse_master_line(&line))
            .collect::<Vec<_>>();
        tracing::info!(
            "loaded {} table patterns, {} columns and {} master counters",
            tables.len(),
            columns.len(),
            master.len()
        );
        Ok(Self::new(
            tables,
            config.excluded_tables.iter().cloned(),
            columns,
            master,
        ))
    }

    pub fn master(&self) -> &[MasterEntry] {
        &self.master
    }

    /// Whether `word` names one of the tables of interest.
    pub fn mentions_table(&self, word: &str) -> bool {
        let word = word.to_lowercase();
        self.tables.iter().any(|t| word.contains(t.as_str()))
    }

    pub fn is_excluded(&self, word: &str) -> bool {
        let word = word.to_lowercase();
        self.excluded.iter().any(|t| word.contains(t.as_str()))
    }

    /// A table of interest that is not excluded.
    pub fn is_included_table(&self, word: &str) -> bool {
        self.mentions_table(word) && !self.is_excluded(word)
    }

    pub fn is_known_column(&self, word: &str) -> bool {
        self.columns.contains(&word.to_lowercase())
    }

    pub fn is_known_counter(&self, word: &str) -> bool {
        self.counters.contains(&word.to_lowercase())
    }

    /// Counters the master mapping assigns to `table`, in master order.
    pub fn table_counters<'a>(&'a self, table: &str) -> impl Iterator<Item = &'a str> + 'a {
        let table = table.to_uppercase();
        self.master
            .iter()
            .filter(move |m| table.contains(&m.table_pattern.to_uppercase()))
            .map(|m| m.counter.as_str())
    }

    /// The master spelling of `word` if it is a counter of `table`.
    pub fn resolve_counter(&self, table: &str, word: &str) -> Option<String> {
        self.table_counters(table)
            .find(|counter| counter.eq_ignore_ascii_case(word))
            .map(str::to_string)
    }

    pub fn has_counters(&self, table: &str) -> bool {
        self.table_counters(table).next().is_some()
    }
}

/// `PREFIX::COUNTER`; anything after a second separator is ignored.
pub fn parse_master_line(line: &str) -> Option<MasterEntry> {
    let mut fields = line.split("::");
    let table_pattern = fields.next()?.trim();
    let counter = fields.next()?.trim();
    if table_pattern.is_empty() || counter.is_empty() {
        return None;
    }
    Some(MasterEntry {
        table_pattern: table_pattern.to_string(),
        counter: counter.to_string(),
    })
}

fn read_lines(path: &Path) -> Result<Vec<String>> {
    let contents = std::fs::read_to_string(path).map_err(AttributionError::io(path))?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn dictionaries() -> Dictionaries {
        Dictionaries::new(
            ["dc_e_rrc".to_string(), "dim_".to_string()],
            ["dim_".to_string()],
            ["date_id".to_string(), "PmRrcConnEstabSucc".to_string()],
            vec![
                MasterEntry {
                    table_pattern: "DC_E_RRC_CELL".to_string(),
                    counter: "pmRrcConnEstabSucc".to_string(),
                },
                MasterEntry {
                    table_pattern: "DC_E_RRC_CELL".to_string(),
                    counter: "pmRrcConnEstabAtt".to_string(),
                },
                MasterEntry {
                    table_pattern: "DC_E_RRC_NODE".to_string(),
                    counter: "pmNodeCount".to_string(),
                },
            ],
        )
    }

    #[test]
    fn table_classification() {
        let dict = dictionaries();
        assert!(dict.is_included_table("dc_e_rrc_cell_raw"));
        assert!(dict.is_included_table("DC_E_RRC_CELL_2"));
        assert!(dict.mentions_table("dim_cell_1"));
        assert!(!dict.is_included_table("dim_cell_1"));
        assert!(!dict.is_included_table("dc_e_erbs_raw"));
    }

    #[test]
    fn table_counters_follow_master_prefixes() {
        let dict = dictionaries();
        let counters: Vec<&str> = dict.table_counters("dc_e_rrc_cell_day").collect();
        assert_eq!(counters, vec!["pmRrcConnEstabSucc", "pmRrcConnEstabAtt"]);
        assert_eq!(
            dict.resolve_counter("DC_E_RRC_CELL_RAW", "pmrrcconnestabatt"),
            Some("pmRrcConnEstabAtt".to_string())
        );
        assert_eq!(dict.resolve_counter("DC_E_RRC_NODE_RAW", "pmrrcconnestabatt"), None);
        assert!(!dict.has_counters("DC_E_ERBS_RAW"));
    }

    #[test]
    fn column_and_counter_lookups_ignore_case() {
        let dict = dictionaries();
        assert!(dict.is_known_column("pmrrcconnestabsucc"));
        assert!(dict.is_known_column("DATE_ID"));
        assert!(dict.is_known_counter("PMNODECOUNT"));
        assert!(!dict.is_known_column("pmnodecount"));
    }

    #[test]
    fn master_lines() {
        assert_eq!(
            parse_master_line("DC_E_RRC_CELL::pmX::extra"),
            Some(MasterEntry {
                table_pattern: "DC_E_RRC_CELL".to_string(),
                counter: "pmX".to_string(),
            })
        );
        assert_eq!(parse_master_line("DC_E_RRC_CELL"), None);
        assert_eq!(parse_master_line("::pmX"), None);
    }
}

//! Counter attribution: resolve each query to the `(table, counter)` pairs
//! it reads.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;

use crate::dictionary::Dictionaries;
use crate::normalize::QueryCandidate;
use crate::normalize::candidates;
use crate::projection::AliasMap;
use crate::projection::ProjectionItem;
use crate::projection::classify;
use crate::projection::from_span;
use crate::projection::identifier_words;
use crate::projection::included_tables;
use crate::projection::is_wildcard;
use crate::projection::projection_items;
use crate::projection::projection_span;
use crate::projection::single_table;

/// Counter name recorded for `select *` style queries.
pub const ALL_COUNTERS: &str = "ALL";

/// Format of the observation date in attribution records.
pub const RECORD_DATE_FORMAT: &str = "%d-%m-%Y";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TableKind {
    /// A physical partition: the last `_` component is numeric.
    Base,
    View,
}

impl TableKind {
    pub fn of(table_name: &str) -> Self {
        let suffix = table_name.rsplit('_').next().unwrap_or_default();
        if !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()) {
            Self::Base
        } else {
            Self::View
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Base => "BASE",
            Self::View => "VIEW",
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TableKind {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "BASE" => Ok(Self::Base),
            "VIEW" => Ok(Self::View),
            other => Err(format!("unknown table kind `{other}`")),
        }
    }
}

/// One `(table, counter)` access observed on `observed_date`, serialized as
/// `TABLE::KIND::counter::DD-MM-YYYY`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributionRecord {
    pub table_name: String,
    pub table_kind: TableKind,
    pub counter_name: String,
    pub observed_date: NaiveDate,
}

impl AttributionRecord {
    pub fn new(table_name: impl Into<String>, counter_name: impl Into<String>, date: NaiveDate) -> Self {
        let table_name = table_name.into();
        Self {
            table_kind: TableKind::of(&table_name),
            table_name,
            counter_name: counter_name.into(),
            observed_date: date,
        }
    }

    pub fn is_all_counters(&self) -> bool {
        self.counter_name == ALL_COUNTERS
    }
}

impl fmt::Display for AttributionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}::{}::{}::{}",
            self.table_name,
            self.table_kind,
            self.counter_name,
            self.observed_date.format(RECORD_DATE_FORMAT)
        )
    }
}

impl FromStr for AttributionRecord {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = line.trim().split("::").collect();
        let [table_name, kind, counter_name, date] = fields.as_slice() else {
            return Err(format!("expected 4 `::` separated fields in `{line}`"));
        };
        let observed_date = NaiveDate::parse_from_str(date, RECORD_DATE_FORMAT)
            .map_err(|err| format!("invalid date `{date}`: {err}"))?;
        Ok(Self {
            table_name: (*table_name).to_string(),
            table_kind: kind.parse()?,
            counter_name: (*counter_name).to_string(),
            observed_date,
        })
    }
}

/// Result of attributing one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribution {
    /// Every projection token was recognized. May hold zero records when the
    /// query only reads non-counter columns.
    Parsed(Vec<AttributionRecord>),
    /// At least one projection token is neither a known column nor a known
    /// counter. No records are kept.
    Failed { invalid_tokens: Vec<String> },
}

pub struct CounterAttributor<'a> {
    dict: &'a Dictionaries,
    today: NaiveDate,
}

impl<'a> CounterAttributor<'a> {
    pub fn new(dict: &'a Dictionaries, today: NaiveDate) -> Self {
        Self { dict, today }
    }

    pub fn attribute(&self, query: &str) -> Attribution {
        let mut records = Vec::new();
        let mut invalid_tokens = Vec::new();
        for candidate in candidates(query, self.dict) {
            if is_wildcard(projection_span(&candidate.raw)) {
                records.extend(self.attribute_wildcard(&candidate));
            } else {
                self.attribute_generic(&candidate, &mut records, &mut invalid_tokens);
            }
        }

        if invalid_tokens.is_empty() {
            Attribution::Parsed(records)
        } else {
            Attribution::Failed { invalid_tokens }
        }
    }

    fn record(&self, table: &str, counter: impl Into<String>) -> AttributionRecord {
        AttributionRecord::new(table, counter, self.today)
    }

    fn attribute_wildcard(&self, candidate: &QueryCandidate) -> Vec<AttributionRecord> {
        included_tables(from_span(&candidate.normalized), self.dict)
            .into_iter()
            .filter(|table| self.dict.has_counters(table))
            .map(|table| self.record(&table, ALL_COUNTERS))
            .collect()
    }

    fn attribute_generic(
        &self,
        candidate: &QueryCandidate,
        records: &mut Vec<AttributionRecord>,
        invalid_tokens: &mut Vec<String>,
    ) {
        let span = from_span(&candidate.normalized);
        let reads_excluded = self.dict.is_excluded(span);
        let aliases = AliasMap::from_span(span, self.dict);
        let items = projection_items(projection_span(&candidate.normalized));

        let mut classified = Vec::with_capacity(items.len());
        for item in &items {
            let class = classify(item);
            let needs_check = !matches!(class, ProjectionItem::Skip | ProjectionItem::CaseMarker);
            if needs_check && !self.is_recognized(item) && !reads_excluded {
                invalid_tokens.push(item.clone());
            }
            classified.push(class);
        }
        if !invalid_tokens.is_empty() {
            return;
        }

        for class in classified {
            match class {
                ProjectionItem::Skip | ProjectionItem::CaseMarker => {}
                ProjectionItem::Sum(operands) => {
                    for operand in operands {
                        match classify(&operand) {
                            ProjectionItem::Qualified { qualifier, column } => {
                                records.extend(self.resolve_qualified(&aliases, &qualifier, &column));
                            }
                            ProjectionItem::Bare(words) => {
                                records.extend(self.resolve_bare(span, &words));
                            }
                            _ => {}
                        }
                    }
                }
                ProjectionItem::Qualified { qualifier, column } => {
                    records.extend(self.resolve_qualified(&aliases, &qualifier, &column));
                }
                ProjectionItem::Bare(words) => records.extend(self.resolve_bare(span, &words)),
            }
        }
    }

    /// An item is recognized when one of its words is a known column or a
    /// known counter.
    fn is_recognized(&self, item: &str) -> bool {
        identifier_words(item).iter().any(|word| {
            word.split('.')
                .any(|part| self.dict.is_known_column(part) || self.dict.is_known_counter(part))
        })
    }

    fn resolve_qualified(
        &self,
        aliases: &AliasMap,
        qualifier: &str,
        column: &str,
    ) -> Option<AttributionRecord> {
        if self.dict.is_excluded(qualifier) {
            return None;
        }
        let table = match aliases.resolve(qualifier) {
            Some(table) => table.to_string(),
            None if self.dict.mentions_table(qualifier) => qualifier.to_uppercase(),
            None => {
                tracing::debug!("no table found for qualifier `{qualifier}`");
                return None;
            }
        };
        if self.dict.is_excluded(&table) {
            return None;
        }
        let counter = self.dict.resolve_counter(&table, column)?;
        Some(self.record(&table, counter))
    }

    fn resolve_bare(&self, span: &str, words: &[String]) -> Vec<AttributionRecord> {
        let Some(table) = single_table(span, self.dict) else {
            tracing::debug!("no table of interest in `{span}`");
            return Vec::new();
        };
        words
            .iter()
            .filter_map(|word| self.dict.resolve_counter(&table, word))
            .map(|counter| self.record(&table, counter))
            .collect()
    }
}

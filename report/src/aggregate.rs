//! Grouping of attribution records into per-counter and per-day totals.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::HashMap;

use chrono::NaiveDate;
use countertool_attribution::ALL_COUNTERS;
use countertool_attribution::AttributionRecord;
use countertool_attribution::MasterEntry;

use crate::features::FeatureMap;
use crate::features::NO_FEATURE;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CounterKey {
    pub table_name: String,
    pub counter_name: String,
}

impl CounterKey {
    pub fn new(table_name: impl Into<String>, counter_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            counter_name: counter_name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateCounterStat {
    pub total_access_count: u64,
    pub last_access_date: NaiveDate,
    pub feature_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyCounterStat {
    pub access_count: u64,
    pub feature_name: String,
}

/// A master counter no record accessed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnaccessedCounter {
    pub key: CounterKey,
    pub feature_name: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub total_uniq_count: usize,
    pub total_accessed: usize,
    pub total_unaccessed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSummaryRow {
    pub feature_name: String,
    pub accessed: usize,
    pub unaccessed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CounterReport {
    pub aggregated: BTreeMap<CounterKey, AggregateCounterStat>,
    pub per_day: BTreeMap<(CounterKey, NaiveDate), DailyCounterStat>,
    pub unaccessed: Vec<UnaccessedCounter>,
}

impl CounterReport {
    /// Group `records` by `(table, counter)` and find the `master` counters
    /// no record touched. An `ALL` record covers every master counter of its
    /// table.
    pub fn build(records: &[AttributionRecord], master: &[MasterEntry], features: &FeatureMap) -> Self {
        let mut aggregated: BTreeMap<CounterKey, AggregateCounterStat> = BTreeMap::new();
        let mut per_day: BTreeMap<(CounterKey, NaiveDate), DailyCounterStat> = BTreeMap::new();

        for record in records {
            let key = CounterKey::new(record.table_name.as_str(), record.counter_name.as_str());
            let feature = features.feature_for(&record.table_name);

            aggregated
                .entry(key.clone())
                .and_modify(|stat| {
                    stat.total_access_count += 1;
                    stat.last_access_date = stat.last_access_date.max(record.observed_date);
                })
                .or_insert_with(|| AggregateCounterStat {
                    total_access_count: 1,
                    last_access_date: record.observed_date,
                    feature_name: feature.to_string(),
                });
            per_day
                .entry((key, record.observed_date))
                .or_insert_with(|| DailyCounterStat {
                    access_count: 0,
                    feature_name: feature.to_string(),
                })
                .access_count += 1;
        }

        let index = AccessIndex::from_keys(aggregated.keys());
        let unaccessed = master
            .iter()
            .filter(|entry| !index.is_accessed(entry))
            .map(|entry| UnaccessedCounter {
                key: CounterKey::new(entry.table_pattern.to_uppercase(), entry.counter.as_str()),
                feature_name: features.feature_for(&entry.table_pattern).to_string(),
            })
            .collect();

        Self {
            aggregated,
            per_day,
            unaccessed,
        }
    }

    pub fn summary(&self) -> Summary {
        let total_accessed = self.aggregated.len();
        let total_unaccessed = self.unaccessed.len();
        Summary {
            total_uniq_count: total_accessed + total_unaccessed,
            total_accessed,
            total_unaccessed,
        }
    }

    /// Accessed and unaccessed counters per feature: every feature of the
    /// mapping in order, then `NA` when any counter has no feature.
    pub fn feature_summary(&self, features: &FeatureMap) -> Vec<FeatureSummaryRow> {
        let mut rows: Vec<FeatureSummaryRow> = features
            .feature_names()
            .into_iter()
            .map(|name| FeatureSummaryRow {
                feature_name: name.to_string(),
                accessed: 0,
                unaccessed: 0,
            })
            .collect();
        let mut row_for = |feature: &str| -> usize {
            match rows.iter().position(|row| row.feature_name == feature) {
                Some(idx) => idx,
                None => {
                    rows.push(FeatureSummaryRow {
                        feature_name: feature.to_string(),
                        accessed: 0,
                        unaccessed: 0,
                    });
                    rows.len() - 1
                }
            }
        };

        let accessed: Vec<usize> = self
            .aggregated
            .values()
            .map(|stat| row_for(&stat.feature_name))
            .collect();
        let unaccessed: Vec<usize> = self
            .unaccessed
            .iter()
            .map(|counter| row_for(&counter.feature_name))
            .collect();
        for idx in accessed {
            rows[idx].accessed += 1;
        }
        for idx in unaccessed {
            rows[idx].unaccessed += 1;
        }
        rows.sort_by_key(|row| row.feature_name == NO_FEATURE);
        rows
    }
}

/// Accessed tables keyed by the counter that touched them, built once from
/// the unique aggregated keys.
#[derive(Debug, Default)]
struct AccessIndex {
    /// Upper-cased tables with an `ALL` record.
    all_tables: BTreeSet<String>,
    /// Lower-cased counter to the upper-cased tables it was read from.
    tables_by_counter: HashMap<String, BTreeSet<String>>,
}

impl AccessIndex {
    fn from_keys<'a>(keys: impl IntoIterator<Item = &'a CounterKey>) -> Self {
        let mut index = Self::default();
        for key in keys {
            let table = key.table_name.to_uppercase();
            if key.counter_name == ALL_COUNTERS {
                index.all_tables.insert(table);
            } else {
                index
                    .tables_by_counter
                    .entry(key.counter_name.to_lowercase())
                    .or_default()
                    .insert(table);
            }
        }
        index
    }

    /// A master counter is accessed when a table containing its pattern has
    /// an `ALL` record or a record for that counter.
    fn is_accessed(&self, entry: &MasterEntry) -> bool {
        let pattern = entry.table_pattern.to_uppercase();
        let by_counter = self.tables_by_counter.get(&entry.counter.to_lowercase());
        self.all_tables
            .iter()
            .chain(by_counter.into_iter().flatten())
            .any(|table| table.contains(&pattern))
    }
}

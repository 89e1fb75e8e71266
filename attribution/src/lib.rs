//! Level 2 of the counter-usage pipeline.
//!
//! Queries are harvested from a Level 1 segment into a metadata queue,
//! attributed to `(table, counter)` pairs against the reference
//! dictionaries, and anything an aborted batch did not reach is handed to
//! the next invocation through the retry queue.

mod attribute;
mod batch;
mod dictionary;
mod error;
mod harvest;
mod normalize;
mod projection;
mod queue;
mod retry;

pub use attribute::ALL_COUNTERS;
pub use attribute::Attribution;
pub use attribute::AttributionRecord;
pub use attribute::CounterAttributor;
pub use attribute::RECORD_DATE_FORMAT;
pub use attribute::TableKind;
pub use batch::BatchFiles;
pub use batch::BatchRunner;
pub use batch::BatchSummary;
pub use batch::LEVEL2_OUTPUT_PREFIX;
pub use batch::RUN_STAMP_FORMAT;
pub use batch::SentinelGuard;
pub use batch::run_stamp;
pub use dictionary::Dictionaries;
pub use dictionary::MasterEntry;
pub use dictionary::parse_master_line;
pub use error::AttributionError;
pub use error::Result;
pub use harvest::harvest;
pub use harvest::query_text;
pub use normalize::QueryCandidate;
pub use normalize::candidates;
pub use normalize::split_candidates;
pub use normalize::strip_noise;
pub use projection::AliasMap;
pub use projection::ProjectionItem;
pub use projection::classify;
pub use queue::QueryMetadataEntry;
pub use queue::QueryState;
pub use queue::append_entries;
pub use queue::next_id;
pub use queue::read_entries;
pub use retry::RetryQueue;
pub use retry::renumber_unparsed;

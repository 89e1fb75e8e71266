//! Level 1 of the counter-usage pipeline.
//!
//! A persisted cursor names the demarcation marker the next run starts from.
//! [`SegmentExtractor`] finds that marker and its successor in the live logs
//! (falling back to compressed archives), copies the text between them and
//! advances the cursor.

mod corpus;
mod cursor;
mod error;
mod extract;
mod locate;
mod token;

pub use corpus::ArchiveFile;
pub use corpus::CorpusAccess;
pub use corpus::LogCorpus;
pub use corpus::LogFile;
pub use corpus::NativeCorpusAccess;
pub use corpus::TimelinePosition;
pub use corpus::parse_archive_timestamp;
pub use cursor::CursorStore;
pub use error::Result;
pub use error::SegmentError;
pub use extract::ByteRange;
pub use extract::Segment;
pub use extract::SegmentExtractor;
pub use extract::SegmentOutcome;
pub use locate::Locator;
pub use token::DemarcationToken;
pub use token::FIRST_INSTANCE;
pub use token::line_contains_token;

use countertool_config::Config;

/// Build the extractor for one Level 1 invocation from the resolved config.
pub fn extractor_from_config(config: &Config) -> SegmentExtractor<NativeCorpusAccess> {
    let locator = Locator::new(LogCorpus::new(config.corpus.clone()), NativeCorpusAccess);
    SegmentExtractor::new(
        locator,
        CursorStore::new(config.segment.cursor_file.clone()),
        config.segment.first_instance_marker.clone(),
    )
}

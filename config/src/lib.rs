//! Configuration for the counter-usage tool.
//!
//! One [`Config`] is built per invocation from `config.toml` in the home
//! directory plus `-c` overrides, and handed to every pipeline stage.

mod error;
mod home;
mod overrides;
mod types;

pub use error::ConfigError;
pub use error::Result;
pub use home::COUNTERTOOL_HOME_ENV;
pub use home::find_countertool_home;
pub use overrides::CliConfigOverrides;
pub use types::AttributionConfig;
pub use types::AttributionToml;
pub use types::CONFIG_TOML_FILE;
pub use types::Config;
pub use types::ConfigToml;
pub use types::CorpusConfig;
pub use types::CorpusToml;
pub use types::ReportConfig;
pub use types::ReportToml;
pub use types::SegmentConfig;
pub use types::SegmentToml;

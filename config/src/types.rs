use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use toml::Value;

use crate::error::ConfigError;
use crate::error::Result;
use crate::overrides::CliConfigOverrides;

pub const CONFIG_TOML_FILE: &str = "config.toml";

const DEFAULT_EXCLUDED_TABLES: &[&str] = &["dc_z_alarm", "dc_e_bulk_cm", "dim_"];

/// Raw shape of `config.toml`. Every field is optional; [`Config::load`]
/// fills in defaults and resolves relative paths against the home directory.
#[derive(Debug, Default, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConfigToml {
    pub log_file: Option<PathBuf>,
    #[serde(default)]
    pub corpus: CorpusToml,
    #[serde(default)]
    pub segment: SegmentToml,
    #[serde(default)]
    pub attribution: AttributionToml,
    #[serde(default)]
    pub report: ReportToml,
}

#[derive(Debug, Default, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CorpusToml {
    pub data_dir: Option<PathBuf>,
    pub archive_dir: Option<PathBuf>,
    pub log_prefix: Option<String>,
    pub scratch_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SegmentToml {
    pub cursor_file: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AttributionToml {
    pub work_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub failed_dir: Option<PathBuf>,
    pub tables_file: Option<PathBuf>,
    pub columns_file: Option<PathBuf>,
    pub master_file: Option<PathBuf>,
    pub excluded_tables: Option<Vec<String>>,
    pub sentinel_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ReportToml {
    pub statistics_dir: Option<PathBuf>,
    pub features_file: Option<PathBuf>,
}

/// Where the log corpus lives and how its files are named.
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusConfig {
    /// Live (uncompressed) log files.
    pub data_dir: PathBuf,
    /// Compressed `*_DD-MM-YYYY_HHMMSS.tar.gz` archives.
    pub archive_dir: PathBuf,
    /// Only files whose name starts with this prefix belong to the corpus.
    pub log_prefix: String,
    /// Scratch workspace for unpacked archives; wiped after each Level 1 run.
    pub scratch_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentConfig {
    pub cursor_file: PathBuf,
    pub output_dir: PathBuf,
    /// Touched once the head segment of a run's first instance is emitted.
    pub first_instance_marker: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributionConfig {
    pub work_dir: PathBuf,
    pub output_dir: PathBuf,
    pub failed_dir: PathBuf,
    pub tables_file: PathBuf,
    pub columns_file: PathBuf,
    pub master_file: PathBuf,
    pub excluded_tables: Vec<String>,
    pub sentinel_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportConfig {
    pub statistics_dir: PathBuf,
    pub features_file: PathBuf,
}

/// Fully resolved configuration for one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub home: PathBuf,
    pub log_file: Option<PathBuf>,
    pub corpus: CorpusConfig,
    pub segment: SegmentConfig,
    pub attribution: AttributionConfig,
    pub report: ReportConfig,
}

impl Config {
    /// Load `config.toml` from `home` (a missing file means defaults), apply
    /// the CLI overrides and resolve every path.
    pub fn load(home: &Path, overrides: &CliConfigOverrides) -> Result<Self> {
        let config_path = home.join(CONFIG_TOML_FILE);
        let mut raw = match std::fs::read_to_string(&config_path) {
            Ok(contents) => {
                toml::from_str::<Value>(&contents).map_err(|source| ConfigError::Toml {
                    path: config_path.clone(),
                    source,
                })?
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("no {} found, using defaults", config_path.display());
                Value::Table(toml::Table::new())
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: config_path,
                    source,
                });
            }
        };
        overrides.apply_on_value(&mut raw)?;

        let parsed: ConfigToml =
            serde_path_to_error::deserialize(raw).map_err(|err| ConfigError::InvalidKey {
                path: config_path.clone(),
                key: err.path().to_string(),
                message: err.into_inner().to_string(),
            })?;
        Ok(Self::from_toml(home, parsed))
    }

    pub fn from_toml(home: &Path, cfg: ConfigToml) -> Self {
        let resolve = |value: Option<PathBuf>, default: &str| -> PathBuf {
            let path = value.unwrap_or_else(|| PathBuf::from(default));
            if path.is_absolute() {
                path
            } else {
                home.join(path)
            }
        };

        let ConfigToml {
            log_file,
            corpus,
            segment,
            attribution,
            report,
        } = cfg;

        Self {
            home: home.to_path_buf(),
            log_file: log_file.map(|path| resolve(Some(path), "")),
            corpus: CorpusConfig {
                data_dir: resolve(corpus.data_dir, "data_files"),
                archive_dir: resolve(corpus.archive_dir, "archived_files"),
                log_prefix: corpus.log_prefix.unwrap_or_else(|| "iqtrace".to_string()),
                scratch_dir: resolve(corpus.scratch_dir, "scratch"),
            },
            segment: SegmentConfig {
                cursor_file: resolve(segment.cursor_file, "demarcation_metadata_file"),
                output_dir: resolve(segment.output_dir, "files_to_parse_L1"),
                first_instance_marker: home.join(".first_occurance_instance_one"),
            },
            attribution: AttributionConfig {
                work_dir: resolve(attribution.work_dir, "working_directory"),
                output_dir: resolve(attribution.output_dir, "parsed_output"),
                failed_dir: resolve(attribution.failed_dir, "failed_queries"),
                tables_file: resolve(attribution.tables_file, "tables_to_be_considered.txt"),
                columns_file: resolve(attribution.columns_file, "all_columns.txt"),
                master_file: resolve(
                    attribution.master_file,
                    "master_file_for_counters_info_final.txt",
                ),
                excluded_tables: attribution.excluded_tables.unwrap_or_else(|| {
                    DEFAULT_EXCLUDED_TABLES
                        .iter()
                        .map(ToString::to_string)
                        .collect()
                }),
                sentinel_dir: resolve(attribution.sentinel_dir, "parallel_threads"),
            },
            report: ReportConfig {
                statistics_dir: resolve(report.statistics_dir, "Statistics"),
                features_file: resolve(report.features_file, "feature_mapping.txt"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn missing_config_file_yields_defaults_under_home() {
        let home = TempDir::new().expect("tempdir");
        let config = Config::load(home.path(), &CliConfigOverrides::default()).expect("load");

        assert_eq!(config.corpus.data_dir, home.path().join("data_files"));
        assert_eq!(config.corpus.log_prefix, "iqtrace");
        assert_eq!(
            config.segment.cursor_file,
            home.path().join("demarcation_metadata_file")
        );
        assert_eq!(
            config.attribution.excluded_tables,
            vec!["dc_z_alarm", "dc_e_bulk_cm", "dim_"]
        );
        assert_eq!(config.log_file, None);
    }

    #[test]
    fn absolute_paths_are_kept_and_overrides_win() {
        let home = TempDir::new().expect("tempdir");
        std::fs::write(
            home.path().join(CONFIG_TOML_FILE),
            "[corpus]\narchive_dir = \"/var/archive\"\nlog_prefix = \"trace\"\n",
        )
        .expect("write config");
        let overrides = CliConfigOverrides {
            raw_overrides: vec!["corpus.log_prefix=iqtrace".to_string()],
        };

        let config = Config::load(home.path(), &overrides).expect("load");
        assert_eq!(config.corpus.archive_dir, PathBuf::from("/var/archive"));
        assert_eq!(config.corpus.log_prefix, "iqtrace");
    }

    #[test]
    fn unknown_keys_are_reported_with_their_path() {
        let home = TempDir::new().expect("tempdir");
        std::fs::write(
            home.path().join(CONFIG_TOML_FILE),
            "[segment]\noutput_dirs = \"typo\"\n",
        )
        .expect("write config");

        let err = Config::load(home.path(), &CliConfigOverrides::default()).expect_err("typo");
        assert!(err.to_string().contains("segment"), "{err}");
    }
}

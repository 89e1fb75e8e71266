use std::path::Path;

use crate::error::ReportError;
use crate::error::Result;

/// Feature name for tables no pattern matches.
pub const NO_FEATURE: &str = "NA";

/// Operator-supplied `TABLE_PATTERN::Feature Name` grouping labels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureMap {
    /// Upper-cased pattern and feature name, in file order.
    entries: Vec<(String, String)>,
}

impl FeatureMap {
    pub fn parse(contents: &str) -> Self {
        let entries = contents
            .lines()
            .filter_map(|line| {
                let (pattern, feature) = line.split_once("::")?;
                let (pattern, feature) = (pattern.trim(), feature.trim());
                (!pattern.is_empty() && !feature.is_empty())
                    .then(|| (pattern.to_uppercase(), feature.to_string()))
            })
            .collect();
        Self { entries }
    }

    /// Read the mapping file. A missing file means every table is `NA`.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Ok(Self::parse(&contents)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!("no feature mapping at {}, using {NO_FEATURE}", path.display());
                Ok(Self::default())
            }
            Err(source) => Err(ReportError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// The feature of the first pattern `table` contains.
    pub fn feature_for(&self, table: &str) -> &str {
        let table = table.to_uppercase();
        self.entries
            .iter()
            .find(|(pattern, _)| table.contains(pattern.as_str()))
            .map_or(NO_FEATURE, |(_, feature)| feature.as_str())
    }

    /// Distinct feature names in file order.
    pub fn feature_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for (_, feature) in &self.entries {
            if !names.contains(&feature.as_str()) {
                names.push(feature);
            }
        }
        names
    }
}

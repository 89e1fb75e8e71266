use clap::ArgAction;
use clap::Parser;
use toml::Value;

use crate::error::ConfigError;
use crate::error::Result;

/// `-c key.path=value` overrides applied on top of `config.toml`.
#[derive(Parser, Debug, Default, Clone)]
pub struct CliConfigOverrides {
    /// Override a configuration value that would otherwise be loaded from
    /// `config.toml`. Use a dotted path (`corpus.log_prefix=iqtrace`). The
    /// value is parsed as TOML; if that fails it is used as a literal string.
    #[arg(
        short = 'c',
        long = "config",
        value_name = "key=value",
        action = ArgAction::Append,
        global = true
    )]
    pub raw_overrides: Vec<String>,
}

impl CliConfigOverrides {
    /// Split every raw override into its dotted key and parsed TOML value.
    pub fn parse_overrides(&self) -> Result<Vec<(String, Value)>> {
        self.raw_overrides
            .iter()
            .map(|raw| {
                let Some((key, value)) = raw.split_once('=') else {
                    return Err(ConfigError::Override {
                        raw: raw.clone(),
                        message: "expected key=value".to_string(),
                    });
                };
                let key = key.trim();
                if key.is_empty() {
                    return Err(ConfigError::Override {
                        raw: raw.clone(),
                        message: "empty key".to_string(),
                    });
                }
                let value = value.trim();
                let parsed = parse_toml_value(value)
                    .unwrap_or_else(|| Value::String(value.trim_matches('"').to_string()));
                Ok((key.to_string(), parsed))
            })
            .collect()
    }

    /// Apply the overrides to a raw TOML tree, creating intermediate tables
    /// as needed.
    pub fn apply_on_value(&self, target: &mut Value) -> Result<()> {
        for (path, value) in self.parse_overrides()? {
            apply_single_override(target, &path, value);
        }
        Ok(())
    }
}

fn parse_toml_value(raw: &str) -> Option<Value> {
    let wrapped = format!("_value_ = {raw}");
    let mut table: toml::Table = toml::from_str(&wrapped).ok()?;
    table.remove("_value_")
}

fn apply_single_override(root: &mut Value, path: &str, value: Value) {
    let parts: Vec<&str> = path.split('.').collect();
    let mut current = root;

    for (idx, part) in parts.iter().enumerate() {
        let is_last = idx == parts.len() - 1;
        if !current.is_table() {
            *current = Value::Table(toml::Table::new());
        }
        let Value::Table(table) = current else {
            return;
        };
        if is_last {
            table.insert((*part).to_string(), value);
            return;
        }
        current = table
            .entry((*part).to_string())
            .or_insert_with(|| Value::Table(toml::Table::new()));
    }
}

//! Application configuration module
//!
//! Loads analyzer tuning and logging settings from `.env`, an optional
//! `schema-lens.toml`, and `SCHEMA_LENS__*` environment variables.

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load environment variables: {0}")]
    EnvLoad(#[from] dotenvy::Error),

    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] config::ConfigError),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Score penalty applied per warning kind
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct PenaltyWeights {
    pub orphaned_table: u32,
    pub no_schema: u32,
    pub wide_table: u32,
    pub missing_index: u32,
    pub redundant_index: u32,
    pub compound_index_suggestion: u32,
    pub circular_dependency: u32,
    pub excessive_nesting: u32,
}

impl Default for PenaltyWeights {
    fn default() -> Self {
        Self {
            orphaned_table: 2,
            no_schema: 5,
            wide_table: 3,
            missing_index: 5,
            redundant_index: 2,
            compound_index_suggestion: 0,
            circular_dependency: 1,
            excessive_nesting: 5,
        }
    }
}

/// Tuning for normalization and health analysis
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Maximum validator nesting depth before a subtree degrades to `any`
    pub max_depth: usize,
    /// Tables with more fields than this are reported as wide
    pub wide_table_threshold: usize,
    /// Upper bound on non-system fields for a table to look like a join table
    pub join_table_max_fields: usize,
    pub weights: PenaltyWeights,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            max_depth: 32,
            wide_table_threshold: 20,
            join_table_max_fields: 5,
            weights: PenaltyWeights::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
    /// Emit JSON lines instead of the compact human format
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info,schema_lens=debug".to_string(),
            json: false,
        }
    }
}

/// Complete application settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub analyzer: AnalyzerConfig,
    pub log: LogConfig,
}

impl Settings {
    /// Load settings from `.env`, `schema-lens.toml` and the environment
    pub fn load() -> Result<Self, ConfigError> {
        // A missing .env file is fine; a malformed one is not
        match dotenvy::dotenv() {
            Ok(_) => {}
            Err(e) if e.not_found() => {}
            Err(e) => return Err(e.into()),
        }

        let raw = config::Config::builder()
            .add_source(config::File::with_name("schema-lens").required(false))
            .add_source(
                config::Environment::with_prefix("SCHEMA_LENS")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = raw.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.analyzer.max_depth == 0 {
            return Err(ConfigError::InvalidValue(
                "analyzer.max_depth must be at least 1".to_string(),
            ));
        }
        if self.analyzer.wide_table_threshold == 0 {
            return Err(ConfigError::InvalidValue(
                "analyzer.wide_table_threshold must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_analyzer_config() {
        let config = AnalyzerConfig::default();
        assert_eq!(config.max_depth, 32);
        assert_eq!(config.wide_table_threshold, 20);
        assert_eq!(config.join_table_max_fields, 5);
        assert_eq!(config.weights.missing_index, 5);
        assert_eq!(config.weights.compound_index_suggestion, 0);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let raw = config::Config::builder()
            .add_source(config::File::from_str(
                "[analyzer]\nmax_depth = 8\n\n[analyzer.weights]\nmissing_index = 10\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();
        let settings: Settings = raw.try_deserialize().unwrap();

        assert_eq!(settings.analyzer.max_depth, 8);
        assert_eq!(settings.analyzer.weights.missing_index, 10);
        assert_eq!(settings.analyzer.weights.no_schema, 5);
        assert_eq!(settings.analyzer.wide_table_threshold, 20);
        assert!(!settings.log.json);
    }

    #[test]
    fn test_zero_depth_rejected() {
        let mut settings = Settings::default();
        settings.analyzer.max_depth = 0;
        assert!(settings.validate().is_err());
    }
}

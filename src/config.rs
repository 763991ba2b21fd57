use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use validator::{Validate, ValidationError};

use crate::graph_catalog::{CatalogSettings, SamplingSettings};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("Parse error for {field}: {value} - {source}")]
    Parse {
        field: String,
        value: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

impl ConfigError {
    pub fn status_code(&self) -> &'static str {
        "HY000"
    }
}

#[derive(Debug, Error)]
#[error("expected `key:value`, got `{0}`")]
pub struct MappingFormatError(String);

#[derive(Debug, Error)]
#[error("unknown name case `{0}`, expected one of as_is, lower, upper")]
pub struct NameCaseError(String);

/// How unquoted SQL identifiers are normalised before catalog lookup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameCase {
    #[default]
    AsIs,
    Lower,
    Upper,
}

impl NameCase {
    pub fn apply(&self, name: &str) -> String {
        match self {
            NameCase::AsIs => name.to_string(),
            NameCase::Lower => name.to_lowercase(),
            NameCase::Upper => name.to_uppercase(),
        }
    }
}

impl FromStr for NameCase {
    type Err = NameCaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "as_is" | "asis" | "as-is" => Ok(NameCase::AsIs),
            "lower" | "lower_case" => Ok(NameCase::Lower),
            "upper" | "upper_case" => Ok(NameCase::Upper),
            _ => Err(NameCaseError(s.to_string())),
        }
    }
}

impl fmt::Display for NameCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameCase::AsIs => write!(f, "as_is"),
            NameCase::Lower => write!(f, "lower"),
            NameCase::Upper => write!(f, "upper"),
        }
    }
}

/// Translator configuration with validation
#[derive(Clone, Debug, Validate, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorConfig {
    /// Location (`file:`, `http:`, `https:` or a bare path) of a view document
    pub view_definitions: Option<String>,

    /// Table name -> label overrides
    pub table_to_label_mappings: BTreeMap<String, String>,

    /// `Table.column` -> relationship type
    pub join_column_mappings: BTreeMap<String, String>,

    /// Entities sampled per label
    #[validate(range(
        min = -1,
        max = 1_000_000,
        message = "Node sample size must be between -1 and 1000000"
    ))]
    pub node_sample_size: i64,

    /// Relationships sampled per type, negative disables property inference
    #[validate(range(
        min = -1,
        max = 1_000_000,
        message = "Relationship sample size must be between -1 and 1000000"
    ))]
    pub relationship_sample_size: i64,

    /// Whether compiled translations are cached
    pub enable_cache: bool,

    /// Quote labels and relationship types even when not required
    pub always_escape_names: bool,

    /// One Cypher clause per line
    pub pretty_print: bool,

    /// Character introducing a named parameter in SQL text
    #[validate(custom(function = "validate_param_prefix"))]
    pub named_param_prefix: char,

    /// Active database, reported as the catalog name
    #[validate(length(min = 1, message = "Database name cannot be empty"))]
    pub database_name: String,

    pub parse_name_case: NameCase,
}

fn validate_param_prefix(prefix: &char) -> Result<(), ValidationError> {
    match prefix {
        ':' | '$' | '@' => Ok(()),
        _ => {
            let mut err = ValidationError::new("named_param_prefix");
            err.message = Some("Named parameter prefix must be one of `:`, `$`, `@`".into());
            Err(err)
        }
    }
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            view_definitions: None,
            table_to_label_mappings: BTreeMap::new(),
            join_column_mappings: BTreeMap::new(),
            node_sample_size: 1000,
            relationship_sample_size: 1000,
            enable_cache: true,
            always_escape_names: false,
            pretty_print: false,
            named_param_prefix: ':',
            database_name: "neo4j".to_string(),
            parse_name_case: NameCase::AsIs,
        }
    }
}

impl TranslatorConfig {
    /// Create configuration from environment variables with validation
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            view_definitions: env::var("SQLGRAPH_VIEW_DEFINITIONS").ok(),
            table_to_label_mappings: parse_mappings(
                &env::var("SQLGRAPH_TABLE_TO_LABEL_MAPPINGS").unwrap_or_default(),
            )?,
            join_column_mappings: parse_mappings(
                &env::var("SQLGRAPH_JOIN_COLUMN_MAPPINGS").unwrap_or_default(),
            )?,
            node_sample_size: parse_env_var("SQLGRAPH_NODE_SAMPLE_SIZE", "1000")?,
            relationship_sample_size: parse_env_var("SQLGRAPH_RELATIONSHIP_SAMPLE_SIZE", "1000")?,
            enable_cache: parse_env_var("SQLGRAPH_ENABLE_CACHE", "true")?,
            always_escape_names: parse_env_var("SQLGRAPH_ALWAYS_ESCAPE_NAMES", "false")?,
            pretty_print: parse_env_var("SQLGRAPH_PRETTY_PRINT", "false")?,
            named_param_prefix: parse_env_var("SQLGRAPH_NAMED_PARAM_PREFIX", ":")?,
            database_name: env::var("SQLGRAPH_DATABASE").unwrap_or_else(|_| "neo4j".to_string()),
            parse_name_case: parse_env_var("SQLGRAPH_PARSE_NAME_CASE", "as_is")?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Create configuration from CLI arguments with validation
    pub fn from_cli(cli: CliConfig) -> Result<Self, ConfigError> {
        let config = Self {
            view_definitions: cli.view_definitions,
            table_to_label_mappings: parse_mappings(&cli.table_mappings.unwrap_or_default())?,
            join_column_mappings: parse_mappings(&cli.join_column_mappings.unwrap_or_default())?,
            node_sample_size: cli.sample_size,
            relationship_sample_size: cli.sample_size,
            always_escape_names: cli.always_escape,
            pretty_print: cli.pretty,
            named_param_prefix: cli.param_prefix,
            database_name: cli.database,
            ..Default::default()
        };

        config.validate()?;
        Ok(config)
    }

    /// Create configuration from YAML file
    pub fn from_yaml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
            field: "yaml_file".to_string(),
            value: "file read failed".to_string(),
            source: Box::new(e),
        })?;

        let config: Self = serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            field: "yaml_content".to_string(),
            value: content,
            source: Box::new(e),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Merge with another configuration (CLI overrides environment)
    pub fn merge(&mut self, other: Self) {
        if other.view_definitions.is_some() {
            self.view_definitions = other.view_definitions;
        }
        self.table_to_label_mappings
            .extend(other.table_to_label_mappings);
        self.join_column_mappings.extend(other.join_column_mappings);
        self.node_sample_size = other.node_sample_size;
        self.relationship_sample_size = other.relationship_sample_size;
        self.enable_cache = other.enable_cache;
        self.always_escape_names = other.always_escape_names;
        self.pretty_print = other.pretty_print;
        self.named_param_prefix = other.named_param_prefix;
        self.database_name = other.database_name;
        self.parse_name_case = other.parse_name_case;
    }

    pub fn sampling_settings(&self) -> SamplingSettings {
        SamplingSettings {
            node_sample_size: self.node_sample_size,
            relationship_sample_size: self.relationship_sample_size,
        }
    }

    pub fn catalog_settings(&self) -> CatalogSettings {
        CatalogSettings {
            sampling: self.sampling_settings(),
            table_mappings: self.table_to_label_mappings.clone(),
            join_column_mappings: self.join_column_mappings.clone(),
        }
    }
}

/// CLI configuration (parsed from command line arguments)
#[derive(Clone, Debug)]
pub struct CliConfig {
    pub view_definitions: Option<String>,
    pub table_mappings: Option<String>,
    pub join_column_mappings: Option<String>,
    pub sample_size: i64,
    pub always_escape: bool,
    pub pretty: bool,
    pub param_prefix: char,
    pub database: String,
}

/// Parses the compact mapping form `a:b;c:d`. Blank entries are skipped.
pub fn parse_mappings(value: &str) -> Result<BTreeMap<String, String>, ConfigError> {
    value
        .split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once(':') {
            Some((key, mapped)) if !key.trim().is_empty() && !mapped.trim().is_empty() => {
                Ok((key.trim().to_string(), mapped.trim().to_string()))
            }
            _ => Err(ConfigError::Parse {
                field: "mappings".to_string(),
                value: value.to_string(),
                source: Box::new(MappingFormatError(entry.to_string())),
            }),
        })
        .collect()
}

/// Parse an environment variable with a default value
fn parse_env_var<T: std::str::FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = env::var(key).unwrap_or_else(|_| default.to_string());
    value.parse().map_err(|e| ConfigError::Parse {
        field: key.to_string(),
        value,
        source: Box::new(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = TranslatorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.node_sample_size, 1000);
        assert_eq!(config.named_param_prefix, ':');
        assert!(config.enable_cache);
    }

    #[test]
    fn test_invalid_sample_size() {
        let config = TranslatorConfig {
            relationship_sample_size: -2, // Invalid (< -1)
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_param_prefix() {
        let config = TranslatorConfig {
            named_param_prefix: '?', // Reserved for positional parameters
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_database() {
        let config = TranslatorConfig {
            database_name: "".to_string(), // Invalid
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_mappings() {
        let mappings = parse_mappings("Customers:Customer; Orders : Order ;").unwrap();
        assert_eq!(mappings.get("Customers").map(String::as_str), Some("Customer"));
        assert_eq!(mappings.get("Orders").map(String::as_str), Some("Order"));
        assert!(parse_mappings("").unwrap().is_empty());
        assert!(parse_mappings("broken").is_err());
    }

    #[test]
    #[serial]
    fn test_from_env() {
        env::set_var("SQLGRAPH_RELATIONSHIP_SAMPLE_SIZE", "-1");
        env::set_var("SQLGRAPH_NAMED_PARAM_PREFIX", "$");
        env::set_var("SQLGRAPH_JOIN_COLUMN_MAPPINGS", "Orders.CustomerID:PURCHASED");
        let config = TranslatorConfig::from_env();
        env::remove_var("SQLGRAPH_RELATIONSHIP_SAMPLE_SIZE");
        env::remove_var("SQLGRAPH_NAMED_PARAM_PREFIX");
        env::remove_var("SQLGRAPH_JOIN_COLUMN_MAPPINGS");

        let config = config.unwrap();
        assert_eq!(config.relationship_sample_size, -1);
        assert_eq!(config.named_param_prefix, '$');
        assert_eq!(
            config.join_column_mappings.get("Orders.CustomerID").map(String::as_str),
            Some("PURCHASED")
        );
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_garbage() {
        env::set_var("SQLGRAPH_NODE_SAMPLE_SIZE", "lots");
        let result = TranslatorConfig::from_env();
        env::remove_var("SQLGRAPH_NODE_SAMPLE_SIZE");
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "always_escape_names: true").unwrap();
        writeln!(file, "table_to_label_mappings:").unwrap();
        writeln!(file, "  Customers: Customer").unwrap();
        let config = TranslatorConfig::from_yaml_file(file.path()).unwrap();
        assert!(config.always_escape_names);
        assert_eq!(config.database_name, "neo4j");
        assert_eq!(config.table_to_label_mappings.len(), 1);
    }

    #[test]
    fn test_name_case() {
        assert_eq!("lower".parse::<NameCase>().unwrap(), NameCase::Lower);
        assert_eq!(NameCase::Upper.apply("Person"), "PERSON");
        assert!("sideways".parse::<NameCase>().is_err());
    }
}

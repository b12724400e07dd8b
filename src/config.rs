//! Configuration file parsing
//!
//! Reads `relq.toml` project configuration files.

use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

use crate::codegen::CodegenOptions;
use crate::dialect::Dialect;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub connection: ConnectionConfig,

    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub codegen: CodegenOptions,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    /// Target dialect name, e.g. "postgres", "cockroachdb", "dsql".
    #[serde(default = "default_dialect")]
    pub dialect: String,

    /// Logical namespace to introspect (default: "public").
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Environment variable holding the connection string. The core
    /// never reads credentials itself; the driver collaborator does.
    #[serde(default = "default_url_env")]
    pub url_env: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            dialect: default_dialect(),
            namespace: default_namespace(),
            url_env: default_url_env(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Path of the generated schema source file.
    #[serde(default = "default_schema_file")]
    pub schema_file: PathBuf,

    /// Companion file paths.
    #[serde(default = "default_functions_file")]
    pub functions_file: PathBuf,

    #[serde(default = "default_triggers_file")]
    pub triggers_file: PathBuf,

    #[serde(default = "default_types_file")]
    pub types_file: PathBuf,

    /// Proceed even when the schema file contains definitions that
    /// belong in companion files.
    #[serde(default)]
    pub force: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            schema_file: default_schema_file(),
            functions_file: default_functions_file(),
            triggers_file: default_triggers_file(),
            types_file: default_types_file(),
            force: false,
        }
    }
}

fn default_dialect() -> String {
    "postgres".to_string()
}

fn default_namespace() -> String {
    "public".to_string()
}

fn default_url_env() -> String {
    "DATABASE_URL".to_string()
}

fn default_schema_file() -> PathBuf {
    PathBuf::from("src/db/schema.rs")
}

fn default_functions_file() -> PathBuf {
    PathBuf::from("src/db/functions.rs")
}

fn default_triggers_file() -> PathBuf {
    PathBuf::from("src/db/triggers.rs")
}

fn default_types_file() -> PathBuf {
    PathBuf::from("src/db/types.rs")
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// The parsed dialect; validation guarantees this succeeds.
    pub fn dialect(&self) -> Dialect {
        self.connection
            .dialect
            .parse()
            .unwrap_or(Dialect::Postgres)
    }

    /// Validate configuration values.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.connection.dialect.parse::<Dialect>().is_err() {
            return Err(ConfigError::Validation(format!(
                "unknown dialect '{}'. Valid dialects: postgres, cockroachdb, dsql, nile, xata, \
                 mysql, mariadb, planetscale, sqlite, turso",
                self.connection.dialect
            )));
        }
        if self.connection.namespace.trim().is_empty() {
            return Err(ConfigError::Validation(
                "namespace must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Helper: parse TOML into Config and run validation.
    fn parse_and_validate(toml_str: &str) -> Result<Config, ConfigError> {
        Config::from_toml(toml_str)
    }

    #[test]
    fn test_defaults() {
        let config = parse_and_validate("").unwrap();
        assert_eq!(config.dialect(), Dialect::Postgres);
        assert_eq!(config.connection.namespace, "public");
        assert_eq!(config.sync.schema_file, PathBuf::from("src/db/schema.rs"));
        assert!(!config.sync.force);
        assert!(!config.codegen.camel_case);
    }

    #[test]
    fn test_valid_dialect_values() {
        for value in &[
            "postgres",
            "cockroachdb",
            "dsql",
            "nile",
            "xata",
            "mysql",
            "mariadb",
            "planetscale",
            "sqlite",
            "turso",
        ] {
            let toml = format!("[connection]\ndialect = \"{value}\"");
            assert!(
                parse_and_validate(&toml).is_ok(),
                "dialect = '{value}' should be valid"
            );
        }
    }

    #[test]
    fn test_invalid_dialect_rejected() {
        let toml = "[connection]\ndialect = \"oracle\"";
        let err = parse_and_validate(toml).unwrap_err();
        assert!(
            err.to_string().contains("unknown dialect"),
            "Expected validation error, got: {err}"
        );
    }

    #[test]
    fn test_empty_namespace_rejected() {
        let toml = "[connection]\nnamespace = \"  \"";
        let err = parse_and_validate(toml).unwrap_err();
        assert!(err.to_string().contains("namespace"));
    }

    #[test]
    fn test_codegen_section_deserializes() {
        let toml = "\
[codegen]
camel_case = true
include_functions = false

[codegen.column_type_map]
\"events.payload\" = \"json\"
";
        let config = parse_and_validate(toml).unwrap();
        assert!(config.codegen.camel_case);
        assert!(!config.codegen.include_functions);
        assert_eq!(
            config
                .codegen
                .column_type_map
                .get("events.payload")
                .map(|s| s.as_str()),
            Some("json")
        );
    }

    #[test]
    fn test_sync_force_parses() {
        let toml = "[sync]\nforce = true";
        let config = parse_and_validate(toml).unwrap();
        assert!(config.sync.force);
    }
}

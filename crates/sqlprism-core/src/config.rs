//! Configuration schema (sqlprism.toml)
//!
//! Reading the file from disk is the caller's business; this module only
//! describes its shape and converts from and to TOML text.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use crate::diagnostic::{DiagnosticCode, Severity};

/// Database engine a package targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// PostgreSQL (`$n` placeholders)
    Postgresql,

    /// MySQL (`?` placeholders ordered by appearance)
    Mysql,

    /// SQLite (`?` and `?n` placeholders)
    Sqlite,
}

impl Default for Engine {
    fn default() -> Self {
        Self::Postgresql
    }
}

impl Engine {
    /// Schema that unqualified names resolve into
    pub fn default_schema(&self) -> &'static str {
        match self {
            Self::Postgresql | Self::Mysql => "public",
            Self::Sqlite => "main",
        }
    }

    /// Character used to quote identifiers
    pub fn quote_char(&self) -> char {
        match self {
            Self::Mysql => '`',
            Self::Postgresql | Self::Sqlite => '"',
        }
    }

    /// Whether placeholders carry explicit numbers (`$1`) rather than
    /// being numbered by their position in the text (`?`)
    pub fn numbered_placeholders(&self) -> bool {
        matches!(self, Self::Postgresql)
    }
}

impl std::fmt::Display for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Postgresql => write!(f, "postgresql"),
            Self::Mysql => write!(f, "mysql"),
            Self::Sqlite => write!(f, "sqlite"),
        }
    }
}

/// Severity threshold overrides for specific diagnostic codes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeverityThreshold {
    /// Map of diagnostic code to severity override
    pub overrides: HashMap<String, Severity>,
}

impl SeverityThreshold {
    /// Get severity for a diagnostic code, or default
    pub fn get_severity(&self, code: DiagnosticCode, default: Severity) -> Severity {
        self.overrides
            .get(code.as_str())
            .copied()
            .unwrap_or(default)
    }

    /// Set severity override for a code
    pub fn set_override(&mut self, code: DiagnosticCode, severity: Severity) {
        self.overrides.insert(code.as_str().to_string(), severity);
    }
}

fn default_true() -> bool {
    true
}

/// Settings for one package: one catalog plus the queries analyzed against it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageConfig {
    /// Package name, used in logs and reports
    pub name: String,

    /// Target engine
    #[serde(default)]
    pub engine: Engine,

    /// Reject ORDER BY / GROUP BY / window references to unknown names
    #[serde(default = "default_true")]
    pub strict_order_by: bool,

    /// Treat calls to unknown functions as errors
    #[serde(default)]
    pub strict_function_checks: bool,

    /// Override the engine's default schema
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_schema: Option<String>,
}

impl PackageConfig {
    /// Create a package config with default settings
    pub fn new(name: impl Into<String>, engine: Engine) -> Self {
        Self {
            name: name.into(),
            engine,
            strict_order_by: true,
            strict_function_checks: false,
            default_schema: None,
        }
    }

    /// Enable or disable the ORDER BY / GROUP BY reference check
    pub fn with_strict_order_by(mut self, strict: bool) -> Self {
        self.strict_order_by = strict;
        self
    }

    /// Enable or disable errors for unknown functions
    pub fn with_strict_function_checks(mut self, strict: bool) -> Self {
        self.strict_function_checks = strict;
        self
    }

    /// Schema unqualified names resolve into
    pub fn default_schema(&self) -> &str {
        self.default_schema
            .as_deref()
            .unwrap_or_else(|| self.engine.default_schema())
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Config format version
    #[serde(default = "default_version")]
    pub version: String,

    /// Packages to analyze
    #[serde(default)]
    pub packages: Vec<PackageConfig>,

    /// Severity thresholds
    #[serde(default)]
    pub severity: SeverityThreshold,
}

fn default_version() -> String {
    "1".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            packages: Vec::new(),
            severity: SeverityThreshold::default(),
        }
    }
}

impl Config {
    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        let mut seen = std::collections::HashSet::new();
        for package in &config.packages {
            if !seen.insert(package.name.as_str()) {
                return Err(ConfigError::DuplicatePackage(package.name.clone()));
            }
        }

        Ok(config)
    }

    /// Render config as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))
    }

    /// Look up a package by name
    pub fn package(&self, name: &str) -> Option<&PackageConfig> {
        self.packages.iter().find(|p| p.name == name)
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Duplicate package name: {0}")]
    DuplicatePackage(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.version, "1");
        assert!(config.packages.is_empty());
    }

    #[test]
    fn package_defaults_from_toml() {
        let config = Config::from_toml(
            r#"
            [[packages]]
            name = "app"
            engine = "mysql"
            "#,
        )
        .unwrap();

        let package = config.package("app").unwrap();
        assert_eq!(package.engine, Engine::Mysql);
        assert!(package.strict_order_by);
        assert!(!package.strict_function_checks);
        assert_eq!(package.default_schema(), "public");
    }

    #[test]
    fn default_schema_override() {
        let mut package = PackageConfig::new("p", Engine::Sqlite);
        assert_eq!(package.default_schema(), "main");
        package.default_schema = Some("app".into());
        assert_eq!(package.default_schema(), "app");
    }

    #[test]
    fn duplicate_packages_rejected() {
        let result = Config::from_toml(
            r#"
            [[packages]]
            name = "a"
            [[packages]]
            name = "a"
            "#,
        );
        assert!(matches!(result, Err(ConfigError::DuplicatePackage(_))));
    }

    #[test]
    fn severity_override() {
        let mut threshold = SeverityThreshold::default();
        threshold.set_override(DiagnosticCode::UnsupportedStatement, Severity::Error);

        assert_eq!(
            threshold.get_severity(DiagnosticCode::UnsupportedStatement, Severity::Warn),
            Severity::Error
        );
    }

    #[test]
    fn config_toml_roundtrip() {
        let mut config = Config::default();
        config.packages.push(PackageConfig::new("db", Engine::Postgresql).with_strict_order_by(false));
        let toml = config.to_toml().unwrap();
        let parsed = Config::from_toml(&toml).unwrap();
        assert_eq!(config, parsed);
    }
}

//! TOML-based configuration for the translator.
//!
//! Supports a config file (hqlt.toml) with environment variable expansion
//! in paths.
//!
//! Example configuration:
//! ```toml
//! [translator]
//! dialect = "postgres"
//! strict_jpql_compliance = false
//! format_sql = false
//!
//! [metamodel]
//! path = "${APP_HOME}/model.toml"
//!
//! [[filter]]
//! name = "tenant"
//! condition = "{alias}.tenant_code = :tenant"
//!
//! [[filter.parameter]]
//! name = "tenant"
//! type = "string"
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::filter::FilterDefinition;
use crate::metamodel::StaticMetamodel;
use crate::sql::Dialect;
use crate::translator::TranslationOptions;

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Failed to load metamodel: {0}")]
    Metamodel(#[from] crate::metamodel::MetamodelError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Translation options.
    pub translator: TranslatorSettings,

    /// Where the descriptor table lives.
    pub metamodel: MetamodelSettings,

    /// Filter definitions that queries may enable.
    #[serde(rename = "filter")]
    pub filters: Vec<FilterDefinition>,
}

/// Translator configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TranslatorSettings {
    /// SQL dialect name (duckdb, postgres, mysql, tsql, oracle, h2).
    pub dialect: String,

    /// Reject HQL extensions JPQL forbids.
    pub strict_jpql_compliance: bool,

    /// Multi-line SQL output.
    pub format_sql: bool,
}

impl Default for TranslatorSettings {
    fn default() -> Self {
        Self {
            dialect: "duckdb".to_string(),
            strict_jpql_compliance: false,
            format_sql: true,
        }
    }
}

/// Metamodel configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MetamodelSettings {
    /// Descriptor table path (supports ${ENV_VAR} expansion).
    pub path: Option<String>,
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "loading settings");
        Self::from_toml_str(&content)
    }

    /// Parse settings from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(content)?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `HQLT_CONFIG`
    /// 2. `./hqlt.toml`
    /// 3. `~/.config/hqlt/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        // Check environment variable first
        if let Ok(path) = env::var("HQLT_CONFIG") {
            return Self::from_file(&path);
        }

        // Check local directory
        let local_config = PathBuf::from("hqlt.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        // Check user config directory
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("hqlt").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        // Return defaults if no config file found
        Ok(Settings::default())
    }

    /// Translation options described by the `[translator]` section.
    pub fn translation_options(&self) -> Result<TranslationOptions, SettingsError> {
        let dialect: Dialect = self
            .translator
            .dialect
            .parse()
            .map_err(|e: crate::sql::dialect::UnknownDialect| SettingsError::InvalidConfig(e.to_string()))?;
        Ok(TranslationOptions::default()
            .with_dialect(dialect)
            .strict(self.translator.strict_jpql_compliance)
            .with_format_sql(self.translator.format_sql))
    }

    /// Load the configured descriptor table.
    pub fn load_metamodel(&self) -> Result<StaticMetamodel, SettingsError> {
        let path = self
            .metamodel
            .path
            .as_deref()
            .ok_or_else(|| SettingsError::InvalidConfig("metamodel.path is not set".to_string()))?;
        let path = PathBuf::from(expand_env_vars(path)?);
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path));
        }
        Ok(StaticMetamodel::from_file(&path)?)
    }

    /// A configured filter by name.
    pub fn filter(&self, name: &str) -> Option<&FilterDefinition> {
        self.filters.iter().find(|f| f.name == name)
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let var_name = if chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut name = String::new();
            for ch in chars.by_ref() {
                if ch == '}' {
                    break;
                }
                name.push(ch);
            }
            name
        } else {
            // $VAR ends at the first non-alphanumeric/underscore
            let mut name = String::new();
            while let Some(&ch) = chars.peek() {
                if !(ch.is_alphanumeric() || ch == '_') {
                    break;
                }
                name.push(ch);
                chars.next();
            }
            if name.is_empty() {
                // Just a lone $, keep it
                result.push('$');
                continue;
            }
            name
        };

        let value = env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_vars_braces() {
        env::set_var("HQLT_TEST_VAR", "hello");
        assert_eq!(expand_env_vars("${HQLT_TEST_VAR}").unwrap(), "hello");
        assert_eq!(
            expand_env_vars("prefix_${HQLT_TEST_VAR}_suffix").unwrap(),
            "prefix_hello_suffix"
        );
        env::remove_var("HQLT_TEST_VAR");
    }

    #[test]
    fn test_expand_env_vars_no_braces() {
        env::set_var("HQLT_TEST_VAR2", "world");
        assert_eq!(expand_env_vars("$HQLT_TEST_VAR2").unwrap(), "world");
        assert_eq!(expand_env_vars("$HQLT_TEST_VAR2!").unwrap(), "world!");
        assert_eq!(expand_env_vars("costs $ 5").unwrap(), "costs $ 5");
        env::remove_var("HQLT_TEST_VAR2");
    }

    #[test]
    fn test_expand_env_vars_missing() {
        let result = expand_env_vars("${NONEXISTENT_VAR_12345}");
        assert!(matches!(result, Err(SettingsError::MissingEnvVar(name)) if name == "NONEXISTENT_VAR_12345"));
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
[translator]
dialect = "postgresql"
format_sql = false

[metamodel]
path = "./model.toml"

[[filter]]
name = "tenant"
condition = "{alias}.tenant_code = :tenant"

[[filter.parameter]]
name = "tenant"
type = "string"
"#;

        let settings = Settings::from_toml_str(toml).unwrap();

        assert_eq!(settings.translator.dialect, "postgresql");
        assert!(!settings.translator.strict_jpql_compliance);
        assert_eq!(settings.metamodel.path.as_deref(), Some("./model.toml"));
        assert_eq!(settings.filters.len(), 1);
        assert_eq!(settings.filter("tenant").unwrap().parameters[0].name, "tenant");

        let options = settings.translation_options().unwrap();
        assert_eq!(options.dialect, Dialect::Postgres);
        assert!(!options.format_sql);
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();

        assert_eq!(settings.translator.dialect, "duckdb");
        assert!(settings.translator.format_sql);
        assert!(settings.metamodel.path.is_none());
        assert_eq!(settings.translation_options().unwrap(), TranslationOptions::default());
    }

    #[test]
    fn test_unknown_dialect_is_invalid_config() {
        let settings = Settings::from_toml_str("[translator]\ndialect = \"sybase\"\n").unwrap();
        let err = settings.translation_options().unwrap_err();
        assert_eq!(err.to_string(), "Invalid configuration: unknown SQL dialect: sybase");
    }

    #[test]
    fn test_load_metamodel_requires_path() {
        let err = Settings::default().load_metamodel().unwrap_err();
        assert!(matches!(err, SettingsError::InvalidConfig(_)));
    }
}

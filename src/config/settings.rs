//! TOML-based configuration for Strata.
//!
//! Supports a config file (strata.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! [schema]
//! path = "${STRATA_HOME}/schema.toml"
//!
//! [context]
//! default_version = 5
//! default_timezone = "UTC"
//!
//! [planner]
//! root_alias = "o"
//! strip_prefixes = ["rel_"]
//! max_numeric_suffix = 999
//!
//! [logging]
//! level = "info"
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::context::{parse_timezone, ApiVersion, ConversionContext};
use crate::planner::AliasOptions;

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

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Schema location.
    pub schema: SchemaSettings,

    /// Conversion context defaults.
    pub context: ContextSettings,

    /// Fetch planning.
    pub planner: PlannerSettings,

    /// Log output.
    pub logging: LoggingSettings,
}

/// Schema location.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SchemaSettings {
    /// Path to the schema TOML (supports ${ENV_VAR} expansion).
    pub path: Option<String>,
}

impl SchemaSettings {
    /// Get the schema path with environment variables expanded.
    pub fn resolved_path(&self) -> Result<Option<PathBuf>, SettingsError> {
        self.path
            .as_deref()
            .map(|p| expand_env_vars(p).map(PathBuf::from))
            .transpose()
    }
}

/// Conversion context defaults.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ContextSettings {
    /// API version used when none is requested.
    pub default_version: u32,

    /// IANA zone used when no user timezone is known.
    pub default_timezone: String,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            default_version: ApiVersion::LATEST.get(),
            default_timezone: "UTC".to_string(),
        }
    }
}

impl ContextSettings {
    /// Build the default conversion context.
    pub fn default_context(&self) -> Result<ConversionContext, SettingsError> {
        let version = ApiVersion::new(self.default_version)
            .map_err(|e| SettingsError::InvalidConfig(e.to_string()))?;
        let zone = expand_env_vars(&self.default_timezone)?;
        let timezone =
            parse_timezone(&zone).map_err(|e| SettingsError::InvalidConfig(e.to_string()))?;
        Ok(ConversionContext::new(version, timezone))
    }
}

/// Fetch planning settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PlannerSettings {
    /// Alias of the root table.
    pub root_alias: String,

    /// Relationship-name prefixes stripped before alias allocation.
    pub strip_prefixes: Vec<String>,

    /// Highest numeric alias suffix tried.
    pub max_numeric_suffix: u32,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        let options = AliasOptions::default();
        Self {
            root_alias: "o".to_string(),
            strip_prefixes: options.strip_prefixes,
            max_numeric_suffix: options.max_numeric_suffix,
        }
    }
}

impl PlannerSettings {
    pub fn alias_options(&self) -> AliasOptions {
        AliasOptions {
            strip_prefixes: self.strip_prefixes.clone(),
            max_numeric_suffix: self.max_numeric_suffix,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Parse settings from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(content)?;
        Ok(settings)
    }

    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load settings from an explicit path or the default locations.
    ///
    /// Searches in order:
    /// 1. `path`, when given
    /// 2. Environment variable `STRATA_CONFIG`
    /// 3. `./strata.toml`
    /// 4. `~/.config/strata/config.toml`
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        if let Some(path) = path {
            return Self::from_file(path);
        }

        if let Ok(path) = env::var("STRATA_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("strata.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("strata").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    /// Check values that deserialize fine but cannot be used.
    pub fn validate(&self) -> Result<(), SettingsError> {
        self.context.default_context()?;

        let alias = &self.planner.root_alias;
        if alias.is_empty() {
            return Err(SettingsError::InvalidConfig(
                "planner.root_alias must not be empty".into(),
            ));
        }
        if !alias.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(SettingsError::InvalidConfig(format!(
                "planner.root_alias '{}' must be alphanumeric",
                alias
            )));
        }
        if self.planner.strip_prefixes.iter().any(String::is_empty) {
            return Err(SettingsError::InvalidConfig(
                "planner.strip_prefixes must not contain empty prefixes".into(),
            ));
        }
        Ok(())
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

        let var_name: String = if chars.next_if_eq(&'{').is_some() {
            chars.by_ref().take_while(|&ch| ch != '}').collect()
        } else {
            let mut name = String::new();
            while let Some(ch) = chars.next_if(|ch| ch.is_alphanumeric() || *ch == '_') {
                name.push(ch);
            }
            name
        };

        if var_name.is_empty() {
            // Just a lone $, keep it
            result.push('$');
            continue;
        }
        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}

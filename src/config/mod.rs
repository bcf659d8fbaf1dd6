//! Configuration module for Strata.
//!
//! Handles the settings file and environment variable expansion.

mod settings;

pub use settings::{
    expand_env_vars, ContextSettings, LoggingSettings, PlannerSettings, SchemaSettings, Settings,
    SettingsError,
};

//! Configuration module for the translator.
//!
//! Handles translator options, the metamodel location, and filter
//! definitions.

mod settings;

pub use settings::{expand_env_vars, MetamodelSettings, Settings, SettingsError, TranslatorSettings};

// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{ConfigFile, FlowDefinition, RawConfigFile};
use crate::errors::Result;

/// Load runner settings from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; use [`load_and_validate`] to get
/// a checked [`ConfigFile`].
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let contents = fs::read_to_string(path.as_ref())?;
    let config: RawConfigFile = toml::from_str(&contents)?;
    Ok(config)
}

/// Load runner settings from path and validate them.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// Default location of the runner settings file.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Batchflow.toml")
}

/// Load a flow definition file.
///
/// Files ending in `.json` are parsed as JSON; everything else as TOML.
/// Structural checks happen later, when the definition is compiled.
pub fn load_definition(path: impl AsRef<Path>) -> Result<FlowDefinition> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        definition_from_json_str(&contents)
    } else {
        definition_from_toml_str(&contents)
    }
}

pub fn definition_from_toml_str(contents: &str) -> Result<FlowDefinition> {
    Ok(toml::from_str(contents)?)
}

pub fn definition_from_json_str(contents: &str) -> Result<FlowDefinition> {
    Ok(serde_json::from_str(contents)?)
}

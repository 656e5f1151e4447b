// src/config/mod.rs

//! Configuration and definition loading.
//!
//! Responsibilities:
//! - Define the serde-backed data model (`model.rs`): flow definitions and
//!   runner settings.
//! - Load files from disk (`loader.rs`).
//! - Validate runner settings (`validate.rs`). Flow definitions are checked
//!   by the graph builder when they are compiled.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{
    default_config_path, definition_from_json_str, definition_from_toml_str, load_and_validate,
    load_definition, load_from_path,
};
pub use model::{
    ConfigFile, ExecutorSection, FlowDefinition, FlowSection, RawConfigFile, TaskDefinition,
};
pub use validate::parse_duration;

// src/config/mod.rs

//! Configuration loading and validation for jobflow.
//!
//! - `model.rs`: the TOML-backed data model.
//! - `loader.rs`: reading a config file from disk.
//! - `validate.rs`: references, cron expressions, checkup ids and
//!   acyclicity.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, parse_str};
pub use model::{
    ApproverConfig, CheckupConfig, CommandConfig, ConfigFile, EngineSection, HttpSection,
    JobConfig, NotifySection, ParentConfig, RawConfigFile, ServerConfig, SubjectConfig,
};

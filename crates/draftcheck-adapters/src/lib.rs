//! Runtime adapters for draftcheck: the config file, the credential store,
//! and the settings view the engine reads through.

pub mod config;
pub mod keyring;

pub use config::{mask_api_key, validate_api_key_format, Config, ConfigStore, KeyCheck};

//! Configuration management.
//!
//! This module handles loading, parsing, and validating the YAML
//! configuration file that describes upstream groups and their servers.

mod loader;
mod types;
mod validation;

pub use loader::{ConfigError, load_config};
pub use types::*;
pub use validation::validate_config;

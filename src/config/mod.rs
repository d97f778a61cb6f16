//! Configuration management
//!
//! An optional TOML settings file supplies defaults, command-line values
//! override them, and the result is frozen into a `ReplayConfig`.

mod types;

pub use types::*;

use crate::{Error, Result};
use std::path::Path;

/// Load settings from a TOML file
pub fn load<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("failed to read {}: {}", path.display(), e)))?;
    parse(&content)
}

/// Parse settings from TOML text
pub fn parse(content: &str) -> Result<Config> {
    toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
}

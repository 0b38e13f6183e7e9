//! Codec configuration and resource budgets.
//!
//! Loaded from TOML; every key is optional and falls back to defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{SctError, SctResult};

/// Upper bounds applied while parsing untrusted inputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub max_script_bytes: usize,
    pub max_sections: usize,
    pub max_instructions: usize,
    pub max_string_bytes: usize,
    pub max_project_bytes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_script_bytes: 4 * 1024 * 1024,
            max_sections: 4_096,
            max_instructions: 65_536,
            max_string_bytes: 4_096,
            max_project_bytes: 256 * 1024 * 1024,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SctConfig {
    pub limits: Limits,
    /// Reject opcodes missing from the signature table instead of keeping
    /// their parameters as an opaque blob.
    pub strict_opcodes: bool,
    pub pretty_json: bool,
}

impl Default for SctConfig {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            strict_opcodes: true,
            pretty_json: true,
        }
    }
}

impl SctConfig {
    pub fn from_toml_str(input: &str) -> SctResult<Self> {
        Ok(toml::from_str(input)?)
    }

    /// Loads a config file; a missing file yields the defaults.
    pub fn load(path: &Path) -> SctResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|err| SctError::io(path, err))?;
        Self::from_toml_str(&content)
    }
}

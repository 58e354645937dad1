//! Manager configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{SwapError, SwapResult};

/// Settings for discovery and load-time reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ManagerConfig {
    /// Directory scanned for rule files.
    pub data_dir: PathBuf,
    /// File stem suffix a rule file must end with.
    pub suffix: String,
    /// File extension of rule files.
    pub extension: String,
    /// Log conflicts after load.
    pub report_conflicts: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("Data"),
            suffix: "_SWAP".to_string(),
            extension: "ini".to_string(),
            report_conflicts: true,
        }
    }
}

impl ManagerConfig {
    /// Reads a config from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> SwapResult<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| SwapError::config(e.to_string()))?;
        if config.extension.trim().is_empty() {
            return Err(SwapError::config("extension cannot be empty"));
        }
        Ok(config)
    }
}

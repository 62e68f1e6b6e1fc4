use log::warn;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Schema version accepted in configuration documents.
pub const SCHEMA_VERSION: &str = "0.0.1";

/// The deserialized project configuration document.
///
/// All fields default to empty so a missing or partial file still yields a
/// usable value; the validation pipeline is what reports missing fields to
/// the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectConfig {
    pub schema_version: String,
    /// Toolchain release this project is pinned to.
    pub cli_version: String,
    /// Fully qualified board name, `<vendor>:<architecture>:<board-id>`.
    pub board: String,
    /// Serial port for connecting to the device.
    pub port: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Third-party package index URLs, when any are configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_urls: Option<Vec<String>>,
}

impl ProjectConfig {
    /// Reads the document at `path`; `None` when it is missing or
    /// unreadable (logged, not fatal).
    pub fn load(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                warn!("failed to read {:?}: {}", path, err);
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(config) => Some(config),
            Err(err) => {
                warn!("failed to parse {:?}: {}", path, err);
                None
            }
        }
    }
}

//! Typed records for the toolchain's platform/board/port catalogs.
//!
//! The toolchain reports these as JSON; decoding goes through explicit
//! per-operation schemas so a shape mismatch surfaces as
//! [`ExecError::Decode`] instead of an unchecked traversal blowing up
//! somewhere downstream.

use crate::executor::ExecError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One hardware target inside a platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Board {
    pub name: String,
    /// Fully qualified board name, `<vendor>:<architecture>:<board-id>`.
    pub fqbn: String,
}

/// An installable package bundling board definitions and compiler support
/// for a hardware family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Platform {
    /// Platform id, `<vendor>:<architecture>`.
    pub id: String,
    pub latest: String,
    /// Installed version; empty when the platform is not installed.
    pub installed: String,
    pub versions: Vec<String>,
    pub name: String,
    pub maintainer: String,
    pub website: String,
    pub email: String,
    pub boards: Vec<Board>,
}

impl Platform {
    pub fn is_installed(&self) -> bool {
        !self.installed.is_empty()
    }
}

/// A serial port the toolchain detected a device on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DetectedPort {
    pub address: String,
    pub label: String,
    pub protocol: String,
    pub protocol_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<PortProperties>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PortProperties {
    pub pid: String,
    #[serde(rename = "serialNumber")]
    pub serial_number: String,
    pub vid: String,
}

/// Splits an fqbn into `(platform id, board id)`.
///
/// Returns `None` for fewer than three `:`-separated segments; extra
/// segments belong to the platform id, mirroring how the toolchain itself
/// resolves vendor-scoped architectures.
pub fn split_fqbn(fqbn: &str) -> Option<(String, String)> {
    let parts: Vec<&str> = fqbn.split(':').collect();
    if parts.len() < 3 {
        return None;
    }
    let (board_id, platform) = parts.split_last()?;
    Some((platform.join(":"), (*board_id).to_string()))
}

/// Decodes a `core list` payload into platforms.
///
/// Absent data (the toolchain prints nothing for an empty catalog) decodes
/// to an empty list.
pub fn decode_platforms(operation: &str, data: Option<&Value>) -> Result<Vec<Platform>, ExecError> {
    decode(operation, data)
}

/// Decodes a `board list` payload into detected ports.
pub fn decode_ports(operation: &str, data: Option<&Value>) -> Result<Vec<DetectedPort>, ExecError> {
    decode(operation, data)
}

fn decode<T: serde::de::DeserializeOwned>(
    operation: &str,
    data: Option<&Value>,
) -> Result<Vec<T>, ExecError> {
    match data {
        None => Ok(Vec::new()),
        Some(value) => {
            serde_json::from_value(value.clone()).map_err(|source| ExecError::Decode {
                operation: operation.to_string(),
                source,
            })
        }
    }
}

//! Status and port role types shared by the gadget and role switch controllers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AppError;

/// Outcome reported to the device-policy listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Success,
    Error,
    FunctionsApplied,
    FunctionsNotApplied,
    ConfigurationNotSupported,
}

impl Status {
    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Success => "SUCCESS",
            Self::Error => "ERROR",
            Self::FunctionsApplied => "FUNCTIONS_APPLIED",
            Self::FunctionsNotApplied => "FUNCTIONS_NOT_APPLIED",
            Self::ConfigurationNotSupported => "CONFIGURATION_NOT_SUPPORTED",
        };
        f.write_str(s)
    }
}

/// Data role of the port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataRole {
    #[default]
    None,
    Host,
    Device,
}

/// Power role of the port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerRole {
    #[default]
    None,
    Source,
    Sink,
}

/// Port mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortMode {
    #[default]
    None,
    /// Upstream facing port (device)
    Ufp,
    /// Downstream facing port (host)
    Dfp,
    /// Dual role port
    Drp,
}

/// A role switch request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "role", rename_all = "snake_case")]
pub enum PortRole {
    DataRole(DataRole),
    PowerRole(PowerRole),
    Mode(PortMode),
}

impl PortRole {
    /// String form written to the role node
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PowerRole(PowerRole::Source) => "source",
            Self::PowerRole(PowerRole::Sink) => "sink",
            Self::DataRole(DataRole::Host) => "host",
            Self::DataRole(DataRole::Device) => "device",
            Self::Mode(PortMode::Ufp) => "sink",
            Self::Mode(PortMode::Dfp) => "source",
            _ => "none",
        }
    }
}

impl fmt::Display for PortRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PortRole {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "host" => Ok(Self::DataRole(DataRole::Host)),
            "device" => Ok(Self::DataRole(DataRole::Device)),
            "source" => Ok(Self::PowerRole(PowerRole::Source)),
            "sink" => Ok(Self::PowerRole(PowerRole::Sink)),
            "ufp" => Ok(Self::Mode(PortMode::Ufp)),
            "dfp" => Ok(Self::Mode(PortMode::Dfp)),
            other => Err(AppError::Config(format!("Unknown port role: {}", other))),
        }
    }
}

/// Base port status
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PortStatus {
    pub port_name: String,
    pub current_data_role: DataRole,
    pub current_power_role: PowerRole,
    pub current_mode: PortMode,
    pub can_change_mode: bool,
    pub can_change_data_role: bool,
    pub can_change_power_role: bool,
    pub supported_modes: Vec<PortMode>,
}

/// Extended port status, a superset of [`PortStatus`]
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PortStatusExt {
    pub status: PortStatus,
    pub supported_modes: Vec<PortMode>,
    pub current_mode: PortMode,
}

impl PortStatusExt {
    /// Project onto the base form, dropping what it cannot express
    pub fn to_base(&self) -> PortStatus {
        self.status.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_strings() {
        assert_eq!(PortRole::DataRole(DataRole::Host).as_str(), "host");
        assert_eq!(PortRole::DataRole(DataRole::Device).as_str(), "device");
        assert_eq!(PortRole::PowerRole(PowerRole::Sink).as_str(), "sink");
        assert_eq!(PortRole::Mode(PortMode::Ufp).as_str(), "sink");
        assert_eq!(PortRole::Mode(PortMode::Dfp).as_str(), "source");
        assert_eq!(PortRole::Mode(PortMode::Drp).as_str(), "none");
        assert_eq!(PortRole::DataRole(DataRole::None).as_str(), "none");
    }

    #[test]
    fn test_role_parse() {
        assert_eq!(
            "Device".parse::<PortRole>().unwrap(),
            PortRole::DataRole(DataRole::Device)
        );
        assert_eq!(
            "dfp".parse::<PortRole>().unwrap(),
            PortRole::Mode(PortMode::Dfp)
        );
        assert!("otg".parse::<PortRole>().is_err());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&Status::ConfigurationNotSupported).unwrap();
        assert_eq!(json, "\"CONFIGURATION_NOT_SUPPORTED\"");
        assert_eq!(Status::FunctionsApplied.to_string(), "FUNCTIONS_APPLIED");
    }
}

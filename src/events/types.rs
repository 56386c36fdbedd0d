//! USB event types
//!
//! Every notification sent to the device-policy listener is mirrored on the
//! event bus as one of these.

use serde::{Deserialize, Serialize};

use crate::otg::{FunctionSet, PortRole, PortStatusExt, Status};

/// USB event enumeration
///
/// Serialized as:
/// ```json
/// {
///   "event": "gadget.functions_set",
///   "data": { "functions": 5, "status": "SUCCESS" }
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum UsbEvent {
    /// Result of a set-functions request
    #[serde(rename = "gadget.functions_set")]
    FunctionsSet {
        functions: FunctionSet,
        status: Status,
    },

    /// Answer to a current-functions query
    #[serde(rename = "gadget.functions_reported")]
    FunctionsReported {
        functions: FunctionSet,
        /// FUNCTIONS_APPLIED or FUNCTIONS_NOT_APPLIED
        status: Status,
    },

    /// Result of a role switch request
    #[serde(rename = "port.role_switched")]
    RoleSwitched {
        port: String,
        role: PortRole,
        status: Status,
    },

    /// Port status snapshot
    #[serde(rename = "port.status_changed")]
    PortStatusChanged {
        ports: Vec<PortStatusExt>,
        status: Status,
    },
}

impl UsbEvent {
    /// Get the event name (for filtering/routing)
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::FunctionsSet { .. } => "gadget.functions_set",
            Self::FunctionsReported { .. } => "gadget.functions_reported",
            Self::RoleSwitched { .. } => "port.role_switched",
            Self::PortStatusChanged { .. } => "port.status_changed",
        }
    }

    /// Status carried by the event
    pub fn status(&self) -> Status {
        match self {
            Self::FunctionsSet { status, .. }
            | Self::FunctionsReported { status, .. }
            | Self::RoleSwitched { status, .. }
            | Self::PortStatusChanged { status, .. } => *status,
        }
    }

    /// Check if event name matches a topic pattern
    ///
    /// Supports `*`, `gadget.*` and exact names.
    pub fn matches_topic(&self, topic: &str) -> bool {
        if topic == "*" {
            return true;
        }

        let event_name = self.event_name();

        if topic.ends_with(".*") {
            let prefix = topic.trim_end_matches(".*");
            event_name.starts_with(prefix)
        } else {
            event_name == topic
        }
    }
}

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration
///
/// Defaults describe the Nexell dwc2 OTG controller; boards with a different
/// layout only need to override the paths.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OtgConfig {
    /// USB gadget (device mode) settings
    pub gadget: GadgetConfig,
    /// Port role switch settings
    pub role: RoleConfig,
    /// Hardware settle delays
    pub timing: TimingConfig,
}

/// Gadget configfs layout
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GadgetConfig {
    /// Gadget directory in configfs
    pub configfs_root: String,
    /// UDC name written to the pull-up node
    pub udc: String,
    /// Configuration directory name under `configs/`
    pub config_name: String,
    /// Prefix of function links inside the configuration directory
    pub link_prefix: String,
}

impl Default for GadgetConfig {
    fn default() -> Self {
        Self {
            configfs_root: "/config/usb_gadget/g1".to_string(),
            udc: "c0040000.dwc2otg".to_string(),
            config_name: "b.1".to_string(),
            link_prefix: "f".to_string(),
        }
    }
}

/// Data role selection node
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RoleConfig {
    /// Role selection node (`host` / `device`)
    pub node: String,
    /// Name reported for the single port
    pub port_name: String,
}

impl Default for RoleConfig {
    fn default() -> Self {
        Self {
            node: "/sys/devices/platform/c0000000.soc/c0040000.dwc2otg/sel_dr_mode".to_string(),
            port_name: "otg".to_string(),
        }
    }
}

/// Settle delays around gadget reconfiguration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimingConfig {
    /// Time the gadget stays pulled down so the host notices the disconnect
    pub post_teardown_settle_ms: u64,
    /// Time given to FunctionFS daemons after pull-up
    pub post_pullup_settle_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            post_teardown_settle_ms: 100,
            post_pullup_settle_ms: 500,
        }
    }
}

impl TimingConfig {
    pub fn post_teardown_settle(&self) -> Duration {
        Duration::from_millis(self.post_teardown_settle_ms)
    }

    pub fn post_pullup_settle(&self) -> Duration {
        Duration::from_millis(self.post_pullup_settle_ms)
    }
}

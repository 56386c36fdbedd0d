//! Port role switch controller
//!
//! The board exposes a single dual-role port whose data role is selected by
//! writing `host` or `device` to a sysfs node. Power role follows the data
//! role; there is no independent negotiation.

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info};

use super::configfs::DeviceNodes;
use super::types::{DataRole, PortMode, PortRole, PortStatus, PortStatusExt, PowerRole, Status};
use crate::config::RoleConfig;
use crate::error::{AppError, Result};
use crate::events::{PortListener, StatusNotifier};

/// Role switch controller
pub struct RoleSwitchController {
    nodes: Arc<dyn DeviceNodes>,
    node: PathBuf,
    port_name: String,
    notifier: Arc<StatusNotifier>,
}

impl RoleSwitchController {
    pub fn new(nodes: Arc<dyn DeviceNodes>, config: &RoleConfig, notifier: Arc<StatusNotifier>) -> Self {
        info!("USB role switch controller on {}", config.node);
        Self {
            nodes,
            node: PathBuf::from(&config.node),
            port_name: config.port_name.clone(),
            notifier,
        }
    }

    /// Register, replace or clear the port listener
    pub fn set_callback(&self, listener: Option<PortListener>) {
        self.notifier.set_listener(listener);
    }

    /// Switch the port role and report the result
    ///
    /// Only data role requests touch the hardware; power role and mode
    /// requests are reported as errors without a write. A port status
    /// refresh always follows the result.
    pub fn switch_role(&self, port_name: &str, role: PortRole) -> Status {
        debug!(
            "[switch_role] port:{} node:{} role:{}",
            port_name,
            self.node.display(),
            role
        );

        let status = match role {
            PortRole::DataRole(_) => match self.write_data_role(role.as_str()) {
                Ok(()) => Status::Success,
                Err(e) => {
                    error!("Role switch failed: {}", e);
                    Status::Error
                }
            },
            _ => {
                debug!("Ignoring non data-role request {:?}", role);
                Status::Error
            }
        };

        self.notifier.notify_role_switch(port_name, role, status);
        self.query_port_status();
        status
    }

    /// Write the role and confirm it took effect
    fn write_data_role(&self, value: &str) -> Result<()> {
        // Goes out as e.g. `device\n`; sel_dr_mode ignores the trailing newline
        self.nodes.write(&self.node, value)?;
        let written = self.nodes.read_first_line(&self.node)?;
        if written != value {
            return Err(AppError::VerificationMismatch {
                expected: value.to_string(),
                actual: written,
            });
        }
        Ok(())
    }

    /// Current data role; `None` if the node cannot be read or is unknown
    pub fn current_data_role(&self) -> DataRole {
        match self.nodes.read_first_line(&self.node) {
            Ok(mode) => {
                debug!("[current_data_role] current_mode:{}", mode);
                match mode.as_str() {
                    "host" => DataRole::Host,
                    "device" => DataRole::Device,
                    _ => DataRole::None,
                }
            }
            Err(e) => {
                error!("Failed to read role: {}", e);
                DataRole::None
            }
        }
    }

    /// Build the status of the single port
    ///
    /// On a failed read the port entry is left at its defaults and the
    /// status is ERROR.
    pub fn port_status(&self) -> (Vec<PortStatusExt>, Status) {
        let role = self.current_data_role();
        if role == DataRole::None {
            return (vec![PortStatusExt::default()], Status::Error);
        }

        let status = PortStatus {
            port_name: self.port_name.clone(),
            current_data_role: role,
            current_power_role: if role == DataRole::Device {
                PowerRole::Sink
            } else {
                PowerRole::Source
            },
            current_mode: PortMode::Drp,
            can_change_mode: false,
            can_change_data_role: true,
            can_change_power_role: true,
            supported_modes: vec![PortMode::Drp],
        };
        let port = PortStatusExt {
            status,
            supported_modes: vec![PortMode::Ufp, PortMode::Dfp],
            current_mode: PortMode::Drp,
        };
        (vec![port], Status::Success)
    }

    /// Read the port status and send it to the listener
    pub fn query_port_status(&self) -> (Vec<PortStatusExt>, Status) {
        let (ports, status) = self.port_status();
        self.notifier.notify_port_status(&ports, status);
        (ports, status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::listener::tests::{BaseRecorder, Recorder};
    use crate::events::EventBus;
    use crate::otg::configfs::SysfsNodes;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn setup(dir: &Path, initial: &str) -> (RoleConfig, Arc<StatusNotifier>) {
        let node = dir.join("sel_dr_mode");
        fs::write(&node, initial).unwrap();
        let config = RoleConfig {
            node: node.to_string_lossy().to_string(),
            port_name: "otg".to_string(),
        };
        (config, Arc::new(StatusNotifier::new(Arc::new(EventBus::new()))))
    }

    /// Accepts writes but keeps reporting a fixed role, like hardware that
    /// rejects the switch
    struct StuckNode(&'static str);

    impl DeviceNodes for StuckNode {
        fn write(&self, _path: &Path, _value: &str) -> Result<()> {
            Ok(())
        }

        fn read_first_line(&self, _path: &Path) -> Result<String> {
            Ok(self.0.to_string())
        }

        fn symlink(&self, _target: &Path, _link: &Path) -> Result<()> {
            Ok(())
        }

        fn remove_link(&self, _link: &Path) -> Result<()> {
            Ok(())
        }

        fn list_links(&self, _dir: &Path, _prefix: &str) -> Result<Vec<PathBuf>> {
            Ok(Vec::new())
        }

        fn exists(&self, _path: &Path) -> bool {
            true
        }
    }

    #[test]
    fn test_switch_to_device_round_trip() {
        let dir = TempDir::new().unwrap();
        let (config, notifier) = setup(dir.path(), "host\n");
        let roles = RoleSwitchController::new(Arc::new(SysfsNodes), &config, notifier);
        let recorder = Arc::new(Recorder::default());
        roles.set_callback(Some(PortListener::extended(&recorder)));

        let role = PortRole::DataRole(DataRole::Device);
        assert_eq!(roles.switch_role("otg", role), Status::Success);
        assert_eq!(
            *recorder.roles.lock(),
            vec![("otg".to_string(), role, Status::Success)]
        );

        // Status refresh follows the switch
        let ext = recorder.ext_ports.lock();
        assert_eq!(ext.len(), 1);
        let (ports, status) = &ext[0];
        assert_eq!(*status, Status::Success);
        assert_eq!(ports[0].status.current_data_role, DataRole::Device);
        assert_eq!(ports[0].status.current_power_role, PowerRole::Sink);

        let (ports, status) = roles.port_status();
        assert_eq!(status, Status::Success);
        assert_eq!(ports[0].status.port_name, "otg");
        assert_eq!(ports[0].status.current_mode, PortMode::Drp);
        assert!(!ports[0].status.can_change_mode);
        assert!(ports[0].status.can_change_data_role);
        assert!(ports[0].status.can_change_power_role);
        assert_eq!(ports[0].supported_modes, vec![PortMode::Ufp, PortMode::Dfp]);
    }

    #[test]
    fn test_host_is_source() {
        let dir = TempDir::new().unwrap();
        let (config, notifier) = setup(dir.path(), "device\n");
        let roles = RoleSwitchController::new(Arc::new(SysfsNodes), &config, notifier);

        assert_eq!(
            roles.switch_role("otg", PortRole::DataRole(DataRole::Host)),
            Status::Success
        );
        let (ports, _) = roles.port_status();
        assert_eq!(ports[0].status.current_data_role, DataRole::Host);
        assert_eq!(ports[0].status.current_power_role, PowerRole::Source);
    }

    #[test]
    fn test_read_back_mismatch_is_error() {
        let dir = TempDir::new().unwrap();
        let (config, notifier) = setup(dir.path(), "host\n");
        let roles = RoleSwitchController::new(Arc::new(StuckNode("host")), &config, notifier);
        let recorder = Arc::new(Recorder::default());
        roles.set_callback(Some(PortListener::extended(&recorder)));

        let role = PortRole::DataRole(DataRole::Device);
        assert_eq!(roles.switch_role("otg", role), Status::Error);
        assert_eq!(recorder.roles.lock()[0].2, Status::Error);
        // Refresh still happens and shows the unchanged role
        assert_eq!(
            recorder.ext_ports.lock()[0].0[0].status.current_data_role,
            DataRole::Host
        );
    }

    #[test]
    fn test_power_role_request_does_not_write() {
        let dir = TempDir::new().unwrap();
        let (config, notifier) = setup(dir.path(), "device\n");
        let roles = RoleSwitchController::new(Arc::new(SysfsNodes), &config, notifier);

        let status = roles.switch_role("otg", PortRole::PowerRole(PowerRole::Source));
        assert_eq!(status, Status::Error);
        assert_eq!(fs::read_to_string(&config.node).unwrap(), "device\n");
    }

    #[test]
    fn test_missing_node() {
        let dir = TempDir::new().unwrap();
        let (mut config, notifier) = setup(dir.path(), "host\n");
        config.node = dir.path().join("absent").to_string_lossy().to_string();
        let roles = RoleSwitchController::new(Arc::new(SysfsNodes), &config, notifier);
        let recorder = Arc::new(BaseRecorder::default());
        roles.set_callback(Some(PortListener::base(&recorder)));

        assert_eq!(
            roles.switch_role("otg", PortRole::DataRole(DataRole::Host)),
            Status::Error
        );

        let base = recorder.0.base_ports.lock();
        assert_eq!(base.len(), 1);
        assert_eq!(base[0].1, Status::Error);
        assert_eq!(base[0].0, vec![PortStatus::default()]);
    }

    #[test]
    fn test_query_without_listener() {
        let dir = TempDir::new().unwrap();
        let (config, notifier) = setup(dir.path(), "bogus\n");
        let roles = RoleSwitchController::new(Arc::new(SysfsNodes), &config, notifier);

        let (ports, status) = roles.query_port_status();
        assert_eq!(status, Status::Error);
        assert_eq!(ports.len(), 1);
        assert_eq!(roles.current_data_role(), DataRole::None);
    }
}

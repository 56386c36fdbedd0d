//! Gadget configuration controller
//!
//! Applies a requested function set to the gadget:
//!
//! ```text
//! lock ─► teardown ─► settle ─► resolve identity ─► link functions ─► pull-up
//!                                                                  └► (FunctionFS) settle ─► notify ─► os_desc/use
//! ```
//!
//! The whole sequence runs under one async mutex, so concurrent requests are
//! fully serialized. State queries do not take that mutex and may observe a
//! transition in progress.

use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::configfs::{DeviceNodes, GadgetPaths};
use super::function::FunctionSet;
use super::identity::{self, GadgetIdentity, GadgetProfile};
use super::types::Status;
use crate::config::{GadgetConfig, TimingConfig};
use crate::error::{AppError, Result};
use crate::events::{GadgetCallback, StatusNotifier};

/// Settle delays around reconfiguration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GadgetTiming {
    /// Pull-down time so the host notices the disconnect
    pub post_teardown_settle: Duration,
    /// Time given to FunctionFS daemons after pull-up
    pub post_pullup_settle: Duration,
}

impl Default for GadgetTiming {
    fn default() -> Self {
        Self::from(&TimingConfig::default())
    }
}

impl From<&TimingConfig> for GadgetTiming {
    fn from(config: &TimingConfig) -> Self {
        Self {
            post_teardown_settle: config.post_teardown_settle(),
            post_pullup_settle: config.post_pullup_settle(),
        }
    }
}

impl GadgetTiming {
    /// No delays, for tests and simulation
    pub fn immediate() -> Self {
        Self {
            post_teardown_settle: Duration::ZERO,
            post_pullup_settle: Duration::ZERO,
        }
    }
}

/// Gadget state visible to queries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GadgetState {
    /// Last requested function set
    pub current_functions: FunctionSet,
    /// Set once the gadget is pulled up with `current_functions`
    pub applied: bool,
}

impl GadgetState {
    pub fn status(&self) -> Status {
        if self.applied {
            Status::FunctionsApplied
        } else {
            Status::FunctionsNotApplied
        }
    }
}

/// Function links present in the active configuration
///
/// Owned by the reconfiguration mutex; teardown removes exactly these. Links
/// that already existed before the first teardown (e.g. created by boot
/// scripts) are adopted once from the configuration directory.
#[derive(Debug, Default)]
struct LinkedFunctions {
    links: Vec<PathBuf>,
    adopted: bool,
}

/// Gadget configuration controller
pub struct GadgetController {
    nodes: Arc<dyn DeviceNodes>,
    paths: GadgetPaths,
    udc: String,
    timing: GadgetTiming,
    notifier: Arc<StatusNotifier>,
    /// Reconfiguration lock, held for the whole set-functions sequence
    session: Mutex<LinkedFunctions>,
    state: RwLock<GadgetState>,
}

impl GadgetController {
    pub fn new(
        nodes: Arc<dyn DeviceNodes>,
        config: &GadgetConfig,
        timing: GadgetTiming,
        notifier: Arc<StatusNotifier>,
    ) -> Self {
        let paths = GadgetPaths::new(config);
        if !nodes.exists(&paths.os_desc_config()) {
            warn!(
                "configfs setup not done yet: {} not accessible",
                paths.os_desc_config().display()
            );
        }

        Self {
            nodes,
            paths,
            udc: config.udc.clone(),
            timing,
            notifier,
            session: Mutex::new(LinkedFunctions::default()),
            state: RwLock::new(GadgetState::default()),
        }
    }

    /// Snapshot of the gadget state; may reflect a transition in progress
    pub fn state(&self) -> GadgetState {
        *self.state.read()
    }

    pub fn paths(&self) -> &GadgetPaths {
        &self.paths
    }

    /// Report the current functions to `callback`
    pub fn get_current_functions(&self, callback: &Arc<dyn GadgetCallback>) -> GadgetState {
        let state = self.state();
        self.notifier
            .notify_current_functions(callback, state.current_functions, state.status());
        state
    }

    /// Apply a function set to the gadget
    ///
    /// Exactly one result is sent to `callback` (if any) and mirrored on the
    /// event bus. `timeout` is advisory and not enforced. The returned status
    /// additionally reflects a failure to set the OS descriptor flag, which
    /// happens after the result was already reported.
    pub async fn set_functions(
        &self,
        functions: FunctionSet,
        timeout: Duration,
        callback: Option<Arc<dyn GadgetCallback>>,
    ) -> Status {
        let mut session = self.session.lock().await;

        {
            let mut state = self.state.write();
            state.current_functions = functions;
            state.applied = false;
        }
        debug!(
            "set_functions {} ({:#x}), advisory timeout {:?}",
            functions,
            functions.bits(),
            timeout
        );

        let status = self.apply(&mut session, functions, callback.as_ref()).await;
        if status.is_success() {
            debug!("Usb gadget set functions called successfully");
        } else {
            debug!("Usb gadget set functions failed: {}", status);
        }
        status
    }

    async fn apply(
        &self,
        session: &mut LinkedFunctions,
        functions: FunctionSet,
        callback: Option<&Arc<dyn GadgetCallback>>,
    ) -> Status {
        if let Err(e) = self.tear_down(session) {
            error!("Gadget teardown failed: {}", e);
            return self.report(callback, functions, e.status());
        }

        // Leave the gadget pulled down to give time for the host to sense disconnect
        tokio::time::sleep(self.timing.post_teardown_settle).await;

        if functions.is_empty() {
            info!("No functions requested, gadget left torn down");
            return self.report(callback, functions, Status::Success);
        }

        let profile = match identity::resolve(functions) {
            Ok(profile) => profile,
            Err(e) => return self.report(callback, functions, e.status()),
        };

        if let Err(e) = self.write_identity(&profile.identity) {
            error!("Failed to set identity: {}", e);
            return self.report(callback, functions, e.status());
        }

        if let Err(e) = self.link_functions(session, &profile) {
            error!("Failed to link functions: {}", e);
            return self.report(callback, functions, e.status());
        }

        // Pull up the gadget right away when there are no FunctionFS functions
        if !profile.uses_functionfs() {
            let status = match self.pull_up() {
                Ok(()) => {
                    self.state.write().applied = true;
                    Status::Success
                }
                Err(e) => {
                    error!("Failed to pull up gadget: {}", e);
                    e.status()
                }
            };
            return self.report(callback, functions, status);
        }

        let status = match self.pull_up() {
            Ok(()) => {
                self.state.write().applied = true;
                tokio::time::sleep(self.timing.post_pullup_settle).await;
                Status::Success
            }
            Err(e) => {
                error!("Failed to pull up gadget: {}", e);
                e.status()
            }
        };
        self.notifier
            .notify_set_functions(callback, functions, status);

        // The controller requires os_desc/use after pull-up
        if status.is_success() && profile.descriptor_function().is_some() {
            if let Err(e) = self.nodes.write(&self.paths.os_desc_use(), "1") {
                error!("Failed to enable OS descriptors: {}", e);
                return Status::Error;
            }
        }
        status
    }

    fn report(
        &self,
        callback: Option<&Arc<dyn GadgetCallback>>,
        functions: FunctionSet,
        status: Status,
    ) -> Status {
        self.notifier
            .notify_set_functions(callback, functions, status);
        status
    }

    /// Unbind, reset the device class bytes and remove all function links
    fn tear_down(&self, session: &mut LinkedFunctions) -> Result<()> {
        if let Err(e) = self.nodes.write(&self.paths.pullup(), "") {
            debug!("Gadget cannot be pulled down: {}", e);
        }

        for path in [
            self.paths.device_class(),
            self.paths.device_sub_class(),
            self.paths.device_protocol(),
            self.paths.os_desc_use(),
        ] {
            self.nodes.write(&path, "0")?;
        }

        if !session.adopted {
            let existing = self
                .nodes
                .list_links(self.paths.config_dir(), self.paths.link_prefix())?;
            for link in existing {
                if !session.links.contains(&link) {
                    debug!("Adopting existing link {}", link.display());
                    session.links.push(link);
                }
            }
            session.adopted = true;
        }

        while let Some(link) = session.links.last() {
            self.nodes.remove_link(link)?;
            session.links.pop();
        }
        Ok(())
    }

    fn write_identity(&self, identity: &GadgetIdentity) -> Result<()> {
        self.nodes
            .write(&self.paths.vendor_id(), &identity.vendor_id_hex())?;
        self.nodes
            .write(&self.paths.product_id(), &identity.product_id_hex())?;
        Ok(())
    }

    /// Link profile functions as `<prefix>1`, `<prefix>2`, ...
    ///
    /// Links are recorded as soon as they exist so a failed attempt is
    /// cleaned up by the next teardown. Teardown has already removed every
    /// known link, so the slots are free.
    fn link_functions(&self, session: &mut LinkedFunctions, profile: &GadgetProfile) -> Result<()> {
        if let Some(label) = profile
            .descriptor_function()
            .and_then(|f| f.descriptor_label())
        {
            self.nodes.write(&self.paths.config_string(), label)?;
        }

        for (i, function) in profile.links.iter().enumerate() {
            let target = self.paths.function(function.instance_name());
            let link = self.paths.link(i + 1);

            self.nodes.symlink(&target, &link).map_err(|e| {
                AppError::node(&link, format!("cannot link {}: {}", function, e))
            })?;
            session.links.push(link);
            debug!("Linked {} at index {}", function, i + 1);
        }
        Ok(())
    }

    fn pull_up(&self) -> Result<()> {
        self.nodes.write(&self.paths.pullup(), &self.udc)
    }
}

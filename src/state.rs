use std::sync::Arc;

use crate::config::OtgConfig;
use crate::events::{EventBus, StatusNotifier};
use crate::otg::{DeviceNodes, GadgetController, GadgetTiming, RoleSwitchController};

/// Controllers shared by request handlers
///
/// There is one gadget and one port per board, so one `HalState` is built at
/// startup and handed to whatever front end drives it.
pub struct HalState {
    /// Gadget function configuration
    pub gadget: Arc<GadgetController>,
    /// Port role switching and status
    pub roles: Arc<RoleSwitchController>,
    /// Status notifier (listener registration)
    pub notifier: Arc<StatusNotifier>,
    /// Event bus for in-process observers
    pub events: Arc<EventBus>,
}

impl HalState {
    pub fn new(config: &OtgConfig, nodes: Arc<dyn DeviceNodes>) -> Arc<Self> {
        Self::with_timing(config, nodes, GadgetTiming::from(&config.timing))
    }

    /// Build with explicit settle delays
    pub fn with_timing(
        config: &OtgConfig,
        nodes: Arc<dyn DeviceNodes>,
        timing: GadgetTiming,
    ) -> Arc<Self> {
        let events = Arc::new(EventBus::new());
        let notifier = Arc::new(StatusNotifier::new(events.clone()));

        let gadget = Arc::new(GadgetController::new(
            nodes.clone(),
            &config.gadget,
            timing,
            notifier.clone(),
        ));
        let roles = Arc::new(RoleSwitchController::new(
            nodes,
            &config.role,
            notifier.clone(),
        ));

        Arc::new(Self {
            gadget,
            roles,
            notifier,
            events,
        })
    }
}

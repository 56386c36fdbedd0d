//! Device-policy listener interfaces and the status notifier
//!
//! Two port listener capability levels exist. The level is fixed when the
//! listener is registered; dispatch never probes the object at call time.
//! Listener failures are logged and swallowed, the hardware state has
//! already been committed or abandoned when they are called.

use parking_lot::RwLock;
use std::sync::{Arc, Weak};
use tracing::{debug, error, info};

use super::{EventBus, UsbEvent};
use crate::error::Result;
use crate::otg::{FunctionSet, PortRole, PortStatus, PortStatusExt, Status};

/// Receiver of gadget function results, supplied per request
pub trait GadgetCallback: Send + Sync {
    /// Answer to a current-functions query
    fn current_functions(&self, functions: FunctionSet, status: Status) -> Result<()>;

    /// Result of a set-functions request
    fn set_functions_result(&self, functions: FunctionSet, status: Status) -> Result<()>;
}

/// Base port listener
pub trait PortCallback: Send + Sync {
    fn role_switch_status(&self, port_name: &str, role: PortRole, status: Status) -> Result<()>;

    fn port_status_changed(&self, ports: &[PortStatus], status: Status) -> Result<()>;
}

/// Extended port listener, receives the full port status
pub trait PortCallbackExt: PortCallback {
    fn port_status_changed_ext(&self, ports: &[PortStatusExt], status: Status) -> Result<()>;
}

/// Registered port listener
///
/// Only a weak handle is kept; the caller owns the listener.
#[derive(Clone)]
pub enum PortListener {
    Base(Weak<dyn PortCallback>),
    Extended(Weak<dyn PortCallbackExt>),
}

impl PortListener {
    pub fn base<T: PortCallback + 'static>(callback: &Arc<T>) -> Self {
        let weak: Weak<dyn PortCallback> = Arc::downgrade(callback) as Weak<dyn PortCallback>;
        Self::Base(weak)
    }

    pub fn extended<T: PortCallbackExt + 'static>(callback: &Arc<T>) -> Self {
        let weak: Weak<dyn PortCallbackExt> = Arc::downgrade(callback) as Weak<dyn PortCallbackExt>;
        Self::Extended(weak)
    }

    pub fn is_extended(&self) -> bool {
        matches!(self, Self::Extended(_))
    }
}

/// Live handle obtained from a [`PortListener`]
enum PortTarget {
    Base(Arc<dyn PortCallback>),
    Extended(Arc<dyn PortCallbackExt>),
}

impl PortListener {
    fn upgrade(&self) -> Option<PortTarget> {
        match self {
            Self::Base(weak) => weak.upgrade().map(PortTarget::Base),
            Self::Extended(weak) => weak.upgrade().map(PortTarget::Extended),
        }
    }
}

/// Formats and emits status notifications
pub struct StatusNotifier {
    listener: RwLock<Option<PortListener>>,
    events: Arc<EventBus>,
}

impl StatusNotifier {
    pub fn new(events: Arc<EventBus>) -> Self {
        Self {
            listener: RwLock::new(None),
            events,
        }
    }

    /// Set, replace or clear the port listener
    pub fn set_listener(&self, listener: Option<PortListener>) {
        let mut current = self.listener.write();
        match (current.is_some(), listener.as_ref()) {
            (false, None) | (true, Some(_)) => {}
            (false, Some(l)) => {
                if l.is_extended() {
                    info!("Registering extended port callback");
                } else {
                    info!("Registering base port callback");
                }
            }
            (true, None) => info!("Port callback cleared"),
        }
        *current = listener;
    }

    /// Whether a live listener is registered
    pub fn has_listener(&self) -> bool {
        self.target().is_some()
    }

    fn target(&self) -> Option<PortTarget> {
        // Clone out so the lock is not held while calling into the listener
        let listener = self.listener.read().clone();
        listener.and_then(|l| l.upgrade())
    }

    /// Report the outcome of a role switch
    pub fn notify_role_switch(&self, port_name: &str, role: PortRole, status: Status) {
        self.events.publish(UsbEvent::RoleSwitched {
            port: port_name.to_string(),
            role,
            status,
        });

        let result = match self.target() {
            Some(PortTarget::Base(cb)) => cb.role_switch_status(port_name, role, status),
            Some(PortTarget::Extended(cb)) => cb.role_switch_status(port_name, role, status),
            None => {
                error!("Not notifying the userspace. Callback is not set");
                return;
            }
        };
        if let Err(e) = result {
            error!("Role switch status notification failed: {}", e);
        }
    }

    /// Report the port status, degrading to the base form when needed
    pub fn notify_port_status(&self, ports: &[PortStatusExt], status: Status) {
        self.events.publish(UsbEvent::PortStatusChanged {
            ports: ports.to_vec(),
            status,
        });

        let result = match self.target() {
            Some(PortTarget::Extended(cb)) => cb.port_status_changed_ext(ports, status),
            Some(PortTarget::Base(cb)) => {
                let base: Vec<PortStatus> = ports.iter().map(PortStatusExt::to_base).collect();
                cb.port_status_changed(&base, status)
            }
            None => {
                debug!("Notifying userspace skipped. Callback is not set");
                return;
            }
        };
        if let Err(e) = result {
            error!("Port status notification failed: {}", e);
        }
    }

    /// Report a set-functions result to the per-request callback
    pub fn notify_set_functions(
        &self,
        callback: Option<&Arc<dyn GadgetCallback>>,
        functions: FunctionSet,
        status: Status,
    ) {
        self.events
            .publish(UsbEvent::FunctionsSet { functions, status });

        let Some(cb) = callback else {
            debug!("No set-functions callback supplied");
            return;
        };
        if let Err(e) = cb.set_functions_result(functions, status) {
            error!("Error while calling set-functions callback: {}", e);
        }
    }

    /// Answer a current-functions query
    pub fn notify_current_functions(
        &self,
        callback: &Arc<dyn GadgetCallback>,
        functions: FunctionSet,
        status: Status,
    ) {
        self.events
            .publish(UsbEvent::FunctionsReported { functions, status });

        if let Err(e) = callback.current_functions(functions, status) {
            error!("Call to current-functions callback failed: {}", e);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::otg::{DataRole, PortMode};
    use parking_lot::Mutex;

    /// Records every notification; optionally fails each call
    #[derive(Default)]
    pub(crate) struct Recorder {
        pub fail: bool,
        pub roles: Mutex<Vec<(String, PortRole, Status)>>,
        pub base_ports: Mutex<Vec<(Vec<PortStatus>, Status)>>,
        pub ext_ports: Mutex<Vec<(Vec<PortStatusExt>, Status)>>,
        pub set_results: Mutex<Vec<(FunctionSet, Status)>>,
        pub current: Mutex<Vec<(FunctionSet, Status)>>,
    }

    impl Recorder {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        fn outcome(&self) -> Result<()> {
            if self.fail {
                Err(AppError::ListenerTransport("dead object".to_string()))
            } else {
                Ok(())
            }
        }
    }

    impl GadgetCallback for Recorder {
        fn current_functions(&self, functions: FunctionSet, status: Status) -> Result<()> {
            self.current.lock().push((functions, status));
            self.outcome()
        }

        fn set_functions_result(&self, functions: FunctionSet, status: Status) -> Result<()> {
            self.set_results.lock().push((functions, status));
            self.outcome()
        }
    }

    impl PortCallback for Recorder {
        fn role_switch_status(&self, port_name: &str, role: PortRole, status: Status) -> Result<()> {
            self.roles.lock().push((port_name.to_string(), role, status));
            self.outcome()
        }

        fn port_status_changed(&self, ports: &[PortStatus], status: Status) -> Result<()> {
            self.base_ports.lock().push((ports.to_vec(), status));
            self.outcome()
        }
    }

    impl PortCallbackExt for Recorder {
        fn port_status_changed_ext(&self, ports: &[PortStatusExt], status: Status) -> Result<()> {
            self.ext_ports.lock().push((ports.to_vec(), status));
            self.outcome()
        }
    }

    /// Implements only the base capability
    #[derive(Default)]
    pub(crate) struct BaseRecorder(pub Recorder);

    impl PortCallback for BaseRecorder {
        fn role_switch_status(&self, port_name: &str, role: PortRole, status: Status) -> Result<()> {
            self.0.role_switch_status(port_name, role, status)
        }

        fn port_status_changed(&self, ports: &[PortStatus], status: Status) -> Result<()> {
            self.0.port_status_changed(ports, status)
        }
    }

    fn sample_port() -> PortStatusExt {
        PortStatusExt {
            status: PortStatus {
                port_name: "otg".to_string(),
                current_data_role: DataRole::Device,
                supported_modes: vec![PortMode::Drp],
                ..Default::default()
            },
            supported_modes: vec![PortMode::Ufp, PortMode::Dfp],
            current_mode: PortMode::Drp,
        }
    }

    #[test]
    fn test_extended_listener_gets_extended_form() {
        let notifier = StatusNotifier::new(Arc::new(EventBus::new()));
        let recorder = Arc::new(Recorder::default());
        notifier.set_listener(Some(PortListener::extended(&recorder)));

        notifier.notify_port_status(&[sample_port()], Status::Success);

        assert_eq!(recorder.ext_ports.lock().len(), 1);
        assert!(recorder.base_ports.lock().is_empty());
        assert_eq!(
            recorder.ext_ports.lock()[0].0[0].supported_modes,
            vec![PortMode::Ufp, PortMode::Dfp]
        );
    }

    #[test]
    fn test_base_listener_gets_projection() {
        let notifier = StatusNotifier::new(Arc::new(EventBus::new()));
        let recorder = Arc::new(BaseRecorder::default());
        notifier.set_listener(Some(PortListener::base(&recorder)));

        notifier.notify_port_status(&[sample_port()], Status::Success);

        let calls = recorder.0.base_ports.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0[0].port_name, "otg");
        assert_eq!(calls[0].0[0].supported_modes, vec![PortMode::Drp]);
    }

    #[test]
    fn test_failing_listener_is_swallowed() {
        let notifier = StatusNotifier::new(Arc::new(EventBus::new()));
        let recorder = Arc::new(Recorder::failing());
        notifier.set_listener(Some(PortListener::extended(&recorder)));

        notifier.notify_role_switch("otg", PortRole::DataRole(DataRole::Host), Status::Success);
        notifier.notify_port_status(&[sample_port()], Status::Error);

        assert_eq!(recorder.roles.lock().len(), 1);
        assert_eq!(recorder.ext_ports.lock().len(), 1);
    }

    #[test]
    fn test_dropped_listener_and_clear() {
        let notifier = StatusNotifier::new(Arc::new(EventBus::new()));
        let recorder = Arc::new(Recorder::default());
        notifier.set_listener(Some(PortListener::extended(&recorder)));
        assert!(notifier.has_listener());

        drop(recorder);
        assert!(!notifier.has_listener());
        notifier.notify_port_status(&[sample_port()], Status::Success);

        notifier.set_listener(None);
        notifier.set_listener(None);
        assert!(!notifier.has_listener());
    }

    #[test]
    fn test_replace_listener() {
        let notifier = StatusNotifier::new(Arc::new(EventBus::new()));
        let first = Arc::new(Recorder::default());
        let second = Arc::new(Recorder::default());

        notifier.set_listener(Some(PortListener::extended(&first)));
        notifier.set_listener(Some(PortListener::extended(&second)));
        notifier.notify_role_switch("otg", PortRole::DataRole(DataRole::Device), Status::Error);

        assert!(first.roles.lock().is_empty());
        assert_eq!(second.roles.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_notifications_mirrored_on_bus() {
        let events = Arc::new(EventBus::new());
        let mut rx = events.subscribe();
        let notifier = StatusNotifier::new(events);

        notifier.notify_set_functions(None, FunctionSet::ADB, Status::Success);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_name(), "gadget.functions_set");
        assert_eq!(event.status(), Status::Success);
    }
}

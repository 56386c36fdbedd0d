//! USB OTG controller management
//!
//! Architecture:
//! ```text
//! GadgetController (function set → gadget)       RoleSwitchController (host/device)
//!     ├── identity (function set → VID/PID, link order)     │
//!     └──────────────┬──────────────────────────────────────┘
//!                    ├── DeviceNodes (configfs/sysfs I/O)
//!                    └── StatusNotifier (listener + event bus)
//! ```

pub mod configfs;
pub mod function;
pub mod gadget;
pub mod identity;
pub mod role;
pub mod types;

pub use configfs::{DeviceNodes, GadgetPaths, SysfsNodes};
pub use function::{FunctionSet, GadgetFunction};
pub use gadget::{GadgetController, GadgetState, GadgetTiming};
pub use identity::{resolve, GadgetIdentity, GadgetProfile};
pub use role::RoleSwitchController;
pub use types::{DataRole, PortMode, PortRole, PortStatus, PortStatusExt, PowerRole, Status};

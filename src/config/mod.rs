//! Configuration schema and store

mod schema;
mod store;

pub use schema::{GadgetConfig, OtgConfig, RoleConfig, TimingConfig};
pub use store::{ConfigStore, DEFAULT_CONFIG_PATH};

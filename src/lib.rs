//! otg-hal - USB OTG controller configuration
//!
//! This crate switches the data role of a dual-role USB port and assembles
//! the USB gadget (MTP, PTP, RNDIS, ADB, MIDI, accessory, audio source) that
//! is presented to a connected host, reporting every outcome to a
//! device-policy listener.

pub mod config;
pub mod error;
pub mod events;
pub mod otg;
pub mod state;

pub use error::{AppError, Result};

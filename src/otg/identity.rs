//! Function identity resolution
//!
//! Maps an exact function combination to the vendor/product ID pair the host
//! sees and to the ordered list of function instances to link. Combinations
//! are looked up as a whole; there is no per-function composition.

use tracing::{error, info};

use super::function::{FunctionSet, GadgetFunction};
use crate::error::{AppError, Result};

/// Google vendor ID used by every entry of the table
pub const GOOGLE_VENDOR_ID: u16 = 0x18d1;

/// Vendor/product ID pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GadgetIdentity {
    pub vendor_id: u16,
    pub product_id: u16,
}

impl GadgetIdentity {
    const fn google(product_id: u16) -> Self {
        Self {
            vendor_id: GOOGLE_VENDOR_ID,
            product_id,
        }
    }

    /// Value written to `idVendor`
    pub fn vendor_id_hex(&self) -> String {
        format!("0x{:04x}", self.vendor_id)
    }

    /// Value written to `idProduct`
    pub fn product_id_hex(&self) -> String {
        format!("0x{:04x}", self.product_id)
    }
}

const ADB: u64 = FunctionSet::ADB.bits();
const ACC: u64 = FunctionSet::ACCESSORY.bits();
const AUDIO: u64 = FunctionSet::AUDIO_SOURCE.bits();
const MIDI: u64 = FunctionSet::MIDI.bits();
const MTP: u64 = FunctionSet::MTP.bits();
const PTP: u64 = FunctionSet::PTP.bits();
const RNDIS: u64 = FunctionSet::RNDIS.bits();

/// Supported combinations. Extending support is a table change only.
const IDENTITY_TABLE: &[(u64, &str, GadgetIdentity)] = &[
    (MTP, "MTP", GadgetIdentity::google(0x4ee1)),
    (ADB | MTP, "ADB | MTP", GadgetIdentity::google(0x4ee2)),
    (RNDIS, "RNDIS", GadgetIdentity::google(0x4ee3)),
    (ADB | RNDIS, "ADB | RNDIS", GadgetIdentity::google(0x4ee4)),
    (PTP, "PTP", GadgetIdentity::google(0x4ee5)),
    (ADB | PTP, "ADB | PTP", GadgetIdentity::google(0x4ee6)),
    (ADB, "ADB", GadgetIdentity::google(0x4ee7)),
    (MIDI, "MIDI", GadgetIdentity::google(0x4ee8)),
    (ADB | MIDI, "ADB | MIDI", GadgetIdentity::google(0x4ee9)),
    (ACC, "Accessory", GadgetIdentity::google(0x2d00)),
    (ADB | ACC, "ADB | Accessory", GadgetIdentity::google(0x2d01)),
    (AUDIO, "Audio Source", GadgetIdentity::google(0x2d02)),
    (ADB | AUDIO, "ADB | Audio Source", GadgetIdentity::google(0x2d03)),
    (ACC | AUDIO, "Accessory | Audio Source", GadgetIdentity::google(0x2d04)),
    (
        ADB | ACC | AUDIO,
        "ADB | Accessory | Audio Source",
        GadgetIdentity::google(0x2d05),
    ),
];

/// Resolved gadget layout for a supported combination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GadgetProfile {
    pub functions: FunctionSet,
    pub identity: GadgetIdentity,
    /// Instances in link order; index 0 is linked as `<prefix>1`
    pub links: Vec<GadgetFunction>,
}

impl GadgetProfile {
    /// The function occupying the bulk-transfer descriptor slot, if any
    pub fn descriptor_function(&self) -> Option<GadgetFunction> {
        self.links
            .first()
            .copied()
            .filter(|f| f.descriptor_label().is_some())
    }

    /// Whether pull-up must wait for FunctionFS daemons
    pub fn uses_functionfs(&self) -> bool {
        self.links.iter().any(|f| f.uses_functionfs())
    }
}

/// Look up the identity for an exact function combination
pub fn resolve_identity(functions: FunctionSet) -> Result<GadgetIdentity> {
    match IDENTITY_TABLE
        .iter()
        .find(|(bits, _, _)| *bits == functions.bits())
    {
        Some((_, label, identity)) => {
            info!("[resolve_identity] {}", label);
            Ok(*identity)
        }
        None => {
            error!("Combination not supported: {}", functions);
            Err(AppError::UnsupportedCombination(functions))
        }
    }
}

/// Ordered instances to link for a function set
///
/// MTP takes the first slot, otherwise PTP; the rest follow in
/// [`GadgetFunction::APPEND_ORDER`].
pub fn link_order(functions: FunctionSet) -> Vec<GadgetFunction> {
    let mut links = Vec::with_capacity(GadgetFunction::APPEND_ORDER.len() + 1);

    if functions.contains(FunctionSet::MTP) {
        links.push(GadgetFunction::Mtp);
    } else if functions.contains(FunctionSet::PTP) {
        links.push(GadgetFunction::Ptp);
    }

    links.extend(
        GadgetFunction::APPEND_ORDER
            .iter()
            .copied()
            .filter(|f| functions.contains(f.flag())),
    );
    links
}

/// Resolve a function set into identity and link order
pub fn resolve(functions: FunctionSet) -> Result<GadgetProfile> {
    let identity = resolve_identity(functions)?;
    Ok(GadgetProfile {
        functions,
        identity,
        links: link_order(functions),
    })
}

//! USB gadget function kinds and function sets

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};
use std::str::FromStr;

use crate::error::AppError;

/// Set of requested gadget functions (bitmask)
///
/// Bit values match the USB gadget HAL so masks can be exchanged verbatim
/// with the device-policy layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FunctionSet(u64);

impl FunctionSet {
    pub const NONE: Self = Self(0);
    pub const ADB: Self = Self(1 << 0);
    pub const ACCESSORY: Self = Self(1 << 1);
    pub const MTP: Self = Self(1 << 2);
    pub const MIDI: Self = Self(1 << 3);
    pub const PTP: Self = Self(1 << 4);
    pub const RNDIS: Self = Self(1 << 5);
    pub const AUDIO_SOURCE: Self = Self(1 << 6);

    /// Name/flag pairs, in display order
    const NAMES: [(&'static str, Self); 7] = [
        ("mtp", Self::MTP),
        ("ptp", Self::PTP),
        ("midi", Self::MIDI),
        ("accessory", Self::ACCESSORY),
        ("audio_source", Self::AUDIO_SOURCE),
        ("rndis", Self::RNDIS),
        ("adb", Self::ADB),
    ];

    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True if every bit of `other` is set
    pub const fn contains(self, other: Self) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }
}

impl BitOr for FunctionSet {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for FunctionSet {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for FunctionSet {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl fmt::Display for FunctionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }

        let mut known = Self::NONE;
        let mut first = true;
        for (name, flag) in Self::NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str(",")?;
                }
                f.write_str(name)?;
                known |= flag;
                first = false;
            }
        }

        let unknown = self.0 & !known.0;
        if unknown != 0 {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "0x{:x}", unknown)?;
        }
        Ok(())
    }
}

impl FromStr for FunctionSet {
    type Err = AppError;

    /// Parse a comma separated list such as `adb,mtp` or `none`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut set = Self::NONE;
        for token in s.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let token = token.to_ascii_lowercase();
            if token == "none" {
                continue;
            }
            let flag = Self::NAMES
                .iter()
                .find(|(name, _)| *name == token)
                .map(|(_, flag)| *flag)
                .ok_or_else(|| AppError::Config(format!("Unknown USB function: {}", token)))?;
            set |= flag;
        }
        Ok(set)
    }
}

/// A function instance that can be linked into the active configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GadgetFunction {
    Mtp,
    Ptp,
    Midi,
    Accessory,
    AudioSource,
    Rndis,
    Adb,
}

impl GadgetFunction {
    /// Linking order after the MTP/PTP slot
    pub const APPEND_ORDER: [GadgetFunction; 5] = [
        Self::Midi,
        Self::Accessory,
        Self::AudioSource,
        Self::Rndis,
        Self::Adb,
    ];

    /// Function instance directory name under `functions/`
    pub fn instance_name(self) -> &'static str {
        match self {
            Self::Mtp => "mtp.gs0",
            Self::Ptp => "ptp.gs1",
            Self::Accessory => "accessory.gs2",
            Self::AudioSource => "audio_source.gs3",
            Self::Rndis => "rndis.gs4",
            Self::Midi => "midi.gs5",
            Self::Adb => "ffs.adb",
        }
    }

    /// Request bit for this function
    pub fn flag(self) -> FunctionSet {
        match self {
            Self::Mtp => FunctionSet::MTP,
            Self::Ptp => FunctionSet::PTP,
            Self::Midi => FunctionSet::MIDI,
            Self::Accessory => FunctionSet::ACCESSORY,
            Self::AudioSource => FunctionSet::AUDIO_SOURCE,
            Self::Rndis => FunctionSet::RNDIS,
            Self::Adb => FunctionSet::ADB,
        }
    }

    /// Configuration string announced while this function holds the
    /// bulk-transfer descriptor slot
    pub fn descriptor_label(self) -> Option<&'static str> {
        match self {
            Self::Mtp => Some("MTP"),
            Self::Ptp => Some("PTP"),
            _ => None,
        }
    }

    /// Served by a userspace daemon over FunctionFS
    pub fn uses_functionfs(self) -> bool {
        matches!(self, Self::Mtp | Self::Ptp | Self::Adb)
    }
}

impl fmt::Display for GadgetFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.instance_name())
    }
}

//! Target machine description: just enough for the read/write algebra's bit
//! math (§6's type/size oracle supplies everything else).

use serde::{Deserialize, Serialize};

/// Byte order, as reported by the external type/size oracle (§6).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Endianness {
    Little,
    Big,
}

/// The handful of machine facts the core itself needs to compute shifts,
/// masks and pointer sizes. Full type layout remains the external oracle's
/// job; duplicating it here would re-introduce the coupling §1 explicitly
/// keeps external.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineModel {
    pub endianness: Endianness,
    pub pointer_width_bits: u32,
    pub char_width_bits: u32,
    pub int_width_bits: u32,
    pub long_width_bits: u32,
}

impl MachineModel {
    /// A 64-bit little-endian Linux-style model — the common default used
    /// by CPAchecker's own SMG analysis and by these tests.
    pub fn linux64() -> Self {
        MachineModel {
            endianness: Endianness::Little,
            pointer_width_bits: 64,
            char_width_bits: 8,
            int_width_bits: 32,
            long_width_bits: 64,
        }
    }

    pub fn linux32() -> Self {
        MachineModel {
            endianness: Endianness::Little,
            pointer_width_bits: 32,
            char_width_bits: 8,
            int_width_bits: 32,
            long_width_bits: 32,
        }
    }
}

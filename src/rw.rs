//! Pure bit arithmetic for the read/write algebra (§4.F): endian-aware
//! partial extraction out of an oversized has-value edge, and bit-exact
//! integer/float reinterpretation for a union-typed read. Kept separate
//! from `State`'s `read`/`write` entry points (which also have to decide
//! *whether* to call into this module, drive materialization, and record
//! errors) so the arithmetic itself is trivially unit-testable.

use crate::machine::Endianness;
use crate::value::NumericValue;

/// Compute the bit shift to apply to an edge's raw value so that the
/// requested `[off, off+size)` sub-range ends up in the low bits (§4.F).
pub fn partial_read_shift(
    edge_offset: u64,
    edge_size: u64,
    want_offset: u64,
    want_size: u64,
    endianness: Endianness,
) -> u64 {
    match endianness {
        Endianness::Little => want_offset - edge_offset,
        Endianness::Big => (edge_offset + edge_size) - (want_offset + want_size),
    }
}

pub fn mask(width_bits: u32) -> u128 {
    if width_bits >= 128 {
        u128::MAX
    } else {
        (1u128 << width_bits) - 1
    }
}

/// Extract `[want_offset, want_offset+want_size)` out of `edge_value`,
/// which is known to cover that range within a larger has-value edge
/// `[edge_offset, edge_offset+edge_size)`. Returns `None` when the source
/// is wider than 128 bits (beyond any machine word we model) — per §4.F,
/// "wider-than-word values yield unknown".
pub fn bit_extract(
    edge_value: NumericValue,
    edge_offset: u64,
    edge_size: u64,
    want_offset: u64,
    want_size: u64,
    endianness: Endianness,
) -> Option<NumericValue> {
    if edge_size > 128 || want_size > 128 {
        return None;
    }
    let shift = partial_read_shift(edge_offset, edge_size, want_offset, want_size, endianness);
    let raw = edge_value.raw_bits();
    let shifted = raw.checked_shr(shift as u32).unwrap_or(0);
    let extracted = shifted & mask(want_size as u32);
    Some(NumericValue::Int {
        bits: extracted,
        width_bits: want_size as u32,
    })
}

/// Bit-exact reinterpretation between an integer and an IEEE-754 value of
/// the same width (§4.F "union float/integer conversion"). Returns `None`
/// for widths other than 32/64 bits, which we do not model.
pub fn reinterpret_union(value: NumericValue, want_float: bool) -> Option<NumericValue> {
    let width = value.width_bits();
    if width != 32 && width != 64 {
        return None;
    }
    let bits = value.raw_bits();
    match (value, want_float) {
        (NumericValue::Int { .. }, true) => Some(NumericValue::Float {
            bits: bits as u64,
            width_bits: width,
        }),
        (NumericValue::Float { .. }, false) => Some(NumericValue::Int {
            bits,
            width_bits: width,
        }),
        // Already the requested shape.
        (v @ NumericValue::Int { .. }, false) => Some(v),
        (v @ NumericValue::Float { .. }, true) => Some(v),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_read_little_endian_byte_at_offset_8() {
        // S2: a 32-bit little-endian value 0xCAFEBABE written at offset 0;
        // reading byte [8,16) should yield 0xBA.
        let v = NumericValue::Int { bits: 0xCAFE_BABE, width_bits: 32 };
        let out = bit_extract(v, 0, 32, 8, 8, Endianness::Little).unwrap();
        assert_eq!(out.raw_bits(), 0xBA);
    }

    #[test]
    fn partial_read_big_endian() {
        let v = NumericValue::Int { bits: 0xCAFE_BABE, width_bits: 32 };
        // Big-endian byte order: byte 0 (MSB) is 0xCA, at bit offset 0.
        let out = bit_extract(v, 0, 32, 0, 8, Endianness::Big).unwrap();
        assert_eq!(out.raw_bits(), 0xCA);
    }

    #[test]
    fn union_roundtrip() {
        let one_float_bits: u64 = 1.0f32.to_bits() as u64;
        let f = NumericValue::Float { bits: one_float_bits, width_bits: 32 };
        let i = reinterpret_union(f, false).unwrap();
        assert_eq!(i.raw_bits(), one_float_bits as u128);
        let back = reinterpret_union(i, true).unwrap();
        assert_eq!(back.raw_bits(), one_float_bits as u128);
    }

    #[test]
    fn wide_value_has_no_union_conversion() {
        let v = NumericValue::Int { bits: 0, width_bits: 128 };
        assert_eq!(reinterpret_union(v, true), None);
    }
}

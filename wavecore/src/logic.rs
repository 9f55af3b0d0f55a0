// Copyright 2023-2024 The Regents of the University of California
// Copyright 2024-2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>
//
// Four-valued logic digits and the 2-bit packing shared by bit vectors and transition vectors.

use num_enum::TryFromPrimitive;

/// One digit of four-valued logic.
///
/// The discriminant doubles as the 2-bit code used in packed storage.
#[repr(u8)]
#[derive(Debug, TryFromPrimitive, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub enum LogicValue {
    #[default]
    Zero = 0,
    One = 1,
    /// unknown or conflicting drivers
    X = 2,
    /// high impedance, i.e. undriven
    Z = 3,
}

const FOUR_STATE_LOOKUP: [char; 4] = ['0', '1', 'x', 'z'];

/// Number of bits used to encode one logic digit.
pub(crate) const BITS_PER_VALUE: usize = 2;
/// Number of logic digits in a byte.
pub(crate) const VALUES_PER_BYTE: usize = 8 / BITS_PER_VALUE;
const MASK: u8 = 0x3;

impl LogicValue {
    #[inline]
    pub fn from_char(value: char) -> Option<Self> {
        match value {
            '0' => Some(LogicValue::Zero),
            '1' => Some(LogicValue::One),
            'x' | 'X' => Some(LogicValue::X),
            'z' | 'Z' => Some(LogicValue::Z),
            _ => None,
        }
    }

    #[inline]
    pub fn to_char(self) -> char {
        FOUR_STATE_LOOKUP[self as usize]
    }

    /// True for `X` and `Z`.
    #[inline]
    pub fn is_unknown(self) -> bool {
        matches!(self, LogicValue::X | LogicValue::Z)
    }

    /// Decodes a 2-bit code. Higher bits are ignored.
    #[inline]
    pub(crate) fn from_code(code: u8) -> Self {
        // all four codes are valid, so this never falls back
        Self::try_from_primitive(code & MASK).unwrap_or(LogicValue::X)
    }
}

impl std::fmt::Display for LogicValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_char())
    }
}

/// Number of bytes needed to hold `bits` packed logic digits.
#[inline]
pub(crate) fn packed_len(bits: u32) -> usize {
    (bits as usize).div_ceil(VALUES_PER_BYTE)
}

/// Reads digit `index` from packed data.
///
/// The layout is big-endian: the first byte holds the most significant digits and may be only
/// partially filled, the last byte holds digits 0..=3 with digit 0 in the two lowest bits.
#[inline]
pub(crate) fn get_packed(data: &[u8], index: u32) -> LogicValue {
    let (byte, shift) = locate(data.len(), index);
    LogicValue::from_code(data[byte] >> shift)
}

#[inline]
pub(crate) fn set_packed(data: &mut [u8], index: u32, value: LogicValue) {
    let (byte, shift) = locate(data.len(), index);
    data[byte] = (data[byte] & !(MASK << shift)) | ((value as u8) << shift);
}

#[inline]
fn locate(num_bytes: usize, index: u32) -> (usize, u32) {
    let index = index as usize;
    let byte = num_bytes - 1 - index / VALUES_PER_BYTE;
    let shift = ((index % VALUES_PER_BYTE) * BITS_PER_VALUE) as u32;
    (byte, shift)
}

// Copyright 2023-2024 The Regents of the University of California
// Copyright 2024-2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use crate::logic::{get_packed, packed_len, set_packed, LogicValue};
use num_bigint::BigUint;
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum BitVectorParseError {
    #[error("invalid digit `{digit}` for a radix {radix} literal")]
    InvalidDigit { digit: char, radix: u32 },
    #[error("unsupported radix {0}, only 2, 10 and 16 are supported")]
    UnsupportedRadix(u32),
    #[error("literal has no digits")]
    Empty,
}

/// The number bases supported for parsing and formatting bit vector literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub enum Radix {
    Binary,
    Decimal,
    Hexadecimal,
}

impl Radix {
    pub fn from_u32(radix: u32) -> Option<Self> {
        match radix {
            2 => Some(Radix::Binary),
            10 => Some(Radix::Decimal),
            16 => Some(Radix::Hexadecimal),
            _ => None,
        }
    }

    pub fn to_u32(self) -> u32 {
        match self {
            Radix::Binary => 2,
            Radix::Decimal => 10,
            Radix::Hexadecimal => 16,
        }
    }

    /// Radix marker as used in query literals, e.g., `'h`.
    pub fn prefix(self) -> &'static str {
        match self {
            Radix::Binary => "'b",
            Radix::Decimal => "'d",
            Radix::Hexadecimal => "'h",
        }
    }
}

/// Fixed width vector of four-valued logic digits. Bit 0 is the least significant bit.
///
/// Digits are packed two bits each, most significant byte first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub struct BitVector {
    bits: u32,
    data: Vec<u8>,
}

impl BitVector {
    /// All zero vector of `width` bits.
    pub fn zeros(width: u32) -> Self {
        Self {
            bits: width,
            data: vec![0; packed_len(width)],
        }
    }

    /// Builds a vector from digits in LSB first order.
    pub fn from_logic_values(values: &[LogicValue]) -> Self {
        let mut out = Self::zeros(values.len() as u32);
        for (ii, value) in values.iter().enumerate() {
            out.set_bit(ii as u32, *value);
        }
        out
    }

    pub(crate) fn from_packed(bits: u32, data: &[u8]) -> Self {
        debug_assert_eq!(data.len(), packed_len(bits));
        Self {
            bits,
            data: data.to_vec(),
        }
    }

    /// Overwrites `self` with packed data, reusing the allocation.
    pub(crate) fn copy_from_packed(&mut self, bits: u32, data: &[u8]) {
        debug_assert_eq!(data.len(), packed_len(bits));
        self.bits = bits;
        self.data.clear();
        self.data.extend_from_slice(data);
    }

    #[inline]
    pub(crate) fn packed(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.bits
    }

    #[inline]
    pub fn get_bit(&self, index: u32) -> LogicValue {
        assert!(
            index < self.bits,
            "bit index {index} out of bounds for a {}-bit vector",
            self.bits
        );
        get_packed(&self.data, index)
    }

    #[inline]
    pub fn set_bit(&mut self, index: u32, value: LogicValue) {
        assert!(
            index < self.bits,
            "bit index {index} out of bounds for a {}-bit vector",
            self.bits
        );
        set_packed(&mut self.data, index, value)
    }

    /// Changes the width. All bits are cleared to zero.
    pub fn resize(&mut self, width: u32) {
        self.bits = width;
        self.data.clear();
        self.data.resize(packed_len(width), 0);
    }

    /// Iterates over all digits, starting with bit 0.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = LogicValue> + '_ {
        (0..self.bits).map(|ii| get_packed(&self.data, ii))
    }

    pub fn is_all_z(&self) -> bool {
        self.iter().all(|v| v == LogicValue::Z)
    }

    /// True if any digit is `X` or `Z`.
    pub fn has_unknown(&self) -> bool {
        self.iter().any(|v| v.is_unknown())
    }

    /// Interprets the lower 32 bits as an unsigned integer. `X` and `Z` count as zero.
    /// Only meant for small values like enumeration indices.
    pub fn to_int(&self) -> u32 {
        self.iter()
            .take(u32::BITS as usize)
            .enumerate()
            .filter(|(_, v)| *v == LogicValue::One)
            .fold(0u32, |acc, (ii, _)| acc | (1 << ii))
    }

    /// Three way comparison of two unsigned vectors of possibly different width.
    ///
    /// Positions where either side is `X` or `Z` never decide the outcome. If all decisive
    /// positions agree, the vectors compare equal.
    pub fn compare(&self, other: &BitVector) -> Ordering {
        let overlap = std::cmp::min(self.bits, other.bits);
        // a one in the high bits of the wider operand makes it larger
        if self.bits > overlap && (overlap..self.bits).any(|ii| self.get_bit(ii) == LogicValue::One)
        {
            return Ordering::Greater;
        }
        if other.bits > overlap
            && (overlap..other.bits).any(|ii| other.get_bit(ii) == LogicValue::One)
        {
            return Ordering::Less;
        }
        for ii in (0..overlap).rev() {
            let (a, b) = (self.get_bit(ii), other.get_bit(ii));
            if a.is_unknown() || b.is_unknown() || a == b {
                continue;
            }
            return if a == LogicValue::One {
                Ordering::Greater
            } else {
                Ordering::Less
            };
        }
        Ordering::Equal
    }

    /// Parses a literal in base 2, 10 or 16.
    pub fn parse(text: &str, radix: u32) -> Result<Self, BitVectorParseError> {
        let radix = Radix::from_u32(radix).ok_or(BitVectorParseError::UnsupportedRadix(radix))?;
        Self::parse_radix(text, radix)
    }

    pub fn parse_radix(text: &str, radix: Radix) -> Result<Self, BitVectorParseError> {
        if text.is_empty() {
            return Err(BitVectorParseError::Empty);
        }
        match radix {
            Radix::Binary => parse_binary(text),
            Radix::Decimal => parse_decimal(text),
            Radix::Hexadecimal => parse_hex(text),
        }
    }

    pub fn format(&self, radix: Radix) -> String {
        match radix {
            Radix::Binary => self.iter().rev().map(LogicValue::to_char).collect(),
            Radix::Decimal => self.to_biguint().to_string(),
            Radix::Hexadecimal => format_hex(self),
        }
    }

    /// Unsigned magnitude with `X` and `Z` treated as zero.
    fn to_biguint(&self) -> BigUint {
        let mut bytes = vec![0u8; (self.bits as usize).div_ceil(8)];
        for (ii, value) in self.iter().enumerate() {
            if value == LogicValue::One {
                bytes[ii / 8] |= 1 << (ii % 8);
            }
        }
        BigUint::from_bytes_le(&bytes)
    }
}

impl Display for BitVector {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.format(Radix::Binary))
    }
}

fn parse_binary(text: &str) -> Result<BitVector, BitVectorParseError> {
    let width = text.chars().count() as u32;
    let mut out = BitVector::zeros(width);
    for (ii, digit) in text.chars().enumerate() {
        let value = LogicValue::from_char(digit)
            .ok_or(BitVectorParseError::InvalidDigit { digit, radix: 2 })?;
        out.set_bit(width - 1 - ii as u32, value);
    }
    Ok(out)
}

fn parse_decimal(text: &str) -> Result<BitVector, BitVectorParseError> {
    if let Some(digit) = text.chars().find(|c| !c.is_ascii_digit()) {
        return Err(BitVectorParseError::InvalidDigit { digit, radix: 10 });
    }
    let value = BigUint::parse_bytes(text.as_bytes(), 10).ok_or(BitVectorParseError::Empty)?;
    // round up to full bytes, keeping room for a zero sign bit
    let width = (value.bits() as u32 + 1).div_ceil(8) * 8;
    let mut out = BitVector::zeros(width);
    for (byte_ii, byte) in value.to_bytes_le().into_iter().enumerate() {
        for bit in 0..8 {
            if (byte >> bit) & 1 == 1 {
                out.set_bit((byte_ii * 8 + bit) as u32, LogicValue::One);
            }
        }
    }
    Ok(out)
}

fn parse_hex(text: &str) -> Result<BitVector, BitVectorParseError> {
    let width = text.chars().count() as u32 * 4;
    let mut out = BitVector::zeros(width);
    for (ii, digit) in text.chars().enumerate() {
        let top = width - 1 - ii as u32 * 4;
        let nibble: [LogicValue; 4] = match digit {
            'x' | 'X' => [LogicValue::X; 4],
            'z' | 'Z' => [LogicValue::Z; 4],
            other => {
                let value = other
                    .to_digit(16)
                    .ok_or(BitVectorParseError::InvalidDigit { digit, radix: 16 })?;
                std::array::from_fn(|bit| {
                    if (value >> (3 - bit)) & 1 == 1 {
                        LogicValue::One
                    } else {
                        LogicValue::Zero
                    }
                })
            }
        };
        // nibble is msb first
        for (offset, value) in nibble.into_iter().enumerate() {
            out.set_bit(top - offset as u32, value);
        }
    }
    Ok(out)
}

fn format_hex(value: &BitVector) -> String {
    let num_digits = (value.bits as usize).div_ceil(4);
    let mut out = String::with_capacity(num_digits);
    // the leading digit may cover fewer than four bits
    for digit in (0..num_digits).rev() {
        let lsb = digit as u32 * 4;
        let msb = std::cmp::min(lsb + 4, value.bits);
        out.push(format_nibble((lsb..msb).map(|ii| value.get_bit(ii))));
    }
    out
}

/// Formats up to four digits (lsb first) as one hex character.
fn format_nibble(values: impl Iterator<Item = LogicValue> + Clone) -> char {
    if values.clone().any(|v| v == LogicValue::X) {
        'X'
    } else if values.clone().any(|v| v == LogicValue::Z) {
        if values.clone().all(|v| v == LogicValue::Z) {
            'Z'
        } else {
            // partially driven, the digit is unknown
            'X'
        }
    } else {
        let num = values
            .enumerate()
            .filter(|(_, v)| *v == LogicValue::One)
            .fold(0u32, |acc, (ii, _)| acc | (1 << ii));
        char::from_digit(num, 16)
            .map(|c| c.to_ascii_uppercase())
            .unwrap_or('X')
    }
}

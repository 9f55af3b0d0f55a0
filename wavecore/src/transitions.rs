// Copyright 2023-2024 The Regents of the University of California
// Copyright 2024-2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>
//
// Compact, append-only time series of the values of a single net.

use crate::bitvec::BitVector;
use crate::logic::packed_len;
use crate::{Result, TraceError};
use std::fmt::{Debug, Formatter};

pub type Timestamp = i64;

/// Storage for the first transitions is reserved in batches of this size.
const MIN_BATCH: usize = 64;

/// Value changes of one net.
///
/// Timestamps live in one dense array. Values are packed with two bits per logic digit,
/// every entry takes up the same number of bytes.
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub struct TransitionVector {
    width: u32,
    bytes_per_entry: usize,
    timestamps: Vec<Timestamp>,
    values: Vec<u8>,
}

impl Debug for TransitionVector {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "TransitionVector({} bits, {} changes, {} data bytes)",
            self.width,
            self.timestamps.len(),
            self.values.len()
        )
    }
}

impl TransitionVector {
    pub fn new(width: u32) -> Self {
        debug_assert!(width > 0, "zero width nets need to be widened by the caller");
        Self {
            width,
            bytes_per_entry: packed_len(width),
            timestamps: Vec::new(),
            values: Vec::new(),
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[Timestamp] {
        &self.timestamps
    }

    pub fn first_timestamp(&self) -> Option<Timestamp> {
        self.timestamps.first().copied()
    }

    pub fn last_timestamp(&self) -> Option<Timestamp> {
        self.timestamps.last().copied()
    }

    /// Adds a transition at the end.
    ///
    /// The value needs to be exactly as wide as the vector. Timestamps are expected in
    /// non-decreasing order. An earlier timestamp is logged and stored anyway, lookups
    /// around it become unreliable.
    pub fn append(&mut self, timestamp: Timestamp, value: &BitVector) -> Result<()> {
        if value.width() != self.width {
            return Err(TraceError::WidthMismatch {
                expected: self.width,
                actual: value.width(),
            });
        }
        if let Some(last) = self.last_timestamp() {
            if timestamp < last {
                tracing::warn!(last, timestamp, "transition appended out of order");
            }
        }
        if self.timestamps.capacity() == 0 {
            self.timestamps.reserve(MIN_BATCH);
            self.values.reserve(MIN_BATCH * self.bytes_per_entry);
        }
        self.timestamps.push(timestamp);
        self.values.extend_from_slice(value.packed());
        debug_assert_eq!(
            self.values.len(),
            self.timestamps.len() * self.bytes_per_entry
        );
        Ok(())
    }

    /// Returns a cursor at the transition in effect at `timestamp`. If several transitions share
    /// that timestamp, the cursor points to the last one.
    ///
    /// Timestamps before the first transition also return the first transition, since we
    /// treat the first value as valid since the beginning of time.
    /// Returns `None` if the vector is empty.
    pub fn find(&self, timestamp: Timestamp) -> Option<TransitionCursor<'_>> {
        if self.is_empty() {
            return None;
        }
        let index = find_last_at_or_before(&self.timestamps, timestamp).unwrap_or(0);
        Some(TransitionCursor {
            vector: self,
            index,
        })
    }

    /// Cursor at the `index`-th transition.
    pub fn cursor_at(&self, index: usize) -> Option<TransitionCursor<'_>> {
        (index < self.len()).then_some(TransitionCursor {
            vector: self,
            index,
        })
    }

    pub fn get(&self, index: usize) -> Option<(Timestamp, BitVector)> {
        self.cursor_at(index).map(|c| c.current())
    }

    pub fn iter_changes(&self) -> TransitionIterator<'_> {
        TransitionIterator {
            vector: self,
            index: 0,
            end: self.len(),
        }
    }

    /// All transitions that determine the value in `start..=end`: the one in effect at
    /// `start` followed by every later transition up to and including `end`.
    pub fn window(&self, start: Timestamp, end: Timestamp) -> TransitionIterator<'_> {
        let first = self.find(start).map(|c| c.index()).unwrap_or(0);
        let last = find_last_at_or_before(&self.timestamps, end).map_or(0, |ii| ii + 1);
        TransitionIterator {
            vector: self,
            index: first,
            end: std::cmp::max(first, last),
        }
    }

    pub fn size_in_memory(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.timestamps.capacity() * std::mem::size_of::<Timestamp>()
            + self.values.capacity()
    }

    pub(crate) fn shrink_to_fit(&mut self) {
        self.timestamps.shrink_to_fit();
        self.values.shrink_to_fit();
    }

    #[inline]
    fn packed_value(&self, index: usize) -> &[u8] {
        let start = index * self.bytes_per_entry;
        &self.values[start..(start + self.bytes_per_entry)]
    }
}

/// Finds the position of the last timestamp that is the same or less than the needle.
/// Returns `None` if all timestamps are larger.
/// Note that `timestamps` needs to be sorted from smallest to largest.
#[inline]
fn find_last_at_or_before(timestamps: &[Timestamp], needle: Timestamp) -> Option<usize> {
    // binary search for the number of timestamps at or before the needle
    let count = timestamps.partition_point(|t| *t <= needle);
    count.checked_sub(1)
}

/// Points at one transition of a [`TransitionVector`].
#[derive(Clone, Copy)]
pub struct TransitionCursor<'a> {
    vector: &'a TransitionVector,
    index: usize,
}

impl Debug for TransitionCursor<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "TransitionCursor({} @ {})",
            self.index,
            self.timestamp()
        )
    }
}

impl<'a> TransitionCursor<'a> {
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn timestamp(&self) -> Timestamp {
        self.vector.timestamps[self.index]
    }

    pub fn value(&self) -> BitVector {
        BitVector::from_packed(self.vector.width, self.vector.packed_value(self.index))
    }

    /// Copies the current value into `out`, reusing its allocation.
    pub fn value_into(&self, out: &mut BitVector) {
        out.copy_from_packed(self.vector.width, self.vector.packed_value(self.index))
    }

    pub fn current(&self) -> (Timestamp, BitVector) {
        (self.timestamp(), self.value())
    }

    /// True if there is no earlier transition.
    #[inline]
    pub fn is_first(&self) -> bool {
        self.index == 0
    }

    #[inline]
    pub fn is_last(&self) -> bool {
        self.index + 1 == self.vector.len()
    }

    pub fn next_timestamp(&self) -> Option<Timestamp> {
        self.vector.timestamps.get(self.index + 1).copied()
    }

    pub fn prev_timestamp(&self) -> Option<Timestamp> {
        let prev = self.index.checked_sub(1)?;
        Some(self.vector.timestamps[prev])
    }

    /// Moves to the next transition. Returns false if we are already at the end.
    pub fn advance(&mut self) -> bool {
        if self.is_last() {
            false
        } else {
            self.index += 1;
            true
        }
    }

    /// Moves to the previous transition. Returns false if we are already at the start.
    pub fn retreat(&mut self) -> bool {
        if self.is_first() {
            false
        } else {
            self.index -= 1;
            true
        }
    }
}

pub struct TransitionIterator<'a> {
    vector: &'a TransitionVector,
    index: usize,
    end: usize,
}

impl Iterator for TransitionIterator<'_> {
    type Item = (Timestamp, BitVector);

    fn next(&mut self) -> Option<Self::Item> {
        if self.index < self.end {
            let out = self.vector.get(self.index);
            self.index += 1;
            out
        } else {
            None
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.end - self.index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for TransitionIterator<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn bin(text: &str) -> BitVector {
        BitVector::parse(text, 2).unwrap()
    }

    fn make(width: u32, changes: &[(Timestamp, &str)]) -> TransitionVector {
        let mut out = TransitionVector::new(width);
        for (time, value) in changes.iter() {
            out.append(*time, &bin(value)).unwrap();
        }
        out
    }

    #[test]
    fn test_sizes() {
        assert_eq!(std::mem::size_of::<TransitionCursor>(), 16);
    }

    #[test]
    fn test_find() {
        let v = make(4, &[(0, "0000"), (10, "1x01"), (20, "zzzz"), (35, "0001")]);
        assert_eq!(v.len(), 4);

        // before the first transition
        let c = v.find(-5).unwrap();
        assert_eq!(c.current(), (0, bin("0000")));
        assert_eq!(c.prev_timestamp(), None);
        assert_eq!(c.next_timestamp(), Some(10));

        // exactly on a transition we see the new value
        let c = v.find(10).unwrap();
        assert_eq!(c.current(), (10, bin("1x01")));
        assert_eq!(c.prev_timestamp(), Some(0));
        assert_eq!(c.next_timestamp(), Some(20));

        // in between
        assert_eq!(v.find(34).unwrap().timestamp(), 20);
        assert!(v.find(34).unwrap().value().is_all_z());

        // after the last transition
        let c = v.find(1000).unwrap();
        assert_eq!(c.current(), (35, bin("0001")));
        assert_eq!(c.next_timestamp(), None);
        assert!(c.is_last());
    }

    #[test]
    fn test_find_empty() {
        assert!(TransitionVector::new(3).find(0).is_none());
    }

    #[test]
    fn test_same_timestamp_uses_last_value() {
        let v = make(1, &[(0, "0"), (5, "1"), (5, "0"), (9, "1")]);
        let c = v.find(5).unwrap();
        assert_eq!(c.index(), 2);
        assert_eq!(c.value(), bin("0"));
        assert_eq!(c.prev_timestamp(), Some(5));
    }

    #[test]
    fn test_width_mismatch() {
        let mut v = TransitionVector::new(4);
        assert!(matches!(
            v.append(0, &bin("101")),
            Err(TraceError::WidthMismatch {
                expected: 4,
                actual: 3
            })
        ));
        assert!(v.is_empty());
    }

    #[test]
    fn test_cursor_movement() {
        let v = make(2, &[(1, "01"), (2, "10"), (3, "11")]);
        let mut c = v.find(2).unwrap();
        assert!(c.retreat());
        assert_eq!(c.timestamp(), 1);
        assert!(!c.retreat());
        assert!(c.advance());
        assert!(c.advance());
        assert_eq!(c.timestamp(), 3);
        assert!(!c.advance());

        let mut scratch = BitVector::zeros(7);
        c.value_into(&mut scratch);
        assert_eq!(scratch, bin("11"));
    }

    #[test]
    fn test_window() {
        let v = make(1, &[(0, "0"), (10, "1"), (20, "0"), (30, "1")]);
        let times = |s, e| v.window(s, e).map(|(t, _)| t).collect::<Vec<_>>();
        assert_eq!(times(15, 25), [10, 20]);
        assert_eq!(times(10, 20), [10, 20]);
        assert_eq!(times(-10, 5), [0]);
        assert_eq!(times(31, 100), [30]);
        assert_eq!(v.iter_changes().len(), 4);
    }

    proptest! {
        #[test]
        fn find_matches_linear_scan(
            deltas in proptest::collection::vec(0i64..20, 1..60),
            query in -10i64..700,
        ) {
            let mut v = TransitionVector::new(8);
            let mut time = 0;
            for (ii, delta) in deltas.iter().enumerate() {
                time += delta;
                let mut value = BitVector::zeros(8);
                for bit in 0..8 {
                    if (ii >> bit) & 1 == 1 {
                        value.set_bit(bit, crate::LogicValue::One);
                    }
                }
                v.append(time, &value).unwrap();
            }
            let expected = v
                .timestamps()
                .iter()
                .rposition(|t| *t <= query)
                .unwrap_or(0);
            let c = v.find(query).unwrap();
            prop_assert_eq!(c.index(), expected);
            prop_assert_eq!(c.value().to_int() as usize, expected & 0xff);
        }
    }
}

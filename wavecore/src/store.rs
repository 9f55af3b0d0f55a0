// Copyright 2023-2024 The Regents of the University of California
// Copyright 2024-2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>
//
// Owns all nets of a trace. A loader fills it through the `TraceBuilder`, afterwards it is
// read-only until the next load.

use crate::hierarchy::{Hierarchy, HierarchyBuilder, Net, NetId, ScopeRef, SignalRef, Timescale};
use crate::transitions::{Timestamp, TransitionCursor, TransitionIterator, TransitionVector};
use crate::{BitVector, LoadOptions, Radix, Result, TraceError};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use std::fmt::{Debug, Formatter};
use std::num::NonZeroU32;

/// All nets of a loaded trace together with their value changes.
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub struct TraceStore {
    hierarchy: Hierarchy,
    signals: Vec<TransitionVector>,
    /// full hierarchical name to net
    names: FxHashMap<String, NetId>,
    max_timestamp: Timestamp,
    #[cfg_attr(feature = "serde1", serde(skip))]
    options: LoadOptions,
}

impl Debug for TraceStore {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "TraceStore({} nets, {} signals, until {})",
            self.net_count(),
            self.signals.len(),
            self.max_timestamp
        )
    }
}

impl Default for TraceStore {
    fn default() -> Self {
        TraceBuilder::default().finish()
    }
}

impl TraceStore {
    /// Starts a new load with the given options.
    pub fn builder(options: LoadOptions) -> TraceBuilder {
        TraceBuilder::new(options)
    }

    /// Discards all nets, names and scopes and starts a new load.
    /// Allocations are reused where possible.
    pub fn start_load(mut self) -> TraceBuilder {
        self.signals.clear();
        self.names.clear();
        TraceBuilder {
            hierarchy: self.hierarchy.into_builder(),
            signals: self.signals,
            names: self.names,
            prefix: String::new(),
            prefix_lens: Vec::new(),
            options: self.options,
        }
    }

    pub fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    pub fn net_count(&self) -> usize {
        self.hierarchy.num_nets()
    }

    /// Number of transition vectors. Smaller than the net count if there are clones.
    pub fn num_unique_signals(&self) -> usize {
        self.signals.len()
    }

    /// All net ids in creation order.
    pub fn net_ids(&self) -> impl Iterator<Item = NetId> + '_ {
        (0..self.net_count()).flat_map(NetId::from_index)
    }

    /// Top-level scopes.
    pub fn scopes(&self) -> impl Iterator<Item = ScopeRef> + '_ {
        self.hierarchy.scopes()
    }

    /// Nets declared outside of any scope.
    pub fn nets(&self) -> impl Iterator<Item = NetId> + '_ {
        self.hierarchy.nets()
    }

    pub fn lookup_scope<N: AsRef<str>>(&self, path: &[N]) -> Option<ScopeRef> {
        self.hierarchy.lookup_scope(path)
    }

    pub fn net(&self, id: NetId) -> Option<&Net> {
        self.hierarchy.get_net(id)
    }

    /// Looks up a net by its full hierarchical name, e.g., `top.cpu.pc`.
    pub fn find_net_by_name(&self, name: &str) -> Option<NetId> {
        self.names.get(name).copied()
    }

    pub fn net_width(&self, id: NetId) -> u32 {
        self.hierarchy[id].width()
    }

    pub fn short_name(&self, id: NetId) -> &str {
        self.hierarchy[id].name(&self.hierarchy)
    }

    pub fn full_name(&self, id: NetId) -> String {
        self.hierarchy[id].full_name(&self.hierarchy)
    }

    /// Power-of-ten unit of all timestamps. Only used for display purposes.
    pub fn timescale(&self) -> Option<Timescale> {
        self.hierarchy.timescale()
    }

    pub fn timescale_exponent(&self) -> Option<i32> {
        self.hierarchy.timescale_exponent()
    }

    pub fn signal(&self, signal: SignalRef) -> &TransitionVector {
        &self.signals[signal.index()]
    }

    /// Value changes of a net. Clones return the vector of the original net.
    pub fn transitions(&self, id: NetId) -> &TransitionVector {
        self.signal(self.hierarchy[id].signal_ref())
    }

    /// Cursor at the transition in effect at `timestamp`. `None` if the net never changes.
    pub fn find_transition(&self, id: NetId, timestamp: Timestamp) -> Option<TransitionCursor<'_>> {
        self.transitions(id).find(timestamp)
    }

    pub fn value_at(&self, id: NetId, timestamp: Timestamp) -> Option<BitVector> {
        self.find_transition(id, timestamp).map(|c| c.value())
    }

    pub fn format_value_at(&self, id: NetId, timestamp: Timestamp, radix: Radix) -> Option<String> {
        self.value_at(id, timestamp).map(|v| v.format(radix))
    }

    /// Transitions needed to draw the net between `start` and `end`.
    pub fn transitions_between(
        &self,
        id: NetId,
        start: Timestamp,
        end: Timestamp,
    ) -> TransitionIterator<'_> {
        self.transitions(id).window(start, end)
    }

    /// Latest last transition over all nets. Zero for an empty trace.
    pub fn max_timestamp(&self) -> Timestamp {
        self.max_timestamp
    }

    /// Size of the store in bytes.
    pub fn size_in_memory(&self) -> usize {
        let signals = self
            .signals
            .iter()
            .map(|s| s.size_in_memory())
            .sum::<usize>();
        let names = self.names.capacity()
            * (std::mem::size_of::<String>() + std::mem::size_of::<NetId>())
            + self.names.keys().map(|k| k.len()).sum::<usize>();
        std::mem::size_of::<Self>() + self.hierarchy.size_in_memory() + signals + names
    }

    pub fn print_statistics(&self) {
        let transitions = self.signals.iter().map(|s| s.len()).sum::<usize>();
        let max_changes = self.signals.iter().map(|s| s.len()).max().unwrap_or(0);
        tracing::info!(
            nets = self.net_count(),
            signals = self.signals.len(),
            transitions,
            max_changes,
            bytes = self.size_in_memory(),
            "trace store statistics"
        );
    }
}

/// Receives the declarations and value changes of a trace from a loader.
pub struct TraceBuilder {
    hierarchy: HierarchyBuilder,
    signals: Vec<TransitionVector>,
    names: FxHashMap<String, NetId>,
    /// full name of the current scope
    prefix: String,
    /// length of `prefix` before each open scope was entered
    prefix_lens: Vec<usize>,
    options: LoadOptions,
}

impl Default for TraceBuilder {
    fn default() -> Self {
        Self::new(LoadOptions::default())
    }
}

const SCOPE_SEPARATOR: char = '.';

impl TraceBuilder {
    pub fn new(options: LoadOptions) -> Self {
        Self {
            hierarchy: HierarchyBuilder::new(),
            signals: Vec::new(),
            names: FxHashMap::default(),
            prefix: String::new(),
            prefix_lens: Vec::new(),
            options,
        }
    }

    /// Records the unit of all timestamps as a power of ten, e.g., `-9` for nanoseconds.
    pub fn set_timescale(&mut self, order: i32) {
        if Timescale::from_exponent(order).exponent().is_none() {
            // the order is kept, only the unit is unknown
            tracing::warn!(order, "timescale is outside of the supported range");
        }
        self.hierarchy.set_timescale(order);
    }

    pub fn enter_scope(&mut self, name: &str) {
        self.hierarchy.add_scope(name);
        self.prefix_lens.push(self.prefix.len());
        if !self.prefix.is_empty() {
            self.prefix.push(SCOPE_SEPARATOR);
        }
        self.prefix.push_str(name);
    }

    /// Leaves the innermost scope.
    pub fn exit_scope(&mut self) -> Result<()> {
        self.hierarchy
            .pop_scope()
            .ok_or(TraceError::UnbalancedScope)?;
        if let Some(len) = self.prefix_lens.pop() {
            self.prefix.truncate(len);
        }
        Ok(())
    }

    /// Leaves the innermost scope after checking that it is called `name`.
    pub fn exit_named_scope(&mut self, name: &str) -> Result<()> {
        let current = self
            .hierarchy
            .current_scope()
            .ok_or(TraceError::UnbalancedScope)?;
        let actual = self.hierarchy.scope_name(current);
        if actual != name {
            return Err(TraceError::ScopeMismatch {
                expected: name.to_string(),
                actual: actual.to_string(),
            });
        }
        self.exit_scope()
    }

    /// Declares a net in the current scope.
    ///
    /// If `clone_of` names an earlier net, the new net shares its transitions instead of
    /// getting its own. A zero width is treated as a single bit.
    pub fn new_net(
        &mut self,
        short_name: &str,
        clone_of: Option<NetId>,
        width: u32,
    ) -> Result<NetId> {
        // a zero length net is represented as a 1-bit net
        let width = NonZeroU32::new(width).unwrap_or(NonZeroU32::MIN);
        let signal = match clone_of {
            Some(original) => {
                let original = self
                    .hierarchy
                    .net(original)
                    .ok_or(TraceError::UnknownNet(original))?;
                if original.width() != width.get() {
                    return Err(TraceError::WidthMismatch {
                        expected: original.width(),
                        actual: width.get(),
                    });
                }
                original.signal_ref()
            }
            None => {
                let signal = SignalRef::from_index(self.signals.len()).unwrap();
                self.signals.push(TransitionVector::new(width.get()));
                signal
            }
        };
        let id = self.hierarchy.add_net(short_name, width, signal);

        let full_name = if self.prefix.is_empty() {
            short_name.to_string()
        } else {
            format!("{}{SCOPE_SEPARATOR}{short_name}", self.prefix)
        };
        if self.names.contains_key(&full_name) {
            tracing::warn!(
                name = %full_name,
                "duplicate net name, lookups by name will return the newer net"
            );
        }
        self.names.insert(full_name, id);
        Ok(id)
    }

    pub fn append_transition(
        &mut self,
        net: NetId,
        timestamp: Timestamp,
        value: &BitVector,
    ) -> Result<()> {
        let signal = self
            .hierarchy
            .net(net)
            .ok_or(TraceError::UnknownNet(net))?
            .signal_ref();
        let vector = &mut self.signals[signal.index()];
        if self.options.strict_timestamps {
            if let Some(last) = vector.last_timestamp() {
                if timestamp < last {
                    return Err(TraceError::OutOfOrder {
                        net,
                        last,
                        timestamp,
                    });
                }
            }
        }
        vector.append(timestamp, value)
    }

    /// Number of nets declared so far.
    pub fn net_count(&self) -> usize {
        self.hierarchy.num_nets()
    }

    /// Completes the load. The resulting store is read-only.
    pub fn finish(mut self) -> TraceStore {
        if self.hierarchy.open_scopes() > 0 {
            tracing::warn!(
                open = self.hierarchy.open_scopes(),
                scope = %self.prefix,
                "trace finished with open scopes"
            );
        }
        let max_timestamp = if self.options.multi_thread {
            self.signals.par_iter_mut().for_each(|s| s.shrink_to_fit());
            self.signals
                .par_iter()
                .filter_map(|s| s.last_timestamp())
                .max()
        } else {
            self.signals.iter_mut().for_each(|s| s.shrink_to_fit());
            self.signals.iter().filter_map(|s| s.last_timestamp()).max()
        }
        .unwrap_or(0);
        tracing::debug!(
            nets = self.hierarchy.num_nets(),
            signals = self.signals.len(),
            max_timestamp,
            "finished loading trace"
        );
        TraceStore {
            hierarchy: self.hierarchy.finish(),
            signals: self.signals,
            names: self.names,
            max_timestamp,
            options: self.options,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::TimescaleUnit;

    fn bin(text: &str) -> BitVector {
        BitVector::parse(text, 2).unwrap()
    }

    #[test]
    fn test_full_names() {
        let mut b = TraceBuilder::default();
        let top_clk = b.new_net("clk", None, 1).unwrap();
        b.enter_scope("top");
        b.enter_scope("cpu");
        let pc = b.new_net("pc", None, 16).unwrap();
        b.exit_scope().unwrap();
        let rst = b.new_net("rst", None, 1).unwrap();
        b.exit_scope().unwrap();
        let store = b.finish();

        assert_eq!(store.net_count(), 3);
        assert_eq!(store.full_name(top_clk), "clk");
        assert_eq!(store.full_name(pc), "top.cpu.pc");
        assert_eq!(store.full_name(rst), "top.rst");
        assert_eq!(store.short_name(pc), "pc");
        assert_eq!(store.find_net_by_name("top.cpu.pc"), Some(pc));
        assert_eq!(store.find_net_by_name("top.rst"), Some(rst));
        assert_eq!(store.find_net_by_name("pc"), None);
    }

    #[test]
    fn test_scope_errors() {
        let mut b = TraceBuilder::default();
        assert!(matches!(b.exit_scope(), Err(TraceError::UnbalancedScope)));
        b.enter_scope("top");
        assert!(matches!(
            b.exit_named_scope("bottom"),
            Err(TraceError::ScopeMismatch { .. })
        ));
        b.exit_named_scope("top").unwrap();
    }

    #[test]
    fn test_zero_width_is_one_bit() {
        let mut b = TraceBuilder::default();
        let ev = b.new_net("event", None, 0).unwrap();
        b.append_transition(ev, 3, &bin("1")).unwrap();
        let store = b.finish();
        assert_eq!(store.net_width(ev), 1);
        assert_eq!(store.max_timestamp(), 3);
    }

    #[test]
    fn test_out_of_order() {
        let mut b = TraceBuilder::default();
        let a = b.new_net("a", None, 1).unwrap();
        b.append_transition(a, 10, &bin("1")).unwrap();
        // tolerated by default
        b.append_transition(a, 5, &bin("0")).unwrap();
        assert_eq!(b.finish().transitions(a).len(), 2);

        let mut b = TraceStore::builder(LoadOptions {
            strict_timestamps: true,
            ..LoadOptions::default()
        });
        let a = b.new_net("a", None, 1).unwrap();
        b.append_transition(a, 10, &bin("1")).unwrap();
        assert!(matches!(
            b.append_transition(a, 5, &bin("0")),
            Err(TraceError::OutOfOrder {
                last: 10,
                timestamp: 5,
                ..
            })
        ));
        // equal timestamps are fine
        b.append_transition(a, 10, &bin("0")).unwrap();
    }

    #[test]
    fn test_start_load_discards_everything() {
        let mut b = TraceBuilder::default();
        b.set_timescale(-9);
        b.enter_scope("top");
        let a = b.new_net("a", None, 4).unwrap();
        b.append_transition(a, 100, &bin("1010")).unwrap();
        b.exit_scope().unwrap();
        let store = b.finish();
        assert_eq!(store.max_timestamp(), 100);

        let mut b = store.start_load();
        assert_eq!(b.net_count(), 0);
        let c = b.new_net("c", None, 2).unwrap();
        b.append_transition(c, 7, &bin("11")).unwrap();
        let store = b.finish();
        assert_eq!(store.net_count(), 1);
        assert_eq!(store.max_timestamp(), 7);
        assert_eq!(store.find_net_by_name("top.a"), None);
        assert_eq!(store.full_name(c), "c");
        assert!(store.hierarchy().first_scope().is_none());
        assert!(store.timescale().is_none());
        assert!(store.timescale_exponent().is_none());
    }

    #[test]
    fn test_unsupported_timescale_keeps_order() {
        let mut b = TraceBuilder::default();
        b.set_timescale(-20);
        let store = b.finish();
        assert_eq!(store.timescale_exponent(), Some(-20));
        assert_eq!(store.timescale().map(|t| t.unit), Some(TimescaleUnit::Unknown));
        assert_eq!(store.timescale().and_then(|t| t.exponent()), None);

        let mut b = store.start_load();
        b.set_timescale(-8);
        let store = b.finish();
        assert_eq!(store.timescale_exponent(), Some(-8));
        assert_eq!(
            store.timescale(),
            Some(Timescale::new(10, TimescaleUnit::NanoSeconds))
        );
    }

    #[test]
    fn test_single_threaded_finish() {
        let mut b = TraceStore::builder(LoadOptions {
            multi_thread: false,
            ..LoadOptions::default()
        });
        let a = b.new_net("a", None, 2).unwrap();
        let c = b.new_net("c", None, 1).unwrap();
        for t in 0..50 {
            b.append_transition(a, t * 3, &bin("10")).unwrap();
        }
        b.append_transition(c, 200, &bin("1")).unwrap();
        let store = b.finish();
        assert!(!store.options().multi_thread);
        assert_eq!(store.max_timestamp(), 200);
        assert_eq!(store.transitions(a).len(), 50);
        assert_eq!(store.find_transition(a, 100).unwrap().timestamp(), 99);
    }

    #[test]
    fn test_empty_store() {
        let store = TraceStore::default();
        assert_eq!(store.net_count(), 0);
        assert_eq!(store.max_timestamp(), 0);
    }
}

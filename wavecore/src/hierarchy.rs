// Copyright 2023-2024 The Regents of the University of California
// Copyright 2024-2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use std::num::NonZeroU32;
use std::ops::Index;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub struct Timescale {
    pub factor: u32,
    pub unit: TimescaleUnit,
}

impl Timescale {
    pub fn new(factor: u32, unit: TimescaleUnit) -> Self {
        Timescale { factor, unit }
    }

    /// Converts a power-of-ten order, e.g., `-8` for `10ns`.
    /// Orders outside of `1fs..100s` result in an unknown unit.
    pub fn from_exponent(order: i32) -> Self {
        let factor_exp = order.rem_euclid(3);
        let unit = match order - factor_exp {
            -15 => TimescaleUnit::FemtoSeconds,
            -12 => TimescaleUnit::PicoSeconds,
            -9 => TimescaleUnit::NanoSeconds,
            -6 => TimescaleUnit::MicroSeconds,
            -3 => TimescaleUnit::MilliSeconds,
            0 => TimescaleUnit::Seconds,
            _ => return Timescale::new(1, TimescaleUnit::Unknown),
        };
        Timescale::new(10u32.pow(factor_exp as u32), unit)
    }

    /// Power-of-ten order of one time step. `None` if the unit is unknown.
    pub fn exponent(&self) -> Option<i32> {
        let unit = self.unit.to_exponent()? as i32;
        Some(unit + self.factor.checked_ilog10().unwrap_or(0) as i32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub enum TimescaleUnit {
    FemtoSeconds,
    PicoSeconds,
    NanoSeconds,
    MicroSeconds,
    MilliSeconds,
    Seconds,
    Unknown,
}

impl TimescaleUnit {
    pub fn to_exponent(&self) -> Option<i8> {
        match &self {
            TimescaleUnit::FemtoSeconds => Some(-15),
            TimescaleUnit::PicoSeconds => Some(-12),
            TimescaleUnit::NanoSeconds => Some(-9),
            TimescaleUnit::MicroSeconds => Some(-6),
            TimescaleUnit::MilliSeconds => Some(-3),
            TimescaleUnit::Seconds => Some(0),
            TimescaleUnit::Unknown => None,
        }
    }
}

/// Uniquely identifies a net. Ids are handed out in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub struct NetId(NonZeroU32);

impl NetId {
    #[inline]
    pub fn from_index(index: usize) -> Option<Self> {
        NonZeroU32::new(index as u32 + 1).map(NetId)
    }

    #[inline]
    pub fn index(&self) -> usize {
        (self.0.get() - 1) as usize
    }
}

impl std::fmt::Display for NetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.index())
    }
}

/// Uniquely identifies a scope in the hierarchy.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub struct ScopeRef(NonZeroU32);

impl ScopeRef {
    #[inline]
    pub fn from_index(index: usize) -> Option<Self> {
        NonZeroU32::new(index as u32 + 1).map(Self)
    }

    #[inline]
    pub fn index(&self) -> usize {
        (self.0.get() - 1) as usize
    }
}

/// Identifies a transition vector. Clone nets share the same `SignalRef`.
#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub struct SignalRef(NonZeroU32);

impl SignalRef {
    #[inline]
    pub fn from_index(index: usize) -> Option<Self> {
        NonZeroU32::new(index as u32 + 1).map(Self)
    }

    #[inline]
    pub fn index(&self) -> usize {
        (self.0.get() - 1) as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub struct NameId(NonZeroU32);

impl NameId {
    #[inline]
    fn from_index(index: usize) -> Self {
        let value = (index + 1) as u32;
        NameId(NonZeroU32::new(value).unwrap())
    }

    #[inline]
    fn index(&self) -> usize {
        (self.0.get() - 1) as usize
    }
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub struct Net {
    name: NameId,
    width: NonZeroU32,
    signal_idx: SignalRef,
    parent: Option<ScopeRef>,
    next: Option<ScopeOrNetRef>,
}

const SCOPE_SEPARATOR: char = '.';

impl Net {
    /// Local name of the net.
    #[inline]
    pub fn name<'a>(&self, hierarchy: &'a Hierarchy) -> &'a str {
        &hierarchy[self.name]
    }

    /// Full hierarchical name of the net.
    pub fn full_name(&self, hierarchy: &Hierarchy) -> String {
        match self.parent {
            None => self.name(hierarchy).to_string(),
            Some(parent) => {
                let mut out = hierarchy[parent].full_name(hierarchy);
                out.push(SCOPE_SEPARATOR);
                out.push_str(self.name(hierarchy));
                out
            }
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width.get()
    }

    /// Handle of the transition vector, shared with all clones of this net.
    #[inline]
    pub fn signal_ref(&self) -> SignalRef {
        self.signal_idx
    }

    pub fn parent(&self) -> Option<ScopeRef> {
        self.parent
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub enum ScopeOrNetRef {
    Scope(ScopeRef),
    Net(NetId),
}

impl ScopeOrNetRef {
    pub fn deref<'a>(&self, h: &'a Hierarchy) -> ScopeOrNet<'a> {
        h.get_item(*self)
    }
}

#[derive(Debug, Clone, Copy)]
pub enum ScopeOrNet<'a> {
    Scope(&'a Scope),
    Net(&'a Net),
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub struct Scope {
    name: NameId,
    child: Option<ScopeOrNetRef>,
    parent: Option<ScopeRef>,
    next: Option<ScopeOrNetRef>,
}

impl Scope {
    /// Local name of the scope.
    pub fn name<'a>(&self, hierarchy: &'a Hierarchy) -> &'a str {
        &hierarchy[self.name]
    }

    /// Full hierarchical name of the scope.
    pub fn full_name(&self, hierarchy: &Hierarchy) -> String {
        let mut parents = Vec::new();
        let mut parent = self.parent;
        while let Some(id) = parent {
            parents.push(id);
            parent = hierarchy[id].parent;
        }
        let mut out: String = String::with_capacity((parents.len() + 1) * 5);
        for parent_id in parents.iter().rev() {
            out.push_str(hierarchy[*parent_id].name(hierarchy));
            out.push(SCOPE_SEPARATOR)
        }
        out.push_str(self.name(hierarchy));
        out
    }

    pub fn parent(&self) -> Option<ScopeRef> {
        self.parent
    }

    pub fn items<'a>(&'a self, hierarchy: &'a Hierarchy) -> impl Iterator<Item = ScopeOrNetRef> + 'a {
        HierarchyItemIdIterator::new(hierarchy, self.child)
    }

    pub fn nets<'a>(&'a self, hierarchy: &'a Hierarchy) -> impl Iterator<Item = NetId> + 'a {
        to_net_iterator(HierarchyItemIdIterator::new(hierarchy, self.child))
    }

    pub fn scopes<'a>(&'a self, hierarchy: &'a Hierarchy) -> impl Iterator<Item = ScopeRef> + 'a {
        to_scope_ref_iterator(HierarchyItemIdIterator::new(hierarchy, self.child))
    }
}

struct HierarchyItemIdIterator<'a> {
    hierarchy: &'a Hierarchy,
    item: Option<ScopeOrNetRef>,
    is_first: bool,
}

impl<'a> HierarchyItemIdIterator<'a> {
    fn new(hierarchy: &'a Hierarchy, item: Option<ScopeOrNetRef>) -> Self {
        Self {
            hierarchy,
            item,
            is_first: true,
        }
    }

    fn get_next(&self, item: ScopeOrNetRef) -> Option<ScopeOrNetRef> {
        match self.hierarchy.get_item(item) {
            ScopeOrNet::Scope(scope) => scope.next,
            ScopeOrNet::Net(net) => net.next,
        }
    }
}

impl Iterator for HierarchyItemIdIterator<'_> {
    type Item = ScopeOrNetRef;

    fn next(&mut self) -> Option<Self::Item> {
        match self.item {
            None => None, // this iterator is done!
            Some(item) => {
                if self.is_first {
                    self.is_first = false;
                    Some(item)
                } else {
                    self.item = self.get_next(item);
                    self.item
                }
            }
        }
    }
}

fn to_net_iterator(iter: impl Iterator<Item = ScopeOrNetRef>) -> impl Iterator<Item = NetId> {
    iter.flat_map(|i| match i {
        ScopeOrNetRef::Scope(_) => None,
        ScopeOrNetRef::Net(n) => Some(n),
    })
}

fn to_scope_ref_iterator(
    iter: impl Iterator<Item = ScopeOrNetRef>,
) -> impl Iterator<Item = ScopeRef> {
    iter.flat_map(|i| match i {
        ScopeOrNetRef::Scope(s) => Some(s),
        ScopeOrNetRef::Net(_) => None,
    })
}

/// The module tree of a trace. Used for navigation, not for evaluating queries.
#[derive(Debug, Default)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub struct Hierarchy {
    nets: Vec<Net>,
    scopes: Vec<Scope>,
    first_item: Option<ScopeOrNetRef>,
    strings: Vec<String>,
    timescale_exponent: Option<i32>,
}

// public implementation
impl Hierarchy {
    /// Returns an iterator over references to all top-level scopes and nets.
    pub fn items(&self) -> impl Iterator<Item = ScopeOrNetRef> + '_ {
        HierarchyItemIdIterator::new(self, self.first_item)
    }

    /// Returns an iterator over references to all top-level scopes.
    pub fn scopes(&self) -> impl Iterator<Item = ScopeRef> + '_ {
        to_scope_ref_iterator(HierarchyItemIdIterator::new(self, self.first_item))
    }

    /// Returns an iterator over references to all top-level nets.
    pub fn nets(&self) -> impl Iterator<Item = NetId> + '_ {
        to_net_iterator(HierarchyItemIdIterator::new(self, self.first_item))
    }

    /// Returns the first scope that was entered by the loader.
    pub fn first_scope(&self) -> Option<&Scope> {
        self.scopes.first()
    }

    pub fn num_nets(&self) -> usize {
        self.nets.len()
    }

    pub fn get_net(&self, id: NetId) -> Option<&Net> {
        self.nets.get(id.index())
    }

    pub fn timescale(&self) -> Option<Timescale> {
        self.timescale_exponent.map(Timescale::from_exponent)
    }

    /// Power-of-ten order as set by the loader, also when it has no known unit.
    pub fn timescale_exponent(&self) -> Option<i32> {
        self.timescale_exponent
    }

    /// Size of the Hierarchy in bytes.
    pub fn size_in_memory(&self) -> usize {
        let net_size = self.nets.capacity() * std::mem::size_of::<Net>();
        let scope_size = self.scopes.capacity() * std::mem::size_of::<Scope>();
        let string_size = self.strings.capacity() * std::mem::size_of::<String>()
            + self.strings.iter().map(|s| s.len()).sum::<usize>();
        net_size + scope_size + string_size + std::mem::size_of::<Hierarchy>()
    }

    pub fn lookup_scope<N: AsRef<str>>(&self, names: &[N]) -> Option<ScopeRef> {
        let prefix = names.first()?.as_ref();
        let mut scope = self.scopes().find(|s| self[*s].name(self) == prefix)?;
        for name in names.iter().skip(1) {
            scope = self[scope]
                .scopes(self)
                .find(|s| self[*s].name(self) == name.as_ref())?;
        }
        Some(scope)
    }

    pub fn lookup_net<N: AsRef<str>>(&self, path: &[N], name: &N) -> Option<NetId> {
        match path {
            [] => self.nets().find(|n| self[*n].name(self) == name.as_ref()),
            scopes => {
                let scope = &self[self.lookup_scope(scopes)?];
                scope
                    .nets(self)
                    .find(|n| self[*n].name(self) == name.as_ref())
            }
        }
    }
}

// private implementation
impl Hierarchy {
    fn get_item(&self, id: ScopeOrNetRef) -> ScopeOrNet<'_> {
        match id {
            ScopeOrNetRef::Scope(id) => ScopeOrNet::Scope(&self[id]),
            ScopeOrNetRef::Net(id) => ScopeOrNet::Net(&self[id]),
        }
    }

    /// Clears all content while keeping allocations around for the next load.
    pub(crate) fn into_builder(mut self) -> HierarchyBuilder {
        self.nets.clear();
        self.scopes.clear();
        self.strings.clear();
        HierarchyBuilder::with_storage(self.nets, self.scopes, self.strings)
    }
}

impl Index<NetId> for Hierarchy {
    type Output = Net;

    fn index(&self, index: NetId) -> &Self::Output {
        &self.nets[index.index()]
    }
}

impl Index<ScopeRef> for Hierarchy {
    type Output = Scope;

    fn index(&self, index: ScopeRef) -> &Self::Output {
        &self.scopes[index.index()]
    }
}

impl Index<NameId> for Hierarchy {
    type Output = str;

    fn index(&self, index: NameId) -> &Self::Output {
        &self.strings[index.index()]
    }
}

struct ScopeStackEntry {
    scope_id: usize,
    last_child: Option<ScopeOrNetRef>,
}

pub(crate) struct HierarchyBuilder {
    nets: Vec<Net>,
    scopes: Vec<Scope>,
    first_item: Option<ScopeOrNetRef>,
    scope_stack: Vec<ScopeStackEntry>,
    strings: Vec<String>,
    timescale_exponent: Option<i32>,
}

const TOP_SCOPE: usize = usize::MAX;

impl HierarchyBuilder {
    pub(crate) fn new() -> Self {
        Self::with_storage(Vec::default(), Vec::default(), Vec::default())
    }

    fn with_storage(nets: Vec<Net>, scopes: Vec<Scope>, strings: Vec<String>) -> Self {
        // we start with a fake entry in the scope stack to keep track of multiple items in the top scope
        let scope_stack = vec![ScopeStackEntry {
            scope_id: TOP_SCOPE,
            last_child: None,
        }];
        HierarchyBuilder {
            nets,
            scopes,
            first_item: None,
            scope_stack,
            strings,
            timescale_exponent: None,
        }
    }

    pub(crate) fn finish(mut self) -> Hierarchy {
        self.nets.shrink_to_fit();
        self.scopes.shrink_to_fit();
        self.strings.shrink_to_fit();
        Hierarchy {
            nets: self.nets,
            scopes: self.scopes,
            first_item: self.first_item,
            strings: self.strings,
            timescale_exponent: self.timescale_exponent,
        }
    }

    fn add_string(&mut self, value: &str) -> NameId {
        // currently we make no effort to avoid saving the same string twice
        let sym = NameId::from_index(self.strings.len());
        self.strings.push(value.to_string());
        sym
    }

    fn get_str(&self, id: NameId) -> &str {
        &self.strings[id.index()]
    }

    /// adds a net or scope to the hierarchy tree
    fn add_to_hierarchy_tree(&mut self, node_id: ScopeOrNetRef) -> Option<ScopeRef> {
        let entry = self
            .scope_stack
            .last_mut()
            .expect("the top level entry is never popped");
        let parent = entry.scope_id;
        let fake_top_scope_parent = parent == TOP_SCOPE;
        match entry.last_child {
            Some(ScopeOrNetRef::Net(child)) => {
                // add pointer to new node from last child
                debug_assert!(self.nets[child.index()].next.is_none());
                self.nets[child.index()].next = Some(node_id);
            }
            Some(ScopeOrNetRef::Scope(child)) => {
                // add pointer to new node from last child
                debug_assert!(self.scopes[child.index()].next.is_none());
                self.scopes[child.index()].next = Some(node_id);
            }
            None => {
                if !fake_top_scope_parent {
                    // otherwise we need to add a pointer from the parent
                    debug_assert!(self.scopes[parent].child.is_none());
                    self.scopes[parent].child = Some(node_id);
                }
            }
        }
        // the new node is now the last child
        entry.last_child = Some(node_id);
        if self.first_item.is_none() {
            self.first_item = Some(node_id);
        }
        // return the parent id if we had a real parent and we aren't at the top scope
        if fake_top_scope_parent {
            None
        } else {
            ScopeRef::from_index(parent)
        }
    }

    /// Checks to see if a scope of the same name already exists.
    fn find_duplicate_scope(&self, name: &str) -> Option<ScopeRef> {
        let parent = self.scope_stack.last()?;
        let mut maybe_item = if parent.scope_id == TOP_SCOPE {
            self.first_item
        } else {
            self.scopes[parent.scope_id].child
        };

        while let Some(item) = maybe_item {
            if let ScopeOrNetRef::Scope(other) = item {
                if self.get_str(self.scopes[other.index()].name) == name {
                    return Some(other);
                }
            }
            maybe_item = self.get_next(item);
        }
        None
    }

    fn get_next(&self, item: ScopeOrNetRef) -> Option<ScopeOrNetRef> {
        match item {
            ScopeOrNetRef::Scope(scope_ref) => self.scopes[scope_ref.index()].next,
            ScopeOrNetRef::Net(net_ref) => self.nets[net_ref.index()].next,
        }
    }

    fn find_last_child(&self, scope: ScopeRef) -> Option<ScopeOrNetRef> {
        let mut child = self.scopes[scope.index()].child?;
        while let Some(next) = self.get_next(child) {
            child = next;
        }
        Some(child)
    }

    /// Enters a scope. Re-entering a scope that already exists under the current parent
    /// appends to the existing scope instead of creating a sibling with the same name.
    pub(crate) fn add_scope(&mut self, name: &str) -> ScopeRef {
        if let Some(duplicate) = self.find_duplicate_scope(name) {
            let last_child = self.find_last_child(duplicate);
            self.scope_stack.push(ScopeStackEntry {
                scope_id: duplicate.index(),
                last_child,
            });
            duplicate
        } else {
            let node_id = self.scopes.len();
            let scope_ref = ScopeRef::from_index(node_id).unwrap();
            let parent = self.add_to_hierarchy_tree(ScopeOrNetRef::Scope(scope_ref));
            self.scope_stack.push(ScopeStackEntry {
                scope_id: node_id,
                last_child: None,
            });
            let name = self.add_string(name);
            self.scopes.push(Scope {
                parent,
                child: None,
                next: None,
                name,
            });
            scope_ref
        }
    }

    pub(crate) fn add_net(&mut self, name: &str, width: NonZeroU32, signal_idx: SignalRef) -> NetId {
        let net_id = NetId::from_index(self.nets.len()).unwrap();
        let parent = self.add_to_hierarchy_tree(ScopeOrNetRef::Net(net_id));
        let name = self.add_string(name);
        self.nets.push(Net {
            parent,
            name,
            width,
            signal_idx,
            next: None,
        });
        net_id
    }

    /// Innermost open scope, `None` at the top level.
    pub(crate) fn current_scope(&self) -> Option<ScopeRef> {
        let entry = self.scope_stack.last()?;
        if entry.scope_id == TOP_SCOPE {
            None
        } else {
            ScopeRef::from_index(entry.scope_id)
        }
    }

    pub(crate) fn scope_name(&self, scope: ScopeRef) -> &str {
        self.get_str(self.scopes[scope.index()].name)
    }

    /// Number of scopes that were entered but not exited yet.
    pub(crate) fn open_scopes(&self) -> usize {
        self.scope_stack.len() - 1
    }

    /// Returns `None` if we are already at the top level.
    pub(crate) fn pop_scope(&mut self) -> Option<ScopeRef> {
        let scope = self.current_scope()?;
        self.scope_stack.pop();
        Some(scope)
    }

    pub(crate) fn set_timescale(&mut self, order: i32) {
        self.timescale_exponent = Some(order);
    }

    pub(crate) fn num_nets(&self) -> usize {
        self.nets.len()
    }

    pub(crate) fn net(&self, id: NetId) -> Option<&Net> {
        self.nets.get(id.index())
    }
}

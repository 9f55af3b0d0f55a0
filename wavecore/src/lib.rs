// Copyright 2023-2024 The Regents of the University of California
// Copyright 2024-2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

mod bitvec;
mod hierarchy;
mod logic;
pub mod query;
mod store;
mod transitions;

/// Cargo.toml version of this library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Copy, Clone)]
pub struct LoadOptions {
    /// Indicates that the store should use multiple threads if possible.
    pub multi_thread: bool,
    /// Reject transitions that are earlier than the previous transition of the same net,
    /// instead of logging a warning and storing them anyway.
    pub strict_timestamps: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            multi_thread: true,
            strict_timestamps: false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    #[error("unknown net {0}")]
    UnknownNet(NetId),
    #[error("expected a {expected}-bit value, got {actual} bits")]
    WidthMismatch { expected: u32, actual: u32 },
    #[error("transition at {timestamp} on net {net} is earlier than the last transition at {last}")]
    OutOfOrder {
        net: NetId,
        last: Timestamp,
        timestamp: Timestamp,
    },
    #[error("cannot exit a scope at the top level")]
    UnbalancedScope,
    #[error("expected to exit scope `{expected}`, but `{actual}` is the innermost scope")]
    ScopeMismatch { expected: String, actual: String },
}

pub type Result<T> = std::result::Result<T, TraceError>;

pub use bitvec::{BitVector, BitVectorParseError, Radix};
pub use hierarchy::{
    Hierarchy, Net, NetId, Scope, ScopeOrNet, ScopeOrNetRef, ScopeRef, SignalRef, Timescale,
    TimescaleUnit,
};
pub use logic::LogicValue;
pub use query::{Query, QueryParseError};
pub use store::{TraceBuilder, TraceStore};
pub use transitions::{Timestamp, TransitionCursor, TransitionIterator, TransitionVector};

// Copyright 2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

#![allow(dead_code)]

use wavecore::{BitVector, NetId, Timestamp, TraceBuilder, TraceStore};

/// Installs a log subscriber once. Use `RUST_LOG=wavecore=trace` to see scan steps.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn bin(text: &str) -> BitVector {
    BitVector::parse(text, 2).unwrap()
}

pub fn hex(text: &str) -> BitVector {
    BitVector::parse(text, 16).unwrap()
}

pub fn append_all(b: &mut TraceBuilder, net: NetId, changes: &[(Timestamp, BitVector)]) {
    for (time, value) in changes.iter() {
        b.append_transition(net, *time, value).unwrap();
    }
}

/// Two nets in scope `tb`:
/// `ena` (1 bit): 0@0, 1@100, 0@200
/// `addr` (16 bit): 0x0000@0, 0x1000@50, 0x2000@150
pub fn enable_and_address() -> TraceStore {
    let mut b = TraceBuilder::default();
    b.set_timescale(-9);
    b.enter_scope("tb");
    let ena = b.new_net("ena", None, 1).unwrap();
    let addr = b.new_net("addr", None, 16).unwrap();
    b.exit_scope().unwrap();
    append_all(&mut b, ena, &[(0, bin("0")), (100, bin("1")), (200, bin("0"))]);
    append_all(
        &mut b,
        addr,
        &[(0, hex("0000")), (50, hex("1000")), (150, hex("2000"))],
    );
    b.finish()
}

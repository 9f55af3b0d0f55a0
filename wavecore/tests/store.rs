// Copyright 2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

mod utils;

use itertools::Itertools;
use utils::*;
use wavecore::{
    LoadOptions, NetId, Radix, ScopeOrNet, ScopeOrNetRef, Timestamp, TraceBuilder, TraceError,
    TraceStore,
};

#[test]
fn test_round_trip() {
    init_logging();
    let widths = [1u32, 3, 8, 13, 64, 65];
    let mut b = TraceBuilder::default();
    b.enter_scope("top");
    let nets = widths
        .iter()
        .enumerate()
        .map(|(ii, w)| b.new_net(&format!("n{ii}"), None, *w).unwrap())
        .collect::<Vec<_>>();
    b.exit_scope().unwrap();

    // every net gets a different pattern, including unknown digits
    let mut expected = Vec::new();
    for (net, width) in nets.iter().zip(widths.iter()) {
        let changes = (0..5)
            .map(|step| {
                let digits: String = (0..*width)
                    .map(|bit| match (bit + step + net.index() as u32) % 5 {
                        0 | 3 => '1',
                        1 => 'x',
                        2 => '0',
                        _ => 'z',
                    })
                    .collect();
                (step as Timestamp * 10 + net.index() as Timestamp, bin(&digits))
            })
            .collect::<Vec<_>>();
        append_all(&mut b, *net, &changes);
        expected.push(changes);
    }
    let store = b.finish();

    assert_eq!(store.net_count(), widths.len());
    assert_eq!(store.max_timestamp(), 40 + widths.len() as Timestamp - 1);
    for ((net, width), changes) in nets.iter().zip(widths.iter()).zip(expected.iter()) {
        assert_eq!(store.net_width(*net), *width);
        assert_eq!(store.full_name(*net), format!("top.n{}", net.index()));
        assert_eq!(store.find_net_by_name(&store.full_name(*net)), Some(*net));
        for (time, value) in changes.iter() {
            let cursor = store.find_transition(*net, *time).unwrap();
            assert_eq!(cursor.timestamp(), *time);
            assert_eq!(&cursor.value(), value);
            // in between two changes, the older one is in effect
            let cursor = store.find_transition(*net, *time + 5).unwrap();
            assert_eq!(cursor.timestamp(), *time);
        }
        let stored = store.transitions(*net).iter_changes().collect::<Vec<_>>();
        assert_eq!(&stored, changes);
    }
}

#[test]
fn test_clones_share_transitions() {
    init_logging();
    let mut b = TraceBuilder::default();
    b.enter_scope("cpu");
    let a = b.new_net("clk", None, 1).unwrap();
    b.exit_scope().unwrap();
    b.enter_scope("mem");
    let clone = b.new_net("clk", Some(a), 1).unwrap();
    let second = b.new_net("clock", Some(clone), 1).unwrap();
    b.exit_scope().unwrap();

    // appending through any of them is visible through all
    append_all(&mut b, a, &[(0, bin("0")), (5, bin("1"))]);
    append_all(&mut b, second, &[(10, bin("0"))]);
    append_all(&mut b, clone, &[(15, bin("1"))]);

    // clones need to have the same width
    assert!(matches!(
        b.new_net("wide", Some(a), 2),
        Err(TraceError::WidthMismatch {
            expected: 1,
            actual: 2
        })
    ));
    let unknown = NetId::from_index(100).unwrap();
    assert!(matches!(
        b.new_net("bad", Some(unknown), 1),
        Err(TraceError::UnknownNet(_))
    ));
    let store = b.finish();

    assert_eq!(store.num_unique_signals(), 1);
    assert_eq!(store.net_count(), 3);
    for t in -3..20 {
        let values = [a, clone, second]
            .iter()
            .map(|n| store.value_at(*n, t).unwrap())
            .collect::<Vec<_>>();
        assert!(values.iter().all_equal(), "{t}: {values:?}");
    }
    assert_eq!(store.transitions(clone).len(), 4);
    assert_eq!(store.full_name(clone), "mem.clk");
    assert_eq!(store.full_name(a), "cpu.clk");
}

#[test]
fn test_scope_tree() {
    init_logging();
    let mut b = TraceBuilder::default();
    let reset = b.new_net("reset", None, 1).unwrap();
    b.enter_scope("top");
    b.enter_scope("alu");
    let op = b.new_net("op", None, 3).unwrap();
    b.exit_named_scope("alu").unwrap();
    b.enter_scope("fpu");
    b.exit_scope().unwrap();
    // re-entering a scope adds to the existing one
    b.enter_scope("alu");
    let res = b.new_net("res", None, 32).unwrap();
    b.exit_scope().unwrap();
    b.exit_scope().unwrap();
    let store = b.finish();

    assert_eq!(store.nets().collect::<Vec<_>>(), vec![reset]);
    let top = store.scopes().exactly_one().ok().unwrap();
    let h = store.hierarchy();
    assert_eq!(h[top].name(h), "top");
    let children = h[top]
        .scopes(h)
        .map(|s| h[s].full_name(h))
        .collect::<Vec<_>>();
    assert_eq!(children, ["top.alu", "top.fpu"]);

    let alu = store.lookup_scope(&["top", "alu"]).unwrap();
    let fpu = store.lookup_scope(&["top", "fpu"]).unwrap();
    assert_eq!(h[alu].nets(h).collect::<Vec<_>>(), vec![op, res]);

    // mixed children in declaration order
    assert_eq!(
        h.items().collect::<Vec<_>>(),
        [ScopeOrNetRef::Net(reset), ScopeOrNetRef::Scope(top)]
    );
    assert_eq!(
        h[top].items(h).collect::<Vec<_>>(),
        [ScopeOrNetRef::Scope(alu), ScopeOrNetRef::Scope(fpu)]
    );
    // the re-entered scope keeps its first net
    assert_eq!(
        h[alu].items(h).collect::<Vec<_>>(),
        [ScopeOrNetRef::Net(op), ScopeOrNetRef::Net(res)]
    );
    let names = h
        .items()
        .map(|item| match item.deref(h) {
            ScopeOrNet::Scope(scope) => format!("scope {}", scope.full_name(h)),
            ScopeOrNet::Net(net) => format!("net {} ({} bit)", net.full_name(h), net.width()),
        })
        .collect::<Vec<_>>();
    assert_eq!(names, ["net reset (1 bit)", "scope top"]);
    assert!(h[fpu].items(h).next().is_none());
    assert_eq!(h.lookup_net(&["top", "alu"], &"res"), Some(res));
    assert!(store.lookup_scope(&["top", "mul"]).is_none());
    assert_eq!(store.short_name(res), "res");
    assert_eq!(store.full_name(res), "top.alu.res");
}

#[test]
fn test_duplicate_names_last_one_wins() {
    init_logging();
    let mut b = TraceBuilder::default();
    b.enter_scope("top");
    let first = b.new_net("data", None, 8).unwrap();
    let second = b.new_net("data", None, 4).unwrap();
    b.exit_scope().unwrap();
    let store = b.finish();
    assert_ne!(first, second);
    assert_eq!(store.net_count(), 2);
    assert_eq!(store.find_net_by_name("top.data"), Some(second));
}

#[test]
fn test_append_errors() {
    init_logging();
    let mut b = TraceStore::builder(LoadOptions {
        multi_thread: false,
        strict_timestamps: true,
    });
    let a = b.new_net("a", None, 4).unwrap();
    assert!(matches!(
        b.append_transition(a, 0, &bin("1")),
        Err(TraceError::WidthMismatch {
            expected: 4,
            actual: 1
        })
    ));
    let missing = NetId::from_index(7).unwrap();
    assert!(matches!(
        b.append_transition(missing, 0, &bin("1")),
        Err(TraceError::UnknownNet(n)) if n == missing
    ));
    b.append_transition(a, 10, &hex("a")).unwrap();
    let err = b.append_transition(a, 9, &hex("b")).unwrap_err();
    assert!(err.to_string().contains("earlier"), "{err}");
    let store = b.finish();
    assert_eq!(store.transitions(a).len(), 1);
    assert!(!store.options().multi_thread);
}

#[test]
fn test_value_formatting() {
    init_logging();
    let store = enable_and_address();
    let addr = store.find_net_by_name("tb.addr").unwrap();
    assert_eq!(
        store.format_value_at(addr, 60, Radix::Hexadecimal).unwrap(),
        "1000"
    );
    assert_eq!(
        store.format_value_at(addr, 160, Radix::Decimal).unwrap(),
        "8192"
    );
    assert_eq!(
        store.format_value_at(addr, 10, Radix::Binary).unwrap(),
        "0000000000000000"
    );
    let window = store
        .transitions_between(addr, 60, 150)
        .map(|(t, _)| t)
        .collect::<Vec<_>>();
    assert_eq!(window, [50, 150]);
    assert_eq!(store.timescale().and_then(|t| t.exponent()), Some(-9));
    assert!(store.size_in_memory() > 0);
    store.print_statistics();
}

#[test]
fn test_empty_net_has_no_value() {
    let mut b = TraceBuilder::default();
    let quiet = b.new_net("quiet", None, 2).unwrap();
    let store = b.finish();
    assert!(store.find_transition(quiet, 0).is_none());
    assert!(store.value_at(quiet, 100).is_none());
    assert_eq!(store.transitions_between(quiet, 0, 100).count(), 0);
    assert_eq!(store.max_timestamp(), 0);
}

// Copyright 2023-2024 The Regents of the University of California
// Copyright 2024-2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>
//
// Expression tree of a query and its point evaluation including change hints.

use crate::{BitVector, NetId, Timestamp, TraceStore};
use std::cmp::Ordering;

/// Forward hint of an expression that never changes again.
pub const NO_CHANGE_AFTER: Timestamp = Timestamp::MAX;
/// Backward hint of an expression that has always had its current value.
pub const NO_CHANGE_BEFORE: Timestamp = Timestamp::MIN;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

impl CompareOp {
    #[inline]
    pub fn holds(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Equal => ordering == Ordering::Equal,
            CompareOp::NotEqual => ordering != Ordering::Equal,
            CompareOp::Less => ordering == Ordering::Less,
            CompareOp::LessOrEqual => ordering != Ordering::Greater,
            CompareOp::Greater => ordering == Ordering::Greater,
            CompareOp::GreaterOrEqual => ordering != Ordering::Less,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Equal => "=",
            CompareOp::NotEqual => "!=",
            CompareOp::Less => "<",
            CompareOp::LessOrEqual => "<=",
            CompareOp::Greater => ">",
            CompareOp::GreaterOrEqual => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoolOp {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare {
        net: NetId,
        op: CompareOp,
        value: BitVector,
    },
}

impl Expr {
    pub fn and(left: Expr, right: Expr) -> Self {
        Expr::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: Expr, right: Expr) -> Self {
        Expr::Or(Box::new(left), Box::new(right))
    }

    /// Nets referenced by the expression, left to right.
    pub fn nets(&self) -> Vec<NetId> {
        let mut out = Vec::new();
        self.collect_nets(&mut out);
        out
    }

    fn collect_nets(&self, out: &mut Vec<NetId>) {
        match self {
            Expr::And(left, right) | Expr::Or(left, right) => {
                left.collect_nets(out);
                right.collect_nets(out);
            }
            Expr::Compare { net, .. } => out.push(*net),
        }
    }
}

/// Nearest timestamps at which an expression could change its value.
///
/// `forward` is strictly after the evaluated timestamp, `backward` is the timestamp at which
/// the current value took effect and thus at or before the evaluated timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hint {
    pub forward: Timestamp,
    pub backward: Timestamp,
}

impl Hint {
    pub const NONE: Hint = Hint {
        forward: NO_CHANGE_AFTER,
        backward: NO_CHANGE_BEFORE,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    pub value: bool,
    pub hint: Hint,
}

/// Combines the evaluations of the two operands of a boolean operator.
///
/// When scanning forward, an `and` that is true turns false as soon as either side does,
/// while a false `and` can only turn true once both sides have changed. `or` is the dual.
/// When one side decides the result on its own, only that side can change it.
/// Backward hints follow the same rules with the nearest change being the largest timestamp.
pub fn combine_hints(op: BoolOp, left: Evaluation, right: Evaluation) -> Evaluation {
    let (l, r) = (left.hint, right.hint);
    let value = match op {
        BoolOp::And => left.value && right.value,
        BoolOp::Or => left.value || right.value,
    };
    // for `or`, a false operand behaves like a true operand of `and`
    let (left_blocks, right_blocks) = match op {
        BoolOp::And => (left.value, right.value),
        BoolOp::Or => (!left.value, !right.value),
    };
    let hint = match (left_blocks, right_blocks) {
        (true, true) => Hint {
            forward: l.forward.min(r.forward),
            backward: l.backward.max(r.backward),
        },
        (true, false) => r,
        (false, true) => l,
        (false, false) => Hint {
            forward: l.forward.max(r.forward),
            backward: l.backward.min(r.backward),
        },
    };
    Evaluation { value, hint }
}

pub(crate) fn evaluate(store: &TraceStore, expr: &Expr, timestamp: Timestamp) -> Evaluation {
    match expr {
        Expr::And(left, right) => combine_hints(
            BoolOp::And,
            evaluate(store, left, timestamp),
            evaluate(store, right, timestamp),
        ),
        Expr::Or(left, right) => combine_hints(
            BoolOp::Or,
            evaluate(store, left, timestamp),
            evaluate(store, right, timestamp),
        ),
        Expr::Compare { net, op, value } => evaluate_compare(store, *net, *op, value, timestamp),
    }
}

fn evaluate_compare(
    store: &TraceStore,
    net: NetId,
    op: CompareOp,
    expected: &BitVector,
    timestamp: Timestamp,
) -> Evaluation {
    let Some(cursor) = store.find_transition(net, timestamp) else {
        // a net without any value never matches
        return Evaluation {
            value: false,
            hint: Hint::NONE,
        };
    };
    let actual = cursor.value();
    let value = op.holds(actual.compare(expected));
    // the first value is valid since the beginning of time
    let backward = if cursor.is_first() {
        NO_CHANGE_BEFORE
    } else {
        cursor.timestamp()
    };
    let forward = cursor.next_timestamp().unwrap_or(NO_CHANGE_AFTER);
    Evaluation {
        value,
        hint: Hint { forward, backward },
    }
}

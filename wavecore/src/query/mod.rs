// Copyright 2023-2024 The Regents of the University of California
// Copyright 2024-2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>
//
// Boolean search over net values, e.g., `top.ena = 1 and top.addr >= 'h1000`.
// Scans jump from one possible change of the expression to the next instead of
// visiting every transition of every net.

mod eval;
mod lexer;
mod parser;

pub use eval::{
    combine_hints, BoolOp, CompareOp, Evaluation, Expr, Hint, NO_CHANGE_AFTER, NO_CHANGE_BEFORE,
};

use crate::{Radix, Timestamp, TraceStore};
use std::fmt::{Display, Formatter};

/// Query text that could not be parsed. `start..end` is the offending part of the text in
/// characters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} (at {start}..{end})")]
pub struct QueryParseError {
    pub message: String,
    pub start: usize,
    pub end: usize,
}

/// A parsed expression bound to the store it refers to.
///
/// Evaluation does not mutate the query, so it can be shared between threads.
#[derive(Debug, Clone)]
pub struct Query<'a> {
    store: &'a TraceStore,
    expr: Expr,
    text: String,
}

impl<'a> Query<'a> {
    /// Parses `text` and resolves all net names in `store`.
    pub fn parse(store: &'a TraceStore, text: &str) -> Result<Self, QueryParseError> {
        let expr = parser::parse(store, text)?;
        Ok(Self {
            store,
            expr,
            text: text.to_string(),
        })
    }

    /// Wraps an expression that was built directly.
    pub fn from_expr(store: &'a TraceStore, expr: Expr) -> Self {
        let mut out = Self {
            store,
            expr,
            text: String::new(),
        };
        out.text = out.to_string();
        out
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// The text this query was parsed from.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn store(&self) -> &'a TraceStore {
        self.store
    }

    /// Value of the expression at `timestamp`. A transition at exactly `timestamp` is
    /// already in effect.
    pub fn evaluate(&self, timestamp: Timestamp) -> bool {
        self.evaluate_with_hint(timestamp).value
    }

    /// Value of the expression at `timestamp` together with the nearest timestamps at
    /// which it could change.
    pub fn evaluate_with_hint(&self, timestamp: Timestamp) -> Evaluation {
        eval::evaluate(self.store, &self.expr, timestamp)
    }

    /// Start of the next region in which the expression is true, strictly after `start`.
    ///
    /// If the expression is true at `start`, the current region is skipped first.
    pub fn next_match(&self, start: Timestamp) -> Option<Timestamp> {
        let mut time = start;
        let mut eval = self.evaluate_with_hint(time);
        let mut steps = 0usize;
        // leave the region we start in
        while eval.value {
            time = self.step_forward(time, eval.hint)?;
            eval = self.scan_step(time);
            steps += 1;
        }
        while !eval.value {
            time = self.step_forward(time, eval.hint)?;
            eval = self.scan_step(time);
            steps += 1;
        }
        tracing::trace!(start, found = time, steps, "next match");
        Some(time)
    }

    /// Start of the closest region before `start` in which the expression is true.
    ///
    /// Like [`Query::next_match`], a region that contains `start` is skipped. The result is
    /// where the region begins, so it is always at or before the end of that region.
    /// For a region that extends to the beginning of the trace, zero (or the earliest
    /// negative timestamp that was looked at) is returned.
    pub fn previous_match(&self, start: Timestamp) -> Option<Timestamp> {
        let mut time = start;
        let mut eval = self.evaluate_with_hint(time);
        let mut steps = 0usize;
        while eval.value {
            time = self.step_backward(time, eval.hint)?;
            eval = self.scan_step(time);
            steps += 1;
        }
        while !eval.value {
            time = self.step_backward(time, eval.hint)?;
            eval = self.scan_step(time);
            steps += 1;
        }
        // walk back to the start of the region
        loop {
            let Some(before) = self.step_backward(time, eval.hint) else {
                let found = time.min(0);
                tracing::trace!(start, found, steps, "previous match at start of trace");
                return Some(found);
            };
            let prev = self.scan_step(before);
            steps += 1;
            if prev.value {
                time = before;
                eval = prev;
            } else {
                let found = before + 1;
                tracing::trace!(start, found, steps, "previous match");
                return Some(found);
            }
        }
    }

    /// All match starts after `start` in ascending order.
    pub fn matches(&self, start: Timestamp) -> Matches<'_, 'a> {
        Matches {
            query: self,
            position: Some(start),
        }
    }

    fn scan_step(&self, time: Timestamp) -> Evaluation {
        let eval = self.evaluate_with_hint(time);
        tracing::trace!(time, value = eval.value, "scan step");
        eval
    }

    #[inline]
    fn step_forward(&self, time: Timestamp, hint: Hint) -> Option<Timestamp> {
        if hint.forward == NO_CHANGE_AFTER {
            return None;
        }
        // out of order transitions could produce a hint that does not advance
        Some(hint.forward.max(time.saturating_add(1)))
    }

    /// One tick before the timestamp at which the current value took effect.
    #[inline]
    fn step_backward(&self, time: Timestamp, hint: Hint) -> Option<Timestamp> {
        if hint.backward == NO_CHANGE_BEFORE {
            return None;
        }
        Some(hint.backward.min(time) - 1)
    }

    fn fmt_expr(&self, expr: &Expr, f: &mut Formatter<'_>) -> std::fmt::Result {
        match expr {
            Expr::And(left, right) => {
                self.fmt_operand(left, f)?;
                write!(f, " and ")?;
                self.fmt_operand(right, f)
            }
            Expr::Or(left, right) => {
                self.fmt_expr(left, f)?;
                write!(f, " or ")?;
                self.fmt_expr(right, f)
            }
            Expr::Compare { net, op, value } => write!(
                f,
                "{} {} {}{}",
                self.store.full_name(*net),
                op.symbol(),
                Radix::Hexadecimal.prefix(),
                value.format(Radix::Hexadecimal)
            ),
        }
    }

    /// `or` binds weaker than `and`, thus it needs parenthesis below an `and`.
    fn fmt_operand(&self, expr: &Expr, f: &mut Formatter<'_>) -> std::fmt::Result {
        if matches!(expr, Expr::Or(..)) {
            write!(f, "(")?;
            self.fmt_expr(expr, f)?;
            write!(f, ")")
        } else {
            self.fmt_expr(expr, f)
        }
    }
}

impl Display for Query<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.fmt_expr(&self.expr, f)
    }
}

/// Iterator over successive results of [`Query::next_match`].
pub struct Matches<'q, 'a> {
    query: &'q Query<'a>,
    position: Option<Timestamp>,
}

impl Iterator for Matches<'_, '_> {
    type Item = Timestamp;

    fn next(&mut self) -> Option<Self::Item> {
        let found = self.query.next_match(self.position?);
        self.position = found;
        found
    }
}

impl std::iter::FusedIterator for Matches<'_, '_> {}

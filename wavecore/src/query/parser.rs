// Copyright 2023-2024 The Regents of the University of California
// Copyright 2024-2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>
//
// Recursive descent parser:
//   expr      := and_expr ( OR and_expr )*
//   and_expr  := condition ( AND condition )*
//   condition := '(' expr ')' | identifier relop literal | identifier

use super::eval::{CompareOp, Expr};
use super::lexer::{tokenize, Token, TokenKind};
use super::QueryParseError;
use crate::{BitVector, NetId, Radix, TraceStore};

pub(crate) fn parse(store: &TraceStore, text: &str) -> Result<Expr, QueryParseError> {
    let tokens = tokenize(text)?;
    let mut parser = Parser {
        store,
        tokens: &tokens,
        pos: 0,
    };
    let expr = parser.parse_or()?;
    let last = parser.peek();
    match last.kind {
        TokenKind::End => Ok(expr),
        TokenKind::CloseParen => Err(last.error("unmatched `)`")),
        _ => Err(last.error("expected `and`, `or` or the end of the expression")),
    }
}

struct Parser<'a> {
    store: &'a TraceStore,
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> &'a Token {
        // the last token is always `End`
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn next(&mut self) -> &'a Token {
        let token = self.peek();
        if token.kind != TokenKind::End {
            self.pos += 1;
        }
        token
    }

    fn parse_or(&mut self) -> Result<Expr, QueryParseError> {
        let mut expr = self.parse_and()?;
        while self.peek().kind == TokenKind::Or {
            self.next();
            let right = self.parse_and()?;
            expr = Expr::or(expr, right);
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> Result<Expr, QueryParseError> {
        let mut expr = self.parse_condition()?;
        while self.peek().kind == TokenKind::And {
            self.next();
            let right = self.parse_condition()?;
            expr = Expr::and(expr, right);
        }
        Ok(expr)
    }

    fn parse_condition(&mut self) -> Result<Expr, QueryParseError> {
        let token = self.next();
        match &token.kind {
            TokenKind::OpenParen => {
                let expr = self.parse_or()?;
                let close = self.next();
                match close.kind {
                    TokenKind::CloseParen => Ok(expr),
                    TokenKind::End => Err(close.error("expected `)` before the end of the expression")),
                    _ => Err(close.error("expected `)`")),
                }
            }
            TokenKind::Identifier(name) => {
                let net = self.resolve(token, name)?;
                match self.peek().kind {
                    TokenKind::Compare(op) => {
                        self.next();
                        let value = self.parse_literal()?;
                        Ok(Expr::Compare { net, op, value })
                    }
                    // a bare net name is true whenever the net is not zero
                    _ => Ok(Expr::Compare {
                        net,
                        op: CompareOp::NotEqual,
                        value: BitVector::zeros(1),
                    }),
                }
            }
            TokenKind::End => Err(token.error("unexpected end of the expression")),
            _ => Err(token.error("expected a net name or `(`")),
        }
    }

    fn resolve(&self, token: &Token, name: &str) -> Result<NetId, QueryParseError> {
        self.store
            .find_net_by_name(name)
            .ok_or_else(|| token.error(format!("unknown net `{name}`")))
    }

    fn parse_literal(&mut self) -> Result<BitVector, QueryParseError> {
        let token = self.next();
        let TokenKind::Literal { marker, digits } = &token.kind else {
            return Err(match token.kind {
                TokenKind::End => token.error("expected a value before the end of the expression"),
                _ => token.error("expected a value"),
            });
        };
        let radix = match marker.map(|m| m.to_ascii_lowercase()) {
            None | Some('d') => Radix::Decimal,
            Some('b') => Radix::Binary,
            Some('h') => Radix::Hexadecimal,
            Some(other) => return Err(token.error(format!("unsupported radix `'{other}`"))),
        };
        BitVector::parse_radix(digits, radix).map_err(|e| token.error(e.to_string()))
    }
}

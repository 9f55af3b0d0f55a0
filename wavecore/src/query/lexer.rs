// Copyright 2023-2024 The Regents of the University of California
// Copyright 2024-2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use super::eval::CompareOp;
use super::QueryParseError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TokenKind {
    /// hierarchical net name, including generate indices and bit selects
    Identifier(String),
    /// `marker` is the character after the `'`, `None` for plain decimal numbers
    Literal {
        marker: Option<char>,
        digits: String,
    },
    And,
    Or,
    Compare(CompareOp),
    OpenParen,
    CloseParen,
    End,
}

/// A token with its position in the query text, counted in characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token {
    pub(crate) kind: TokenKind,
    pub(crate) start: usize,
    pub(crate) end: usize,
}

impl Token {
    pub(crate) fn error(&self, message: impl Into<String>) -> QueryParseError {
        QueryParseError {
            message: message.into(),
            start: self.start,
            end: self.end,
        }
    }
}

#[inline]
fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

#[inline]
fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '$'
}

/// Splits the query into tokens. The last token is always `End`.
pub(crate) fn tokenize(text: &str) -> Result<Vec<Token>, QueryParseError> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;
    while pos < chars.len() {
        let c = chars[pos];
        if c.is_whitespace() {
            pos += 1;
            continue;
        }
        let start = pos;
        let next = chars.get(pos + 1).copied();
        let kind = match c {
            '(' => {
                pos += 1;
                TokenKind::OpenParen
            }
            ')' => {
                pos += 1;
                TokenKind::CloseParen
            }
            '=' => {
                pos += 1;
                TokenKind::Compare(CompareOp::Equal)
            }
            '!' if next == Some('=') => {
                pos += 2;
                TokenKind::Compare(CompareOp::NotEqual)
            }
            '<' => match next {
                Some('>') => {
                    pos += 2;
                    TokenKind::Compare(CompareOp::NotEqual)
                }
                Some('=') => {
                    pos += 2;
                    TokenKind::Compare(CompareOp::LessOrEqual)
                }
                _ => {
                    pos += 1;
                    TokenKind::Compare(CompareOp::Less)
                }
            },
            '>' => {
                if next == Some('=') {
                    pos += 2;
                    TokenKind::Compare(CompareOp::GreaterOrEqual)
                } else {
                    pos += 1;
                    TokenKind::Compare(CompareOp::Greater)
                }
            }
            '\'' => {
                let marker = next
                    .filter(|m| m.is_ascii_alphabetic())
                    .ok_or_else(|| QueryParseError {
                        message: "expected a radix after `'`".to_string(),
                        start,
                        end: start + 1,
                    })?;
                pos += 2;
                let digits = take_while(&chars, &mut pos, |c| c.is_ascii_alphanumeric());
                TokenKind::Literal {
                    marker: Some(marker),
                    digits,
                }
            }
            c if c.is_ascii_digit() => {
                let digits = take_while(&chars, &mut pos, |c| c.is_ascii_alphanumeric());
                TokenKind::Literal {
                    marker: None,
                    digits,
                }
            }
            c if is_identifier_start(c) => {
                let name = read_identifier(&chars, &mut pos)?;
                if name.eq_ignore_ascii_case("and") {
                    TokenKind::And
                } else if name.eq_ignore_ascii_case("or") {
                    TokenKind::Or
                } else {
                    TokenKind::Identifier(name)
                }
            }
            other => {
                return Err(QueryParseError {
                    message: format!("unexpected character `{other}`"),
                    start,
                    end: start + 1,
                })
            }
        };
        tokens.push(Token {
            kind,
            start,
            end: pos,
        });
    }
    tokens.push(Token {
        kind: TokenKind::End,
        start: chars.len(),
        end: chars.len(),
    });
    Ok(tokens)
}

fn take_while(chars: &[char], pos: &mut usize, cond: impl Fn(char) -> bool) -> String {
    let start = *pos;
    while *pos < chars.len() && cond(chars[*pos]) {
        *pos += 1;
    }
    chars[start..*pos].iter().collect()
}

/// Reads a name like `top.gen(3).reg[7:0]`. A parenthesized index needs to directly follow
/// the name and contain only digits, otherwise the parenthesis is a separate token.
fn read_identifier(chars: &[char], pos: &mut usize) -> Result<String, QueryParseError> {
    let start = *pos;
    loop {
        take_while(chars, pos, is_identifier_char);
        match chars.get(*pos) {
            Some('(') => {
                let digits = chars[*pos + 1..]
                    .iter()
                    .take_while(|c| c.is_ascii_digit())
                    .count();
                if digits > 0 && chars.get(*pos + 1 + digits) == Some(&')') {
                    *pos += digits + 2;
                } else {
                    break;
                }
            }
            Some('[') => {
                let close = chars[*pos..].iter().position(|c| *c == ']');
                match close {
                    Some(offset) => *pos += offset + 1,
                    None => {
                        return Err(QueryParseError {
                            message: "missing `]`".to_string(),
                            start: *pos,
                            end: chars.len(),
                        })
                    }
                }
            }
            _ => break,
        }
    }
    Ok(chars[start..*pos].iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<TokenKind> {
        tokenize(text).unwrap().into_iter().map(|t| t.kind).collect()
    }

    fn ident(name: &str) -> TokenKind {
        TokenKind::Identifier(name.to_string())
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("a<>b != <= >= < > ="),
            vec![
                ident("a"),
                TokenKind::Compare(CompareOp::NotEqual),
                ident("b"),
                TokenKind::Compare(CompareOp::NotEqual),
                TokenKind::Compare(CompareOp::LessOrEqual),
                TokenKind::Compare(CompareOp::GreaterOrEqual),
                TokenKind::Compare(CompareOp::Less),
                TokenKind::Compare(CompareOp::Greater),
                TokenKind::Compare(CompareOp::Equal),
                TokenKind::End,
            ]
        );
    }

    #[test]
    fn test_keywords_ignore_case() {
        assert_eq!(
            kinds("a AND b or c And d"),
            vec![
                ident("a"),
                TokenKind::And,
                ident("b"),
                TokenKind::Or,
                ident("c"),
                TokenKind::And,
                ident("d"),
                TokenKind::End,
            ]
        );
        // keywords need to be whole words
        assert_eq!(kinds("android"), vec![ident("android"), TokenKind::End]);
    }

    #[test]
    fn test_identifiers() {
        assert_eq!(
            kinds("top.gen(3).reg[7:0] = 'h1F"),
            vec![
                ident("top.gen(3).reg[7:0]"),
                TokenKind::Compare(CompareOp::Equal),
                TokenKind::Literal {
                    marker: Some('h'),
                    digits: "1F".to_string()
                },
                TokenKind::End,
            ]
        );
        // not a generate index
        assert_eq!(
            kinds("a(b)"),
            vec![
                ident("a"),
                TokenKind::OpenParen,
                ident("b"),
                TokenKind::CloseParen,
                TokenKind::End
            ]
        );
    }

    #[test]
    fn test_spans_count_characters() {
        let err = tokenize("µ = 1 and b").unwrap_err();
        assert_eq!((err.start, err.end), (0, 1));

        // two non-breaking spaces take up four bytes, but only two characters
        let tokens = tokenize("\u{a0}\u{a0}ena = 12").unwrap();
        assert_eq!((tokens[0].start, tokens[0].end), (2, 5));
        assert_eq!((tokens[2].start, tokens[2].end), (8, 10));
        assert_eq!((tokens[3].start, tokens[3].end), (10, 10));
    }

    #[test]
    fn test_lexer_errors() {
        let err = tokenize("a & b").unwrap_err();
        assert_eq!((err.start, err.end), (2, 3));
        let err = tokenize("a = '").unwrap_err();
        assert_eq!((err.start, err.end), (4, 5));
        let err = tokenize("a[3 = 1").unwrap_err();
        assert_eq!(err.start, 1);
        assert!(tokenize("a ! b").is_err());
    }
}

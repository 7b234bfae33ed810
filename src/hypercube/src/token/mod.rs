// Copyright 2026 The Hypercube Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

// derived from both the LALRPOP whitespace tokenizer, and LALRPOP's
// internal tokenizer

use std::str::CharIndices;

use lazy_static::lazy_static;
use unicode_xid::UnicodeXID;

use self::Token::*;
use crate::common::ErrorCode::*;
use crate::common::{EquationError, ErrorCode};


#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Token<'input> {
    Plus,
    Minus,
    Mul,
    Div,
    FloorDiv,
    Mod,
    LParen,
    RParen,
    Ident(&'input str),
    Num(&'input str),
}

fn error<T>(code: ErrorCode, start: usize, end: usize) -> Result<T, EquationError> {
    Err(EquationError {
        start: start as u16,
        end: end as u16,
        code,
    })
}

pub type Spanned<T> = (usize, T, usize);

pub struct Lexer<'input> {
    text: &'input str,
    chars: CharIndices<'input>,
    lookahead: Option<(usize, char)>,
}

impl<'input> Lexer<'input> {
    pub fn new(input: &'input str) -> Self {
        let mut t = Lexer {
            text: input,
            chars: input.char_indices(),
            lookahead: None,
        };
        t.bump();
        t
    }

    fn bump(&mut self) -> Option<(usize, char)> {
        self.bump_n(1)
    }

    fn bump_n(&mut self, n: usize) -> Option<(usize, char)> {
        assert!(n > 0);
        self.lookahead = self.chars.nth(n - 1);
        self.lookahead
    }

    fn take_while<F>(&mut self, mut keep_going: F) -> Option<usize>
    where
        F: FnMut(char) -> bool,
    {
        loop {
            match self.lookahead {
                None => {
                    return None;
                }
                Some((idx1, c)) => {
                    if !keep_going(c) {
                        return Some(idx1);
                    } else {
                        self.bump();
                    }
                }
            }
        }
    }

    fn identifier(&mut self, idx0: usize) -> Spanned<Token<'input>> {
        match self.take_while(is_identifier_continue) {
            Some(end) => (idx0, Ident(&self.text[idx0..end]), end),
            None => (idx0, Ident(&self.text[idx0..]), self.text.len()),
        }
    }

    fn number(&mut self, idx0: usize) -> Spanned<Token<'input>> {
        use regex::Regex;

        lazy_static! {
            static ref NUMBER_RE: Regex = Regex::new(r"^\d+(_\d+)*").unwrap();
        }

        // number() is only called when the lookahead is a digit
        let len = NUMBER_RE
            .find(&self.text[idx0..])
            .map_or(1, |m| m.end());

        self.bump_n(len);

        let end = idx0 + len;
        (idx0, Num(&self.text[idx0..end]), end)
    }

    #[allow(clippy::unnecessary_wraps)]
    fn consume(
        &mut self,
        i: usize,
        tok: Token<'input>,
        len: usize,
    ) -> Option<Result<Spanned<Token<'input>>, EquationError>> {
        self.bump();
        Some(Ok((i, tok, i + len)))
    }
}

impl<'input> Iterator for Lexer<'input> {
    type Item = Result<Spanned<Token<'input>>, EquationError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            return match self.lookahead {
                Some((i, '/')) => {
                    match self.bump() {
                        Some((_, '/')) => self.consume(i, FloorDiv, 2),
                        // we've already bumped, don't consume
                        _ => Some(Ok((i, Div, i + 1))),
                    }
                }
                Some((i, '%')) => self.consume(i, Mod, 1),
                Some((i, '-')) => self.consume(i, Minus, 1),
                Some((i, '+')) => self.consume(i, Plus, 1),
                Some((i, '*')) => self.consume(i, Mul, 1),
                Some((i, '(')) => self.consume(i, LParen, 1),
                Some((i, ')')) => self.consume(i, RParen, 1),
                Some((i, c)) if is_identifier_start(c) => Some(Ok(self.identifier(i))),
                Some((i, c)) if c.is_ascii_digit() => Some(Ok(self.number(i))),
                Some((_, c)) if c.is_whitespace() => {
                    self.bump();
                    continue;
                }
                Some((i, _)) => {
                    self.bump(); // eat whatever is killing us
                    let end = match self.lookahead {
                        Some((end, _)) => end,
                        None => self.text.len(),
                    };
                    Some(error(UnrecognizedToken, i, end))
                }
                None => None,
            };
        }
    }
}

fn is_identifier_start(c: char) -> bool {
    UnicodeXID::is_xid_start(c) || c == '_'
}

fn is_identifier_continue(c: char) -> bool {
    UnicodeXID::is_xid_continue(c)
}

// Copyright 2026 The Hypercube Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Hand-written recursive descent parser for size expressions.
//!
//! Grammar, lowest precedence first:
//!
//! ```text
//! expr           := multiplicative (('+' | '-') multiplicative)*
//! multiplicative := unary (('*' | '/' | '//' | '%') unary)*
//! unary          := ('+' | '-') unary | atom
//! atom           := number | ident | '(' expr ')'
//! ```

use crate::ast::{BinaryOp, Expr, Loc, UnaryOp};
use crate::common::{EquationError, EquationResult};
use crate::eqn_err;
use crate::token::{Lexer, Spanned, Token};


/// TokenKind discriminant for efficient peek comparisons without payload matching
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TokenKind {
    Plus,
    Minus,
    Mul,
    Div,
    FloorDiv,
    Mod,
    LParen,
    RParen,
    Ident,
    Num,
}

impl<'a> From<&Token<'a>> for TokenKind {
    fn from(token: &Token<'a>) -> Self {
        match token {
            Token::Plus => TokenKind::Plus,
            Token::Minus => TokenKind::Minus,
            Token::Mul => TokenKind::Mul,
            Token::Div => TokenKind::Div,
            Token::FloorDiv => TokenKind::FloorDiv,
            Token::Mod => TokenKind::Mod,
            Token::LParen => TokenKind::LParen,
            Token::RParen => TokenKind::RParen,
            Token::Ident(_) => TokenKind::Ident,
            Token::Num(_) => TokenKind::Num,
        }
    }
}

struct Parser<'input> {
    tokens: Vec<Spanned<Token<'input>>>,
    pos: usize,
}

impl<'input> Parser<'input> {
    /// Create a new parser from a lexer, collecting all tokens up front.
    /// Returns an error if the lexer produces any errors.
    fn new(lexer: Lexer<'input>) -> EquationResult<Self> {
        let tokens = lexer.collect::<EquationResult<Vec<_>>>()?;
        Ok(Parser { tokens, pos: 0 })
    }

    fn peek(&self) -> Option<&Spanned<Token<'input>>> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|(_, tok, _)| TokenKind::from(tok))
    }

    fn advance(&mut self) -> Option<Spanned<Token<'input>>> {
        let tok = self.tokens.get(self.pos).copied();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eof_position(&self) -> usize {
        if let Some((_, _, end)) = self.tokens.last() {
            *end
        } else {
            0
        }
    }

    /// unexpected builds the error for whatever token (or EOF) is next.
    fn unexpected<T>(&self) -> EquationResult<T> {
        match self.peek() {
            Some((start, _, end)) => eqn_err!(UnrecognizedToken, *start, *end),
            None => {
                let pos = self.eof_position();
                eqn_err!(UnrecognizedEof, pos, pos + 1)
            }
        }
    }

    fn expect(&mut self, expected: TokenKind) -> EquationResult<Spanned<Token<'input>>> {
        if self.peek_kind() != Some(expected) {
            return self.unexpected();
        }
        match self.advance() {
            Some(tok) => Ok(tok),
            None => self.unexpected(),
        }
    }

    fn parse_equation(&mut self) -> EquationResult<Expr> {
        if self.tokens.is_empty() {
            return eqn_err!(EmptyExpression, 0, 0);
        }

        let expr = self.parse_additive()?;

        if let Some((start, _, end)) = self.peek() {
            return eqn_err!(ExtraToken, *start, *end);
        }

        Ok(expr)
    }

    fn parse_additive(&mut self) -> EquationResult<Expr> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Plus) => BinaryOp::Add,
                Some(TokenKind::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            let loc = left.get_loc().union(&right.get_loc());
            left = Expr::Op2(op, Box::new(left), Box::new(right), loc);
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> EquationResult<Expr> {
        let mut left = self.parse_unary()?;

        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Mul) => BinaryOp::Mul,
                Some(TokenKind::Div) => BinaryOp::Div,
                Some(TokenKind::FloorDiv) => BinaryOp::FloorDiv,
                Some(TokenKind::Mod) => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            let loc = left.get_loc().union(&right.get_loc());
            left = Expr::Op2(op, Box::new(left), Box::new(right), loc);
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> EquationResult<Expr> {
        let op = match self.peek_kind() {
            Some(TokenKind::Plus) => UnaryOp::Positive,
            Some(TokenKind::Minus) => UnaryOp::Negative,
            _ => return self.parse_atom(),
        };
        let Some((lpos, _, _)) = self.advance() else {
            return self.unexpected();
        };
        let operand = self.parse_unary()?;
        let rpos = operand.get_loc().end as usize;
        Ok(Expr::Op1(op, Box::new(operand), Loc::new(lpos, rpos)))
    }

    fn parse_atom(&mut self) -> EquationResult<Expr> {
        match self.peek_kind() {
            Some(TokenKind::Num) => {
                let (lpos, tok, rpos) = self.expect(TokenKind::Num)?;
                let Token::Num(s) = tok else {
                    return eqn_err!(ExpectedNumber, lpos, rpos);
                };
                match s.replace('_', "").parse::<i64>() {
                    Ok(n) => Ok(Expr::Const(n, Loc::new(lpos, rpos))),
                    Err(_) => eqn_err!(ExpectedNumber, lpos, rpos),
                }
            }
            Some(TokenKind::Ident) => {
                let (lpos, tok, rpos) = self.expect(TokenKind::Ident)?;
                let Token::Ident(s) = tok else {
                    return eqn_err!(UnrecognizedToken, lpos, rpos);
                };
                Ok(Expr::Var(s.to_owned(), Loc::new(lpos, rpos)))
            }
            Some(TokenKind::LParen) => {
                let (lpos, _, _) = self.expect(TokenKind::LParen)?;
                let expr = self.parse_additive()?;
                let (_, _, rpos) = self.expect(TokenKind::RParen)?;
                // keep the inner node but widen its span to cover the parens
                Ok(with_loc(expr, Loc::new(lpos, rpos)))
            }
            _ => self.unexpected(),
        }
    }
}

fn with_loc(expr: Expr, loc: Loc) -> Expr {
    match expr {
        Expr::Const(n, _) => Expr::Const(n, loc),
        Expr::Var(v, _) => Expr::Var(v, loc),
        Expr::Op1(op, r, _) => Expr::Op1(op, r, loc),
        Expr::Op2(op, l, r, _) => Expr::Op2(op, l, r, loc),
    }
}

/// Parse a size expression into an AST.
///
/// Empty or whitespace-only input is an `EmptyExpression` error: a
/// dimension size always has a value.
pub fn parse(input: &str) -> Result<Expr, EquationError> {
    let lexer = Lexer::new(input);
    let mut parser = Parser::new(lexer)?;
    parser.parse_equation()
}

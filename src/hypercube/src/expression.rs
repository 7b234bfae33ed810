// Copyright 2026 The Hypercube Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Integer evaluation of size expressions against a name -> size mapping.
//!
//! A name's entry in the mapping may itself be an expression, in which
//! case it is evaluated recursively against the same mapping; this is how
//! derived dimensions like `nvis = ntime*nbl*nchan` with
//! `nbl = na*(na-1)//2` resolve.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::BuildHasher;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::common::{Error, ErrorCode, ErrorKind, Result};
use crate::parser;

/// The raw, unresolved value of a size: either a literal or an expression
/// over other names.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Size {
    Literal(i64),
    Expression(String),
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Size::Literal(n) => write!(f, "{n}"),
            Size::Expression(eqn) => write!(f, "{eqn}"),
        }
    }
}

impl From<i64> for Size {
    fn from(n: i64) -> Self {
        Size::Literal(n)
    }
}

impl From<i32> for Size {
    fn from(n: i32) -> Self {
        Size::Literal(n.into())
    }
}

impl From<u32> for Size {
    fn from(n: u32) -> Self {
        Size::Literal(n.into())
    }
}

impl From<&str> for Size {
    fn from(eqn: &str) -> Self {
        Size::Expression(eqn.to_owned())
    }
}

impl From<String> for Size {
    fn from(eqn: String) -> Self {
        Size::Expression(eqn)
    }
}

/// A read-only view from names to raw sizes.
pub trait Scope {
    fn lookup(&self, ident: &str) -> Option<&Size>;
}

impl<S: BuildHasher> Scope for HashMap<String, Size, S> {
    fn lookup(&self, ident: &str) -> Option<&Size> {
        self.get(ident)
    }
}

impl Scope for BTreeMap<String, Size> {
    fn lookup(&self, ident: &str) -> Option<&Size> {
        self.get(ident)
    }
}

impl<S: BuildHasher> Scope for IndexMap<String, Size, S> {
    fn lookup(&self, ident: &str) -> Option<&Size> {
        self.get(ident)
    }
}

/// evaluate returns the integer value of `size`, resolving any names it
/// references through `scope`.
pub fn evaluate<S: Scope + ?Sized>(size: &Size, scope: &S) -> Result<i64> {
    match size {
        Size::Literal(n) => Ok(*n),
        Size::Expression(eqn) => Evaluator::new(scope).eval_str(eqn),
    }
}

/// resolve returns the integer value of the name `ident` in `scope`.
pub fn resolve<S: Scope + ?Sized>(ident: &str, scope: &S) -> Result<i64> {
    Evaluator::new(scope).resolve(ident)
}

/// Evaluator resolves names against a scope. Values resolved during the
/// lifetime of one Evaluator are memoized, so it must not outlive a
/// single query against state that can change.
pub(crate) struct Evaluator<'a, S: Scope + ?Sized> {
    scope: &'a S,
    // names whose expressions are currently being evaluated, outermost first
    processing: Vec<String>,
    resolved: HashMap<String, i64>,
}

impl<'a, S: Scope + ?Sized> Evaluator<'a, S> {
    pub(crate) fn new(scope: &'a S) -> Self {
        Evaluator {
            scope,
            processing: Vec::new(),
            resolved: HashMap::new(),
        }
    }

    pub(crate) fn resolve(&mut self, ident: &str) -> Result<i64> {
        match self.scope.lookup(ident) {
            Some(size) => self.resolve_size(ident, size),
            None => {
                let mut err = Error::new(
                    ErrorKind::Evaluation,
                    ErrorCode::UnresolvedVariable,
                    Some(format!(
                        "Unable to evaluate '{ident}' as it was not in the variable dictionary."
                    )),
                );
                err.ident = Some(ident.to_owned());
                Err(err)
            }
        }
    }

    fn resolve_size(&mut self, ident: &str, size: &Size) -> Result<i64> {
        if let Some(value) = self.resolved.get(ident) {
            return Ok(*value);
        }

        let value = match size {
            Size::Literal(n) => *n,
            Size::Expression(eqn) => {
                self.processing.push(ident.to_owned());
                let value = self.eval_str(eqn);
                self.processing.pop();
                value?
            }
        };

        trace!(ident, value, "resolved");
        self.resolved.insert(ident.to_owned(), value);
        Ok(value)
    }

    fn eval_str(&mut self, eqn: &str) -> Result<i64> {
        let ast = parser::parse(eqn).map_err(|err| Error::parse(eqn, err))?;
        self.eval(&ast, eqn)
    }

    fn eval(&mut self, expr: &Expr, eqn: &str) -> Result<i64> {
        match expr {
            Expr::Const(n, _) => Ok(*n),
            Expr::Var(ident, _) => self.eval_var(ident, eqn),
            Expr::Op1(op, r, _) => {
                let r = self.eval(r, eqn)?;
                match op {
                    UnaryOp::Positive => Ok(r),
                    UnaryOp::Negative => r
                        .checked_neg()
                        .ok_or_else(|| arith_error(ErrorCode::Overflow, eqn, expr)),
                }
            }
            Expr::Op2(op, l, r, _) => {
                let l = self.eval(l, eqn)?;
                let r = self.eval(r, eqn)?;
                apply(*op, l, r).map_err(|code| arith_error(code, eqn, expr))
            }
        }
    }

    fn eval_var(&mut self, ident: &str, eqn: &str) -> Result<i64> {
        if self.processing.iter().any(|p| p == ident) {
            let mut chain = self.processing.clone();
            chain.push(ident.to_owned());
            let err = Error::new(
                ErrorKind::Evaluation,
                ErrorCode::CircularReference,
                Some(format!(
                    "Unable to evaluate expression '{eqn}' as variable '{ident}' depends on itself ({})",
                    chain.join(" -> ")
                )),
            );
            return Err(err.with_expression(eqn).with_ident(ident));
        }

        match self.scope.lookup(ident) {
            Some(size) => self.resolve_size(ident, size),
            None => {
                let err = Error::new(
                    ErrorKind::Evaluation,
                    ErrorCode::UnresolvedVariable,
                    Some(format!(
                        "Unable to evaluate expression '{eqn}' as variable '{ident}' was not in the variable dictionary."
                    )),
                );
                Err(err.with_expression(eqn).with_ident(ident))
            }
        }
    }
}

fn arith_error(code: ErrorCode, eqn: &str, expr: &Expr) -> Error {
    let mut err = Error::new(
        ErrorKind::Evaluation,
        code,
        Some(format!("Unable to evaluate '{expr}' in expression '{eqn}'")),
    );
    err.expression = Some(eqn.to_owned());
    err.loc = Some(expr.get_loc());
    err
}

/// apply evaluates one binary operator with checked integer arithmetic.
/// `//` and `%` round towards negative infinity; `/` only succeeds when
/// the division is exact.
fn apply(op: BinaryOp, l: i64, r: i64) -> std::result::Result<i64, ErrorCode> {
    use ErrorCode::*;
    match op {
        BinaryOp::Add => l.checked_add(r).ok_or(Overflow),
        BinaryOp::Sub => l.checked_sub(r).ok_or(Overflow),
        BinaryOp::Mul => l.checked_mul(r).ok_or(Overflow),
        BinaryOp::Div => {
            if r == 0 {
                return Err(DivideByZero);
            }
            if l.checked_rem(r).ok_or(Overflow)? != 0 {
                return Err(InexactDivision);
            }
            l.checked_div(r).ok_or(Overflow)
        }
        BinaryOp::FloorDiv => {
            if r == 0 {
                return Err(DivideByZero);
            }
            let q = l.checked_div(r).ok_or(Overflow)?;
            let rem = l.checked_rem(r).ok_or(Overflow)?;
            if rem != 0 && ((rem < 0) != (r < 0)) {
                Ok(q - 1)
            } else {
                Ok(q)
            }
        }
        BinaryOp::Mod => {
            if r == 0 {
                return Err(DivideByZero);
            }
            let rem = l.checked_rem(r).ok_or(Overflow)?;
            if rem != 0 && ((rem < 0) != (r < 0)) {
                Ok(rem + r)
            } else {
                Ok(rem)
            }
        }
    }
}

#[cfg(test)]
fn vars(entries: &[(&str, Size)]) -> HashMap<String, Size> {
    entries
        .iter()
        .map(|(k, v)| ((*k).to_owned(), v.clone()))
        .collect()
}

#[test]
fn test_literal_fast_path() {
    let empty: HashMap<String, Size> = HashMap::new();
    assert_eq!(Ok(42), evaluate(&Size::Literal(42), &empty));
    assert_eq!(Ok(-7), evaluate(&Size::Literal(-7), &empty));
}

#[test]
fn test_constant_expressions() {
    let empty: HashMap<String, Size> = HashMap::new();
    let cases: &[(&str, i64)] = &[
        ("1 + 2 * 3", 7),
        ("(1 + 2) * 3", 9),
        ("64*(64-1)//2", 2016),
        ("7 // 2", 3),
        ("-7 // 2", -4),
        ("7 // -2", -4),
        ("-7 // -2", 3),
        ("7 % 3", 1),
        ("-7 % 3", 2),
        ("7 % -3", -2),
        ("12 / 4", 3),
        ("-12 / 4", -3),
        ("--5", 5),
        ("+5 - -5", 10),
        ("1_000 * 2", 2000),
    ];
    for (eqn, expected) in cases {
        assert_eq!(
            Ok(*expected),
            evaluate(&Size::from(*eqn), &empty),
            "evaluating '{eqn}'"
        );
    }
}

#[test]
fn test_derived_chain() {
    let (ntime, na, nchan) = (100, 64, 128);
    let nbl = na * (na - 1) / 2;
    let variables = vars(&[
        ("ntime", Size::Literal(ntime)),
        ("na", Size::Literal(na)),
        ("nchan", Size::Literal(nchan)),
        ("nbl", "na*(na-1)//2".into()),
        ("nvis", "ntime*nbl*nchan".into()),
    ]);
    assert_eq!(Ok(ntime * nbl * nchan), evaluate(&"nvis".into(), &variables));
    assert_eq!(Ok(ntime * nbl * nchan), resolve("nvis", &variables));
    assert_eq!(Ok(nbl), resolve("nbl", &variables));
    assert_eq!(Ok(na), resolve("na", &variables));
}

#[test]
fn test_btree_and_index_scopes() {
    let btree: BTreeMap<String, Size> = [
        ("a".to_owned(), Size::Literal(3)),
        ("b".to_owned(), "a * 2".into()),
    ]
    .into_iter()
    .collect();
    assert_eq!(Ok(6), resolve("b", &btree));

    let index: IndexMap<String, Size> = btree.into_iter().collect();
    assert_eq!(Ok(7), evaluate(&"b + 1".into(), &index));
}

#[test]
fn test_unresolved_variable() {
    let variables = vars(&[
        ("ntime", Size::Literal(10)),
        ("nbl", Size::Literal(21)),
        ("nvis", "ntime*nbl*nchan".into()),
    ]);

    for err in [
        evaluate(&"nvis".into(), &variables).unwrap_err(),
        evaluate(&"ntime*nbl*nchan".into(), &variables).unwrap_err(),
    ] {
        assert_eq!(ErrorKind::Evaluation, err.kind);
        assert_eq!(ErrorCode::UnresolvedVariable, err.code);
        assert_eq!(Some("nchan".to_owned()), err.ident);
        assert_eq!(Some("ntime*nbl*nchan".to_owned()), err.expression);
        let details = err.get_details().unwrap();
        assert!(details.contains("Unable to evaluate expression 'ntime*nbl*nchan'"));
        assert!(details.contains("as variable 'nchan' was not in the variable dictionary."));
    }

    let err = resolve("nrow", &variables).unwrap_err();
    assert_eq!(ErrorCode::UnresolvedVariable, err.code);
    assert_eq!(Some("nrow".to_owned()), err.ident);
}

#[test]
fn test_circular_reference() {
    let direct = vars(&[("a", "a + 1".into())]);
    let err = resolve("a", &direct).unwrap_err();
    assert_eq!(ErrorCode::CircularReference, err.code);
    assert_eq!(Some("a".to_owned()), err.ident);

    let transitive = vars(&[
        ("a", "b * 2".into()),
        ("b", "c + 1".into()),
        ("c", "a // 3".into()),
    ]);
    let err = resolve("a", &transitive).unwrap_err();
    assert_eq!(ErrorKind::Evaluation, err.kind);
    assert_eq!(ErrorCode::CircularReference, err.code);
    assert_eq!(Some("a // 3".to_owned()), err.expression);
    assert!(err.get_details().unwrap().contains("a -> b -> c -> a"));

    // entering the cycle from an expression rather than a name
    let err = evaluate(&"b".into(), &transitive).unwrap_err();
    assert_eq!(ErrorCode::CircularReference, err.code);
}

#[test]
fn test_diamond_is_not_a_cycle() {
    let variables = vars(&[
        ("na", Size::Literal(4)),
        ("nbl", "na*(na-1)//2".into()),
        ("nx", "nbl + na".into()),
        ("ny", "nbl * na".into()),
        ("nz", "nx + ny + nbl".into()),
    ]);
    assert_eq!(Ok(6 + 4 + 24 + 6), resolve("nz", &variables));
}

#[test]
fn test_parse_error() {
    let variables = vars(&[("na", Size::Literal(4)), ("nbl", "na*(na-1//2".into())]);
    let err = resolve("nbl", &variables).unwrap_err();
    assert_eq!(ErrorKind::Parse, err.kind);
    assert_eq!(ErrorCode::UnrecognizedEof, err.code);
    assert_eq!(Some("na*(na-1//2".to_owned()), err.expression);
}

#[test]
fn test_arithmetic_errors() {
    let empty: HashMap<String, Size> = HashMap::new();
    let cases: &[(&str, ErrorCode)] = &[
        ("1 // 0", ErrorCode::DivideByZero),
        ("1 / 0", ErrorCode::DivideByZero),
        ("1 % 0", ErrorCode::DivideByZero),
        ("7 / 2", ErrorCode::InexactDivision),
        ("9223372036854775807 + 1", ErrorCode::Overflow),
        ("-9223372036854775807 - 2", ErrorCode::Overflow),
        ("4294967296 * 4294967296", ErrorCode::Overflow),
    ];
    for (eqn, code) in cases {
        let err = evaluate(&Size::from(*eqn), &empty).unwrap_err();
        assert_eq!(ErrorKind::Evaluation, err.kind, "evaluating '{eqn}'");
        assert_eq!(*code, err.code, "evaluating '{eqn}'");
        assert_eq!(Some((*eqn).to_owned()), err.expression);
    }
}

// Copyright 2026 The Hypercube Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::fmt;
use std::{error, result};

use crate::ast::Loc;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NoError, // will never be produced
    DoesNotExist,
    UnrecognizedToken,
    UnrecognizedEof,
    ExtraToken,
    ExpectedNumber,
    EmptyExpression,
    UnresolvedVariable,
    CircularReference,
    DivideByZero,
    InexactDivision,
    Overflow,
    DuplicateDimension,
    NegativeSize,
    LocalExceedsGlobal,
    ExtentMismatch,
    ExtentOutOfBounds,
    BadShape,
    BadChunkSize,
    InvalidJson,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ErrorCode::*;
        let name = match self {
            NoError => "no_error",
            DoesNotExist => "does_not_exist",
            UnrecognizedToken => "unrecognized_token",
            UnrecognizedEof => "unrecognized_eof",
            ExtraToken => "extra_token",
            ExpectedNumber => "expected_number",
            EmptyExpression => "empty_expression",
            UnresolvedVariable => "unresolved_variable",
            CircularReference => "circular_reference",
            DivideByZero => "divide_by_zero",
            InexactDivision => "inexact_division",
            Overflow => "overflow",
            DuplicateDimension => "duplicate_dimension",
            NegativeSize => "negative_size",
            LocalExceedsGlobal => "local_exceeds_global",
            ExtentMismatch => "extent_mismatch",
            ExtentOutOfBounds => "extent_out_of_bounds",
            BadShape => "bad_shape",
            BadChunkSize => "bad_chunk_size",
            InvalidJson => "invalid_json",
        };

        write!(f, "{name}")
    }
}

/// A lexing or parsing failure, located by byte offsets into the
/// expression text.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EquationError {
    pub start: u16,
    pub end: u16,
    pub code: ErrorCode,
}

impl fmt::Display for EquationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}:{}", self.start, self.end, self.code)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Parse,
    Evaluation,
    UnknownName,
    DuplicateName,
    InvariantViolation,
}

/// Error surfaced by every fallible operation in this crate.
///
/// Besides the kind and code, an error carries whatever context was
/// available where it was raised: the dimension or array `name`, the
/// `expression` being evaluated, the offending `ident`, and for parse
/// errors the `loc` within the expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub kind: ErrorKind,
    pub code: ErrorCode,
    pub details: Option<String>,
    pub name: Option<String>,
    pub expression: Option<String>,
    pub ident: Option<String>,
    pub loc: Option<Loc>,
}

impl Error {
    pub fn new(kind: ErrorKind, code: ErrorCode, details: Option<String>) -> Self {
        Error {
            kind,
            code,
            details,
            name: None,
            expression: None,
            ident: None,
            loc: None,
        }
    }

    pub fn parse(expression: &str, err: EquationError) -> Self {
        let mut e = Error::new(
            ErrorKind::Parse,
            err.code,
            Some(format!(
                "Unable to parse expression '{}' at {}:{}",
                expression, err.start, err.end
            )),
        );
        e.expression = Some(expression.to_owned());
        e.loc = Some(Loc {
            start: err.start,
            end: err.end,
        });
        e
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_owned());
        self
    }

    pub fn with_expression(mut self, expression: &str) -> Self {
        self.expression = Some(expression.to_owned());
        self
    }

    pub fn with_ident(mut self, ident: &str) -> Self {
        self.ident = Some(ident.to_owned());
        self
    }

    pub fn get_details(&self) -> Option<String> {
        self.details.clone()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kind = match self.kind {
            ErrorKind::Parse => "ParseError",
            ErrorKind::Evaluation => "EvaluationError",
            ErrorKind::UnknownName => "UnknownNameError",
            ErrorKind::DuplicateName => "DuplicateNameError",
            ErrorKind::InvariantViolation => "InvariantViolationError",
        };
        match self.details {
            Some(ref details) => write!(f, "{}{{{}: {}}}", kind, self.code, details),
            None => write!(f, "{}{{{}}}", kind, self.code),
        }
    }
}

impl error::Error for Error {}

pub type Result<T> = result::Result<T, Error>;
pub type EquationResult<T> = result::Result<T, EquationError>;

#[macro_export]
macro_rules! eqn_err(
    ($code:tt, $start:expr, $end:expr) => {{
        use $crate::common::{EquationError, ErrorCode};
        Err(EquationError{ start: ($start) as u16, end: ($end) as u16, code: ErrorCode::$code})
    }}
);

#[macro_export]
macro_rules! cube_err {
    ($kind:tt, $code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::$kind, ErrorCode::$code, Some($str)))
    }};
    ($kind:tt, $code:tt) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::$kind, ErrorCode::$code, None))
    }};
}

/// Splits each requested name on commas, so that `["ntime", "na"]` and
/// `["ntime,na"]` name the same dimensions in the same order.
pub fn split_names<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .flat_map(|n| {
            n.as_ref()
                .split(',')
                .map(|part| part.trim().to_owned())
                .collect::<Vec<_>>()
        })
        .filter(|n| !n.is_empty())
        .collect()
}

#[test]
fn test_error_display() {
    let err = Error::new(
        ErrorKind::Evaluation,
        ErrorCode::UnresolvedVariable,
        Some("missing 'nchan'".to_owned()),
    );
    assert_eq!(
        "EvaluationError{unresolved_variable: missing 'nchan'}",
        format!("{err}")
    );

    let err = Error::new(ErrorKind::UnknownName, ErrorCode::DoesNotExist, None);
    assert_eq!("UnknownNameError{does_not_exist}", format!("{err}"));
}

#[test]
fn test_parse_error_context() {
    let eqn = EquationError {
        start: 3,
        end: 4,
        code: ErrorCode::UnrecognizedToken,
    };
    let err = Error::parse("na*)", eqn).with_name("nbl");
    assert_eq!(ErrorKind::Parse, err.kind);
    assert_eq!(Some("na*)".to_owned()), err.expression);
    assert_eq!(Some("nbl".to_owned()), err.name);
    assert_eq!(Some(Loc::new(3, 4)), err.loc);
}

#[test]
fn test_split_names() {
    assert_eq!(
        vec!["ntime", "na", "nbl"],
        split_names(["ntime", "na", "nbl"])
    );
    assert_eq!(vec!["ntime", "na", "nbl"], split_names(["ntime,na, nbl"]));
    assert_eq!(vec!["ntime", "na"], split_names(["ntime,", "na"]));
    assert!(split_names(Vec::<String>::new()).is_empty());
}

// Copyright 2026 The Hypercube Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::collections::BTreeSet;
use std::fmt;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Loc {
    pub start: u16,
    pub end: u16,
}

impl fmt::Display for Loc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

impl Loc {
    pub fn new(start: usize, end: usize) -> Self {
        Loc {
            start: start as u16,
            end: end as u16,
        }
    }

    /// union takes a second Loc and returns the inclusive range from the
    /// start of the earlier token to the end of the later token.
    pub fn union(&self, rhs: &Self) -> Self {
        Loc {
            start: self.start.min(rhs.start),
            end: self.end.max(rhs.end),
        }
    }
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum UnaryOp {
    Positive,
    Negative,
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::FloorDiv => "//",
            BinaryOp::Mod => "%",
        };
        write!(f, "{op}")
    }
}

/// Expr is a parsed size expression: integer constants, references to
/// other dimensions, and integer arithmetic over them.
#[derive(PartialEq, Eq, Clone, Debug)]
pub enum Expr {
    Const(i64, Loc),
    Var(String, Loc),
    Op1(UnaryOp, Box<Expr>, Loc),
    Op2(BinaryOp, Box<Expr>, Box<Expr>, Loc),
}

impl Expr {
    pub fn get_loc(&self) -> Loc {
        match self {
            Expr::Const(_, loc) => *loc,
            Expr::Var(_, loc) => *loc,
            Expr::Op1(_, _, loc) => *loc,
            Expr::Op2(_, _, _, loc) => *loc,
        }
    }

    /// idents returns the set of variable names this expression refers to.
    pub fn idents(&self) -> BTreeSet<&str> {
        fn walk<'a>(expr: &'a Expr, out: &mut BTreeSet<&'a str>) {
            match expr {
                Expr::Const(_, _) => {}
                Expr::Var(id, _) => {
                    out.insert(id.as_str());
                }
                Expr::Op1(_, r, _) => walk(r, out),
                Expr::Op2(_, l, r, _) => {
                    walk(l, out);
                    walk(r, out);
                }
            }
        }

        let mut out = BTreeSet::new();
        walk(self, &mut out);
        out
    }

    #[cfg(test)]
    pub(crate) fn strip_loc(self) -> Self {
        let loc = Loc::default();
        match self {
            Expr::Const(n, _loc) => Expr::Const(n, loc),
            Expr::Var(v, _loc) => Expr::Var(v, loc),
            Expr::Op1(op, r, _loc) => Expr::Op1(op, Box::new(r.strip_loc()), loc),
            Expr::Op2(op, l, r, _loc) => {
                Expr::Op2(op, Box::new(l.strip_loc()), Box::new(r.strip_loc()), loc)
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Const(n, _) => write!(f, "{n}"),
            Expr::Var(id, _) => write!(f, "{id}"),
            Expr::Op1(UnaryOp::Positive, r, _) => write!(f, "+{r}"),
            Expr::Op1(UnaryOp::Negative, r, _) => write!(f, "-{r}"),
            Expr::Op2(op, l, r, _) => write!(f, "({l} {op} {r})"),
        }
    }
}

#[test]
fn test_loc_basics() {
    let a = Loc::new(2, 5);
    let b = Loc::new(4, 9);
    assert_eq!(Loc::new(2, 9), a.union(&b));
    assert_eq!(Loc::new(2, 9), b.union(&a));
    assert_eq!("2:5", format!("{a}"));
}

#[test]
fn test_idents() {
    let expr = Expr::Op2(
        BinaryOp::Mul,
        Box::new(Expr::Var("ntime".to_owned(), Loc::default())),
        Box::new(Expr::Op2(
            BinaryOp::Mul,
            Box::new(Expr::Var("nbl".to_owned(), Loc::default())),
            Box::new(Expr::Var("ntime".to_owned(), Loc::default())),
            Loc::default(),
        )),
        Loc::default(),
    );
    let idents: Vec<&str> = expr.idents().into_iter().collect();
    assert_eq!(vec!["nbl", "ntime"], idents);
}

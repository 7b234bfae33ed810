// Copyright 2026 The Hypercube Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::common::Result;
use crate::dimensions::{DimensionRegistry, SizeKind};

/// One axis of an abstract shape.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ShapeElem {
    Literal(i64),
    Dim(String),
}

impl fmt::Display for ShapeElem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShapeElem::Literal(n) => write!(f, "{n}"),
            ShapeElem::Dim(name) => write!(f, "{name}"),
        }
    }
}

impl From<i64> for ShapeElem {
    fn from(n: i64) -> Self {
        ShapeElem::Literal(n)
    }
}

impl From<i32> for ShapeElem {
    fn from(n: i32) -> Self {
        ShapeElem::Literal(n.into())
    }
}

impl From<&str> for ShapeElem {
    fn from(name: &str) -> Self {
        ShapeElem::Dim(name.to_owned())
    }
}

impl From<String> for ShapeElem {
    fn from(name: String) -> Self {
        ShapeElem::Dim(name)
    }
}

/// A concrete shape. Most arrays in practice have at most four axes.
pub type Shape = SmallVec<[i64; 4]>;

/// reify substitutes the resolved size of each dimension named in
/// `abstract_shape`, keeping literal axes as they are. Axis order is
/// preserved.
pub fn reify(
    abstract_shape: &[ShapeElem],
    dims: &DimensionRegistry,
    kind: SizeKind,
) -> Result<Shape> {
    abstract_shape
        .iter()
        .map(|elem| match elem {
            ShapeElem::Literal(n) => Ok(*n),
            ShapeElem::Dim(name) => dims.resolve(name, kind),
        })
        .collect()
}

/// format_shape renders a shape the way a tuple is usually written,
/// e.g. `(ntime, nbl, nchan, 4)`.
pub fn format_shape<T: fmt::Display>(shape: &[T]) -> String {
    let parts: Vec<String> = shape.iter().map(|elem| elem.to_string()).collect();
    format!("({})", parts.join(", "))
}

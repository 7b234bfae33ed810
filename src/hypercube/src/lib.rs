// Copyright 2026 The Hypercube Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Symbolic bookkeeping for the dimensions and array shapes of a
//! partitioned numeric problem.
//!
//! Dimensions have a global and a local size, either of which may be an
//! integer expression over other dimensions. Arrays are registered with
//! abstract shapes naming dimensions, and reified into concrete shapes on
//! demand against the current local sizes.

#![forbid(unsafe_code)]

pub mod ast;
pub mod common;
mod token;
mod parser;
pub mod expression;
pub mod dimensions;
pub mod shape;
pub mod arrays;
mod cube;
pub mod json;

#[cfg(test)]
mod expression_proptest;

pub use self::arrays::{ArrayCatalog, ArrayDescriptor};
pub use self::common::{Error, ErrorCode, ErrorKind, Result};
pub use self::cube::{Chunk, Chunks, DimExtent, Hypercube};
pub use self::dimensions::{
    Dimension, DimensionOptions, DimensionRegistry, DimensionUpdate, SizeKind,
};
pub use self::expression::{Scope, Size, evaluate};
pub use self::parser::parse;
pub use self::shape::{Shape, ShapeElem, reify};

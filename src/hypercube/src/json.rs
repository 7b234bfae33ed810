// Copyright 2026 The Hypercube Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! JSON description of a whole problem.
//!
//! Dimensions are listed in registration order. A derived dimension may
//! refer to dimensions listed before or after it, since the whole list is
//! loaded before anything is resolved. Sizes are either JSON integers or
//! expression strings.
//!
//! Loading enforces the size invariants of dimensions with safety set,
//! and that their extents lie within the global size. The extent range of
//! a derived dimension follows from the sizes it was written with, so a
//! range that no longer matches the local size is kept as written.
//!
//! # Example
//! ```
//! use hypercube::Hypercube;
//!
//! let cube = Hypercube::from_json(r#"{
//!     "name": "vis",
//!     "dimensions": [
//!         {"name": "na", "global_size": 64},
//!         {"name": "nbl", "global_size": "na*(na-1)//2"}
//!     ],
//!     "arrays": [{"name": "ant_pos", "shape": ["na", 3], "dtype": "float64"}]
//! }"#)?;
//! assert_eq!(vec![2016], cube.dim_global_size(["nbl"])?);
//! # Ok::<(), hypercube::Error>(())
//! ```

use serde::{Deserialize, Serialize};

use crate::arrays::ArrayDescriptor;
use crate::common::{Error, ErrorCode, ErrorKind, Result};
use crate::cube::Hypercube;
use crate::dimensions::{self, DimensionOptions, DimensionRegistry};
use crate::expression::Size;
use crate::shape::ShapeElem;

fn is_true(val: &bool) -> bool {
    *val
}

fn default_true() -> bool {
    true
}

fn is_empty_string(val: &str) -> bool {
    val.is_empty()
}

fn is_empty_vec<T>(val: &[T]) -> bool {
    val.is_empty()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    pub global_size: Size,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub local_size: Option<Size>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub extents: Option<[i64; 2]>,
    #[serde(skip_serializing_if = "is_true", default = "default_true")]
    pub safety: bool,
    #[serde(skip_serializing_if = "is_empty_string", default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Array {
    pub name: String,
    #[serde(default)]
    pub shape: Vec<ShapeElem>,
    pub dtype: String,
    #[serde(skip_serializing_if = "is_empty_string", default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cube {
    #[serde(skip_serializing_if = "is_empty_string", default)]
    pub name: String,
    #[serde(skip_serializing_if = "is_empty_vec", default)]
    pub dimensions: Vec<Dimension>,
    #[serde(skip_serializing_if = "is_empty_vec", default)]
    pub arrays: Vec<Array>,
}

impl From<&dimensions::Dimension> for Dimension {
    fn from(dim: &dimensions::Dimension) -> Self {
        let local_size = if dim.local_size() == dim.global_size() {
            None
        } else {
            Some(dim.local_size().clone())
        };
        let (lower, upper) = dim.extents();
        Dimension {
            name: dim.name().to_owned(),
            global_size: dim.global_size().clone(),
            local_size,
            extents: Some([lower, upper]),
            safety: dim.safety(),
            description: dim.description().to_owned(),
        }
    }
}

impl Dimension {
    fn options(&self) -> DimensionOptions {
        let mut opts = DimensionOptions::new().safety(self.safety);
        opts.local_size = self.local_size.clone();
        opts.extents = self.extents.map(|[lower, upper]| (lower, upper));
        if !self.description.is_empty() {
            opts.description = Some(self.description.clone());
        }
        opts
    }
}

impl From<&ArrayDescriptor> for Array {
    fn from(array: &ArrayDescriptor) -> Self {
        Array {
            name: array.name.clone(),
            shape: array.shape.clone(),
            dtype: array.dtype.clone(),
            description: array.description.clone(),
        }
    }
}

impl From<Array> for ArrayDescriptor {
    fn from(array: Array) -> Self {
        ArrayDescriptor::new(&array.name, array.shape, &array.dtype)
            .with_description(array.description)
    }
}

impl From<&Hypercube> for Cube {
    fn from(cube: &Hypercube) -> Self {
        Cube {
            name: cube.name().to_owned(),
            dimensions: cube.dimensions().map(Dimension::from).collect(),
            arrays: cube.catalog().iter().map(Array::from).collect(),
        }
    }
}

impl TryFrom<Cube> for Hypercube {
    type Error = Error;

    fn try_from(cube: Cube) -> Result<Self> {
        let dims = DimensionRegistry::load(
            cube.dimensions
                .iter()
                .map(|dim| (dim.name.as_str(), dim.global_size.clone(), dim.options())),
        )?;
        let mut hypercube = Hypercube::with_registry(&cube.name, dims);
        hypercube.register_arrays(cube.arrays.into_iter().map(ArrayDescriptor::from))?;
        Ok(hypercube)
    }
}

impl std::str::FromStr for Cube {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|err| {
            Error::new(
                ErrorKind::Parse,
                ErrorCode::InvalidJson,
                Some(format!("Failed to parse JSON cube: {err}")),
            )
        })
    }
}

impl Hypercube {
    pub fn from_json(s: &str) -> Result<Hypercube> {
        let cube: Cube = s.parse()?;
        Hypercube::try_from(cube)
    }

    /// to_json serializes the raw, unresolved state: expressions are
    /// written as expressions, not as their current values.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&Cube::from(self)).map_err(|err| {
            Error::new(
                ErrorKind::Parse,
                ErrorCode::InvalidJson,
                Some(format!("Failed to serialize cube: {err}")),
            )
        })
    }
}

// Copyright 2026 The Hypercube Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use indexmap::IndexMap;
use tracing::debug;

use crate::common::{Error, ErrorCode, ErrorKind, Result};
use crate::dimensions::{DimensionRegistry, SizeKind};
use crate::shape::{ShapeElem, format_shape, reify};

/// A named array: its abstract shape and an opaque element type tag.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ArrayDescriptor {
    pub name: String,
    pub shape: Vec<ShapeElem>,
    pub dtype: String,
    pub description: String,
}

impl ArrayDescriptor {
    pub fn new(name: &str, shape: Vec<ShapeElem>, dtype: &str) -> Self {
        ArrayDescriptor {
            name: name.to_owned(),
            shape,
            dtype: dtype.to_owned(),
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// dims names the dimensions the shape refers to, in axis order.
    pub fn dims(&self) -> impl Iterator<Item = &str> {
        self.shape.iter().filter_map(|elem| match elem {
            ShapeElem::Dim(name) => Some(name.as_str()),
            ShapeElem::Literal(_) => None,
        })
    }

    fn reified(&self, dims: &DimensionRegistry) -> Result<ArrayDescriptor> {
        // the array's name takes over `name`; an unknown dimension moves to `ident`
        let shape = reify(&self.shape, dims, SizeKind::Local).map_err(|mut err| {
            if err.ident.is_none() {
                err.ident = err.name.take();
            }
            err.with_name(&self.name)
        })?;
        Ok(ArrayDescriptor {
            shape: shape.into_iter().map(ShapeElem::Literal).collect(),
            ..self.clone()
        })
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct ArrayCatalog {
    arrays: IndexMap<String, ArrayDescriptor>,
}

impl ArrayCatalog {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ArrayDescriptor> {
        self.arrays.values()
    }

    pub fn register_array(
        &mut self,
        name: &str,
        shape: Vec<ShapeElem>,
        dtype: &str,
    ) -> Result<Option<ArrayDescriptor>> {
        self.register(ArrayDescriptor::new(name, shape, dtype))
    }

    /// register records `array`, replacing and returning any previous
    /// descriptor of the same name. A replaced array keeps its original
    /// position in the catalog. Dimension names in the shape are not
    /// checked until the shape is reified.
    pub fn register(&mut self, array: ArrayDescriptor) -> Result<Option<ArrayDescriptor>> {
        if let Some(bad) = array.shape.iter().find_map(|elem| match elem {
            ShapeElem::Literal(n) if *n <= 0 => Some(*n),
            _ => None,
        }) {
            let err = Error::new(
                ErrorKind::InvariantViolation,
                ErrorCode::BadShape,
                Some(format!(
                    "Array '{}' has non-positive literal axis {bad} in shape {}",
                    array.name,
                    format_shape(&array.shape)
                )),
            );
            return Err(err.with_name(&array.name));
        }

        debug!(
            name = array.name.as_str(),
            shape = %format_shape(&array.shape),
            dtype = array.dtype.as_str(),
            "registered array"
        );
        Ok(self.arrays.insert(array.name.clone(), array))
    }

    pub fn array(
        &self,
        name: &str,
        dims: &DimensionRegistry,
        reify: bool,
    ) -> Result<ArrayDescriptor> {
        let Some(array) = self.arrays.get(name) else {
            let err = Error::new(
                ErrorKind::UnknownName,
                ErrorCode::DoesNotExist,
                Some(format!("Array '{name}' is not registered")),
            );
            return Err(err.with_name(name));
        };
        if reify {
            array.reified(dims)
        } else {
            Ok(array.clone())
        }
    }

    /// arrays returns a copy of every descriptor, in registration order.
    /// With `reify` set each shape is replaced by its concrete local
    /// shape, and any array naming an unregistered dimension is an error.
    pub fn arrays(
        &self,
        dims: &DimensionRegistry,
        reify: bool,
    ) -> Result<IndexMap<String, ArrayDescriptor>> {
        self.arrays
            .iter()
            .map(|(name, array)| -> Result<(String, ArrayDescriptor)> {
                let array = if reify {
                    array.reified(dims)?
                } else {
                    array.clone()
                };
                Ok((name.clone(), array))
            })
            .collect()
    }
}

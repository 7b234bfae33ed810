// Copyright 2026 The Hypercube Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::fmt;

use indexmap::IndexMap;
use tracing::debug;

use crate::arrays::{ArrayCatalog, ArrayDescriptor};
use crate::common::{Error, ErrorCode, ErrorKind, Result};
use crate::dimensions::{Dimension, DimensionOptions, DimensionRegistry, DimensionUpdate, SizeKind};
use crate::expression::Size;
use crate::shape::{Shape, ShapeElem, format_shape, reify};

/// Hypercube describes one problem: its dimensions and the arrays shaped
/// by them. Independent problems are independent values.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Hypercube {
    name: String,
    dims: DimensionRegistry,
    arrays: ArrayCatalog,
}

impl Hypercube {
    pub fn new(name: &str) -> Self {
        Hypercube {
            name: name.to_owned(),
            ..Default::default()
        }
    }

    /// with_registry starts a problem from an already validated set of
    /// dimensions and no arrays.
    pub fn with_registry(name: &str, dims: DimensionRegistry) -> Self {
        Hypercube {
            name: name.to_owned(),
            dims,
            arrays: ArrayCatalog::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn registry(&self) -> &DimensionRegistry {
        &self.dims
    }

    pub fn catalog(&self) -> &ArrayCatalog {
        &self.arrays
    }

    pub fn register_dimension(&mut self, name: &str, global_size: impl Into<Size>) -> Result<()> {
        self.dims.register_dimension(name, global_size)
    }

    pub fn register_dimension_with(
        &mut self,
        name: &str,
        global_size: impl Into<Size>,
        opts: DimensionOptions,
    ) -> Result<()> {
        self.dims.register_dimension_with(name, global_size, opts)
    }

    /// register_dimensions registers each dimension in order, so later
    /// entries may refer to earlier ones. If any registration fails none
    /// of them are kept.
    pub fn register_dimensions<I, N, G>(&mut self, dims: I) -> Result<()>
    where
        I: IntoIterator<Item = (N, G, DimensionOptions)>,
        N: AsRef<str>,
        G: Into<Size>,
    {
        let mut registry = self.dims.clone();
        for (name, global_size, opts) in dims {
            registry.register_dimension_with(name.as_ref(), global_size, opts)?;
        }
        self.dims = registry;
        Ok(())
    }

    pub fn update_dimension(&mut self, name: &str, update: DimensionUpdate) -> Result<()> {
        self.dims.update_dimension(name, update)
    }

    pub fn dimension(&self, name: &str) -> Result<&Dimension> {
        self.dims.dimension(name)
    }

    pub fn dimensions(&self) -> impl Iterator<Item = &Dimension> {
        self.dims.dimensions()
    }

    pub fn dim_global_size<I, S>(&self, names: I) -> Result<Vec<i64>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.dims.dim_global_size(names)
    }

    pub fn dim_local_size<I, S>(&self, names: I) -> Result<Vec<i64>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.dims.dim_local_size(names)
    }

    pub fn dim_global_size_dict(&self) -> Result<IndexMap<String, i64>> {
        self.dims.dim_global_size_dict()
    }

    pub fn dim_local_size_dict(&self) -> Result<IndexMap<String, i64>> {
        self.dims.dim_local_size_dict()
    }

    pub fn dim_lower_extent<I, S>(&self, names: I) -> Result<Vec<i64>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.dims.dim_lower_extent(names)
    }

    pub fn dim_upper_extent<I, S>(&self, names: I) -> Result<Vec<i64>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.dims.dim_upper_extent(names)
    }

    pub fn dim_extents<I, S>(&self, names: I) -> Result<Vec<(i64, i64)>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.dims.dim_extents(names)
    }

    pub fn dim_extent_size<I, S>(&self, names: I) -> Result<Vec<i64>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.dims.dim_extent_size(names)
    }

    pub fn register_array(
        &mut self,
        name: &str,
        shape: Vec<ShapeElem>,
        dtype: &str,
    ) -> Result<Option<ArrayDescriptor>> {
        self.arrays.register_array(name, shape, dtype)
    }

    /// register_arrays registers each array in order. If any is rejected
    /// none of them are kept.
    pub fn register_arrays<I>(&mut self, arrays: I) -> Result<()>
    where
        I: IntoIterator<Item = ArrayDescriptor>,
    {
        let mut catalog = self.arrays.clone();
        for array in arrays {
            catalog.register(array)?;
        }
        self.arrays = catalog;
        Ok(())
    }

    pub fn array(&self, name: &str, reify: bool) -> Result<ArrayDescriptor> {
        self.arrays.array(name, &self.dims, reify)
    }

    pub fn arrays(&self, reify: bool) -> Result<IndexMap<String, ArrayDescriptor>> {
        self.arrays.arrays(&self.dims, reify)
    }

    pub fn reify(&self, abstract_shape: &[ShapeElem], kind: SizeKind) -> Result<Shape> {
        reify(abstract_shape, &self.dims, kind)
    }

    /// chunks partitions the global extent of each listed dimension into
    /// runs of `chunk_size` and iterates every combination of them. The
    /// last dimension listed varies fastest.
    pub fn chunks(&self, chunking: &[(&str, i64)]) -> Result<Chunks> {
        let mut axes = Vec::with_capacity(chunking.len());
        for &(name, chunk_size) in chunking {
            let global = self.dims.resolve(name, SizeKind::Global)?;
            if chunk_size <= 0 {
                let err = Error::new(
                    ErrorKind::InvariantViolation,
                    ErrorCode::BadChunkSize,
                    Some(format!("Chunk size {chunk_size} for dimension '{name}' is not positive")),
                );
                return Err(err.with_name(name));
            }
            axes.push(Axis {
                name: name.to_owned(),
                global,
                chunk_size,
            });
        }
        Ok(Chunks::new(axes))
    }

    /// apply_chunk sets the local size and extents of every dimension
    /// in `chunk`. Either every dimension is updated or none is.
    pub fn apply_chunk(&mut self, chunk: &Chunk) -> Result<()> {
        let mut registry = self.dims.clone();
        for extent in chunk.iter() {
            registry.update_dimension(
                &extent.name,
                DimensionUpdate::new()
                    .local_size(extent.size())
                    .extents(extent.lower, extent.upper),
            )?;
        }
        debug!(chunk = %chunk, "applied chunk");
        self.dims = registry;
        Ok(())
    }
}

/// One dimension's slice `[lower, upper)` within a chunk.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct DimExtent {
    pub name: String,
    pub lower: i64,
    pub upper: i64,
}

impl DimExtent {
    pub fn size(&self) -> i64 {
        self.upper.saturating_sub(self.lower)
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Chunk {
    extents: Vec<DimExtent>,
}

impl Chunk {
    pub fn iter(&self) -> impl Iterator<Item = &DimExtent> {
        self.extents.iter()
    }

    pub fn extent(&self, name: &str) -> Option<&DimExtent> {
        self.extents.iter().find(|e| e.name == name)
    }
}

impl fmt::Display for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .extents
            .iter()
            .map(|e| format!("{}=[{}, {})", e.name, e.lower, e.upper))
            .collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

#[derive(Clone, Debug)]
struct Axis {
    name: String,
    global: i64,
    chunk_size: i64,
}

/// Iterator over the chunks of a `Hypercube::chunks` decomposition.
#[derive(Clone, Debug)]
pub struct Chunks {
    axes: Vec<Axis>,
    lowers: Vec<i64>,
    done: bool,
}

impl Chunks {
    fn new(axes: Vec<Axis>) -> Self {
        let done = axes.is_empty() || axes.iter().any(|axis| axis.global <= 0);
        let lowers = vec![0; axes.len()];
        Chunks { axes, lowers, done }
    }
}

impl Iterator for Chunks {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.done {
            return None;
        }

        let extents = self
            .axes
            .iter()
            .zip(self.lowers.iter())
            .map(|(axis, &lower)| DimExtent {
                name: axis.name.clone(),
                lower,
                upper: lower.saturating_add(axis.chunk_size).min(axis.global),
            })
            .collect();

        // odometer step, last axis fastest
        self.done = true;
        for (axis, lower) in self.axes.iter().zip(self.lowers.iter_mut()).rev() {
            *lower = lower.saturating_add(axis.chunk_size);
            if *lower < axis.global {
                self.done = false;
                break;
            }
            *lower = 0;
        }

        Some(Chunk { extents })
    }
}

impl fmt::Display for Hypercube {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn resolved(size: Result<i64>) -> String {
            match size {
                Ok(n) => n.to_string(),
                Err(err) => format!("<{}>", err.code),
            }
        }

        writeln!(f, "Hypercube '{}'", self.name)?;
        writeln!(f, "Dimensions:")?;
        writeln!(
            f,
            "  {:<16} {:>12} {:>12} {:>20}  description",
            "name", "global", "local", "extents"
        )?;
        for dim in self.dims.dimensions() {
            let name = dim.name();
            let global = resolved(self.dims.resolve(name, SizeKind::Global));
            let local = resolved(self.dims.resolve(name, SizeKind::Local));
            let (lower, upper) = dim.extents();
            writeln!(
                f,
                "  {:<16} {:>12} {:>12} {:>20}  {}",
                name,
                global,
                local,
                format!("[{lower}, {upper})"),
                dim.description()
            )?;
        }

        writeln!(f, "Arrays:")?;
        writeln!(f, "  {:<16} {:<12} {:<32} reified", "name", "dtype", "shape")?;
        for array in self.arrays.iter() {
            let reified = match reify(&array.shape, &self.dims, SizeKind::Local) {
                Ok(shape) => format_shape(&shape),
                Err(err) => format!("<{}>", err.code),
            };
            writeln!(
                f,
                "  {:<16} {:<12} {:<32} {}",
                array.name,
                array.dtype,
                format_shape(&array.shape),
                reified
            )?;
        }
        Ok(())
    }
}

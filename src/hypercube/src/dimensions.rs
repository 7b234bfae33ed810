// Copyright 2026 The Hypercube Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::common::{Error, ErrorCode, ErrorKind, Result, split_names};
use crate::cube_err;
use crate::expression::{Evaluator, Scope, Size};
use crate::parser;

/// Which of a dimension's two sizes a query resolves.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SizeKind {
    Global,
    Local,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Dimension {
    name: String,
    description: String,
    global_size: Size,
    local_size: Size,
    lower_extent: i64,
    upper_extent: i64,
    safety: bool,
}

impl Dimension {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn global_size(&self) -> &Size {
        &self.global_size
    }

    pub fn local_size(&self) -> &Size {
        &self.local_size
    }

    pub fn size(&self, kind: SizeKind) -> &Size {
        match kind {
            SizeKind::Global => &self.global_size,
            SizeKind::Local => &self.local_size,
        }
    }

    pub fn lower_extent(&self) -> i64 {
        self.lower_extent
    }

    pub fn upper_extent(&self) -> i64 {
        self.upper_extent
    }

    /// extents returns the half-open range `[lower, upper)`.
    pub fn extents(&self) -> (i64, i64) {
        (self.lower_extent, self.upper_extent)
    }

    pub fn extent_size(&self) -> i64 {
        self.upper_extent.saturating_sub(self.lower_extent)
    }

    pub fn safety(&self) -> bool {
        self.safety
    }
}

/// Optional settings for `DimensionRegistry::register_dimension_with`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct DimensionOptions {
    pub local_size: Option<Size>,
    pub extents: Option<(i64, i64)>,
    pub safety: bool,
    pub description: Option<String>,
}

impl Default for DimensionOptions {
    fn default() -> Self {
        DimensionOptions {
            local_size: None,
            extents: None,
            safety: true,
            description: None,
        }
    }
}

impl DimensionOptions {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn local_size(mut self, size: impl Into<Size>) -> Self {
        self.local_size = Some(size.into());
        self
    }

    pub fn extents(mut self, lower: i64, upper: i64) -> Self {
        self.extents = Some((lower, upper));
        self
    }

    pub fn safety(mut self, safety: bool) -> Self {
        self.safety = safety;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A set of changes to apply to a registered dimension. Fields left as
/// `None` keep their current value.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct DimensionUpdate {
    pub global_size: Option<Size>,
    pub local_size: Option<Size>,
    pub extents: Option<(i64, i64)>,
    pub safety: Option<bool>,
    pub description: Option<String>,
}

impl DimensionUpdate {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn global_size(mut self, size: impl Into<Size>) -> Self {
        self.global_size = Some(size.into());
        self
    }

    pub fn local_size(mut self, size: impl Into<Size>) -> Self {
        self.local_size = Some(size.into());
        self
    }

    pub fn extents(mut self, lower: i64, upper: i64) -> Self {
        self.extents = Some((lower, upper));
        self
    }

    pub fn safety(mut self, safety: bool) -> Self {
        self.safety = Some(safety);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// The Scope exposing one of the registry's two raw size mappings,
/// optionally with a not-yet-committed dimension layered on top.
pub struct RegistryScope<'a> {
    dims: &'a IndexMap<String, Dimension>,
    kind: SizeKind,
    pending: Option<&'a Dimension>,
}

impl Scope for RegistryScope<'_> {
    fn lookup(&self, ident: &str) -> Option<&Size> {
        match self.pending {
            Some(dim) if dim.name == ident => Some(dim.size(self.kind)),
            _ => self.dims.get(ident).map(|dim| dim.size(self.kind)),
        }
    }
}

/// DimensionRegistry owns the registered dimensions of one problem.
///
/// Only raw sizes are stored. Every size query evaluates against the
/// current raw values, so an update to one dimension is visible in every
/// dimension derived from it on the next query.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct DimensionRegistry {
    dims: IndexMap<String, Dimension>,
}

impl DimensionRegistry {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn len(&self) -> usize {
        self.dims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dims.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.dims.contains_key(name)
    }

    /// dimensions iterates in registration order.
    pub fn dimensions(&self) -> impl Iterator<Item = &Dimension> {
        self.dims.values()
    }

    pub fn dimension(&self, name: &str) -> Result<&Dimension> {
        match self.dims.get(name) {
            Some(dim) => Ok(dim),
            None => unknown_dimension(name),
        }
    }

    pub fn scope(&self, kind: SizeKind) -> RegistryScope<'_> {
        RegistryScope {
            dims: &self.dims,
            kind,
            pending: None,
        }
    }

    pub fn register_dimension(&mut self, name: &str, global_size: impl Into<Size>) -> Result<()> {
        self.register_dimension_with(name, global_size, DimensionOptions::default())
    }

    /// register_dimension_with adds a new dimension. The local size
    /// defaults to the global size and the extents to `[0, local)`.
    pub fn register_dimension_with(
        &mut self,
        name: &str,
        global_size: impl Into<Size>,
        opts: DimensionOptions,
    ) -> Result<()> {
        if self.dims.contains_key(name) {
            return duplicate_dimension(name);
        }

        let global_size = global_size.into();
        let mut dim = Dimension {
            name: name.to_owned(),
            description: opts.description.unwrap_or_default(),
            local_size: opts.local_size.unwrap_or_else(|| global_size.clone()),
            global_size,
            lower_extent: 0,
            upper_extent: 0,
            safety: opts.safety,
        };

        let (lower, upper) = match opts.extents {
            Some(extents) => extents,
            None => (0, self.resolve_pending(&dim, &dim, SizeKind::Local)?),
        };
        dim.lower_extent = lower;
        dim.upper_extent = upper;

        self.check(&dim)?;

        debug!(
            name,
            global_size = %dim.global_size,
            local_size = %dim.local_size,
            lower,
            upper,
            safety = dim.safety,
            "registered dimension"
        );
        self.dims.insert(name.to_owned(), dim);
        Ok(())
    }

    /// update_dimension applies `update` to the named dimension. Either
    /// the whole update is applied or, on error, nothing changes.
    pub fn update_dimension(&mut self, name: &str, update: DimensionUpdate) -> Result<()> {
        let mut dim = self.dimension(name)?.clone();

        if let Some(global_size) = update.global_size {
            dim.global_size = global_size;
        }
        if let Some(local_size) = update.local_size {
            dim.local_size = local_size;
        }
        if let Some((lower, upper)) = update.extents {
            dim.lower_extent = lower;
            dim.upper_extent = upper;
        }
        if let Some(safety) = update.safety {
            dim.safety = safety;
        }
        if let Some(description) = update.description {
            dim.description = description;
        }

        self.check(&dim)?;

        debug!(
            name,
            global_size = %dim.global_size,
            local_size = %dim.local_size,
            lower = dim.lower_extent,
            upper = dim.upper_extent,
            safety = dim.safety,
            "updated dimension"
        );
        self.dims.insert(name.to_owned(), dim);
        Ok(())
    }

    /// check resolves both sizes of a dimension that is about to be
    /// committed and, if its safety flag is set, enforces the size and
    /// extent invariants. Every committed dimension with safety set whose
    /// sizes refer to `dim` is then re-resolved against the new value and
    /// must still satisfy `0 <= local <= global`.
    fn check(&self, dim: &Dimension) -> Result<()> {
        let global = self.resolve_pending(dim, dim, SizeKind::Global)?;
        let local = self.resolve_pending(dim, dim, SizeKind::Local)?;
        let (lower, upper) = dim.extents();
        let range = dim.extent_size();
        let name = dim.name.as_str();

        if dim.safety {
            check_sizes(name, global, local)?;
            check_extent_bounds(dim, global)?;
            if range != local {
                let err = Error::new(
                    ErrorKind::InvariantViolation,
                    ErrorCode::ExtentMismatch,
                    Some(format!(
                        "Dimension '{name}' extent range [{lower}, {upper}) ({range}) does not match its local size {local}"
                    )),
                );
                return Err(err.with_name(name));
            }
        } else if range != local {
            warn!(
                name,
                local, lower, upper, "extent range does not match local size"
            );
        }

        for dependent in self.dependents(name)? {
            if !dependent.safety {
                continue;
            }
            let global = self.resolve_pending(dependent, dim, SizeKind::Global)?;
            let local = self.resolve_pending(dependent, dim, SizeKind::Local)?;
            check_sizes(&dependent.name, global, local).map_err(|mut err| {
                err.details = err
                    .details
                    .map(|details| format!("{details} after updating '{name}'"));
                err
            })?;
        }

        Ok(())
    }

    /// load builds a registry from a complete set of dimensions whose
    /// sizes may refer to each other in any order. Unset extents default
    /// to `[0, local)` once every dimension is known. Dimensions with
    /// safety set must have `0 <= local <= global` and extents within
    /// `[0, global)`. An extent range that differs from the local size is
    /// accepted with a warning.
    pub fn load<I, N, G>(dims: I) -> Result<Self>
    where
        I: IntoIterator<Item = (N, G, DimensionOptions)>,
        N: AsRef<str>,
        G: Into<Size>,
    {
        let mut registry = DimensionRegistry::new();
        let mut unset = BTreeSet::new();
        for (name, global_size, opts) in dims {
            let name = name.as_ref();
            if registry.dims.contains_key(name) {
                return duplicate_dimension(name);
            }
            let global_size = global_size.into();
            let (lower, upper) = match opts.extents {
                Some(extents) => extents,
                None => {
                    unset.insert(name.to_owned());
                    (0, 0)
                }
            };
            let dim = Dimension {
                name: name.to_owned(),
                description: opts.description.unwrap_or_default(),
                local_size: opts.local_size.unwrap_or_else(|| global_size.clone()),
                global_size,
                lower_extent: lower,
                upper_extent: upper,
                safety: opts.safety,
            };
            registry.dims.insert(name.to_owned(), dim);
        }

        let globals = registry.dim_global_size_dict()?;
        let locals = registry.dim_local_size_dict()?;
        let sizes = globals.values().zip(locals.values());
        for (dim, (&global, &local)) in registry.dims.values_mut().zip(sizes) {
            if unset.contains(&dim.name) {
                dim.upper_extent = local;
            }
            if dim.safety {
                check_sizes(&dim.name, global, local)?;
                check_extent_bounds(dim, global)?;
            }
            if dim.extent_size() != local {
                let (lower, upper) = dim.extents();
                warn!(
                    name = dim.name.as_str(),
                    local, lower, upper, "extent range does not match local size"
                );
            }
        }

        debug!(count = registry.len(), "loaded dimensions");
        Ok(registry)
    }

    /// dependents returns the committed dimensions whose sizes refer to
    /// `name`, directly or through other dimensions.
    fn dependents(&self, name: &str) -> Result<Vec<&Dimension>> {
        let mut refs = Vec::with_capacity(self.dims.len());
        for dim in self.dims.values().filter(|dim| dim.name != name) {
            let mut idents = BTreeSet::new();
            for size in [&dim.global_size, &dim.local_size] {
                if let Size::Expression(eqn) = size {
                    let ast = parser::parse(eqn)
                        .map_err(|err| Error::parse(eqn, err).with_name(&dim.name))?;
                    idents.extend(ast.idents().into_iter().map(str::to_owned));
                }
            }
            refs.push((dim, idents));
        }

        let mut reached: BTreeSet<&str> = BTreeSet::new();
        reached.insert(name);
        let mut dependents = Vec::new();
        loop {
            let found = dependents.len();
            for (dim, idents) in refs.iter() {
                if !reached.contains(dim.name.as_str())
                    && idents.iter().any(|ident| reached.contains(ident.as_str()))
                {
                    reached.insert(dim.name.as_str());
                    dependents.push(*dim);
                }
            }
            if dependents.len() == found {
                break;
            }
        }
        Ok(dependents)
    }

    /// resolve_pending resolves `target` with the uncommitted `pending`
    /// dimension layered over the registry.
    fn resolve_pending(
        &self,
        target: &Dimension,
        pending: &Dimension,
        kind: SizeKind,
    ) -> Result<i64> {
        let scope = RegistryScope {
            dims: &self.dims,
            kind,
            pending: Some(pending),
        };
        Evaluator::new(&scope)
            .resolve(&target.name)
            .map_err(|err| err.with_name(&target.name))
    }

    /// resolve returns the global or local size of one dimension.
    pub fn resolve(&self, name: &str, kind: SizeKind) -> Result<i64> {
        self.resolve_all(std::iter::once(name), kind).map(|sizes| sizes[0])
    }

    fn resolve_all<I, S>(&self, names: I, kind: SizeKind) -> Result<Vec<i64>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let scope = self.scope(kind);
        let mut evaluator = Evaluator::new(&scope);
        names
            .into_iter()
            .map(|name| {
                let name = name.as_ref();
                if !self.dims.contains_key(name) {
                    return unknown_dimension(name);
                }
                evaluator.resolve(name).map_err(|err| err.with_name(name))
            })
            .collect()
    }

    /// dim_global_size resolves the global sizes of the named dimensions,
    /// in the order requested. Each name may itself be a comma-separated
    /// list, so `["ntime", "na"]` and `["ntime,na"]` are equivalent.
    pub fn dim_global_size<I, S>(&self, names: I) -> Result<Vec<i64>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.resolve_all(split_names(names), SizeKind::Global)
    }

    /// dim_local_size is the local-size counterpart of `dim_global_size`.
    pub fn dim_local_size<I, S>(&self, names: I) -> Result<Vec<i64>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.resolve_all(split_names(names), SizeKind::Local)
    }

    pub fn dim_global_size_dict(&self) -> Result<IndexMap<String, i64>> {
        self.size_dict(SizeKind::Global)
    }

    pub fn dim_local_size_dict(&self) -> Result<IndexMap<String, i64>> {
        self.size_dict(SizeKind::Local)
    }

    fn size_dict(&self, kind: SizeKind) -> Result<IndexMap<String, i64>> {
        let sizes = self.resolve_all(self.dims.keys(), kind)?;
        Ok(self.dims.keys().cloned().zip(sizes).collect())
    }

    pub fn dim_lower_extent<I, S>(&self, names: I) -> Result<Vec<i64>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.map_dims(names, Dimension::lower_extent)
    }

    pub fn dim_upper_extent<I, S>(&self, names: I) -> Result<Vec<i64>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.map_dims(names, Dimension::upper_extent)
    }

    pub fn dim_extents<I, S>(&self, names: I) -> Result<Vec<(i64, i64)>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.map_dims(names, Dimension::extents)
    }

    pub fn dim_extent_size<I, S>(&self, names: I) -> Result<Vec<i64>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.map_dims(names, Dimension::extent_size)
    }

    fn map_dims<I, S, T, F>(&self, names: I, f: F) -> Result<Vec<T>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: Fn(&Dimension) -> T,
    {
        split_names(names)
            .iter()
            .map(|name| self.dimension(name).map(&f))
            .collect()
    }
}

fn check_sizes(name: &str, global: i64, local: i64) -> Result<()> {
    let result = if global < 0 {
        cube_err!(
            InvariantViolation,
            NegativeSize,
            format!("Dimension '{name}' global size {global} is negative")
        )
    } else if local < 0 {
        cube_err!(
            InvariantViolation,
            NegativeSize,
            format!("Dimension '{name}' local size {local} is negative")
        )
    } else if local > global {
        cube_err!(
            InvariantViolation,
            LocalExceedsGlobal,
            format!("Dimension '{name}' local size {local} exceeds its global size {global}")
        )
    } else {
        Ok(())
    };
    result.map_err(|err: Error| err.with_name(name))
}

fn check_extent_bounds(dim: &Dimension, global: i64) -> Result<()> {
    let name = dim.name.as_str();
    let (lower, upper) = dim.extents();
    if lower < 0 || upper < lower || upper > global {
        let err = Error::new(
            ErrorKind::InvariantViolation,
            ErrorCode::ExtentOutOfBounds,
            Some(format!(
                "Dimension '{name}' extents [{lower}, {upper}) do not lie within [0, {global})"
            )),
        );
        return Err(err.with_name(name));
    }
    Ok(())
}

fn duplicate_dimension<T>(name: &str) -> Result<T> {
    let err = Error::new(
        ErrorKind::DuplicateName,
        ErrorCode::DuplicateDimension,
        Some(format!("Dimension '{name}' is already registered")),
    );
    Err(err.with_name(name))
}

fn unknown_dimension<T>(name: &str) -> Result<T> {
    let err = Error::new(
        ErrorKind::UnknownName,
        ErrorCode::DoesNotExist,
        Some(format!("Dimension '{name}' is not registered")),
    );
    Err(err.with_name(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vis_registry() -> DimensionRegistry {
        let mut dims = DimensionRegistry::new();
        dims.register_dimension("ntime", 100).unwrap();
        dims.register_dimension("na", 64).unwrap();
        dims.register_dimension("nchan", 128).unwrap();
        dims.register_dimension("npol", 4).unwrap();
        dims.register_dimension("nbl", "na*(na-1)//2").unwrap();
        dims.register_dimension("nvis", "ntime*nbl*nchan").unwrap();
        dims
    }

    #[test]
    fn test_register_defaults() {
        let dims = vis_registry();
        let ntime = dims.dimension("ntime").unwrap();
        assert_eq!(&Size::Literal(100), ntime.global_size());
        assert_eq!(&Size::Literal(100), ntime.local_size());
        assert_eq!((0, 100), ntime.extents());
        assert!(ntime.safety());

        let nbl = dims.dimension("nbl").unwrap();
        assert_eq!(&Size::from("na*(na-1)//2"), nbl.local_size());
        assert_eq!((0, 2016), nbl.extents());
    }

    #[test]
    fn test_registration_order() {
        let dims = vis_registry();
        let names: Vec<&str> = dims.dimensions().map(|d| d.name()).collect();
        assert_eq!(vec!["ntime", "na", "nchan", "npol", "nbl", "nvis"], names);
    }

    #[test]
    fn test_duplicate_dimension() {
        let mut dims = vis_registry();
        let err = dims.register_dimension("ntime", 10).unwrap_err();
        assert_eq!(ErrorKind::DuplicateName, err.kind);
        assert_eq!(ErrorCode::DuplicateDimension, err.code);
        assert_eq!(Some("ntime".to_owned()), err.name);
        assert_eq!(Ok(vec![100]), dims.dim_global_size(["ntime"]));
    }

    #[test]
    fn test_register_cycle() {
        let mut dims = DimensionRegistry::new();
        let err = dims.register_dimension("a", "a + 1").unwrap_err();
        assert_eq!(ErrorCode::CircularReference, err.code);
        assert!(!dims.contains("a"));
    }

    #[test]
    fn test_register_unresolved() {
        let mut dims = DimensionRegistry::new();
        let err = dims.register_dimension("nbl", "na*(na-1)//2").unwrap_err();
        assert_eq!(ErrorKind::Evaluation, err.kind);
        assert_eq!(ErrorCode::UnresolvedVariable, err.code);
        assert_eq!(Some("na".to_owned()), err.ident);
        assert_eq!(Some("nbl".to_owned()), err.name);
        assert!(dims.is_empty());
    }

    #[test]
    fn test_register_with_options() {
        let mut dims = DimensionRegistry::new();
        dims.register_dimension_with(
            "ntime",
            100,
            DimensionOptions::new()
                .local_size(10)
                .extents(20, 30)
                .description("Timesteps"),
        )
        .unwrap();
        let ntime = dims.dimension("ntime").unwrap();
        assert_eq!((20, 30), ntime.extents());
        assert_eq!("Timesteps", ntime.description());
        assert_eq!(Ok(vec![10]), dims.dim_local_size(["ntime"]));
        assert_eq!(Ok(vec![100]), dims.dim_global_size(["ntime"]));
    }

    #[test]
    fn test_register_checks_invariants() {
        let mut dims = DimensionRegistry::new();
        let err = dims
            .register_dimension_with("ntime", 10, DimensionOptions::new().local_size(20))
            .unwrap_err();
        assert_eq!(ErrorCode::LocalExceedsGlobal, err.code);

        let err = dims
            .register_dimension_with(
                "ntime",
                10,
                DimensionOptions::new().local_size(5).extents(0, 4),
            )
            .unwrap_err();
        assert_eq!(ErrorCode::ExtentMismatch, err.code);

        let err = dims.register_dimension("ntime", -1).unwrap_err();
        assert_eq!(ErrorCode::NegativeSize, err.code);

        // without safety the same registrations are accepted
        dims.register_dimension_with(
            "ntime",
            10,
            DimensionOptions::new().local_size(20).safety(false),
        )
        .unwrap();
        assert_eq!(Ok(vec![20]), dims.dim_local_size(["ntime"]));
    }

    #[test]
    fn test_multi_and_comma_forms() {
        let dims = vis_registry();
        let multi = dims.dim_global_size(["ntime", "na", "nbl"]).unwrap();
        let joined = dims.dim_global_size(["ntime,na,nbl"]).unwrap();
        assert_eq!(vec![100, 64, 2016], multi);
        assert_eq!(multi, joined);
    }

    #[test]
    fn test_unknown_name() {
        let mut dims = vis_registry();
        let err = dims.dim_global_size(["ntime", "nrow"]).unwrap_err();
        assert_eq!(ErrorKind::UnknownName, err.kind);
        assert_eq!(Some("nrow".to_owned()), err.name);

        let err = dims.dim_extents(["nrow"]).unwrap_err();
        assert_eq!(ErrorKind::UnknownName, err.kind);

        let err = dims
            .update_dimension("nrow", DimensionUpdate::new().local_size(1))
            .unwrap_err();
        assert_eq!(ErrorKind::UnknownName, err.kind);
        assert_eq!(ErrorCode::DoesNotExist, err.code);
    }

    #[test]
    fn test_update_is_visible_in_derived() {
        let mut dims = vis_registry();
        dims.update_dimension(
            "ntime",
            DimensionUpdate::new().local_size(10).extents(0, 10),
        )
        .unwrap();
        assert_eq!(Ok(vec![10 * 2016 * 128]), dims.dim_local_size(["nvis"]));
        assert_eq!(Ok(vec![100 * 2016 * 128]), dims.dim_global_size(["nvis"]));
    }

    #[test]
    fn test_local_and_global_independent() {
        let mut dims = vis_registry();
        for (name, size) in [("ntime", 10), ("na", 7), ("nchan", 16)] {
            dims.update_dimension(
                name,
                DimensionUpdate::new().local_size(size).extents(0, size),
            )
            .unwrap();
        }

        let local = dims.dim_local_size_dict().unwrap();
        assert_eq!(21, local["nbl"]);
        assert_eq!(10 * 21 * 16, local["nvis"]);

        let global = dims.dim_global_size_dict().unwrap();
        assert_eq!(2016, global["nbl"]);
        assert_eq!(100 * 2016 * 128, global["nvis"]);

        // changing a global size leaves local resolution alone
        dims.update_dimension("na", DimensionUpdate::new().global_size(32)).unwrap();
        assert_eq!(Ok(vec![496]), dims.dim_global_size(["nbl"]));
        assert_eq!(Ok(vec![21]), dims.dim_local_size(["nbl"]));
    }

    #[test]
    fn test_update_safety_violations() {
        let mut dims = vis_registry();
        let before = dims.clone();

        let cases = [
            (
                DimensionUpdate::new().local_size(200).extents(0, 200),
                ErrorCode::LocalExceedsGlobal,
            ),
            (
                DimensionUpdate::new().local_size(-1),
                ErrorCode::NegativeSize,
            ),
            (
                DimensionUpdate::new().local_size(50),
                ErrorCode::ExtentMismatch,
            ),
            (
                DimensionUpdate::new().local_size(50).extents(0, 40),
                ErrorCode::ExtentMismatch,
            ),
            (
                DimensionUpdate::new().local_size(50).extents(60, 110),
                ErrorCode::ExtentOutOfBounds,
            ),
            (
                DimensionUpdate::new().local_size(50).extents(-10, 40),
                ErrorCode::ExtentOutOfBounds,
            ),
        ];
        for (update, code) in cases {
            let err = dims.update_dimension("ntime", update).unwrap_err();
            assert_eq!(ErrorKind::InvariantViolation, err.kind);
            assert_eq!(code, err.code);
            assert_eq!(Some("ntime".to_owned()), err.name);
            // failed updates leave no trace
            assert_eq!(before, dims);
        }
    }

    #[test]
    fn test_update_safety_override() {
        let mut dims = vis_registry();
        dims.update_dimension(
            "npol",
            DimensionUpdate::new()
                .local_size(2)
                .extents(0, 3)
                .safety(false),
        )
        .unwrap();
        assert!(!dims.dimension("npol").unwrap().safety());
        assert_eq!(Ok(vec![2]), dims.dim_local_size(["npol"]));

        // the stored flag is now off, so later updates skip checks too
        dims.update_dimension("npol", DimensionUpdate::new().local_size(500)).unwrap();
        assert_eq!(Ok(vec![500]), dims.dim_local_size(["npol"]));

        // re-enabling safety validates the dimension as it now stands
        let err = dims
            .update_dimension("npol", DimensionUpdate::new().safety(true))
            .unwrap_err();
        assert_eq!(ErrorCode::LocalExceedsGlobal, err.code);
        assert!(!dims.dimension("npol").unwrap().safety());
    }

    #[test]
    fn test_update_rechecks_dependents() {
        let mut dims = DimensionRegistry::new();
        dims.register_dimension("x", 10).unwrap();
        dims.register_dimension_with("y", "x", DimensionOptions::new().local_size(10)).unwrap();
        let before = dims.clone();

        // x itself stays consistent but y's local would exceed its global
        let err = dims
            .update_dimension(
                "x",
                DimensionUpdate::new().global_size(5).local_size(5).extents(0, 5),
            )
            .unwrap_err();
        assert_eq!(ErrorKind::InvariantViolation, err.kind);
        assert_eq!(ErrorCode::LocalExceedsGlobal, err.code);
        assert_eq!(Some("y".to_owned()), err.name);
        assert!(err.to_string().contains("after updating 'x'"));
        assert_eq!(before, dims);

        // an unsafe x does not exempt a safe dependent
        let err = dims
            .update_dimension("x", DimensionUpdate::new().global_size(5).safety(false))
            .unwrap_err();
        assert_eq!(ErrorCode::LocalExceedsGlobal, err.code);
        assert_eq!(Some("y".to_owned()), err.name);
        assert_eq!(before, dims);
    }

    #[test]
    fn test_update_rechecks_indirect_dependents() {
        let mut dims = DimensionRegistry::new();
        dims.register_dimension("a", 8).unwrap();
        let unsafe_local = DimensionOptions::new().local_size(4).safety(false);
        dims.register_dimension_with("b", "a", unsafe_local).unwrap();
        dims.register_dimension_with("c", "b * 2", DimensionOptions::new().local_size(12)).unwrap();

        let shrink = |n: i64| DimensionUpdate::new().global_size(n).local_size(n).extents(0, n);
        let err = dims.update_dimension("a", shrink(4)).unwrap_err();
        assert_eq!(ErrorCode::LocalExceedsGlobal, err.code);
        assert_eq!(Some("c".to_owned()), err.name);
        assert_eq!(Ok(vec![8, 8, 16]), dims.dim_global_size(["a,b,c"]));

        // dependents that stay within bounds do not block the update
        dims.update_dimension("a", shrink(6)).unwrap();
        assert_eq!(Ok(vec![6, 6, 12]), dims.dim_global_size(["a,b,c"]));
    }

    #[test]
    fn test_update_introducing_cycle_is_rejected() {
        let mut dims = vis_registry();
        let err = dims
            .update_dimension(
                "na",
                DimensionUpdate::new().local_size("nbl + 1").safety(false),
            )
            .unwrap_err();
        assert_eq!(ErrorCode::CircularReference, err.code);
        assert_eq!(&Size::Literal(64), dims.dimension("na").unwrap().local_size());
    }

    #[test]
    fn test_load_resolves_in_any_order() {
        let dims = DimensionRegistry::load([
            ("nvis", Size::from("ntime*nbl"), DimensionOptions::new()),
            ("nbl", Size::from("na*(na-1)//2"), DimensionOptions::new().extents(0, 2016)),
            ("ntime", Size::from(100), DimensionOptions::new().local_size(10)),
            ("na", Size::from(64), DimensionOptions::new().local_size(7)),
        ])
        .unwrap();
        let names: Vec<&str> = dims.dimensions().map(|d| d.name()).collect();
        assert_eq!(vec!["nvis", "nbl", "ntime", "na"], names);
        assert_eq!(Ok(vec![10 * 21, 21]), dims.dim_local_size(["nvis,nbl"]));
        // unset extents follow the resolved local size, explicit ones are kept
        assert_eq!(Ok(vec![(0, 210), (0, 2016), (0, 10)]), dims.dim_extents(["nvis,nbl,ntime"]));
    }

    #[test]
    fn test_load_checks_sizes() {
        let err = DimensionRegistry::load([
            ("nbl", Size::from("na"), DimensionOptions::new().local_size(80)),
            ("na", Size::from(64), DimensionOptions::new()),
        ])
        .unwrap_err();
        assert_eq!(ErrorCode::LocalExceedsGlobal, err.code);
        assert_eq!(Some("nbl".to_owned()), err.name);

        let err = DimensionRegistry::load([
            ("na", Size::from(64), DimensionOptions::new()),
            ("na", Size::from(32), DimensionOptions::new()),
        ])
        .unwrap_err();
        assert_eq!(ErrorKind::DuplicateName, err.kind);

        let dims = DimensionRegistry::load([(
            "na",
            Size::from(64),
            DimensionOptions::new().local_size(80).safety(false),
        )])
        .unwrap();
        assert_eq!(Ok(vec![80]), dims.dim_local_size(["na"]));
    }

    #[test]
    fn test_extent_queries() {
        let mut dims = vis_registry();
        dims.update_dimension(
            "ntime",
            DimensionUpdate::new().local_size(25).extents(50, 75),
        )
        .unwrap();
        assert_eq!(Ok(vec![50, 0]), dims.dim_lower_extent(["ntime,na"]));
        assert_eq!(Ok(vec![75, 64]), dims.dim_upper_extent(["ntime", "na"]));
        assert_eq!(Ok(vec![(50, 75)]), dims.dim_extents(["ntime"]));
        assert_eq!(Ok(vec![25, 128]), dims.dim_extent_size(["ntime", "nchan"]));
    }

    #[test]
    fn test_scope_reads_live_state() {
        let mut dims = vis_registry();
        dims.update_dimension(
            "nchan",
            DimensionUpdate::new().local_size(16).extents(0, 16),
        )
        .unwrap();
        let local = dims.scope(SizeKind::Local);
        assert_eq!(Some(&Size::Literal(16)), local.lookup("nchan"));
        let global = dims.scope(SizeKind::Global);
        assert_eq!(Some(&Size::Literal(128)), global.lookup("nchan"));
        assert_eq!(None, global.lookup("nrow"));
    }
}

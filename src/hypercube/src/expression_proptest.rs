// Copyright 2026 The Hypercube Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Property-based tests for expression evaluation and dimension
//! resolution.

use std::collections::HashMap;

use proptest::prelude::*;

use crate::ast::Expr;
use crate::cube::Hypercube;
use crate::dimensions::{DimensionRegistry, DimensionUpdate};
use crate::expression::{Size, evaluate};
use crate::parser::parse;

fn ident_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,7}".prop_map(|s| s.to_string())
}

fn expr_strategy() -> impl Strategy<Value = String> {
    let leaf = prop_oneof![(0i64..1000).prop_map(|n| n.to_string()), ident_strategy(),];
    leaf.prop_recursive(4, 32, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("{a} + {b}")),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("{a} - {b}")),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("{a}*{b}")),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("{a} // {b}")),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("{a} % {b}")),
            inner.clone().prop_map(|a| format!("-{a}")),
            inner.prop_map(|a| format!("({a})")),
        ]
    })
}

fn empty() -> HashMap<String, Size> {
    HashMap::new()
}

proptest! {
    #[test]
    fn display_reparses_to_same_tree(eqn in expr_strategy()) {
        let ast: Expr = parse(&eqn).unwrap();
        let printed = ast.to_string();
        let reparsed = parse(&printed).unwrap();
        prop_assert_eq!(ast.strip_loc(), reparsed.strip_loc());
    }

    #[test]
    fn floor_div_and_mod_agree(a in -10_000i64..10_000, b in -100i64..100) {
        prop_assume!(b != 0);
        let q = evaluate(&Size::from(format!("{a} // {b}")), &empty()).unwrap();
        let r = evaluate(&Size::from(format!("{a} % {b}")), &empty()).unwrap();
        prop_assert_eq!(a, q * b + r);
        // the remainder takes the sign of the divisor
        prop_assert!(r == 0 || (r < 0) == (b < 0));
        prop_assert!(r.abs() < b.abs());
    }

    #[test]
    fn exact_division_matches_multiplication(a in -1000i64..1000, b in 1i64..100) {
        let product = a * b;
        let q = evaluate(&Size::from(format!("{product} / {b}")), &empty()).unwrap();
        prop_assert_eq!(a, q);
    }

    #[test]
    fn literal_global_size_is_returned(name in ident_strategy(), size in 0i64..1_000_000) {
        let mut dims = DimensionRegistry::new();
        dims.register_dimension(&name, size).unwrap();
        prop_assert_eq!(vec![size], dims.dim_global_size([name.as_str()]).unwrap());
        prop_assert_eq!(vec![size], dims.dim_local_size([name.as_str()]).unwrap());
    }

    #[test]
    fn local_updates_never_touch_global(
        ntime in 1i64..200,
        na in 2i64..100,
        nchan in 1i64..200,
        frac in 0.0f64..=1.0,
    ) {
        let mut dims = DimensionRegistry::new();
        dims.register_dimension("ntime", ntime).unwrap();
        dims.register_dimension("na", na).unwrap();
        dims.register_dimension("nchan", nchan).unwrap();
        dims.register_dimension("nbl", "na*(na-1)//2").unwrap();
        dims.register_dimension("nvis", "ntime*nbl*nchan").unwrap();
        let global_before = dims.dim_global_size_dict().unwrap();

        let local = ((ntime as f64) * frac) as i64;
        dims.update_dimension("ntime", DimensionUpdate::new().local_size(local).extents(0, local))
            .unwrap();

        let nbl = na * (na - 1) / 2;
        prop_assert_eq!(vec![local * nbl * nchan], dims.dim_local_size(["nvis"]).unwrap());
        prop_assert_eq!(global_before, dims.dim_global_size_dict().unwrap());
    }

    #[test]
    fn chunks_tile_the_global_extent(ntime in 0i64..500, chunk in 1i64..64) {
        let mut cube = Hypercube::new("tiles");
        cube.register_dimension("ntime", ntime).unwrap();

        let mut next = 0;
        for c in cube.chunks(&[("ntime", chunk)]).unwrap() {
            let extent = c.extent("ntime").unwrap();
            prop_assert_eq!(next, extent.lower);
            prop_assert!(extent.size() > 0 && extent.size() <= chunk);
            next = extent.upper;
        }
        prop_assert_eq!(ntime, next);
    }
}

//! Dynamic columns: reduced-cost pricing pulls missing variables into the
//! subproblem one by one, and the auxiliary objective pulls them in to
//! recover primal feasibility.

mod common;

use arbor::prelude::*;
use common::drive_logged;

#[test]
fn pricing_introduces_columns_in_reduced_cost_order() {
    // maximise x1 + 4 x2 + 3 x3 subject to x1 + x2 + x3 <= 2, where only
    // x1 is static; with one column priced per round, x2 enters first
    // (reduced cost -3 at the root optimum), then x3
    let params = Params {
        price_max: 1,
        ..Params::default()
    };
    let mut mip = Mip::new(Some("colgen"), ObjDir::Maximize, DenseSimplex::new(), params);
    let mut handles = None;
    let (exit, _) = drive_logged(&mut mip, |ctx| {
        if ctx.event() == Event::Init {
            let x1 = ctx.add_var(
                Some("x1"),
                VarKind::Continuous,
                VarScope::Static,
                Bounds::Double(0.0, 2.0),
                1.0,
                &[],
            );
            let x2 = ctx.add_var(
                Some("x2"),
                VarKind::Continuous,
                VarScope::Dynamic,
                Bounds::Double(0.0, 1.0),
                4.0,
                &[],
            );
            let x3 = ctx.add_var(
                Some("x3"),
                VarKind::Continuous,
                VarScope::Dynamic,
                Bounds::Double(0.0, 2.0),
                3.0,
                &[],
            );
            ctx.add_con(
                Some("cap"),
                Bounds::Upper(2.0),
                &[(x1, 1.0), (x2, 1.0), (x3, 1.0)],
            );
            handles = Some((x1, x2, x3));
        }
    });
    assert_eq!(exit, Exit::Ok);
    let (x1, x2, x3) = handles.unwrap();
    let best = mip.best().expect("an incumbent");
    assert_eq!(best.obj, 7.0);
    assert_eq!(best.var_value(x1), Some(0.0));
    assert_eq!(best.var_value(x2), Some(1.0));
    assert_eq!(best.var_value(x3), Some(1.0));
}

#[test]
fn feasibility_recovery_pulls_in_a_missing_column() {
    // minimise x1 + x2 subject to x1 + x2 >= 2 with x1 in [0, 1] static
    // and x2 dynamic: the root holds x1 only and is primal infeasible
    // until the auxiliary objective prices x2 in
    let mut mip = Mip::new(
        Some("recover"),
        ObjDir::Minimize,
        DenseSimplex::new(),
        Params::default(),
    );
    let mut handles = None;
    let (exit, _) = drive_logged(&mut mip, |ctx| {
        if ctx.event() == Event::Init {
            let x1 = ctx.add_var(
                Some("x1"),
                VarKind::Continuous,
                VarScope::Static,
                Bounds::Double(0.0, 1.0),
                1.0,
                &[],
            );
            let x2 = ctx.add_var(
                Some("x2"),
                VarKind::Continuous,
                VarScope::Dynamic,
                Bounds::Double(0.0, 2.0),
                1.0,
                &[],
            );
            ctx.add_con(Some("demand"), Bounds::Lower(2.0), &[(x1, 1.0), (x2, 1.0)]);
            handles = Some((x1, x2));
        }
    });
    assert_eq!(exit, Exit::Ok);
    let (x1, x2) = handles.unwrap();
    let best = mip.best().expect("an incumbent");
    assert_eq!(best.obj, 2.0);
    assert_eq!(best.var_value(x1), Some(1.0));
    assert_eq!(best.var_value(x2), Some(1.0));
}

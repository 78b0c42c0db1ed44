//! Fathoming paths: an infeasible child, the incumbent cutoff, and the
//! cleanup pass that prunes hopeless branches after a new incumbent.

mod common;

use arbor::prelude::*;
use common::drive_logged;

#[test]
fn covering_pair_settles_at_three() {
    // minimise x + y subject to x + y >= 3 with x, y integer in [0, 2];
    // the integer optimum is 3 and exactly one incumbent is recorded
    let mut mip = Mip::new(
        Some("cover"),
        ObjDir::Minimize,
        DenseSimplex::new(),
        Params::default(),
    );
    let (exit, events) = drive_logged(&mut mip, |ctx| {
        if ctx.event() == Event::Init {
            let x = ctx.add_var(
                Some("x"),
                VarKind::Integer,
                VarScope::Static,
                Bounds::Double(0.0, 2.0),
                1.0,
                &[],
            );
            let y = ctx.add_var(
                Some("y"),
                VarKind::Integer,
                VarScope::Static,
                Bounds::Double(0.0, 2.0),
                1.0,
                &[],
            );
            ctx.add_con(Some("cover"), Bounds::Lower(3.0), &[(x, 1.0), (y, 1.0)]);
        }
    });
    assert_eq!(exit, Exit::Ok);
    let best = mip.best().expect("an incumbent");
    assert_eq!(best.obj, 3.0);
    let sum: f64 = best.cols.iter().map(|&(_, v)| v).sum();
    assert_eq!(sum, 3.0);
    for &(_, v) in &best.cols {
        assert_eq!(v, v.floor());
    }
    let bingos = events.iter().filter(|&&e| e == Event::Bingo).count();
    assert_eq!(bingos, 1);
}

#[test]
fn infeasible_child_is_rejected() {
    // minimise 2x subject to 2x >= 3 with x integer in [0, 2]: the root
    // relaxation sits at x = 1.5, the up branch yields the incumbent 4
    // and the down branch x <= 1 is infeasible
    let mut mip = Mip::new(
        Some("halfline"),
        ObjDir::Minimize,
        DenseSimplex::new(),
        Params::default(),
    );
    let (exit, events) = drive_logged(&mut mip, |ctx| {
        if ctx.event() == Event::Init {
            let x = ctx.add_var(
                Some("x"),
                VarKind::Integer,
                VarScope::Static,
                Bounds::Double(0.0, 2.0),
                2.0,
                &[],
            );
            ctx.add_con(Some("floor"), Bounds::Lower(3.0), &[(x, 2.0)]);
        }
    });
    assert_eq!(exit, Exit::Ok);
    let best = mip.best().expect("an incumbent");
    assert_eq!(best.obj, 4.0);
    assert_eq!(best.cols[0].1, 2.0);
    let bingos = events.iter().filter(|&&e| e == Event::Bingo).count();
    assert_eq!(bingos, 1);
    // root, the integer child, the infeasible child
    let subs = events.iter().filter(|&&e| e == Event::BeginSub).count();
    assert_eq!(subs, 3);
    let rejects = events.iter().filter(|&&e| e == Event::Reject).count();
    assert_eq!(rejects, 1);
}

#[test]
fn cleanup_prunes_hopeless_branches_after_bingo() {
    // with a huge improvement tolerance nothing can beat the first
    // incumbent, so the cleanup pass clears the whole active list and no
    // subproblem is ever selected again
    let params = Params {
        tol_obj: 1.0,
        ..Params::default()
    };
    let mut mip = Mip::new(Some("knap5"), ObjDir::Maximize, DenseSimplex::new(), params);
    let weights = [3.0, 4.0, 5.0, 6.0, 7.0];
    let values = [6.0, 7.0, 9.0, 8.0, 10.0];
    let (exit, events) = drive_logged(&mut mip, |ctx| {
        if ctx.event() == Event::Init {
            let vars: Vec<Var> = values
                .iter()
                .map(|&v| {
                    ctx.add_var(
                        None,
                        VarKind::Integer,
                        VarScope::Static,
                        Bounds::Double(0.0, 1.0),
                        v,
                        &[],
                    )
                })
                .collect();
            let coefs: Vec<(Var, f64)> =
                vars.iter().copied().zip(weights.iter().copied()).collect();
            ctx.add_con(Some("cap"), Bounds::Upper(10.0), &coefs);
        }
    });
    assert_eq!(exit, Exit::Ok);
    assert!(mip.best().is_some());
    let bingo_at = events.iter().position(|&e| e == Event::Bingo).unwrap();
    assert!(events[bingo_at..].iter().all(|&e| e != Event::BeginSub));
    assert_eq!(
        events.iter().filter(|&&e| e == Event::Bingo).count(),
        1
    );
}

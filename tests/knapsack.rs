//! A two-variable integer knapsack driven through the full event loop.

mod common;

use arbor::prelude::*;
use common::drive_logged;

fn solve(params: Params) -> (Exit, Vec<Event>, Mip<DenseSimplex>) {
    let mut mip = Mip::new(Some("knapsack"), ObjDir::Maximize, DenseSimplex::new(), params);
    let mut xy = None;
    let (exit, events) = drive_logged(&mut mip, |ctx| {
        if ctx.event() == Event::Init {
            let x = ctx.add_var(
                Some("x"),
                VarKind::Integer,
                VarScope::Static,
                Bounds::Double(0.0, 2.0),
                3.0,
                &[],
            );
            let y = ctx.add_var(
                Some("y"),
                VarKind::Integer,
                VarScope::Static,
                Bounds::Double(0.0, 2.0),
                5.0,
                &[],
            );
            ctx.add_con(Some("cap"), Bounds::Upper(7.0), &[(x, 2.0), (y, 4.0)]);
            xy = Some((x, y));
        }
    });
    let _ = xy;
    (exit, events, mip)
}

#[test]
fn finds_the_integer_optimum() {
    let (exit, _, mip) = solve(Params::default());
    assert_eq!(exit, Exit::Ok);
    let best = mip.best().expect("an incumbent");
    assert_eq!(best.obj, 8.0);
    let values: Vec<f64> = best.cols.iter().map(|&(_, v)| v).collect();
    assert_eq!(values, vec![1.0, 1.0]);
    // the constraint activity of the incumbent is recorded too
    assert_eq!(best.rows.len(), 1);
    assert_eq!(best.rows[0].1, 6.0);
}

#[test]
fn every_rule_combination_agrees() {
    for &branch_rule in &[BranchRule::First, BranchRule::Last, BranchRule::DriebeekTomlin] {
        for &backtrack_rule in &[
            BacktrackRule::Lifo,
            BacktrackRule::Fifo,
            BacktrackRule::BestProjection,
        ] {
            let params = Params {
                branch_rule,
                backtrack_rule,
                ..Params::default()
            };
            let (exit, _, mip) = solve(params);
            assert_eq!(exit, Exit::Ok, "{:?}/{:?}", branch_rule, backtrack_rule);
            assert_eq!(
                mip.best().unwrap().obj,
                8.0,
                "{:?}/{:?}",
                branch_rule,
                backtrack_rule
            );
        }
    }
}

#[test]
fn event_protocol_is_well_formed() {
    let (exit, events, _) = solve(Params::default());
    assert_eq!(exit, Exit::Ok);
    assert_eq!(events.first(), Some(&Event::Init));
    assert_eq!(events.last(), Some(&Event::Term));
    // solves come in begin/end pairs, and exactly one incumbent appears
    let begins = events.iter().filter(|&&e| e == Event::BeginLp).count();
    let ends = events.iter().filter(|&&e| e == Event::EndLp).count();
    assert_eq!(begins, ends);
    assert!(begins > 0);
    let bingos = events.iter().filter(|&&e| e == Event::Bingo).count();
    assert_eq!(bingos, 1);
    // every subproblem is bracketed by begin and end
    let subs_in = events.iter().filter(|&&e| e == Event::BeginSub).count();
    let subs_out = events.iter().filter(|&&e| e == Event::EndSub).count();
    assert_eq!(subs_in, subs_out);
    // both variables and the constraint are released before termination
    let del_vars = events
        .iter()
        .filter(|e| matches!(e, Event::DelVar(_)))
        .count();
    let del_cons = events
        .iter()
        .filter(|e| matches!(e, Event::DelCon(_)))
        .count();
    assert_eq!(del_vars, 2);
    assert_eq!(del_cons, 1);
}

#[test]
fn incumbents_improve_monotonically() {
    // a five-item binary knapsack explored with the expensive rules
    let params = Params {
        branch_rule: BranchRule::DriebeekTomlin,
        backtrack_rule: BacktrackRule::BestProjection,
        ..Params::default()
    };
    let mut mip = Mip::new(Some("knap5"), ObjDir::Maximize, DenseSimplex::new(), params);
    let weights = [3.0, 4.0, 5.0, 6.0, 7.0];
    let values = [6.0, 7.0, 9.0, 8.0, 10.0];
    let mut incumbents = Vec::new();
    let (exit, _) = drive_logged(&mut mip, |ctx| match ctx.event() {
        Event::Init => {
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
        Event::Bingo => incumbents.push(ctx.incumbent().unwrap().obj),
        _ => {}
    });
    assert_eq!(exit, Exit::Ok);
    assert!(!incumbents.is_empty());
    for pair in incumbents.windows(2) {
        assert!(pair[1] > pair[0], "incumbent got worse: {:?}", incumbents);
    }
    assert_eq!(mip.best().unwrap().obj, 16.0);
}

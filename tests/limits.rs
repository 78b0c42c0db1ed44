//! Cooperative limits: early exits leave the workspace resumable.

mod common;

use arbor::prelude::*;
use common::drive_logged;

fn five_item_knapsack(params: Params) -> Mip<DenseSimplex> {
    Mip::new(Some("knap5"), ObjDir::Maximize, DenseSimplex::new(), params)
}

fn populate(ctx: &mut MipContext<DenseSimplex>) {
    if ctx.event() == Event::Init {
        let weights = [3.0, 4.0, 5.0, 6.0, 7.0];
        let values = [6.0, 7.0, 9.0, 8.0, 10.0];
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
        let coefs: Vec<(Var, f64)> = vars.iter().copied().zip(weights.iter().copied()).collect();
        ctx.add_con(Some("cap"), Bounds::Upper(10.0), &coefs);
    }
}

#[test]
fn subproblem_limit_stops_and_resumes() {
    let params = Params {
        sn_lim: Some(1),
        ..Params::default()
    };
    let mut mip = five_item_knapsack(params);
    let (exit, _) = drive_logged(&mut mip, populate);
    assert_eq!(exit, Exit::SubLimit);
    // the tree survives the early exit; lifting the limit finishes the
    // search from where it stopped
    assert!(mip.active_count() > 0);
    mip.set_sub_limit(None);
    let (exit, _) = drive_logged(&mut mip, populate);
    assert_eq!(exit, Exit::Ok);
    assert_eq!(mip.best().unwrap().obj, 16.0);
}

#[test]
fn iteration_limit_stops_and_resumes() {
    let params = Params {
        it_lim: Some(0),
        ..Params::default()
    };
    let mut mip = five_item_knapsack(params);
    let (exit, _) = drive_logged(&mut mip, populate);
    assert_eq!(exit, Exit::IterLimit);
    mip.set_iter_limit(None);
    let (exit, _) = drive_logged(&mut mip, populate);
    assert_eq!(exit, Exit::Ok);
    assert_eq!(mip.best().unwrap().obj, 16.0);
}

#[test]
fn time_limit_is_respected() {
    let params = Params {
        tm_lim: Some(0.0),
        ..Params::default()
    };
    let mut mip = five_item_knapsack(params);
    let (exit, _) = drive_logged(&mut mip, populate);
    assert_eq!(exit, Exit::TimeLimit);
    mip.set_time_limit(None);
    let (exit, _) = drive_logged(&mut mip, populate);
    assert_eq!(exit, Exit::Ok);
    assert_eq!(mip.best().unwrap().obj, 16.0);
}

use arbor::prelude::*;

/// Run a search and collect the raised events alongside whatever the
/// inner handler does.
#[allow(dead_code)]
pub fn drive_logged<F>(mip: &mut Mip<DenseSimplex>, mut inner: F) -> (Exit, Vec<Event>)
where
    F: FnMut(&mut MipContext<DenseSimplex>),
{
    let mut events = Vec::new();
    let exit = {
        let mut handler = |ctx: &mut MipContext<DenseSimplex>| {
            events.push(ctx.event());
            inner(ctx);
        };
        mip.drive(&mut handler)
    };
    (exit, events)
}

/// Build a [`Problem`] from explicit data, solve its LP relaxation with
/// the reference engine, and fill in the optimal basis, so the result is
/// ready for [`Mip::with_problem`].
#[allow(dead_code)]
pub fn solved_problem(
    name: &str,
    dir: ObjDir,
    rows: &[(Bounds,)],
    cols: &[(VarKind, Bounds, f64, &[(usize, f64)])],
) -> anyhow::Result<Problem> {
    let mut lp = DenseSimplex::new();
    lp.set_dir(dir);
    lp.add_rows(rows.len());
    lp.add_cols(cols.len());
    for (i, &(bounds,)) in rows.iter().enumerate() {
        lp.set_row_bounds(i, bounds);
    }
    for (j, &(_, bounds, obj, coefs)) in cols.iter().enumerate() {
        lp.set_col_bounds(j, bounds);
        lp.set_col_obj(j, obj);
        lp.set_mat_col(j, coefs);
    }
    let out = lp.simplex(&SimplexControl::default())?;
    anyhow::ensure!(out == arbor::SolveOutcome::Ok, "relaxation hit a limit");
    anyhow::ensure!(lp.status() == LpStatus::Optimal, "relaxation not optimal");
    Ok(Problem {
        name: Some(name.to_owned()),
        dir,
        obj_const: 0.0,
        rows: rows
            .iter()
            .enumerate()
            .map(|(i, &(bounds,))| ProblemRow {
                name: None,
                bounds,
                stat: lp.row_info(i).0,
            })
            .collect(),
        cols: cols
            .iter()
            .enumerate()
            .map(|(j, &(kind, bounds, obj, coefs))| ProblemCol {
                name: None,
                kind,
                bounds,
                obj,
                coefs: coefs.to_vec(),
                stat: lp.col_info(j).0,
            })
            .collect(),
        status: lp.status(),
        obj_val: lp.obj_val(),
    })
}

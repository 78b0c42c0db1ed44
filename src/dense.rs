//! A dense bounded-variable simplex solver implementing [`LpEngine`].
//!
//! This is the crate's reference engine: a two-phase primal simplex with a
//! dense basis inverse, refactorised at every pivot, using Bland's rule
//! throughout. It is deliberately simple and meant for small problems and
//! the test-suite; production embeddings are expected to plug a real
//! solver in behind the [`LpEngine`] trait. The dual-simplex preference in
//! [`SimplexControl`] is ignored.
//!
//! The problem is held in the usual augmented form: each row `i` owns an
//! auxiliary variable equal to the row activity, so the constraint system
//! reads `x_aux[i] - sum_j a[i][j] * x_struct[j] = 0` and every variable,
//! auxiliary or structural, carries bounds, an objective coefficient and a
//! basis status.

use crate::constants::{BasisStatus, Bounds, LpStatus, ObjDir, SolveOutcome};
use crate::engine::{LpEngine, RatioDir, SimplexControl, VarRef};
use crate::{Error, Result};

const FEAS_TOL: f64 = 1e-9;
const DUAL_TOL: f64 = 1e-9;
const PIVOT_TOL: f64 = 1e-10;
const DROP_TOL: f64 = 1e-11;

#[derive(Debug, Clone)]
struct Var {
    name: Option<String>,
    bounds: Bounds,
    obj: f64,
    stat: BasisStatus,
}

impl Var {
    fn new_row() -> Var {
        Var {
            name: None,
            bounds: Bounds::Free,
            obj: 0.0,
            stat: BasisStatus::Basic,
        }
    }

    fn new_col() -> Var {
        Var {
            name: None,
            bounds: Bounds::Fixed(0.0),
            obj: 0.0,
            stat: BasisStatus::NonbasicFixed,
        }
    }
}

/// The bundled dense reference implementation of [`LpEngine`].
pub struct DenseSimplex {
    name: Option<String>,
    dir: ObjDir,
    c0: f64,
    rows: Vec<Var>,
    cols: Vec<Var>,
    /// Constraint coefficients per row, as `(column, value)` pairs.
    mat: Vec<Vec<(usize, f64)>>,
    /// Basic variables by basis position, and the dense basis inverse.
    basis: Vec<usize>,
    binv: Vec<Vec<f64>>,
    /// Primal values and reduced costs for all `m + n` variables.
    prim: Vec<f64>,
    dual: Vec<f64>,
    sol: LpStatus,
    obj: f64,
    iters: u64,
}

impl Default for DenseSimplex {
    fn default() -> DenseSimplex {
        DenseSimplex::new()
    }
}

impl DenseSimplex {
    pub fn new() -> DenseSimplex {
        DenseSimplex {
            name: None,
            dir: ObjDir::Minimize,
            c0: 0.0,
            rows: Vec::new(),
            cols: Vec::new(),
            mat: Vec::new(),
            basis: Vec::new(),
            binv: Vec::new(),
            prim: Vec::new(),
            dual: Vec::new(),
            sol: LpStatus::Undefined,
            obj: 0.0,
            iters: 0,
        }
    }

    fn m(&self) -> usize {
        self.rows.len()
    }

    fn n(&self) -> usize {
        self.cols.len()
    }

    fn var(&self, k: usize) -> &Var {
        let m = self.m();
        if k < m {
            &self.rows[k]
        } else {
            &self.cols[k - m]
        }
    }

    fn var_mut(&mut self, k: usize) -> &mut Var {
        let m = self.m();
        if k < m {
            &mut self.rows[k]
        } else {
            &mut self.cols[k - m]
        }
    }

    /// Column of the augmented constraint matrix for variable `k`: the
    /// identity column for an auxiliary variable, the negated matrix
    /// column for a structural one.
    fn gcol(&self, k: usize) -> Vec<f64> {
        let m = self.m();
        let mut col = vec![0.0; m];
        if k < m {
            col[k] = 1.0;
        } else {
            let j = k - m;
            for (i, row) in self.mat.iter().enumerate() {
                for &(jj, v) in row {
                    if jj == j {
                        col[i] = -v;
                    }
                }
            }
        }
        col
    }

    /// Value a non-basic variable takes, determined by its status.
    fn nb_value(&self, k: usize) -> f64 {
        let v = self.var(k);
        match v.stat {
            BasisStatus::Basic => unreachable!(),
            BasisStatus::NonbasicLower => v.bounds.lb().unwrap_or(0.0),
            BasisStatus::NonbasicUpper => v.bounds.ub().unwrap_or(0.0),
            BasisStatus::NonbasicFree => 0.0,
            BasisStatus::NonbasicFixed => v.bounds.lb().unwrap_or(0.0),
        }
    }

    /// Invert the basis matrix by Gauss-Jordan elimination with partial
    /// pivoting. `None` means the basis is singular.
    fn factorize(&self, basis: &[usize]) -> Option<Vec<Vec<f64>>> {
        let m = self.m();
        debug_assert_eq!(basis.len(), m);
        // work = [B | I], reduced in place
        let mut work: Vec<Vec<f64>> = vec![vec![0.0; 2 * m]; m];
        for (r, &k) in basis.iter().enumerate() {
            let col = self.gcol(k);
            for i in 0..m {
                work[i][r] = col[i];
            }
        }
        for i in 0..m {
            work[i][m + i] = 1.0;
        }
        for p in 0..m {
            let mut best = p;
            for i in p + 1..m {
                if work[i][p].abs() > work[best][p].abs() {
                    best = i;
                }
            }
            if work[best][p].abs() < PIVOT_TOL {
                return None;
            }
            work.swap(p, best);
            let piv = work[p][p];
            for x in work[p].iter_mut() {
                *x /= piv;
            }
            for i in 0..m {
                if i != p {
                    let f = work[i][p];
                    if f != 0.0 {
                        for c in 0..2 * m {
                            work[i][c] -= f * work[p][c];
                        }
                    }
                }
            }
        }
        Some(work.into_iter().map(|r| r[m..].to_vec()).collect())
    }

    /// Reset to the all-slack basis: every auxiliary variable basic and
    /// every structural variable non-basic at its default bound.
    fn slack_basis(&mut self) {
        for v in self.rows.iter_mut() {
            v.stat = BasisStatus::Basic;
        }
        for v in self.cols.iter_mut() {
            v.stat = BasisStatus::NonbasicLower.normalized_for(v.bounds);
        }
    }

    /// Collect the basic variables in ordinal order and factorise; falls
    /// back to the slack basis if the assigned statuses do not form an
    /// invertible basis.
    fn ensure_basis(&mut self) {
        let m = self.m();
        let total = m + self.n();
        let mut basis: Vec<usize> =
            (0..total).filter(|&k| self.var(k).stat == BasisStatus::Basic).collect();
        if basis.len() != m {
            self.slack_basis();
            basis = (0..m).collect();
        }
        match self.factorize(&basis) {
            Some(binv) => {
                self.basis = basis;
                self.binv = binv;
            }
            None => {
                self.slack_basis();
                self.basis = (0..m).collect();
                self.binv = self.factorize(&self.basis).expect("slack basis is singular");
            }
        }
    }

    /// Recompute primal values, reduced costs and the objective for the
    /// factorised basis.
    fn compute(&mut self) {
        let m = self.m();
        let total = m + self.n();
        let mut prim = vec![0.0; total];
        let mut rhs = vec![0.0; m];
        for k in 0..total {
            if self.var(k).stat != BasisStatus::Basic {
                let x = self.nb_value(k);
                prim[k] = x;
                if x != 0.0 {
                    let col = self.gcol(k);
                    for i in 0..m {
                        rhs[i] -= col[i] * x;
                    }
                }
            }
        }
        for (r, &k) in self.basis.iter().enumerate() {
            let mut x = 0.0;
            for i in 0..m {
                x += self.binv[r][i] * rhs[i];
            }
            prim[k] = x;
        }
        let cb: Vec<f64> = self.basis.iter().map(|&k| self.var(k).obj).collect();
        let mut pi = vec![0.0; m];
        for i in 0..m {
            for r in 0..m {
                pi[i] += self.binv[r][i] * cb[r];
            }
        }
        let mut dual = vec![0.0; total];
        for k in 0..total {
            if self.var(k).stat != BasisStatus::Basic {
                let col = self.gcol(k);
                let mut d = self.var(k).obj;
                for i in 0..m {
                    d -= pi[i] * col[i];
                }
                dual[k] = d;
            }
        }
        let mut obj = self.c0;
        for k in 0..total {
            obj += self.var(k).obj * prim[k];
        }
        self.prim = prim;
        self.dual = dual;
        self.obj = obj;
    }

    /// Reduced costs of the non-basic variables against an arbitrary cost
    /// vector over the basic variables only (the phase-one costs put zero
    /// on every non-basic variable).
    fn phase1_duals(&self, cb: &[f64]) -> Vec<f64> {
        let m = self.m();
        let total = m + self.n();
        let mut pi = vec![0.0; m];
        for i in 0..m {
            for r in 0..m {
                pi[i] += self.binv[r][i] * cb[r];
            }
        }
        let mut dual = vec![0.0; total];
        for k in 0..total {
            if self.var(k).stat != BasisStatus::Basic {
                let col = self.gcol(k);
                let mut d = 0.0;
                for i in 0..m {
                    d -= pi[i] * col[i];
                }
                dual[k] = d;
            }
        }
        dual
    }

    fn feas_eps(bound: f64) -> f64 {
        FEAS_TOL * (1.0 + bound.abs())
    }

    /// Bound violation of a basic variable: negative when below its lower
    /// bound, positive when above its upper bound, zero when feasible.
    fn violation(&self, k: usize) -> f64 {
        let x = self.prim[k];
        let b = self.var(k).bounds;
        if let Some(lb) = b.lb() {
            if x < lb - Self::feas_eps(lb) {
                return x - lb;
            }
        }
        if let Some(ub) = b.ub() {
            if x > ub + Self::feas_eps(ub) {
                return x - ub;
            }
        }
        0.0
    }

    /// Pick the Bland entering variable for the given reduced costs and
    /// objective sign. Returns the variable and its direction of change.
    fn entering(&self, dual: &[f64], s: f64) -> Option<(usize, f64)> {
        let total = self.m() + self.n();
        for k in 0..total {
            let stat = self.var(k).stat;
            let d = s * dual[k];
            match stat {
                BasisStatus::Basic | BasisStatus::NonbasicFixed => {}
                BasisStatus::NonbasicLower => {
                    if d < -DUAL_TOL {
                        return Some((k, 1.0));
                    }
                }
                BasisStatus::NonbasicUpper => {
                    if d > DUAL_TOL {
                        return Some((k, -1.0));
                    }
                }
                BasisStatus::NonbasicFree => {
                    if d < -DUAL_TOL {
                        return Some((k, 1.0));
                    }
                    if d > DUAL_TOL {
                        return Some((k, -1.0));
                    }
                }
            }
        }
        None
    }

    /// Primal ratio test. Returns the step length together with the
    /// blocking change: `None` for a bound flip of the entering variable,
    /// `Some((r, stat))` when basis position `r` leaves with the given
    /// status. During phase one a violated basic variable blocks at the
    /// bound it violates.
    #[allow(clippy::type_complexity)]
    fn ratio_test(
        &self,
        e: usize,
        edir: f64,
        w: &[f64],
        phase1: bool,
    ) -> Option<(f64, Option<(usize, BasisStatus)>)> {
        let mut t_min = f64::INFINITY;
        let mut block: Option<Option<(usize, BasisStatus)>> = None;
        for (r, &k) in self.basis.iter().enumerate() {
            let rate = -edir * w[r];
            if rate.abs() < PIVOT_TOL {
                continue;
            }
            let x = self.prim[k];
            let b = self.var(k).bounds;
            let viol = if phase1 { self.violation(k) } else { 0.0 };
            let leave_stat = |bound_is_lower: bool| {
                if let Bounds::Fixed(_) = b {
                    BasisStatus::NonbasicFixed
                } else if bound_is_lower {
                    BasisStatus::NonbasicLower
                } else {
                    BasisStatus::NonbasicUpper
                }
            };
            let candidate = if rate > 0.0 {
                // moving up: a variable below its lower bound blocks
                // there, anything else blocks at its upper bound
                if viol < 0.0 {
                    b.lb().map(|lb| ((lb - x) / rate, leave_stat(true)))
                } else {
                    b.ub().map(|ub| ((ub - x) / rate, leave_stat(false)))
                }
            } else {
                // moving down
                if viol > 0.0 {
                    b.ub().map(|ub| ((x - ub) / -rate, leave_stat(false)))
                } else {
                    b.lb().map(|lb| ((x - lb) / -rate, leave_stat(true)))
                }
            };
            if let Some((t, stat)) = candidate {
                let t = t.max(0.0);
                if t < t_min {
                    t_min = t;
                    block = Some(Some((r, stat)));
                }
            }
        }
        // the entering variable itself can run into its opposite bound
        if let (Some(lb), Some(ub)) = (self.var(e).bounds.lb(), self.var(e).bounds.ub()) {
            let t = ub - lb;
            if t < t_min {
                t_min = t;
                block = Some(None);
            }
        }
        block.map(|b| (t_min, b))
    }

    fn pivot(&mut self, e: usize, change: Option<(usize, BasisStatus)>) -> Result<()> {
        match change {
            None => {
                // bound flip
                let v = self.var_mut(e);
                v.stat = match v.stat {
                    BasisStatus::NonbasicLower => BasisStatus::NonbasicUpper,
                    BasisStatus::NonbasicUpper => BasisStatus::NonbasicLower,
                    s => s,
                };
            }
            Some((r, stat)) => {
                let leaving = self.basis[r];
                self.var_mut(leaving).stat = stat;
                self.var_mut(e).stat = BasisStatus::Basic;
                self.basis[r] = e;
                self.binv = self
                    .factorize(&self.basis)
                    .ok_or_else(|| Error::LpEngine("singular basis after pivot".to_owned()))?;
            }
        }
        self.iters += 1;
        Ok(())
    }

    /// Name assigned to the problem, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Name assigned to a row, if any.
    pub fn row_name(&self, i: usize) -> Option<&str> {
        self.rows[i].name.as_deref()
    }

    /// Name assigned to a column, if any.
    pub fn col_name(&self, j: usize) -> Option<&str> {
        self.cols[j].name.as_deref()
    }
}

impl LpEngine for DenseSimplex {
    fn set_name(&mut self, name: Option<&str>) {
        self.name = name.map(str::to_owned);
    }

    fn set_dir(&mut self, dir: ObjDir) {
        self.dir = dir;
    }

    fn dir(&self) -> ObjDir {
        self.dir
    }

    fn num_rows(&self) -> usize {
        self.m()
    }

    fn num_cols(&self) -> usize {
        self.n()
    }

    fn add_rows(&mut self, n: usize) {
        for _ in 0..n {
            self.rows.push(Var::new_row());
            self.mat.push(Vec::new());
        }
        self.sol = LpStatus::Undefined;
    }

    fn add_cols(&mut self, n: usize) {
        for _ in 0..n {
            self.cols.push(Var::new_col());
        }
        self.sol = LpStatus::Undefined;
    }

    fn del_rows(&mut self, delete: &[bool]) {
        assert_eq!(delete.len(), self.m());
        let mut i = 0;
        self.rows.retain(|_| {
            let keep = !delete[i];
            i += 1;
            keep
        });
        let mut i = 0;
        self.mat.retain(|_| {
            let keep = !delete[i];
            i += 1;
            keep
        });
        self.sol = LpStatus::Undefined;
    }

    fn del_cols(&mut self, delete: &[bool]) {
        assert_eq!(delete.len(), self.n());
        let mut remap = vec![usize::MAX; delete.len()];
        let mut next = 0;
        for (j, &d) in delete.iter().enumerate() {
            if !d {
                remap[j] = next;
                next += 1;
            }
        }
        let mut j = 0;
        self.cols.retain(|_| {
            let keep = !delete[j];
            j += 1;
            keep
        });
        for row in self.mat.iter_mut() {
            row.retain(|&(j, _)| remap[j] != usize::MAX);
            for cell in row.iter_mut() {
                cell.0 = remap[cell.0];
            }
        }
        self.sol = LpStatus::Undefined;
    }

    fn set_row_name(&mut self, i: usize, name: Option<&str>) {
        self.rows[i].name = name.map(str::to_owned);
    }

    fn set_col_name(&mut self, j: usize, name: Option<&str>) {
        self.cols[j].name = name.map(str::to_owned);
    }

    fn set_row_bounds(&mut self, i: usize, bounds: Bounds) {
        let v = &mut self.rows[i];
        v.bounds = bounds;
        v.stat = v.stat.normalized_for(bounds);
        self.sol = LpStatus::Undefined;
    }

    fn set_col_bounds(&mut self, j: usize, bounds: Bounds) {
        let v = &mut self.cols[j];
        v.bounds = bounds;
        v.stat = v.stat.normalized_for(bounds);
        self.sol = LpStatus::Undefined;
    }

    fn row_bounds(&self, i: usize) -> Bounds {
        self.rows[i].bounds
    }

    fn col_bounds(&self, j: usize) -> Bounds {
        self.cols[j].bounds
    }

    fn set_obj_const(&mut self, c0: f64) {
        self.c0 = c0;
    }

    fn obj_const(&self) -> f64 {
        self.c0
    }

    fn set_row_obj(&mut self, i: usize, coef: f64) {
        self.rows[i].obj = coef;
    }

    fn set_col_obj(&mut self, j: usize, coef: f64) {
        self.cols[j].obj = coef;
    }

    fn row_obj(&self, i: usize) -> f64 {
        self.rows[i].obj
    }

    fn col_obj(&self, j: usize) -> f64 {
        self.cols[j].obj
    }

    fn set_row_stat(&mut self, i: usize, stat: BasisStatus) {
        self.rows[i].stat = stat.normalized_for(self.rows[i].bounds);
    }

    fn set_col_stat(&mut self, j: usize, stat: BasisStatus) {
        self.cols[j].stat = stat.normalized_for(self.cols[j].bounds);
    }

    fn set_mat_row(&mut self, i: usize, coefs: &[(usize, f64)]) {
        let n = self.n();
        for &(j, v) in coefs {
            assert!(j < n, "set_mat_row: column ordinal {} out of range", j);
            assert!(v != 0.0, "set_mat_row: zero coefficient");
        }
        self.mat[i] = coefs.to_vec();
        self.sol = LpStatus::Undefined;
    }

    fn set_mat_col(&mut self, j: usize, coefs: &[(usize, f64)]) {
        let m = self.m();
        for &(i, v) in coefs {
            assert!(i < m, "set_mat_col: row ordinal {} out of range", i);
            assert!(v != 0.0, "set_mat_col: zero coefficient");
        }
        for row in self.mat.iter_mut() {
            row.retain(|&(jj, _)| jj != j);
        }
        for &(i, v) in coefs {
            self.mat[i].push((j, v));
        }
        self.sol = LpStatus::Undefined;
    }

    fn clear_mat(&mut self) {
        for row in self.mat.iter_mut() {
            row.clear();
        }
        self.sol = LpStatus::Undefined;
    }

    fn warm_up(&mut self) -> Result<()> {
        self.ensure_basis();
        self.compute();
        Ok(())
    }

    fn simplex(&mut self, ctl: &SimplexControl) -> Result<SolveOutcome> {
        self.ensure_basis();
        self.compute();
        let m = self.m();
        let total = m + self.n();
        let budget = ctl.iter_limit;
        let mut used = 0u64;
        // phase one: drive the sum of primal infeasibilities to zero
        loop {
            let infeasible: Vec<usize> =
                (0..total).filter(|&k| self.violation(k) != 0.0).collect();
            if infeasible.is_empty() {
                break;
            }
            let mut cb = vec![0.0; m];
            for (r, &k) in self.basis.iter().enumerate() {
                let v = self.violation(k);
                if v < 0.0 {
                    cb[r] = -1.0;
                } else if v > 0.0 {
                    cb[r] = 1.0;
                }
            }
            let dual = self.phase1_duals(&cb);
            let (e, edir) = match self.entering(&dual, 1.0) {
                Some(p) => p,
                None => {
                    // no way to reduce the infeasibility sum
                    self.sol = LpStatus::Infeasible;
                    self.compute();
                    return Ok(SolveOutcome::Ok);
                }
            };
            if budget.map_or(false, |lim| used >= lim) {
                self.sol = LpStatus::Undefined;
                return Ok(SolveOutcome::IterLimit);
            }
            let col = self.gcol(e);
            let mut w = vec![0.0; m];
            for r in 0..m {
                for i in 0..m {
                    w[r] += self.binv[r][i] * col[i];
                }
            }
            let (_, change) = self
                .ratio_test(e, edir, &w, true)
                .ok_or_else(|| Error::LpEngine("phase one is unbounded".to_owned()))?;
            self.pivot(e, change)?;
            used += 1;
            self.compute();
        }
        // phase two: optimise the true objective
        let s = self.dir.sign();
        loop {
            let dual = self.dual.clone();
            let (e, edir) = match self.entering(&dual, s) {
                Some(p) => p,
                None => {
                    self.sol = LpStatus::Optimal;
                    let out = if self.obj > ctl.obj_upper {
                        SolveOutcome::ObjUpperLimit
                    } else if self.obj < ctl.obj_lower {
                        SolveOutcome::ObjLowerLimit
                    } else {
                        SolveOutcome::Ok
                    };
                    return Ok(out);
                }
            };
            if budget.map_or(false, |lim| used >= lim) {
                self.sol = LpStatus::Undefined;
                return Ok(SolveOutcome::IterLimit);
            }
            let col = self.gcol(e);
            let mut w = vec![0.0; m];
            for r in 0..m {
                for i in 0..m {
                    w[r] += self.binv[r][i] * col[i];
                }
            }
            let (_, change) = self
                .ratio_test(e, edir, &w, false)
                .ok_or_else(|| Error::LpEngine("problem is unbounded".to_owned()))?;
            // a pivot can re-introduce a bound violation only through
            // roundoff; phase one would catch it on the next solve
            self.pivot(e, change)?;
            used += 1;
            self.compute();
        }
    }

    fn status(&self) -> LpStatus {
        self.sol
    }

    fn obj_val(&self) -> f64 {
        self.obj
    }

    fn row_info(&self, i: usize) -> (BasisStatus, f64, f64) {
        (self.rows[i].stat, self.prim[i], self.dual[i])
    }

    fn col_info(&self, j: usize) -> (BasisStatus, f64, f64) {
        let m = self.m();
        (self.cols[j].stat, self.prim[m + j], self.dual[m + j])
    }

    fn iter_count(&self) -> u64 {
        self.iters
    }

    fn eval_tab_row(&self, var: VarRef) -> Vec<(VarRef, f64)> {
        let m = self.m();
        let k = match var {
            VarRef::Aux(i) => i,
            VarRef::Struct(j) => m + j,
        };
        let r = self
            .basis
            .iter()
            .position(|&b| b == k)
            .expect("eval_tab_row: variable is not basic");
        let total = m + self.n();
        let mut out = Vec::new();
        for q in 0..total {
            if self.var(q).stat == BasisStatus::Basic {
                continue;
            }
            let col = self.gcol(q);
            let mut alfa = 0.0;
            for i in 0..m {
                alfa -= self.binv[r][i] * col[i];
            }
            if alfa.abs() > DROP_TOL {
                let vref = if q < m {
                    VarRef::Aux(q)
                } else {
                    VarRef::Struct(q - m)
                };
                out.push((vref, alfa));
            }
        }
        out
    }

    fn dual_ratio_test(&self, row: &[(VarRef, f64)], dir: RatioDir, tol: f64) -> Option<VarRef> {
        let m = self.m();
        let dj_sign = match dir {
            RatioDir::Decrease => -1.0,
            RatioDir::Increase => 1.0,
        };
        let mut best: Option<(f64, VarRef)> = None;
        for &(q, alfa) in row {
            if alfa.abs() < tol {
                continue;
            }
            let k = match q {
                VarRef::Aux(i) => i,
                VarRef::Struct(j) => m + j,
            };
            let stat = self.var(k).stat;
            // the entering variable must be able to move in the direction
            // the pivot pushes it
            let dq_sign = dj_sign * alfa.signum();
            let eligible = match stat {
                BasisStatus::Basic | BasisStatus::NonbasicFixed => false,
                BasisStatus::NonbasicLower => dq_sign > 0.0,
                BasisStatus::NonbasicUpper => dq_sign < 0.0,
                BasisStatus::NonbasicFree => true,
            };
            if !eligible {
                continue;
            }
            let ratio = self.dual[k].abs() / alfa.abs();
            if best.map_or(true, |(r, _)| ratio < r) {
                best = Some((ratio, q));
            }
        }
        best.map(|(_, q)| q)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-7, "{} != {}", a, b);
    }

    /// min -2x - 3y - 4z subject to 3x + 2y + z <= 10, 2x + 5y + 3z <= 15
    /// with x, y, z >= 0; the optimum is -20 at z = 5.
    fn sample() -> DenseSimplex {
        let mut lp = DenseSimplex::new();
        lp.set_dir(ObjDir::Minimize);
        lp.add_rows(2);
        lp.add_cols(3);
        lp.set_row_bounds(0, Bounds::Upper(10.0));
        lp.set_row_bounds(1, Bounds::Upper(15.0));
        for j in 0..3 {
            lp.set_col_bounds(j, Bounds::Lower(0.0));
        }
        lp.set_col_obj(0, -2.0);
        lp.set_col_obj(1, -3.0);
        lp.set_col_obj(2, -4.0);
        lp.set_mat_row(0, &[(0, 3.0), (1, 2.0), (2, 1.0)]);
        lp.set_mat_row(1, &[(0, 2.0), (1, 5.0), (2, 3.0)]);
        lp
    }

    #[test]
    fn solves_to_optimality() {
        let mut lp = sample();
        assert_eq!(lp.simplex(&SimplexControl::default()).unwrap(), SolveOutcome::Ok);
        assert_eq!(lp.status(), LpStatus::Optimal);
        approx(lp.obj_val(), -20.0);
        approx(lp.col_info(2).1, 5.0);
        approx(lp.col_info(0).1, 0.0);
        approx(lp.col_info(1).1, 0.0);
    }

    #[test]
    fn maximisation_with_double_bounds() {
        // max 3x + 5y subject to 2x + 4y <= 7, x and y in [0, 2]
        let mut lp = DenseSimplex::new();
        lp.set_dir(ObjDir::Maximize);
        lp.add_rows(1);
        lp.add_cols(2);
        lp.set_row_bounds(0, Bounds::Upper(7.0));
        lp.set_col_bounds(0, Bounds::Double(0.0, 2.0));
        lp.set_col_bounds(1, Bounds::Double(0.0, 2.0));
        lp.set_col_obj(0, 3.0);
        lp.set_col_obj(1, 5.0);
        lp.set_mat_row(0, &[(0, 2.0), (1, 4.0)]);
        assert_eq!(lp.simplex(&SimplexControl::default()).unwrap(), SolveOutcome::Ok);
        assert_eq!(lp.status(), LpStatus::Optimal);
        approx(lp.obj_val(), 9.75);
        approx(lp.col_info(0).1, 2.0);
        approx(lp.col_info(1).1, 0.75);
        // reduced costs at a maximum: non-basic at lower would worsen
        assert_eq!(lp.col_info(1).0, BasisStatus::Basic);
    }

    #[test]
    fn detects_infeasibility() {
        // x + y >= 3 with x, y in [0, 1]
        let mut lp = DenseSimplex::new();
        lp.add_rows(1);
        lp.add_cols(2);
        lp.set_row_bounds(0, Bounds::Lower(3.0));
        lp.set_col_bounds(0, Bounds::Double(0.0, 1.0));
        lp.set_col_bounds(1, Bounds::Double(0.0, 1.0));
        lp.set_col_obj(0, 1.0);
        lp.set_col_obj(1, 1.0);
        lp.set_mat_row(0, &[(0, 1.0), (1, 1.0)]);
        assert_eq!(lp.simplex(&SimplexControl::default()).unwrap(), SolveOutcome::Ok);
        assert_eq!(lp.status(), LpStatus::Infeasible);
    }

    #[test]
    fn warm_resolve_after_bound_change() {
        let mut lp = DenseSimplex::new();
        lp.set_dir(ObjDir::Maximize);
        lp.add_rows(1);
        lp.add_cols(2);
        lp.set_row_bounds(0, Bounds::Upper(7.0));
        lp.set_col_bounds(0, Bounds::Double(0.0, 2.0));
        lp.set_col_bounds(1, Bounds::Double(0.0, 2.0));
        lp.set_col_obj(0, 3.0);
        lp.set_col_obj(1, 5.0);
        lp.set_mat_row(0, &[(0, 2.0), (1, 4.0)]);
        lp.simplex(&SimplexControl::default()).unwrap();
        // tighten x and re-solve from the previous basis
        lp.set_col_bounds(0, Bounds::Double(0.0, 1.0));
        lp.simplex(&SimplexControl::default()).unwrap();
        assert_eq!(lp.status(), LpStatus::Optimal);
        approx(lp.obj_val(), 3.0 + 5.0 * 1.25);
        approx(lp.col_info(0).1, 1.0);
        approx(lp.col_info(1).1, 1.25);
    }

    #[test]
    fn objective_cutoff_is_reported() {
        let mut lp = sample();
        let ctl = SimplexControl {
            obj_lower: -15.0,
            ..SimplexControl::default()
        };
        // the optimum of -20 undercuts the limit
        assert_eq!(lp.simplex(&ctl).unwrap(), SolveOutcome::ObjLowerLimit);
        assert_eq!(lp.status(), LpStatus::Optimal);
    }

    #[test]
    fn iteration_budget_is_respected() {
        let mut lp = sample();
        let ctl = SimplexControl {
            iter_limit: Some(0),
            ..SimplexControl::default()
        };
        assert_eq!(lp.simplex(&ctl).unwrap(), SolveOutcome::IterLimit);
    }

    #[test]
    fn tableau_row_expresses_basic_variable() {
        let mut lp = sample();
        lp.simplex(&SimplexControl::default()).unwrap();
        // z is basic at the optimum; its tableau row must reproduce its
        // value from the non-basic variables
        let row = lp.eval_tab_row(VarRef::Struct(2));
        assert!(!row.is_empty());
        let mut x = 0.0;
        for &(q, alfa) in &row {
            let k = match q {
                VarRef::Aux(i) => i,
                VarRef::Struct(j) => lp.m() + j,
            };
            x += alfa * lp.prim[k];
        }
        approx(x, lp.col_info(2).1);
    }

    #[test]
    fn dual_ratio_test_picks_a_compensating_variable() {
        let mut lp = sample();
        lp.simplex(&SimplexControl::default()).unwrap();
        let row = lp.eval_tab_row(VarRef::Struct(2));
        let down = lp.dual_ratio_test(&row, RatioDir::Decrease, 1e-8);
        let up = lp.dual_ratio_test(&row, RatioDir::Increase, 1e-8);
        assert!(down.is_some() || up.is_some());
    }
}

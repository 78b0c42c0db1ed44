//! The contract between the enumeration machinery and an LP solver.
//!
//! The tree owns exactly one object implementing [`LpEngine`] and mirrors
//! the current subproblem into it. Any simplex-based solver that supports
//! warm starts, incremental row/column edits and basic-solution queries can
//! sit behind this trait; [`DenseSimplex`](crate::dense::DenseSimplex) is
//! the bundled reference implementation.

use crate::constants::{BasisStatus, Bounds, LpStatus, ObjDir, SolveOutcome};
use crate::Result;

/// Reference to a variable of the LP: the auxiliary (activity) variable of
/// a row, or the structural variable of a column. Ordinals are 0-based.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum VarRef {
    /// Auxiliary variable of the row with the given ordinal.
    Aux(usize),
    /// Structural variable of the column with the given ordinal.
    Struct(usize),
}

/// Direction in which a basic variable is forced out of the basis by the
/// dual ratio test.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RatioDir {
    /// The basic variable must decrease to reach a new upper bound.
    Decrease,
    /// The basic variable must increase to reach a new lower bound.
    Increase,
}

/// Per-solve control settings for [`LpEngine::simplex`].
#[derive(Debug, Clone)]
pub struct SimplexControl {
    /// Stop early once the objective falls below this value while still
    /// improving.
    pub obj_lower: f64,
    /// Stop early once the objective rises above this value while still
    /// improving.
    pub obj_upper: f64,
    /// Remaining simplex iteration budget, if any.
    pub iter_limit: Option<u64>,
    /// Prefer the dual simplex; the starting basis is assumed dual
    /// feasible. Engines without a dual simplex may ignore this.
    pub use_dual: bool,
}

impl Default for SimplexControl {
    fn default() -> SimplexControl {
        SimplexControl {
            obj_lower: f64::NEG_INFINITY,
            obj_upper: f64::INFINITY,
            iter_limit: None,
            use_dual: false,
        }
    }
}

/// A linear-programming solver holding one problem instance.
///
/// Ordinals are dense and 0-based. Deleting rows or columns renumbers the
/// survivors while preserving their relative order. All setter indices
/// must be in range; passing an out-of-range ordinal is a caller bug and
/// implementations are free to panic on it.
pub trait LpEngine {
    /// Assign or clear the problem name.
    fn set_name(&mut self, name: Option<&str>);

    /// Set the optimisation direction.
    fn set_dir(&mut self, dir: ObjDir);

    /// The optimisation direction.
    fn dir(&self) -> ObjDir;

    /// Number of rows currently in the problem.
    fn num_rows(&self) -> usize;

    /// Number of columns currently in the problem.
    fn num_cols(&self) -> usize;

    /// Append `n` empty free rows.
    fn add_rows(&mut self, n: usize);

    /// Append `n` empty fixed-at-zero columns.
    fn add_cols(&mut self, n: usize);

    /// Delete every row whose flag is set; `delete.len()` must equal
    /// [`num_rows`](LpEngine::num_rows). Survivors keep their relative
    /// order.
    fn del_rows(&mut self, delete: &[bool]);

    /// Delete every column whose flag is set, preserving survivor order.
    fn del_cols(&mut self, delete: &[bool]);

    /// Assign or clear a row name.
    fn set_row_name(&mut self, i: usize, name: Option<&str>);

    /// Assign or clear a column name.
    fn set_col_name(&mut self, j: usize, name: Option<&str>);

    /// Set the type and bounds of row `i`.
    fn set_row_bounds(&mut self, i: usize, bounds: Bounds);

    /// Set the type and bounds of column `j`.
    fn set_col_bounds(&mut self, j: usize, bounds: Bounds);

    /// The type and bounds of row `i`.
    fn row_bounds(&self, i: usize) -> Bounds;

    /// The type and bounds of column `j`.
    fn col_bounds(&self, j: usize) -> Bounds;

    /// Set the constant term of the objective function.
    fn set_obj_const(&mut self, c0: f64);

    /// The constant term of the objective function.
    fn obj_const(&self) -> f64;

    /// Set the objective coefficient of the auxiliary variable of row `i`.
    fn set_row_obj(&mut self, i: usize, coef: f64);

    /// Set the objective coefficient of column `j`.
    fn set_col_obj(&mut self, j: usize, coef: f64);

    /// The objective coefficient of the auxiliary variable of row `i`.
    fn row_obj(&self, i: usize) -> f64;

    /// The objective coefficient of column `j`.
    fn col_obj(&self, j: usize) -> f64;

    /// Set the basis status of row `i`. Implementations must degrade a
    /// status that is illegal for the row's bound type.
    fn set_row_stat(&mut self, i: usize, stat: BasisStatus);

    /// Set the basis status of column `j`, degrading illegal statuses.
    fn set_col_stat(&mut self, j: usize, stat: BasisStatus);

    /// Replace the coefficient list of row `i`. Column ordinals must be
    /// distinct and values non-zero.
    fn set_mat_row(&mut self, i: usize, coefs: &[(usize, f64)]);

    /// Replace the coefficient list of column `j`. Row ordinals must be
    /// distinct and values non-zero.
    fn set_mat_col(&mut self, j: usize, coefs: &[(usize, f64)]);

    /// Drop every constraint coefficient. Used before a wholesale row-wise
    /// reload via [`set_mat_row`](LpEngine::set_mat_row).
    fn clear_mat(&mut self);

    /// Heuristically construct a starting basis for a cold solve. The
    /// default keeps whatever statuses are currently assigned.
    fn adv_basis(&mut self) {}

    /// Recompute the basic solution components (primal values, duals) for
    /// the current basis without performing simplex iterations.
    fn warm_up(&mut self) -> Result<()>;

    /// Run the simplex method from the current basis.
    fn simplex(&mut self, ctl: &SimplexControl) -> Result<SolveOutcome>;

    /// Status of the held basic solution.
    fn status(&self) -> LpStatus;

    /// Current value of the objective function.
    fn obj_val(&self) -> f64;

    /// Status, primal value and reduced cost of the auxiliary variable of
    /// row `i`.
    fn row_info(&self, i: usize) -> (BasisStatus, f64, f64);

    /// Status, primal value and reduced cost of column `j`.
    fn col_info(&self, j: usize) -> (BasisStatus, f64, f64);

    /// Total simplex iterations performed over the engine's lifetime.
    fn iter_count(&self) -> u64;

    /// The row of the simplex tableau expressing the basic variable `var`
    /// in terms of the non-basic variables. Returns `(q, alfa)` pairs where
    /// `x[var] = ... + alfa * x[q] + ...`. Panics if `var` is non-basic.
    fn eval_tab_row(&self, var: VarRef) -> Vec<(VarRef, f64)>;

    /// Dual ratio test over a simplex tableau row: pick the non-basic
    /// variable that enters the basis when the row's basic variable is
    /// driven out in direction `dir`, keeping the basis dual feasible.
    /// Entries with `|alfa| < tol` are ignored. `None` means no variable
    /// qualifies and the modified problem is primal infeasible.
    fn dual_ratio_test(&self, row: &[(VarRef, f64)], dir: RatioDir, tol: f64) -> Option<VarRef>;
}

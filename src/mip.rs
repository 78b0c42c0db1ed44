//! The branch-and-cut driver: an event-loop state machine over one
//! current subproblem, layered on the enumeration tree.
//!
//! The driver owns the search: it selects active subproblems, solves
//! their LP relaxations with the incumbent as an objective cutoff, prices
//! in dynamic columns by reduced cost, recovers primal feasibility with an
//! auxiliary objective when a relaxation is infeasible, checks
//! integrality, records incumbents, branches, and prunes. The embedding
//! application steers it through the event protocol in [`events`].
//!
//! [`events`]: crate::events

use crate::constants::{
    BacktrackRule, BasisStatus, Bounds, BranchRule, Exit, LpStatus, ObjDir, SolveOutcome, VarKind,
    VarScope, BOUND_ROUND_TOL, INT_FEAS_TOL, OBJ_TOL, PRICING_CHECK_TOL, PRICING_TOL,
};
use crate::engine::{LpEngine, SimplexControl};
use crate::events::{Con, Event, EventHandler, MipContext, Var};
use crate::master::{Col, Item, MasterHandle, Row};
use crate::rules;
use crate::tree::{NodeId, NodeState, Removal, Tree, TreeConfig};
use crate::{Error, Result};
use fnv::FnvHashMap;
use log::{debug, info};
use std::time::Instant;

/// Control parameters of the driver.
#[derive(Debug, Clone)]
pub struct Params {
    /// Message level: 0 none, 1 errors, 2 normal, 3 full.
    pub msg_level: u8,
    /// Relative integer-feasibility tolerance.
    pub tol_int: f64,
    /// Relative objective-improvement tolerance.
    pub tol_obj: f64,
    /// Simplex iteration budget for the whole search.
    pub it_lim: Option<u64>,
    /// Limit on the number of solved subproblems.
    pub sn_lim: Option<u64>,
    /// Wall-clock limit in seconds.
    pub tm_lim: Option<f64>,
    /// Progress display period in seconds.
    pub out_frq: f64,
    /// Branching rule applied when the application declines to choose.
    pub branch_rule: BranchRule,
    /// Backtracking rule applied when the application declines to choose.
    pub backtrack_rule: BacktrackRule,
    /// Most columns priced into a subproblem per re-optimisation.
    pub price_max: usize,
}

impl Default for Params {
    fn default() -> Params {
        Params {
            msg_level: 2,
            tol_int: INT_FEAS_TOL,
            tol_obj: OBJ_TOL,
            it_lim: None,
            sn_lim: None,
            tm_lim: None,
            out_frq: 5.0,
            branch_rule: BranchRule::First,
            backtrack_rule: BacktrackRule::Lifo,
            price_max: 10,
        }
    }
}

/// Which branch continues the search after branching.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Heir {
    /// Neither; the next subproblem comes from the backtracking rule.
    Backtrack,
    /// The child with the decreased upper bound.
    Down,
    /// The child with the increased lower bound.
    Up,
}

/// Driver-level handle to a subproblem.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Sub(pub(crate) NodeId);

/// The best integer-feasible solution found so far.
#[derive(Debug, Clone)]
pub struct Incumbent {
    /// Objective value.
    pub obj: f64,
    /// Primal values of the original constraints.
    pub rows: Vec<(Con, f64)>,
    /// Primal values of all variables; integer components are rounded.
    pub cols: Vec<(Var, f64)>,
}

impl Incumbent {
    /// Value of a variable in this solution.
    pub fn var_value(&self, var: Var) -> Option<f64> {
        self.cols.iter().find(|&&(v, _)| v == var).map(|&(_, x)| x)
    }

    /// Activity of an original constraint in this solution.
    pub fn con_value(&self, con: Con) -> Option<f64> {
        self.rows.iter().find(|&&(c, _)| c == con).map(|&(_, x)| x)
    }
}

#[derive(Debug)]
pub(crate) struct VarData {
    pub(crate) kind: VarKind,
    pub(crate) scope: VarScope,
    pub(crate) infeas: bool,
    pub(crate) marked: bool,
}

#[derive(Debug)]
pub(crate) struct ConData {
    /// Subproblem that was current when the constraint entered the LP,
    /// `None` while it is still pending.
    pub(crate) origin: Option<NodeId>,
    /// Part of the original problem, never removable.
    pub(crate) initial: bool,
}

#[derive(Debug, Copy, Clone)]
pub(crate) struct JobData {
    /// Optimal relaxation value once solved; until then an estimate
    /// inherited from the parent.
    pub(crate) lp_obj: f64,
    /// Sum of fractionalities recorded when the relaxation was solved.
    pub(crate) ii_sum: f64,
}

/// A pre-solved MIP handed to [`Mip::with_problem`]: the full problem
/// description together with an optimal basis of its LP relaxation.
#[derive(Debug, Clone)]
pub struct Problem {
    pub name: Option<String>,
    pub dir: ObjDir,
    pub obj_const: f64,
    pub rows: Vec<ProblemRow>,
    pub cols: Vec<ProblemCol>,
    /// Status the relaxation was solved to; must be optimal.
    pub status: LpStatus,
    /// Objective value of the optimal relaxation.
    pub obj_val: f64,
}

#[derive(Debug, Clone)]
pub struct ProblemRow {
    pub name: Option<String>,
    pub bounds: Bounds,
    pub stat: BasisStatus,
}

#[derive(Debug, Clone)]
pub struct ProblemCol {
    pub name: Option<String>,
    pub kind: VarKind,
    pub bounds: Bounds,
    pub obj: f64,
    /// Constraint coefficients as `(row index, value)` pairs.
    pub coefs: Vec<(usize, f64)>,
    pub stat: BasisStatus,
}

enum Verdict {
    /// Fathomed; with the flag set a new incumbent was just recorded.
    Fathom { bingo: bool },
    Branch,
    Stop(Exit),
}

/// The branch-and-cut workspace and driver.
pub struct Mip<E: LpEngine> {
    pub(crate) tree: Tree<E>,
    pub(crate) dir: ObjDir,
    pub(crate) params: Params,
    pub(crate) vars: FnvHashMap<Col, VarData>,
    pub(crate) cons: FnvHashMap<Row, ConData>,
    pub(crate) jobs: FnvHashMap<NodeId, JobData>,
    pub(crate) curr: Option<NodeId>,
    pub(crate) glob: Option<NodeId>,
    pub(crate) found: bool,
    pub(crate) best: Option<Incumbent>,
    pub(crate) an_cnt: usize,
    pub(crate) sn_cnt: usize,
    reopt: usize,
    pub(crate) unsat: usize,
    pub(crate) ii_sum: f64,
    better: bool,
    pub(crate) br_col: Option<Col>,
    pub(crate) heir: Heir,
    pub(crate) pending_cons: Vec<Row>,
    pub(crate) pending_del_cons: Vec<Row>,
    pub(crate) selected: Option<NodeId>,
    pub(crate) this_removal: Option<u64>,
    initialized: bool,
    preloaded: bool,
    it_lim: Option<u64>,
    sn_lim: Option<u64>,
    tm_rem: Option<f64>,
    last_display: Option<Instant>,
}

impl<E: LpEngine> std::fmt::Debug for Mip<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mip").finish_non_exhaustive()
    }
}

impl<E: LpEngine> Mip<E> {
    /// Create an empty workspace. The LP engine must be empty; the root
    /// subproblem is populated by the application during [`Event::Init`].
    pub fn new(name: Option<&str>, dir: ObjDir, mut lp: E, params: Params) -> Mip<E> {
        lp.set_name(name);
        lp.set_dir(dir);
        let mut tree = Tree::new(lp, TreeConfig::default());
        // variables live for the whole search; constraints die with the
        // subproblems that generated them
        tree.set_item_filter(Some(Box::new(|item: Item, _link: u64| {
            matches!(item, Item::Col(_))
        })));
        let it_lim = params.it_lim;
        let sn_lim = params.sn_lim;
        let tm_rem = params.tm_lim;
        Mip {
            tree,
            dir,
            params,
            vars: FnvHashMap::default(),
            cons: FnvHashMap::default(),
            jobs: FnvHashMap::default(),
            curr: None,
            glob: None,
            found: false,
            best: None,
            an_cnt: 0,
            sn_cnt: 0,
            reopt: 0,
            unsat: 0,
            ii_sum: 0.0,
            better: false,
            br_col: None,
            heir: Heir::Backtrack,
            pending_cons: Vec::new(),
            pending_del_cons: Vec::new(),
            selected: None,
            this_removal: None,
            initialized: false,
            preloaded: false,
            it_lim,
            sn_lim,
            tm_rem,
            last_display: None,
        }
    }

    /// Create a workspace pre-loaded with a problem whose LP relaxation
    /// has already been solved to optimality. The root subproblem holds
    /// the full problem with the optimal basis installed, so the first
    /// relaxation solve is a warm no-op.
    pub fn with_problem(prob: &Problem, lp: E, params: Params) -> Result<Mip<E>> {
        if prob.rows.is_empty() || prob.cols.is_empty() {
            panic!("with_problem: problem has no rows or no columns");
        }
        if prob.status != LpStatus::Optimal {
            return Err(Error::NotOptimal);
        }
        for col in &prob.cols {
            if col.kind == VarKind::Integer {
                for b in [col.bounds.lb(), col.bounds.ub()].iter().flatten() {
                    let t = (b + 0.5).floor();
                    if (b - t).abs() > BOUND_ROUND_TOL * (1.0 + b.abs()) {
                        return Err(Error::NonIntegerBound(*b));
                    }
                }
            }
        }
        let mut mip = Mip::new(prob.name.as_deref(), prob.dir, lp, params);
        let root = mip.tree.create_node(None);
        mip.jobs.insert(root, JobData { lp_obj: prob.obj_val, ii_sum: 0.0 });
        mip.tree.revive(Some(root));
        let mut rows = Vec::with_capacity(prob.rows.len());
        for r in &prob.rows {
            // constraints of the original problem carry no objective
            // coefficient
            let row = mip.tree.add_master_row(r.name.as_deref(), r.bounds, 0.0, &[]);
            mip.cons.insert(row, ConData { origin: Some(root), initial: true });
            rows.push(row);
        }
        let mut cols = Vec::with_capacity(prob.cols.len());
        for c in &prob.cols {
            let coefs: Vec<(Row, f64)> =
                c.coefs.iter().map(|&(i, v)| (rows[i], v)).collect();
            let col = mip.tree.add_master_col(c.name.as_deref(), c.bounds, c.obj, &coefs);
            mip.vars.insert(
                col,
                VarData { kind: c.kind, scope: VarScope::Static, infeas: false, marked: false },
            );
            cols.push(col);
        }
        mip.tree.add_rows(&rows);
        mip.tree.add_cols(&cols);
        mip.tree.set_obj_const(prob.obj_const);
        for (row, r) in rows.iter().zip(prob.rows.iter()) {
            mip.tree.set_row_stat(*row, r.stat);
        }
        for (col, c) in cols.iter().zip(prob.cols.iter()) {
            mip.tree.set_col_stat(*col, c.stat);
        }
        mip.glob = Some(root);
        mip.an_cnt = 1;
        mip.curr = Some(root);
        mip.preloaded = true;
        Ok(mip)
    }

    /// The incumbent, if one has been found.
    pub fn best(&self) -> Option<&Incumbent> {
        self.best.as_ref()
    }

    /// Number of subproblems in the active list.
    pub fn active_count(&self) -> usize {
        self.an_cnt
    }

    /// Number of solved subproblems, including ones deleted unsolved.
    pub fn solved_count(&self) -> usize {
        self.sn_cnt
    }

    /// Read access to the LP engine.
    pub fn lp(&self) -> &E {
        self.tree.lp()
    }

    /// Replenish the simplex iteration budget, e.g. before resuming a
    /// search that exited with [`Exit::IterLimit`].
    pub fn set_iter_limit(&mut self, limit: Option<u64>) {
        self.it_lim = limit;
    }

    /// Replenish the solved-subproblem budget.
    pub fn set_sub_limit(&mut self, limit: Option<u64>) {
        self.sn_lim = limit;
    }

    /// Replenish the wall-clock budget, in seconds.
    pub fn set_time_limit(&mut self, limit: Option<f64>) {
        self.tm_rem = limit;
    }

    fn raise<H: EventHandler<E>>(&mut self, event: Event, handler: &mut H) {
        let mut ctx = MipContext { mip: self, event };
        handler.on_event(&mut ctx);
    }

    /// Run the search. The workspace stays valid across calls, so a
    /// search cut short by a limit can be resumed by calling again.
    pub fn drive<H: EventHandler<E>>(&mut self, handler: &mut H) -> Exit {
        let start = Instant::now();
        let exit = self.run(handler, start);
        if let Some(t) = self.tm_rem {
            self.tm_rem = Some((t - start.elapsed().as_secs_f64()).max(0.0));
        }
        match exit {
            Exit::Ok => {
                if self.params.msg_level >= 3 {
                    if self.found {
                        info!("INTEGER OPTIMAL SOLUTION FOUND");
                    } else {
                        info!("PROBLEM HAS NO INTEGER FEASIBLE SOLUTION");
                    }
                }
            }
            Exit::IterLimit => {
                if self.params.msg_level >= 3 {
                    info!("ITERATIONS LIMIT EXCEEDED; SEARCH TERMINATED");
                }
            }
            Exit::SubLimit => {
                if self.params.msg_level >= 3 {
                    info!("SUBPROBLEMS LIMIT EXCEEDED; SEARCH TERMINATED");
                }
            }
            Exit::TimeLimit => {
                if self.params.msg_level >= 3 {
                    info!("TIME LIMIT EXCEEDED; SEARCH TERMINATED");
                }
            }
            Exit::LpError => {
                if self.params.msg_level >= 1 {
                    info!("unable to solve LP relaxation of current subproblem");
                }
            }
        }
        exit
    }

    fn run<H: EventHandler<E>>(&mut self, handler: &mut H, start: Instant) -> Exit {
        if !self.initialized {
            if let Err(exit) = self.init(handler) {
                return exit;
            }
        }
        loop {
            if self.an_cnt == 0 {
                self.finish(handler);
                return Exit::Ok;
            }
            if self.it_lim == Some(0) {
                return Exit::IterLimit;
            }
            if self.sn_lim == Some(0) {
                return Exit::SubLimit;
            }
            if let Some(t) = self.tm_rem {
                if start.elapsed().as_secs_f64() >= t {
                    return Exit::TimeLimit;
                }
            }
            self.maybe_display();
            if self.curr.is_none() {
                self.selected = None;
                self.raise(Event::Select, handler);
                self.curr = self.selected.take();
            }
            if self.curr.is_none() {
                self.curr = Some(rules::backtrack(self));
            }
            let curr = self.curr.unwrap();
            debug_assert_eq!(self.tree.node_state(curr), NodeState::Active);
            self.tree.revive(Some(curr));
            if self.reopt == 0 {
                self.raise(Event::BeginSub, handler);
            }
            match self.optimize(curr, handler) {
                Verdict::Stop(exit) => return exit,
                Verdict::Fathom { bingo } => {
                    if !bingo {
                        self.raise(Event::Reject, handler);
                    }
                    self.raise(Event::EndSub, handler);
                    self.reopt = 0;
                    self.curr = None;
                    let removal = self.tree.prune_branch(curr);
                    self.process_removal(removal, handler);
                    if bingo {
                        self.cleanup_the_tree(handler);
                    }
                    self.find_common_ancestor();
                }
                Verdict::Branch => {
                    self.raise(Event::EndSub, handler);
                    self.reopt = 0;
                    // the current subproblem turns into an interior node
                    self.an_cnt -= 1;
                    self.sn_cnt += 1;
                    if let Some(l) = self.sn_lim {
                        self.sn_lim = Some(l.saturating_sub(1));
                    }
                    self.create_branches(curr);
                }
            }
        }
    }

    /// The inner re-optimisation loop for one subproblem. Returns what to
    /// do with it.
    fn optimize<H: EventHandler<E>>(&mut self, curr: NodeId, handler: &mut H) -> Verdict {
        loop {
            self.raise(Event::BeginLp, handler);
            let outcome = match self.solve_subproblem() {
                Ok(o) => o,
                Err(e) => {
                    debug!("relaxation solve failed: {}", e);
                    return Verdict::Stop(Exit::LpError);
                }
            };
            self.reopt += 1;
            if outcome == SolveOutcome::IterLimit {
                // charge the exhausted budget; the outer loop exits
                self.it_lim = Some(0);
                return Verdict::Stop(Exit::IterLimit);
            }
            self.check_lp_status(curr, outcome);
            let infeasible = self.tree.lp().status() == LpStatus::Infeasible;
            // integer-infeasibility flags belong to the previous solve;
            // the fresh check runs only once the subproblem has survived
            // pricing and constraint generation
            self.unsat = 0;
            self.ii_sum = 0.0;
            self.clear_infeas();
            self.raise(Event::EndLp, handler);
            if self.apply_changes(handler) {
                continue;
            }
            if infeasible {
                self.jobs.get_mut(&curr).expect("current job").ii_sum = 0.0;
                // try pulling in missing columns that may reduce the
                // infeasibility sum
                match self.recover_feas() {
                    Ok(nv) if nv > 0 => continue,
                    Ok(_) => return Verdict::Fathom { bingo: false },
                    Err(e) => {
                        debug!("feasibility recovery failed: {}", e);
                        return Verdict::Stop(Exit::LpError);
                    }
                }
            }
            // the solution must be dual feasible for every variable in
            // the workspace, not only the included ones; a column priced
            // in here can push the objective back past the cutoff, so
            // this runs before the subproblem is judged
            match self.price_in(false) {
                Ok(nv) if nv > 0 => continue,
                Ok(_) => {}
                Err(e) => {
                    debug!("pricing failed: {}", e);
                    return Verdict::Stop(Exit::LpError);
                }
            }
            if !self.better {
                return Verdict::Fathom { bingo: false };
            }
            self.raise(Event::GenCon, handler);
            if self.apply_changes(handler) {
                continue;
            }
            self.check_integrality();
            self.jobs.get_mut(&curr).expect("current job").ii_sum = self.ii_sum;
            if self.unsat == 0 {
                self.record_solution(curr);
                self.display();
                self.raise(Event::Bingo, handler);
                return Verdict::Fathom { bingo: true };
            }
            self.raise(Event::GenCut, handler);
            if self.apply_changes(handler) {
                self.clear_infeas();
                continue;
            }
            self.br_col = None;
            self.heir = Heir::Backtrack;
            self.raise(Event::Branch, handler);
            if self.br_col.is_none() {
                let (col, heir) = rules::branch(self);
                self.br_col = Some(col);
                self.heir = heir;
            }
            return Verdict::Branch;
        }
    }

    fn init<H: EventHandler<E>>(&mut self, handler: &mut H) -> std::result::Result<(), Exit> {
        self.initialized = true;
        if !self.preloaded {
            let root = self.tree.create_node(None);
            self.jobs.insert(root, JobData { lp_obj: 0.0, ii_sum: 0.0 });
            self.tree.revive(Some(root));
            self.glob = Some(root);
            self.an_cnt = 1;
            self.curr = Some(root);
        }
        self.raise(Event::Init, handler);
        let nv = self.include_marked_vars();
        let nc = self.include_pending_cons();
        if !self.preloaded {
            if nv == 0 {
                panic!("driver: root subproblem has no variables");
            }
            if nc == 0 {
                panic!("driver: root subproblem has no constraints");
            }
            if self.params.msg_level >= 3 {
                info!("Solving initial LP relaxation...");
            }
            self.tree.lp_mut().adv_basis();
            let outcome = match self.solve_subproblem() {
                Ok(o) => o,
                Err(e) => {
                    debug!("initial relaxation solve failed: {}", e);
                    return Err(Exit::LpError);
                }
            };
            if outcome == SolveOutcome::IterLimit {
                self.it_lim = Some(0);
                return Err(Exit::IterLimit);
            }
            if self.tree.lp().status() != LpStatus::Optimal {
                panic!("driver: optimal solution of initial LP relaxation required");
            }
            let root = self.tree.root().unwrap();
            self.jobs.get_mut(&root).unwrap().lp_obj = self.tree.lp().obj_val();
            if self.params.msg_level >= 3 {
                info!("Integer optimization begins...");
            }
        }
        Ok(())
    }

    /// Include the variables marked for entry (static variables at
    /// initialisation) into the current subproblem.
    fn include_marked_vars(&mut self) -> usize {
        let mut list = Vec::new();
        let mut col = self.tree.next_master_col(None);
        while let Some(c) = col {
            if self.vars.get(&c).map_or(false, |v| v.marked) {
                debug_assert!(self.tree.col_bind(c).is_none());
                self.vars.get_mut(&c).unwrap().marked = false;
                list.push(c);
            }
            col = self.tree.next_master_col(Some(c));
        }
        if !list.is_empty() {
            self.tree.add_cols(&list);
        }
        list.len()
    }

    /// Include the staged constraints into the current subproblem.
    fn include_pending_cons(&mut self) -> usize {
        let rows = std::mem::take(&mut self.pending_cons);
        if rows.is_empty() {
            return 0;
        }
        self.tree.add_rows(&rows);
        let origin = self.curr;
        for row in &rows {
            self.cons.get_mut(row).expect("staged constraint").origin = origin;
        }
        rows.len()
    }

    /// Apply the row additions and removals staged by the application.
    /// Returns whether anything changed, in which case the subproblem
    /// must be re-optimised.
    fn apply_changes<H: EventHandler<E>>(&mut self, handler: &mut H) -> bool {
        let mut changed = false;
        let dels = std::mem::take(&mut self.pending_del_cons);
        if !dels.is_empty() {
            for &row in &dels {
                let i = self
                    .tree
                    .row_bind(row)
                    .expect("withdrawn constraint is not in the subproblem");
                self.tree.mark_row(i, true);
            }
            let removal = self.tree.del_items();
            self.process_removal(removal, handler);
            changed = true;
        }
        if self.include_pending_cons() > 0 {
            changed = true;
        }
        changed
    }

    fn solve_subproblem(&mut self) -> Result<SolveOutcome> {
        let mut ctl = SimplexControl {
            use_dual: true,
            ..SimplexControl::default()
        };
        if let Some(best) = self.best.as_ref() {
            match self.dir {
                ObjDir::Minimize => ctl.obj_upper = best.obj,
                ObjDir::Maximize => ctl.obj_lower = best.obj,
            }
        }
        ctl.iter_limit = self.it_lim;
        let before = self.tree.lp().iter_count();
        let out = self.tree.solve_node(&ctl)?;
        let spent = self.tree.lp().iter_count() - before;
        if let Some(l) = self.it_lim {
            self.it_lim = Some(l.saturating_sub(spent));
        }
        Ok(out)
    }

    /// Is `obj` better than the incumbent, within the relative
    /// objective-improvement tolerance?
    fn is_better(&self, obj: f64) -> bool {
        let best = match self.best.as_ref() {
            None => return true,
            Some(b) => b.obj,
        };
        let eps = self.params.tol_obj * (1.0 + best.abs());
        match self.dir {
            ObjDir::Minimize => obj <= best - eps,
            ObjDir::Maximize => obj >= best + eps,
        }
    }

    /// Digest the relaxation solve: set the improvement flag and store
    /// the relaxation value on the subproblem.
    fn check_lp_status(&mut self, curr: NodeId, outcome: SolveOutcome) {
        let status = self.tree.lp().status();
        debug_assert_ne!(status, LpStatus::Undefined);
        let mut lp_obj = self.tree.lp().obj_val();
        match outcome {
            SolveOutcome::Ok => match status {
                LpStatus::Optimal => {
                    self.better = self.is_better(lp_obj);
                }
                LpStatus::Infeasible => {
                    lp_obj = match self.dir {
                        ObjDir::Minimize => f64::INFINITY,
                        ObjDir::Maximize => f64::NEG_INFINITY,
                    };
                    self.better = false;
                }
                LpStatus::Undefined => unreachable!(),
            },
            SolveOutcome::ObjLowerLimit => {
                // the objective fell through the incumbent cutoff
                debug_assert_eq!(self.dir, ObjDir::Maximize);
                self.better = false;
            }
            SolveOutcome::ObjUpperLimit => {
                debug_assert_eq!(self.dir, ObjDir::Minimize);
                self.better = false;
            }
            SolveOutcome::IterLimit => unreachable!(),
        }
        self.jobs.get_mut(&curr).expect("current job").lp_obj = lp_obj;
    }

    /// Flag every integer variable whose basic value is fractional and
    /// accumulate the sum of fractionalities.
    fn check_integrality(&mut self) {
        self.unsat = 0;
        self.ii_sum = 0.0;
        let tol = self.params.tol_int;
        let mut col = self.tree.next_master_col(None);
        while let Some(c) = col {
            col = self.tree.next_master_col(Some(c));
            let kind = self.vars.get(&c).map(|v| v.kind);
            if let Some(v) = self.vars.get_mut(&c) {
                v.infeas = false;
            }
            if kind != Some(VarKind::Integer) {
                continue;
            }
            // a variable missing from the subproblem is zero by
            // definition, hence integral
            if self.tree.col_bind(c).is_none() {
                continue;
            }
            let bounds = self.tree.col_bounds(c);
            // a fixed variable is integral because the solution is
            // primal feasible
            if let Bounds::Fixed(_) = bounds {
                continue;
            }
            let (stat, vx, _) = self.tree.col_info(c);
            // non-basic integers sit exactly on their integral bounds
            if stat != BasisStatus::Basic {
                continue;
            }
            if let Some(lb) = bounds.lb() {
                let lb = round_bound(lb);
                if vx <= lb + tol * (1.0 + lb.abs()) {
                    continue;
                }
            }
            if let Some(ub) = bounds.ub() {
                let ub = round_bound(ub);
                if vx >= ub - tol * (1.0 + ub.abs()) {
                    continue;
                }
            }
            if (vx - (vx + 0.5).floor()).abs() <= tol * (1.0 + vx.abs()) {
                continue;
            }
            self.vars.get_mut(&c).unwrap().infeas = true;
            self.unsat += 1;
            let t1 = vx - vx.floor();
            let t2 = vx.ceil() - vx;
            self.ii_sum += t1.min(t2);
        }
    }

    fn clear_infeas(&mut self) {
        for v in self.vars.values_mut() {
            v.infeas = false;
        }
    }

    /// Price the missing dynamic columns against the current simplex
    /// multipliers and include the most promising ones. With `aux` set,
    /// the reduced costs are taken against the auxiliary infeasibility
    /// objective currently loaded in the engine, so the variables'
    /// original objective coefficients are left out.
    fn price_in(&mut self, aux: bool) -> Result<usize> {
        let nv_max = self.params.price_max;
        debug_assert!(nv_max > 0);
        let mut picked: Vec<(Col, f64)> = Vec::new();
        let mut col = self.tree.next_master_col(None);
        while let Some(c) = col {
            col = self.tree.next_master_col(Some(c));
            if self.tree.col_bind(c).is_some() {
                continue;
            }
            // only dynamic variables may sit outside a subproblem; they
            // are non-basic at their zero lower bound and can increase
            debug_assert_eq!(self.vars[&c].scope, VarScope::Dynamic);
            debug_assert_eq!(self.tree.master_bounds(Item::Col(c)).lb(), Some(0.0));
            let dj = if aux {
                self.tree.eval_red_cost_with(c, 0.0)
            } else {
                let dj = self.tree.eval_red_cost(c);
                match self.dir {
                    ObjDir::Minimize => dj,
                    ObjDir::Maximize => -dj,
                }
            };
            if dj >= -PRICING_TOL {
                continue;
            }
            if picked.len() < nv_max {
                picked.push((c, dj));
            } else {
                // keep only the most negative reduced costs
                let (worst, _) = picked
                    .iter()
                    .enumerate()
                    .max_by(|a, b| a.1 .1.partial_cmp(&b.1 .1).unwrap())
                    .unwrap();
                if picked[worst].1 > dj {
                    picked[worst] = (c, dj);
                }
            }
        }
        if picked.is_empty() {
            return Ok(0);
        }
        // include in creation order
        picked.sort_by_key(|&(c, _)| c.id());
        let cols: Vec<Col> = picked.iter().map(|&(c, _)| c).collect();
        self.tree.add_cols(&cols);
        if cfg!(debug_assertions) {
            // the predicted reduced costs must agree with the values
            // recomputed now that the columns are in the subproblem
            self.tree.lp_mut().warm_up()?;
            for &(c, predicted) in &picked {
                debug_assert!(self.tree.col_bind(c).is_some());
                let mut dj = self.tree.eval_red_cost(c);
                if aux {
                    dj -= self.tree.master_obj(Item::Col(c));
                } else if self.dir == ObjDir::Maximize {
                    dj = -dj;
                }
                debug_assert!(
                    (predicted - dj).abs() <= PRICING_CHECK_TOL * (1.0 + dj.abs()),
                    "pricing drift: predicted {} recomputed {}",
                    predicted,
                    dj
                );
            }
        }
        Ok(picked.len())
    }

    /// The relaxation is primal infeasible: replace the objective with
    /// the sum of primal infeasibilities, price columns that may reduce
    /// it into the subproblem, and restore the true objective. The sum is
    /// not guaranteed to shrink monotonically across rounds, since the
    /// engine's own phase one may measure infeasibility differently;
    /// termination relies on the driver's limit parameters.
    fn recover_feas(&mut self) -> Result<usize> {
        let m = self.tree.num_rows();
        let n = self.tree.num_cols();
        let mut row_coef = vec![0.0; m];
        let mut col_coef = vec![0.0; n];
        {
            let lp = self.tree.lp();
            for (i, coef) in row_coef.iter_mut().enumerate() {
                let (stat, vx, _) = lp.row_info(i);
                if stat != BasisStatus::Basic {
                    continue;
                }
                let b = lp.row_bounds(i);
                if let Some(lb) = b.lb() {
                    if vx < lb {
                        *coef = -1.0;
                    }
                }
                if let Some(ub) = b.ub() {
                    if vx > ub {
                        *coef = 1.0;
                    }
                }
            }
            for (j, coef) in col_coef.iter_mut().enumerate() {
                let (stat, vx, _) = lp.col_info(j);
                if stat != BasisStatus::Basic {
                    continue;
                }
                let b = lp.col_bounds(j);
                if let Some(lb) = b.lb() {
                    if vx < lb {
                        *coef = -1.0;
                    }
                }
                if let Some(ub) = b.ub() {
                    if vx > ub {
                        *coef = 1.0;
                    }
                }
            }
        }
        {
            let lp = self.tree.lp_mut();
            lp.set_obj_const(0.0);
            for (i, &c) in row_coef.iter().enumerate() {
                lp.set_row_obj(i, c);
            }
            for (j, &c) in col_coef.iter().enumerate() {
                lp.set_col_obj(j, c);
            }
            lp.warm_up()?;
        }
        let nv = self.price_in(true)?;
        self.tree.restore_objective();
        self.tree.lp_mut().warm_up()?;
        Ok(nv)
    }

    /// Record the current optimal, integer-feasible relaxation as the new
    /// incumbent.
    fn record_solution(&mut self, curr: NodeId) {
        self.found = true;
        let obj = self.jobs[&curr].lp_obj;
        let mut rows = Vec::new();
        let mut row = self.tree.next_master_row(None);
        while let Some(r) = row {
            row = self.tree.next_master_row(Some(r));
            if self.cons.get(&r).map_or(false, |c| c.initial) {
                // original constraints are part of every subproblem
                let (_, vx, _) = self.tree.row_info(r);
                rows.push((Con(r), vx));
            }
        }
        let mut cols = Vec::new();
        let mut col = self.tree.next_master_col(None);
        while let Some(c) = col {
            col = self.tree.next_master_col(Some(c));
            let mut vx = match self.tree.col_bind(c) {
                Some(_) => self.tree.col_info(c).1,
                None => 0.0,
            };
            if self.vars[&c].kind == VarKind::Integer {
                vx = (vx + 0.5).floor();
            }
            cols.push((Var(c), vx));
        }
        self.best = Some(Incumbent { obj, rows, cols });
    }

    /// Prune every active subproblem whose relaxation bound cannot beat
    /// the freshly recorded incumbent.
    fn cleanup_the_tree<H: EventHandler<E>>(&mut self, handler: &mut H) {
        debug_assert!(self.found);
        let mut node = self.tree.next_node(None);
        while let Some(nd) = node {
            // pruning may take ancestors with it, but ancestors precede
            // their descendants in the chronological list, so the next
            // node is never affected
            let next = self.tree.next_node(Some(nd));
            if self.tree.node_state(nd) == NodeState::Active
                && !self.is_better(self.jobs[&nd].lp_obj)
            {
                let removal = self.tree.prune_branch(nd);
                self.process_removal(removal, handler);
            }
            node = next;
        }
    }

    /// Re-locate the deepest common ancestor of everything still in the
    /// tree; its relaxation value is the global bound.
    fn find_common_ancestor(&mut self) {
        let mut glob = None;
        let mut node = self.tree.next_node(None);
        while let Some(nd) = node {
            glob = Some(nd);
            match self.tree.node_state(nd) {
                NodeState::Inactive { children: 1 } => {}
                _ => break,
            }
            node = self.tree.next_node(Some(nd));
        }
        self.glob = glob;
    }

    /// Tighten one bound of the branching column in the current (child)
    /// subproblem.
    fn set_new_bound(&mut self, col: Col, lower: bool, bound: f64) {
        let b = self.tree.col_bounds(col);
        let lb = b.lb().map(round_bound);
        let ub = b.ub().map(round_bound);
        assert_eq!(bound, bound.floor(), "branch bound must be integral");
        let new = if lower {
            // raise the lower bound
            match (lb, ub) {
                (None, None) => Bounds::Lower(bound),
                (Some(lb), None) => {
                    assert!(bound >= lb + 1.0);
                    Bounds::Lower(bound)
                }
                (None, Some(ub)) => {
                    assert!(bound <= ub);
                    if bound == ub {
                        Bounds::Fixed(bound)
                    } else {
                        Bounds::Double(bound, ub)
                    }
                }
                (Some(lb), Some(ub)) => {
                    assert!(bound >= lb + 1.0 && bound <= ub);
                    if bound == ub {
                        Bounds::Fixed(bound)
                    } else {
                        Bounds::Double(bound, ub)
                    }
                }
            }
        } else {
            // lower the upper bound
            match (lb, ub) {
                (None, None) => Bounds::Upper(bound),
                (None, Some(ub)) => {
                    assert!(bound <= ub - 1.0);
                    Bounds::Upper(bound)
                }
                (Some(lb), None) => {
                    assert!(bound >= lb);
                    if bound == lb {
                        Bounds::Fixed(bound)
                    } else {
                        Bounds::Double(lb, bound)
                    }
                }
                (Some(lb), Some(ub)) => {
                    assert!(bound >= lb && bound <= ub - 1.0);
                    if bound == lb {
                        Bounds::Fixed(bound)
                    } else {
                        Bounds::Double(lb, bound)
                    }
                }
            }
        };
        self.tree.set_col_bounds(col, new);
    }

    /// Create the down and up children of the current subproblem and pick
    /// the next current subproblem according to the heir flag.
    fn create_branches(&mut self, curr: NodeId) {
        let col = self.br_col.take().expect("no branching column");
        {
            let v = &self.vars[&col];
            assert_eq!(v.kind, VarKind::Integer);
            assert!(v.infeas, "branching column is not fractional");
        }
        let (_, vx, _) = self.tree.col_info(col);
        self.clear_infeas();
        // until solved, each child inherits the parent's relaxation value
        // as its bound estimate
        let lp_obj = self.jobs[&curr].lp_obj;
        let down = self.tree.create_node(Some(curr));
        self.jobs.insert(down, JobData { lp_obj, ii_sum: 0.0 });
        self.tree.revive(Some(down));
        self.set_new_bound(col, false, vx.floor());
        let up = self.tree.create_node(Some(curr));
        self.jobs.insert(up, JobData { lp_obj, ii_sum: 0.0 });
        self.tree.revive(Some(up));
        self.set_new_bound(col, true, vx.ceil());
        self.an_cnt += 2;
        self.curr = match self.heir {
            Heir::Backtrack => None,
            Heir::Down => Some(down),
            Heir::Up => Some(up),
        };
        self.heir = Heir::Backtrack;
    }

    /// Turn a tree removal report into bookkeeping and deletion events.
    fn process_removal<H: EventHandler<E>>(&mut self, removal: Removal, handler: &mut H) {
        for &(node, _, active) in &removal.nodes {
            if active {
                // an active subproblem deleted unsolved still counts as
                // solved
                self.an_cnt -= 1;
                self.sn_cnt += 1;
                if let Some(l) = self.sn_lim {
                    self.sn_lim = Some(l.saturating_sub(1));
                }
            }
            self.jobs.remove(&node);
        }
        for &(item, link) in &removal.items {
            self.this_removal = Some(link);
            match item {
                Item::Col(c) => {
                    self.raise(Event::DelVar(Var(c)), handler);
                    self.vars.remove(&c);
                }
                Item::Row(r) => {
                    self.raise(Event::DelCon(Con(r)), handler);
                    self.cons.remove(&r);
                }
            }
            self.this_removal = None;
        }
    }

    /// The active list has drained: delete the remaining interior chain,
    /// release the variables, and tell the application to clean up.
    fn finish<H: EventHandler<E>>(&mut self, handler: &mut H) {
        while let Some(last) = self.tree.prev_node(None) {
            let removal = self.tree.delete_node(last);
            self.process_removal(removal, handler);
        }
        self.glob = None;
        // variables are kept alive for the whole search by the item
        // filter; release them explicitly now
        while let Some(c) = self.tree.next_master_col(None) {
            let link = self.tree.item_link(Item::Col(c));
            self.this_removal = Some(link);
            self.raise(Event::DelVar(Var(c)), handler);
            self.this_removal = None;
            self.vars.remove(&c);
            self.tree.del_master_col(c).expect("variable still referenced");
        }
        debug_assert!(self.tree.next_master_row(None).is_none());
        debug_assert!(self.vars.is_empty());
        debug_assert!(self.cons.is_empty());
        debug_assert!(self.jobs.is_empty());
        self.raise(Event::Term, handler);
    }

    fn maybe_display(&mut self) {
        if self.params.msg_level < 2 {
            return;
        }
        let due = self
            .last_display
            .map_or(true, |t| t.elapsed().as_secs_f64() >= self.params.out_frq - 0.001);
        if due {
            self.display();
        }
    }

    fn display(&mut self) {
        if self.params.msg_level < 2 {
            return;
        }
        let mip_obj = match self.best.as_ref() {
            None => "not found yet".to_owned(),
            Some(b) => format!("{:17.9e}", b.obj),
        };
        let lp_obj = match self.glob {
            None => "tree is empty".to_owned(),
            Some(g) => format!("{:17.9e}", self.jobs[&g].lp_obj),
        };
        info!(
            "+{:6}: mip = {:>17}; lp = {:>17} ({}, {})",
            self.tree.lp().iter_count(),
            mip_obj,
            lp_obj,
            self.an_cnt,
            self.sn_cnt
        );
        self.last_display = Some(Instant::now());
    }
}

/// Round a bound of an integer variable to the nearest integer, panicking
/// when it is too far off to be a scaling artefact.
pub(crate) fn round_bound(b: f64) -> f64 {
    let t = (b + 0.5).floor();
    assert!(
        (b - t).abs() <= BOUND_ROUND_TOL * (1.0 + b.abs()),
        "bound {} of integer variable is not integral",
        b
    );
    t
}


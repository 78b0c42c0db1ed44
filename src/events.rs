//! The event protocol between the branch-and-cut driver and the embedding
//! application.
//!
//! The driver raises events at defined points of the search and suspends
//! by calling the application's handler inline; the handler responds
//! through the [`MipContext`] it receives, which exposes exactly the
//! operations that are legal for the current event and panics on misuse.
//! No two events nest, and the handler must not re-enter the driver.

use crate::constants::{BasisStatus, Bounds, VarKind, VarScope};
use crate::engine::LpEngine;
use crate::master::{Col, Item, Row};
use crate::mip::{ConData, Heir, Incumbent, Mip, Sub, VarData};
use crate::tree::NodeState;
use crate::{Error, Result};

/// Driver-level handle to a decision variable.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Var(pub(crate) Col);

/// Driver-level handle to a constraint.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Con(pub(crate) Row);

/// The points at which the driver calls back into the application.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Event {
    /// The root subproblem exists and is empty; populate it with
    /// variables and constraints.
    Init,
    /// No subproblem is current; optionally pick one from the active
    /// list, or leave the choice to the configured backtracking rule.
    Select,
    /// Processing of a freshly selected subproblem begins.
    BeginSub,
    /// An LP relaxation solve is about to start.
    BeginLp,
    /// An LP relaxation solve finished; solution queries are valid and
    /// local constraints may be added or withdrawn.
    EndLp,
    /// The relaxation is solved; contribute missing application
    /// constraints before the subproblem is judged.
    GenCon,
    /// The relaxation is optimal but fractional; contribute cutting
    /// planes.
    GenCut,
    /// The relaxation is optimal, fractional, and no cuts were added;
    /// optionally choose the branching variable and the heir.
    Branch,
    /// The subproblem is fathomed without improving the incumbent.
    Reject,
    /// A new incumbent has just been recorded.
    Bingo,
    /// The given variable is about to be destroyed.
    DelVar(Var),
    /// The given constraint is about to be destroyed.
    DelCon(Con),
    /// Processing of the current subproblem is complete.
    EndSub,
    /// The search is over; release application-side state.
    Term,
}

/// The application side of the protocol: one object (or closure) that is
/// called at every [`Event`].
pub trait EventHandler<E: LpEngine> {
    fn on_event(&mut self, ctx: &mut MipContext<'_, E>);
}

impl<E: LpEngine, F: FnMut(&mut MipContext<'_, E>)> EventHandler<E> for F {
    fn on_event(&mut self, ctx: &mut MipContext<'_, E>) {
        self(ctx)
    }
}

/// Capability handed to the application during an event.
pub struct MipContext<'a, E: LpEngine> {
    pub(crate) mip: &'a mut Mip<E>,
    pub(crate) event: Event,
}

impl<'a, E: LpEngine> MipContext<'a, E> {
    /// The event this callback is being raised for.
    pub fn event(&self) -> Event {
        self.event
    }

    fn legal(&self, ok: bool, routine: &str) {
        if !ok {
            panic!("{}: not legal during {:?}", routine, self.event);
        }
    }

    /// Add a decision variable to the workspace. Only legal during
    /// [`Event::Init`]; variables are global to the whole search. Static
    /// variables enter every subproblem; dynamic variables must have a
    /// zero lower bound and are priced in by reduced cost. Integer
    /// variables must have integral bounds.
    pub fn add_var(
        &mut self,
        name: Option<&str>,
        kind: VarKind,
        scope: VarScope,
        bounds: Bounds,
        obj: f64,
        coefs: &[(Con, f64)],
    ) -> Var {
        self.legal(self.event == Event::Init, "add_var");
        bounds.validate("add_var");
        if kind == VarKind::Integer {
            for b in [bounds.lb(), bounds.ub()].iter().flatten() {
                if (b - (b + 0.5).floor()).abs() != 0.0 {
                    panic!("add_var: bound {} of integer variable is not integral", b);
                }
            }
        }
        if scope == VarScope::Dynamic {
            match bounds {
                Bounds::Lower(lb) | Bounds::Double(lb, _) if lb == 0.0 => {}
                _ => panic!("add_var: dynamic variable must have a zero lower bound"),
            }
        }
        let coefs: Vec<(Row, f64)> = coefs.iter().map(|&(con, v)| (con.0, v)).collect();
        let col = self.mip.tree.add_master_col(name, bounds, obj, &coefs);
        self.mip.vars.insert(
            col,
            VarData {
                kind,
                scope,
                infeas: false,
                marked: scope == VarScope::Static,
            },
        );
        Var(col)
    }

    /// Add a constraint to the workspace. During [`Event::Init`] the
    /// constraint is global; during [`Event::EndLp`], [`Event::GenCon`]
    /// and [`Event::GenCut`] it is local to the current subproblem and
    /// inherited by its descendants. The constraint enters the subproblem
    /// on the next re-optimisation.
    pub fn add_con(
        &mut self,
        name: Option<&str>,
        bounds: Bounds,
        coefs: &[(Var, f64)],
    ) -> Con {
        self.legal(
            matches!(
                self.event,
                Event::Init | Event::EndLp | Event::GenCon | Event::GenCut
            ),
            "add_con",
        );
        bounds.validate("add_con");
        let coefs: Vec<(Col, f64)> = coefs.iter().map(|&(var, v)| (var.0, v)).collect();
        // constraints never carry objective coefficients: locally valid
        // rows with costs would poison reduced-cost pricing
        let row = self.mip.tree.add_master_row(name, bounds, 0.0, &coefs);
        self.mip.cons.insert(
            row,
            ConData {
                origin: None,
                initial: self.event == Event::Init,
            },
        );
        self.mip.pending_cons.push(row);
        Con(row)
    }

    /// Withdraw a locally generated constraint from the current
    /// subproblem before the next re-optimisation. Only constraints that
    /// were added while this subproblem was current can be withdrawn.
    pub fn del_con(&mut self, con: Con) {
        self.legal(
            matches!(self.event, Event::EndLp | Event::GenCon | Event::GenCut),
            "del_con",
        );
        let data = match self.mip.cons.get(&con.0) {
            Some(d) => d,
            None => panic!("del_con: unknown constraint {:?}", con),
        };
        if data.initial {
            panic!("del_con: constraint {:?} belongs to the original problem", con);
        }
        if data.origin != self.mip.curr {
            panic!("del_con: constraint {:?} was not generated for the current subproblem", con);
        }
        self.mip.pending_del_cons.push(con.0);
    }

    /// Choose the variable to branch on. Only legal during
    /// [`Event::Branch`]; the variable must be integer infeasible.
    pub fn set_br_var(&mut self, var: Var) {
        self.legal(self.event == Event::Branch, "set_br_var");
        let data = self
            .mip
            .vars
            .get(&var.0)
            .unwrap_or_else(|| panic!("set_br_var: unknown variable {:?}", var));
        if !data.infeas {
            panic!("set_br_var: variable {:?} is not integer infeasible", var);
        }
        self.mip.br_col = Some(var.0);
    }

    /// Choose which child of the branch becomes the next current
    /// subproblem. Only legal during [`Event::Branch`].
    pub fn set_heir(&mut self, heir: Heir) {
        self.legal(self.event == Event::Branch, "set_heir");
        self.mip.heir = heir;
    }

    /// Select the subproblem to process next. Only legal during
    /// [`Event::Select`]; the subproblem must be active.
    pub fn set_curr(&mut self, sub: Sub) {
        self.legal(self.event == Event::Select, "set_curr");
        if self.mip.tree.node_state(sub.0) != NodeState::Active {
            panic!("set_curr: subproblem {:?} is not active", sub);
        }
        self.mip.selected = Some(sub.0);
    }

    /// The active subproblems, in chronological order.
    pub fn active_subs(&self) -> Vec<Sub> {
        let mut out = Vec::new();
        let mut node = self.mip.tree.next_node(None);
        while let Some(nd) = node {
            if self.mip.tree.node_state(nd) == NodeState::Active {
                out.push(Sub(nd));
            }
            node = self.mip.tree.next_node(Some(nd));
        }
        out
    }

    /// The relaxation bound recorded for a subproblem: its own optimal
    /// value once solved, otherwise the estimate inherited from its
    /// parent.
    pub fn sub_bound(&self, sub: Sub) -> f64 {
        self.mip.jobs[&sub.0].lp_obj
    }

    /// The incumbent, if one has been found.
    pub fn incumbent(&self) -> Option<&Incumbent> {
        self.mip.best.as_ref()
    }

    /// Objective value of the most recent LP relaxation solve.
    pub fn obj_val(&self) -> f64 {
        self.mip.tree.lp().obj_val()
    }

    /// Sum of fractionalities of the current relaxation solution. The
    /// integrality check runs once constraint generation has settled, so
    /// this reads zero before [`Event::GenCut`] and [`Event::Branch`].
    pub fn sum_infeas(&self) -> f64 {
        self.mip.ii_sum
    }

    /// Number of integer-infeasible variables in the current relaxation
    /// solution; populated together with
    /// [`sum_infeas`](MipContext::sum_infeas).
    pub fn num_frac(&self) -> usize {
        self.mip.unsat
    }

    /// The integer-infeasible variables of the current relaxation
    /// solution, in creation order; populated together with
    /// [`sum_infeas`](MipContext::sum_infeas).
    pub fn frac_vars(&self) -> Vec<Var> {
        let mut out = Vec::new();
        let mut col = self.mip.tree.next_master_col(None);
        while let Some(c) = col {
            if self.mip.vars.get(&c).map_or(false, |v| v.infeas) {
                out.push(Var(c));
            }
            col = self.mip.tree.next_master_col(Some(c));
        }
        out
    }

    /// Primal value of a variable in the current relaxation solution;
    /// variables missing from the current subproblem are zero by
    /// definition.
    pub fn var_value(&self, var: Var) -> Result<f64> {
        if !self.mip.vars.contains_key(&var.0) {
            return Err(Error::ItemRemoved);
        }
        Ok(match self.mip.tree.col_bind(var.0) {
            Some(_) => self.mip.tree.col_info(var.0).1,
            None => 0.0,
        })
    }

    /// Status, primal value and reduced cost of a variable, or `None` if
    /// it is missing from the current subproblem.
    pub fn var_info(&self, var: Var) -> Result<Option<(BasisStatus, f64, f64)>> {
        if !self.mip.vars.contains_key(&var.0) {
            return Err(Error::ItemRemoved);
        }
        Ok(self
            .mip
            .tree
            .col_bind(var.0)
            .map(|_| self.mip.tree.col_info(var.0)))
    }

    /// Status, primal value and reduced cost of a constraint's auxiliary
    /// variable, or `None` if the constraint is missing from the current
    /// subproblem.
    pub fn con_info(&self, con: Con) -> Result<Option<(BasisStatus, f64, f64)>> {
        if !self.mip.cons.contains_key(&con.0) {
            return Err(Error::ItemRemoved);
        }
        Ok(self
            .mip
            .tree
            .row_bind(con.0)
            .map(|_| self.mip.tree.row_info(con.0)))
    }

    /// Local bounds of a variable in the current subproblem; falls back
    /// to the master defaults when the variable is not included.
    pub fn var_bounds(&self, var: Var) -> Result<Bounds> {
        if !self.mip.vars.contains_key(&var.0) {
            return Err(Error::ItemRemoved);
        }
        Ok(match self.mip.tree.col_bind(var.0) {
            Some(_) => self.mip.tree.col_bounds(var.0),
            None => self.mip.tree.master_bounds(Item::Col(var.0)),
        })
    }

    /// Kind of a variable.
    pub fn var_kind(&self, var: Var) -> Result<VarKind> {
        self.mip
            .vars
            .get(&var.0)
            .map(|v| v.kind)
            .ok_or(Error::ItemRemoved)
    }

    /// Number of rows in the current subproblem.
    pub fn num_rows(&self) -> usize {
        self.mip.tree.num_rows()
    }

    /// Number of columns in the current subproblem.
    pub fn num_cols(&self) -> usize {
        self.mip.tree.num_cols()
    }

    /// Store application-specific information on a variable.
    pub fn set_var_link(&mut self, var: Var, link: u64) {
        self.mip.tree.set_item_link(Item::Col(var.0), link);
    }

    /// Retrieve application-specific information from a variable.
    pub fn var_link(&self, var: Var) -> u64 {
        self.mip.tree.item_link(Item::Col(var.0))
    }

    /// Store application-specific information on a constraint.
    pub fn set_con_link(&mut self, con: Con, link: u64) {
        self.mip.tree.set_item_link(Item::Row(con.0), link);
    }

    /// Retrieve application-specific information from a constraint.
    pub fn con_link(&self, con: Con) -> u64 {
        self.mip.tree.item_link(Item::Row(con.0))
    }

    /// The application link of the item being destroyed. Only legal
    /// during [`Event::DelVar`] and [`Event::DelCon`], where the master
    /// item itself is already gone.
    pub fn link(&self) -> u64 {
        self.legal(
            matches!(self.event, Event::DelVar(_) | Event::DelCon(_)),
            "link",
        );
        self.mip.this_removal.expect("no removal payload")
    }
}

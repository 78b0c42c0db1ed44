//! Default branching and backtracking rules, applied whenever the
//! application declines to choose during the corresponding events.

use crate::constants::{
    BacktrackRule, BasisStatus, BranchRule, LpStatus, ObjDir, VarKind, DEGRADATION_ROUND_TOL,
    RATIO_TEST_TOL,
};
use crate::engine::{LpEngine, RatioDir, VarRef};
use crate::master::Col;
use crate::mip::{Heir, Mip};
use crate::tree::{NodeId, NodeState};

/// Pick a branching column and heir with the configured rule. At least
/// one column must be flagged integer infeasible.
pub(crate) fn branch<E: LpEngine>(mip: &Mip<E>) -> (Col, Heir) {
    match mip.params.branch_rule {
        BranchRule::First => branch_first(mip, false),
        BranchRule::Last => branch_first(mip, true),
        BranchRule::DriebeekTomlin => branch_drtom(mip),
    }
}

/// Branch on the first (or last) fractional integer column in creation
/// order; continue with the branch whose bound is the closer integer.
fn branch_first<E: LpEngine>(mip: &Mip<E>, last: bool) -> (Col, Heir) {
    let mut chosen = None;
    let mut col = mip.tree.next_master_col(None);
    while let Some(c) = col {
        col = mip.tree.next_master_col(Some(c));
        if mip.vars.get(&c).map_or(false, |v| v.infeas) {
            chosen = Some(c);
            if !last {
                break;
            }
        }
    }
    let chosen = chosen.expect("no fractional column to branch on");
    let (_, beta, _) = mip.tree.col_info(chosen);
    let heir = if beta - beta.floor() < beta.ceil() - beta {
        Heir::Down
    } else {
        Heir::Up
    };
    (chosen, heir)
}

/// The Driebeek-Tomlin heuristic: for every fractional integer column,
/// estimate the objective degradation of forcing it to its floor and to
/// its ceiling with a single implicit dual simplex step, then branch on
/// the column with the largest estimated degradation. The branch with the
/// smaller degradation is solved next, keeping the harder one in the tree
/// in the hope of pruning it.
///
/// Each candidate column costs one tableau-row evaluation, which makes
/// this rule noticeably more expensive than the positional ones.
fn branch_drtom<E: LpEngine>(mip: &Mip<E>) -> (Col, Heir) {
    let lp = mip.tree.lp();
    assert_eq!(lp.status(), LpStatus::Optimal);
    let dir = mip.dir;
    let mut chosen: Option<(Col, Heir)> = None;
    let mut degrad = -1.0f64;
    let mut col = mip.tree.next_master_col(None);
    while let Some(c) = col {
        col = mip.tree.next_master_col(Some(c));
        if !mip.vars.get(&c).map_or(false, |v| v.infeas) {
            continue;
        }
        let (_, beta, _) = mip.tree.col_info(c);
        let jj = mip.tree.col_bind(c).expect("fractional column is bound");
        // a fractional variable is basic; expand its tableau row
        let row = lp.eval_tab_row(VarRef::Struct(jj));
        let mut dn_z = 0.0;
        let mut up_z = 0.0;
        for &down in &[true, false] {
            // forcing the variable to its floor pushes it down and out of
            // the basis, to its ceiling up; the dual ratio test names the
            // non-basic variable that restores dual feasibility
            let rdir = if down { RatioDir::Decrease } else { RatioDir::Increase };
            let delta_z = match lp.dual_ratio_test(&row, rdir, RATIO_TEST_TOL) {
                None => {
                    // the modified problem is primal infeasible; that
                    // branch degrades without limit
                    match dir {
                        ObjDir::Minimize => f64::INFINITY,
                        ObjDir::Maximize => f64::NEG_INFINITY,
                    }
                }
                Some(q) => {
                    let alfa = row
                        .iter()
                        .find(|&&(v, _)| v == q)
                        .map(|&(_, a)| a)
                        .expect("entering variable comes from the row");
                    let delta_j = if down { beta.floor() } else { beta.ceil() } - beta;
                    let mut delta_q = delta_j / alfa;
                    // an entering integer variable cannot change by less
                    // than one
                    if let VarRef::Struct(qj) = q {
                        let qc = mip.tree.jth_col(qj);
                        if mip.vars.get(&qc).map_or(false, |v| v.kind == VarKind::Integer)
                            && (delta_q - (delta_q + 0.5).floor()).abs() > DEGRADATION_ROUND_TOL
                        {
                            delta_q = if delta_q > 0.0 {
                                delta_q.ceil()
                            } else {
                                delta_q.floor()
                            };
                        }
                    }
                    let (tagx, _, mut dq) = match q {
                        VarRef::Aux(i) => lp.row_info(i),
                        VarRef::Struct(j) => lp.col_info(j),
                    };
                    // under dual degeneracy a near-zero reduced cost may
                    // carry the wrong sign
                    let wrong = match dir {
                        ObjDir::Minimize => {
                            (tagx == BasisStatus::NonbasicLower && dq < 0.0)
                                || (tagx == BasisStatus::NonbasicUpper && dq > 0.0)
                                || tagx == BasisStatus::NonbasicFree
                        }
                        ObjDir::Maximize => {
                            (tagx == BasisStatus::NonbasicLower && dq > 0.0)
                                || (tagx == BasisStatus::NonbasicUpper && dq < 0.0)
                                || tagx == BasisStatus::NonbasicFree
                        }
                    };
                    if wrong {
                        dq = 0.0;
                    }
                    dq * delta_q
                }
            };
            if down {
                dn_z = delta_z.abs();
            } else {
                up_z = delta_z.abs();
            }
        }
        if degrad < dn_z || degrad < up_z {
            if dn_z < up_z {
                chosen = Some((c, Heir::Down));
                degrad = up_z;
            } else {
                chosen = Some((c, Heir::Up));
                degrad = dn_z;
            }
            // an infeasible branch cannot be beaten; stop looking
            if degrad == f64::INFINITY {
                break;
            }
        }
    }
    chosen.expect("no fractional column to branch on")
}

/// Pick the next active subproblem with the configured backtracking rule.
pub(crate) fn backtrack<E: LpEngine>(mip: &Mip<E>) -> NodeId {
    match mip.params.backtrack_rule {
        BacktrackRule::Lifo => btrack_lifo(mip),
        BacktrackRule::Fifo => btrack_fifo(mip),
        BacktrackRule::BestProjection => btrack_bestp(mip),
    }
}

/// Depth-first: new subproblems land at the end of the chronological
/// list, so the last node is always active.
fn btrack_lifo<E: LpEngine>(mip: &Mip<E>) -> NodeId {
    let node = mip.tree.prev_node(None).expect("tree is empty");
    assert_eq!(mip.tree.node_state(node), NodeState::Active);
    node
}

/// Breadth-first: the chronologically first active subproblem.
fn btrack_fifo<E: LpEngine>(mip: &Mip<E>) -> NodeId {
    let mut node = mip.tree.next_node(None);
    while let Some(nd) = node {
        if mip.tree.node_state(nd) == NodeState::Active {
            return nd;
        }
        node = mip.tree.next_node(Some(nd));
    }
    panic!("no active subproblem");
}

/// Best-first before an incumbent exists, best projection afterwards:
/// estimate each active subproblem's achievable objective by charging its
/// parent's sum of fractionalities at the per-unit degradation observed
/// between the root relaxation and the incumbent.
fn btrack_bestp<E: LpEngine>(mip: &Mip<E>) -> NodeId {
    let s = mip.dir.sign();
    let root = mip.tree.next_node(None).expect("tree is empty");
    if mip.tree.node_state(root) == NodeState::Active {
        // the root is the only subproblem
        return root;
    }
    let mut chosen = None;
    let mut best_val = f64::INFINITY;
    if !mip.found {
        let mut node = mip.tree.next_node(Some(root));
        while let Some(nd) = node {
            node = mip.tree.next_node(Some(nd));
            if mip.tree.node_state(nd) != NodeState::Active {
                continue;
            }
            let parent = mip.tree.node_parent(nd).expect("active non-root has a parent");
            let val = s * mip.jobs[&parent].lp_obj;
            if val < best_val {
                best_val = val;
                chosen = Some(nd);
            }
        }
    } else {
        let root_job = mip.jobs[&root];
        let incumbent = mip.best.as_ref().unwrap().obj;
        assert!(root_job.ii_sum > 0.0);
        let deg = s * (incumbent - root_job.lp_obj) / root_job.ii_sum;
        let mut node = mip.tree.next_node(Some(root));
        while let Some(nd) = node {
            node = mip.tree.next_node(Some(nd));
            if mip.tree.node_state(nd) != NodeState::Active {
                continue;
            }
            let parent = mip.tree.node_parent(nd).expect("active non-root has a parent");
            let pj = mip.jobs[&parent];
            assert!(pj.ii_sum > 0.0);
            let val = s * pj.lp_obj + deg * pj.ii_sum;
            if val < best_val {
                best_val = val;
                chosen = Some(nd);
            }
        }
    }
    chosen.expect("no active subproblem")
}

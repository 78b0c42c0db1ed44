//! An implicit enumeration toolkit for mixed-integer linear programming.
//!
//! The crate maintains a rooted tree of LP subproblems over a shared
//! *master set* of rows and columns. Subproblems are stored as patch
//! lists against their parents; a single live LP mirror holds the current
//! subproblem, and switching between subproblems replays only the
//! symmetric difference along the tree path. On top of the tree sits a
//! branch-and-cut driver with reduced-cost column pricing, primal
//! feasibility recovery, cut and constraint generation through an event
//! callback protocol, and configurable branching and backtracking rules.
//!
//! The simplex engine itself is external: the tree is generic over the
//! [`LpEngine`] trait, and [`DenseSimplex`](dense::DenseSimplex) is a
//! small bundled reference implementation.
//!
//! ## Example
//!
//! ```
//! use arbor::prelude::*;
//!
//! // maximise 3x + 5y subject to 2x + 4y <= 7 with x, y integer in [0, 2]
//! let mut mip = Mip::new(
//!     Some("knapsack"),
//!     ObjDir::Maximize,
//!     DenseSimplex::new(),
//!     Params::default(),
//! );
//! let exit = mip.drive(&mut |ctx: &mut MipContext<DenseSimplex>| {
//!     if ctx.event() == Event::Init {
//!         let x = ctx.add_var(Some("x"), VarKind::Integer, VarScope::Static,
//!             Bounds::Double(0.0, 2.0), 3.0, &[]);
//!         let y = ctx.add_var(Some("y"), VarKind::Integer, VarScope::Static,
//!             Bounds::Double(0.0, 2.0), 5.0, &[]);
//!         ctx.add_con(Some("cap"), Bounds::Upper(7.0), &[(x, 2.0), (y, 4.0)]);
//!     }
//! });
//! assert_eq!(exit, Exit::Ok);
//! assert_eq!(mip.best().unwrap().obj, 8.0);
//! ```

pub mod dense;
pub mod engine;
pub mod events;
pub mod master;
pub mod mip;
pub mod prelude;
pub mod tree;

pub(crate) mod constants;
pub(crate) mod rules;

mod error;

pub use constants::{
    BacktrackRule, BasisStatus, Bounds, BranchRule, Exit, LpStatus, ObjDir, SolveOutcome, VarKind,
    VarScope, BOUND_ROUND_TOL, DEGRADATION_ROUND_TOL, INFINITY, INT_FEAS_TOL, OBJ_TOL,
    PRICING_CHECK_TOL, PRICING_TOL, RATIO_TEST_TOL,
};
pub use engine::{LpEngine, RatioDir, SimplexControl, VarRef};
pub use error::{Error, Result};
pub use events::{Con, Event, EventHandler, MipContext, Var};
pub use master::{Col, Item, ItemFilter, ItemHook, MasterHandle, Row};
pub use mip::{Heir, Incumbent, Mip, Params, Problem, ProblemCol, ProblemRow, Sub};
pub use tree::{NodeHook, NodeId, NodeState, Removal, Tree, TreeConfig};

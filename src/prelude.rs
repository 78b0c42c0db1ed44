//! Most commonly used items from this crate bundled for convenient import.

pub use crate::dense::DenseSimplex;
pub use crate::engine::{LpEngine, SimplexControl};
pub use crate::events::{Con, Event, EventHandler, MipContext, Var};
pub use crate::mip::{Heir, Incumbent, Mip, Params, Problem, ProblemCol, ProblemRow, Sub};
pub use crate::{
    BacktrackRule, BasisStatus, Bounds, BranchRule, Error, Exit, LpStatus, ObjDir, VarKind,
    VarScope, INFINITY,
};

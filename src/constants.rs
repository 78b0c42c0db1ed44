//! Core enums and named numeric tolerances shared across the crate.

/// A large constant used to represent numeric infinity.
pub const INFINITY: f64 = 1e100;

/// Reduced costs above `-PRICING_TOL` are treated as dual feasible during
/// column pricing.
pub const PRICING_TOL: f64 = 1e-7;

/// Relative tolerance for recognising a stored bound as integral. Bounds
/// of integer variables further than this from the nearest integer are a
/// caller error.
pub const BOUND_ROUND_TOL: f64 = 1e-12;

/// Default relative integer-feasibility tolerance.
pub const INT_FEAS_TOL: f64 = 1e-6;

/// Default relative objective-improvement tolerance.
pub const OBJ_TOL: f64 = 1e-7;

/// Relative tolerance used by the debug cross-check of predicted reduced
/// costs against their recomputed values after column inclusion.
pub const PRICING_CHECK_TOL: f64 = 1e-5;

/// Pivot tolerance passed to the dual ratio test when estimating branching
/// degradations.
pub const RATIO_TEST_TOL: f64 = 1e-8;

/// A basis change of an integer variable is rounded away from zero unless
/// it is already within this distance of an integer.
pub const DEGRADATION_ROUND_TOL: f64 = 1e-3;

/// Type and bounds of a row or column variable.
///
/// Rows bound their auxiliary (activity) variable, columns bound their
/// structural variable:
///
/// | Variant        | Feasible values      |
/// |----------------|----------------------|
/// | `Free`         | `-inf <  x <  +inf`  |
/// | `Lower(lb)`    | `  lb <= x <  +inf`  |
/// | `Upper(ub)`    | `-inf <  x <=  ub `  |
/// | `Double(l, u)` | `   l <= x <=  u  `  |
/// | `Fixed(v)`     | `        x  =  v  `  |
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Bounds {
    Free,
    Lower(f64),
    Upper(f64),
    Double(f64, f64),
    Fixed(f64),
}

impl Bounds {
    /// The lower bound, if one exists.
    pub fn lb(&self) -> Option<f64> {
        match *self {
            Bounds::Free | Bounds::Upper(_) => None,
            Bounds::Lower(lb) | Bounds::Double(lb, _) | Bounds::Fixed(lb) => Some(lb),
        }
    }

    /// The upper bound, if one exists.
    pub fn ub(&self) -> Option<f64> {
        match *self {
            Bounds::Free | Bounds::Lower(_) => None,
            Bounds::Upper(ub) | Bounds::Double(_, ub) => Some(ub),
            Bounds::Fixed(v) => Some(v),
        }
    }

    pub(crate) fn validate(&self, routine: &str) {
        if let Bounds::Double(lb, ub) = *self {
            if lb > ub {
                panic!("{}: lb = {}; ub = {}; inconsistent double bounds", routine, lb, ub);
            }
        }
    }
}

/// Status of a row or column variable in a basic solution.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BasisStatus {
    /// Basic variable.
    Basic,
    /// Non-basic variable on its lower bound.
    NonbasicLower,
    /// Non-basic variable on its upper bound.
    NonbasicUpper,
    /// Non-basic free (unbounded) variable.
    NonbasicFree,
    /// Non-basic fixed variable.
    NonbasicFixed,
}

impl BasisStatus {
    /// Degrade a requested status to one that is legal for the given bound
    /// type. `NonbasicUpper` on anything but a double-bounded variable
    /// falls back to the status of the natural bound; non-basic statuses on
    /// fixed variables become `NonbasicFixed`, and so on. `Basic` is always
    /// legal.
    pub fn normalized_for(self, bounds: Bounds) -> BasisStatus {
        use self::BasisStatus::*;
        if self == Basic {
            return Basic;
        }
        match bounds {
            Bounds::Free => NonbasicFree,
            Bounds::Lower(_) => NonbasicLower,
            Bounds::Upper(_) => NonbasicUpper,
            Bounds::Fixed(_) => NonbasicFixed,
            Bounds::Double(..) => {
                if self == NonbasicUpper {
                    NonbasicUpper
                } else {
                    NonbasicLower
                }
            }
        }
    }
}

/// Direction of optimisation.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ObjDir {
    Minimize,
    Maximize,
}

impl ObjDir {
    /// `+1.0` for minimisation, `-1.0` for maximisation. Multiplying an
    /// objective value by this factor turns "better" into "smaller".
    pub(crate) fn sign(self) -> f64 {
        match self {
            ObjDir::Minimize => 1.0,
            ObjDir::Maximize => -1.0,
        }
    }
}

/// Status of the basic solution held by an LP engine.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LpStatus {
    /// No solution information is available.
    Undefined,
    /// The solution is optimal.
    Optimal,
    /// The problem has no primal feasible solution.
    Infeasible,
}

/// Exit condition reported by a single simplex run.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SolveOutcome {
    /// The search terminated normally; consult [`LpStatus`] for the result.
    Ok,
    /// The objective fell below the configured lower limit while improving.
    ObjLowerLimit,
    /// The objective rose above the configured upper limit while improving.
    ObjUpperLimit,
    /// The iteration budget was exhausted before termination.
    IterLimit,
}

/// Kind of a decision variable.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum VarKind {
    Continuous,
    Integer,
}

/// Scope of a decision variable within the search.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum VarScope {
    /// Included in every subproblem.
    Static,
    /// Included in a subproblem only when its reduced cost demands it.
    /// Dynamic variables must have a zero lower bound.
    Dynamic,
}

/// Rule used to pick a branching variable when the application declines to.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BranchRule {
    /// Branch on the first fractional integer variable.
    First,
    /// Branch on the last fractional integer variable.
    Last,
    /// Estimate per-variable objective degradation with one dual ratio test
    /// per fractional variable and branch where it is largest.
    DriebeekTomlin,
}

/// Rule used to select the next active subproblem when the application
/// declines to.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BacktrackRule {
    /// Most recently created active subproblem (depth-first search).
    Lifo,
    /// Least recently created active subproblem (breadth-first search).
    Fifo,
    /// Best parent bound before an incumbent exists, best projected
    /// objective afterwards.
    BestProjection,
}

/// Exit code of the branch-and-cut driver.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Exit {
    /// The search is complete.
    Ok,
    /// The simplex iteration limit was exhausted.
    IterLimit,
    /// The solved-subproblem limit was exhausted.
    SubLimit,
    /// The wall-clock limit was exhausted.
    TimeLimit,
    /// The LP engine failed on a relaxation; the search cannot continue.
    LpError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_accessors() {
        assert_eq!(Bounds::Free.lb(), None);
        assert_eq!(Bounds::Free.ub(), None);
        assert_eq!(Bounds::Lower(1.5).lb(), Some(1.5));
        assert_eq!(Bounds::Lower(1.5).ub(), None);
        assert_eq!(Bounds::Double(-1.0, 2.0).lb(), Some(-1.0));
        assert_eq!(Bounds::Double(-1.0, 2.0).ub(), Some(2.0));
        assert_eq!(Bounds::Fixed(3.0).lb(), Some(3.0));
        assert_eq!(Bounds::Fixed(3.0).ub(), Some(3.0));
    }

    #[test]
    fn status_normalization() {
        use BasisStatus::*;
        assert_eq!(NonbasicUpper.normalized_for(Bounds::Lower(0.0)), NonbasicLower);
        assert_eq!(NonbasicUpper.normalized_for(Bounds::Double(0.0, 1.0)), NonbasicUpper);
        assert_eq!(NonbasicLower.normalized_for(Bounds::Fixed(2.0)), NonbasicFixed);
        assert_eq!(Basic.normalized_for(Bounds::Free), Basic);
        assert_eq!(NonbasicLower.normalized_for(Bounds::Free), NonbasicFree);
    }

    #[test]
    #[should_panic(expected = "inconsistent double bounds")]
    fn inconsistent_double_bounds() {
        Bounds::Double(2.0, 1.0).validate("test");
    }
}

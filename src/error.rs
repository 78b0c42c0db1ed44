/// The error type for recoverable failures in this crate.
///
/// Caller contract violations (stale handles passed across trees, patching
/// an inactive subproblem, duplicate matrix coefficients and the like) are
/// not represented here; they panic with a diagnostic naming the offending
/// routine, since they indicate a bug in the embedding application.
#[derive(Debug, PartialEq)]
pub enum Error {
    /// Attempt to delete a master item that is still referenced by a
    /// subproblem patch list or bound in the current subproblem.
    InUse,

    /// Querying or modifying a master item that has been removed.
    ItemRemoved,

    /// A handle from a different tree was used.
    ItemMismatch,

    /// An integer variable carries a non-integral bound.
    NonIntegerBound(f64),

    /// An operation required an optimal basic solution which is not
    /// available.
    NotOptimal,

    /// The LP engine failed or reported a status the caller cannot handle.
    LpEngine(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::InUse => f.write_str("master item is still in use"),
            Error::ItemRemoved => f.write_str("master item has been removed"),
            Error::ItemMismatch => f.write_str("master item belongs to a different tree"),
            Error::NonIntegerBound(b) => {
                write!(f, "integer variable has non-integer bound {}", b)
            }
            Error::NotOptimal => f.write_str("optimal basic solution required"),
            Error::LpEngine(msg) => write!(f, "LP engine: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

/// A specialized [`Result`](std::result::Result) type for operations in
/// this crate.
pub type Result<T> = std::result::Result<T, Error>;

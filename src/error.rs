//! Error taxonomy for the solver core.
//!
//! Mirrors the flat, `thiserror`-derived enum style used throughout the
//! rest of the crate's numerical core: one enum, precise variants, no
//! nested error hierarchies.

use thiserror::Error;

/// The small enumeration of outcomes every solver operation can return.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A workspace buffer could not be allocated. `alloc()` constructors
    /// release every buffer acquired so far before returning this.
    #[error("failed to allocate workspace: {0}")]
    OutOfMemory(&'static str),

    /// A bracket was inverted, an interior point fell outside its
    /// bracket, a dimension mismatch was detected, or some other
    /// precondition on caller-supplied arguments failed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A user callback (`Residuals::eval`, `Jacobian::eval_jacobian`,
    /// `GeodesicAccel::eval_fvv`, `ScalarFn::eval`) reported failure.
    /// Propagated verbatim; the core never retries a failed callback.
    #[error("callback reported a domain error: {0}")]
    Domain(String),

    /// 15 consecutive LM trial steps failed to reduce the cost, or the
    /// hybrid method's `nslow1` counter reached 10.
    #[error("no progress: {0} consecutive trial steps failed to reduce the residual")]
    NoProgress(usize),

    /// The hybrid method's `nslow2` counter reached 5: re-evaluating the
    /// Jacobian did not restore convergence.
    #[error("no progress: jacobian re-evaluation did not restore convergence")]
    NoProgressJacobian,

    /// A bounds-checked container accessor was called out of range
    /// while `range_check_enabled()` was true.
    #[error("index out of range")]
    Range,

    /// `iterate()` (or an accessor that depends on it) was called
    /// before `set()`/`set_with_values()`.
    #[error("operation requires set() to be called first")]
    StateNotSet,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

//! Multidimensional root finding: `f(x) = 0` for square systems.
//!
//! [`Hybrid`] is Powell's dogleg method (the `hybridj`/`hybridsj`
//! variants); [`GlobalNewton`] is the backtracking Newton method
//! (`gnewton`). Both take a reference to the caller's [`Jacobian`]
//! system and own their own iteration state, with no shared driver
//! trait between them — their step-acceptance logic differs enough
//! (trust region vs. line search) that a shared trait would only
//! abstract over the names, not the behavior.

pub mod gnewton;
pub mod hybrid;

pub use gnewton::GlobalNewton;
pub use hybrid::Hybrid;

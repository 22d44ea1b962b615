//! Levenberg-Marquardt nonlinear least squares.
//!
//! [`LmWorkspace`] is the driver; [`LmParameters`] selects the named
//! scale ([`scale`]), damping-update ([`update`]), and linear-solver
//! ([`linear_solver`]) strategies it plugs together, the same
//! three-axis configuration `gsl_multifit_nlinear_parameters` exposes.

pub mod lm;
pub mod linear_solver;
pub mod parameters;
pub mod scale;
pub mod update;

pub use lm::LmWorkspace;
pub use parameters::LmParameters;

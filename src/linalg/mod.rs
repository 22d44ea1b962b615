//! The linear-algebra adapter surface.
//!
//! Everything the core treats as a black-box primitive (dense vectors
//! and matrices, QR/LU factorization, symmetric eigendecomposition) is
//! concentrated here, wrapping `nalgebra`. The rest of the crate never
//! calls `nalgebra` directly outside this module and `helpers`, so the
//! backend stays swappable, matching spec.md's "Non-goals: storage
//! layouts... are not specified here".

pub mod eigen;
pub mod helpers;
pub mod lu;
pub mod qr;

pub use helpers::{checked_get, compute_delta, compute_diag, enorm, enorm_sum, scaled_enorm, update_diag};

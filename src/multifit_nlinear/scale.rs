//! Diagonal scaling strategies for the trust region.
//!
//! Grounded on `scale->init`/`scale->update` in `lm_init`/`lm_iterate`
//! (`multifit_nlinear/lm.c`). `more` and `marquardt` both use the
//! monotonically non-decreasing column-norm update; they differ only
//! in name (both originate from the same `compute_diag`/`update_diag`
//! pair in GSL). `levenberg` is the one variant that actually behaves
//! differently: a fixed, unscaled trust region.

use nalgebra::{DMatrix, DVector};

use crate::linalg::{compute_diag, update_diag};

pub trait ScaleMethod {
    fn name(&self) -> &'static str;
    fn init(&self, j: &DMatrix<f64>) -> DVector<f64>;
    fn update(&self, j: &DMatrix<f64>, diag: &mut DVector<f64>);
}

/// Column norms of `J`, monotonically non-decreasing across iterations
/// (Moré's original trust-region scaling).
pub struct More;

impl ScaleMethod for More {
    fn name(&self) -> &'static str {
        "more"
    }
    fn init(&self, j: &DMatrix<f64>) -> DVector<f64> {
        compute_diag(j)
    }
    fn update(&self, j: &DMatrix<f64>, diag: &mut DVector<f64>) {
        update_diag(j, diag)
    }
}

/// A fixed, unscaled trust region: `diag` is all ones, never updated.
pub struct Levenberg;

impl ScaleMethod for Levenberg {
    fn name(&self) -> &'static str {
        "levenberg"
    }
    fn init(&self, j: &DMatrix<f64>) -> DVector<f64> {
        DVector::from_element(j.ncols(), 1.0)
    }
    fn update(&self, _j: &DMatrix<f64>, _diag: &mut DVector<f64>) {}
}

/// Column norms of `J`, monotonically non-decreasing across
/// iterations, same as `More` — the two variants are distinguished by
/// name only.
pub struct Marquardt;

impl ScaleMethod for Marquardt {
    fn name(&self) -> &'static str {
        "marquardt"
    }
    fn init(&self, j: &DMatrix<f64>) -> DVector<f64> {
        compute_diag(j)
    }
    fn update(&self, j: &DMatrix<f64>, diag: &mut DVector<f64>) {
        update_diag(j, diag)
    }
}

pub fn by_name(name: &str) -> Option<Box<dyn ScaleMethod>> {
    match name {
        "more" => Some(Box::new(More)),
        "levenberg" => Some(Box::new(Levenberg)),
        "marquardt" => Some(Box::new(Marquardt)),
        _ => None,
    }
}

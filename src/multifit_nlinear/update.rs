//! Damping-parameter update rules.
//!
//! `update->init` seeds `mu` from the diagonal of `J^T J`; `update->accept`
//! and `update->reject` adjust it after each trial step, mirroring the two
//! named rules common to trust-region LM implementations. Unlike
//! `ScaleMethod`, these carry their own state (Nielsen's `nu` factor), so
//! the driver owns one boxed instance per run rather than a stateless
//! strategy object.

use nalgebra::DMatrix;

const INITIAL_TAU: f64 = 1.0e-3;

fn max_diagonal(jtj: &DMatrix<f64>) -> f64 {
    (0..jtj.ncols()).map(|k| jtj[(k, k)]).fold(0.0, f64::max)
}

pub trait UpdateMethod {
    fn name(&self) -> &'static str;
    /// Seeds `mu` from `J^T J` at the starting point.
    fn init(&mut self, jtj: &DMatrix<f64>) -> f64;
    /// Called when a trial step is accepted; `rho` is the gain ratio.
    fn accept(&mut self, rho: f64, mu: f64) -> f64;
    /// Called when a trial step is rejected.
    fn reject(&mut self, mu: f64) -> f64;
}

/// Nielsen's rule: `mu *= max(1/3, 1 - (2*rho - 1)^3)` on acceptance
/// (and `nu` resets to 2), `mu *= nu; nu *= 2` on rejection.
pub struct Nielsen {
    nu: f64,
}

impl Nielsen {
    pub fn new() -> Self {
        Self { nu: 2.0 }
    }
}

impl UpdateMethod for Nielsen {
    fn name(&self) -> &'static str {
        "nielsen"
    }
    fn init(&mut self, jtj: &DMatrix<f64>) -> f64 {
        self.nu = 2.0;
        INITIAL_TAU * max_diagonal(jtj)
    }
    fn accept(&mut self, rho: f64, mu: f64) -> f64 {
        let factor = (1.0 - (2.0 * rho - 1.0).powi(3)).max(1.0 / 3.0);
        self.nu = 2.0;
        mu * factor
    }
    fn reject(&mut self, mu: f64) -> f64 {
        let new_mu = mu * self.nu;
        self.nu *= 2.0;
        new_mu
    }
}

/// Moré's rule: a bounded factor-of-10-per-step adjustment gated on
/// whether `rho` clears the 1/4 and 3/4 thresholds.
pub struct More;

impl UpdateMethod for More {
    fn name(&self) -> &'static str {
        "more"
    }
    fn init(&mut self, jtj: &DMatrix<f64>) -> f64 {
        INITIAL_TAU * max_diagonal(jtj)
    }
    fn accept(&mut self, rho: f64, mu: f64) -> f64 {
        if rho > 0.75 {
            mu * 0.1
        } else if rho < 0.25 {
            mu * 10.0
        } else {
            mu
        }
    }
    fn reject(&mut self, mu: f64) -> f64 {
        mu * 10.0
    }
}

pub fn by_name(name: &str) -> Option<Box<dyn UpdateMethod>> {
    match name {
        "nielsen" => Some(Box::new(Nielsen::new())),
        "more" => Some(Box::new(More)),
        _ => None,
    }
}

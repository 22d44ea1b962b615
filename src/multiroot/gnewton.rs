//! Globally convergent Newton's method: a plain LU-solved Newton step,
//! backed off with a quadratic-interpolation line search whenever the
//! full step would increase `|f|`.
//!
//! Reimplements `gnewton_set`/`gnewton_iterate` from
//! `multiroots/gnewton.c`.

use nalgebra::{DMatrix, DVector};

use crate::error::{Error, Result};
use crate::linalg::{checked_get, enorm, lu};
use crate::statistics::Statistics;
use crate::system::Jacobian;

pub struct GlobalNewton<'a, S: Jacobian> {
    system: &'a S,
    x: DVector<f64>,
    f: DVector<f64>,
    j: DMatrix<f64>,
    phi: f64,
    stats: Statistics,
    is_set: bool,
}

impl<'a, S: Jacobian> GlobalNewton<'a, S> {
    pub fn new(system: &'a S) -> Self {
        let n = system.nequations();
        let p = system.nparams();
        Self {
            system,
            x: DVector::zeros(p),
            f: DVector::zeros(n),
            j: DMatrix::zeros(n, p),
            phi: 0.0,
            stats: Statistics::default(),
            is_set: false,
        }
    }

    pub fn set(&mut self, x0: DVector<f64>) -> Result<()> {
        if x0.len() != self.system.nparams() {
            return Err(Error::InvalidArgument(format!(
                "expected {} parameters, got {}",
                self.system.nparams(),
                x0.len()
            )));
        }
        self.x = x0;
        self.system
            .eval_residuals_and_jacobian(&self.x, &mut self.f, &mut self.j)?;
        self.phi = enorm(&self.f);
        self.stats = Statistics::default();
        self.is_set = true;
        Ok(())
    }

    pub fn iterate(&mut self) -> Result<()> {
        if !self.is_set {
            return Err(Error::StateNotSet);
        }

        let d = lu::solve(&self.j, &self.f)?;

        let phi0 = self.phi;
        let mut t = 1.0_f64;

        loop {
            let x_trial = &self.x - &d * t;
            let mut f_trial = DVector::zeros(self.system.nequations());
            self.system.eval(&x_trial, &mut f_trial)?;
            let phi1 = enorm(&f_trial);

            if phi1 > phi0 && t > f64::EPSILON {
                let theta = phi1 / phi0;
                let u = ((1.0 + 6.0 * theta).sqrt() - 1.0) / (3.0 * theta);
                t *= u;
                continue;
            }

            self.x = x_trial;
            self.f = f_trial;
            self.phi = phi1;
            break;
        }

        self.system.eval_jacobian(&self.x, &mut self.j)?;
        self.stats.record_jacobian_eval();
        self.stats.record_accept();
        Ok(())
    }

    pub fn x(&self) -> &DVector<f64> {
        &self.x
    }

    pub fn residuals(&self) -> &DVector<f64> {
        &self.f
    }

    /// `x()[i]`, bounds-checked against `range_check_enabled()`.
    pub fn x_at(&self, i: usize) -> Result<f64> {
        checked_get(&self.x, i)
    }

    /// `residuals()[i]`, bounds-checked against `range_check_enabled()`.
    pub fn residual_at(&self, i: usize) -> Result<f64> {
        checked_get(&self.f, i)
    }

    pub fn phi(&self) -> f64 {
        self.phi
    }

    pub fn statistics(&self) -> Statistics {
        self.stats
    }

    /// Runs `iterate()` until `phi() < tol` or `max_iterations` is
    /// reached, whichever comes first. Returns the number of
    /// iterations actually taken.
    pub fn solve(&mut self, tol: f64, max_iterations: usize) -> Result<usize> {
        if !self.is_set {
            return Err(Error::StateNotSet);
        }
        let mut taken = 0;
        while self.phi > tol && taken < max_iterations {
            self.iterate()?;
            taken += 1;
        }
        Ok(taken)
    }
}

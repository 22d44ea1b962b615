//! The Levenberg-Marquardt trust-region driver.
//!
//! Reimplements `lm_alloc`/`lm_init`/`lm_iterate` from
//! `multifit_nlinear/lm.c`: one call to `solve_vel` (and, with geodesic
//! acceleration enabled, `solve_acc` against the same factorization)
//! produces a trial step; the step is scored by a trust-region gain
//! ratio and either committed (re-evaluating `J` at the new point) or
//! rejected (only the damping parameter changes). Fifteen consecutive
//! rejections is `Error::NoProgress`, matching `lm.c`'s hardcoded bound.

use nalgebra::{DMatrix, DVector};

use crate::error::{Error, Result};
use crate::linalg::eigen::symmetric_eigenvalues;
use crate::linalg::{checked_get, enorm};
use crate::statistics::Statistics;
use crate::system::{GeodesicAccel, Jacobian};

use super::linear_solver::{self, LmLinearSolver};
use super::parameters::LmParameters;
use super::scale::{self, ScaleMethod};
use super::update::{self, UpdateMethod};

const MAX_CONSECUTIVE_REJECTIONS: usize = 15;
const RHO_ACCEPT_THRESHOLD: f64 = 1.0e-4;

/// Borrowed rather than owned, matching the teacher's `SolverProblem<C>`.
pub struct LmWorkspace<'a, S: Jacobian + GeodesicAccel> {
    system: &'a S,
    params: LmParameters,
    scale: Box<dyn ScaleMethod>,
    update: Box<dyn UpdateMethod>,
    solver: Box<dyn LmLinearSolver>,

    x: DVector<f64>,
    f: DVector<f64>,
    j: DMatrix<f64>,
    diag: DVector<f64>,
    mu: f64,
    fnorm: f64,

    v: DVector<f64>,
    a: DVector<f64>,
    avratio: f64,

    bad_steps: usize,
    stats: Statistics,
    is_set: bool,
}

impl<'a, S: Jacobian + GeodesicAccel> LmWorkspace<'a, S> {
    pub fn new(system: &'a S) -> Result<Self> {
        Self::with_params(system, LmParameters::default())
    }

    pub fn with_params(system: &'a S, params: LmParameters) -> Result<Self> {
        let n = system.nequations();
        let p = system.nparams();
        let scale_method = scale::by_name(params.scale)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown scale method '{}'", params.scale)))?;
        let update_method = update::by_name(params.update)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown update method '{}'", params.update)))?;
        let solver = linear_solver::by_name(params.linear_solver).ok_or_else(|| {
            Error::InvalidArgument(format!("unknown linear solver '{}'", params.linear_solver))
        })?;

        Ok(Self {
            system,
            params,
            scale: scale_method,
            update: update_method,
            solver,
            x: DVector::zeros(p),
            f: DVector::zeros(n),
            j: DMatrix::zeros(n, p),
            diag: DVector::from_element(p, 1.0),
            mu: 0.0,
            fnorm: 0.0,
            v: DVector::zeros(p),
            a: DVector::zeros(p),
            avratio: 0.0,
            bad_steps: 0,
            stats: Statistics::default(),
            is_set: false,
        })
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
        self.diag = self.scale.init(&self.j);
        self.mu = self.update.init(&(self.j.transpose() * &self.j));
        self.v = DVector::zeros(self.system.nparams());
        self.a = DVector::zeros(self.system.nparams());
        self.avratio = 0.0;
        self.bad_steps = 0;
        self.fnorm = enorm(&self.f);
        self.stats = Statistics::default();
        self.is_set = true;
        Ok(())
    }

    pub fn iterate(&mut self) -> Result<()> {
        if !self.is_set {
            return Err(Error::StateNotSet);
        }

        loop {
            self.solver.init(&self.j, &self.diag, self.mu)?;
            let v = self.solver.solve_vel(&self.f)?;

            let mut a = DVector::zeros(self.system.nparams());
            let mut avratio = 0.0;
            if self.params.accel {
                let mut fvv = DVector::zeros(self.system.nequations());
                self.system.eval_fvv(&self.x, &v, &mut fvv)?;
                a = self.solver.solve_acc(&fvv)?;
                let vnorm = enorm(&v);
                avratio = if vnorm > 0.0 { enorm(&a) / vnorm } else { 0.0 };
                if avratio > self.params.avmax {
                    if !self.reject_step() {
                        return Err(Error::NoProgress(self.bad_steps));
                    }
                    continue;
                }
            }

            let dx = if self.params.accel {
                &v + 0.5 * &a
            } else {
                v.clone()
            };
            let x_trial = &self.x + &dx;
            let mut f_trial = DVector::zeros(self.system.nequations());
            self.system.eval(&x_trial, &mut f_trial)?;
            let fnorm_trial = enorm(&f_trial);

            let rho = self.gain_ratio(&dx, fnorm_trial);

            if rho > RHO_ACCEPT_THRESHOLD {
                self.x = x_trial;
                self.f = f_trial;
                self.system.eval_jacobian(&self.x, &mut self.j)?;
                self.stats.record_jacobian_eval();
                self.scale.update(&self.j, &mut self.diag);
                self.fnorm = fnorm_trial;
                self.mu = self.update.accept(rho, self.mu);
                self.v = v;
                self.a = a;
                self.avratio = avratio;
                self.bad_steps = 0;
                self.stats.record_accept();
                return Ok(());
            }

            if !self.reject_step() {
                return Err(Error::NoProgress(self.bad_steps));
            }
        }
    }

    fn reject_step(&mut self) -> bool {
        self.mu = self.update.reject(self.mu);
        self.bad_steps += 1;
        self.stats.record_reject();
        self.bad_steps <= MAX_CONSECUTIVE_REJECTIONS
    }

    /// Actual vs. predicted reduction in `|f|^2`.
    fn gain_ratio(&self, dx: &DVector<f64>, fnorm_trial: f64) -> f64 {
        if self.fnorm == 0.0 {
            return 0.0;
        }
        let jdx = &self.j * dx;
        let temp1 = enorm(&jdx) / self.fnorm;
        let scaled_dx = self.diag.component_mul(dx);
        let temp2 = self.mu.sqrt() * enorm(&scaled_dx) / self.fnorm;
        let predicted = temp1 * temp1 + 2.0 * temp2 * temp2;

        let ratio = fnorm_trial / self.fnorm;
        let actual = if ratio < 1.0 { 1.0 - ratio * ratio } else { -1.0 };

        if predicted > 0.0 {
            actual / predicted
        } else {
            0.0
        }
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

    pub fn residual_at(&self, i: usize) -> Result<f64> {
        checked_get(&self.f, i)
    }

    pub fn jacobian(&self) -> &DMatrix<f64> {
        &self.j
    }

    pub fn fnorm(&self) -> f64 {
        self.fnorm
    }

    pub fn statistics(&self) -> Statistics {
        self.stats
    }

    /// `sqrt(eval_min / eval_max)` of `J^T J`, or `0` if either
    /// eigenvalue is non-positive (a singular or indefinite Jacobian).
    pub fn rcond(&self) -> f64 {
        let jtj = self.j.transpose() * &self.j;
        let evals = symmetric_eigenvalues(&jtj);
        let (min, max) = evals
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(mn, mx), &e| {
                (mn.min(e), mx.max(e))
            });
        if min > 0.0 && max > 0.0 {
            (min / max).sqrt()
        } else {
            0.0
        }
    }

    pub fn avratio(&self) -> f64 {
        self.avratio
    }

    /// Runs until `fnorm() < tol` or `params.max_iterations`, whichever
    /// comes first; returns the iteration count taken.
    pub fn solve(&mut self, tol: f64) -> Result<usize> {
        if !self.is_set {
            return Err(Error::StateNotSet);
        }
        let mut taken = 0;
        while self.fnorm > tol && taken < self.params.max_iterations {
            self.iterate()?;
            taken += 1;
        }
        Ok(taken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::{Residuals};
    use approx::assert_relative_eq;
    use std::cell::RefCell;

    /// f1 = 10(x2 - x1^2), f2 = 1 - x1: the classic Rosenbrock residuals,
    /// minimized (to zero) at (1, 1).
    struct Rosenbrock;

    impl Residuals for Rosenbrock {
        fn nequations(&self) -> usize {
            2
        }
        fn nparams(&self) -> usize {
            2
        }
        fn eval(&self, x: &DVector<f64>, out: &mut DVector<f64>) -> Result<()> {
            out[0] = 10.0 * (x[1] - x[0] * x[0]);
            out[1] = 1.0 - x[0];
            Ok(())
        }
    }

    impl Jacobian for Rosenbrock {
        fn eval_jacobian(&self, x: &DVector<f64>, out: &mut DMatrix<f64>) -> Result<()> {
            out[(0, 0)] = -20.0 * x[0];
            out[(0, 1)] = 10.0;
            out[(1, 0)] = -1.0;
            out[(1, 1)] = 0.0;
            Ok(())
        }
    }

    impl GeodesicAccel for Rosenbrock {
        fn eval_fvv(&self, _x: &DVector<f64>, _v: &DVector<f64>, out: &mut DVector<f64>) -> Result<()> {
            out.fill(0.0);
            Ok(())
        }
    }

    #[test]
    fn converges_to_the_rosenbrock_minimum() {
        let system = Rosenbrock;
        let mut ws = LmWorkspace::new(&system).unwrap();
        ws.set(DVector::from_vec(vec![-1.2, 1.0])).unwrap();

        for _ in 0..100 {
            if ws.fnorm() < 1e-10 {
                break;
            }
            ws.iterate().unwrap();
        }

        assert_relative_eq!(ws.x()[0], 1.0, epsilon = 1e-6);
        assert_relative_eq!(ws.x()[1], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn solve_stops_at_tolerance_and_reports_iteration_count() {
        let system = Rosenbrock;
        let mut ws = LmWorkspace::new(&system).unwrap();
        ws.set(DVector::from_vec(vec![-1.2, 1.0])).unwrap();

        let taken = ws.solve(1e-10).unwrap();
        assert!(taken > 0);
        assert!(ws.fnorm() < 1e-10 || taken == ws.params.max_iterations);
        assert_relative_eq!(ws.x()[0], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn x_at_reports_range_error_past_the_end() {
        crate::range_check::set_range_check_enabled(true);
        let system = Rosenbrock;
        let mut ws = LmWorkspace::new(&system).unwrap();
        ws.set(DVector::from_vec(vec![-1.2, 1.0])).unwrap();
        assert_eq!(ws.x_at(1), Ok(1.0));
        assert_eq!(ws.x_at(2), Err(Error::Range));
    }

    #[test]
    fn accepted_steps_never_increase_fnorm() {
        let system = Rosenbrock;
        let mut ws = LmWorkspace::new(&system).unwrap();
        ws.set(DVector::from_vec(vec![-1.2, 1.0])).unwrap();

        let mut last = ws.fnorm();
        for _ in 0..30 {
            if ws.iterate().is_err() {
                break;
            }
            assert!(ws.fnorm() <= last + 1e-12);
            last = ws.fnorm();
        }
    }

    /// A system whose second evaluation reports a domain error, used to
    /// check that a failed trial evaluation leaves `x`/`f` untouched.
    struct FailsOnSecondCall {
        calls: RefCell<usize>,
    }

    impl Residuals for FailsOnSecondCall {
        fn nequations(&self) -> usize {
            1
        }
        fn nparams(&self) -> usize {
            1
        }
        fn eval(&self, x: &DVector<f64>, out: &mut DVector<f64>) -> Result<()> {
            let mut calls = self.calls.borrow_mut();
            *calls += 1;
            if *calls >= 2 {
                return Err(Error::Domain("residual is not finite".to_string()));
            }
            out[0] = x[0] * x[0] - 2.0;
            Ok(())
        }
    }

    impl Jacobian for FailsOnSecondCall {
        fn eval_jacobian(&self, x: &DVector<f64>, out: &mut DMatrix<f64>) -> Result<()> {
            out[(0, 0)] = 2.0 * x[0];
            Ok(())
        }
    }

    impl GeodesicAccel for FailsOnSecondCall {
        fn eval_fvv(&self, _x: &DVector<f64>, _v: &DVector<f64>, out: &mut DVector<f64>) -> Result<()> {
            out.fill(0.0);
            Ok(())
        }
    }

    #[test]
    fn a_failing_trial_evaluation_does_not_mutate_x_or_f() {
        let system = FailsOnSecondCall {
            calls: RefCell::new(0),
        };
        let mut ws = LmWorkspace::new(&system).unwrap();
        ws.set(DVector::from_vec(vec![1.0])).unwrap();

        let x_before = ws.x().clone();
        let f_before = ws.residuals().clone();

        let result = ws.iterate();
        assert!(matches!(result, Err(Error::Domain(_))));
        assert_eq!(ws.x(), &x_before);
        assert_eq!(ws.residuals(), &f_before);
    }
}

//! Powell's hybrid dogleg method for `f(x) = 0`, with a rank-1 Broyden
//! update of the QR-factored Jacobian between full re-evaluations.
//!
//! One implementation backs two named strategies exactly as
//! `multiroots/hybridj.c` does: `hybridj` never rescales the trust
//! region by the Jacobian's column norms (`diag` is all ones);
//! `hybridsj` does (`diag` tracks `compute_diag`/`update_diag`).
//! `Hybrid::new(system, scaled)` picks between them.

use nalgebra::{DMatrix, DVector};

use crate::error::{Error, Result};
use crate::linalg::{
    checked_get, compute_delta, compute_diag, enorm, enorm_sum, qr, scaled_enorm, update_diag,
};
use crate::statistics::Statistics;
use crate::system::Jacobian;

const P1: f64 = 0.1;
const P5: f64 = 0.5;
const P001: f64 = 0.001;
const P0001: f64 = 0.0001;
const DELTA_FACTOR: f64 = 100.0;

pub struct Hybrid<'a, S: Jacobian> {
    system: &'a S,
    scaled: bool,

    x: DVector<f64>,
    f: DVector<f64>,
    q: DMatrix<f64>,
    r: DMatrix<f64>,
    diag: DVector<f64>,

    iter: usize,
    ncfail: usize,
    ncsuc: usize,
    nslow1: usize,
    nslow2: usize,
    fnorm: f64,
    delta: f64,

    stats: Statistics,
    is_set: bool,
}

impl<'a, S: Jacobian> Hybrid<'a, S> {
    /// `scaled = false` gives `hybridj`; `scaled = true` gives `hybridsj`.
    pub fn new(system: &'a S, scaled: bool) -> Self {
        let n = system.nequations();
        Self {
            system,
            scaled,
            x: DVector::zeros(n),
            f: DVector::zeros(n),
            q: DMatrix::identity(n, n),
            r: DMatrix::zeros(n, n),
            diag: DVector::from_element(n, 1.0),
            iter: 0,
            ncfail: 0,
            ncsuc: 0,
            nslow1: 0,
            nslow2: 0,
            fnorm: 0.0,
            delta: 0.0,
            stats: Statistics::default(),
            is_set: false,
        }
    }

    pub fn name(&self) -> &'static str {
        if self.scaled {
            "hybridsj"
        } else {
            "hybridj"
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
        let mut j = DMatrix::zeros(self.system.nequations(), self.system.nparams());
        self.system
            .eval_residuals_and_jacobian(&self.x, &mut self.f, &mut j)?;

        self.iter = 1;
        self.fnorm = enorm(&self.f);
        self.ncfail = 0;
        self.ncsuc = 0;
        self.nslow1 = 0;
        self.nslow2 = 0;

        self.diag = if self.scaled {
            compute_diag(&j)
        } else {
            DVector::from_element(j.ncols(), 1.0)
        };
        self.delta = compute_delta(&self.diag, &self.x, DELTA_FACTOR);

        let decomposed = qr::decompose(&j);
        self.q = decomposed.q;
        self.r = decomposed.r;

        self.stats = Statistics::default();
        self.is_set = true;
        Ok(())
    }

    pub fn iterate(&mut self) -> Result<()> {
        if !self.is_set {
            return Err(Error::StateNotSet);
        }

        let fnorm = self.fnorm;
        let qtf = self.q.transpose() * &self.f;

        let dx = dogleg(&self.r, &qtf, &self.diag, self.delta);
        let x_trial = &self.x + &dx;
        let pnorm = scaled_enorm(&self.diag, &dx);

        if self.iter == 1 && pnorm < self.delta {
            self.delta = pnorm;
        }

        let mut f_trial = DVector::zeros(self.system.nequations());
        self.system.eval(&x_trial, &mut f_trial)?;
        let df = &f_trial - &self.f;

        let fnorm1 = enorm(&f_trial);
        let actred = actual_reduction(fnorm, fnorm1);

        let rdx = &self.r * &dx;
        let fnorm1p = enorm_sum(&qtf, &rdx);
        let prered = actual_reduction(fnorm, fnorm1p);

        let ratio = if prered > 0.0 { actred / prered } else { 0.0 };

        if ratio < P1 {
            self.ncsuc = 0;
            self.ncfail += 1;
            self.delta *= P5;
        } else {
            self.ncfail = 0;
            self.ncsuc += 1;
            if ratio >= P5 || self.ncsuc > 1 {
                self.delta = self.delta.max(pnorm / P5);
            }
            if (ratio - 1.0).abs() <= P1 {
                self.delta = pnorm / P5;
            }
        }

        if ratio >= P0001 {
            self.x = x_trial;
            self.f = f_trial;
            self.fnorm = fnorm1;
            self.iter += 1;
            self.stats.record_accept();
        } else {
            self.stats.record_reject();
        }

        self.nslow1 += 1;
        if actred >= P001 {
            self.nslow1 = 0;
        }
        if actred >= P1 {
            self.nslow2 = 0;
        }

        if self.ncfail == 2 {
            let mut j = DMatrix::zeros(self.system.nequations(), self.system.nparams());
            self.system.eval_jacobian(&self.x, &mut j)?;
            self.stats.record_jacobian_eval();
            self.nslow2 += 1;

            if self.iter == 1 {
                if self.scaled {
                    self.diag = compute_diag(&j);
                }
                self.delta = compute_delta(&self.diag, &self.x, DELTA_FACTOR);
            } else if self.scaled {
                update_diag(&j, &mut self.diag);
            }

            let decomposed = qr::decompose(&j);
            self.q = decomposed.q;
            self.r = decomposed.r;
            return Ok(());
        }

        // A zero step carries no direction to broadcast into the
        // factorization; dividing by `pnorm` below would be a div-by-zero.
        if pnorm > 0.0 {
            let qtdf = self.q.transpose() * &df;
            let (w, v) = compute_wv(&qtdf, &rdx, &dx, &self.diag, pnorm);
            qr::update(&mut self.q, &mut self.r, &w, &v);
        }

        if self.nslow2 == 5 {
            return Err(Error::NoProgressJacobian);
        }
        if self.nslow1 == 10 {
            return Err(Error::NoProgress(self.nslow1));
        }

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

    pub fn residual_at(&self, i: usize) -> Result<f64> {
        checked_get(&self.f, i)
    }

    pub fn fnorm(&self) -> f64 {
        self.fnorm
    }

    pub fn statistics(&self) -> Statistics {
        self.stats
    }

    /// Runs until `fnorm() < tol` or `max_iterations`, whichever comes
    /// first; returns the iteration count taken.
    pub fn solve(&mut self, tol: f64, max_iterations: usize) -> Result<usize> {
        if !self.is_set {
            return Err(Error::StateNotSet);
        }
        let mut taken = 0;
        while self.fnorm > tol && taken < max_iterations {
            self.iterate()?;
            taken += 1;
        }
        Ok(taken)
    }
}

fn actual_reduction(fnorm: f64, fnorm1: f64) -> f64 {
    if fnorm1 < fnorm {
        let u = fnorm1 / fnorm;
        1.0 - u * u
    } else {
        -1.0
    }
}

fn compute_wv(
    qtdf: &DVector<f64>,
    rdx: &DVector<f64>,
    dx: &DVector<f64>,
    diag: &DVector<f64>,
    pnorm: f64,
) -> (DVector<f64>, DVector<f64>) {
    let w = (qtdf - rdx) / pnorm;
    let v = diag.component_mul(diag).component_mul(dx) / pnorm;
    (w, v)
}

fn solve_upper_triangular(r: &DMatrix<f64>, rhs: &DVector<f64>) -> DVector<f64> {
    let n = r.nrows();
    let mut x = DVector::zeros(n);
    for i in (0..n).rev() {
        let mut sum = rhs[i];
        for j in (i + 1)..n {
            sum -= r[(i, j)] * x[j];
        }
        x[i] = if r[(i, i)] != 0.0 { sum / r[(i, i)] } else { 0.0 };
    }
    x
}

/// Newton step if within the trust region, else the Cauchy step if that
/// alone leaves it, else the boundary-interpolated combination of the two.
fn dogleg(r: &DMatrix<f64>, qtf: &DVector<f64>, diag: &DVector<f64>, delta: f64) -> DVector<f64> {
    let neg_qtf = -qtf;
    let newton = solve_upper_triangular(r, &neg_qtf);
    let qnorm = scaled_enorm(diag, &newton);

    if qnorm <= delta {
        return newton;
    }

    let g = r.transpose() * qtf;
    let gnorm = enorm(&g);
    if gnorm == 0.0 {
        return newton * (delta / qnorm);
    }

    let rg = r * &g;
    let rg_norm = enorm(&rg);
    let cauchy_scale = if rg_norm > 0.0 {
        (gnorm / rg_norm).powi(2)
    } else {
        0.0
    };
    let cauchy = &g * (-cauchy_scale);
    let cauchy_norm = scaled_enorm(diag, &cauchy);

    if cauchy_norm >= delta {
        return &cauchy * (delta / cauchy_norm);
    }

    let diff = &newton - &cauchy;
    let d_cauchy = diag.component_mul(&cauchy);
    let d_diff = diag.component_mul(&diff);
    let a = d_diff.dot(&d_diff);
    let b = 2.0 * d_cauchy.dot(&d_diff);
    let c = d_cauchy.dot(&d_cauchy) - delta * delta;
    let t = if a > 0.0 {
        (-b + (b * b - 4.0 * a * c).max(0.0).sqrt()) / (2.0 * a)
    } else {
        0.0
    };
    &cauchy + &diff * t
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::Residuals;
    use approx::assert_relative_eq;

    /// Powell's classic singular-Jacobian test function:
    /// f1 = x1, f2 = 10 x1/(x1+0.1) + 2 x2^2, root at (0, 0), with a
    /// Jacobian that is singular exactly at the root.
    struct PowellSingular;

    impl Residuals for PowellSingular {
        fn nequations(&self) -> usize {
            2
        }
        fn nparams(&self) -> usize {
            2
        }
        fn eval(&self, x: &DVector<f64>, out: &mut DVector<f64>) -> Result<()> {
            out[0] = x[0];
            out[1] = 10.0 * x[0] / (x[0] + 0.1) + 2.0 * x[1] * x[1];
            Ok(())
        }
    }

    impl Jacobian for PowellSingular {
        fn eval_jacobian(&self, x: &DVector<f64>, out: &mut DMatrix<f64>) -> Result<()> {
            out[(0, 0)] = 1.0;
            out[(0, 1)] = 0.0;
            out[(1, 0)] = 1.0 / (x[0] + 0.1).powi(2);
            out[(1, 1)] = 4.0 * x[1];
            Ok(())
        }
    }

    #[test]
    fn hybridsj_converges_on_the_powell_singular_problem() {
        let system = PowellSingular;
        let mut solver = Hybrid::new(&system, true);
        solver.set(DVector::from_vec(vec![-1.0, 1.0])).unwrap();

        let taken = solver.solve(1e-5, 300).unwrap();
        assert!(taken < 300, "did not converge within 300 iterations");
        assert_relative_eq!(solver.x()[0], 0.0, epsilon = 1e-4);
        assert_relative_eq!(solver.x()[1], 0.0, epsilon = 1e-2);
    }

    /// f(x) = 1e-18, independent of x: the residual can never be
    /// reduced, so every trial step is flat progress (`actred == -1`)
    /// and `nslow1` climbs by exactly one per iterate call.
    struct NoProgressFn;

    impl Residuals for NoProgressFn {
        fn nequations(&self) -> usize {
            1
        }
        fn nparams(&self) -> usize {
            1
        }
        fn eval(&self, _x: &DVector<f64>, out: &mut DVector<f64>) -> Result<()> {
            out[0] = 1e-18;
            Ok(())
        }
    }

    impl Jacobian for NoProgressFn {
        fn eval_jacobian(&self, _x: &DVector<f64>, out: &mut DMatrix<f64>) -> Result<()> {
            out[(0, 0)] = 0.0;
            Ok(())
        }
    }

    #[test]
    fn reports_no_progress_when_nslow1_reaches_ten() {
        let system = NoProgressFn;
        let mut solver = Hybrid::new(&system, false);
        solver.set(DVector::from_vec(vec![1e-18])).unwrap();

        let mut last_err = None;
        for _ in 0..20 {
            if let Err(e) = solver.iterate() {
                last_err = Some(e);
                break;
            }
        }
        assert!(matches!(last_err, Some(Error::NoProgress(10))));
    }
}

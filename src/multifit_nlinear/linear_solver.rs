//! The pluggable linear-solver layer behind each LM trial step.
//!
//! `lm_iterate` in `multifit_nlinear/lm.c` calls `solver->solve` twice
//! per accepted damping value: once for the velocity `v` and, when
//! geodesic acceleration is enabled, again for the acceleration `a`
//! against the same factorization of `J^T J + mu D^2`. `init` is where
//! that factorization happens; `solve_vel`/`solve_acc` must not
//! refactor as long as `j`, `diag`, and `mu` haven't changed.
//!
//! `normal` solves the augmented normal equations `(J^T J + mu D^2) x =
//! -J^T rhs` directly through `crate::linalg::lu`, the same way
//! `gsl_linalg_LU_decomp`/`_solve` is used elsewhere in this crate for
//! a one-off square solve. `cholesky` factors the same matrix into an
//! explicit, reusable `Cholesky` factor (cheaper when `solve_acc` is
//! called against the same `init`, and exposing the factorization
//! itself is the point of naming the variant `cholesky`). `qr`/`svd`
//! factor the stacked matrix `[J; sqrt(mu) * diag(D)]` instead, trading
//! a constant-factor slowdown for better conditioning when `J` is
//! nearly rank deficient.

use nalgebra::{Cholesky, DMatrix, DVector, QR, SVD};

use crate::error::{Error, Result};
use crate::linalg::lu;

pub trait LmLinearSolver {
    fn name(&self) -> &'static str;

    /// Factors the trust-region subproblem for the current `(j, diag,
    /// mu)`. Must be called before `solve_vel`/`solve_acc`.
    fn init(&mut self, j: &DMatrix<f64>, diag: &DVector<f64>, mu: f64) -> Result<()>;

    /// Solves for the velocity step against residual `f`.
    fn solve_vel(&self, f: &DVector<f64>) -> Result<DVector<f64>>;

    /// Solves for the acceleration correction against the
    /// second-directional-derivative probe `fvv`, reusing the
    /// factorization computed by `init`.
    fn solve_acc(&self, fvv: &DVector<f64>) -> Result<DVector<f64>>;
}

fn singular() -> Error {
    Error::Domain("trust-region subproblem matrix is singular".to_string())
}

fn augmented_normal_matrix(j: &DMatrix<f64>, diag: &DVector<f64>, mu: f64) -> DMatrix<f64> {
    let p = j.ncols();
    let mut n = j.transpose() * j;
    for k in 0..p {
        n[(k, k)] += mu * diag[k] * diag[k];
    }
    n
}

/// Re-solves `(J^T J + mu D^2) x = -J^T rhs` by LU each call, with no
/// factorization kept between `solve_vel` and `solve_acc`.
pub struct Normal {
    jt: DMatrix<f64>,
    n: DMatrix<f64>,
}

impl Normal {
    pub fn new() -> Self {
        Self {
            jt: DMatrix::zeros(0, 0),
            n: DMatrix::zeros(0, 0),
        }
    }
}

impl LmLinearSolver for Normal {
    fn name(&self) -> &'static str {
        "normal"
    }
    fn init(&mut self, j: &DMatrix<f64>, diag: &DVector<f64>, mu: f64) -> Result<()> {
        self.jt = j.transpose();
        self.n = augmented_normal_matrix(j, diag, mu);
        Ok(())
    }
    fn solve_vel(&self, f: &DVector<f64>) -> Result<DVector<f64>> {
        let g = &self.jt * f;
        lu::solve(&self.n, &(-g))
    }
    fn solve_acc(&self, fvv: &DVector<f64>) -> Result<DVector<f64>> {
        let g = &self.jt * fvv;
        lu::solve(&self.n, &(-g))
    }
}

/// Factors `J^T J + mu D^2` once per `init` via an explicit `Cholesky`
/// object, reused by both `solve_vel` and `solve_acc`.
pub struct CholeskySolver {
    jt: DMatrix<f64>,
    chol: Option<Cholesky<f64, nalgebra::Dyn>>,
}

impl CholeskySolver {
    pub fn new() -> Self {
        Self {
            jt: DMatrix::zeros(0, 0),
            chol: None,
        }
    }

    fn solve(&self, rhs: &DVector<f64>) -> Result<DVector<f64>> {
        let chol = self.chol.as_ref().ok_or_else(singular)?;
        let g = &self.jt * rhs;
        Ok(chol.solve(&(-g)))
    }
}

impl LmLinearSolver for CholeskySolver {
    fn name(&self) -> &'static str {
        "cholesky"
    }
    fn init(&mut self, j: &DMatrix<f64>, diag: &DVector<f64>, mu: f64) -> Result<()> {
        self.jt = j.transpose();
        self.chol = Cholesky::new(augmented_normal_matrix(j, diag, mu));
        if self.chol.is_none() {
            return Err(singular());
        }
        Ok(())
    }
    fn solve_vel(&self, f: &DVector<f64>) -> Result<DVector<f64>> {
        self.solve(f)
    }
    fn solve_acc(&self, fvv: &DVector<f64>) -> Result<DVector<f64>> {
        self.solve(fvv)
    }
}

/// Builds the stacked `(n+p) x p` matrix `[J; sqrt(mu) * diag(D)]` once
/// per `init`, shared by the QR and SVD solvers.
fn augmented(j: &DMatrix<f64>, diag: &DVector<f64>, mu: f64) -> DMatrix<f64> {
    let n = j.nrows();
    let p = j.ncols();
    let sqrt_mu = mu.max(0.0).sqrt();
    DMatrix::from_fn(n + p, p, |row, col| {
        if row < n {
            j[(row, col)]
        } else if row - n == col {
            sqrt_mu * diag[col]
        } else {
            0.0
        }
    })
}

fn augmented_rhs(n: usize, p: usize, rhs: &DVector<f64>) -> DVector<f64> {
    DVector::from_fn(n + p, |row, _| if row < n { -rhs[row] } else { 0.0 })
}

pub struct Qr {
    n: usize,
    p: usize,
    qr: Option<QR<f64, nalgebra::Dyn, nalgebra::Dyn>>,
}

impl Qr {
    pub fn new() -> Self {
        Self {
            n: 0,
            p: 0,
            qr: None,
        }
    }
}

impl LmLinearSolver for Qr {
    fn name(&self) -> &'static str {
        "qr"
    }
    fn init(&mut self, j: &DMatrix<f64>, diag: &DVector<f64>, mu: f64) -> Result<()> {
        self.n = j.nrows();
        self.p = j.ncols();
        self.qr = Some(augmented(j, diag, mu).qr());
        Ok(())
    }
    fn solve_vel(&self, f: &DVector<f64>) -> Result<DVector<f64>> {
        let qr = self.qr.as_ref().ok_or_else(singular)?;
        qr.solve(&augmented_rhs(self.n, self.p, f))
            .ok_or_else(singular)
    }
    fn solve_acc(&self, fvv: &DVector<f64>) -> Result<DVector<f64>> {
        let qr = self.qr.as_ref().ok_or_else(singular)?;
        qr.solve(&augmented_rhs(self.n, self.p, fvv))
            .ok_or_else(singular)
    }
}

pub struct Svd {
    n: usize,
    p: usize,
    svd: Option<SVD<f64, nalgebra::Dyn, nalgebra::Dyn>>,
    eps: f64,
}

impl Svd {
    pub fn new() -> Self {
        Self {
            n: 0,
            p: 0,
            svd: None,
            eps: 1e-12,
        }
    }
}

impl LmLinearSolver for Svd {
    fn name(&self) -> &'static str {
        "svd"
    }
    fn init(&mut self, j: &DMatrix<f64>, diag: &DVector<f64>, mu: f64) -> Result<()> {
        self.n = j.nrows();
        self.p = j.ncols();
        self.svd = Some(augmented(j, diag, mu).svd(true, true));
        Ok(())
    }
    fn solve_vel(&self, f: &DVector<f64>) -> Result<DVector<f64>> {
        let svd = self.svd.as_ref().ok_or_else(singular)?;
        svd.solve(&augmented_rhs(self.n, self.p, f), self.eps)
            .map_err(|_| singular())
    }
    fn solve_acc(&self, fvv: &DVector<f64>) -> Result<DVector<f64>> {
        let svd = self.svd.as_ref().ok_or_else(singular)?;
        svd.solve(&augmented_rhs(self.n, self.p, fvv), self.eps)
            .map_err(|_| singular())
    }
}

/// Builds a solver by name, as chosen by `LmParameters::linear_solver`.
pub fn by_name(name: &str) -> Option<Box<dyn LmLinearSolver>> {
    match name {
        "normal" => Some(Box::new(Normal::new())),
        "cholesky" => Some(Box::new(CholeskySolver::new())),
        "qr" => Some(Box::new(Qr::new())),
        "svd" => Some(Box::new(Svd::new())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample() -> (DMatrix<f64>, DVector<f64>, DVector<f64>) {
        let j = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
        let diag = DVector::from_vec(vec![1.0, 1.0]);
        let f = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        (j, diag, f)
    }

    fn check_solver(mut solver: Box<dyn LmLinearSolver>) {
        let (j, diag, f) = sample();
        solver.init(&j, &diag, 0.1).unwrap();
        let v = solver.solve_vel(&f).unwrap();

        let jt = j.transpose();
        let mut n = &jt * &j;
        for k in 0..2 {
            n[(k, k)] += 0.1 * diag[k] * diag[k];
        }
        let expected = Cholesky::new(n).unwrap().solve(&(-(&jt * &f)));
        assert_relative_eq!(v, expected, epsilon = 1e-8);
    }

    #[test]
    fn normal_matches_expected_normal_equations() {
        check_solver(Box::new(Normal::new()));
    }

    #[test]
    fn cholesky_matches_expected_normal_equations() {
        check_solver(Box::new(CholeskySolver::new()));
    }

    #[test]
    fn qr_matches_expected_normal_equations() {
        check_solver(Box::new(Qr::new()));
    }

    #[test]
    fn svd_matches_expected_normal_equations() {
        check_solver(Box::new(Svd::new()));
    }

    #[test]
    fn unknown_name_returns_none() {
        assert!(by_name("bogus").is_none());
    }
}

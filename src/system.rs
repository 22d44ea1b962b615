//! The "callable bundle" of the data model: traits a user implements to
//! hand a nonlinear system or a scalar function to a solver, plus the
//! finite-difference and closure adapters that fill in the parts of the
//! bundle spec.md allows to be omitted.
//!
//! Grounded on the teacher's `callable` module: a small `Op`-style trait
//! for dimensions, a `Callable`/`Jacobian` split for the evaluator
//! capabilities, and a `Closure` adapter (`callable::closure::Closure`)
//! used by its own tests to build a system out of plain functions.

use nalgebra::{DMatrix, DVector};

use crate::error::Result;

/// Residual evaluator: `f(x) -> residuals`, with its dimensions.
///
/// For root finding, `nequations() == nparams()`.
pub trait Residuals {
    /// Number of residual components, n.
    fn nequations(&self) -> usize;
    /// Number of parameters, p.
    fn nparams(&self) -> usize;
    /// Evaluate `f(x)` into `out`. A non-success return aborts the
    /// current `iterate()` and propagates to the caller unchanged.
    fn eval(&self, x: &DVector<f64>, out: &mut DVector<f64>) -> Result<()>;
}

/// A `Residuals` evaluator that can also produce its Jacobian.
pub trait Jacobian: Residuals {
    /// Evaluate `J(x)` (n x p) into `out`.
    fn eval_jacobian(&self, x: &DVector<f64>, out: &mut DMatrix<f64>) -> Result<()>;

    /// Evaluate both `f(x)` and `J(x)` in one call. The default just
    /// calls both in sequence; systems that can share work between the
    /// two (as GSL's `fdf` callback can) should override this.
    fn eval_residuals_and_jacobian(
        &self,
        x: &DVector<f64>,
        f: &mut DVector<f64>,
        j: &mut DMatrix<f64>,
    ) -> Result<()> {
        self.eval(x, f)?;
        self.eval_jacobian(x, j)
    }
}

/// Optional capability: the second directional derivative `D^2 f(x)[v,
/// v]` used by LM's geodesic acceleration.
pub trait GeodesicAccel: Residuals {
    fn eval_fvv(&self, x: &DVector<f64>, v: &DVector<f64>, out: &mut DVector<f64>) -> Result<()>;
}

/// Which finite-difference rule `FiniteDifference` uses for the
/// Jacobian. GSL's `fdtype` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FiniteDifferenceKind {
    Forward,
    Central,
}

/// Wraps a `Residuals` system that has no analytic Jacobian (and/or no
/// analytic `fvv`) and supplies both by finite differences, mirroring
/// `gsl_multifit_nlinear_eval_df`/`eval_fvv`'s behavior when the user's
/// `df`/`fvv` function pointers are null.
///
/// `h_df` is the relative step for the Jacobian columns; `h_fvv` is the
/// step for the second-directional-derivative probe.
pub struct FiniteDifference<S> {
    inner: S,
    kind: FiniteDifferenceKind,
    h_df: f64,
    h_fvv: f64,
}

impl<S: Residuals> FiniteDifference<S> {
    pub fn new(inner: S, kind: FiniteDifferenceKind, h_df: f64, h_fvv: f64) -> Self {
        Self {
            inner,
            kind,
            h_df,
            h_fvv,
        }
    }

    /// Per-parameter step size: relative to the magnitude of `x[k]`,
    /// with a floor so a zero component still perturbs.
    fn step(&self, xk: f64, h: f64) -> f64 {
        h * xk.abs().max(1.0)
    }
}

impl<S: Residuals> Residuals for FiniteDifference<S> {
    fn nequations(&self) -> usize {
        self.inner.nequations()
    }
    fn nparams(&self) -> usize {
        self.inner.nparams()
    }
    fn eval(&self, x: &DVector<f64>, out: &mut DVector<f64>) -> Result<()> {
        self.inner.eval(x, out)
    }
}

impl<S: Residuals> Jacobian for FiniteDifference<S> {
    fn eval_jacobian(&self, x: &DVector<f64>, out: &mut DMatrix<f64>) -> Result<()> {
        let n = self.inner.nequations();
        let p = self.inner.nparams();
        let mut f0 = DVector::zeros(n);
        self.inner.eval(x, &mut f0)?;

        let mut xp = x.clone();
        let mut ftmp = DVector::zeros(n);

        match self.kind {
            FiniteDifferenceKind::Forward => {
                for k in 0..p {
                    let h = self.step(x[k], self.h_df);
                    xp[k] = x[k] + h;
                    self.inner.eval(&xp, &mut ftmp)?;
                    xp[k] = x[k];
                    for i in 0..n {
                        out[(i, k)] = (ftmp[i] - f0[i]) / h;
                    }
                }
            }
            FiniteDifferenceKind::Central => {
                let mut fminus = DVector::zeros(n);
                for k in 0..p {
                    let h = self.step(x[k], self.h_df);
                    xp[k] = x[k] + h;
                    self.inner.eval(&xp, &mut ftmp)?;
                    xp[k] = x[k] - h;
                    self.inner.eval(&xp, &mut fminus)?;
                    xp[k] = x[k];
                    for i in 0..n {
                        out[(i, k)] = (ftmp[i] - fminus[i]) / (2.0 * h);
                    }
                }
            }
        }
        Ok(())
    }
}

impl<S: Residuals> GeodesicAccel for FiniteDifference<S> {
    /// `fvv = 2 (f(x + h v) - f(x) - h J v) / h^2`, the standard
    /// one-sided probe used by geodesic-acceleration LM (it needs only
    /// one extra evaluation beyond `f(x)` and `J v`, both already known
    /// to the caller at the point this is invoked).
    fn eval_fvv(&self, x: &DVector<f64>, v: &DVector<f64>, out: &mut DVector<f64>) -> Result<()> {
        let n = self.inner.nequations();
        let p = self.inner.nparams();
        let h = self.h_fvv;

        let mut f0 = DVector::zeros(n);
        self.inner.eval(x, &mut f0)?;

        let mut jac = DMatrix::zeros(n, p);
        Jacobian::eval_jacobian(self, x, &mut jac)?;
        let jv = &jac * v;

        let xh = x + v * h;
        let mut fh = DVector::zeros(n);
        self.inner.eval(&xh, &mut fh)?;

        for i in 0..n {
            out[i] = 2.0 * (fh[i] - f0[i] - h * jv[i]) / (h * h);
        }
        Ok(())
    }
}

/// Wraps a residual-only closure, for use with `FiniteDifference`.
pub struct ResidualFn<F> {
    n: usize,
    p: usize,
    f: F,
}

impl<F> ResidualFn<F>
where
    F: Fn(&DVector<f64>, &mut DVector<f64>) -> Result<()>,
{
    pub fn new(n: usize, p: usize, f: F) -> Self {
        Self { n, p, f }
    }
}

impl<F> Residuals for ResidualFn<F>
where
    F: Fn(&DVector<f64>, &mut DVector<f64>) -> Result<()>,
{
    fn nequations(&self) -> usize {
        self.n
    }
    fn nparams(&self) -> usize {
        self.p
    }
    fn eval(&self, x: &DVector<f64>, out: &mut DVector<f64>) -> Result<()> {
        (self.f)(x, out)
    }
}

/// Wraps a pair of closures `(f, df)` as a `Jacobian` system, the
/// infallible-residual analogue of the teacher's `Closure` test helper.
pub struct Closure<F, DF> {
    n: usize,
    p: usize,
    f: F,
    df: DF,
}

impl<F, DF> Closure<F, DF>
where
    F: Fn(&DVector<f64>, &mut DVector<f64>) -> Result<()>,
    DF: Fn(&DVector<f64>, &mut DMatrix<f64>) -> Result<()>,
{
    pub fn new(n: usize, p: usize, f: F, df: DF) -> Self {
        Self { n, p, f, df }
    }
}

impl<F, DF> Residuals for Closure<F, DF>
where
    F: Fn(&DVector<f64>, &mut DVector<f64>) -> Result<()>,
    DF: Fn(&DVector<f64>, &mut DMatrix<f64>) -> Result<()>,
{
    fn nequations(&self) -> usize {
        self.n
    }
    fn nparams(&self) -> usize {
        self.p
    }
    fn eval(&self, x: &DVector<f64>, out: &mut DVector<f64>) -> Result<()> {
        (self.f)(x, out)
    }
}

impl<F, DF> Jacobian for Closure<F, DF>
where
    F: Fn(&DVector<f64>, &mut DVector<f64>) -> Result<()>,
    DF: Fn(&DVector<f64>, &mut DMatrix<f64>) -> Result<()>,
{
    fn eval_jacobian(&self, x: &DVector<f64>, out: &mut DMatrix<f64>) -> Result<()> {
        (self.df)(x, out)
    }
}

/// The scalar callable bundle of the data model, used by the 1-D
/// minimizer: `phi: R -> R`, evaluation may fail.
pub trait ScalarFn {
    fn eval(&self, x: f64) -> Result<f64>;
}

/// Wraps an infallible closure as a `ScalarFn`.
pub struct ClosureFn<F>(F);

impl<F> ClosureFn<F>
where
    F: Fn(f64) -> f64,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> ScalarFn for ClosureFn<F>
where
    F: Fn(f64) -> f64,
{
    fn eval(&self, x: f64) -> Result<f64> {
        Ok((self.0)(x))
    }
}


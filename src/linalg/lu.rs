//! LU factorization with partial pivoting and the triangular solve
//! built on it, used by the globally convergent Newton method.
//!
//! Wraps `nalgebra::linalg::LU`; grounded on `gsl_linalg_LU_decomp`
//! and `gsl_linalg_LU_solve` in `multiroots/gnewton.c`, where the
//! factorization is recomputed once per accepted Newton step and used
//! for exactly one solve.

use nalgebra::{DMatrix, DVector, LU};

use crate::error::{Error, Result};

/// Factors `a` with partial pivoting and solves `a * x = b`.
///
/// Returns `Error::Domain` if `a` is numerically singular, mirroring
/// GSL's `GSL_EDOM` ("matrix is singular") from `LU_solve`/`LU_decomp`.
pub fn solve(a: &DMatrix<f64>, b: &DVector<f64>) -> Result<DVector<f64>> {
    let lu = LU::new(a.clone());
    lu.solve(b)
        .ok_or_else(|| Error::Domain("jacobian is numerically singular".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn solves_a_well_conditioned_system() {
        let a = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 1.0, 3.0]);
        let b = DVector::from_vec(vec![3.0, 4.0]);
        let x = solve(&a, &b).unwrap();
        assert_relative_eq!(&a * &x, b, epsilon = 1e-10);
    }

    #[test]
    fn rejects_a_singular_matrix() {
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 4.0]);
        let b = DVector::from_vec(vec![1.0, 2.0]);
        assert!(matches!(solve(&a, &b), Err(Error::Domain(_))));
    }
}

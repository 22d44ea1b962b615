//! Symmetric eigenvalues, used only to compute the Jacobian condition
//! number estimate LM exposes through `rcond()`.
//!
//! Grounded on `lm_rcond` in `multifit_nlinear/lm.c`, which forms
//! `J^T J`, calls `gsl_eigen_symm`, and takes the ratio of the
//! smallest to largest eigenvalue. Wraps `nalgebra::linalg::SymmetricEigen`.

use nalgebra::DMatrix;

/// The eigenvalues of a symmetric matrix, in no particular order (the
/// caller reduces them with `min`/`max`, so sorting is unnecessary
/// work `lm_rcond` doesn't do either).
pub fn symmetric_eigenvalues(a: &DMatrix<f64>) -> Vec<f64> {
    let eigen = nalgebra::linalg::SymmetricEigen::new(a.clone());
    eigen.eigenvalues.iter().copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn eigenvalues_of_diagonal_matrix_are_its_entries() {
        let a = DMatrix::from_diagonal(&nalgebra::DVector::from_vec(vec![2.0, 5.0, 1.0]));
        let mut evals = symmetric_eigenvalues(&a);
        evals.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_relative_eq!(evals[0], 1.0, epsilon = 1e-10);
        assert_relative_eq!(evals[1], 2.0, epsilon = 1e-10);
        assert_relative_eq!(evals[2], 5.0, epsilon = 1e-10);
    }
}

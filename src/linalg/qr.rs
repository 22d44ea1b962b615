//! QR factorization and its rank-1 update.
//!
//! The initial factorization is delegated to `nalgebra::linalg::QR`
//! (Householder, no column pivoting — the hybrid method never needs
//! one). The rank-1 update has no `nalgebra` equivalent; it is the
//! classic two-pass Givens-rotation algorithm behind
//! `gsl_linalg_QR_update` in `multiroots/hybridj.c`, reimplemented
//! directly against `DMatrix` since it operates on `Q` and `R` in
//! place rather than through a factorization object.

use nalgebra::{DMatrix, DVector};

/// A full `Q, R` pair for a square `n x n` matrix, `a = q * r` with `q`
/// orthogonal and `r` upper triangular.
pub struct QrDecomposition {
    pub q: DMatrix<f64>,
    pub r: DMatrix<f64>,
}

/// Factors a square matrix via Householder QR.
pub fn decompose(a: &DMatrix<f64>) -> QrDecomposition {
    let qr = a.clone().qr();
    QrDecomposition {
        q: qr.q(),
        r: qr.r(),
    }
}

fn givens(a: f64, b: f64) -> (f64, f64) {
    if b == 0.0 {
        (1.0, 0.0)
    } else {
        let r = a.hypot(b);
        (a / r, b / r)
    }
}

/// Rotates rows `i` and `i+1` of `m` by the Givens pair `(c, s)`:
/// `row_i' = c*row_i + s*row_{i+1}`, `row_{i+1}' = -s*row_i + c*row_{i+1}`.
fn rotate_rows(m: &mut DMatrix<f64>, i: usize, j: usize, c: f64, s: f64) {
    for col in 0..m.ncols() {
        let a = m[(i, col)];
        let b = m[(j, col)];
        m[(i, col)] = c * a + s * b;
        m[(j, col)] = -s * a + c * b;
    }
}

/// Rotates columns `i` and `i+1` of `m` the same way, used to keep `Q`
/// consistent with the row rotations applied to `R`.
fn rotate_cols(m: &mut DMatrix<f64>, i: usize, j: usize, c: f64, s: f64) {
    for row in 0..m.nrows() {
        let a = m[(row, i)];
        let b = m[(row, j)];
        m[(row, i)] = c * a + s * b;
        m[(row, j)] = -s * a + c * b;
    }
}

/// Updates `(q, r)` in place from the QR factorization of some `a` to
/// the QR factorization of `a + w_orig * v^T`, where `w` is already
/// `Q^T w_orig` (the caller, e.g. the hybrid dogleg step, computes `w`
/// in the rotated basis directly rather than handing over `w_orig`).
///
/// A zero `w` leaves `q` and `r` unchanged (both passes degenerate to
/// identity rotations).
pub fn update(q: &mut DMatrix<f64>, r: &mut DMatrix<f64>, w: &DVector<f64>, v: &DVector<f64>) {
    let n = r.nrows();
    if n == 0 {
        return;
    }
    let mut w = w.clone();

    // Phase 1: zero w[n-1..1] bottom-up, turning R into upper Hessenberg.
    for k in (0..n - 1).rev() {
        let (c, s) = givens(w[k], w[k + 1]);
        rotate_rows(r, k, k + 1, c, s);
        rotate_cols(q, k, k + 1, c, s);
        let wk = w[k];
        let wk1 = w[k + 1];
        w[k] = c * wk + s * wk1;
        w[k + 1] = -s * wk + c * wk1;
    }

    let wnorm = w[0];
    for j in 0..n {
        r[(0, j)] += wnorm * v[j];
    }

    // Phase 2: eliminate the Hessenberg subdiagonal top-down, restoring
    // upper-triangular R.
    for k in 0..n - 1 {
        let (c, s) = givens(r[(k, k)], r[(k + 1, k)]);
        rotate_rows(r, k, k + 1, c, s);
        rotate_cols(q, k, k + 1, c, s);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn random_like(rows: usize, cols: usize, seed: u64) -> DMatrix<f64> {
        let mut state = seed;
        let mut next = || {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            ((state >> 33) as f64 / u32::MAX as f64) * 2.0 - 1.0
        };
        DMatrix::from_fn(rows, cols, |_, _| next())
    }

    #[test]
    fn decompose_round_trips() {
        let a = random_like(4, 4, 7);
        let qr = decompose(&a);
        let reconstructed = &qr.q * &qr.r;
        assert_relative_eq!(reconstructed, a, epsilon = 1e-10);
        let identity = &qr.q.transpose() * &qr.q;
        assert_relative_eq!(identity, DMatrix::identity(4, 4), epsilon = 1e-10);
    }

    #[test]
    fn zero_update_leaves_factorization_unchanged() {
        let a = random_like(3, 3, 11);
        let qr = decompose(&a);
        let mut q = qr.q.clone();
        let mut r = qr.r.clone();
        let w = DVector::zeros(3);
        let v = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        update(&mut q, &mut r, &w, &v);
        assert_relative_eq!(q, qr.q, epsilon = 1e-10);
        assert_relative_eq!(r, qr.r, epsilon = 1e-10);
    }

    #[test]
    fn rank_one_update_matches_direct_factorization() {
        let a = random_like(3, 3, 5);
        let qr = decompose(&a);
        let mut q = qr.q.clone();
        let mut r = qr.r.clone();

        let u = DVector::from_vec(vec![0.3, -0.7, 1.1]);
        let v = DVector::from_vec(vec![1.2, 0.4, -0.9]);
        let w = qr.q.transpose() * &u;

        update(&mut q, &mut r, &w, &v);

        let updated_a = &a + &u * v.transpose();
        let reconstructed = &q * &r;
        assert_relative_eq!(reconstructed, updated_a, epsilon = 1e-8);
        let identity = &q.transpose() * &q;
        assert_relative_eq!(identity, DMatrix::identity(3, 3), epsilon = 1e-8);
    }
}

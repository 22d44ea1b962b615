//! Numerical kernels shared by all three solver families: an
//! overflow-safe Euclidean norm (classic MINPACK `enorm.f`) and the
//! diagonal-scaling helpers built on top of it.

use nalgebra::{DMatrix, DVector};

use crate::error::{Error, Result};
use crate::range_check::range_check_enabled;

/// `gsl_vector_get`'s range-check behavior. Indexes straight through
/// (panicking past the end, like GSL's unchecked build) when disabled.
pub fn checked_get(v: &DVector<f64>, i: usize) -> Result<f64> {
    if range_check_enabled() {
        v.get(i).copied().ok_or(Error::Range)
    } else {
        Ok(v[i])
    }
}

/// Euclidean norm of `v`, scaled so squaring the largest component
/// can't overflow. `0.0` for an empty or all-zero vector.
pub fn enorm(v: &DVector<f64>) -> f64 {
    let mut scale = 0.0_f64;
    let mut ssq = 1.0_f64;

    for &vi in v.iter() {
        if vi != 0.0 {
            let ax = vi.abs();
            if scale < ax {
                ssq = 1.0 + ssq * (scale / ax).powi(2);
                scale = ax;
            } else {
                ssq += (ax / scale).powi(2);
            }
        }
    }

    scale * ssq.sqrt()
}

pub fn scaled_enorm(d: &DVector<f64>, v: &DVector<f64>) -> f64 {
    let mut scale = 0.0_f64;
    let mut ssq = 1.0_f64;

    for (&di, &vi) in d.iter().zip(v.iter()) {
        let x = di * vi;
        if x != 0.0 {
            let ax = x.abs();
            if scale < ax {
                ssq = 1.0 + ssq * (scale / ax).powi(2);
                scale = ax;
            } else {
                ssq += (ax / scale).powi(2);
            }
        }
    }

    scale * ssq.sqrt()
}

pub fn enorm_sum(a: &DVector<f64>, b: &DVector<f64>) -> f64 {
    let mut scale = 0.0_f64;
    let mut ssq = 1.0_f64;

    for (&ai, &bi) in a.iter().zip(b.iter()) {
        let x = ai + bi;
        if x != 0.0 {
            let ax = x.abs();
            if scale < ax {
                ssq = 1.0 + ssq * (scale / ax).powi(2);
                scale = ax;
            } else {
                ssq += (ax / scale).powi(2);
            }
        }
    }

    scale * ssq.sqrt()
}

/// Column norms of `j`; a zero column maps to `1` rather than `0`.
pub fn compute_diag(j: &DMatrix<f64>) -> DVector<f64> {
    let p = j.ncols();
    let mut diag = DVector::zeros(p);
    for k in 0..p {
        let norm = enorm(&j.column(k).clone_owned());
        diag[k] = if norm == 0.0 { 1.0 } else { norm };
    }
    diag
}

/// Componentwise max of `diag` and the column norms of `j`; never shrinks.
pub fn update_diag(j: &DMatrix<f64>, diag: &mut DVector<f64>) {
    let p = j.ncols();
    for k in 0..p {
        let norm = enorm(&j.column(k).clone_owned());
        if norm > diag[k] {
            diag[k] = norm;
        }
    }
}

pub fn compute_delta(diag: &DVector<f64>, x: &DVector<f64>, factor: f64) -> f64 {
    let norm = scaled_enorm(diag, x);
    if norm > 0.0 {
        factor * norm
    } else {
        factor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range_check::set_range_check_enabled;
    use approx::assert_relative_eq;

    #[test]
    fn checked_get_returns_range_error_past_the_end() {
        set_range_check_enabled(true);
        let v = DVector::from_vec(vec![1.0, 2.0]);
        assert_eq!(checked_get(&v, 1), Ok(2.0));
        assert_eq!(checked_get(&v, 2), Err(Error::Range));
    }

    #[test]
    fn enorm_matches_naive_in_normal_range() {
        let v = DVector::from_vec(vec![3.0, 4.0]);
        assert_relative_eq!(enorm(&v), 5.0, epsilon = 1e-12);
    }

    #[test]
    fn enorm_of_zero_vector_is_zero() {
        let v = DVector::from_vec(vec![0.0, 0.0, 0.0]);
        assert_eq!(enorm(&v), 0.0);
    }

    #[test]
    fn enorm_survives_values_that_overflow_when_squared() {
        let huge = 1.0e300_f64;
        let v = DVector::from_vec(vec![huge, huge]);
        let naive = huge * huge + huge * huge;
        assert!(naive.is_infinite());
        let result = enorm(&v);
        assert!(result.is_finite());
        assert_relative_eq!(result, huge * 2.0_f64.sqrt(), max_relative = 1e-12);
    }

    #[test]
    fn enorm_survives_values_that_underflow_when_squared() {
        let tiny = 1.0e-300_f64;
        let v = DVector::from_vec(vec![tiny, tiny]);
        let result = enorm(&v);
        assert!(result > 0.0);
        assert_relative_eq!(result, tiny * 2.0_f64.sqrt(), max_relative = 1e-9);
    }

    #[test]
    fn scaled_enorm_matches_enorm_of_product() {
        let d = DVector::from_vec(vec![2.0, 0.5, 1.0]);
        let v = DVector::from_vec(vec![3.0, 4.0, 0.0]);
        let product = DVector::from_vec(vec![6.0, 2.0, 0.0]);
        assert_relative_eq!(scaled_enorm(&d, &v), enorm(&product), epsilon = 1e-12);
    }

    #[test]
    fn compute_diag_maps_zero_column_to_one() {
        let j = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 2.0, 0.0]);
        let diag = compute_diag(&j);
        assert_relative_eq!(diag[0], (1.0_f64 * 1.0 + 2.0 * 2.0).sqrt(), epsilon = 1e-12);
        assert_eq!(diag[1], 1.0);
    }

    #[test]
    fn update_diag_never_shrinks() {
        let mut diag = DVector::from_vec(vec![5.0, 1.0]);
        let j = DMatrix::from_row_slice(1, 2, &[1.0, 10.0]);
        update_diag(&j, &mut diag);
        assert_eq!(diag[0], 5.0);
        assert_eq!(diag[1], 10.0);
    }

    #[test]
    fn compute_delta_falls_back_to_factor_at_origin() {
        let diag = DVector::from_vec(vec![1.0, 1.0]);
        let x = DVector::zeros(2);
        assert_eq!(compute_delta(&diag, &x, 100.0), 100.0);
    }
}

//! Tunable knobs for an LM run, grouped the way GSL's
//! `gsl_multifit_nlinear_parameters` groups them: which named scale,
//! update, and linear-solver strategy to use, plus the finite-difference
//! and acceleration-safety settings.

/// Construction-time configuration for [`super::lm::LmWorkspace`].
///
/// Finite-difference step sizes are deliberately not configured here:
/// `Residuals`-only systems supply a Jacobian/`fvv` by wrapping
/// themselves in [`crate::system::FiniteDifference`] before ever
/// reaching the workspace, so there's no field here that would reach
/// them.
#[derive(Debug, Clone)]
pub struct LmParameters {
    pub scale: &'static str,
    pub update: &'static str,
    pub linear_solver: &'static str,
    /// Whether to compute and apply the geodesic-acceleration correction.
    pub accel: bool,
    /// A trial step is rejected outright if `avratio = |a| / |v|`
    /// exceeds this, before the usual gain-ratio test runs.
    pub avmax: f64,
    /// Iteration cap used by [`super::lm::LmWorkspace::solve`].
    pub max_iterations: usize,
}

impl Default for LmParameters {
    fn default() -> Self {
        Self {
            scale: "more",
            update: "nielsen",
            linear_solver: "qr",
            accel: false,
            avmax: 0.75,
            max_iterations: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_parameters_match_documented_defaults() {
        let params = LmParameters::default();
        assert_eq!(params.scale, "more");
        assert_eq!(params.update, "nielsen");
        assert_eq!(params.linear_solver, "qr");
        assert!(!params.accel);
        assert_eq!(params.avmax, 0.75);
    }
}

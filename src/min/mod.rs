//! One-dimensional, bracket-based minimization.
//!
//! Reimplements `gsl_min_fminimizer_set`/`set_with_values`/`iterate`
//! from `min/fsolver.c`: a bracket `{lower, minimum, upper}` with
//! `f(minimum) < f(lower)` and `f(minimum) < f(upper)` is narrowed by a
//! named strategy (here, [`golden::GoldenSection`], the one concrete
//! strategy this crate ships — `fsolver.c`'s driver/strategy split
//! leaves room for others, e.g. Brent's method, without changing
//! [`Minimizer`]).

pub mod golden;

use crate::error::{Error, Result};
use crate::system::ScalarFn;

/// The invariant maintained by every minimizer: `f(minimum)` is
/// strictly less than both endpoint values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bracket {
    pub lower: f64,
    pub minimum: f64,
    pub upper: f64,
    pub f_lower: f64,
    pub f_minimum: f64,
    pub f_upper: f64,
}

impl Bracket {
    fn validate(
        lower: f64,
        minimum: f64,
        upper: f64,
        f_lower: f64,
        f_minimum: f64,
        f_upper: f64,
    ) -> Result<Self> {
        if lower > upper {
            return Err(Error::InvalidArgument(
                "invalid interval (lower > upper)".to_string(),
            ));
        }
        if minimum >= upper || minimum <= lower {
            return Err(Error::InvalidArgument(
                "minimum must lie inside interval (lower < x < upper)".to_string(),
            ));
        }
        if f_minimum >= f_lower || f_minimum >= f_upper {
            return Err(Error::InvalidArgument(
                "endpoints do not enclose a minimum".to_string(),
            ));
        }
        Ok(Self {
            lower,
            minimum,
            upper,
            f_lower,
            f_minimum,
            f_upper,
        })
    }
}

pub trait MinimizerStrategy {
    fn name(&self) -> &'static str;
    fn iterate(&mut self, bracket: &mut Bracket, system: &dyn ScalarFn) -> Result<()>;
}

/// The driver: owns a bracket and a pluggable narrowing strategy.
pub struct Minimizer<'a, S: ScalarFn, M: MinimizerStrategy> {
    system: &'a S,
    strategy: M,
    bracket: Option<Bracket>,
}

impl<'a, S: ScalarFn, M: MinimizerStrategy> Minimizer<'a, S, M> {
    pub fn new(system: &'a S, strategy: M) -> Self {
        Self {
            system,
            strategy,
            bracket: None,
        }
    }

    /// Evaluates `f` at `minimum`, `lower`, and `upper`, then validates
    /// and stores the bracket.
    pub fn set(&mut self, minimum: f64, lower: f64, upper: f64) -> Result<()> {
        let f_lower = self.system.eval(lower)?;
        let f_upper = self.system.eval(upper)?;
        let f_minimum = self.system.eval(minimum)?;
        self.set_with_values(minimum, f_minimum, lower, f_lower, upper, f_upper)
    }

    /// Stores a bracket whose function values the caller already
    /// knows, skipping the three evaluations `set` would otherwise
    /// make.
    pub fn set_with_values(
        &mut self,
        minimum: f64,
        f_minimum: f64,
        lower: f64,
        f_lower: f64,
        upper: f64,
        f_upper: f64,
    ) -> Result<()> {
        self.bracket = Some(Bracket::validate(
            lower, minimum, upper, f_lower, f_minimum, f_upper,
        )?);
        Ok(())
    }

    pub fn iterate(&mut self) -> Result<()> {
        let bracket = self.bracket.as_mut().ok_or(Error::StateNotSet)?;
        self.strategy.iterate(bracket, self.system)
    }

    pub fn minimum(&self) -> Result<f64> {
        self.bracket.map(|b| b.minimum).ok_or(Error::StateNotSet)
    }

    pub fn f_minimum(&self) -> Result<f64> {
        self.bracket.map(|b| b.f_minimum).ok_or(Error::StateNotSet)
    }

    pub fn interval(&self) -> Result<(f64, f64)> {
        self.bracket
            .map(|b| (b.lower, b.upper))
            .ok_or(Error::StateNotSet)
    }

    pub fn name(&self) -> &'static str {
        self.strategy.name()
    }
}

//! Golden-section search: the simplest bracket-narrowing strategy,
//! requiring only function values (no derivatives).
//!
//! Each iteration places a new trial point in the larger of the two
//! sub-intervals at the golden-ratio position, then narrows the
//! bracket to restore the `f(minimum) < f(lower), f(minimum) < f(upper)`
//! invariant around whichever point came out lowest.

use crate::error::Result;
use crate::system::ScalarFn;

use super::{Bracket, MinimizerStrategy};

/// `1 - 1/phi`, the fraction of the larger sub-interval at which the
/// next trial point is placed.
const GOLDEN_RATIO: f64 = 0.3819660112501051;

pub struct GoldenSection;

impl MinimizerStrategy for GoldenSection {
    fn name(&self) -> &'static str {
        "golden_section"
    }

    fn iterate(&mut self, bracket: &mut Bracket, system: &dyn ScalarFn) -> Result<()> {
        let Bracket {
            lower,
            minimum,
            upper,
            f_lower,
            f_minimum,
            f_upper,
        } = *bracket;

        let x_new = if upper - minimum > minimum - lower {
            minimum + GOLDEN_RATIO * (upper - minimum)
        } else {
            minimum - GOLDEN_RATIO * (minimum - lower)
        };

        let f_new = system.eval(x_new)?;

        if f_new < f_minimum {
            if x_new < minimum {
                bracket.upper = minimum;
                bracket.f_upper = f_minimum;
            } else {
                bracket.lower = minimum;
                bracket.f_lower = f_minimum;
            }
            bracket.minimum = x_new;
            bracket.f_minimum = f_new;
        } else if x_new < minimum {
            bracket.lower = x_new;
            bracket.f_lower = f_new;
        } else {
            bracket.upper = x_new;
            bracket.f_upper = f_new;
        }

        Ok(())
    }
}

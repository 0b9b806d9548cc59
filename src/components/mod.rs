//! Primitive component implementations

/// Implements the four slice accessors of [`Component`](crate::Component)
/// for a component with scalar `input`/`output` fields (`none` for a
/// component without inputs).
macro_rules! scalar_io {
    (none, $output:ident) => {
        #[inline]
        fn inputs(&self) -> &[f64] {
            &[]
        }

        #[inline]
        fn inputs_mut(&mut self) -> &mut [f64] {
            &mut []
        }

        #[inline]
        fn outputs(&self) -> &[f64] {
            std::slice::from_ref(&self.$output)
        }

        #[inline]
        fn outputs_mut(&mut self) -> &mut [f64] {
            std::slice::from_mut(&mut self.$output)
        }
    };
    ($input:ident, $output:ident) => {
        #[inline]
        fn inputs(&self) -> &[f64] {
            std::slice::from_ref(&self.$input)
        }

        #[inline]
        fn inputs_mut(&mut self) -> &mut [f64] {
            std::slice::from_mut(&mut self.$input)
        }

        #[inline]
        fn outputs(&self) -> &[f64] {
            std::slice::from_ref(&self.$output)
        }

        #[inline]
        fn outputs_mut(&mut self) -> &mut [f64] {
            std::slice::from_mut(&mut self.$output)
        }
    };
}

mod function;
mod generators;
mod linear;
mod nonlinear;
mod sources;

pub use function::{Breakpoints, PiecewiseLinear, PiecewiseSource};
pub use generators::{SawtoothWave, SineSource, SquareWave, TriangleWave};
pub use linear::{Coefficient, Integrator, Inverter, Summer};
pub use nonlinear::{Comparator, Divider, DotProduct, Exp, Limiter, Max, Multiplier};
pub use sources::{Constant, Ramp, Step};

//! ComponentKind enum for dispatch over the closed set of primitives
//!
//! The machine stores every component as a `ComponentKind`, so a graph is a
//! single homogeneous collection and each call is a `match` rather than a
//! virtual call.

use crate::component::Component;
use crate::components::*;
use crate::params::{Configurable, Params};
use crate::port::PortNames;

/// Macro to reduce boilerplate for per-variant method delegation
macro_rules! dispatch_method {
    ($self:ident, $method:ident, $($args:expr),*) => {
        match $self {
            ComponentKind::Integrator(c) => c.$method($($args),*),
            ComponentKind::Summer(c) => c.$method($($args),*),
            ComponentKind::Coefficient(c) => c.$method($($args),*),
            ComponentKind::Inverter(c) => c.$method($($args),*),
            ComponentKind::Multiplier(c) => c.$method($($args),*),
            ComponentKind::Comparator(c) => c.$method($($args),*),
            ComponentKind::Limiter(c) => c.$method($($args),*),
            ComponentKind::Exp(c) => c.$method($($args),*),
            ComponentKind::Divider(c) => c.$method($($args),*),
            ComponentKind::Max(c) => c.$method($($args),*),
            ComponentKind::DotProduct(c) => c.$method($($args),*),
            ComponentKind::PiecewiseLinear(c) => c.$method($($args),*),
            ComponentKind::Constant(c) => c.$method($($args),*),
            ComponentKind::SineSource(c) => c.$method($($args),*),
            ComponentKind::TriangleWave(c) => c.$method($($args),*),
            ComponentKind::SawtoothWave(c) => c.$method($($args),*),
            ComponentKind::SquareWave(c) => c.$method($($args),*),
            ComponentKind::Ramp(c) => c.$method($($args),*),
            ComponentKind::Step(c) => c.$method($($args),*),
            ComponentKind::PiecewiseSource(c) => c.$method($($args),*),
        }
    };
}

/// Macro generating `From<T> for ComponentKind` for each variant
macro_rules! impl_from {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for ComponentKind {
                fn from(c: $variant) -> Self {
                    ComponentKind::$variant(c)
                }
            }
        )*
    };
}

/// Type-erased enum wrapping all primitive component types
///
/// # Example
///
/// ```ignore
/// use philbrick::components::*;
/// use philbrick::ComponentKind;
///
/// let mut parts: Vec<ComponentKind> = vec![
///     Constant::new(1.0).into(),
///     Coefficient::new(2.0).into(),
///     Integrator::new(0.0, 1.0).into(),
/// ];
///
/// for part in &mut parts {
///     part.update(0.0, 0.001);
/// }
/// ```
#[derive(Debug, Clone)]
pub enum ComponentKind {
    // Linear
    Integrator(Integrator),
    Summer(Summer),
    Coefficient(Coefficient),
    Inverter(Inverter),

    // Nonlinear
    Multiplier(Multiplier),
    Comparator(Comparator),
    Limiter(Limiter),
    Exp(Exp),
    Divider(Divider),
    Max(Max),
    DotProduct(DotProduct),
    PiecewiseLinear(PiecewiseLinear),

    // Sources
    Constant(Constant),
    SineSource(SineSource),
    TriangleWave(TriangleWave),
    SawtoothWave(SawtoothWave),
    SquareWave(SquareWave),
    Ramp(Ramp),
    Step(Step),
    PiecewiseSource(PiecewiseSource),
}

impl_from!(
    Integrator,
    Summer,
    Coefficient,
    Inverter,
    Multiplier,
    Comparator,
    Limiter,
    Exp,
    Divider,
    Max,
    DotProduct,
    PiecewiseLinear,
    Constant,
    SineSource,
    TriangleWave,
    SawtoothWave,
    SquareWave,
    Ramp,
    Step,
    PiecewiseSource,
);

/// Kind name of a configurable type, usable inside `dispatch_method!`
trait KindName {
    fn kind_name(&self) -> &'static str;
    fn export_params(&self) -> Params;
}

impl<T: Configurable> KindName for T {
    fn kind_name(&self) -> &'static str {
        T::KIND
    }

    fn export_params(&self) -> Params {
        self.params()
    }
}

impl ComponentKind {
    /// Kind name as used in circuit definitions, e.g. "Integrator"
    pub fn kind_name(&self) -> &'static str {
        dispatch_method!(self, kind_name,)
    }

    /// Complete parameter set, suitable for rebuilding this component
    pub fn params(&self) -> Params {
        dispatch_method!(self, export_params,)
    }
}

impl Component for ComponentKind {
    fn input_names(&self) -> PortNames {
        dispatch_method!(self, input_names,)
    }

    fn output_names(&self) -> PortNames {
        dispatch_method!(self, output_names,)
    }

    fn inputs(&self) -> &[f64] {
        dispatch_method!(self, inputs,)
    }

    fn inputs_mut(&mut self) -> &mut [f64] {
        dispatch_method!(self, inputs_mut,)
    }

    fn outputs(&self) -> &[f64] {
        dispatch_method!(self, outputs,)
    }

    fn outputs_mut(&mut self) -> &mut [f64] {
        dispatch_method!(self, outputs_mut,)
    }

    #[inline]
    fn update(&mut self, t: f64, dt: f64) {
        dispatch_method!(self, update, t, dt)
    }

    fn reset(&mut self) {
        dispatch_method!(self, reset,)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_update() {
        let mut parts: Vec<ComponentKind> = vec![
            Constant::new(2.0).into(),
            Coefficient::new(3.0).into(),
            Integrator::new(0.0, 1.0).into(),
        ];

        parts[1].set_input(0, 2.0);
        parts[2].set_input(0, 1.0);
        for part in &mut parts {
            part.update(0.1, 0.1);
        }

        assert_eq!(parts[0].get_output(0), 2.0);
        assert_eq!(parts[1].get_output(0), 6.0);
        assert!((parts[2].get_output(0) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_kind_names() {
        let sine: ComponentKind = SineSource::new(1.0, 1.0, 0.0).unwrap().into();
        assert_eq!(sine.kind_name(), "VoltageSource");

        let sum: ComponentKind = Summer::subtractor().into();
        assert_eq!(sum.kind_name(), "Summer");
        assert_eq!(sum.input_names().len(), 2);
    }

    #[test]
    fn test_reset_through_enum() {
        let mut int: ComponentKind = Integrator::new(1.5, 1.0).into();
        int.set_input(0, 10.0);
        int.update(0.0, 0.1);
        assert_eq!(int.get_output(0), 2.5);
        int.reset();
        assert_eq!(int.get_output(0), 1.5);
    }
}

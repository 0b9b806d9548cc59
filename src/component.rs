//! Core Component trait
//!
//! A component owns its port values and internal state. During `update` it
//! may read only its own inputs and state, and write only its own outputs and
//! state; the patch bay is the only thing that moves values between
//! components.

use crate::error::WiringError;
use crate::port::{PortDirection, PortNames};

/// A signal-processing unit with named inputs and outputs.
///
/// # Example
///
/// ```ignore
/// pub struct Coefficient {
///     input: [f64; 1],
///     output: [f64; 1],
///     k: f64,
/// }
///
/// impl Component for Coefficient {
///     fn update(&mut self, _t: f64, _dt: f64) {
///         self.output[0] = self.input[0] * self.k;
///     }
///     // ...
/// }
/// ```
pub trait Component {
    /// Names of the input ports, in port order
    fn input_names(&self) -> PortNames;

    /// Names of the output ports, in port order
    fn output_names(&self) -> PortNames;

    /// Access inputs as slice
    fn inputs(&self) -> &[f64];

    /// Mutable access to inputs
    fn inputs_mut(&mut self) -> &mut [f64];

    /// Access outputs as slice
    fn outputs(&self) -> &[f64];

    /// Mutable access to outputs
    fn outputs_mut(&mut self) -> &mut [f64];

    /// Compute new outputs from the current inputs and state.
    ///
    /// `t` is the machine clock at the end of the step being computed and
    /// `dt` the fixed step size. Time sources evaluate themselves at `t`.
    fn update(&mut self, t: f64, dt: f64);

    /// Restore state and outputs to the configured initial condition.
    ///
    /// Inputs are left untouched; they are overwritten by the next
    /// propagation anyway.
    fn reset(&mut self);

    /// Read a single input value (0.0 if never written)
    #[inline]
    fn get_input(&self, port: usize) -> f64 {
        self.inputs()[port]
    }

    /// Overwrite a single input value
    #[inline]
    fn set_input(&mut self, port: usize, value: f64) {
        self.inputs_mut()[port] = value;
    }

    /// Read a single output value
    #[inline]
    fn get_output(&self, port: usize) -> f64 {
        self.outputs()[port]
    }
}

/// Resolve a port name on `component` to its index in `direction`.
///
/// Naming a port that exists only in the other direction is reported as a
/// direction mismatch rather than an unknown port.
pub(crate) fn find_port<C: Component + ?Sized>(
    component: &C,
    component_name: &str,
    port: &str,
    direction: PortDirection,
) -> Result<usize, WiringError> {
    let (wanted, other) = match direction {
        PortDirection::Input => (component.input_names(), component.output_names()),
        PortDirection::Output => (component.output_names(), component.input_names()),
    };
    if let Some(index) = wanted.index_of(port) {
        return Ok(index);
    }
    if other.index_of(port).is_some() {
        return Err(WiringError::DirectionMismatch {
            port: format!("{}.{}", component_name, port),
            expected: direction,
            actual: direction.opposite(),
        });
    }
    Err(WiringError::UnknownPort {
        component: component_name.to_string(),
        port: port.to_string(),
        direction,
    })
}

//! Linear operators: integrate, sum, scale, invert

use crate::component::Component;
use crate::error::ConfigurationError;
use crate::params::{params, Configurable, ParamReader, Params, MAX_PORTS};
use crate::port::PortNames;

/// Integrator: out(t) = initial + gain * ∫ in dt
///
/// Forward Euler with the machine's fixed step:
/// `state += in * gain * dt`, then `out = state`.
///
/// # Example
///
/// ```ignore
/// let mut int = Integrator::new(0.0, 1.0);
/// int.set_input(0, 1.0);
/// for _ in 0..100 {
///     int.update(0.0, 0.01);
/// }
/// // Output should be approximately 1.0
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Integrator {
    input: f64,
    output: f64,
    state: f64,
    initial: f64,
    gain: f64,
}

impl Integrator {
    /// Create an integrator with an initial condition and input gain
    pub fn new(initial: f64, gain: f64) -> Self {
        Self {
            input: 0.0,
            output: initial,
            state: initial,
            initial,
            gain,
        }
    }

    /// Current state value
    pub fn value(&self) -> f64 {
        self.state
    }

    pub fn initial(&self) -> f64 {
        self.initial
    }

    pub fn gain(&self) -> f64 {
        self.gain
    }
}

impl Default for Integrator {
    fn default() -> Self {
        Self::new(0.0, 1.0)
    }
}

impl Component for Integrator {
    fn input_names(&self) -> PortNames {
        PortNames::IN
    }

    fn output_names(&self) -> PortNames {
        PortNames::OUT
    }

    scalar_io!(input, output);

    #[inline]
    fn update(&mut self, _t: f64, dt: f64) {
        self.state += self.input * self.gain * dt;
        self.output = self.state;
    }

    fn reset(&mut self) {
        self.state = self.initial;
        self.output = self.initial;
    }
}

impl Configurable for Integrator {
    const KIND: &'static str = "Integrator";
    const PARAMS: &'static [&'static str] = &["initial", "gain"];

    fn from_params(params: &Params) -> Result<Self, ConfigurationError> {
        let p = ParamReader::new(Self::KIND, params, Self::PARAMS)?;
        Ok(Self::new(p.f64("initial", 0.0)?, p.f64("gain", 1.0)?))
    }

    fn params(&self) -> Params {
        params! { "initial" => self.initial, "gain" => self.gain }
    }
}

/// Summer: out = Σ weights[i] * in_i
///
/// Input ports are named `in0 .. in{N-1}`, one per weight.
#[derive(Debug, Clone)]
pub struct Summer {
    inputs: Vec<f64>,
    output: f64,
    weights: Vec<f64>,
}

impl Summer {
    /// Create a summer with one input per weight
    pub fn new(weights: Vec<f64>) -> Result<Self, ConfigurationError> {
        let reason = if weights.is_empty() {
            Some("needs at least one weight".to_string())
        } else if weights.len() > MAX_PORTS {
            Some(format!("at most {} weights, got {}", MAX_PORTS, weights.len()))
        } else {
            None
        };
        if let Some(reason) = reason {
            return Err(ConfigurationError::InvalidValue {
                kind: Self::KIND.to_string(),
                param: "weights".to_string(),
                reason,
            });
        }
        Ok(Self {
            inputs: vec![0.0; weights.len()],
            output: 0.0,
            weights,
        })
    }

    /// Unit-weight summer with `n` inputs
    pub fn with_inputs(n: usize) -> Result<Self, ConfigurationError> {
        Self::new(vec![1.0; n])
    }

    /// Two-input subtractor: out = in0 - in1
    pub fn subtractor() -> Self {
        Self {
            inputs: vec![0.0; 2],
            output: 0.0,
            weights: vec![1.0, -1.0],
        }
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }
}

impl Component for Summer {
    fn input_names(&self) -> PortNames {
        PortNames::Indexed {
            prefix: "in",
            count: self.weights.len(),
        }
    }

    fn output_names(&self) -> PortNames {
        PortNames::OUT
    }

    fn inputs(&self) -> &[f64] {
        &self.inputs
    }

    fn inputs_mut(&mut self) -> &mut [f64] {
        &mut self.inputs
    }

    fn outputs(&self) -> &[f64] {
        std::slice::from_ref(&self.output)
    }

    fn outputs_mut(&mut self) -> &mut [f64] {
        std::slice::from_mut(&mut self.output)
    }

    #[inline]
    fn update(&mut self, _t: f64, _dt: f64) {
        self.output = self
            .inputs
            .iter()
            .zip(&self.weights)
            .map(|(u, w)| u * w)
            .sum();
    }

    fn reset(&mut self) {
        self.output = 0.0;
    }
}

impl Configurable for Summer {
    const KIND: &'static str = "Summer";
    const PARAMS: &'static [&'static str] = &["weights"];

    fn from_params(params: &Params) -> Result<Self, ConfigurationError> {
        let p = ParamReader::new(Self::KIND, params, Self::PARAMS)?;
        Self::new(p.f64_list("weights", &[1.0, 1.0])?)
    }

    fn params(&self) -> Params {
        params! { "weights" => self.weights }
    }
}

/// Coefficient (potentiometer): out = k * in
#[derive(Debug, Clone, Copy)]
pub struct Coefficient {
    input: f64,
    output: f64,
    k: f64,
}

impl Coefficient {
    pub fn new(k: f64) -> Self {
        Self {
            input: 0.0,
            output: 0.0,
            k,
        }
    }

    pub fn k(&self) -> f64 {
        self.k
    }
}

impl Component for Coefficient {
    fn input_names(&self) -> PortNames {
        PortNames::IN
    }

    fn output_names(&self) -> PortNames {
        PortNames::OUT
    }

    scalar_io!(input, output);

    #[inline]
    fn update(&mut self, _t: f64, _dt: f64) {
        self.output = self.input * self.k;
    }

    fn reset(&mut self) {
        self.output = 0.0;
    }
}

impl Configurable for Coefficient {
    const KIND: &'static str = "Coefficient";
    const PARAMS: &'static [&'static str] = &["k"];

    fn from_params(params: &Params) -> Result<Self, ConfigurationError> {
        let p = ParamReader::new(Self::KIND, params, Self::PARAMS)?;
        Ok(Self::new(p.f64("k", 1.0)?))
    }

    fn params(&self) -> Params {
        params! { "k" => self.k }
    }
}

/// Inverter: out = -in
#[derive(Debug, Clone, Copy, Default)]
pub struct Inverter {
    input: f64,
    output: f64,
}

impl Inverter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Component for Inverter {
    fn input_names(&self) -> PortNames {
        PortNames::IN
    }

    fn output_names(&self) -> PortNames {
        PortNames::OUT
    }

    scalar_io!(input, output);

    #[inline]
    fn update(&mut self, _t: f64, _dt: f64) {
        self.output = -self.input;
    }

    fn reset(&mut self) {
        self.output = 0.0;
    }
}

impl Configurable for Inverter {
    const KIND: &'static str = "Inverter";
    const PARAMS: &'static [&'static str] = &[];

    fn from_params(params: &Params) -> Result<Self, ConfigurationError> {
        ParamReader::new(Self::KIND, params, Self::PARAMS)?;
        Ok(Self::new())
    }

    fn params(&self) -> Params {
        Params::new()
    }
}

//! Nonlinear operators and reductions

use crate::component::Component;
use crate::error::ConfigurationError;
use crate::params::{params, Configurable, ParamReader, Params, MAX_PORTS};
use crate::port::PortNames;

/// Exponent bound applied before `exp`, keeping outputs inside ~[4.5e-5, 2.2e4]
pub const EXP_CLAMP: f64 = 10.0;

/// Four-quadrant multiplier: out = x * y * scale
#[derive(Debug, Clone, Copy)]
pub struct Multiplier {
    inputs: [f64; 2],
    output: f64,
    scale: f64,
}

impl Multiplier {
    pub fn new(scale: f64) -> Self {
        Self {
            inputs: [0.0; 2],
            output: 0.0,
            scale,
        }
    }
}

impl Default for Multiplier {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl Component for Multiplier {
    fn input_names(&self) -> PortNames {
        PortNames::Fixed(&["x", "y"])
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
        self.output = self.inputs[0] * self.inputs[1] * self.scale;
    }

    fn reset(&mut self) {
        self.output = 0.0;
    }
}

impl Configurable for Multiplier {
    const KIND: &'static str = "Multiplier";
    const PARAMS: &'static [&'static str] = &["scale"];

    fn from_params(params: &Params) -> Result<Self, ConfigurationError> {
        let p = ParamReader::new(Self::KIND, params, Self::PARAMS)?;
        Ok(Self::new(p.f64("scale", 1.0)?))
    }

    fn params(&self) -> Params {
        params! { "scale" => self.scale }
    }
}

/// Comparator: out = high if in >= threshold, else low
#[derive(Debug, Clone, Copy)]
pub struct Comparator {
    input: f64,
    output: f64,
    threshold: f64,
    high: f64,
    low: f64,
}

impl Comparator {
    pub fn new(threshold: f64, high: f64, low: f64) -> Self {
        Self {
            input: 0.0,
            output: 0.0,
            threshold,
            high,
            low,
        }
    }
}

impl Component for Comparator {
    fn input_names(&self) -> PortNames {
        PortNames::IN
    }

    fn output_names(&self) -> PortNames {
        PortNames::OUT
    }

    scalar_io!(input, output);

    #[inline]
    fn update(&mut self, _t: f64, _dt: f64) {
        self.output = if self.input >= self.threshold {
            self.high
        } else {
            self.low
        };
    }

    fn reset(&mut self) {
        self.output = 0.0;
    }
}

impl Configurable for Comparator {
    const KIND: &'static str = "Comparator";
    const PARAMS: &'static [&'static str] = &["threshold", "high", "low"];

    fn from_params(params: &Params) -> Result<Self, ConfigurationError> {
        let p = ParamReader::new(Self::KIND, params, Self::PARAMS)?;
        Ok(Self::new(
            p.f64("threshold", 0.0)?,
            p.f64("high", 1.0)?,
            p.f64("low", -1.0)?,
        ))
    }

    fn params(&self) -> Params {
        params! {
            "threshold" => self.threshold,
            "high" => self.high,
            "low" => self.low,
        }
    }
}

/// Limiter: out = clamp(in, min_val, max_val)
#[derive(Debug, Clone, Copy)]
pub struct Limiter {
    input: f64,
    output: f64,
    min_val: f64,
    max_val: f64,
}

impl Limiter {
    pub fn new(min_val: f64, max_val: f64) -> Result<Self, ConfigurationError> {
        if !(min_val <= max_val) {
            return Err(ConfigurationError::InvalidValue {
                kind: Self::KIND.to_string(),
                param: "min_val".to_string(),
                reason: format!("min_val {} exceeds max_val {}", min_val, max_val),
            });
        }
        Ok(Self {
            input: 0.0,
            output: 0.0,
            min_val,
            max_val,
        })
    }
}

impl Component for Limiter {
    fn input_names(&self) -> PortNames {
        PortNames::IN
    }

    fn output_names(&self) -> PortNames {
        PortNames::OUT
    }

    scalar_io!(input, output);

    #[inline]
    fn update(&mut self, _t: f64, _dt: f64) {
        self.output = self.input.clamp(self.min_val, self.max_val);
    }

    fn reset(&mut self) {
        self.output = 0.0;
    }
}

impl Configurable for Limiter {
    const KIND: &'static str = "Limiter";
    const PARAMS: &'static [&'static str] = &["min_val", "max_val"];

    fn from_params(params: &Params) -> Result<Self, ConfigurationError> {
        let p = ParamReader::new(Self::KIND, params, Self::PARAMS)?;
        Self::new(p.f64("min_val", -1.0)?, p.f64("max_val", 1.0)?)
    }

    fn params(&self) -> Params {
        params! { "min_val" => self.min_val, "max_val" => self.max_val }
    }
}

/// Exponential: out = exp(clamp(in * scale, -10, 10))
#[derive(Debug, Clone, Copy)]
pub struct Exp {
    input: f64,
    output: f64,
    scale: f64,
}

impl Exp {
    pub fn new(scale: f64) -> Self {
        Self {
            input: 0.0,
            output: 1.0,
            scale,
        }
    }
}

impl Default for Exp {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl Component for Exp {
    fn input_names(&self) -> PortNames {
        PortNames::IN
    }

    fn output_names(&self) -> PortNames {
        PortNames::OUT
    }

    scalar_io!(input, output);

    #[inline]
    fn update(&mut self, _t: f64, _dt: f64) {
        self.output = (self.input * self.scale).clamp(-EXP_CLAMP, EXP_CLAMP).exp();
    }

    fn reset(&mut self) {
        self.output = 1.0;
    }
}

impl Configurable for Exp {
    const KIND: &'static str = "Exp";
    const PARAMS: &'static [&'static str] = &["scale"];

    fn from_params(params: &Params) -> Result<Self, ConfigurationError> {
        let p = ParamReader::new(Self::KIND, params, Self::PARAMS)?;
        Ok(Self::new(p.f64("scale", 1.0)?))
    }

    fn params(&self) -> Params {
        params! { "scale" => self.scale }
    }
}

/// Divider: out = num / max(|den|, epsilon) * sign(den), with sign(0) = +1
#[derive(Debug, Clone, Copy)]
pub struct Divider {
    inputs: [f64; 2],
    output: f64,
    epsilon: f64,
}

impl Divider {
    pub fn new(epsilon: f64) -> Result<Self, ConfigurationError> {
        if !(epsilon > 0.0 && epsilon.is_finite()) {
            return Err(ConfigurationError::InvalidValue {
                kind: Self::KIND.to_string(),
                param: "epsilon".to_string(),
                reason: format!("must be > 0, got {}", epsilon),
            });
        }
        Ok(Self {
            inputs: [0.0; 2],
            output: 0.0,
            epsilon,
        })
    }
}

impl Component for Divider {
    fn input_names(&self) -> PortNames {
        PortNames::Fixed(&["num", "den"])
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
        let [num, den] = self.inputs;
        let sign = if den >= 0.0 { 1.0 } else { -1.0 };
        self.output = num / den.abs().max(self.epsilon) * sign;
    }

    fn reset(&mut self) {
        self.output = 0.0;
    }
}

impl Configurable for Divider {
    const KIND: &'static str = "Divider";
    const PARAMS: &'static [&'static str] = &["epsilon"];

    fn from_params(params: &Params) -> Result<Self, ConfigurationError> {
        let p = ParamReader::new(Self::KIND, params, Self::PARAMS)?;
        Self::new(p.positive("epsilon", 1e-6)?)
    }

    fn params(&self) -> Params {
        params! { "epsilon" => self.epsilon }
    }
}

/// Max selector: out = max(in0 .. in{N-1})
#[derive(Debug, Clone)]
pub struct Max {
    inputs: Vec<f64>,
    output: f64,
}

impl Max {
    pub fn new(size: usize) -> Result<Self, ConfigurationError> {
        check_size(Self::KIND, size)?;
        Ok(Self {
            inputs: vec![0.0; size],
            output: 0.0,
        })
    }
}

impl Component for Max {
    fn input_names(&self) -> PortNames {
        PortNames::Indexed {
            prefix: "in",
            count: self.inputs.len(),
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
        self.output = self.inputs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    }

    fn reset(&mut self) {
        self.output = 0.0;
    }
}

impl Configurable for Max {
    const KIND: &'static str = "Max";
    const PARAMS: &'static [&'static str] = &["size"];

    fn from_params(params: &Params) -> Result<Self, ConfigurationError> {
        let p = ParamReader::new(Self::KIND, params, Self::PARAMS)?;
        Self::new(p.count("size", 2, 1)?)
    }

    fn params(&self) -> Params {
        params! { "size" => self.inputs.len() }
    }
}

/// Dot product: out = Σ a_i * b_i
///
/// Inputs are `a0 .. a{N-1}` followed by `b0 .. b{N-1}`.
#[derive(Debug, Clone)]
pub struct DotProduct {
    inputs: Vec<f64>,
    output: f64,
    size: usize,
}

impl DotProduct {
    pub fn new(size: usize) -> Result<Self, ConfigurationError> {
        check_size(Self::KIND, size)?;
        Ok(Self {
            inputs: vec![0.0; 2 * size],
            output: 0.0,
            size,
        })
    }
}

impl Component for DotProduct {
    fn input_names(&self) -> PortNames {
        PortNames::Paired {
            first: "a",
            second: "b",
            count: self.size,
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
        let (a, b) = self.inputs.split_at(self.size);
        self.output = a.iter().zip(b).map(|(x, y)| x * y).sum();
    }

    fn reset(&mut self) {
        self.output = 0.0;
    }
}

impl Configurable for DotProduct {
    const KIND: &'static str = "DotProduct";
    const PARAMS: &'static [&'static str] = &["size"];

    fn from_params(params: &Params) -> Result<Self, ConfigurationError> {
        let p = ParamReader::new(Self::KIND, params, Self::PARAMS)?;
        Self::new(p.count("size", 4, 1)?)
    }

    fn params(&self) -> Params {
        params! { "size" => self.size }
    }
}

fn check_size(kind: &str, size: usize) -> Result<(), ConfigurationError> {
    let reason = if size == 0 {
        "must be at least 1".to_string()
    } else if size > MAX_PORTS {
        format!("must be at most {}, got {}", MAX_PORTS, size)
    } else {
        return Ok(());
    };
    Err(ConfigurationError::InvalidValue {
        kind: kind.to_string(),
        param: "size".to_string(),
        reason,
    })
}

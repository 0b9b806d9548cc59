//! Source blocks (no inputs, time-dependent or constant outputs)
//!
//! Sources compute their output from the machine clock alone, so a reset or a
//! clock rewind always puts them back in step with the rest of the graph.

use crate::component::Component;
use crate::error::ConfigurationError;
use crate::params::{params, Configurable, ParamReader, Params};
use crate::port::PortNames;

/// Constant source: out = value
#[derive(Debug, Clone, Copy)]
pub struct Constant {
    output: f64,
    value: f64,
}

impl Constant {
    pub fn new(value: f64) -> Self {
        Self {
            output: value,
            value,
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }
}

impl Component for Constant {
    fn input_names(&self) -> PortNames {
        PortNames::NONE
    }

    fn output_names(&self) -> PortNames {
        PortNames::OUT
    }

    scalar_io!(none, output);

    #[inline]
    fn update(&mut self, _t: f64, _dt: f64) {
        self.output = self.value;
    }

    fn reset(&mut self) {
        self.output = self.value;
    }
}

impl Configurable for Constant {
    const KIND: &'static str = "Constant";
    const PARAMS: &'static [&'static str] = &["value"];

    fn from_params(params: &Params) -> Result<Self, ConfigurationError> {
        let p = ParamReader::new(Self::KIND, params, Self::PARAMS)?;
        Ok(Self::new(p.f64("value", 1.0)?))
    }

    fn params(&self) -> Params {
        params! { "value" => self.value }
    }
}

/// Ramp source: out = slope * max(0, t - start_time)
#[derive(Debug, Clone, Copy)]
pub struct Ramp {
    output: f64,
    slope: f64,
    start_time: f64,
}

impl Ramp {
    pub fn new(slope: f64, start_time: f64) -> Self {
        let mut ramp = Self {
            output: 0.0,
            slope,
            start_time,
        };
        ramp.reset();
        ramp
    }

    #[inline]
    fn value_at(&self, t: f64) -> f64 {
        self.slope * (t - self.start_time).max(0.0)
    }
}

impl Component for Ramp {
    fn input_names(&self) -> PortNames {
        PortNames::NONE
    }

    fn output_names(&self) -> PortNames {
        PortNames::OUT
    }

    scalar_io!(none, output);

    #[inline]
    fn update(&mut self, t: f64, _dt: f64) {
        self.output = self.value_at(t);
    }

    fn reset(&mut self) {
        self.output = self.value_at(0.0);
    }
}

impl Configurable for Ramp {
    const KIND: &'static str = "Ramp";
    const PARAMS: &'static [&'static str] = &["slope", "start_time"];

    fn from_params(params: &Params) -> Result<Self, ConfigurationError> {
        let p = ParamReader::new(Self::KIND, params, Self::PARAMS)?;
        Ok(Self::new(p.f64("slope", 1.0)?, p.f64("start_time", 0.0)?))
    }

    fn params(&self) -> Params {
        params! { "slope" => self.slope, "start_time" => self.start_time }
    }
}

/// Step source: out = final_value if t >= step_time, else initial_value
#[derive(Debug, Clone, Copy)]
pub struct Step {
    output: f64,
    step_time: f64,
    initial_value: f64,
    final_value: f64,
}

impl Step {
    pub fn new(step_time: f64, initial_value: f64, final_value: f64) -> Self {
        let mut step = Self {
            output: 0.0,
            step_time,
            initial_value,
            final_value,
        };
        step.reset();
        step
    }

    #[inline]
    fn value_at(&self, t: f64) -> f64 {
        if t >= self.step_time {
            self.final_value
        } else {
            self.initial_value
        }
    }
}

impl Component for Step {
    fn input_names(&self) -> PortNames {
        PortNames::NONE
    }

    fn output_names(&self) -> PortNames {
        PortNames::OUT
    }

    scalar_io!(none, output);

    #[inline]
    fn update(&mut self, t: f64, _dt: f64) {
        self.output = self.value_at(t);
    }

    fn reset(&mut self) {
        self.output = self.value_at(0.0);
    }
}

impl Configurable for Step {
    const KIND: &'static str = "Step";
    const PARAMS: &'static [&'static str] = &["step_time", "initial_value", "final_value"];

    fn from_params(params: &Params) -> Result<Self, ConfigurationError> {
        let p = ParamReader::new(Self::KIND, params, Self::PARAMS)?;
        Ok(Self::new(
            p.f64("step_time", 0.0)?,
            p.f64("initial_value", 0.0)?,
            p.f64("final_value", 1.0)?,
        ))
    }

    fn params(&self) -> Params {
        params! {
            "step_time" => self.step_time,
            "initial_value" => self.initial_value,
            "final_value" => self.final_value,
        }
    }
}

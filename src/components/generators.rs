//! Periodic waveform generators
//!
//! All generators derive their output from the engine-supplied time, so the
//! waveform phase always matches the machine clock.

use std::f64::consts::PI;

use crate::component::Component;
use crate::error::ConfigurationError;
use crate::params::{params, Configurable, ParamReader, Params};
use crate::port::PortNames;

/// Fractional part of `frequency * t`, in [0, 1)
#[inline]
fn phase(frequency: f64, t: f64) -> f64 {
    (frequency * t).rem_euclid(1.0)
}

fn check_frequency(kind: &str, frequency: f64) -> Result<(), ConfigurationError> {
    if !(frequency >= 0.0 && frequency.is_finite()) {
        return Err(ConfigurationError::InvalidValue {
            kind: kind.to_string(),
            param: "frequency".to_string(),
            reason: format!("must be finite and >= 0, got {}", frequency),
        });
    }
    Ok(())
}

/// Generates the boilerplate shared by the wave generators: ports, `update`
/// through `value_at`, and a reset to the value at t = 0.
macro_rules! generator_component {
    ($name:ident) => {
        impl Component for $name {
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
    };
}

/// Sine voltage source: out = amplitude * sin(2π f t + phase)
#[derive(Debug, Clone, Copy)]
pub struct SineSource {
    output: f64,
    frequency: f64,
    amplitude: f64,
    phase: f64,
}

impl SineSource {
    pub fn new(frequency: f64, amplitude: f64, phase: f64) -> Result<Self, ConfigurationError> {
        check_frequency(Self::KIND, frequency)?;
        let mut source = Self {
            output: 0.0,
            frequency,
            amplitude,
            phase,
        };
        source.reset();
        Ok(source)
    }

    #[inline]
    fn value_at(&self, t: f64) -> f64 {
        self.amplitude * (2.0 * PI * self.frequency * t + self.phase).sin()
    }
}

generator_component!(SineSource);

impl Configurable for SineSource {
    const KIND: &'static str = "VoltageSource";
    const PARAMS: &'static [&'static str] = &["frequency", "amplitude", "phase"];

    fn from_params(params: &Params) -> Result<Self, ConfigurationError> {
        let p = ParamReader::new(Self::KIND, params, Self::PARAMS)?;
        Self::new(
            p.non_negative("frequency", 1.0)?,
            p.f64("amplitude", 1.0)?,
            p.f64("phase", 0.0)?,
        )
    }

    fn params(&self) -> Params {
        params! {
            "frequency" => self.frequency,
            "amplitude" => self.amplitude,
            "phase" => self.phase,
        }
    }
}

/// Triangle wave between -amplitude and +amplitude, starting at -amplitude
#[derive(Debug, Clone, Copy)]
pub struct TriangleWave {
    output: f64,
    frequency: f64,
    amplitude: f64,
}

impl TriangleWave {
    pub fn new(frequency: f64, amplitude: f64) -> Result<Self, ConfigurationError> {
        check_frequency(Self::KIND, frequency)?;
        let mut wave = Self {
            output: 0.0,
            frequency,
            amplitude,
        };
        wave.reset();
        Ok(wave)
    }

    #[inline]
    fn value_at(&self, t: f64) -> f64 {
        let p = phase(self.frequency, t);
        let unit = if p < 0.5 { -1.0 + 4.0 * p } else { 3.0 - 4.0 * p };
        self.amplitude * unit
    }
}

generator_component!(TriangleWave);

impl Configurable for TriangleWave {
    const KIND: &'static str = "TriangleWave";
    const PARAMS: &'static [&'static str] = &["frequency", "amplitude"];

    fn from_params(params: &Params) -> Result<Self, ConfigurationError> {
        let p = ParamReader::new(Self::KIND, params, Self::PARAMS)?;
        Self::new(p.non_negative("frequency", 1.0)?, p.f64("amplitude", 1.0)?)
    }

    fn params(&self) -> Params {
        params! { "frequency" => self.frequency, "amplitude" => self.amplitude }
    }
}

/// Sawtooth rising from -amplitude to +amplitude once per period
#[derive(Debug, Clone, Copy)]
pub struct SawtoothWave {
    output: f64,
    frequency: f64,
    amplitude: f64,
}

impl SawtoothWave {
    pub fn new(frequency: f64, amplitude: f64) -> Result<Self, ConfigurationError> {
        check_frequency(Self::KIND, frequency)?;
        let mut wave = Self {
            output: 0.0,
            frequency,
            amplitude,
        };
        wave.reset();
        Ok(wave)
    }

    #[inline]
    fn value_at(&self, t: f64) -> f64 {
        self.amplitude * (-1.0 + 2.0 * phase(self.frequency, t))
    }
}

generator_component!(SawtoothWave);

impl Configurable for SawtoothWave {
    const KIND: &'static str = "SawtoothWave";
    const PARAMS: &'static [&'static str] = &["frequency", "amplitude"];

    fn from_params(params: &Params) -> Result<Self, ConfigurationError> {
        let p = ParamReader::new(Self::KIND, params, Self::PARAMS)?;
        Self::new(p.non_negative("frequency", 1.0)?, p.f64("amplitude", 1.0)?)
    }

    fn params(&self) -> Params {
        params! { "frequency" => self.frequency, "amplitude" => self.amplitude }
    }
}

/// Square wave: +amplitude for the first `duty_cycle` of each period, then -amplitude
#[derive(Debug, Clone, Copy)]
pub struct SquareWave {
    output: f64,
    frequency: f64,
    amplitude: f64,
    duty_cycle: f64,
}

impl SquareWave {
    pub fn new(frequency: f64, amplitude: f64, duty_cycle: f64) -> Result<Self, ConfigurationError> {
        check_frequency(Self::KIND, frequency)?;
        if !(0.0..=1.0).contains(&duty_cycle) {
            return Err(ConfigurationError::InvalidValue {
                kind: Self::KIND.to_string(),
                param: "duty_cycle".to_string(),
                reason: format!("must be within [0, 1], got {}", duty_cycle),
            });
        }
        let mut wave = Self {
            output: 0.0,
            frequency,
            amplitude,
            duty_cycle,
        };
        wave.reset();
        Ok(wave)
    }

    #[inline]
    fn value_at(&self, t: f64) -> f64 {
        if phase(self.frequency, t) < self.duty_cycle {
            self.amplitude
        } else {
            -self.amplitude
        }
    }
}

generator_component!(SquareWave);

impl Configurable for SquareWave {
    const KIND: &'static str = "SquareWave";
    const PARAMS: &'static [&'static str] = &["frequency", "amplitude", "duty_cycle"];

    fn from_params(params: &Params) -> Result<Self, ConfigurationError> {
        let p = ParamReader::new(Self::KIND, params, Self::PARAMS)?;
        Self::new(
            p.non_negative("frequency", 1.0)?,
            p.f64("amplitude", 1.0)?,
            p.f64("duty_cycle", 0.5)?,
        )
    }

    fn params(&self) -> Params {
        params! {
            "frequency" => self.frequency,
            "amplitude" => self.amplitude,
            "duty_cycle" => self.duty_cycle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_sine_quarter_periods() {
        let mut s = SineSource::new(1.0, 1.0, 0.0).unwrap();
        assert_eq!(s.get_output(0), 0.0);
        s.update(0.25, 0.25);
        assert_abs_diff_eq!(s.get_output(0), 1.0, epsilon = 1e-12);
        s.update(0.5, 0.25);
        assert_abs_diff_eq!(s.get_output(0), 0.0, epsilon = 1e-12);
        s.update(0.75, 0.25);
        assert_abs_diff_eq!(s.get_output(0), -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_triangle_shape() {
        let mut w = TriangleWave::new(1.0, 2.0).unwrap();
        assert_eq!(w.get_output(0), -2.0);
        w.update(0.25, 0.25);
        assert_abs_diff_eq!(w.get_output(0), 0.0, epsilon = 1e-12);
        w.update(0.5, 0.25);
        assert_abs_diff_eq!(w.get_output(0), 2.0, epsilon = 1e-12);
        w.update(0.75, 0.25);
        assert_abs_diff_eq!(w.get_output(0), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_sawtooth_wraps() {
        let mut w = SawtoothWave::new(2.0, 1.0).unwrap();
        w.update(0.125, 0.125);
        assert_abs_diff_eq!(w.get_output(0), -0.5, epsilon = 1e-12);
        w.update(0.5, 0.125);
        assert_abs_diff_eq!(w.get_output(0), -1.0, epsilon = 1e-12);
        w.reset();
        assert_eq!(w.get_output(0), -1.0);
    }

    #[test]
    fn test_square_duty_cycle() {
        let mut w = SquareWave::new(1.0, 3.0, 0.25).unwrap();
        assert_eq!(w.get_output(0), 3.0);
        w.update(0.2, 0.1);
        assert_eq!(w.get_output(0), 3.0);
        w.update(0.3, 0.1);
        assert_eq!(w.get_output(0), -3.0);
        w.update(1.1, 0.1);
        assert_eq!(w.get_output(0), 3.0);
    }

    #[test]
    fn test_rejects_negative_frequency() {
        let err = TriangleWave::from_params(&params! { "frequency" => -1.0 });
        assert!(matches!(err, Err(ConfigurationError::InvalidValue { .. })));
        assert!(SquareWave::new(1.0, 1.0, 1.5).is_err());
    }
}

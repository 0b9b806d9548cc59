//! Piecewise-linear function generators

use crate::component::Component;
use crate::error::ConfigurationError;
use crate::params::{params, Configurable, ParamReader, Params};
use crate::port::PortNames;

/// Sorted breakpoint table with clamped linear interpolation.
///
/// Needs at least two points with strictly increasing x. Input is sorted on
/// construction, so points may be given in any order.
#[derive(Debug, Clone, PartialEq)]
pub struct Breakpoints {
    points: Vec<(f64, f64)>,
}

impl Breakpoints {
    pub fn new(mut points: Vec<(f64, f64)>) -> Result<Self, String> {
        if points.len() < 2 {
            return Err(format!("needs at least 2 points, got {}", points.len()));
        }
        if points.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
            return Err("points must be finite".to_string());
        }
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        if points.windows(2).any(|w| w[0].0 == w[1].0) {
            return Err("x values must be distinct".to_string());
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    /// Interpolate at `x`, holding the end values outside the table.
    /// NaN passes through unchanged.
    pub fn eval(&self, x: f64) -> f64 {
        if x.is_nan() {
            return x;
        }
        let points = &self.points;
        let (x0, y0) = points[0];
        if x <= x0 {
            return y0;
        }
        let (xn, yn) = points[points.len() - 1];
        if x >= xn {
            return yn;
        }
        // first point strictly right of x; 1..len-1 given the checks above
        let i = points.partition_point(|p| p.0 <= x);
        let (xa, ya) = points[i - 1];
        let (xb, yb) = points[i];
        ya + (yb - ya) * (x - xa) / (xb - xa)
    }

    fn from_reader(p: &ParamReader, default: &[(f64, f64)]) -> Result<Self, ConfigurationError> {
        let points = p.points("breakpoints", default)?;
        Self::new(points).map_err(|reason| p.invalid("breakpoints", reason))
    }
}

/// Diode function generator: out = f(in) for a piecewise-linear f
#[derive(Debug, Clone)]
pub struct PiecewiseLinear {
    input: f64,
    output: f64,
    table: Breakpoints,
}

impl PiecewiseLinear {
    pub fn new(table: Breakpoints) -> Self {
        Self {
            input: 0.0,
            output: 0.0,
            table,
        }
    }
}

impl Component for PiecewiseLinear {
    fn input_names(&self) -> PortNames {
        PortNames::IN
    }

    fn output_names(&self) -> PortNames {
        PortNames::OUT
    }

    scalar_io!(input, output);

    #[inline]
    fn update(&mut self, _t: f64, _dt: f64) {
        self.output = self.table.eval(self.input);
    }

    fn reset(&mut self) {
        self.output = 0.0;
    }
}

impl Configurable for PiecewiseLinear {
    const KIND: &'static str = "PiecewiseLinear";
    const PARAMS: &'static [&'static str] = &["breakpoints"];

    fn from_params(params: &Params) -> Result<Self, ConfigurationError> {
        let p = ParamReader::new(Self::KIND, params, Self::PARAMS)?;
        let table = Breakpoints::from_reader(&p, &[(-1.0, -1.0), (1.0, 1.0)])?;
        Ok(Self::new(table))
    }

    fn params(&self) -> Params {
        params! { "breakpoints" => self.table.points() }
    }
}

/// Time-driven piecewise-linear source: out = f(t)
#[derive(Debug, Clone)]
pub struct PiecewiseSource {
    output: f64,
    table: Breakpoints,
}

impl PiecewiseSource {
    pub fn new(table: Breakpoints) -> Self {
        let output = table.eval(0.0);
        Self { output, table }
    }
}

impl Component for PiecewiseSource {
    fn input_names(&self) -> PortNames {
        PortNames::NONE
    }

    fn output_names(&self) -> PortNames {
        PortNames::OUT
    }

    scalar_io!(none, output);

    #[inline]
    fn update(&mut self, t: f64, _dt: f64) {
        self.output = self.table.eval(t);
    }

    fn reset(&mut self) {
        self.output = self.table.eval(0.0);
    }
}

impl Configurable for PiecewiseSource {
    const KIND: &'static str = "PiecewiseSource";
    const PARAMS: &'static [&'static str] = &["breakpoints"];

    fn from_params(params: &Params) -> Result<Self, ConfigurationError> {
        let p = ParamReader::new(Self::KIND, params, Self::PARAMS)?;
        let table = Breakpoints::from_reader(&p, &[(0.0, 0.0), (1.0, 1.0)])?;
        Ok(Self::new(table))
    }

    fn params(&self) -> Params {
        params! { "breakpoints" => self.table.points() }
    }
}

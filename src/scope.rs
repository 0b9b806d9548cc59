//! Scope: a bounded history recorder for machine ports.
//!
//! The machine itself keeps no history. A scope polls a set of ports once per
//! step into a ring buffer and answers questions about the recorded signals.
//!
//! # Example
//!
//! ```ignore
//! let mut scope = Scope::new(1000);
//! scope.add_channel(&machine, "INT1.out", Some("position"))?;
//! scope.run(&mut machine, 500)?;
//! let stats = scope.stats(0).unwrap();
//! scope.save("output.csv")?;
//! ```

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, Write};

use philbrick_types::ScopeDef;
use serde::Serialize;
use thiserror::Error;

use crate::error::WiringError;
use crate::machine::Machine;
use crate::port::PortRef;

/// Default number of samples kept per channel
pub const DEFAULT_CAPACITY: usize = 1000;

/// Invalid scope query
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScopeError {
    #[error(transparent)]
    Wiring(#[from] WiringError),

    #[error("no channel {0}")]
    UnknownChannel(usize),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// One recorded port
#[derive(Debug, Clone)]
pub struct Channel {
    source: PortRef,
    label: String,
    samples: VecDeque<f64>,
}

impl Channel {
    pub fn source(&self) -> &PortRef {
        &self.source
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Summary statistics over a channel's recorded samples
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SignalStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub final_value: f64,
    pub count: usize,
}

/// Result of a settling check over the last `window` samples
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Settlement {
    pub settled: bool,
    /// max - min over the window
    pub variation: f64,
    pub final_value: f64,
    /// Samples actually inspected (may be fewer than requested)
    pub window: usize,
}

/// Multi-channel ring-buffer recorder
#[derive(Debug, Clone)]
pub struct Scope {
    capacity: usize,
    times: VecDeque<f64>,
    channels: Vec<Channel>,
}

impl Default for Scope {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Scope {
    /// Create a scope keeping at most `capacity` samples (at least 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            times: VecDeque::with_capacity(capacity),
            channels: Vec::new(),
        }
    }

    /// Build a scope from a circuit's scope section
    pub fn from_def(machine: &Machine, def: &ScopeDef, capacity: usize) -> Result<Self, ScopeError> {
        let mut scope = Self::new(capacity);
        for channel in &def.channels {
            scope.add_channel(machine, &channel.source, channel.label.as_deref())?;
        }
        Ok(scope)
    }

    /// Start recording `source`; returns the channel index.
    ///
    /// Adding a channel clears previously recorded samples, so every channel
    /// always covers the same time span.
    pub fn add_channel(
        &mut self,
        machine: &Machine,
        source: &str,
        label: Option<&str>,
    ) -> Result<usize, ScopeError> {
        machine.read_port(source)?;
        let source = PortRef::parse(source)?;
        let label = label.map_or_else(|| source.to_string(), str::to_string);
        self.clear();
        self.channels.push(Channel {
            source,
            label,
            samples: VecDeque::with_capacity(self.capacity),
        });
        Ok(self.channels.len() - 1)
    }

    /// Record the current value of every channel
    pub fn sample(&mut self, machine: &Machine) -> Result<(), ScopeError> {
        let mut values = Vec::with_capacity(self.channels.len());
        for channel in &self.channels {
            values.push(machine.read_port(&channel.source.to_string())?);
        }
        if self.times.len() == self.capacity {
            self.times.pop_front();
            for channel in &mut self.channels {
                channel.samples.pop_front();
            }
        }
        self.times.push_back(machine.current_time());
        for (channel, value) in self.channels.iter_mut().zip(values) {
            channel.samples.push_back(value);
        }
        Ok(())
    }

    /// Step the machine `steps` times, sampling after each step
    pub fn run(&mut self, machine: &mut Machine, steps: u64) -> Result<(), ScopeError> {
        for _ in 0..steps {
            machine.step();
            self.sample(machine)?;
        }
        Ok(())
    }

    /// Drop all recorded samples, keeping the channel list
    pub fn clear(&mut self) {
        self.times.clear();
        for channel in &mut self.channels {
            channel.samples.clear();
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of samples currently held
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Index of the channel with `label`
    pub fn channel_index(&self, label: &str) -> Option<usize> {
        self.channels.iter().position(|c| c.label == label)
    }

    /// Sample times, oldest first
    pub fn times(&self) -> Vec<f64> {
        self.times.iter().copied().collect()
    }

    /// Samples of one channel, oldest first
    pub fn samples(&self, channel: usize) -> Result<Vec<f64>, ScopeError> {
        Ok(self.channel(channel)?.samples.iter().copied().collect())
    }

    /// The most recent `n` `(time, value)` pairs of a channel, oldest first
    pub fn last_n(&self, channel: usize, n: usize) -> Result<Vec<(f64, f64)>, ScopeError> {
        let samples = &self.channel(channel)?.samples;
        let skip = samples.len().saturating_sub(n);
        Ok(self
            .times
            .iter()
            .zip(samples)
            .skip(skip)
            .map(|(&t, &v)| (t, v))
            .collect())
    }

    /// Min, max, mean and final value of a channel; `None` if empty
    pub fn stats(&self, channel: usize) -> Result<Option<SignalStats>, ScopeError> {
        let samples = &self.channel(channel)?.samples;
        let Some(&final_value) = samples.back() else {
            return Ok(None);
        };
        let (min, max, sum) = samples.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY, 0.0),
            |(lo, hi, sum), &v| (lo.min(v), hi.max(v), sum + v),
        );
        Ok(Some(SignalStats {
            min,
            max,
            mean: sum / samples.len() as f64,
            final_value,
            count: samples.len(),
        }))
    }

    /// Whether a channel varied by at most `tolerance` over its last `window`
    /// samples; `None` if the channel is empty
    pub fn check_settled(
        &self,
        channel: usize,
        tolerance: f64,
        window: usize,
    ) -> Result<Option<Settlement>, ScopeError> {
        if tolerance.is_nan() || tolerance < 0.0 {
            return Err(ScopeError::InvalidArgument(format!(
                "tolerance must be >= 0, got {}",
                tolerance
            )));
        }
        if window == 0 {
            return Err(ScopeError::InvalidArgument("window must be at least 1".to_string()));
        }
        let recent = self.last_n(channel, window)?;
        let Some(&(_, final_value)) = recent.last() else {
            return Ok(None);
        };
        let (lo, hi) = recent
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(_, v)| {
                (lo.min(v), hi.max(v))
            });
        let variation = hi - lo;
        Ok(Some(Settlement {
            settled: variation <= tolerance,
            variation,
            final_value,
            window: recent.len(),
        }))
    }

    /// Save recorded data to a CSV file
    ///
    /// The header is `time [s]` followed by the channel labels.
    pub fn save(&self, filename: &str) -> io::Result<()> {
        let file = File::create(filename)?;
        self.save_to_writer(file)
    }

    /// Write recorded data as CSV to any writer
    pub fn save_to_writer<W: Write>(&self, writer: W) -> io::Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);

        let mut header = vec!["time [s]".to_string()];
        header.extend(self.channels.iter().map(|c| c.label.clone()));
        wtr.write_record(&header)?;

        for (row, time) in self.times.iter().enumerate() {
            let mut record = vec![time.to_string()];
            record.extend(self.channels.iter().map(|c| c.samples[row].to_string()));
            wtr.write_record(&record)?;
        }

        wtr.flush()?;
        Ok(())
    }

    fn channel(&self, index: usize) -> Result<&Channel, ScopeError> {
        self.channels
            .get(index)
            .ok_or(ScopeError::UnknownChannel(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::*;

    fn ramp_machine() -> Machine {
        let mut m = Machine::new(0.5).unwrap();
        m.add("C", Constant::new(1.0)).unwrap();
        m.add("INT", Integrator::default()).unwrap();
        m.connect("C.out", "INT.in").unwrap();
        m
    }

    #[test]
    fn test_ring_buffer_is_bounded() {
        let mut m = ramp_machine();
        let mut scope = Scope::new(3);
        scope.add_channel(&m, "INT.out", None).unwrap();
        scope.run(&mut m, 5).unwrap();

        assert_eq!(scope.len(), 3);
        assert_eq!(scope.times(), vec![1.5, 2.0, 2.5]);
        assert_eq!(scope.samples(0).unwrap(), vec![1.5, 2.0, 2.5]);
        assert_eq!(scope.channels()[0].label(), "INT.out");
    }

    #[test]
    fn test_stats_and_last_n() {
        let mut m = ramp_machine();
        let mut scope = Scope::default();
        scope.add_channel(&m, "INT.out", Some("x")).unwrap();
        scope.run(&mut m, 4).unwrap();

        let stats = scope.stats(0).unwrap().unwrap();
        assert_eq!(stats.min, 0.5);
        assert_eq!(stats.max, 2.0);
        assert_eq!(stats.mean, 1.25);
        assert_eq!(stats.final_value, 2.0);
        assert_eq!(stats.count, 4);

        assert_eq!(scope.last_n(0, 2).unwrap(), vec![(1.5, 1.5), (2.0, 2.0)]);
        assert_eq!(serde_json::to_value(stats).unwrap()["final_value"], 2.0);
        assert_eq!(scope.last_n(0, 10).unwrap().len(), 4);
        assert_eq!(scope.channel_index("x"), Some(0));
    }

    #[test]
    fn test_settled_check() {
        let mut m = Machine::new(0.1).unwrap();
        m.add("C", Constant::new(2.0)).unwrap();
        let mut scope = Scope::default();
        scope.add_channel(&m, "C.out", None).unwrap();
        assert_eq!(scope.check_settled(0, 0.01, 10).unwrap(), None);

        scope.run(&mut m, 20).unwrap();
        let s = scope.check_settled(0, 0.01, 10).unwrap().unwrap();
        assert!(s.settled);
        assert_eq!(s.variation, 0.0);
        assert_eq!(s.window, 10);

        let mut m = ramp_machine();
        let mut scope = Scope::default();
        scope.add_channel(&m, "INT.out", None).unwrap();
        scope.run(&mut m, 20).unwrap();
        assert!(!scope.check_settled(0, 0.01, 10).unwrap().unwrap().settled);
        assert!(scope.check_settled(0, -1.0, 10).is_err());
        assert!(scope.check_settled(0, 0.1, 0).is_err());
    }

    #[test]
    fn test_bad_channel() {
        let m = ramp_machine();
        let mut scope = Scope::default();
        assert!(matches!(
            scope.add_channel(&m, "NOPE.out", None),
            Err(ScopeError::Wiring(WiringError::UnknownComponent(_)))
        ));
        assert_eq!(scope.samples(0), Err(ScopeError::UnknownChannel(0)));
    }

    #[test]
    fn test_csv_to_writer() {
        let mut m = ramp_machine();
        let mut scope = Scope::default();
        scope.add_channel(&m, "C.out", Some("c")).unwrap();
        scope.add_channel(&m, "INT.out", Some("x")).unwrap();
        scope.run(&mut m, 2).unwrap();

        let mut buffer = Vec::new();
        scope.save_to_writer(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, ["time [s],c,x", "0.5,1,0.5", "1,1,1"]);
    }
}

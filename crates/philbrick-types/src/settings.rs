//! Machine settings types.

use serde::{Deserialize, Serialize};

/// Default integration timestep in seconds
pub const DEFAULT_DT: f64 = 0.001;

/// Settings that configure a machine before any component is added
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineSettings {
    /// Fixed time step
    pub dt: f64,
}

impl Default for MachineSettings {
    fn default() -> Self {
        Self { dt: DEFAULT_DT }
    }
}

impl MachineSettings {
    pub fn with_dt(dt: f64) -> Self {
        Self { dt }
    }
}

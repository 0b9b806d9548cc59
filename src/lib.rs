//! Philbrick - signal-flow engine for a patch-programmable analog computer
//!
//! Components (integrators, summers, coefficient pots, multipliers,
//! comparators, function generators, ...) expose named scalar ports. A patch
//! bay wires outputs to inputs, and a [`Machine`] advances every component
//! in lockstep on a fixed time step.
//!
//! # Architecture
//!
//! - Closed set of primitives in [`ComponentKind`], statically dispatched
//! - Explicit [`Registry`] of kind factories and subcircuit templates, owned
//!   by each machine
//! - Subcircuits expand into namespaced primitives (`"S.EXP0"`) whose
//!   external ports alias internal ones
//! - Every patch carries the previous step's value, so feedback loops see one
//!   step of latency and no evaluation order needs computing
//!
//! # Example
//!
//! ```rust,ignore
//! use philbrick::prelude::*;
//!
//! let mut m = Machine::new(0.001)?;
//! m.add("C", Constant::new(2.0))?;
//! m.add("INT", Integrator::default())?;
//! m.connect("C.out", "INT.in")?;
//! m.run(1000);
//! assert!((m.read_port("INT.out")? - 2.0).abs() < 1e-9);
//! ```

pub mod circuit;
pub mod component;
pub mod component_kind;
pub mod components;
pub mod error;
pub mod machine;
pub mod params;
pub mod patchbay;
pub mod port;
pub mod registry;
pub mod scope;
pub mod subcircuit;

pub use component::Component;
pub use component_kind::ComponentKind;
pub use components::*;
pub use error::{
    ConfigurationError, EngineStateError, Error, Result, TemplateError, WiringError,
};
pub use machine::{ComponentId, ComponentInfo, ConnectionInfo, InstanceInfo, Machine};
pub use params::{Configurable, Params, MAX_PORTS};
pub use port::{PortDirection, PortNames, PortRef};
pub use registry::Registry;
pub use scope::{Scope, ScopeError, Settlement, SignalStats};
pub use subcircuit::SubcircuitTemplate;

pub use philbrick_types::{
    ChannelDef, CircuitDef, ComponentDef, MachineSettings, PatchDef, ScopeDef, SubcircuitDef,
    DEFAULT_DT,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::component::Component;
    pub use crate::components::*;
    pub use crate::error::{Error, Result};
    pub use crate::machine::Machine;
    pub use crate::params::Configurable;
    pub use crate::registry::Registry;
    pub use crate::scope::Scope;
    pub use philbrick_types::{CircuitDef, ComponentDef, SubcircuitDef};
}

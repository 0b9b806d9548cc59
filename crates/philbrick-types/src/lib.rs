//! Shared types for Philbrick circuit definitions.
//!
//! This crate defines the serializable data model exchanged with the engine:
//! - Component declarations and their parameters
//! - Patches between ports
//! - Subcircuit templates with their port maps
//! - Scope channel lists and machine settings

mod circuit;
mod port;
mod settings;
mod subcircuit;

pub use circuit::*;
pub use port::*;
pub use settings::*;
pub use subcircuit::*;

use std::collections::BTreeMap;

/// Parameter values of a single component, keyed by parameter name
pub type Params = BTreeMap<String, serde_json::Value>;

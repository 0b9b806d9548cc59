//! Circuit definition document.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{MachineSettings, Params, PatchDef, SubcircuitDef};

/// A component declaration: a name, a kind (primitive or template) and params
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDef {
    /// Unique name within the enclosing circuit or template
    pub name: String,

    /// Component kind, e.g. "Integrator" or a template name such as "Softmax"
    #[serde(rename = "type")]
    pub kind: String,

    /// Parameter values
    #[serde(default, skip_serializing_if = "Params::is_empty")]
    pub params: Params,
}

impl ComponentDef {
    /// Create a declaration with no params
    pub fn new(name: &str, kind: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: kind.to_string(),
            params: Params::new(),
        }
    }

    /// Builder: set a parameter
    pub fn with_param(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    /// Get a parameter value
    pub fn get_param(&self, key: &str) -> Option<&serde_json::Value> {
        self.params.get(key)
    }
}

/// One recorded scope channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelDef {
    /// Port reference to record
    pub source: String,

    /// Legend label; defaults to the source reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Scope configuration attached to a circuit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeDef {
    pub channels: Vec<ChannelDef>,
}

/// Complete circuit document for saving/loading patch programs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitDef {
    /// File format version
    #[serde(default = "default_version")]
    pub version: String,

    /// Circuit name
    pub name: String,

    /// Description
    #[serde(default)]
    pub description: String,

    /// Machine settings
    #[serde(default)]
    pub settings: MachineSettings,

    /// Subcircuit templates local to this circuit, keyed by template name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub subcircuits: BTreeMap<String, SubcircuitDef>,

    /// Components in execution order
    #[serde(default)]
    pub components: Vec<ComponentDef>,

    /// Patch list
    #[serde(default)]
    pub patches: Vec<PatchDef>,

    /// Optional scope configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<ScopeDef>,
}

fn default_version() -> String {
    CircuitDef::VERSION.to_string()
}

impl CircuitDef {
    /// Current file format version
    pub const VERSION: &'static str = "1.0.0";

    /// Create an empty circuit
    pub fn new(name: &str) -> Self {
        Self {
            version: Self::VERSION.to_string(),
            name: name.to_string(),
            description: String::new(),
            settings: MachineSettings::default(),
            subcircuits: BTreeMap::new(),
            components: Vec::new(),
            patches: Vec::new(),
            scope: None,
        }
    }

    /// Load from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

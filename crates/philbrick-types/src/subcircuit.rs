//! Subcircuit template types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{ComponentDef, PatchDef};

/// A reusable template that expands into namespaced primitives.
///
/// `input_map` and `output_map` bind every external port name listed in
/// `inputs`/`outputs` to an internal `component.port` reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubcircuitDef {
    /// Template name, used as the component type when instantiating
    pub name: String,

    /// Human readable description
    #[serde(default)]
    pub description: String,

    /// External input port names, in order
    #[serde(default)]
    pub inputs: Vec<String>,

    /// External output port names, in order
    #[serde(default)]
    pub outputs: Vec<String>,

    /// Internal components
    #[serde(default)]
    pub components: Vec<ComponentDef>,

    /// Internal patches, using local component names
    #[serde(default)]
    pub patches: Vec<PatchDef>,

    /// External input name -> internal input reference
    #[serde(default)]
    pub input_map: BTreeMap<String, String>,

    /// External output name -> internal output reference
    #[serde(default)]
    pub output_map: BTreeMap<String, String>,
}

impl SubcircuitDef {
    /// Create an empty template
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Builder: set the description
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Builder: add an internal component
    pub fn component(mut self, component: ComponentDef) -> Self {
        self.components.push(component);
        self
    }

    /// Builder: add an internal patch
    pub fn patch(mut self, source: &str, dest: &str) -> Self {
        self.patches.push(PatchDef::new(source, dest));
        self
    }

    /// Builder: expose an internal input as an external input
    pub fn input(mut self, external: &str, internal: &str) -> Self {
        self.inputs.push(external.to_string());
        self.input_map
            .insert(external.to_string(), internal.to_string());
        self
    }

    /// Builder: expose an internal output as an external output
    pub fn output(mut self, external: &str, internal: &str) -> Self {
        self.outputs.push(external.to_string());
        self.output_map
            .insert(external.to_string(), internal.to_string());
        self
    }
}

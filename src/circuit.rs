//! Building machines from circuit definitions and exporting them back.
//!
//! Export is best-effort but complete enough to replay: every primitive is
//! written with its full parameter set, each top-level subcircuit instance is
//! written as a single component of its template's kind, and the templates
//! themselves travel along in `subcircuits`.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use log::{debug, info};
use philbrick_types::{CircuitDef, ComponentDef, PatchDef, SubcircuitDef};

use crate::error::{ConfigurationError, Result, TemplateError};
use crate::machine::Machine;
use crate::patchbay::PortAddr;
use crate::port::PortDirection;
use crate::registry::Registry;

impl Machine {
    /// Build a machine from a circuit definition using the standard registry
    pub fn from_circuit(def: &CircuitDef) -> Result<Self> {
        Self::from_circuit_with_registry(def, Registry::standard())
    }

    /// Build a machine from a circuit definition.
    ///
    /// Templates are registered first, in dependency order; then components
    /// are added in document order and patches replayed. The first error
    /// aborts the load.
    pub fn from_circuit_with_registry(def: &CircuitDef, registry: Registry) -> Result<Self> {
        let mut machine = Machine::with_registry(def.settings.dt, registry)?;
        register_templates(machine.registry_mut(), &def.subcircuits)?;

        for component in &def.components {
            if machine.registry().is_template(&component.kind) {
                if let Some(param) = component.params.keys().next() {
                    return Err(ConfigurationError::UnknownParam {
                        kind: component.kind.clone(),
                        param: param.clone(),
                    }
                    .into());
                }
                machine.instantiate(&component.kind, &component.name)?;
            } else {
                machine.add_component(&component.kind, &component.name, &component.params)?;
            }
        }
        for patch in &def.patches {
            machine.connect(&patch.source, &patch.dest)?;
        }

        info!(
            "loaded circuit '{}': {} components, {} patches, dt = {}",
            def.name,
            machine.len(),
            def.patches.len(),
            machine.dt()
        );
        Ok(machine)
    }

    /// Export the current graph as a circuit definition
    pub fn to_circuit(&self, name: &str) -> CircuitDef {
        let mut def = CircuitDef::new(name);
        def.settings.dt = self.dt();

        let mut emitted: HashSet<&str> = HashSet::new();
        let mut templates: BTreeSet<String> = BTreeSet::new();
        for slot in self.live() {
            match slot.instance.as_deref() {
                None => def.components.push(ComponentDef {
                    name: slot.name.clone(),
                    kind: slot.component.kind_name().to_string(),
                    params: slot.component.params(),
                }),
                Some(instance) => {
                    let top = self.top_level(instance);
                    if emitted.insert(top) {
                        if let Some(record) = self.instance_record(top) {
                            def.components.push(ComponentDef::new(top, &record.template));
                            templates.insert(record.template.clone());
                        }
                    }
                }
            }
        }

        for conn in self.patchbay().iter().filter(|c| c.owner.is_none()) {
            def.patches.push(PatchDef::new(
                self.export_ref(conn.source, PortDirection::Output),
                self.export_ref(conn.dest, PortDirection::Input),
            ));
        }

        def.subcircuits = self.collect_templates(templates);
        debug!(
            "exported '{}': {} components, {} patches, {} templates",
            name,
            def.components.len(),
            def.patches.len(),
            def.subcircuits.len()
        );
        def
    }

    /// Reference text for a port as seen from the top level
    fn export_ref(&self, addr: PortAddr, direction: PortDirection) -> String {
        let instance = self.slot(addr.slot).and_then(|s| s.instance.as_deref());
        if let Some(top) = instance.map(|i| self.top_level(i)) {
            if let Some(record) = self.instance_record(top) {
                let ports = match direction {
                    PortDirection::Input => &record.inputs,
                    PortDirection::Output => &record.outputs,
                };
                if let Some((port, _)) = ports.iter().find(|(_, a)| *a == addr) {
                    return format!("{}.{}", top, port);
                }
            }
        }
        self.describe(addr, direction)
    }

    /// Template definitions for `used`, plus every template they nest
    fn collect_templates(&self, used: BTreeSet<String>) -> BTreeMap<String, SubcircuitDef> {
        let mut out = BTreeMap::new();
        let mut pending: Vec<String> = used.into_iter().collect();
        while let Some(name) = pending.pop() {
            if out.contains_key(&name) {
                continue;
            }
            if let Some(template) = self.registry().template(&name) {
                for c in &template.def().components {
                    if self.registry().is_template(&c.kind) {
                        pending.push(c.kind.clone());
                    }
                }
                out.insert(name, template.def().clone());
            }
        }
        out
    }
}

/// Register document templates, resolving references between them.
///
/// A template identical to one already registered is skipped, so exported
/// documents that carry built-in templates load cleanly.
fn register_templates(
    registry: &mut Registry,
    templates: &BTreeMap<String, SubcircuitDef>,
) -> std::result::Result<(), TemplateError> {
    let mut pending: Vec<SubcircuitDef> = templates
        .iter()
        .map(|(key, def)| {
            let mut def = def.clone();
            if def.name.is_empty() {
                def.name = key.clone();
            }
            def
        })
        .collect();

    while !pending.is_empty() {
        let names: Vec<String> = pending.iter().map(|d| d.name.clone()).collect();
        let mut blocked = Vec::new();
        for def in pending {
            if registry.template(&def.name).map(|t| t.def()) == Some(&def) {
                continue;
            }
            match registry.register_template(def.clone()) {
                Ok(()) => {}
                Err(TemplateError::UnknownKind { kind, .. }) if names.contains(&kind) => {
                    blocked.push(def)
                }
                Err(e) => return Err(e),
            }
        }
        if blocked.len() == names.len() {
            // every remaining template waits on another one: a cycle
            return Err(TemplateError::Recursive(blocked[0].name.clone()));
        }
        pending = blocked;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::*;
    use crate::error::Error;

    #[test]
    fn test_load_minimal() {
        let json = r#"{
            "name": "ramp",
            "settings": {"dt": 0.5},
            "components": [
                {"name": "C", "type": "Constant", "params": {"value": 2.0}},
                {"name": "INT", "type": "Integrator"}
            ],
            "patches": [["C.out", "INT.in"]]
        }"#;
        let def = CircuitDef::from_json(json).unwrap();
        let mut m = Machine::from_circuit(&def).unwrap();
        assert_eq!(m.dt(), 0.5);
        m.run(4);
        assert_eq!(m.read_port("INT.out").unwrap(), 4.0);
    }

    #[test]
    fn test_load_stops_at_first_error() {
        let mut def = CircuitDef::new("bad");
        def.components.push(ComponentDef::new("C", "Constant"));
        def.patches.push(PatchDef::new("C.out", "MISSING.in"));
        let err = Machine::from_circuit(&def).unwrap_err();
        assert!(matches!(err, Error::Wiring(_)));
    }

    #[test]
    fn test_templates_in_any_order() {
        let mut def = CircuitDef::new("nested");
        def.subcircuits.insert(
            "A".to_string(),
            SubcircuitDef::new("A")
                .component(ComponentDef::new("INNER", "B"))
                .input("in", "INNER.in")
                .output("out", "INNER.out"),
        );
        def.subcircuits.insert(
            "B".to_string(),
            SubcircuitDef::new("B")
                .component(ComponentDef::new("K", "Coefficient").with_param("k", 3.0))
                .input("in", "K.in")
                .output("out", "K.out"),
        );
        def.components.push(ComponentDef::new("X", "A"));
        let m = Machine::from_circuit(&def).unwrap();
        assert!(m.component("X.INNER.K").is_some());
    }

    #[test]
    fn test_cyclic_templates_rejected() {
        let mut def = CircuitDef::new("cyclic");
        for (name, other) in [("A", "B"), ("B", "A")] {
            def.subcircuits.insert(
                name.to_string(),
                SubcircuitDef::new(name).component(ComponentDef::new("X", other)),
            );
        }
        let err = Machine::from_circuit(&def).unwrap_err();
        assert!(matches!(err, Error::Template(TemplateError::Recursive(_))));
    }

    #[test]
    fn test_export_instances_and_patches() {
        let mut m = Machine::default();
        m.add("X", Constant::new(0.5)).unwrap();
        m.instantiate("Softmax", "S").unwrap();
        m.add("K", Coefficient::new(2.0)).unwrap();
        m.connect("X.out", "S.in0").unwrap();
        m.connect("S.out0", "K.in").unwrap();

        let def = m.to_circuit("export");
        let kinds: Vec<_> = def.components.iter().map(|c| c.kind.as_str()).collect();
        assert_eq!(kinds, ["Constant", "Softmax", "Coefficient"]);
        assert_eq!(
            def.patches,
            vec![PatchDef::new("X.out", "S.in0"), PatchDef::new("S.out0", "K.in")]
        );
        assert!(def.subcircuits.contains_key("Softmax"));
        assert_eq!(def.components[2].params["k"], serde_json::json!(2.0));

        // built-in template in the document is accepted on reload
        let again = Machine::from_circuit(&def).unwrap();
        assert_eq!(again.len(), m.len());
        assert_eq!(again.connections().len(), m.connections().len());
    }
}

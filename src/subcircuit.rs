//! Subcircuit templates and their expansion
//!
//! A template is expanded exactly once, when it is instantiated: every
//! internal component becomes an ordinary machine component named
//! `<instance>.<local>`, internal patches become ordinary connections, and the
//! external ports become aliases for internal ports. Nothing about the
//! template survives into the step loop.
//!
//! Expansion is planned completely before anything touches the machine, so a
//! bad template or a name clash never leaves a half-built instance behind.

use std::collections::HashMap;

use philbrick_types::{ComponentDef, SubcircuitDef};

use crate::component::{find_port, Component};
use crate::component_kind::ComponentKind;
use crate::error::{ConfigurationError, TemplateError, WiringError};
use crate::port::{PortDirection, PortRef};
use crate::registry::Registry;

/// A validated subcircuit template
#[derive(Debug, Clone, PartialEq)]
pub struct SubcircuitTemplate {
    def: SubcircuitDef,
}

impl SubcircuitTemplate {
    /// Validate `def` against the kinds and templates known to `registry`.
    ///
    /// Performs a dry-run expansion, so every parameter, patch and port
    /// mapping is checked here rather than at instantiation time.
    pub fn validate(def: SubcircuitDef, registry: &Registry) -> Result<Self, TemplateError> {
        if let Err(reason) = check_name(&def.name) {
            return Err(TemplateError::InvalidComponent {
                template: def.name.clone(),
                component: def.name.clone(),
                source: ConfigurationError::InvalidName {
                    name: def.name.clone(),
                    reason,
                },
            });
        }
        let template = Self { def };
        let mut plan = ExpansionPlan::default();
        let mut stack = Vec::new();
        plan.expand(&template, template.name(), None, registry, &mut stack)?;
        Ok(template)
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }

    pub fn description(&self) -> &str {
        &self.def.description
    }

    /// External input port names
    pub fn inputs(&self) -> &[String] {
        &self.def.inputs
    }

    /// External output port names
    pub fn outputs(&self) -> &[String] {
        &self.def.outputs
    }

    /// The underlying definition
    pub fn def(&self) -> &SubcircuitDef {
        &self.def
    }
}

/// Reject empty names and names containing the namespace separator
pub(crate) fn check_name(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        Err("name is empty")
    } else if name.contains('.') {
        Err("'.' is reserved for subcircuit namespaces and port references")
    } else {
        Ok(())
    }
}

/// A port of a planned component: (index into `components`, port index)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Endpoint {
    pub component: usize,
    pub port: usize,
}

#[derive(Debug)]
pub(crate) struct PlannedComponent {
    pub name: String,
    pub component: ComponentKind,
    /// Index of the owning entry in `instances`
    pub instance: usize,
}

#[derive(Debug)]
pub(crate) struct PlannedInstance {
    pub name: String,
    pub template: String,
    pub parent: Option<usize>,
    pub inputs: Vec<(String, Endpoint)>,
    pub outputs: Vec<(String, Endpoint)>,
}

#[derive(Debug)]
pub(crate) struct PlannedPatch {
    pub source: Endpoint,
    pub dest: Endpoint,
    pub instance: usize,
}

/// Fully resolved expansion of one instance, including nested instances
#[derive(Debug, Default)]
pub(crate) struct ExpansionPlan {
    pub components: Vec<PlannedComponent>,
    pub instances: Vec<PlannedInstance>,
    pub patches: Vec<PlannedPatch>,
}

#[derive(Debug, Clone, Copy)]
enum Local {
    Primitive(usize),
    Nested(usize),
}

impl ExpansionPlan {
    /// Plan the expansion of `template` under the name `instance`
    pub fn build(
        registry: &Registry,
        template: &str,
        instance: &str,
    ) -> Result<Self, TemplateError> {
        let template = registry
            .template(template)
            .ok_or_else(|| TemplateError::UnknownTemplate(template.to_string()))?;
        let mut plan = Self::default();
        let mut stack = Vec::new();
        plan.expand(template, instance, None, registry, &mut stack)?;
        Ok(plan)
    }

    /// Every name the plan would add to the machine
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.instances
            .iter()
            .map(|i| i.name.as_str())
            .chain(self.components.iter().map(|c| c.name.as_str()))
    }

    fn expand(
        &mut self,
        template: &SubcircuitTemplate,
        instance: &str,
        parent: Option<usize>,
        registry: &Registry,
        stack: &mut Vec<String>,
    ) -> Result<usize, TemplateError> {
        let def = &template.def;
        let tname = def.name.as_str();
        if stack.iter().any(|t| t == tname) {
            return Err(TemplateError::Recursive(tname.to_string()));
        }
        stack.push(tname.to_string());

        let index = self.instances.len();
        self.instances.push(PlannedInstance {
            name: instance.to_string(),
            template: tname.to_string(),
            parent,
            inputs: Vec::new(),
            outputs: Vec::new(),
        });

        let mut locals: HashMap<&str, Local> = HashMap::new();
        for cdef in &def.components {
            if locals.contains_key(cdef.name.as_str()) {
                return Err(TemplateError::DuplicateComponent {
                    template: tname.to_string(),
                    component: cdef.name.clone(),
                });
            }
            let local = self.add_local(tname, cdef, instance, index, registry, stack)?;
            locals.insert(cdef.name.as_str(), local);
        }

        for patch in &def.patches {
            let source = self.resolve(tname, &locals, &patch.source, PortDirection::Output)?;
            let dest = self.resolve(tname, &locals, &patch.dest, PortDirection::Input)?;
            if self.patches.iter().any(|p| p.dest == dest) {
                return Err(TemplateError::InternalWiring {
                    template: tname.to_string(),
                    source: WiringError::FanIn {
                        dest: patch.dest.clone(),
                        existing: "another internal patch".to_string(),
                    },
                });
            }
            self.patches.push(PlannedPatch {
                source,
                dest,
                instance: index,
            });
        }

        let inputs = self.map_ports(tname, &locals, &def.inputs, &def.input_map, PortDirection::Input)?;
        for (port, endpoint) in &inputs {
            if self.patches.iter().any(|p| p.dest == *endpoint) {
                return Err(TemplateError::MappedInputDriven {
                    template: tname.to_string(),
                    port: port.clone(),
                    target: def.input_map.get(port).cloned().unwrap_or_default(),
                });
            }
        }
        let outputs =
            self.map_ports(tname, &locals, &def.outputs, &def.output_map, PortDirection::Output)?;
        self.instances[index].inputs = inputs;
        self.instances[index].outputs = outputs;

        stack.pop();
        Ok(index)
    }

    fn add_local(
        &mut self,
        tname: &str,
        cdef: &ComponentDef,
        instance: &str,
        index: usize,
        registry: &Registry,
        stack: &mut Vec<String>,
    ) -> Result<Local, TemplateError> {
        let invalid = |source| TemplateError::InvalidComponent {
            template: tname.to_string(),
            component: cdef.name.clone(),
            source,
        };
        check_name(&cdef.name).map_err(|reason| {
            invalid(ConfigurationError::InvalidName {
                name: cdef.name.clone(),
                reason,
            })
        })?;
        let full_name = format!("{}.{}", instance, cdef.name);

        if cdef.kind == tname {
            return Err(TemplateError::Recursive(tname.to_string()));
        }
        if let Some(nested) = registry.template(&cdef.kind) {
            if let Some(param) = cdef.params.keys().next() {
                return Err(invalid(ConfigurationError::UnknownParam {
                    kind: cdef.kind.clone(),
                    param: param.clone(),
                }));
            }
            let nested = self.expand(nested, &full_name, Some(index), registry, stack)?;
            return Ok(Local::Nested(nested));
        }

        let component = registry.create(&cdef.kind, &cdef.params).map_err(|e| match e {
            ConfigurationError::UnknownKind(kind) => TemplateError::UnknownKind {
                template: tname.to_string(),
                component: cdef.name.clone(),
                kind,
            },
            other => invalid(other),
        })?;
        self.components.push(PlannedComponent {
            name: full_name,
            component,
            instance: index,
        });
        Ok(Local::Primitive(self.components.len() - 1))
    }

    fn map_ports(
        &self,
        tname: &str,
        locals: &HashMap<&str, Local>,
        listed: &[String],
        map: &std::collections::BTreeMap<String, String>,
        direction: PortDirection,
    ) -> Result<Vec<(String, Endpoint)>, TemplateError> {
        if let Some(port) = map.keys().find(|k| !listed.contains(k)) {
            return Err(TemplateError::UnlistedMapping {
                template: tname.to_string(),
                port: port.clone(),
            });
        }
        listed
            .iter()
            .map(|port| {
                let target = map.get(port).ok_or_else(|| TemplateError::UnmappedPort {
                    template: tname.to_string(),
                    port: port.clone(),
                })?;
                let endpoint = self.resolve(tname, locals, target, direction)?;
                Ok((port.clone(), endpoint))
            })
            .collect()
    }

    fn resolve(
        &self,
        tname: &str,
        locals: &HashMap<&str, Local>,
        reference: &str,
        direction: PortDirection,
    ) -> Result<Endpoint, TemplateError> {
        self.resolve_local(locals, reference, direction)
            .map_err(|source| TemplateError::UnknownReference {
                template: tname.to_string(),
                reference: reference.to_string(),
                source,
            })
    }

    fn resolve_local(
        &self,
        locals: &HashMap<&str, Local>,
        reference: &str,
        direction: PortDirection,
    ) -> Result<Endpoint, WiringError> {
        let r = PortRef::parse(reference)?;
        match locals.get(r.component.as_str()) {
            None => Err(WiringError::UnknownComponent(r.component)),
            Some(Local::Primitive(i)) => {
                let port = find_port(&self.components[*i].component, &r.component, &r.port, direction)?;
                Ok(Endpoint {
                    component: *i,
                    port,
                })
            }
            Some(Local::Nested(j)) => {
                let inst = &self.instances[*j];
                let (wanted, other) = match direction {
                    PortDirection::Input => (&inst.inputs, &inst.outputs),
                    PortDirection::Output => (&inst.outputs, &inst.inputs),
                };
                if let Some((_, endpoint)) = wanted.iter().find(|(name, _)| *name == r.port) {
                    return Ok(*endpoint);
                }
                if other.iter().any(|(name, _)| *name == r.port) {
                    return Err(WiringError::DirectionMismatch {
                        port: reference.to_string(),
                        expected: direction,
                        actual: direction.opposite(),
                    });
                }
                Err(WiringError::UnknownPort {
                    component: r.component,
                    port: r.port,
                    direction,
                })
            }
        }
    }
}

/// Softmax over two inputs: out_i = exp(in_i) / (exp(in0) + exp(in1))
pub fn softmax() -> SubcircuitDef {
    SubcircuitDef::new("Softmax")
        .with_description("Two-way softmax built from Exp, Summer and Divider")
        .component(ComponentDef::new("EXP0", "Exp"))
        .component(ComponentDef::new("EXP1", "Exp"))
        .component(ComponentDef::new("SUM", "Summer").with_param("weights", vec![1.0, 1.0]))
        .component(ComponentDef::new("DIV0", "Divider"))
        .component(ComponentDef::new("DIV1", "Divider"))
        .patch("EXP0.out", "SUM.in0")
        .patch("EXP1.out", "SUM.in1")
        .patch("EXP0.out", "DIV0.num")
        .patch("EXP1.out", "DIV1.num")
        .patch("SUM.out", "DIV0.den")
        .patch("SUM.out", "DIV1.den")
        .input("in0", "EXP0.in")
        .input("in1", "EXP1.in")
        .output("out0", "DIV0.out")
        .output("out1", "DIV1.out")
}

/// Single attention head on 2-vectors: out = (q · k) * v
pub fn attention_head() -> SubcircuitDef {
    SubcircuitDef::new("AttentionHead")
        .with_description("Scaled dot-product score applied to a value signal")
        .component(ComponentDef::new("DOT", "DotProduct").with_param("size", 2))
        .component(ComponentDef::new("WEIGHT", "Coefficient").with_param("k", 1.0))
        .component(ComponentDef::new("MUL", "Multiplier"))
        .patch("DOT.out", "WEIGHT.in")
        .patch("WEIGHT.out", "MUL.x")
        .input("q0", "DOT.a0")
        .input("q1", "DOT.a1")
        .input("k0", "DOT.b0")
        .input("k1", "DOT.b1")
        .input("v", "MUL.y")
        .output("out", "MUL.out")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gain_template() -> SubcircuitDef {
        SubcircuitDef::new("Gain")
            .component(ComponentDef::new("K", "Coefficient").with_param("k", 2.0))
            .input("in", "K.in")
            .output("out", "K.out")
    }

    #[test]
    fn test_builtins_validate() {
        let registry = Registry::new();
        let softmax = SubcircuitTemplate::validate(softmax(), &registry).unwrap();
        assert_eq!(softmax.inputs(), ["in0", "in1"]);
        assert_eq!(softmax.outputs(), ["out0", "out1"]);
        SubcircuitTemplate::validate(attention_head(), &registry).unwrap();
    }

    #[test]
    fn test_plan_prefixes_names() {
        let mut registry = Registry::new();
        registry.register_template(softmax()).unwrap();
        let plan = ExpansionPlan::build(&registry, "Softmax", "S1").unwrap();
        let names: Vec<_> = plan.components.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["S1.EXP0", "S1.EXP1", "S1.SUM", "S1.DIV0", "S1.DIV1"]);
        assert_eq!(plan.patches.len(), 6);
        assert_eq!(plan.instances.len(), 1);
        assert_eq!(plan.instances[0].inputs.len(), 2);
    }

    #[test]
    fn test_unknown_mapping_target() {
        let def = gain_template().input("extra", "NOPE.in");
        let err = SubcircuitTemplate::validate(def, &Registry::new()).unwrap_err();
        assert!(matches!(err, TemplateError::UnknownReference { .. }));
    }

    #[test]
    fn test_mapping_with_wrong_direction() {
        let mut def = gain_template();
        def.output_map.insert("out".to_string(), "K.in".to_string());
        let err = SubcircuitTemplate::validate(def, &Registry::new()).unwrap_err();
        match err {
            TemplateError::UnknownReference { source, .. } => {
                assert!(matches!(source, WiringError::DirectionMismatch { .. }))
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_unmapped_and_unlisted_ports() {
        let mut def = gain_template();
        def.inputs.push("aux".to_string());
        let err = SubcircuitTemplate::validate(def, &Registry::new()).unwrap_err();
        assert!(matches!(err, TemplateError::UnmappedPort { .. }));

        let mut def = gain_template();
        def.input_map.insert("ghost".to_string(), "K.in".to_string());
        let err = SubcircuitTemplate::validate(def, &Registry::new()).unwrap_err();
        assert!(matches!(err, TemplateError::UnlistedMapping { .. }));
    }

    #[test]
    fn test_mapped_input_already_driven() {
        let def = gain_template()
            .component(ComponentDef::new("C", "Constant"))
            .patch("C.out", "K.in");
        let err = SubcircuitTemplate::validate(def, &Registry::new()).unwrap_err();
        assert!(matches!(err, TemplateError::MappedInputDriven { .. }));
    }

    #[test]
    fn test_internal_fan_in() {
        let def = SubcircuitDef::new("Bad")
            .component(ComponentDef::new("A", "Constant"))
            .component(ComponentDef::new("B", "Constant"))
            .component(ComponentDef::new("K", "Coefficient"))
            .patch("A.out", "K.in")
            .patch("B.out", "K.in")
            .output("out", "K.out");
        let err = SubcircuitTemplate::validate(def, &Registry::new()).unwrap_err();
        assert!(matches!(err, TemplateError::InternalWiring { .. }));
    }

    #[test]
    fn test_bad_params_and_kinds() {
        let def = SubcircuitDef::new("Bad")
            .component(ComponentDef::new("L", "Limiter").with_param("min_val", 2.0));
        let err = SubcircuitTemplate::validate(def, &Registry::new()).unwrap_err();
        assert!(matches!(err, TemplateError::InvalidComponent { .. }));

        let def = SubcircuitDef::new("Bad").component(ComponentDef::new("Q", "Flux"));
        let err = SubcircuitTemplate::validate(def, &Registry::new()).unwrap_err();
        assert!(matches!(err, TemplateError::UnknownKind { .. }));

        let def = SubcircuitDef::new("Bad")
            .component(ComponentDef::new("A", "Constant"))
            .component(ComponentDef::new("A", "Constant"));
        let err = SubcircuitTemplate::validate(def, &Registry::new()).unwrap_err();
        assert!(matches!(err, TemplateError::DuplicateComponent { .. }));
    }

    #[test]
    fn test_self_reference_is_recursive() {
        let def = gain_template().component(ComponentDef::new("INNER", "Gain"));
        let err = SubcircuitTemplate::validate(def, &Registry::new()).unwrap_err();
        assert_eq!(err, TemplateError::Recursive("Gain".to_string()));
    }

    #[test]
    fn test_nested_template_ports() {
        let mut registry = Registry::new();
        registry.register_template(gain_template()).unwrap();
        let def = SubcircuitDef::new("Gain4")
            .component(ComponentDef::new("G1", "Gain"))
            .component(ComponentDef::new("G2", "Gain"))
            .patch("G1.out", "G2.in")
            .input("in", "G1.in")
            .output("out", "G2.out");
        registry.register_template(def).unwrap();

        let plan = ExpansionPlan::build(&registry, "Gain4", "X").unwrap();
        let names: Vec<_> = plan.names().collect();
        assert_eq!(names, ["X", "X.G1", "X.G2", "X.G1.K", "X.G2.K"]);
        assert_eq!(plan.instances[1].parent, Some(0));
        assert_eq!(plan.patches.len(), 1);
        assert_eq!(plan.instances[0].inputs[0].1, Endpoint { component: 0, port: 0 });
        assert_eq!(plan.instances[0].outputs[0].1, Endpoint { component: 1, port: 0 });
    }
}

//! The execution engine.
//!
//! # Step semantics
//!
//! One call to [`Machine::step`] does exactly this:
//!
//! 1. **Propagate**: every connection copies its source output into its
//!    destination input. The values copied are the outputs left by the
//!    *previous* step (or the reset values on the first step).
//! 2. **Update**: every component's `update(t, dt)` runs once, in insertion
//!    order, with `t` the clock value at the end of this step.
//! 3. **Advance**: the step counter increments; `current_time()` is
//!    `steps * dt`.
//!
//! There is no per-step topological sort. Every feedback loop therefore sees
//! exactly one step of latency, much like the finite propagation delay of the
//! hardware, and algebraic loops are never ill-posed. A purely combinational
//! chain of `n` components settles after `n` steps. With an integrator in
//! every feedback path the lag is O(dt) and vanishes as dt shrinks.
//!
//! # Example
//!
//! ```ignore
//! use philbrick::prelude::*;
//!
//! // x'' = -x: sin/cos quadrature oscillator
//! let mut m = Machine::new(0.001)?;
//! m.add("INT1", Integrator::new(0.0, 1.0))?;
//! m.add("INT2", Integrator::new(1.0, 1.0))?;
//! m.add("COEF", Coefficient::new(-1.0))?;
//! m.connect("INT2.out", "INT1.in")?;
//! m.connect("COEF.out", "INT2.in")?;
//! m.connect("INT1.out", "COEF.in")?;
//! m.run(1000);
//! let x = m.read_port("INT1.out")?; // ≈ sin(1.0)
//! ```

use std::collections::{BTreeMap, HashMap};

use log::{debug, info, trace};
use philbrick_types::{MachineSettings, DEFAULT_DT};
use serde::Serialize;

use crate::component::{find_port, Component};
use crate::component_kind::ComponentKind;
use crate::error::{ConfigurationError, Error, TemplateError, WiringError};
use crate::params::Params;
use crate::patchbay::{PatchBay, PortAddr};
use crate::port::{PortDirection, PortRef};
use crate::registry::Registry;
use crate::subcircuit::{check_name, ExpansionPlan};

/// Stable handle to a component; never reused after removal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentId(pub(crate) usize);

/// Arena entry for one live component
#[derive(Debug, Clone)]
pub(crate) struct Slot {
    pub name: String,
    pub component: ComponentKind,
    /// Innermost subcircuit instance this component was expanded from
    pub instance: Option<String>,
}

/// An expanded subcircuit instance
#[derive(Debug, Clone)]
pub(crate) struct InstanceRecord {
    pub template: String,
    pub parent: Option<String>,
    pub inputs: Vec<(String, PortAddr)>,
    pub outputs: Vec<(String, PortAddr)>,
}

/// Read-only description of a component
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentInfo {
    pub name: String,
    pub kind: &'static str,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub params: Params,
    /// Innermost subcircuit instance, if expanded from a template
    pub instance: Option<String>,
}

/// Read-only description of a connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionInfo {
    pub source: String,
    pub dest: String,
    /// Instance whose template created this connection
    pub owner: Option<String>,
}

/// Read-only description of a subcircuit instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceInfo {
    pub name: String,
    pub template: String,
    pub parent: Option<String>,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

/// Fixed-step signal-flow engine
#[derive(Debug, Clone)]
pub struct Machine {
    dt: f64,
    steps: u64,
    slots: Vec<Option<Slot>>,
    /// Live slots in insertion order; this is the execution order
    order: Vec<usize>,
    names: HashMap<String, usize>,
    instances: BTreeMap<String, InstanceRecord>,
    patchbay: PatchBay,
    registry: Registry,
}

impl Default for Machine {
    fn default() -> Self {
        Self::build(DEFAULT_DT, Registry::standard())
    }
}

impl Machine {
    /// Create an empty machine with the standard registry
    pub fn new(dt: f64) -> Result<Self, ConfigurationError> {
        Self::with_registry(dt, Registry::standard())
    }

    /// Create an empty machine that resolves kinds through `registry`
    pub fn with_registry(dt: f64, registry: Registry) -> Result<Self, ConfigurationError> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(ConfigurationError::InvalidTimestep(dt));
        }
        Ok(Self::build(dt, registry))
    }

    /// Create an empty machine from settings
    pub fn with_settings(settings: &MachineSettings) -> Result<Self, ConfigurationError> {
        Self::new(settings.dt)
    }

    fn build(dt: f64, registry: Registry) -> Self {
        Self {
            dt,
            steps: 0,
            slots: Vec::new(),
            order: Vec::new(),
            names: HashMap::new(),
            instances: BTreeMap::new(),
            patchbay: PatchBay::new(),
            registry,
        }
    }

    // ---- registry -------------------------------------------------------

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Mutable access for registering custom kinds
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Validate and register a subcircuit template
    pub fn register_template(
        &mut self,
        def: philbrick_types::SubcircuitDef,
    ) -> Result<(), TemplateError> {
        self.registry.register_template(def)
    }

    // ---- building -------------------------------------------------------

    /// Build a component of a registered kind and append it to the graph
    pub fn add_component(
        &mut self,
        kind: &str,
        name: &str,
        params: &Params,
    ) -> Result<ComponentId, ConfigurationError> {
        self.check_new_name(name)?;
        let component = self.registry.create(kind, params)?;
        Ok(self.insert(name.to_string(), component, None))
    }

    /// Append an already constructed component
    pub fn add(
        &mut self,
        name: &str,
        component: impl Into<ComponentKind>,
    ) -> Result<ComponentId, ConfigurationError> {
        self.check_new_name(name)?;
        Ok(self.insert(name.to_string(), component.into(), None))
    }

    fn check_new_name(&self, name: &str) -> Result<(), ConfigurationError> {
        check_name(name).map_err(|reason| ConfigurationError::InvalidName {
            name: name.to_string(),
            reason,
        })?;
        if self.is_name_taken(name) {
            return Err(ConfigurationError::DuplicateName(name.to_string()));
        }
        Ok(())
    }

    fn is_name_taken(&self, name: &str) -> bool {
        self.names.contains_key(name) || self.instances.contains_key(name)
    }

    fn insert(&mut self, name: String, mut component: ComponentKind, instance: Option<String>) -> ComponentId {
        component.reset();
        let slot = self.slots.len();
        debug!("add {} '{}' (slot {})", component.kind_name(), name, slot);
        self.names.insert(name.clone(), slot);
        self.slots.push(Some(Slot {
            name,
            component,
            instance,
        }));
        self.order.push(slot);
        ComponentId(slot)
    }

    /// Remove a component, or a whole subcircuit instance, and every
    /// connection touching it
    pub fn remove(&mut self, name: &str) -> Result<(), WiringError> {
        if let Some(record) = self.instances.get(name) {
            if let Some(parent) = &record.parent {
                return Err(WiringError::InternalComponent {
                    component: name.to_string(),
                    instance: self.top_level(parent).to_string(),
                });
            }
            self.remove_instance(name);
            return Ok(());
        }

        let slot = *self
            .names
            .get(name)
            .ok_or_else(|| WiringError::UnknownComponent(name.to_string()))?;
        if let Some(instance) = self.slot(slot).and_then(|s| s.instance.as_deref()) {
            return Err(WiringError::InternalComponent {
                component: name.to_string(),
                instance: self.top_level(instance).to_string(),
            });
        }
        self.remove_slot(slot);
        debug!("removed '{}'", name);
        Ok(())
    }

    fn remove_instance(&mut self, name: &str) {
        let nested_prefix = format!("{}.", name);
        let doomed: Vec<String> = self
            .instances
            .keys()
            .filter(|k| *k == name || k.starts_with(&nested_prefix))
            .cloned()
            .collect();
        let members: Vec<usize> = self
            .order
            .iter()
            .copied()
            .filter(|&i| {
                self.slot(i)
                    .and_then(|s| s.instance.as_ref())
                    .is_some_and(|inst| doomed.contains(inst))
            })
            .collect();
        for slot in &members {
            self.remove_slot(*slot);
        }
        for key in &doomed {
            self.instances.remove(key);
        }
        debug!("removed instance '{}' ({} components)", name, members.len());
    }

    fn remove_slot(&mut self, slot: usize) {
        if let Some(entry) = self.slots[slot].take() {
            self.names.remove(&entry.name);
        }
        self.order.retain(|&i| i != slot);
        self.patchbay.remove_slot(slot);
    }

    /// Connect an output to an input
    pub fn connect(&mut self, source: &str, dest: &str) -> Result<(), WiringError> {
        let src = self.resolve(source, PortDirection::Output)?;
        let dst = self.resolve(dest, PortDirection::Input)?;
        self.patchbay
            .connect(src, dst, None)
            .map_err(|existing| WiringError::FanIn {
                dest: dest.to_string(),
                existing: self.describe(existing, PortDirection::Output),
            })?;
        debug!("connect {} -> {}", source, dest);
        Ok(())
    }

    /// Remove a single connection
    pub fn disconnect(&mut self, source: &str, dest: &str) -> Result<(), WiringError> {
        let src = self.resolve(source, PortDirection::Output)?;
        let dst = self.resolve(dest, PortDirection::Input)?;
        if !self.patchbay.disconnect(src, dst) {
            return Err(WiringError::NotConnected {
                source_port: source.to_string(),
                dest: dest.to_string(),
            });
        }
        debug!("disconnect {} -> {}", source, dest);
        Ok(())
    }

    /// Remove every connection, including subcircuit-internal ones.
    ///
    /// Component state and instance port maps are untouched.
    pub fn disconnect_all(&mut self) {
        debug!("disconnect all ({} connections)", self.patchbay.len());
        self.patchbay.disconnect_all();
    }

    /// Expand the template `template` as a new instance named `instance`.
    ///
    /// Either the whole expansion is added or, on error, nothing is.
    pub fn instantiate(&mut self, template: &str, instance: &str) -> Result<(), Error> {
        check_name(instance).map_err(|reason| ConfigurationError::InvalidName {
            name: instance.to_string(),
            reason,
        })?;
        let plan = ExpansionPlan::build(&self.registry, template, instance)?;
        if let Some(taken) = plan.names().find(|n| self.is_name_taken(n)) {
            return Err(TemplateError::NameTaken(taken.to_string()).into());
        }
        self.commit(plan);
        debug!("instantiated {} as '{}'", template, instance);
        Ok(())
    }

    fn commit(&mut self, plan: ExpansionPlan) {
        let ExpansionPlan {
            components,
            instances,
            patches,
        } = plan;
        let instance_names: Vec<String> = instances.iter().map(|i| i.name.clone()).collect();

        let slots: Vec<usize> = components
            .into_iter()
            .map(|pc| {
                let owner = instance_names[pc.instance].clone();
                self.insert(pc.name, pc.component, Some(owner)).0
            })
            .collect();
        let addr = |e: crate::subcircuit::Endpoint| PortAddr::new(slots[e.component], e.port);

        for patch in patches {
            let owner = Some(instance_names[patch.instance].clone());
            // fresh slots: no existing driver is possible
            let wired = self
                .patchbay
                .connect(addr(patch.source), addr(patch.dest), owner);
            debug_assert!(wired.is_ok(), "template patch rejected: {:?}", wired);
        }
        for inst in instances {
            let record = InstanceRecord {
                template: inst.template,
                parent: inst.parent.map(|p| instance_names[p].clone()),
                inputs: inst.inputs.into_iter().map(|(n, e)| (n, addr(e))).collect(),
                outputs: inst.outputs.into_iter().map(|(n, e)| (n, addr(e))).collect(),
            };
            self.instances.insert(inst.name, record);
        }
    }

    // ---- running --------------------------------------------------------

    /// Advance the clock by one step
    pub fn step(&mut self) {
        self.patchbay.propagate(&mut self.slots);
        let t = (self.steps + 1) as f64 * self.dt;
        for &i in &self.order {
            if let Some(slot) = &mut self.slots[i] {
                slot.component.update(t, self.dt);
            }
        }
        self.steps += 1;
    }

    /// Advance the clock by `n` steps
    pub fn run(&mut self, n: u64) {
        for _ in 0..n {
            self.step();
        }
        trace!("ran {} steps, t = {}", n, self.current_time());
    }

    /// Advance up to `n` steps, asking `keep_going` before each one.
    ///
    /// Returns the number of steps actually taken. Steps are never partially
    /// applied.
    pub fn run_while<F>(&mut self, n: u64, mut keep_going: F) -> u64
    where
        F: FnMut(&Machine) -> bool,
    {
        let mut done = 0;
        while done < n && keep_going(self) {
            self.step();
            done += 1;
        }
        trace!("ran {} of {} steps, t = {}", done, n, self.current_time());
        done
    }

    /// Rewind the clock to zero and reset every component; wiring is kept
    pub fn reset(&mut self) {
        self.steps = 0;
        for &i in &self.order {
            if let Some(slot) = &mut self.slots[i] {
                slot.component.reset();
            }
        }
        info!("reset {} components", self.order.len());
    }

    /// Elapsed simulated time, exactly `steps * dt`
    pub fn current_time(&self) -> f64 {
        self.steps as f64 * self.dt
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Steps taken since construction or the last reset
    pub fn steps(&self) -> u64 {
        self.steps
    }

    // ---- inspection -----------------------------------------------------

    /// Read a port value: outputs first, then inputs.
    ///
    /// Subcircuit external ports and internal component ports are both
    /// readable.
    pub fn read_port(&self, port: &str) -> Result<f64, WiringError> {
        let r = PortRef::parse(port)?;
        if let Some(inst) = self.instances.get(&r.component) {
            if let Some((_, addr)) = inst.outputs.iter().find(|(n, _)| *n == r.port) {
                return Ok(self.output_value(*addr));
            }
            if let Some((_, addr)) = inst.inputs.iter().find(|(n, _)| *n == r.port) {
                return Ok(self.input_value(*addr));
            }
            return Err(WiringError::UnknownPort {
                component: r.component,
                port: r.port,
                direction: PortDirection::Output,
            });
        }
        let component = self
            .component(&r.component)
            .ok_or_else(|| WiringError::UnknownComponent(r.component.clone()))?;
        if let Some(i) = component.output_names().index_of(&r.port) {
            return Ok(component.get_output(i));
        }
        if let Some(i) = component.input_names().index_of(&r.port) {
            return Ok(component.get_input(i));
        }
        Err(WiringError::UnknownPort {
            component: r.component,
            port: r.port,
            direction: PortDirection::Output,
        })
    }

    /// Look up a component by name
    pub fn component(&self, name: &str) -> Option<&ComponentKind> {
        self.names
            .get(name)
            .and_then(|&i| self.slot(i))
            .map(|s| &s.component)
    }

    /// Look up a component by id
    pub fn component_by_id(&self, id: ComponentId) -> Option<&ComponentKind> {
        self.slot(id.0).map(|s| &s.component)
    }

    /// Components in execution order
    pub fn components(&self) -> Vec<ComponentInfo> {
        self.live()
            .map(|s| ComponentInfo {
                name: s.name.clone(),
                kind: s.component.kind_name(),
                inputs: s.component.input_names().to_vec(),
                outputs: s.component.output_names().to_vec(),
                params: s.component.params(),
                instance: s.instance.clone(),
            })
            .collect()
    }

    /// Connections in creation order, using component-level names
    pub fn connections(&self) -> Vec<ConnectionInfo> {
        self.patchbay
            .iter()
            .map(|c| ConnectionInfo {
                source: self.describe(c.source, PortDirection::Output),
                dest: self.describe(c.dest, PortDirection::Input),
                owner: c.owner.clone(),
            })
            .collect()
    }

    /// Subcircuit instances, sorted by name
    pub fn instances(&self) -> Vec<InstanceInfo> {
        self.instances
            .iter()
            .map(|(name, r)| InstanceInfo {
                name: name.clone(),
                template: r.template.clone(),
                parent: r.parent.clone(),
                inputs: r.inputs.iter().map(|(n, _)| n.clone()).collect(),
                outputs: r.outputs.iter().map(|(n, _)| n.clone()).collect(),
            })
            .collect()
    }

    /// Number of live components
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    // ---- internals shared with the circuit module -----------------------

    pub(crate) fn slot(&self, i: usize) -> Option<&Slot> {
        self.slots.get(i).and_then(Option::as_ref)
    }

    pub(crate) fn live(&self) -> impl Iterator<Item = &Slot> {
        self.order.iter().filter_map(|&i| self.slot(i))
    }

    pub(crate) fn patchbay(&self) -> &PatchBay {
        &self.patchbay
    }

    pub(crate) fn instance_record(&self, name: &str) -> Option<&InstanceRecord> {
        self.instances.get(name)
    }

    /// Outermost instance containing `instance`
    pub(crate) fn top_level<'a>(&'a self, mut instance: &'a str) -> &'a str {
        while let Some(parent) = self
            .instances
            .get(instance)
            .and_then(|r| r.parent.as_deref())
        {
            instance = parent;
        }
        instance
    }

    fn resolve(&self, text: &str, direction: PortDirection) -> Result<PortAddr, WiringError> {
        let r = PortRef::parse(text)?;
        if let Some(inst) = self.instances.get(&r.component) {
            if inst.parent.is_some() {
                return Err(WiringError::InternalPort(text.to_string()));
            }
            let (wanted, other) = match direction {
                PortDirection::Input => (&inst.inputs, &inst.outputs),
                PortDirection::Output => (&inst.outputs, &inst.inputs),
            };
            if let Some((_, addr)) = wanted.iter().find(|(n, _)| *n == r.port) {
                return Ok(*addr);
            }
            if other.iter().any(|(n, _)| *n == r.port) {
                return Err(WiringError::DirectionMismatch {
                    port: text.to_string(),
                    expected: direction,
                    actual: direction.opposite(),
                });
            }
            return Err(WiringError::UnknownPort {
                component: r.component,
                port: r.port,
                direction,
            });
        }

        let slot = *self
            .names
            .get(&r.component)
            .ok_or_else(|| WiringError::UnknownComponent(r.component.clone()))?;
        let entry = self
            .slot(slot)
            .ok_or_else(|| WiringError::UnknownComponent(r.component.clone()))?;
        if entry.instance.is_some() {
            return Err(WiringError::InternalPort(text.to_string()));
        }
        let port = find_port(&entry.component, &r.component, &r.port, direction)?;
        Ok(PortAddr::new(slot, port))
    }

    /// `component.port` text for a port address
    pub(crate) fn describe(&self, addr: PortAddr, direction: PortDirection) -> String {
        match self.slot(addr.slot) {
            Some(s) => {
                let names = match direction {
                    PortDirection::Input => s.component.input_names(),
                    PortDirection::Output => s.component.output_names(),
                };
                let port = names.name(addr.port).unwrap_or_else(|| addr.port.to_string());
                format!("{}.{}", s.name, port)
            }
            None => format!("<removed {}>.{}", addr.slot, addr.port),
        }
    }

    fn output_value(&self, addr: PortAddr) -> f64 {
        self.slot(addr.slot)
            .map_or(0.0, |s| s.component.get_output(addr.port))
    }

    fn input_value(&self, addr: PortAddr) -> f64 {
        self.slot(addr.slot)
            .map_or(0.0, |s| s.component.get_input(addr.port))
    }
}

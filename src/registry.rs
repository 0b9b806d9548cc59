//! Component-kind factories and subcircuit templates.
//!
//! A `Registry` is an ordinary value owned by a machine. Two machines with
//! different registries never see each other's kinds or templates.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use log::debug;
use philbrick_types::SubcircuitDef;

use crate::component_kind::ComponentKind;
use crate::components::*;
use crate::error::{ConfigurationError, TemplateError};
use crate::params::{Configurable, Params};
use crate::subcircuit::{self, SubcircuitTemplate};

/// Builds a component from its parameter map
pub type Factory =
    Arc<dyn Fn(&Params) -> Result<ComponentKind, ConfigurationError> + Send + Sync>;

fn factory<T>() -> Factory
where
    T: Configurable + Into<ComponentKind> + 'static,
{
    Arc::new(|params: &Params| T::from_params(params).map(Into::into))
}

/// Known component kinds and subcircuit templates
#[derive(Clone, Default)]
pub struct Registry {
    kinds: BTreeMap<String, Factory>,
    templates: BTreeMap<String, SubcircuitTemplate>,
}

impl Registry {
    /// Registry with every primitive kind and no templates
    pub fn new() -> Self {
        let mut registry = Self::default();
        let builtin: [(&str, Factory); 20] = [
            (Integrator::KIND, factory::<Integrator>()),
            (Summer::KIND, factory::<Summer>()),
            (Coefficient::KIND, factory::<Coefficient>()),
            (Inverter::KIND, factory::<Inverter>()),
            (Multiplier::KIND, factory::<Multiplier>()),
            (Comparator::KIND, factory::<Comparator>()),
            (Limiter::KIND, factory::<Limiter>()),
            (Exp::KIND, factory::<Exp>()),
            (Divider::KIND, factory::<Divider>()),
            (Max::KIND, factory::<Max>()),
            (DotProduct::KIND, factory::<DotProduct>()),
            (PiecewiseLinear::KIND, factory::<PiecewiseLinear>()),
            (Constant::KIND, factory::<Constant>()),
            (SineSource::KIND, factory::<SineSource>()),
            (TriangleWave::KIND, factory::<TriangleWave>()),
            (SawtoothWave::KIND, factory::<SawtoothWave>()),
            (SquareWave::KIND, factory::<SquareWave>()),
            (Ramp::KIND, factory::<Ramp>()),
            (Step::KIND, factory::<Step>()),
            (PiecewiseSource::KIND, factory::<PiecewiseSource>()),
        ];
        for (name, factory) in builtin {
            registry.kinds.insert(name.to_string(), factory);
        }
        registry
    }

    /// Primitives plus the built-in Softmax and AttentionHead templates
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for def in [subcircuit::softmax(), subcircuit::attention_head()] {
            // built-ins reference primitives only
            let registered = registry.register_template(def);
            debug_assert!(registered.is_ok(), "built-in template rejected: {:?}", registered);
        }
        registry
    }

    /// Add a component kind under a new name.
    ///
    /// The factory may return any primitive variant; components built this
    /// way export as that primitive with its full parameter set.
    pub fn register_kind<F>(&mut self, name: &str, factory: F) -> Result<(), ConfigurationError>
    where
        F: Fn(&Params) -> Result<ComponentKind, ConfigurationError> + Send + Sync + 'static,
    {
        if self.contains(name) {
            return Err(ConfigurationError::DuplicateName(name.to_string()));
        }
        debug!("registered component kind {}", name);
        self.kinds.insert(name.to_string(), Arc::new(factory));
        Ok(())
    }

    /// Validate and add a subcircuit template
    pub fn register_template(&mut self, def: SubcircuitDef) -> Result<(), TemplateError> {
        if self.contains(&def.name) {
            return Err(TemplateError::DuplicateTemplate(def.name));
        }
        let template = SubcircuitTemplate::validate(def, self)?;
        debug!(
            "registered template {} ({} inputs, {} outputs)",
            template.name(),
            template.inputs().len(),
            template.outputs().len()
        );
        self.templates.insert(template.name().to_string(), template);
        Ok(())
    }

    /// Build a primitive component of `kind`
    pub fn create(&self, kind: &str, params: &Params) -> Result<ComponentKind, ConfigurationError> {
        let factory = self
            .kinds
            .get(kind)
            .ok_or_else(|| ConfigurationError::UnknownKind(kind.to_string()))?;
        (**factory)(params)
    }

    /// True if `name` is a registered kind or template
    pub fn contains(&self, name: &str) -> bool {
        self.kinds.contains_key(name) || self.templates.contains_key(name)
    }

    pub fn is_template(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    pub fn template(&self, name: &str) -> Option<&SubcircuitTemplate> {
        self.templates.get(name)
    }

    /// Primitive kind names, sorted
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.kinds.keys().map(String::as_str)
    }

    /// Registered templates, sorted by name
    pub fn templates(&self) -> impl Iterator<Item = &SubcircuitTemplate> {
        self.templates.values()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("kinds", &self.kinds.keys().collect::<Vec<_>>())
            .field("templates", &self.templates.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Component;
    use crate::params::params;
    use philbrick_types::ComponentDef;

    #[test]
    fn test_every_primitive_builds_with_defaults() {
        let registry = Registry::new();
        for kind in registry.kinds() {
            let component = registry.create(kind, &Params::new()).unwrap();
            assert_eq!(component.kind_name(), kind);
            assert_eq!(component.outputs().len(), 1);
        }
        assert_eq!(registry.kinds().count(), 20);
    }

    #[test]
    fn test_unknown_kind() {
        let err = Registry::new().create("Flux", &Params::new()).unwrap_err();
        assert_eq!(err, ConfigurationError::UnknownKind("Flux".to_string()));
    }

    #[test]
    fn test_standard_has_builtin_templates() {
        let registry = Registry::standard();
        let names: Vec<_> = registry.templates().map(|t| t.name()).collect();
        assert_eq!(names, ["AttentionHead", "Softmax"]);
        assert!(registry.is_template("Softmax"));
        assert!(!registry.is_template("Summer"));
    }

    #[test]
    fn test_register_kind() {
        let mut registry = Registry::new();
        registry
            .register_kind("Doubler", |_| Ok(Coefficient::new(2.0).into()))
            .unwrap();
        let c = registry.create("Doubler", &Params::new()).unwrap();
        assert_eq!(c.kind_name(), "Coefficient");
        assert_eq!(c.params(), params! { "k" => 2.0 });

        let err = registry.register_kind("Summer", |_| Ok(Inverter::new().into()));
        assert!(matches!(err, Err(ConfigurationError::DuplicateName(_))));
    }

    #[test]
    fn test_duplicate_template_rejected() {
        let mut registry = Registry::standard();
        let err = registry.register_template(subcircuit::softmax()).unwrap_err();
        assert_eq!(err, TemplateError::DuplicateTemplate("Softmax".to_string()));

        let clash = SubcircuitDef::new("Integrator").component(ComponentDef::new("A", "Constant"));
        assert!(registry.register_template(clash).is_err());
    }

    #[test]
    fn test_registries_are_independent() {
        let mut a = Registry::new();
        let b = Registry::new();
        a.register_template(subcircuit::softmax()).unwrap();
        assert!(a.is_template("Softmax"));
        assert!(!b.is_template("Softmax"));
    }
}

//! Error types for building and running machines.
//!
//! Every error is local and recoverable: a failed build request leaves the
//! graph exactly as it was before the call.

use thiserror::Error;

use philbrick_types::PortDirection;

/// Invalid component configuration or naming
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("unknown component kind '{0}'")]
    UnknownKind(String),

    #[error("invalid component name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("a component or instance named '{0}' already exists")]
    DuplicateName(String),

    #[error("{kind} does not accept parameter '{param}'")]
    UnknownParam { kind: String, param: String },

    #[error("{kind} parameter '{param}' must be {expected}")]
    WrongType {
        kind: String,
        param: String,
        expected: &'static str,
    },

    #[error("{kind} parameter '{param}' is out of range: {reason}")]
    InvalidValue {
        kind: String,
        param: String,
        reason: String,
    },

    #[error("timestep must be finite and positive, got {0}")]
    InvalidTimestep(f64),
}

/// Invalid connection or port reference
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WiringError {
    #[error("malformed port reference '{0}', expected 'component.port'")]
    MalformedRef(String),

    #[error("unknown component '{0}'")]
    UnknownComponent(String),

    #[error("component '{component}' has no {direction} port '{port}'")]
    UnknownPort {
        component: String,
        port: String,
        direction: PortDirection,
    },

    #[error("'{port}' is an {actual} port, expected an {expected} port")]
    DirectionMismatch {
        port: String,
        expected: PortDirection,
        actual: PortDirection,
    },

    #[error("input '{dest}' is already driven by '{existing}'")]
    FanIn { dest: String, existing: String },

    #[error("no connection from '{source_port}' to '{dest}'")]
    NotConnected { source_port: String, dest: String },

    #[error("'{0}' is internal to a subcircuit instance and cannot be patched")]
    InternalPort(String),

    #[error("'{component}' belongs to subcircuit instance '{instance}'; remove the instance instead")]
    InternalComponent { component: String, instance: String },
}

/// Invalid subcircuit template or instantiation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TemplateError {
    #[error("unknown subcircuit template '{0}'")]
    UnknownTemplate(String),

    #[error("a template or component kind named '{0}' is already registered")]
    DuplicateTemplate(String),

    #[error("template '{template}': component '{component}' has unknown kind '{kind}'")]
    UnknownKind {
        template: String,
        component: String,
        kind: String,
    },

    #[error("template '{template}': component '{component}' is misconfigured: {source}")]
    InvalidComponent {
        template: String,
        component: String,
        source: ConfigurationError,
    },

    #[error("template '{template}': component name '{component}' is used twice")]
    DuplicateComponent { template: String, component: String },

    #[error("template '{template}': '{reference}' does not name an internal port: {source}")]
    UnknownReference {
        template: String,
        reference: String,
        source: WiringError,
    },

    #[error("template '{template}': external port '{port}' has no mapping")]
    UnmappedPort { template: String, port: String },

    #[error("template '{template}': mapping for '{port}' is not a listed external port")]
    UnlistedMapping { template: String, port: String },

    #[error("template '{template}': external input '{port}' maps to '{target}', which is already driven internally")]
    MappedInputDriven {
        template: String,
        port: String,
        target: String,
    },

    #[error("template '{template}': {source}")]
    InternalWiring {
        template: String,
        source: WiringError,
    },

    #[error("template '{0}' contains itself")]
    Recursive(String),

    #[error("instance name '{0}' is already taken")]
    NameTaken(String),
}

/// Operation not allowed in the engine's current state
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineStateError {
    #[error("cannot {0} while a run is in progress")]
    RunInProgress(&'static str),

    #[error("machine service has stopped")]
    ServiceStopped,
}

/// Any error produced by the engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Wiring(#[from] WiringError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    EngineState(#[from] EngineStateError),
}

pub type Result<T> = std::result::Result<T, Error>;

//! Error taxonomy for component resolution, graph resolution, engine
//! lifecycle and component state transitions — one fine-grained enum per
//! concern, following `streamlib-codegen-shared::error::SchemaError` over
//! `streamlib::core::error::StreamError`'s single-enum approach.

use crate::state::EngineState;

#[derive(Debug, thiserror::Error)]
pub enum ComponentResolutionError {
    #[error("component name '{0}' is malformed (expected \"module.Class\")")]
    MalformedName(String),

    #[error("module for component '{0}' could not be located")]
    ModuleNotFound(String),

    #[error("class '{0}' was not found")]
    ClassNotFound(String),
}

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("malformed graph descriptor: {0}")]
    MalformedDescriptor(String),

    #[error("duplicate process name '{0}'")]
    DuplicateProcess(String),

    #[error("duplicate connection name '{0}'")]
    DuplicateConnection(String),

    #[error("unknown process '{0}'")]
    UnknownProcess(String),

    #[error("process name '{0}' is ambiguous")]
    AmbiguousProcess(String),

    #[error("process '{process}' has no port named '{port}'")]
    UnknownPort { process: String, port: String },

    #[error("connection capacity must be at least 1 (got {0})")]
    InvalidCapacity(i64),

    #[error("failed to instantiate component for process '{process}': {source}")]
    ComponentInstantiation {
        process: String,
        #[source]
        source: ComponentResolutionError,
    },

    #[error("missing required field '{0}'")]
    MissingField(String),

    #[error("component for process '{process}' declared an invalid port: {source}")]
    InvalidPortDeclaration {
        process: String,
        #[source]
        source: flow_core::PortError,
    },

    #[error("connection wiring failed: {0}")]
    ConnectionWiring(#[from] flow_core::ConnectionError),
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("'{operation}' is invalid while the engine is {state:?}")]
    InvalidTransition {
        operation: &'static str,
        state: EngineState,
    },

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("process manager has not been wired")]
    ProcessManagerMissing,
}

/// A component state-machine trigger rejected for the current state —
/// a programming error, surfaced to the caller rather than silently
/// ignored.
#[derive(Debug, thiserror::Error)]
#[error("trigger {trigger} is invalid for component state {state}")]
pub struct TransitionError {
    pub state: String,
    pub trigger: String,
}

//! Error types shared across the crate.

use thiserror::Error;

/// Errors raised while building the command tree.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Two runnable commands were registered under the same name in strict mode.
    #[error("Command '{command}' conflict with '{existing}'")]
    Conflict { command: String, existing: String },
}

/// A parameter could not be parsed from the command line.
#[derive(Debug, Error)]
#[error("Error parsing parameter {name}: {source:#}")]
pub struct ParameterError {
    pub name: String,
    #[source]
    pub source: anyhow::Error,
}

/// Errors of the execution engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine no longer accepts work.
    #[error("executor is shut down")]
    ShutDown,
    /// The worker thread could not be started.
    #[error("failed to spawn the executor thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Returned by cancellable blocking helpers once the running command was interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("interrupted")]
pub struct Interrupted;

/// Startup failures of an interpreter.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

//! # Error Types
//!
//! Dispatch errors are returned as values and never cross a module
//! boundary as a panic. Startup errors are the only ones the binary treats
//! as fatal.

use thiserror::Error;

/// Errors returned by handler dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// No handler of that name on the target module.
    #[error("Route not found: {module}.{handler}")]
    RouteNotFound { module: String, handler: String },

    /// No running module of that name.
    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    /// The synchronous call did not complete in time. The handler may still
    /// run; its result is discarded.
    #[error("Dispatch timeout: {module}.{handler} after {timeout_ms}ms")]
    Timeout {
        module: String,
        handler: String,
        timeout_ms: u64,
    },

    /// The module has been stopped and no longer accepts calls.
    #[error("Module stopped: {0}")]
    ModuleStopped(String),

    /// The handler panicked on the module's home thread.
    #[error("Handler panicked: {module}.{handler}")]
    HandlerPanicked { module: String, handler: String },

    /// The returned value could not be converted to the requested type.
    #[error("Decode failed for {handler}: {reason}")]
    Decode { handler: String, reason: String },
}

/// Outcome of a dispatch, as reported to callers that only need a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStatus {
    Accepted,
    NotFound,
    TimedOut,
    Stopped,
    Failed,
}

impl DispatchStatus {
    /// Map a dispatch result to its status.
    #[must_use]
    pub fn of<T>(result: &Result<T, DispatchError>) -> Self {
        match result {
            Ok(_) => Self::Accepted,
            Err(e) => Self::from(e),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::NotFound => "not_found",
            Self::TimedOut => "timed_out",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }
}

impl From<&DispatchError> for DispatchStatus {
    fn from(error: &DispatchError) -> Self {
        match error {
            DispatchError::RouteNotFound { .. } | DispatchError::ModuleNotFound(_) => {
                Self::NotFound
            }
            DispatchError::Timeout { .. } => Self::TimedOut,
            DispatchError::ModuleStopped(_) => Self::Stopped,
            DispatchError::HandlerPanicked { .. } | DispatchError::Decode { .. } => Self::Failed,
        }
    }
}

/// Error raised by a module's own `start`/`stop`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModuleError {
    /// Settings block could not be used.
    #[error("Invalid settings for {module}: {reason}")]
    InvalidSettings { module: String, reason: String },

    /// Any other module-specific failure.
    #[error("{module}: {message}")]
    Failed { module: String, message: String },
}

impl ModuleError {
    pub fn settings(module: &str, reason: impl Into<String>) -> Self {
        Self::InvalidSettings {
            module: module.to_string(),
            reason: reason.into(),
        }
    }

    pub fn failed(module: &str, message: impl Into<String>) -> Self {
        Self::Failed {
            module: module.to_string(),
            message: message.into(),
        }
    }
}

/// Configuration document errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("Cannot read config {path}: {error}")]
    Io { path: String, error: String },

    /// Document is not valid TOML or a field has the wrong type.
    #[error("Cannot parse config: {0}")]
    Parse(String),

    /// Document parsed but does not have the expected shape.
    #[error("Invalid config structure: {0}")]
    Structure(String),
}

/// Fatal startup errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A module with this name is already running.
    #[error("Duplicate module: {0} is already running")]
    DuplicateModule(String),

    /// No factory is registered under this name.
    #[error("Unknown module type: {0}")]
    UnknownModule(String),

    /// The module's own `start` failed.
    #[error("Module {module} failed to start: {source}")]
    ModuleStart {
        module: String,
        #[source]
        source: ModuleError,
    },

    /// The worker pool or a module home thread could not be created.
    #[error("Runtime setup failed: {0}")]
    Runtime(String),

    /// Controller registration attempted after module creation began.
    #[error("Capability registry is frozen; controllers must register before modules are created")]
    RegistryFrozen,

    /// A connection declaration could not be resolved (strict mode only).
    #[error("Unresolved connection {source_module}.{event} -> {target_module}.{handler}")]
    UnresolvedConnection {
        source_module: String,
        event: String,
        target_module: String,
        handler: String,
    },
}

//! Module lifecycle states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a module instance: `Created → Started → Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModuleState {
    /// Instantiated, home thread running, not yet started.
    Created,
    /// `start` succeeded.
    Started,
    /// `stop` ran (or the module was stopped before it started).
    Stopped,
    /// Present in configuration but disabled.
    Disabled,
}

impl ModuleState {
    /// Whether the module still accepts invocations.
    #[must_use]
    pub fn accepts_calls(&self) -> bool {
        matches!(self, Self::Created | Self::Started)
    }
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::Started => write!(f, "Started"),
            Self::Stopped => write!(f, "Stopped"),
            Self::Disabled => write!(f, "Disabled"),
        }
    }
}

//! # Route Keys
//!
//! Keys used to look up capability entries. A key is either a name of the
//! form `"Owner::method"` or a small integer identifying a UI action.
//! Lookup is by equality only.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Separator between the owner and the method part of a name key.
pub const ROUTE_SEPARATOR: &str = "::";

/// A route key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RouteKey {
    /// UI action identifier.
    Action(u32),
    /// `"Owner::method"` name.
    Name(String),
}

impl RouteKey {
    /// Build a name key from its two parts.
    #[must_use]
    pub fn path(owner: &str, method: &str) -> Self {
        Self::Name(format!("{owner}{ROUTE_SEPARATOR}{method}"))
    }

    /// Build an action key.
    #[must_use]
    pub fn action(id: u32) -> Self {
        Self::Action(id)
    }

    /// Split a name key into `(owner, method)`.
    ///
    /// Returns `None` for action keys and for names without a separator.
    #[must_use]
    pub fn split(&self) -> Option<(&str, &str)> {
        match self {
            Self::Name(name) => name.split_once(ROUTE_SEPARATOR),
            Self::Action(_) => None,
        }
    }

    /// The method part of a name key, or the whole name if it has no owner.
    #[must_use]
    pub fn method(&self) -> Option<&str> {
        match self {
            Self::Name(name) => Some(self.split().map_or(name.as_str(), |(_, m)| m)),
            Self::Action(_) => None,
        }
    }

    #[must_use]
    pub fn is_action(&self) -> bool {
        matches!(self, Self::Action(_))
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Action(id) => write!(f, "{id}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

impl FromStr for RouteKey {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.parse::<u32>() {
            Ok(id) => Self::Action(id),
            Err(_) => Self::Name(s.to_string()),
        })
    }
}

impl From<&str> for RouteKey {
    fn from(s: &str) -> Self {
        match s.parse::<u32>() {
            Ok(id) => Self::Action(id),
            Err(_) => Self::Name(s.to_string()),
        }
    }
}

impl From<String> for RouteKey {
    fn from(s: String) -> Self {
        match s.parse::<u32>() {
            Ok(id) => Self::Action(id),
            Err(_) => Self::Name(s),
        }
    }
}

impl From<u32> for RouteKey {
    fn from(id: u32) -> Self {
        Self::Action(id)
    }
}

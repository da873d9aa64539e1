//! # Connection Declarations
//!
//! "When module A emits `event`, call module B's `handler`." Declarations are
//! collected before any module exists and resolved by the orchestrator after
//! every module has been created.

use std::fmt;
use tracing::debug;

/// How a resolved connection delivers to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delivery {
    /// Posted to the target's home thread; the emitter never waits.
    #[default]
    Queued,
    /// The emitter blocks until the target handler returns (bounded by the
    /// dispatch timeout).
    Blocking,
}

/// One declared producer → consumer link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDeclaration {
    pub source_module: String,
    pub source_event: String,
    pub target_module: String,
    pub target_handler: String,
    pub delivery: Delivery,
}

impl ConnectionDeclaration {
    pub fn new(source: &str, event: &str, target: &str, handler: &str) -> Self {
        Self {
            source_module: source.to_string(),
            source_event: event.to_string(),
            target_module: target.to_string(),
            target_handler: handler.to_string(),
            delivery: Delivery::Queued,
        }
    }

    #[must_use]
    pub fn with_delivery(mut self, delivery: Delivery) -> Self {
        self.delivery = delivery;
        self
    }
}

impl fmt::Display for ConnectionDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} -> {}.{}",
            self.source_module, self.source_event, self.target_module, self.target_handler
        )
    }
}

/// Append-only list of declarations.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTable {
    declarations: Vec<ConnectionDeclaration>,
}

impl ConnectionTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(&mut self, declaration: ConnectionDeclaration) {
        debug!(connection = %declaration, "Connection declared");
        self.declarations.push(declaration);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConnectionDeclaration> {
        self.declarations.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }
}

impl IntoIterator for ConnectionTable {
    type Item = ConnectionDeclaration;
    type IntoIter = std::vec::IntoIter<ConnectionDeclaration>;

    fn into_iter(self) -> Self::IntoIter {
        self.declarations.into_iter()
    }
}

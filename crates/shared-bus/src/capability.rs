//! # Capability Registry
//!
//! Table of `(owner, route key) → [entry]` populated by controllers before any
//! module exists.
//!
//! ## Lifecycle
//!
//! ```text
//! CapabilityRegistry ──freeze()──▶ FrozenCapabilities ──entries_for(owner)──▶ RouteTable
//!   (append-only)                    (read-only, each owner's map
//!                                     is handed out once)
//! ```
//!
//! Registration only appends. Several entries under the same key fan out in
//! registration order; nothing is ever replaced.

use crate::handler::Handler;
use shared_types::RouteKey;
use std::collections::HashMap;
use tracing::debug;

/// One registered callable.
#[derive(Debug, Clone)]
pub struct CapabilityEntry {
    owner: String,
    route: RouteKey,
    handler: Handler,
    is_async: bool,
}

impl CapabilityEntry {
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    #[must_use]
    pub fn route(&self) -> &RouteKey {
        &self.route
    }

    #[must_use]
    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    /// Whether the entry runs off the caller's thread when dispatched.
    #[must_use]
    pub fn is_async(&self) -> bool {
        self.is_async
    }
}

/// Entries addressed to one owner, keyed by route.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: HashMap<RouteKey, Vec<CapabilityEntry>>,
}

impl RouteTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All entries registered under `route`, in registration order.
    #[must_use]
    pub fn get(&self, route: &RouteKey) -> &[CapabilityEntry] {
        self.routes.get(route).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn contains(&self, route: &RouteKey) -> bool {
        self.routes.contains_key(route)
    }

    pub fn routes(&self) -> impl Iterator<Item = &RouteKey> {
        self.routes.keys()
    }

    /// Number of entries (not routes).
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    fn push(&mut self, entry: CapabilityEntry) {
        self.routes.entry(entry.route.clone()).or_default().push(entry);
    }
}

/// Append-only builder filled by controllers.
#[derive(Debug, Default)]
pub struct CapabilityRegistry {
    owners: HashMap<String, RouteTable>,
    registered: usize,
}

impl CapabilityRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry. Never replaces an existing one.
    pub fn register(
        &mut self,
        owner: &str,
        route: impl Into<RouteKey>,
        handler: Handler,
        is_async: bool,
    ) {
        let route = route.into();
        debug!(owner, route = %route, is_async, "Capability registered");
        self.owners
            .entry(owner.to_string())
            .or_default()
            .push(CapabilityEntry {
                owner: owner.to_string(),
                route,
                handler,
                is_async,
            });
        self.registered += 1;
    }

    /// Total entries registered so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registered
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registered == 0
    }

    /// End the registration phase.
    #[must_use]
    pub fn freeze(self) -> FrozenCapabilities {
        debug!(entries = self.registered, owners = self.owners.len(), "Capability registry frozen");
        FrozenCapabilities {
            owners: self.owners,
        }
    }
}

/// Read-only view of the registry. Each owner's entries can be taken once.
#[derive(Debug, Default)]
pub struct FrozenCapabilities {
    owners: HashMap<String, RouteTable>,
}

impl FrozenCapabilities {
    /// Take every entry addressed to `owner`.
    ///
    /// The owner's association is removed; a second call (or an unknown
    /// owner) yields an empty table.
    pub fn entries_for(&mut self, owner: &str) -> RouteTable {
        self.owners.remove(owner).unwrap_or_default()
    }

    /// Owners whose entries have not been taken yet.
    pub fn owners(&self) -> impl Iterator<Item = &str> {
        self.owners.keys().map(String::as_str)
    }

    /// Entries not yet taken.
    #[must_use]
    pub fn len(&self) -> usize {
        self.owners.values().map(RouteTable::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    /// Entries nobody has claimed yet.
    #[must_use]
    pub fn unclaimed(&self) -> Vec<&CapabilityEntry> {
        self.owners
            .values()
            .flat_map(|table| table.routes.values().flatten())
            .collect()
    }
}

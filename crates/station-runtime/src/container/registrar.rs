//! What a controller gets to touch: capability registration and connection
//! declarations. Controllers run once, before any module exists.

use crate::wiring::StationLink;
use shared_bus::{CapabilityRegistry, ConnectionDeclaration, ConnectionTable, Delivery, Handler};
use shared_types::RouteKey;

/// Signature of a controller's init function.
pub type ControllerFn = fn(&mut Registrar<'_>);

pub struct Registrar<'a> {
    capabilities: &'a mut CapabilityRegistry,
    connections: &'a mut ConnectionTable,
    link: StationLink,
}

impl<'a> Registrar<'a> {
    pub fn new(
        capabilities: &'a mut CapabilityRegistry,
        connections: &'a mut ConnectionTable,
        link: StationLink,
    ) -> Self {
        Self {
            capabilities,
            connections,
            link,
        }
    }

    /// Add a capability entry for `owner`.
    pub fn register(
        &mut self,
        owner: &str,
        route: impl Into<RouteKey>,
        handler: Handler,
        is_async: bool,
    ) {
        self.capabilities.register(owner, route, handler, is_async);
    }

    /// Add an entry keyed by a UI action id.
    pub fn register_action(&mut self, owner: &str, action: u32, handler: Handler, is_async: bool) {
        self.register(owner, RouteKey::Action(action), handler, is_async);
    }

    /// Declare a queued connection `source.event → target.handler`.
    pub fn connect(&mut self, source: &str, event: &str, target: &str, handler: &str) {
        self.connections
            .declare(ConnectionDeclaration::new(source, event, target, handler));
    }

    /// Declare a connection whose emitter waits for the target handler.
    pub fn connect_blocking(&mut self, source: &str, event: &str, target: &str, handler: &str) {
        self.connections.declare(
            ConnectionDeclaration::new(source, event, target, handler)
                .with_delivery(Delivery::Blocking),
        );
    }

    /// Late-bound station handle for handlers to capture.
    #[must_use]
    pub fn link(&self) -> StationLink {
        self.link.clone()
    }
}

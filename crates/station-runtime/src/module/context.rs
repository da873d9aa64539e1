//! What a module sees of the station.

use super::host::fan_out;
use super::{Fanout, ModuleHandle};
use crate::pool::ConcurrencyPool;
use crate::wiring::StationLink;
use shared_bus::RouteTable;
use shared_types::{DispatchError, RouteKey, Value};
use std::sync::Arc;

/// Passed to [`Module::start`](super::Module::start). Cheap to clone; modules
/// usually keep one.
#[derive(Clone)]
pub struct ModuleContext {
    name: Arc<str>,
    link: StationLink,
    pool: Arc<ConcurrencyPool>,
    routes: Arc<RouteTable>,
}

impl ModuleContext {
    pub fn new(
        name: &str,
        link: StationLink,
        pool: Arc<ConcurrencyPool>,
        routes: Arc<RouteTable>,
    ) -> Self {
        Self {
            name: Arc::from(name),
            link,
            pool,
            routes,
        }
    }

    /// This instance's configured name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Emit one of this module's events along its connections.
    pub fn emit(&self, event: &str, value: Value) -> usize {
        self.link.emit(&self.name, event, value)
    }

    /// Broadcast to every module with a `notify<Kind>` handler.
    pub fn notify(&self, kind: &str, value: Value) -> usize {
        self.link.notify(kind, value)
    }

    pub fn invoke_async(
        &self,
        module: &str,
        handler: &str,
        value: Value,
    ) -> Result<(), DispatchError> {
        self.link.invoke_async(module, handler, value)
    }

    pub fn invoke_sync(
        &self,
        module: &str,
        handler: &str,
        value: Value,
    ) -> Result<Value, DispatchError> {
        self.link.invoke_sync(module, handler, value)
    }

    pub fn post(&self, module: &str, handler: &str, value: Value) -> Result<(), DispatchError> {
        self.link.post(module, handler, value)
    }

    /// Fan a route key out to the capability entries registered for this
    /// instance.
    pub fn dispatch(&self, route: impl Into<RouteKey>, value: Value) -> Result<Fanout, DispatchError> {
        fan_out(&self.name, &self.routes, &route.into(), value, &self.pool)
    }

    #[must_use]
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// This module's own handle, once it is registered.
    #[must_use]
    pub fn this(&self) -> Option<ModuleHandle> {
        self.link.module(&self.name)
    }

    pub fn publish_ui(&self, channel: u32, value: Value) -> usize {
        self.link.publish_ui(channel, value)
    }

    #[must_use]
    pub fn pool(&self) -> &Arc<ConcurrencyPool> {
        &self.pool
    }

    #[must_use]
    pub fn link(&self) -> &StationLink {
        &self.link
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared_bus::{CapabilityRegistry, Handler};

    #[test]
    fn test_dispatch_uses_own_routes() {
        let mut registry = CapabilityRegistry::new();
        registry.register("camera", "Camera::snapshot", Handler::query(|v| json!({"snap": v})), false);
        let routes = registry.freeze().entries_for("camera");

        let pool = Arc::new(ConcurrencyPool::new(1).unwrap());
        let ctx = ModuleContext::new("camera", StationLink::detached(), pool, Arc::new(routes));

        let fanout = ctx.dispatch("Camera::snapshot", json!(3)).unwrap();
        assert_eq!(fanout.results, vec![json!({"snap": 3})]);
        assert!(ctx.dispatch(RouteKey::path("Camera", "zoom"), Value::Null).is_err());
        assert_eq!(ctx.name(), "camera");
        assert!(ctx.this().is_none());
    }
}

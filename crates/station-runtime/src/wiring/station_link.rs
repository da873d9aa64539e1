//! Late-bound handle onto the running station.
//!
//! Controllers run before any module exists, so the handlers they register
//! capture a `StationLink` and look modules up by name at call time.

use super::EventRouter;
use crate::module::ModuleHandle;
use crate::registry::ModuleRegistry;
use serde::de::DeserializeOwned;
use shared_bus::{SignalBus, SignalPublisher, UiSignal};
use shared_types::{DispatchError, Value};
use std::sync::Arc;

#[derive(Clone)]
pub struct StationLink {
    registry: Arc<ModuleRegistry>,
    router: Arc<EventRouter>,
    signals: Arc<SignalBus>,
}

impl StationLink {
    pub fn new(
        registry: Arc<ModuleRegistry>,
        router: Arc<EventRouter>,
        signals: Arc<SignalBus>,
    ) -> Self {
        Self {
            registry,
            router,
            signals,
        }
    }

    /// A link over an empty station.
    #[must_use]
    pub fn detached() -> Self {
        Self::new(
            Arc::new(ModuleRegistry::new()),
            Arc::new(EventRouter::new()),
            Arc::new(SignalBus::new()),
        )
    }

    #[must_use]
    pub fn module(&self, name: &str) -> Option<ModuleHandle> {
        self.registry.get(name)
    }

    pub fn invoke_async(
        &self,
        module: &str,
        handler: &str,
        value: Value,
    ) -> Result<(), DispatchError> {
        self.require(module)?.invoke_async(handler, value)
    }

    pub fn invoke_sync(
        &self,
        module: &str,
        handler: &str,
        value: Value,
    ) -> Result<Value, DispatchError> {
        self.require(module)?.invoke_sync(handler, value)
    }

    pub fn invoke_sync_as<T: DeserializeOwned>(
        &self,
        module: &str,
        handler: &str,
        value: Value,
    ) -> Result<T, DispatchError> {
        self.require(module)?.invoke_sync_as(handler, value)
    }

    pub fn post(&self, module: &str, handler: &str, value: Value) -> Result<(), DispatchError> {
        self.require(module)?.post(handler, value)
    }

    /// Fire `source.event` along its resolved connections.
    pub fn emit(&self, source: &str, event: &str, value: Value) -> usize {
        self.router.emit(source, event, value)
    }

    /// Broadcast to every module defining `notify<Kind>`.
    pub fn notify(&self, kind: &str, value: Value) -> usize {
        self.router.notify(&self.registry, kind, value)
    }

    /// Publish a value on a UI channel.
    pub fn publish_ui(&self, channel: u32, value: Value) -> usize {
        self.signals.publish(UiSignal::new(channel, value))
    }

    #[must_use]
    pub fn signals(&self) -> &Arc<SignalBus> {
        &self.signals
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn router(&self) -> &Arc<EventRouter> {
        &self.router
    }

    fn require(&self, module: &str) -> Result<ModuleHandle, DispatchError> {
        self.registry
            .get(module)
            .ok_or_else(|| DispatchError::ModuleNotFound(module.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared_bus::SignalFilter;

    #[test]
    fn test_missing_module() {
        let link = StationLink::detached();
        assert_eq!(
            link.invoke_sync("db", "save", Value::Null),
            Err(DispatchError::ModuleNotFound("db".into()))
        );
        assert!(link.module("db").is_none());
        assert_eq!(link.emit("db", "saved", Value::Null), 0);
    }

    #[test]
    fn test_publish_ui() {
        let link = StationLink::detached();
        let mut sub = link.signals().subscribe(SignalFilter::channels(vec![4]));

        assert_eq!(link.publish_ui(4, json!("ok")), 1);
        assert_eq!(sub.try_recv().unwrap(), Some(UiSignal::new(4, json!("ok"))));
    }
}

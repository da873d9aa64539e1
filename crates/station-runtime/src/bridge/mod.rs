//! # UI Bridge
//!
//! Two-way adapter between the UI layer and the module layer.
//!
//! ```text
//!  UI ──dispatch_from_ui(action, v)──▶ capability entries keyed Action(action)
//!  UI ◀──────── SignalBus ◀──────── dispatch_to_ui(channel, v) / ui.toUi
//! ```

use crate::module::{Fanout, ModuleHandle};
use shared_bus::{
    SignalBus, SignalFilter, SignalPublisher, SignalStream, SignalSubscription, UiSignal,
};
use shared_types::{DispatchError, RouteKey, Value};
use station_telemetry::UI_ACTIONS;
use std::sync::Arc;
use tracing::debug;

/// Default name of the bridge module.
pub const UI_MODULE: &str = "ui";

#[derive(Clone)]
pub struct UiBridge {
    module: ModuleHandle,
    signals: Arc<SignalBus>,
}

impl UiBridge {
    pub fn new(module: ModuleHandle, signals: Arc<SignalBus>) -> Self {
        Self { module, signals }
    }

    /// Run every capability entry registered for `action` on the bridge
    /// module. Synchronous entries' results come back in the [`Fanout`].
    pub fn dispatch_from_ui(&self, action: u32, value: Value) -> Result<Fanout, DispatchError> {
        UI_ACTIONS.inc();
        let result = self.module.dispatch_route(&RouteKey::Action(action), value);
        if let Err(e) = &result {
            debug!(action, error = %e, "UI action not dispatched");
        }
        result
    }

    /// Publish `value` on a UI channel. Returns the number of subscribers
    /// that received it.
    pub fn dispatch_to_ui(&self, channel: u32, value: Value) -> usize {
        self.signals.publish(UiSignal::new(channel, value))
    }

    #[must_use]
    pub fn subscribe(&self, filter: SignalFilter) -> SignalSubscription {
        self.signals.subscribe(filter)
    }

    #[must_use]
    pub fn stream(&self, filter: SignalFilter) -> SignalStream {
        self.signals.stream(filter)
    }

    #[must_use]
    pub fn module(&self) -> &ModuleHandle {
        &self.module
    }
}

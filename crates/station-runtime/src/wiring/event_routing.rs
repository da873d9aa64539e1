//! # Event Routing
//!
//! Resolved connections and the type-keyed notify broadcast.
//!
//! ```text
//! monitor.emit("alarm", v)
//!     │
//!     ├── Queued ───▶ recorder.post("onRecord", v)      (emitter returns at once)
//!     └── Blocking ─▶ ui.invoke_sync("toUi", v)         (bounded by sync timeout)
//!
//! notify("Alarm", v) ──▶ every module with a `notifyAlarm` handler (pool)
//! ```

use crate::module::ModuleHandle;
use crate::registry::ModuleRegistry;
use parking_lot::RwLock;
use shared_bus::Delivery;
use shared_types::Value;
use station_telemetry::{CONNECTIONS_ACTIVE, EVENTS_EMITTED, NOTIFY_BROADCASTS};
use std::collections::HashMap;
use tracing::{debug, trace, warn};

#[derive(Clone)]
struct Link {
    target: ModuleHandle,
    handler: String,
    delivery: Delivery,
}

/// Source → target links plus a cache of notify recipients.
#[derive(Default)]
pub struct EventRouter {
    /// source module → event → links, in connection order.
    links: RwLock<HashMap<String, HashMap<String, Vec<Link>>>>,
    /// notify handler name → modules that define it.
    notify_targets: RwLock<HashMap<String, Vec<ModuleHandle>>>,
}

impl EventRouter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Link `source.event` to `target.handler`.
    pub fn connect(
        &self,
        source: &str,
        event: &str,
        target: ModuleHandle,
        handler: &str,
        delivery: Delivery,
    ) {
        debug!(
            source,
            event,
            target = target.name(),
            handler,
            ?delivery,
            "Connection resolved"
        );
        self.links
            .write()
            .entry(source.to_string())
            .or_default()
            .entry(event.to_string())
            .or_default()
            .push(Link {
                target,
                handler: handler.to_string(),
                delivery,
            });
        CONNECTIONS_ACTIVE.set(self.link_count() as f64);
    }

    /// Deliver `value` along every link of `source.event`.
    ///
    /// Returns the number of targets that accepted it. An event nobody
    /// connected to is a no-op.
    pub fn emit(&self, source: &str, event: &str, value: Value) -> usize {
        EVENTS_EMITTED.inc();

        let links: Vec<Link> = self
            .links
            .read()
            .get(source)
            .and_then(|events| events.get(event))
            .cloned()
            .unwrap_or_default();

        if links.is_empty() {
            trace!(source, event, "Event has no connections");
            return 0;
        }

        let mut delivered = 0;
        for link in links {
            let result = match link.delivery {
                Delivery::Queued => link.target.post(&link.handler, value.clone()),
                Delivery::Blocking => link
                    .target
                    .invoke_sync(&link.handler, value.clone())
                    .map(|_| ()),
            };
            match result {
                Ok(()) => delivered += 1,
                Err(e) => warn!(
                    source,
                    event,
                    target = link.target.name(),
                    handler = %link.handler,
                    error = %e,
                    "Connection delivery failed"
                ),
            }
        }
        delivered
    }

    /// `(target module, handler)` pairs linked to `source.event`.
    #[must_use]
    pub fn targets(&self, source: &str, event: &str) -> Vec<(String, String)> {
        self.links
            .read()
            .get(source)
            .and_then(|events| events.get(event))
            .map(|links| {
                links
                    .iter()
                    .map(|l| (l.target.name().to_string(), l.handler.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    #[must_use]
    pub fn link_count(&self) -> usize {
        self.links
            .read()
            .values()
            .flat_map(HashMap::values)
            .map(Vec::len)
            .sum()
    }

    /// Invoke `notify<Kind>` on every module that defines it, off-thread.
    ///
    /// Returns how many modules the notification was queued for.
    pub fn notify(&self, registry: &ModuleRegistry, kind: &str, value: Value) -> usize {
        let handler = notify_handler_name(kind);
        NOTIFY_BROADCASTS.with_label_values(&[kind]).inc();

        let mut reached = 0;
        for target in self.notify_targets(registry, &handler) {
            match target.invoke_async(&handler, value.clone()) {
                Ok(()) => reached += 1,
                Err(e) => debug!(module = target.name(), %handler, error = %e, "Notify skipped"),
            }
        }
        trace!(kind, reached, "Notify broadcast");
        reached
    }

    /// Forget cached notify recipients. Called whenever the module set changes.
    pub fn invalidate_notify_cache(&self) {
        self.notify_targets.write().clear();
    }

    /// Drop every link and cached recipient.
    pub fn clear(&self) {
        self.links.write().clear();
        self.invalidate_notify_cache();
        CONNECTIONS_ACTIVE.set(0.0);
    }

    fn notify_targets(&self, registry: &ModuleRegistry, handler: &str) -> Vec<ModuleHandle> {
        if let Some(cached) = self.notify_targets.read().get(handler) {
            return cached.clone();
        }

        let targets: Vec<ModuleHandle> = registry
            .handles()
            .into_iter()
            .filter(|module| module.has_handler(handler))
            .collect();
        self.notify_targets
            .write()
            .insert(handler.to_string(), targets.clone());
        targets
    }
}

/// `"alarm"` → `"notifyAlarm"`.
#[must_use]
pub fn notify_handler_name(kind: &str) -> String {
    let mut chars = kind.chars();
    match chars.next() {
        Some(first) => format!("notify{}{}", first.to_uppercase(), chars.as_str()),
        None => "notify".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_handler_name() {
        assert_eq!(notify_handler_name("Alarm"), "notifyAlarm");
        assert_eq!(notify_handler_name("alarm"), "notifyAlarm");
        assert_eq!(notify_handler_name("frameReady"), "notifyFrameReady");
        assert_eq!(notify_handler_name(""), "notify");
    }

    #[test]
    fn test_emit_without_links_is_noop() {
        let router = EventRouter::new();
        assert_eq!(router.emit("camera", "frame", Value::Null), 0);
        assert!(router.targets("camera", "frame").is_empty());
        assert_eq!(router.link_count(), 0);
    }

    #[test]
    fn test_notify_with_empty_registry() {
        let router = EventRouter::new();
        let registry = ModuleRegistry::new();
        assert_eq!(router.notify(&registry, "Alarm", Value::Null), 0);
    }
}

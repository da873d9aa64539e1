//! Periodic `tick` event.

use super::parse_settings;
use crate::module::{MethodTable, Module, ModuleContext};
use crate::pool::ConcurrencyPool;
use serde::Deserialize;
use serde_json::json;
use shared_types::{ModuleError, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
#[serde(default)]
struct HeartbeatSettings {
    interval_ms: u64,
}

impl Default for HeartbeatSettings {
    fn default() -> Self {
        Self { interval_ms: 1000 }
    }
}

#[derive(Default)]
pub struct Heartbeat {
    ticks: Arc<AtomicU64>,
    timer: OnceLock<(Arc<ConcurrencyPool>, String)>,
}

impl Heartbeat {
    fn count(&self, _value: Value) -> Value {
        json!(self.ticks.load(Ordering::SeqCst))
    }

    fn reset(&self) {
        self.ticks.store(0, Ordering::SeqCst);
    }
}

impl Module for Heartbeat {
    fn methods() -> MethodTable<Self> {
        MethodTable::new()
            .query("count", Self::count)
            .notify("reset", Self::reset)
            .event("tick")
    }

    fn start(&self, ctx: ModuleContext, settings: &Value) -> Result<(), ModuleError> {
        let settings: HeartbeatSettings = parse_settings(ctx.name(), settings)?;
        if settings.interval_ms == 0 {
            return Err(ModuleError::settings(ctx.name(), "interval_ms must be greater than 0"));
        }

        let timer = format!("{}.tick", ctx.name());
        let ticks = Arc::clone(&self.ticks);
        let emitter = ctx.clone();

        ctx.pool().run_every(
            &timer,
            move || {
                let seq = ticks.fetch_add(1, Ordering::SeqCst) + 1;
                emitter.emit("tick", json!({ "seq": seq }));
            },
            Duration::from_millis(settings.interval_ms),
        );
        debug!(timer = %timer, interval_ms = settings.interval_ms, "Heartbeat armed");

        let _ = self.timer.set((Arc::clone(ctx.pool()), timer));
        Ok(())
    }

    fn stop(&self) -> Result<(), ModuleError> {
        if let Some((pool, timer)) = self.timer.get() {
            pool.cancel(timer);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wiring::StationLink;
    use shared_bus::RouteTable;

    fn context(pool: &Arc<ConcurrencyPool>) -> ModuleContext {
        ModuleContext::new(
            "heartbeat",
            StationLink::detached(),
            Arc::clone(pool),
            Arc::new(RouteTable::new()),
        )
    }

    #[test]
    fn test_ticks_until_stopped() {
        let pool = Arc::new(ConcurrencyPool::new(1).unwrap());
        let heartbeat = Heartbeat::default();

        heartbeat
            .start(context(&pool), &json!({ "interval_ms": 10 }))
            .unwrap();
        assert_eq!(pool.timer_names(), vec!["heartbeat.tick".to_string()]);

        std::thread::sleep(Duration::from_millis(100));
        heartbeat.stop().unwrap();
        assert!(pool.timer_names().is_empty());
        assert!(heartbeat.count(Value::Null).as_u64().unwrap() >= 2);

        heartbeat.reset();
        assert_eq!(heartbeat.count(Value::Null), json!(0));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let pool = Arc::new(ConcurrencyPool::new(1).unwrap());
        let err = Heartbeat::default()
            .start(context(&pool), &json!({ "interval_ms": 0 }))
            .unwrap_err();
        assert!(matches!(err, ModuleError::InvalidSettings { .. }));
    }
}

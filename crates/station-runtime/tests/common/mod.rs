//! Test modules shared by the integration tests.

#![allow(dead_code)]

use parking_lot::Mutex;
use serde_json::json;
use shared_types::{ModuleError, Value};
use station_runtime::{MethodTable, Module, ModuleContext, ModuleFactory};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::thread;
use std::time::{Duration, Instant};

/// Records what it receives.
///
/// Settings: `delay_ms` (sleep inside `onPing`), `fail` (refuse to start).
#[derive(Default)]
pub struct Probe {
    ctx: OnceLock<ModuleContext>,
    seen: Mutex<Vec<Value>>,
    delay_ms: AtomicU64,
}

impl Probe {
    fn on_ping(&self, value: Value) {
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            thread::sleep(Duration::from_millis(delay));
        }
        self.seen.lock().push(value);
    }

    fn notify_alarm(&self, value: Value) {
        self.seen.lock().push(json!({ "alarm": value }));
    }

    fn seen(&self, _value: Value) -> Value {
        Value::Array(self.seen.lock().clone())
    }

    fn slow(&self, _value: Value) -> Value {
        thread::sleep(Duration::from_secs(1));
        json!("late")
    }

    /// Calls back into its own module through the station.
    fn self_call(&self, value: Value) -> Value {
        let Some(ctx) = self.ctx.get() else {
            return Value::Null;
        };
        self.seen.lock().push(value);
        ctx.invoke_sync(ctx.name(), "seen", Value::Null)
            .unwrap_or_else(|e| json!(e.to_string()))
    }

    fn home(&self, _value: Value) -> Value {
        json!(thread::current().name().unwrap_or_default())
    }

    fn boom(&self) {
        panic!("probe exploded");
    }
}

impl Module for Probe {
    fn methods() -> MethodTable<Self> {
        MethodTable::new()
            .consume("onPing", Self::on_ping)
            .consume("notifyAlarm", Self::notify_alarm)
            .query("seen", Self::seen)
            .query("slow", Self::slow)
            .query("selfCall", Self::self_call)
            .query("home", Self::home)
            .notify("boom", Self::boom)
    }

    fn start(&self, ctx: ModuleContext, settings: &Value) -> Result<(), ModuleError> {
        if settings.get("fail").and_then(Value::as_bool).unwrap_or(false) {
            return Err(ModuleError::failed(ctx.name(), "refusing to start"));
        }
        if let Some(delay) = settings.get("delay_ms").and_then(Value::as_u64) {
            self.delay_ms.store(delay, Ordering::SeqCst);
        }
        let _ = self.ctx.set(ctx);
        Ok(())
    }
}

/// Emits `ping` with whatever `fire` receives.
#[derive(Default)]
pub struct Pinger {
    ctx: OnceLock<ModuleContext>,
}

impl Pinger {
    fn fire(&self, value: Value) -> Value {
        match self.ctx.get() {
            Some(ctx) => json!(ctx.emit("ping", value)),
            None => json!(0),
        }
    }
}

impl Module for Pinger {
    fn methods() -> MethodTable<Self> {
        MethodTable::new().query("fire", Self::fire).event("ping")
    }

    fn start(&self, ctx: ModuleContext, _settings: &Value) -> Result<(), ModuleError> {
        let _ = self.ctx.set(ctx);
        Ok(())
    }
}

/// Built-in modules plus `probe` and `pinger`.
pub fn factory() -> ModuleFactory {
    let mut factory = ModuleFactory::with_builtin();
    factory.register("probe", Probe::default);
    factory.register("pinger", Pinger::default);
    factory
}

/// Poll `check` until it holds or `limit` passes.
pub fn wait_until(limit: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    check()
}

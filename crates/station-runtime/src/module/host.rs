//! Home thread and dispatch for one module instance.

use super::{HandlerTable, Module, ModuleContext};
use crate::pool::ConcurrencyPool;
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use shared_bus::{Handler, RouteTable};
use shared_types::{
    zero_value, DispatchError, DispatchStatus, ModuleError, ModuleState, RouteKey, StartupError,
    Value,
};
use station_telemetry::{
    log_dispatch_event, log_module_event, record_dispatch, time_histogram, MODULES_RUNNING,
    SYNC_DISPATCH_DURATION,
};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{sync_channel, RecvTimeoutError};
use std::sync::{Arc, OnceLock};
use std::thread::{self, ThreadId};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error};
use uuid::Uuid;

type Job = Box<dyn FnOnce() + Send + 'static>;
type Binder = Box<dyn Fn() -> HandlerTable + Send + Sync>;

struct ModuleHost {
    name: String,
    module: Arc<dyn Module>,
    binder: Binder,
    handlers: OnceLock<HandlerTable>,
    routes: RwLock<Arc<RouteTable>>,
    state: RwLock<ModuleState>,
    /// Serializes start/stop.
    lifecycle: Mutex<()>,
    /// Closed on stop; the home thread drains what is queued and exits.
    mailbox: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    home: ThreadId,
    pool: Arc<ConcurrencyPool>,
    sync_timeout: Duration,
}

/// Shared handle to a running module instance.
#[derive(Clone)]
pub struct ModuleHandle {
    host: Arc<ModuleHost>,
}

/// Result of dispatching a route key to its capability entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fanout {
    /// Results of the synchronous entries, in registration order. A
    /// synchronous entry that panicked contributes `Null`.
    pub results: Vec<Value>,
    /// Asynchronous entries handed to the pool.
    pub queued: usize,
    /// Synchronous entries that panicked.
    pub panicked: usize,
}

impl Fanout {
    #[must_use]
    pub fn invoked(&self) -> usize {
        self.results.len() + self.queued
    }
}

impl ModuleHandle {
    /// Spawn the home thread for `instance` and wrap it in a handle.
    pub fn spawn<M: Module>(
        name: &str,
        instance: Arc<M>,
        pool: Arc<ConcurrencyPool>,
        sync_timeout: Duration,
    ) -> Result<Self, StartupError> {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();
        let owner = name.to_string();

        let join = thread::Builder::new()
            .name(format!("module-{name}"))
            .spawn(move || {
                while let Some(job) = receiver.blocking_recv() {
                    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                        error!(module = %owner, "Queued handler panicked");
                    }
                }
                debug!(module = %owner, "Home thread exiting");
            })
            .map_err(|e| StartupError::Runtime(format!("home thread for {name}: {e}")))?;
        let home = join.thread().id();
        drop(join);

        let bound = Arc::clone(&instance);
        let binder: Binder = Box::new(move || M::methods().bind(&bound));

        debug!(module = name, "Module instance created");

        Ok(Self {
            host: Arc::new(ModuleHost {
                name: name.to_string(),
                module: instance,
                binder,
                handlers: OnceLock::new(),
                routes: RwLock::new(Arc::new(RouteTable::new())),
                state: RwLock::new(ModuleState::Created),
                lifecycle: Mutex::new(()),
                mailbox: Mutex::new(Some(sender)),
                home,
                pool,
                sync_timeout,
            }),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.host.name
    }

    #[must_use]
    pub fn state(&self) -> ModuleState {
        *self.host.state.read()
    }

    #[must_use]
    pub fn sync_timeout(&self) -> Duration {
        self.host.sync_timeout
    }

    /// Whether the current thread is this module's home thread.
    #[must_use]
    pub fn on_home_thread(&self) -> bool {
        thread::current().id() == self.host.home
    }

    /// The bound handler table, built on first use.
    pub fn handlers(&self) -> &HandlerTable {
        self.host.handlers.get_or_init(|| (self.host.binder)())
    }

    #[must_use]
    pub fn has_handler(&self, name: &str) -> bool {
        self.handlers().contains(name)
    }

    #[must_use]
    pub fn handler_names(&self) -> Vec<String> {
        self.handlers().names()
    }

    /// Hand over the capability entries addressed to this instance.
    pub fn customize(&self, routes: RouteTable) {
        self.host.module.customize(&routes);
        *self.host.routes.write() = Arc::new(routes);
    }

    #[must_use]
    pub fn routes(&self) -> Arc<RouteTable> {
        Arc::clone(&self.host.routes.read())
    }

    /// Start the module. Starting twice is a no-op.
    pub fn start(&self, ctx: ModuleContext, settings: &Value) -> Result<(), ModuleError> {
        let _lifecycle = self.host.lifecycle.lock();

        match self.state() {
            ModuleState::Started => {
                debug!(module = %self.host.name, "Already started");
                return Ok(());
            }
            ModuleState::Stopped | ModuleState::Disabled => {
                return Err(ModuleError::failed(
                    &self.host.name,
                    "cannot start a stopped module",
                ));
            }
            ModuleState::Created => {}
        }

        self.handlers();
        self.host.module.start(ctx, settings)?;

        *self.host.state.write() = ModuleState::Started;
        MODULES_RUNNING.inc();
        log_module_event!(info, self.host.name, "Module started");
        Ok(())
    }

    /// Stop the module and close its mailbox. Idempotent.
    ///
    /// A module that never started goes straight to `Stopped` without its
    /// own `stop` being called.
    pub fn stop(&self) -> Result<(), ModuleError> {
        let _lifecycle = self.host.lifecycle.lock();

        let result = match self.state() {
            ModuleState::Stopped | ModuleState::Disabled => return Ok(()),
            ModuleState::Created => Ok(()),
            ModuleState::Started => {
                MODULES_RUNNING.dec();
                self.host.module.stop()
            }
        };

        *self.host.state.write() = ModuleState::Stopped;
        self.host.mailbox.lock().take();

        match &result {
            Ok(()) => log_module_event!(info, self.host.name, "Module stopped"),
            Err(e) => log_module_event!(warn, self.host.name, "Module stopped with error", error = %e),
        }
        result
    }

    /// Run a handler on a pool worker and return immediately.
    pub fn invoke_async(&self, handler: &str, value: Value) -> Result<(), DispatchError> {
        let target = self.resolve(handler)?;
        let module = self.host.name.clone();
        let method = handler.to_string();

        self.host.pool.run(move || {
            if panic::catch_unwind(AssertUnwindSafe(|| target.call(value))).is_err() {
                log_dispatch_event!(error, module, method, "Async handler panicked");
            }
        });

        record_dispatch("async", DispatchStatus::Accepted.as_str());
        Ok(())
    }

    /// Queue a handler on the home thread and return immediately.
    pub fn post(&self, handler: &str, value: Value) -> Result<(), DispatchError> {
        let target = self.resolve(handler)?;
        self.send(Box::new(move || {
            target.call(value);
        }))?;

        record_dispatch("post", DispatchStatus::Accepted.as_str());
        Ok(())
    }

    /// Call a handler on the home thread and wait for its result, bounded by
    /// the module's sync timeout.
    pub fn invoke_sync(&self, handler: &str, value: Value) -> Result<Value, DispatchError> {
        self.invoke_sync_timeout(handler, value, self.host.sync_timeout)
    }

    /// Like [`invoke_sync`](Self::invoke_sync) with an explicit bound.
    ///
    /// From the home thread the handler runs directly. From anywhere else
    /// the call is marshaled to the home thread; on timeout the caller gets
    /// `Timeout` and the handler may still run later, its result discarded.
    pub fn invoke_sync_timeout(
        &self,
        handler: &str,
        value: Value,
        timeout: Duration,
    ) -> Result<Value, DispatchError> {
        let result = self.call_on_home(handler, value, timeout);
        record_dispatch("sync", DispatchStatus::of(&result).as_str());
        result
    }

    /// Synchronous call with the result decoded into `T`.
    pub fn invoke_sync_as<T: DeserializeOwned>(
        &self,
        handler: &str,
        value: Value,
    ) -> Result<T, DispatchError> {
        let raw = self.invoke_sync(handler, value)?;
        serde_json::from_value(raw).map_err(|e| DispatchError::Decode {
            handler: format!("{}.{}", self.host.name, handler),
            reason: e.to_string(),
        })
    }

    /// Fan a route key out to this module's capability entries.
    pub fn dispatch_route(&self, route: &RouteKey, value: Value) -> Result<Fanout, DispatchError> {
        if !self.state().accepts_calls() {
            return Err(DispatchError::ModuleStopped(self.host.name.clone()));
        }
        let routes = self.routes();
        fan_out(&self.host.name, &routes, route, value, &self.host.pool)
    }

    fn call_on_home(
        &self,
        handler: &str,
        value: Value,
        timeout: Duration,
    ) -> Result<Value, DispatchError> {
        let target = self.resolve(handler)?;

        if self.on_home_thread() {
            return Ok(target.call(value));
        }

        let _timer = time_histogram!(SYNC_DISPATCH_DURATION);
        let call_id = Uuid::new_v4();
        let (reply, outcome) = sync_channel::<Result<Value, ()>>(1);

        self.send(Box::new(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(|| target.call(value)));
            // The caller may have timed out already.
            let _ = reply.send(result.map_err(|_| ()));
        }))?;
        log_dispatch_event!(trace, self.host.name, handler, "Sync call queued", call_id = %call_id);

        match outcome.recv_timeout(timeout) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(())) => {
                log_dispatch_event!(error, self.host.name, handler, "Sync handler panicked", call_id = %call_id);
                Err(DispatchError::HandlerPanicked {
                    module: self.host.name.clone(),
                    handler: handler.to_string(),
                })
            }
            Err(RecvTimeoutError::Timeout) => {
                let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                log_dispatch_event!(warn, self.host.name, handler, "Sync call timed out", call_id = %call_id, timeout_ms);
                Err(DispatchError::Timeout {
                    module: self.host.name.clone(),
                    handler: handler.to_string(),
                    timeout_ms,
                })
            }
            Err(RecvTimeoutError::Disconnected) => {
                Err(DispatchError::ModuleStopped(self.host.name.clone()))
            }
        }
    }

    fn resolve(&self, handler: &str) -> Result<Handler, DispatchError> {
        if !self.state().accepts_calls() {
            return Err(DispatchError::ModuleStopped(self.host.name.clone()));
        }

        match self.handlers().get(handler) {
            Some(target) => Ok(target.clone()),
            None => {
                log_dispatch_event!(warn, self.host.name, handler, "No such handler");
                record_dispatch("resolve", DispatchStatus::NotFound.as_str());
                Err(DispatchError::RouteNotFound {
                    module: self.host.name.clone(),
                    handler: handler.to_string(),
                })
            }
        }
    }

    fn send(&self, job: Job) -> Result<(), DispatchError> {
        let mailbox = self.host.mailbox.lock();
        let stopped = || DispatchError::ModuleStopped(self.host.name.clone());
        mailbox
            .as_ref()
            .ok_or_else(stopped)?
            .send(job)
            .map_err(|_| stopped())
    }
}

impl fmt::Debug for ModuleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleHandle")
            .field("name", &self.host.name)
            .field("state", &self.state())
            .finish()
    }
}

/// Invoke every entry under `route`. Synchronous entries run inline, in
/// registration order; asynchronous ones run in one pool task, also in
/// registration order. A panicking entry is counted in
/// [`Fanout::panicked`] and the remaining entries still run.
pub(crate) fn fan_out(
    owner: &str,
    routes: &RouteTable,
    route: &RouteKey,
    value: Value,
    pool: &ConcurrencyPool,
) -> Result<Fanout, DispatchError> {
    let entries = routes.get(route);
    if entries.is_empty() {
        log_dispatch_event!(debug, owner, route, "No capability entries for route");
        return Err(DispatchError::RouteNotFound {
            module: owner.to_string(),
            handler: route.to_string(),
        });
    }

    let mut fanout = Fanout::default();
    let mut deferred: Vec<Handler> = Vec::new();

    for entry in entries {
        if entry.is_async() {
            deferred.push(entry.handler().clone());
            continue;
        }
        let handler = entry.handler();
        let input = value.clone();
        match panic::catch_unwind(AssertUnwindSafe(|| handler.call(input))) {
            Ok(result) => fanout.results.push(result),
            Err(_) => {
                log_dispatch_event!(error, owner, route, "Route entry panicked");
                fanout.panicked += 1;
                fanout.results.push(zero_value());
            }
        }
    }

    if !deferred.is_empty() {
        fanout.queued = deferred.len();
        let route = route.to_string();
        let owner = owner.to_string();
        pool.run(move || {
            for handler in deferred {
                let input = value.clone();
                if panic::catch_unwind(AssertUnwindSafe(|| handler.call(input))).is_err() {
                    log_dispatch_event!(error, owner, route, "Async route entry panicked");
                }
            }
        });
    }

    Ok(fanout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::MethodTable;
    use serde_json::json;
    use shared_bus::CapabilityRegistry;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    #[derive(Default)]
    struct Probe {
        me: OnceLock<ModuleHandle>,
        starts: AtomicUsize,
        stops: AtomicUsize,
        seen: Mutex<Vec<String>>,
    }

    impl Probe {
        fn echo(&self, value: Value) -> Value {
            value
        }

        fn thread_name(&self, _value: Value) -> Value {
            json!(thread::current().name().unwrap_or_default())
        }

        fn nested(&self, value: Value) -> Value {
            match self.me.get() {
                Some(me) => me.invoke_sync("echo", value).unwrap_or(Value::Null),
                None => Value::Null,
            }
        }

        fn slow(&self, _value: Value) -> Value {
            thread::sleep(Duration::from_millis(400));
            json!("late")
        }

        fn boom(&self) {
            panic!("boom");
        }

        fn record(&self, _value: Value) {
            let name = thread::current().name().unwrap_or_default().to_string();
            self.seen.lock().push(name);
        }
    }

    impl Module for Probe {
        fn methods() -> MethodTable<Self> {
            MethodTable::new()
                .query("echo", Self::echo)
                .query("threadName", Self::thread_name)
                .query("nested", Self::nested)
                .query("slow", Self::slow)
                .notify("boom", Self::boom)
                .consume("record", Self::record)
        }

        fn start(&self, _ctx: ModuleContext, _settings: &Value) -> Result<(), ModuleError> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn stop(&self) -> Result<(), ModuleError> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn spawn_probe(timeout: Duration) -> (Arc<Probe>, ModuleHandle) {
        let pool = Arc::new(ConcurrencyPool::new(2).unwrap());
        let probe = Arc::new(Probe::default());
        let handle = ModuleHandle::spawn("probe", Arc::clone(&probe), pool, timeout).unwrap();
        probe.me.set(handle.clone()).unwrap();
        (probe, handle)
    }

    #[test]
    fn test_sync_call_runs_on_home_thread() {
        let (_probe, handle) = spawn_probe(Duration::from_secs(1));
        assert!(!handle.on_home_thread());
        assert_eq!(handle.invoke_sync("threadName", Value::Null).unwrap(), json!("module-probe"));
        assert_eq!(handle.invoke_sync("echo", json!({"a": 1})).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_reentrant_call_on_home_thread_does_not_block() {
        let (_probe, handle) = spawn_probe(Duration::from_millis(500));
        let started = Instant::now();
        assert_eq!(handle.invoke_sync("nested", json!(5)).unwrap(), json!(5));
        assert!(started.elapsed() < Duration::from_millis(400));
    }

    #[test]
    fn test_sync_timeout_is_bounded() {
        let (_probe, handle) = spawn_probe(Duration::from_secs(5));
        let started = Instant::now();
        let result = handle.invoke_sync_timeout("slow", Value::Null, Duration::from_millis(50));

        assert!(matches!(result, Err(DispatchError::Timeout { timeout_ms: 50, .. })));
        assert!(started.elapsed() < Duration::from_millis(300));
    }

    #[test]
    fn test_panic_is_contained() {
        let (_probe, handle) = spawn_probe(Duration::from_secs(1));
        let result = handle.invoke_sync("boom", Value::Null);
        assert!(matches!(result, Err(DispatchError::HandlerPanicked { .. })));

        // Home thread survives.
        assert_eq!(handle.invoke_sync("echo", json!(1)).unwrap(), json!(1));
    }

    #[test]
    fn test_unknown_handler() {
        let (_probe, handle) = spawn_probe(Duration::from_secs(1));
        let err = handle.invoke_async("explode", Value::Null).unwrap_err();
        assert_eq!(
            err,
            DispatchError::RouteNotFound {
                module: "probe".into(),
                handler: "explode".into()
            }
        );
        assert!(!handle.has_handler("explode"));
        assert!(handle.has_handler("echo"));
    }

    #[test]
    fn test_post_runs_on_home_thread_in_order() {
        let (probe, handle) = spawn_probe(Duration::from_secs(1));
        handle.post("record", Value::Null).unwrap();
        handle.post("record", Value::Null).unwrap();

        // Sync call queues behind the posts.
        handle.invoke_sync("echo", Value::Null).unwrap();
        assert_eq!(probe.seen.lock().clone(), vec!["module-probe", "module-probe"]);
    }

    #[test]
    fn test_invoke_async_runs_on_pool() {
        let (probe, handle) = spawn_probe(Duration::from_secs(1));
        handle.invoke_async("record", Value::Null).unwrap();

        let deadline = Instant::now() + Duration::from_secs(1);
        while probe.seen.lock().is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        let seen = probe.seen.lock().clone();
        assert_eq!(seen.len(), 1);
        assert_ne!(seen[0], "module-probe");
    }

    #[test]
    fn test_stop_before_start_skips_module_stop() {
        let (probe, handle) = spawn_probe(Duration::from_secs(1));
        assert_eq!(handle.state(), ModuleState::Created);

        handle.stop().unwrap();
        handle.stop().unwrap();

        assert_eq!(handle.state(), ModuleState::Stopped);
        assert_eq!(probe.stops.load(Ordering::SeqCst), 0);
        assert_eq!(
            handle.invoke_sync("echo", Value::Null),
            Err(DispatchError::ModuleStopped("probe".into()))
        );
        assert!(handle.post("record", Value::Null).is_err());
    }

    #[test]
    fn test_decode_result() {
        let (_probe, handle) = spawn_probe(Duration::from_secs(1));
        let n: u32 = handle.invoke_sync_as("echo", json!(7)).unwrap();
        assert_eq!(n, 7);

        let bad: Result<u32, _> = handle.invoke_sync_as("echo", json!("x"));
        assert!(matches!(bad, Err(DispatchError::Decode { .. })));
    }

    #[test]
    fn test_route_fanout_order() {
        let (_probe, handle) = spawn_probe(Duration::from_secs(1));
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut registry = CapabilityRegistry::new();
        for tag in ["a", "b", "c"] {
            let order = Arc::clone(&order);
            registry.register(
                "probe",
                7u32,
                Handler::query(move |_| {
                    order.lock().push(tag);
                    json!(tag)
                }),
                false,
            );
        }
        handle.customize(registry.freeze().entries_for("probe"));

        let fanout = handle.dispatch_route(&RouteKey::Action(7), Value::Null).unwrap();
        assert_eq!(fanout.results, vec![json!("a"), json!("b"), json!("c")]);
        assert_eq!(fanout.queued, 0);
        assert_eq!(order.lock().clone(), vec!["a", "b", "c"]);

        let missing = handle.dispatch_route(&RouteKey::Action(8), Value::Null);
        assert!(matches!(missing, Err(DispatchError::RouteNotFound { .. })));
    }

    #[test]
    fn test_second_start_is_a_no_op() {
        let (probe, handle) = spawn_probe(Duration::from_secs(1));
        let ctx = || {
            ModuleContext::new(
                "probe",
                crate::wiring::StationLink::detached(),
                Arc::new(ConcurrencyPool::new(1).unwrap()),
                handle.routes(),
            )
        };

        handle.start(ctx(), &Value::Null).unwrap();
        assert_eq!(handle.start(ctx(), &Value::Null), Ok(()));

        assert_eq!(probe.starts.load(Ordering::SeqCst), 1);
        assert_eq!(handle.state(), ModuleState::Started);
    }

    #[test]
    fn test_panicking_route_entry_does_not_skip_the_others() {
        // Arrange: [async, sync-panicking, sync]
        let (_probe, handle) = spawn_probe(Duration::from_secs(1));
        let async_runs = Arc::new(AtomicUsize::new(0));

        let mut registry = CapabilityRegistry::new();
        let runs = Arc::clone(&async_runs);
        registry.register(
            "probe",
            1u32,
            Handler::consume(move |_| {
                runs.fetch_add(1, Ordering::SeqCst);
            }),
            true,
        );
        registry.register("probe", 1u32, Handler::notify(|| panic!("entry exploded")), false);
        registry.register("probe", 1u32, Handler::query(|v| json!({ "after": v })), false);
        handle.customize(registry.freeze().entries_for("probe"));

        // Act
        let fanout = handle.dispatch_route(&RouteKey::Action(1), json!(4)).unwrap();

        // Assert
        assert_eq!(fanout.panicked, 1);
        assert_eq!(fanout.results, vec![Value::Null, json!({ "after": 4 })]);
        assert_eq!(fanout.queued, 1);

        let deadline = Instant::now() + Duration::from_secs(1);
        while async_runs.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(async_runs.load(Ordering::SeqCst), 1);
    }
}

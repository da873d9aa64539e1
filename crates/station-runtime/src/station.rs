//! # Station Orchestrator
//!
//! Drives startup and owns everything that lives for the whole run.
//!
//! ```text
//! bootstrap(config, factory, controllers)
//!   1. register_controllers   controllers fill the capability registry and
//!                             declare connections
//!   2. create_modules         registry freezes; each enabled config entry is
//!                             instantiated, customized, started, registered
//!   3. connect_modules        declarations become live links
//!   4. print_status
//! ```
//!
//! Any duplicate name, unknown module type or failing `start` aborts
//! startup with a [`StartupError`].

use crate::bridge::{UiBridge, UI_MODULE};
use crate::container::{AppSettings, ControllerFn, ModuleFactory, Registrar, StationConfig};
use crate::module::{ModuleContext, ModuleHandle};
use crate::pool::ConcurrencyPool;
use crate::registry::ModuleRegistry;
use crate::wiring::{EventRouter, StationLink};
use shared_bus::{CapabilityRegistry, ConnectionDeclaration, ConnectionTable, FrozenCapabilities, SignalBus};
use shared_types::{ModuleError, ModuleState, StartupError, Value};
use station_telemetry::CONNECTIONS_DROPPED;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Outcome of resolving the declared connections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectReport {
    pub resolved: usize,
    /// Declarations dropped because an endpoint or handler was missing.
    pub dropped: Vec<ConnectionDeclaration>,
}

pub struct Station {
    app: AppSettings,
    pool: Arc<ConcurrencyPool>,
    registry: Arc<ModuleRegistry>,
    router: Arc<EventRouter>,
    signals: Arc<SignalBus>,
    /// `Some` until the first module is created.
    open_capabilities: Option<CapabilityRegistry>,
    capabilities: FrozenCapabilities,
    connections: ConnectionTable,
    connected: bool,
    stopped: bool,
}

impl Station {
    pub fn new(app: AppSettings) -> Result<Self, StartupError> {
        let pool = ConcurrencyPool::new(app.pool_workers)
            .map_err(|e| StartupError::Runtime(e.to_string()))?;

        Ok(Self {
            app,
            pool: Arc::new(pool),
            registry: Arc::new(ModuleRegistry::new()),
            router: Arc::new(EventRouter::new()),
            signals: Arc::new(SignalBus::new()),
            open_capabilities: Some(CapabilityRegistry::new()),
            capabilities: FrozenCapabilities::default(),
            connections: ConnectionTable::new(),
            connected: false,
            stopped: false,
        })
    }

    /// Run the full startup sequence.
    pub fn bootstrap(
        config: &StationConfig,
        factory: &ModuleFactory,
        controllers: &[ControllerFn],
    ) -> Result<Self, StartupError> {
        info!(
            modules = config.modules.len(),
            controllers = controllers.len(),
            save_path = %config.app.save_path.display(),
            log_path = %config.app.log_path.display(),
            "Bootstrapping station"
        );

        let mut station = Self::new(config.app.clone())?;
        station.register_controllers(controllers)?;
        station.create_modules(config, factory)?;
        station.connect_modules()?;
        station.print_status();
        Ok(station)
    }

    /// Run each controller's init against the capability registry.
    pub fn register_controllers(&mut self, controllers: &[ControllerFn]) -> Result<(), StartupError> {
        let link = self.link();
        let Some(capabilities) = self.open_capabilities.as_mut() else {
            error!("Controller registration after module creation");
            return Err(StartupError::RegistryFrozen);
        };

        for controller in controllers {
            let mut registrar = Registrar::new(capabilities, &mut self.connections, link.clone());
            controller(&mut registrar);
        }

        debug!(
            entries = capabilities.len(),
            connections = self.connections.len(),
            "Controllers registered"
        );
        Ok(())
    }

    /// Create every enabled module in config order.
    pub fn create_modules(
        &mut self,
        config: &StationConfig,
        factory: &ModuleFactory,
    ) -> Result<(), StartupError> {
        self.freeze();

        for entry in &config.modules {
            if !entry.enabled {
                self.registry.mark_disabled(&entry.name);
                continue;
            }
            self.create_module(factory, &entry.name, &entry.settings)?;
        }

        for entry in self.capabilities.unclaimed() {
            warn!(
                owner = entry.owner(),
                route = %entry.route(),
                "Capability entry registered for a module that does not exist"
            );
        }
        Ok(())
    }

    /// Create, customize, start and register one module.
    ///
    /// The factory is `settings.module` when present, otherwise `name`.
    /// After startup this also resolves any declared connection that
    /// involves the new module.
    pub fn create_module(
        &mut self,
        factory: &ModuleFactory,
        name: &str,
        settings: &Value,
    ) -> Result<ModuleHandle, StartupError> {
        if self.stopped {
            return Err(StartupError::Runtime("station is stopped".into()));
        }
        if self.registry.contains(name) {
            error!(module = name, "Module name already running");
            return Err(StartupError::DuplicateModule(name.to_string()));
        }
        self.freeze();

        let factory_name = settings
            .get("module")
            .and_then(Value::as_str)
            .unwrap_or(name);
        let module = factory.create(
            factory_name,
            name,
            Arc::clone(&self.pool),
            self.app.sync_timeout(),
        )?;

        module.handlers();
        module.customize(self.capabilities.entries_for(name));

        let ctx = ModuleContext::new(name, self.link(), Arc::clone(&self.pool), module.routes());
        if let Err(source) = module.start(ctx, settings) {
            error!(module = name, error = %source, "Module failed to start");
            let _ = module.stop();
            return Err(StartupError::ModuleStart {
                module: name.to_string(),
                source,
            });
        }

        if let Err(e) = self.registry.insert(module.clone()) {
            let _ = module.stop();
            return Err(e);
        }
        self.router.invalidate_notify_cache();

        if self.connected {
            self.connect_late(name);
        }
        Ok(module)
    }

    /// Turn connection declarations into live links.
    ///
    /// A declaration naming a missing module or handler is logged and
    /// dropped, or fails startup when `app.strict_connections` is set.
    /// Calling this again is a no-op.
    pub fn connect_modules(&mut self) -> Result<ConnectReport, StartupError> {
        let mut report = ConnectReport::default();
        if self.connected {
            return Ok(report);
        }

        for declaration in self.connections.iter() {
            match self.resolve(declaration) {
                Ok(()) => report.resolved += 1,
                Err(reason) => {
                    CONNECTIONS_DROPPED.inc();
                    if self.app.strict_connections {
                        error!(connection = %declaration, reason, "Unresolved connection");
                        return Err(StartupError::UnresolvedConnection {
                            source_module: declaration.source_module.clone(),
                            event: declaration.source_event.clone(),
                            target_module: declaration.target_module.clone(),
                            handler: declaration.target_handler.clone(),
                        });
                    }
                    warn!(connection = %declaration, reason, "Dropping unresolved connection");
                    report.dropped.push(declaration.clone());
                }
            }
        }

        self.connected = true;
        info!(
            resolved = report.resolved,
            dropped = report.dropped.len(),
            "Modules connected"
        );
        Ok(report)
    }

    /// Broadcast to every module defining `notify<Kind>`.
    pub fn notify(&self, kind: &str, value: Value) -> usize {
        self.router.notify(&self.registry, kind, value)
    }

    /// Stop every module, drop all links, halt the pool's timers.
    ///
    /// Returns modules whose own `stop` failed. Idempotent.
    pub fn stop(&mut self) -> Vec<(String, ModuleError)> {
        if self.stopped {
            return Vec::new();
        }
        self.stopped = true;
        info!("Stopping station");

        let errors = self.registry.shutdown();
        self.router.clear();
        self.pool.stop();

        info!(failures = errors.len(), "Station stopped");
        errors
    }

    #[must_use]
    pub fn module(&self, name: &str) -> Option<ModuleHandle> {
        self.registry.get(name)
    }

    /// Bridge over the module named `ui`.
    #[must_use]
    pub fn ui_bridge(&self) -> Option<UiBridge> {
        self.ui_bridge_for(UI_MODULE)
    }

    /// Bridge over a differently named bridge module.
    #[must_use]
    pub fn ui_bridge_for(&self, name: &str) -> Option<UiBridge> {
        self.registry
            .get(name)
            .map(|module| UiBridge::new(module, Arc::clone(&self.signals)))
    }

    /// Every configured module with its lifecycle state, in config order.
    #[must_use]
    pub fn status(&self) -> Vec<(String, ModuleState)> {
        self.registry.get_all_status()
    }

    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.registry.is_healthy()
    }

    pub fn print_status(&self) {
        self.registry.print_status();
    }

    /// Late-bound handle for code that outlives startup.
    #[must_use]
    pub fn link(&self) -> StationLink {
        StationLink::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.router),
            Arc::clone(&self.signals),
        )
    }

    #[must_use]
    pub fn app(&self) -> &AppSettings {
        &self.app
    }

    #[must_use]
    pub fn pool(&self) -> &Arc<ConcurrencyPool> {
        &self.pool
    }

    #[must_use]
    pub fn signals(&self) -> &Arc<SignalBus> {
        &self.signals
    }

    #[must_use]
    pub fn router(&self) -> &Arc<EventRouter> {
        &self.router
    }

    fn freeze(&mut self) {
        if let Some(open) = self.open_capabilities.take() {
            self.capabilities = open.freeze();
        }
    }

    fn resolve(&self, declaration: &ConnectionDeclaration) -> Result<(), &'static str> {
        let Some(source) = self.registry.get(&declaration.source_module) else {
            return Err("source module missing");
        };
        let Some(target) = self.registry.get(&declaration.target_module) else {
            return Err("target module missing");
        };
        if !target.has_handler(&declaration.target_handler) {
            return Err("target handler missing");
        }

        let events = source.handlers();
        if !events.events().is_empty() && !events.declares_event(&declaration.source_event) {
            debug!(connection = %declaration, "Source does not declare this event");
        }

        self.router.connect(
            &declaration.source_module,
            &declaration.source_event,
            target,
            &declaration.target_handler,
            declaration.delivery,
        );
        Ok(())
    }

    fn connect_late(&self, name: &str) {
        for declaration in self.connections.iter() {
            if declaration.source_module != name && declaration.target_module != name {
                continue;
            }
            if let Err(reason) = self.resolve(declaration) {
                debug!(connection = %declaration, reason, "Connection still unresolved");
            }
        }
    }
}

impl Drop for Station {
    fn drop(&mut self) {
        if !self.stopped {
            let _ = self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{MethodTable, Module};
    use serde_json::json;
    use shared_bus::Handler;

    #[derive(Default)]
    struct Sink {
        seen: parking_lot::Mutex<Vec<Value>>,
    }

    impl Sink {
        fn take(&self, value: Value) {
            self.seen.lock().push(value);
        }

        fn count(&self, _value: Value) -> Value {
            json!(self.seen.lock().len())
        }
    }

    impl Module for Sink {
        fn methods() -> MethodTable<Self> {
            MethodTable::new()
                .consume("take", Self::take)
                .query("count", Self::count)
        }

        fn start(&self, _ctx: ModuleContext, _settings: &Value) -> Result<(), ModuleError> {
            Ok(())
        }
    }

    fn factory() -> ModuleFactory {
        let mut factory = ModuleFactory::new();
        factory.register("sink", Sink::default);
        factory
    }

    fn late_action(registrar: &mut Registrar<'_>) {
        registrar.register_action("sink", 1, Handler::query(|_| json!("hi")), false);
    }

    #[test]
    fn test_registration_after_freeze_rejected() {
        let mut station = Station::new(AppSettings::default()).unwrap();
        station
            .create_module(&factory(), "sink", &json!({}))
            .unwrap();

        let err = station.register_controllers(&[late_action]).unwrap_err();
        assert_eq!(err, StartupError::RegistryFrozen);
    }

    #[test]
    fn test_create_module_factory_override() {
        let mut station = Station::new(AppSettings::default()).unwrap();
        let handle = station
            .create_module(&factory(), "left", &json!({"module": "sink"}))
            .unwrap();

        assert_eq!(handle.state(), ModuleState::Started);
        assert_eq!(station.status(), vec![("left".to_string(), ModuleState::Started)]);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut station = Station::new(AppSettings::default()).unwrap();
        let handle = station.create_module(&factory(), "sink", &json!({})).unwrap();

        assert!(station.stop().is_empty());
        assert!(station.stop().is_empty());
        assert_eq!(handle.state(), ModuleState::Stopped);
        assert!(station.module("sink").is_none());
        assert!(matches!(
            station.create_module(&factory(), "again", &json!({"module": "sink"})),
            Err(StartupError::Runtime(_))
        ));
    }
}

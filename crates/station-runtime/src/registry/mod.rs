//! # Module Registry
//!
//! Name → running instance table, plus the status of every module the
//! config mentioned (including disabled ones).
//!
//! ```text
//! ┌───────────────────────────────────────────────────┐
//! │                  ModuleRegistry                   │
//! │                                                   │
//! │  ┌───────────┐  ┌───────────┐  ┌───────────┐      │
//! │  │ heartbeat │  │  monitor  │  │  camera2  │      │
//! │  │  STARTED  │  │  STARTED  │  │ DISABLED  │      │
//! │  └───────────┘  └───────────┘  └───────────┘      │
//! └───────────────────────────────────────────────────┘
//! ```
//!
//! Names are unique: inserting a second instance under a running name is a
//! fatal startup error.

use crate::module::ModuleHandle;
use parking_lot::RwLock;
use shared_types::{ModuleError, ModuleState, StartupError};
use std::collections::HashMap;
use tracing::{error, info, warn};

#[derive(Default)]
pub struct ModuleRegistry {
    /// Running (or at least created) instances.
    modules: RwLock<HashMap<String, ModuleHandle>>,
    /// Every name ever seen, in creation order.
    order: RwLock<Vec<String>>,
    /// Status of names with no live instance (disabled or shut down).
    status: RwLock<HashMap<String, ModuleState>>,
}

impl ModuleRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a live instance under its name.
    pub fn insert(&self, module: ModuleHandle) -> Result<(), StartupError> {
        let name = module.name().to_string();

        {
            let mut modules = self.modules.write();
            if modules.contains_key(&name) {
                error!(module = %name, "Duplicate module name");
                return Err(StartupError::DuplicateModule(name));
            }
            info!("[Registry] Registering module: {}", name);
            modules.insert(name.clone(), module);
        }
        self.status.write().remove(&name);
        self.remember(&name);
        Ok(())
    }

    /// Record a module that the config lists but disables.
    pub fn mark_disabled(&self, name: &str) {
        info!("[Registry] Skipping disabled module: {}", name);
        self.status
            .write()
            .insert(name.to_string(), ModuleState::Disabled);
        self.remember(name);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<ModuleHandle> {
        self.modules.read().get(name).cloned()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.modules.read().contains_key(name)
    }

    /// Live instances in creation order.
    #[must_use]
    pub fn handles(&self) -> Vec<ModuleHandle> {
        let order = self.order.read().clone();
        let modules = self.modules.read();
        order
            .iter()
            .filter_map(|name| modules.get(name).cloned())
            .collect()
    }

    /// Names of live instances in creation order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.handles()
            .iter()
            .map(|module| module.name().to_string())
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.read().is_empty()
    }

    /// Status of a module, `None` if the name was never seen.
    #[must_use]
    pub fn get_status(&self, name: &str) -> Option<ModuleState> {
        if let Some(module) = self.modules.read().get(name) {
            return Some(module.state());
        }
        self.status.read().get(name).copied()
    }

    /// Every known module with its status, in creation order.
    #[must_use]
    pub fn get_all_status(&self) -> Vec<(String, ModuleState)> {
        let order = self.order.read().clone();
        order
            .into_iter()
            .filter_map(|name| self.get_status(&name).map(|state| (name, state)))
            .collect()
    }

    /// True when every live instance has started.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.modules
            .read()
            .values()
            .all(|module| module.state() == ModuleState::Started)
    }

    /// Stop every live instance, newest first, and release the handles.
    ///
    /// Returns the modules whose own `stop` failed; the rest of the
    /// shutdown continues regardless.
    pub fn shutdown(&self) -> Vec<(String, ModuleError)> {
        let mut errors = Vec::new();
        let handles = self.handles();

        for module in handles.iter().rev() {
            info!("[Registry] Stopping {}", module.name());
            if let Err(e) = module.stop() {
                warn!(module = module.name(), error = %e, "Module stop failed");
                errors.push((module.name().to_string(), e));
            }
        }

        let retired: Vec<(String, ModuleHandle)> = self.modules.write().drain().collect();
        let mut status = self.status.write();
        for (name, module) in retired {
            status.insert(name, module.state());
        }
        errors
    }

    /// Log a status table.
    pub fn print_status(&self) {
        info!("===========================================");
        info!("  MODULE REGISTRY STATUS");
        info!("===========================================");

        for (name, state) in self.get_all_status() {
            let icon = match state {
                ModuleState::Started => "✅",
                ModuleState::Disabled => "⏸️ ",
                ModuleState::Stopped => "⏹️ ",
                ModuleState::Created => "⏳",
            };
            info!("  {} {:30} {}", icon, name, state);
        }

        info!("===========================================");
    }

    fn remember(&self, name: &str) {
        let mut order = self.order.write();
        if !order.iter().any(|known| known == name) {
            order.push(name.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{Module, ModuleContext};
    use crate::pool::ConcurrencyPool;
    use shared_types::Value;
    use std::sync::Arc;
    use std::time::Duration;

    struct Idle;

    impl Module for Idle {
        fn start(&self, _ctx: ModuleContext, _settings: &Value) -> Result<(), ModuleError> {
            Ok(())
        }
    }

    fn idle(name: &str, pool: &Arc<ConcurrencyPool>) -> ModuleHandle {
        ModuleHandle::spawn(name, Arc::new(Idle), Arc::clone(pool), Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_duplicate_rejected() {
        let pool = Arc::new(ConcurrencyPool::new(1).unwrap());
        let registry = ModuleRegistry::new();

        registry.insert(idle("camera", &pool)).unwrap();
        let err = registry.insert(idle("camera", &pool)).unwrap_err();
        assert_eq!(err, StartupError::DuplicateModule("camera".into()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_status_in_creation_order() {
        let pool = Arc::new(ConcurrencyPool::new(1).unwrap());
        let registry = ModuleRegistry::new();

        registry.insert(idle("db", &pool)).unwrap();
        registry.mark_disabled("camera2");
        registry.insert(idle("net", &pool)).unwrap();

        assert_eq!(registry.names(), vec!["db", "net"]);
        assert_eq!(
            registry.get_all_status(),
            vec![
                ("db".to_string(), ModuleState::Created),
                ("camera2".to_string(), ModuleState::Disabled),
                ("net".to_string(), ModuleState::Created),
            ]
        );
        assert_eq!(registry.get_status("ghost"), None);
        assert!(!registry.is_healthy());
        registry.print_status();
    }

    #[test]
    fn test_shutdown_releases_handles() {
        let pool = Arc::new(ConcurrencyPool::new(1).unwrap());
        let registry = ModuleRegistry::new();
        registry.insert(idle("db", &pool)).unwrap();

        assert!(registry.shutdown().is_empty());
        assert!(registry.is_empty());
        assert!(registry.get("db").is_none());
        assert_eq!(registry.get_status("db"), Some(ModuleState::Stopped));
    }
}

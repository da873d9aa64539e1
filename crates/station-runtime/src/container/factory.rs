//! Module factory: type names from the config → constructors.

use crate::module::{Module, ModuleHandle};
use crate::modules;
use crate::pool::ConcurrencyPool;
use shared_types::StartupError;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

type Constructor = Box<
    dyn Fn(&str, Arc<ConcurrencyPool>, Duration) -> Result<ModuleHandle, StartupError>
        + Send
        + Sync,
>;

#[derive(Default)]
pub struct ModuleFactory {
    constructors: HashMap<String, Constructor>,
}

impl ModuleFactory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory with the modules that ship with the runtime.
    #[must_use]
    pub fn with_builtin() -> Self {
        let mut factory = Self::new();
        modules::register_builtin(&mut factory);
        factory
    }

    /// Register `ctor` under `name`. A later registration replaces an
    /// earlier one.
    pub fn register<M, F>(&mut self, name: &str, ctor: F)
    where
        M: Module,
        F: Fn() -> M + Send + Sync + 'static,
    {
        self.constructors.insert(
            name.to_string(),
            Box::new(move |instance: &str, pool: Arc<ConcurrencyPool>, timeout: Duration| {
                ModuleHandle::spawn(instance, Arc::new(ctor()), pool, timeout)
            }),
        );
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Registered type names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.constructors.keys().cloned().collect();
        names.sort();
        names
    }

    /// Build an instance of `factory` named `instance`, with its home thread
    /// running.
    pub fn create(
        &self,
        factory: &str,
        instance: &str,
        pool: Arc<ConcurrencyPool>,
        sync_timeout: Duration,
    ) -> Result<ModuleHandle, StartupError> {
        let Some(ctor) = self.constructors.get(factory) else {
            error!(module = instance, factory, "No such module type");
            return Err(StartupError::UnknownModule(factory.to_string()));
        };
        ctor(instance, pool, sync_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ModuleContext;
    use shared_types::{ModuleError, ModuleState, Value};

    struct Blank;

    impl Module for Blank {
        fn start(&self, _ctx: ModuleContext, _settings: &Value) -> Result<(), ModuleError> {
            Ok(())
        }
    }

    #[test]
    fn test_create_known_type() {
        let mut factory = ModuleFactory::new();
        factory.register("blank", || Blank);
        assert!(factory.contains("blank"));

        let pool = Arc::new(ConcurrencyPool::new(1).unwrap());
        let handle = factory
            .create("blank", "blank-1", pool, Duration::from_secs(1))
            .unwrap();
        assert_eq!(handle.name(), "blank-1");
        assert_eq!(handle.state(), ModuleState::Created);
    }

    #[test]
    fn test_unknown_type() {
        let factory = ModuleFactory::new();
        let pool = Arc::new(ConcurrencyPool::new(1).unwrap());
        let err = factory
            .create("laser", "laser", pool, Duration::from_secs(1))
            .unwrap_err();
        assert_eq!(err, StartupError::UnknownModule("laser".into()));
    }

    #[test]
    fn test_builtin_names() {
        let factory = ModuleFactory::with_builtin();
        assert_eq!(factory.names(), vec!["heartbeat", "monitor", "recorder", "ui"]);
    }
}

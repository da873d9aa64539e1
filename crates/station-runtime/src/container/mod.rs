//! # Station Container
//!
//! Inputs to the orchestrator: the parsed config, the module factory and
//! the registrar controllers write into.

pub mod config;
pub mod factory;
pub mod registrar;

pub use config::{AppSettings, ModuleEntry, StationConfig, APP_SECTION, DEFAULT_SYNC_TIMEOUT_MS};
pub use factory::ModuleFactory;
pub use registrar::{ControllerFn, Registrar};

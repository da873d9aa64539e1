//! # Station Configuration
//!
//! One TOML document. `[app]` holds runtime settings; every other top-level
//! table is a module instance, created in document order.
//!
//! ```toml
//! [app]
//! log_level = "info"
//! sync_timeout_ms = 2000
//!
//! [heartbeat]
//! interval_ms = 1000
//!
//! [camera2]
//! module = "camera"     # factory name, defaults to the table name
//! enabled = false
//! ```

use serde::Deserialize;
use shared_types::{ConfigError, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the reserved settings table.
pub const APP_SECTION: &str = "app";

/// Default bound on a cross-thread synchronous call.
pub const DEFAULT_SYNC_TIMEOUT_MS: u64 = 2000;

/// Runtime settings from `[app]`.
///
/// `save_path` and `log_path` are not used by the core. They are logged at
/// bootstrap and exposed through [`Station::app`](crate::Station::app) for
/// device and storage modules registered by the host application.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppSettings {
    /// Where modules persist data.
    pub save_path: PathBuf,
    /// Where modules write their own logs.
    pub log_path: PathBuf,
    /// Default log filter when the environment sets none.
    pub log_level: String,
    /// Bound on a cross-thread `invoke_sync`.
    pub sync_timeout_ms: u64,
    /// Concurrency pool size.
    pub pool_workers: usize,
    /// Fail startup on a connection that cannot be resolved.
    pub strict_connections: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            save_path: PathBuf::from("./data"),
            log_path: PathBuf::from("./logs"),
            log_level: "info".to_string(),
            sync_timeout_ms: DEFAULT_SYNC_TIMEOUT_MS,
            pool_workers: crate::pool::DEFAULT_WORKERS,
            strict_connections: false,
        }
    }
}

impl AppSettings {
    #[must_use]
    pub fn sync_timeout(&self) -> Duration {
        Duration::from_millis(self.sync_timeout_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.sync_timeout_ms == 0 {
            return Err(ConfigError::Structure(
                "app.sync_timeout_ms must be greater than 0".into(),
            ));
        }
        if self.pool_workers == 0 {
            return Err(ConfigError::Structure(
                "app.pool_workers must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// One module table.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleEntry {
    /// Instance name (the table key).
    pub name: String,
    /// Factory to build it with.
    pub factory: String,
    pub enabled: bool,
    /// The whole table, passed to the module's `start`.
    pub settings: Value,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StationConfig {
    pub app: AppSettings,
    /// Module tables in document order.
    pub modules: Vec<ModuleEntry>,
}

impl StationConfig {
    /// Read and parse a config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let document: toml::Table =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        let mut config = Self::default();

        for (name, section) in document {
            if name == APP_SECTION {
                config.app = section
                    .try_into()
                    .map_err(|e: toml::de::Error| ConfigError::Parse(e.to_string()))?;
                continue;
            }

            let toml::Value::Table(table) = section else {
                return Err(ConfigError::Structure(format!(
                    "top-level entry `{name}` must be a table"
                )));
            };
            config.modules.push(Self::module_entry(name, table)?);
        }

        config.app.validate()?;
        Ok(config)
    }

    #[must_use]
    pub fn module(&self, name: &str) -> Option<&ModuleEntry> {
        self.modules.iter().find(|entry| entry.name == name)
    }

    fn module_entry(name: String, table: toml::Table) -> Result<ModuleEntry, ConfigError> {
        let factory = match table.get("module") {
            None => name.clone(),
            Some(toml::Value::String(factory)) => factory.clone(),
            Some(_) => {
                return Err(ConfigError::Structure(format!(
                    "`{name}.module` must be a string"
                )))
            }
        };

        let enabled = match table.get("enabled") {
            None => true,
            Some(toml::Value::Boolean(enabled)) => *enabled,
            Some(_) => {
                return Err(ConfigError::Structure(format!(
                    "`{name}.enabled` must be a boolean"
                )))
            }
        };

        let settings = serde_json::to_value(&table)
            .map_err(|e| ConfigError::Structure(format!("`{name}`: {e}")))?;

        Ok(ModuleEntry {
            name,
            factory,
            enabled,
            settings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_app_settings() {
        let app = AppSettings::default();
        assert_eq!(app.sync_timeout(), Duration::from_millis(2000));
        assert_eq!(app.pool_workers, 4);
        assert!(!app.strict_connections);
    }

    #[test]
    fn test_modules_keep_document_order() {
        let config = StationConfig::parse(
            r#"
            [zeta]
            rate = 5

            [app]
            sync_timeout_ms = 250

            [alpha]
            module = "camera"
            enabled = false
            "#,
        )
        .unwrap();

        let names: Vec<_> = config.modules.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
        assert_eq!(config.app.sync_timeout_ms, 250);

        let zeta = config.module("zeta").unwrap();
        assert_eq!(zeta.factory, "zeta");
        assert!(zeta.enabled);
        assert_eq!(zeta.settings, json!({"rate": 5}));

        let alpha = config.module("alpha").unwrap();
        assert_eq!(alpha.factory, "camera");
        assert!(!alpha.enabled);
    }

    #[test]
    fn test_non_table_entry_rejected() {
        let err = StationConfig::parse("stray = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Structure(_)));
    }

    #[test]
    fn test_invalid_toml() {
        let err = StationConfig::parse("[broken").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_bad_app_values() {
        let err = StationConfig::parse("[app]\npool_workers = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Structure(_)));

        let err = StationConfig::parse("[app]\nsync_timeout_ms = \"soon\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));

        let err = StationConfig::parse("[cam]\nenabled = \"yes\"").unwrap_err();
        assert!(matches!(err, ConfigError::Structure(_)));
    }

    #[test]
    fn test_empty_document() {
        let config = StationConfig::parse("").unwrap();
        assert!(config.modules.is_empty());
        assert_eq!(config.app, AppSettings::default());
    }
}

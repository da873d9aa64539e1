//! Per-type method declarations and their binding to an instance.

use shared_bus::Handler;
use shared_types::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// A method pointer in one of the four handler shapes.
pub enum Method<M> {
    Notify(fn(&M)),
    Consume(fn(&M, Value)),
    Pair(fn(&M, Value, Value)),
    Query(fn(&M, Value) -> Value),
}

/// Named methods and emitted events declared by a module type.
///
/// ```rust,ignore
/// fn methods() -> MethodTable<Self> {
///     MethodTable::new()
///         .consume("onSample", Self::on_sample)
///         .query("lastSample", Self::last_sample)
///         .event("alarm")
/// }
/// ```
pub struct MethodTable<M> {
    methods: Vec<(&'static str, Method<M>)>,
    events: Vec<&'static str>,
}

impl<M> Default for MethodTable<M> {
    fn default() -> Self {
        Self {
            methods: Vec::new(),
            events: Vec::new(),
        }
    }
}

impl<M: Send + Sync + 'static> MethodTable<M> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn notify(self, name: &'static str, method: fn(&M)) -> Self {
        self.with(name, Method::Notify(method))
    }

    #[must_use]
    pub fn consume(self, name: &'static str, method: fn(&M, Value)) -> Self {
        self.with(name, Method::Consume(method))
    }

    #[must_use]
    pub fn pair(self, name: &'static str, method: fn(&M, Value, Value)) -> Self {
        self.with(name, Method::Pair(method))
    }

    #[must_use]
    pub fn query(self, name: &'static str, method: fn(&M, Value) -> Value) -> Self {
        self.with(name, Method::Query(method))
    }

    /// Declare an event the module emits.
    #[must_use]
    pub fn event(mut self, name: &'static str) -> Self {
        self.events.push(name);
        self
    }

    fn with(mut self, name: &'static str, method: Method<M>) -> Self {
        self.methods.push((name, method));
        self
    }

    /// Bind every method to `instance`. A repeated name keeps its first
    /// declaration.
    pub fn bind(self, instance: &Arc<M>) -> HandlerTable {
        let mut handlers = HashMap::with_capacity(self.methods.len());

        for (name, method) in self.methods {
            if handlers.contains_key(name) {
                warn!(method = name, "Method declared twice, keeping the first");
                continue;
            }
            let handler = match method {
                Method::Notify(f) => Handler::bind_notify(instance, f),
                Method::Consume(f) => Handler::bind(instance, f),
                Method::Pair(f) => Handler::bind_pair(instance, f),
                Method::Query(f) => Handler::bind_query(instance, f),
            };
            handlers.insert(name.to_string(), handler);
        }

        HandlerTable {
            handlers,
            events: self.events.into_iter().map(str::to_string).collect(),
        }
    }
}

/// Handlers of one module instance, keyed by method name.
#[derive(Debug, Clone, Default)]
pub struct HandlerTable {
    handlers: HashMap<String, Handler>,
    events: Vec<String>,
}

impl HandlerTable {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Handler> {
        self.handlers.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Method names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    #[must_use]
    pub fn events(&self) -> &[String] {
        &self.events
    }

    #[must_use]
    pub fn declares_event(&self, event: &str) -> bool {
        self.events.iter().any(|e| e == event)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

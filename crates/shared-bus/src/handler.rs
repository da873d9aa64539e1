//! # Invocation Adapter
//!
//! Normalises callables of different arities into one closed set of shapes.
//! Every shape is invoked through [`Handler::call`], which takes a single
//! dynamic value and returns one (`Null` for shapes without a result).
//!
//! Signatures outside the closed set simply do not type-check; there is no
//! runtime fallback.

use serde::de::DeserializeOwned;
use serde::Serialize;
use shared_types::{zero_value, Value};
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::warn;

type NotifyFn = dyn Fn() + Send + Sync;
type ConsumeFn = dyn Fn(Value) + Send + Sync;
type PairFn = dyn Fn(Value, Value) + Send + Sync;
type QueryFn = dyn Fn(Value) -> Value + Send + Sync;

/// Shape tag of a [`Handler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Notify,
    Consume,
    Pair,
    Query,
}

/// A type-erased callable of one of four shapes.
#[derive(Clone)]
pub enum Handler {
    /// No argument, no result.
    Notify(Arc<NotifyFn>),
    /// One argument, no result.
    Consume(Arc<ConsumeFn>),
    /// Two arguments, supplied as a two-element array.
    Pair(Arc<PairFn>),
    /// One argument, returns a value. This is the blocking-call shape.
    Query(Arc<QueryFn>),
}

impl Handler {
    pub fn notify(f: impl Fn() + Send + Sync + 'static) -> Self {
        Self::Notify(Arc::new(f))
    }

    pub fn consume(f: impl Fn(Value) + Send + Sync + 'static) -> Self {
        Self::Consume(Arc::new(f))
    }

    pub fn pair(f: impl Fn(Value, Value) + Send + Sync + 'static) -> Self {
        Self::Pair(Arc::new(f))
    }

    pub fn query(f: impl Fn(Value) -> Value + Send + Sync + 'static) -> Self {
        Self::Query(Arc::new(f))
    }

    /// Wrap a typed query. The argument is decoded from the incoming value
    /// and the result is encoded back. An argument that does not decode is
    /// logged and `f` is not called; the caller gets `Null`.
    pub fn typed<A, R, F>(f: F) -> Self
    where
        A: DeserializeOwned,
        R: Serialize,
        F: Fn(A) -> R + Send + Sync + 'static,
    {
        Self::query(move |value| {
            let arg: A = match serde_json::from_value(value) {
                Ok(arg) => arg,
                Err(e) => {
                    warn!(error = %e, "Typed handler argument did not decode");
                    return zero_value();
                }
            };
            serde_json::to_value(f(arg)).unwrap_or_else(|e| {
                warn!(error = %e, "Typed handler result did not encode");
                zero_value()
            })
        })
    }

    /// Bind a zero-argument method to an instance.
    ///
    /// The instance is held weakly; once it is dropped the handler does nothing.
    pub fn bind_notify<T>(instance: &Arc<T>, method: fn(&T)) -> Self
    where
        T: Send + Sync + 'static,
    {
        let target: Weak<T> = Arc::downgrade(instance);
        Self::notify(move || {
            if let Some(this) = target.upgrade() {
                method(&this);
            }
        })
    }

    /// Bind a one-argument method to an instance.
    pub fn bind<T>(instance: &Arc<T>, method: fn(&T, Value)) -> Self
    where
        T: Send + Sync + 'static,
    {
        let target: Weak<T> = Arc::downgrade(instance);
        Self::consume(move |value| {
            if let Some(this) = target.upgrade() {
                method(&this, value);
            }
        })
    }

    /// Bind a two-argument method to an instance.
    pub fn bind_pair<T>(instance: &Arc<T>, method: fn(&T, Value, Value)) -> Self
    where
        T: Send + Sync + 'static,
    {
        let target: Weak<T> = Arc::downgrade(instance);
        Self::pair(move |first, second| {
            if let Some(this) = target.upgrade() {
                method(&this, first, second);
            }
        })
    }

    /// Bind a method returning a value to an instance.
    pub fn bind_query<T>(instance: &Arc<T>, method: fn(&T, Value) -> Value) -> Self
    where
        T: Send + Sync + 'static,
    {
        let target: Weak<T> = Arc::downgrade(instance);
        Self::query(move |value| match target.upgrade() {
            Some(this) => method(&this, value),
            None => zero_value(),
        })
    }

    #[must_use]
    pub fn shape(&self) -> Shape {
        match self {
            Self::Notify(_) => Shape::Notify,
            Self::Consume(_) => Shape::Consume,
            Self::Pair(_) => Shape::Pair,
            Self::Query(_) => Shape::Query,
        }
    }

    /// Invoke with a single dynamic value.
    pub fn call(&self, value: Value) -> Value {
        match self {
            Self::Notify(f) => {
                f();
                zero_value()
            }
            Self::Consume(f) => {
                f(value);
                zero_value()
            }
            Self::Pair(f) => {
                let (first, second) = split_pair(value);
                f(first, second);
                zero_value()
            }
            Self::Query(f) => f(value),
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handler::{:?}", self.shape())
    }
}

/// Split a two-argument payload. Arrays give their first two elements;
/// any other value becomes the first argument with `Null` as the second.
fn split_pair(value: Value) -> (Value, Value) {
    match value {
        Value::Array(items) => {
            let mut items = items.into_iter();
            let first = items.next().unwrap_or(Value::Null);
            let second = items.next().unwrap_or(Value::Null);
            (first, second)
        }
        other => (other, Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    struct Counter {
        seen: Mutex<Vec<Value>>,
    }

    impl Counter {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
            })
        }

        fn bump(&self) {
            self.seen.lock().push(json!("bump"));
        }

        fn record(&self, value: Value) {
            self.seen.lock().push(value);
        }

        fn record_two(&self, a: Value, b: Value) {
            self.seen.lock().push(json!([a, b]));
        }

        fn size(&self, _value: Value) -> Value {
            json!(self.seen.lock().len())
        }
    }

    #[test]
    fn test_shapes_normalise_to_call() {
        let counter = Counter::new();
        let notify = Handler::bind_notify(&counter, Counter::bump);
        let consume = Handler::bind(&counter, Counter::record);
        let pair = Handler::bind_pair(&counter, Counter::record_two);
        let query = Handler::bind_query(&counter, Counter::size);

        assert_eq!(notify.shape(), Shape::Notify);
        assert_eq!(notify.call(json!(1)), Value::Null);
        assert_eq!(consume.call(json!({"x": 1})), Value::Null);
        assert_eq!(pair.call(json!([1, 2])), Value::Null);
        assert_eq!(query.call(Value::Null), json!(3));

        let seen = counter.seen.lock().clone();
        assert_eq!(seen, vec![json!("bump"), json!({"x": 1}), json!([1, 2])]);
    }

    #[test]
    fn test_pair_with_short_payload() {
        let counter = Counter::new();
        let pair = Handler::bind_pair(&counter, Counter::record_two);
        pair.call(json!("solo"));
        pair.call(json!([]));
        let seen = counter.seen.lock().clone();
        assert_eq!(seen, vec![json!(["solo", null]), json!([null, null])]);
    }

    #[test]
    fn test_bound_handler_after_drop_is_inert() {
        let counter = Counter::new();
        let query = Handler::bind_query(&counter, Counter::size);
        drop(counter);
        assert_eq!(query.call(Value::Null), Value::Null);
    }

    #[test]
    fn test_typed_query() {
        let double = Handler::typed(|n: i64| n * 2);
        assert_eq!(double.call(json!(21)), json!(42));
    }

    #[test]
    fn test_typed_query_skips_undecodable_argument() {
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counted = Arc::clone(&calls);
        let double = Handler::typed(move |n: u64| {
            counted.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            n * 2
        });

        assert_eq!(double.call(json!({"bogus": true})), Value::Null);
        assert_eq!(double.call(json!("nope")), Value::Null);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }
}

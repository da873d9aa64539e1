//! Dynamic value passed to and returned from handlers.

/// Runtime-typed container for handler arguments and results.
pub type Value = serde_json::Value;

/// The value returned when a synchronous dispatch fails or times out.
#[must_use]
pub fn zero_value() -> Value {
    Value::Null
}

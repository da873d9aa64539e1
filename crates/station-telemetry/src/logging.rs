//! Structured log helpers with consistent `module` / `handler` fields.

/// Log an event tagged with the module it concerns.
#[macro_export]
macro_rules! log_module_event {
    ($level:ident, $module:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            module = %$module,
            $($($field)*,)?
            $msg
        )
    };
}

/// Log a dispatch-related event with module and handler fields.
#[macro_export]
macro_rules! log_dispatch_event {
    ($level:ident, $module:expr, $handler:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            module = %$module,
            handler = %$handler,
            $($($field)*,)?
            $msg
        )
    };
}

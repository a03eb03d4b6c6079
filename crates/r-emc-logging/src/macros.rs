//! ---
//! emc_section: "03-logging-persistence"
//! emc_subsection: "module"
//! emc_type: "source"
//! emc_scope: "code"
//! emc_description: "Structured logging adapters and sinks."
//! emc_version: "v0.0.0-prealpha"
//! emc_owner: "tbd"
//! ---
//! Logging macros that attach a [`LogContext`](crate::LogContext) as structured fields.

#[doc(hidden)]
#[macro_export]
macro_rules! __emc_event {
    ($level:expr, $ctx:expr, $($arg:tt)+) => {{
        let ctx: &$crate::LogContext = &$ctx;
        $crate::__tracing::event!(
            $level,
            emitter = ctx.emitter.unwrap_or(""),
            message_id = ctx.message.unwrap_or(""),
            message_type = ctx.message_type.unwrap_or(""),
            mode = ctx.mode.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
}

/// Emit an informational log enriched with R-EMC context.
#[macro_export]
macro_rules! emc_info {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__emc_event!($crate::__tracing::Level::INFO, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__emc_event!($crate::__tracing::Level::INFO, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a debug log enriched with R-EMC context.
#[macro_export]
macro_rules! emc_debug {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__emc_event!($crate::__tracing::Level::DEBUG, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__emc_event!($crate::__tracing::Level::DEBUG, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a warning enriched with R-EMC context.
#[macro_export]
macro_rules! emc_warn {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__emc_event!($crate::__tracing::Level::WARN, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__emc_event!($crate::__tracing::Level::WARN, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit an error log enriched with R-EMC context.
#[macro_export]
macro_rules! emc_error {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__emc_event!($crate::__tracing::Level::ERROR, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__emc_event!($crate::__tracing::Level::ERROR, $crate::LogContext::default(), $($arg)+)
    };
}
